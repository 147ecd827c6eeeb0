//! Outgoing evaluation requests
use std::str::FromStr;

use nanoid::nanoid;

use crate::escape::{quote, unquote};
use crate::namespace::NamespacePath;
use crate::{Error, Result};

/// Alphabet for request ids. Eight characters give 32 bits of randomness.
const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Length of generated request ids
pub const ID_LEN: usize = 8;

/// Correlation token for a request and its response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

/// A request to evaluate code in a namespace
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Unique ID assigned to request
    pub id: RequestId,
    /// Namespace to evaluate code in
    pub namespace: NamespacePath,
    /// Source text to evaluate
    pub code: String,
}

impl RequestId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(nanoid!(ID_LEN, &HEX))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RequestId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Request {
    /// Create a request with a freshly generated id
    pub fn new(namespace: NamespacePath, code: impl Into<String>) -> Self {
        Self {
            id: RequestId::generate(),
            namespace,
            code: code.into(),
        }
    }
}

/// The single-line wire frame, without trailing newline
impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(ns = {}, reqid = {}, code = {})",
            self.namespace,
            quote(self.id.as_str()),
            quote(&self.code)
        )
    }
}

/// Parses a wire frame. This is the interpreter's side of the exchange, used to drive
/// in-process interpreters in tests and tooling.
impl FromStr for Request {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let malformed = || Error::ProtocolDecodeError(format!("Malformed request frame - {s}"));
        let rest = s.trim_end().strip_prefix("(ns = ").ok_or_else(malformed)?;
        let (namespace, rest) = rest.split_once(", reqid = ").ok_or_else(malformed)?;
        let (id, rest) = rest.split_once(", code = ").ok_or_else(malformed)?;
        let code = rest.strip_suffix(')').ok_or_else(malformed)?;
        Ok(Request {
            id: RequestId(unquote(id).ok_or_else(malformed)?),
            namespace: NamespacePath::decode(namespace)?,
            code: unquote(code).ok_or_else(malformed)?,
        })
    }
}
