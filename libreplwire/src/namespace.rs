//! Namespace addressing.
//!
//! A namespace is a module path inside the interpreter, encoded on the wire as an array of
//! quoted symbols, e.g. `[:Main]` or `[:Foo, :Bar]`.
use std::str::FromStr;

use crate::{Error, Result};

/// Name of the root namespace
pub const ROOT: &str = "Main";

/// Abstract namespace requested by a caller
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceSpec {
    /// The root namespace
    #[default]
    Default,
    /// A single top-level namespace
    Symbol(String),
    /// Nested namespaces, outermost first
    List(Vec<String>),
}

/// A validated, non-empty namespace path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespacePath(Vec<String>);

impl NamespaceSpec {
    /// Resolve spec into a validated [NamespacePath]
    pub fn resolve(&self) -> Result<NamespacePath> {
        match self {
            NamespaceSpec::Default => Ok(NamespacePath::root()),
            NamespaceSpec::List(segments) if segments.is_empty() => Ok(NamespacePath::root()),
            NamespaceSpec::Symbol(s) => NamespacePath::new(vec![s.clone()]),
            NamespaceSpec::List(segments) => NamespacePath::new(segments.clone()),
        }
    }
}

impl TryFrom<serde_json::Value> for NamespaceSpec {
    type Error = Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        use serde_json::Value;
        match value {
            Value::Null => Ok(NamespaceSpec::Default),
            Value::String(s) => Ok(NamespaceSpec::Symbol(s)),
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(Error::MalformedNamespaceSpec(format!(
                        "expected string segment, found {other}"
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(NamespaceSpec::List),
            other => Err(Error::MalformedNamespaceSpec(format!(
                "expected null, string, or array - found {other}"
            ))),
        }
    }
}

/// Parses dotted paths like `Foo.Bar`. Empty input is the root namespace.
impl FromStr for NamespaceSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(NamespaceSpec::Default);
        }
        let segments: Vec<String> = s.split('.').map(|seg| seg.trim().to_string()).collect();
        let spec = match &segments[..] {
            [single] => NamespaceSpec::Symbol(single.clone()),
            _ => NamespaceSpec::List(segments),
        };
        spec.resolve()?;
        Ok(spec)
    }
}

impl NamespacePath {
    /// Create a path, validating every segment
    pub fn new(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            return Err(Error::MalformedNamespaceSpec(
                "namespace path is empty".to_string(),
            ));
        }
        if let Some(bad) = segments.iter().find(|s| !is_identifier(s)) {
            return Err(Error::MalformedNamespaceSpec(format!(
                "invalid identifier - {bad:?}"
            )));
        }
        Ok(Self(segments))
    }

    /// The root namespace path
    pub fn root() -> Self {
        Self(vec![ROOT.to_string()])
    }

    /// Segments of path, outermost first
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Encode as wire literal
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a wire literal produced by [NamespacePath::encode]
    pub fn decode(literal: &str) -> Result<Self> {
        let malformed =
            || Error::MalformedNamespaceSpec(format!("not a namespace literal - {literal:?}"));
        let inner = literal
            .trim()
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .ok_or_else(malformed)?;
        let segments = inner
            .split(',')
            .map(|token| {
                token
                    .trim()
                    .strip_prefix(':')
                    .map(str::to_string)
                    .ok_or_else(malformed)
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(segments)
    }
}

impl std::fmt::Display for NamespacePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, ":{seg}")?;
        }
        write!(f, "]")
    }
}

/// Whether `s` can be written as a bare quoted symbol
fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '!')
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn list(segments: &[&str]) -> NamespaceSpec {
        NamespaceSpec::List(segments.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn encode_default() {
        assert_eq!(NamespaceSpec::Default.resolve().unwrap().encode(), "[:Main]");
        assert_eq!(list(&[]).resolve().unwrap().encode(), "[:Main]");
    }

    #[test]
    fn encode_symbol() {
        let path = NamespaceSpec::Symbol("Foo".to_string()).resolve().unwrap();
        assert_eq!(path.encode(), "[:Foo]");
    }

    #[test]
    fn encode_list_preserves_order() {
        let path = list(&["Foo", "Bar"]).resolve().unwrap();
        assert_eq!(path.encode(), "[:Foo, :Bar]");
        assert_eq!(path.segments(), ["Foo", "Bar"]);
    }

    #[test]
    fn encode_rejects_invalid_identifiers() {
        assert_matches!(
            NamespaceSpec::Symbol("1abc".to_string()).resolve(),
            Err(Error::MalformedNamespaceSpec(_))
        );
        assert_matches!(
            list(&["Foo", "Bar Baz"]).resolve(),
            Err(Error::MalformedNamespaceSpec(_))
        );
        assert_matches!(
            list(&["Foo", ""]).resolve(),
            Err(Error::MalformedNamespaceSpec(_))
        );
        assert_matches!(
            NamespaceSpec::Symbol("Foo]".to_string()).resolve(),
            Err(Error::MalformedNamespaceSpec(_))
        );
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("Main"));
        assert!(is_identifier("_private"));
        assert!(is_identifier("push!"));
        assert!(is_identifier("Δx2"));
        assert!(!is_identifier("!bang"));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn decode_encode_round_trip() {
        for spec in [
            NamespaceSpec::Default,
            NamespaceSpec::Symbol("Foo".to_string()),
            list(&["Foo", "Bar", "baz!"]),
            list(&["Main", "Δ"]),
        ] {
            let path = spec.resolve().unwrap();
            assert_eq!(
                NamespacePath::decode(&path.encode()).unwrap(),
                path,
                "decoding encoded {spec:?} should give same path"
            );
        }
    }

    #[test]
    fn decode_rejects_malformed() {
        assert!(NamespacePath::decode("[]").is_err());
        assert!(NamespacePath::decode(":Main").is_err());
        assert!(NamespacePath::decode("[Main]").is_err());
        assert!(NamespacePath::decode("[:Main, Foo]").is_err());
    }

    #[test]
    fn spec_from_json() {
        assert_eq!(
            NamespaceSpec::try_from(json!(null)).unwrap(),
            NamespaceSpec::Default
        );
        assert_eq!(
            NamespaceSpec::try_from(json!("Foo")).unwrap(),
            NamespaceSpec::Symbol("Foo".to_string())
        );
        assert_eq!(
            NamespaceSpec::try_from(json!(["Foo", "Bar"])).unwrap(),
            list(&["Foo", "Bar"])
        );
        assert_matches!(
            NamespaceSpec::try_from(json!(42)),
            Err(Error::MalformedNamespaceSpec(_))
        );
        assert_matches!(
            NamespaceSpec::try_from(json!({"ns": "Foo"})),
            Err(Error::MalformedNamespaceSpec(_))
        );
        assert_matches!(
            NamespaceSpec::try_from(json!(["Foo", 1])),
            Err(Error::MalformedNamespaceSpec(_))
        );
    }

    #[test]
    fn spec_from_dotted() {
        assert_eq!("".parse::<NamespaceSpec>().unwrap(), NamespaceSpec::Default);
        assert_eq!(
            "Foo".parse::<NamespaceSpec>().unwrap(),
            NamespaceSpec::Symbol("Foo".to_string())
        );
        assert_eq!(
            "Foo.Bar".parse::<NamespaceSpec>().unwrap(),
            list(&["Foo", "Bar"])
        );
        assert!("Foo..Bar".parse::<NamespaceSpec>().is_err());
    }
}
