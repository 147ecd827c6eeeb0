//! Response events sent back by the interpreter.
//!
//! Each event is one s-expression:
//!
//! ```text
//! (success "a1b2c3d4")
//! (failure "a1b2c3d4" "UndefVarError: z not defined" ("at line 3" "at top-level"))
//! ```
//!
//! Events are parsed into [Response] and never evaluated.
use std::iter::Peekable;

use crate::request::RequestId;

/// A decoded response event
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Request evaluated successfully
    Success { id: RequestId },
    /// Request raised an error inside the interpreter
    Failure {
        id: RequestId,
        message: String,
        stack: Vec<String>,
    },
    /// Anything that is not a well-formed event
    Unrecognized { raw: String, reason: String },
}

impl Response {
    /// Decode a complete frame
    pub fn from_frame(frame: &[u8]) -> Response {
        match std::str::from_utf8(frame) {
            Ok(text) => Response::parse(text),
            Err(e) => Response::unrecognized(frame, format!("invalid utf-8 - {e}")),
        }
    }

    /// Parse a single event from text
    pub fn parse(text: &str) -> Response {
        match parse_event(text) {
            Ok(resp) => resp,
            Err(reason) => Response::Unrecognized {
                raw: text.to_string(),
                reason,
            },
        }
    }

    pub(crate) fn unrecognized(raw: &[u8], reason: impl Into<String>) -> Response {
        Response::Unrecognized {
            raw: String::from_utf8_lossy(raw).into_owned(),
            reason: reason.into(),
        }
    }

    /// Id of request this response is for, if any
    pub fn id(&self) -> Option<&RequestId> {
        match self {
            Response::Success { id } | Response::Failure { id, .. } => Some(id),
            Response::Unrecognized { .. } => None,
        }
    }
}

/// Tokens of the event grammar
#[derive(Debug, PartialEq)]
enum Token {
    ParenLeft,
    ParenRight,
    String(String),
    Symbol(String),
}

/// Parsed s-expression
#[derive(Debug, PartialEq)]
enum Datum {
    String(String),
    Symbol(String),
    List(Vec<Datum>),
}

/// Deepest list nesting accepted in an event
const MAX_DEPTH: usize = 16;

fn parse_event(text: &str) -> Result<Response, String> {
    let mut tokens = Tokens::new(text).peekable();
    let datum = parse_datum(&mut tokens, 0)?;
    if let Some(extra) = tokens.next() {
        return Err(format!("trailing input after event - {:?}", extra?));
    }

    let items = match datum {
        Datum::List(items) => items,
        other => return Err(format!("expected event list - found {other:?}")),
    };

    match &items[..] {
        [Datum::Symbol(tag), Datum::String(id)] if tag == "success" => Ok(Response::Success {
            id: RequestId::from(id.as_str()),
        }),
        [Datum::Symbol(tag), Datum::String(id), Datum::String(message), Datum::List(frames)]
            if tag == "failure" =>
        {
            let stack = frames
                .iter()
                .map(|frame| match frame {
                    Datum::String(s) => Ok(s.clone()),
                    other => Err(format!("expected string stack frame - found {other:?}")),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Response::Failure {
                id: RequestId::from(id.as_str()),
                message: message.clone(),
                stack,
            })
        }
        [Datum::Symbol(tag), ..] => Err(format!("unexpected event shape for tag {tag}")),
        _ => Err("event does not start with a tag".to_string()),
    }
}

fn parse_datum<I>(tokens: &mut Peekable<I>, depth: usize) -> Result<Datum, String>
where
    I: Iterator<Item = Result<Token, String>>,
{
    match tokens.next() {
        Some(Ok(Token::ParenLeft)) if depth >= MAX_DEPTH => Err("nesting too deep".to_string()),
        Some(Ok(Token::ParenLeft)) => {
            let mut items = vec![];
            loop {
                match tokens.peek() {
                    Some(Ok(Token::ParenRight)) => {
                        tokens.next();
                        return Ok(Datum::List(items));
                    }
                    Some(_) => items.push(parse_datum(tokens, depth + 1)?),
                    None => return Err("unterminated list".to_string()),
                }
            }
        }
        Some(Ok(Token::ParenRight)) => Err("unexpected )".to_string()),
        Some(Ok(Token::String(s))) => Ok(Datum::String(s)),
        Some(Ok(Token::Symbol(s))) => Ok(Datum::Symbol(s)),
        Some(Err(e)) => Err(e),
        None => Err("empty event".to_string()),
    }
}

/// An iterator over Tokens
struct Tokens<'a> {
    inner: Peekable<std::str::Chars<'a>>,
}

impl Tokens<'_> {
    fn new(text: &str) -> Tokens<'_> {
        Tokens {
            inner: text.chars().peekable(),
        }
    }

    fn next_symbol(&mut self) -> Token {
        let sym: String =
            std::iter::from_fn(|| self.inner.next_if(|ch| !is_delimiter(ch))).collect();
        Token::Symbol(sym)
    }

    /// Parse next string, consuming both quotes
    fn next_string(&mut self) -> Result<Token, String> {
        self.inner.next(); // opening quote
        let mut s = String::new();
        loop {
            match self.inner.next() {
                Some('"') => return Ok(Token::String(s)),
                Some('\\') => {
                    let ch = match self.inner.next() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('r') => '\r',
                        Some(other) => other,
                        None => return Err("unterminated escape in string".to_string()),
                    };
                    s.push(ch);
                }
                Some(ch) => s.push(ch),
                None => return Err("unterminated string".to_string()),
            }
        }
    }
}

impl Iterator for Tokens<'_> {
    type Item = Result<Token, String>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.inner.next_if(|ch| ch.is_whitespace()).is_some() {}
        let token = match self.inner.peek()? {
            '(' => {
                self.inner.next();
                Ok(Token::ParenLeft)
            }
            ')' => {
                self.inner.next();
                Ok(Token::ParenRight)
            }
            '"' => self.next_string(),
            _ => Ok(self.next_symbol()),
        };
        Some(token)
    }
}

fn is_delimiter(ch: &char) -> bool {
    ch.is_whitespace() || *ch == '(' || *ch == ')' || *ch == '"'
}
