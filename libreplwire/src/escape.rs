//! String literals as read by the interpreter.
//!
//! Code travels inside a double-quoted literal on a single line, so every character the
//! interpreter's reader would treat specially is escaped: quotes, backslashes, `$`
//! (string interpolation) and all control characters.
use std::fmt::Write;

/// Quote `text` as a string literal
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '$' => out.push_str("\\$"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Read back a literal produced by [quote]. Returns `None` for anything [quote] cannot produce.
pub fn unquote(literal: &str) -> Option<String> {
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' => {
                let actual = match chars.next()? {
                    'n' => '\n',
                    'r' => '\r',
                    't' => '\t',
                    'u' => {
                        let hex: String = chars.by_ref().take(4).collect();
                        if hex.len() != 4 {
                            return None;
                        }
                        char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
                    }
                    c @ ('\\' | '"' | '$') => c,
                    _ => return None,
                };
                out.push(actual);
            }
            '"' | '$' => return None,
            c => out.push(c),
        }
    }
    Some(out)
}
