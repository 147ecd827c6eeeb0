//! Line editor for rwctl REPL

use rustyline::{
    history::DefaultHistory,
    validate::{ValidationContext, ValidationResult, Validator},
    Completer, Helper, Highlighter, Hinter, Result,
};

/// Custom rustyline::Editor
pub(crate) type LineEditor = rustyline::Editor<ReplEditor, DefaultHistory>;

/// Create a line editor
pub fn editor() -> Result<LineEditor> {
    let editor = ReplEditor {};
    let mut rl = rustyline::Editor::new()?;
    rl.set_helper(Some(editor));
    Ok(rl)
}

/// Editor for rwctl repl. Keeps reading lines until brackets balance.
#[derive(Completer, Helper, Highlighter, Hinter)]
pub struct ReplEditor {}

/// Bracket state of partial input
#[derive(Debug, PartialEq)]
enum Balance {
    Complete,
    Incomplete,
    Unpaired(char),
    Unclosed(char),
}

/// Scan `input` for bracket balance, skipping string literals and comments
fn balance(input: &str) -> Balance {
    let mut stack = vec![];
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let mut escaped = false;
                let mut closed = false;
                for c in chars.by_ref() {
                    match c {
                        _ if escaped => escaped = false,
                        '\\' => escaped = true,
                        '"' => {
                            closed = true;
                            break;
                        }
                        _ => {}
                    }
                }
                if !closed {
                    return Balance::Incomplete;
                }
            }
            '#' => {
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            '(' | '[' | '{' => stack.push(c),
            ')' | ']' | '}' => {
                let open = match c {
                    ')' => '(',
                    ']' => '[',
                    _ => '{',
                };
                match stack.pop() {
                    Some(o) if o == open => {}
                    Some(wanted) => return Balance::Unclosed(wanted),
                    None => return Balance::Unpaired(c),
                }
            }
            _ => {}
        }
    }
    if stack.is_empty() {
        Balance::Complete
    } else {
        Balance::Incomplete
    }
}

impl Validator for ReplEditor {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        Ok(match balance(ctx.input()) {
            Balance::Complete => ValidationResult::Valid(None),
            Balance::Incomplete => ValidationResult::Incomplete,
            Balance::Unclosed(wanted) => {
                ValidationResult::Invalid(Some(format!("{wanted} is not closed")))
            }
            Balance::Unpaired(c) => ValidationResult::Invalid(Some(format!("{c} is not paired"))),
        })
    }

    fn validate_while_typing(&self) -> bool {
        false
    }
}
