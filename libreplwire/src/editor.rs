//! Interface to the editing environment driving the client
use std::ops::Range;

use tracing::{debug, error, info};

use crate::namespace::NamespaceSpec;

/// Identifies the editor context (buffer, view) a request originated from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ContextId(String);

/// Work-in-progress indication for a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    Started,
    Stopped,
}

/// Source text selected in the editor, with the namespace it belongs to
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub namespace: NamespaceSpec,
    pub text: String,
    /// Byte range of text within its context
    pub range: Range<usize>,
}

/// Callbacks into the editing environment.
///
/// Called from the client's event loop, so implementations must not block.
pub trait Editor: Send + Sync + 'static {
    /// Start or stop the progress indication for `ctx`
    fn notify_progress(&self, ctx: &ContextId, progress: Progress);

    /// Show `text` in the diagnostic surface of `session` and bring it to the user's attention
    fn render_diagnostic(&self, session: &str, text: &str);

    /// Show a short transient message for `ctx`
    fn notify(&self, ctx: &ContextId, message: &str);

    /// Briefly highlight region being sent
    fn flash_region(&self, _ctx: &ContextId, _range: &Range<usize>) {}
}

/// [Editor] that routes everything to tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEditor;

impl Editor for LogEditor {
    fn notify_progress(&self, ctx: &ContextId, progress: Progress) {
        debug!("progress {ctx} - {progress:?}");
    }

    fn render_diagnostic(&self, session: &str, text: &str) {
        error!("[{session}] {text}");
    }

    fn notify(&self, ctx: &ContextId, message: &str) {
        info!("[{ctx}] {message}");
    }
}

impl ContextId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContextId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
