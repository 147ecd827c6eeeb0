//! Terminal stand-in for the editing environment
use replwire::{ContextId, Editor, Progress};
use tracing::debug;

/// Reports diagnostics and notifications on stderr
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TermFrontend;

impl Editor for TermFrontend {
    fn notify_progress(&self, ctx: &ContextId, progress: Progress) {
        debug!("{ctx} - {progress:?}");
    }

    fn render_diagnostic(&self, session: &str, text: &str) {
        eprintln!("--- {session} ---\n{text}");
    }

    fn notify(&self, ctx: &ContextId, message: &str) {
        eprintln!("[{ctx}] {message}");
    }
}
