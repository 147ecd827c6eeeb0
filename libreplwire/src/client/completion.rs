//! How a request ends
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::request::RequestId;

/// Terminal outcome of a request
pub type Completion = std::result::Result<(), Failure>;

/// Why a request did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// Interpreter raised an error while evaluating
    Eval { message: String, stack: Vec<String> },
    /// Connection went away before a terminal response arrived
    ConnectionClosed,
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Failure::Eval { message, .. } => message,
            Failure::ConnectionClosed => "Connection closed",
        }
    }

    pub fn stack(&self) -> &[String] {
        match self {
            Failure::Eval { stack, .. } => stack,
            Failure::ConnectionClosed => &[],
        }
    }
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())?;
        for frame in self.stack() {
            write!(f, "\n{frame}")?;
        }
        Ok(())
    }
}

/// Optional hooks run by the dispatcher when a request ends
#[derive(Default)]
pub struct Callbacks {
    pub on_success: Option<Box<dyn FnOnce() + Send>>,
    pub on_failure: Option<Box<dyn FnOnce(&Failure) + Send>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_success(mut self, f: impl FnOnce() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_failure(mut self, f: impl FnOnce(&Failure) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(f));
        self
    }

    /// Run whichever hook matches `completion`
    pub(crate) fn run(self, completion: &Completion) {
        match completion {
            Ok(()) => {
                if let Some(f) = self.on_success {
                    f();
                }
            }
            Err(failure) => {
                if let Some(f) = self.on_failure {
                    f(failure);
                }
            }
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_success", &self.on_success.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

/// Handle to a sent request. Resolves to its [Completion].
#[derive(Debug)]
pub struct Ticket {
    id: RequestId,
    rx: oneshot::Receiver<Completion>,
}

impl Ticket {
    pub(crate) fn new(id: RequestId, rx: oneshot::Receiver<Completion>) -> Self {
        Self { id, rx }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for Ticket {
    type Output = Completion;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Completion> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.unwrap_or(Err(Failure::ConnectionClosed)))
    }
}
