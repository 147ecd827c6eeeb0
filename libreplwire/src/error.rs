use std::time::Duration;

use crate::request::RequestId;

/// Errors from sending requests and processing responses
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Malformed namespace spec - {0}")]
    MalformedNamespaceSpec(String),

    #[error("Failed to stage payload - {0}")]
    StagingIOError(#[source] std::io::Error),

    #[error("Request id is already in flight - {0}")]
    DuplicateRequestId(RequestId),

    #[error("Failed to decode response - {0}")]
    ProtocolDecodeError(String),

    #[error("Interpreter prompt did not reappear within {0:?}")]
    BootstrapTimeout(Duration),

    #[error("Interpreter output closed before prompt reappeared")]
    BootstrapEof,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid config - {0}")]
    Config(String),

    #[error("{0}")]
    IO(#[from] std::io::Error),
}
