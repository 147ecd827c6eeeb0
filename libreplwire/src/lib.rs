//! Client side of the evaluation protocol spoken with a running interpreter session.
//!
//! Source text is sent to the interpreter's control port tagged with a namespace and a
//! request id. Responses come back asynchronously and are dispatched to whichever request
//! they belong to.
use std::path::PathBuf;

pub mod bootstrap;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod editor;
mod error;
pub mod escape;
pub mod namespace;
pub mod request;
pub mod response;
pub mod session;
pub mod stage;
pub mod tracker;

pub use client::{Callbacks, Client, Completion, Failure, Ticket};
pub use config::{Config, ErrorDisplay};
pub use connection::Connection;
pub use editor::{ContextId, Editor, LogEditor, Progress, Selection};
pub use error::Error;
pub use namespace::{NamespacePath, NamespaceSpec};
pub use request::{Request, RequestId};
pub use response::Response;
pub use session::Session;
pub use stage::{StagedFile, Stager};
pub use tracker::Tracker;

pub type Result<T> = std::result::Result<T, Error>;

/// The path to the user config file
pub fn config_file() -> Option<PathBuf> {
    let dir = dirs::config_dir().or_else(dirs::home_dir)?;
    Some(dir.as_path().join("replwire").join("config.json"))
}
