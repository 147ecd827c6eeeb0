//! Client configuration
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::stage::Stager;
use crate::{Error, Result};

/// How interpreter-reported failures are shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorDisplay {
    /// Message and stack in the session's diagnostic surface
    #[default]
    Diagnostics,
    /// Message only, as a transient notification
    Notification,
}

/// Settings for a session with one interpreter
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host the interpreter's control server listens on
    pub host: String,
    /// Port the interpreter's control server listens on
    pub port: u16,
    /// Texts longer than this many bytes are staged by [crate::Client::send_auto]
    pub inline_limit: usize,
    /// Directory for staged payloads. Defaults to the system temp dir. `~` is expanded.
    pub scratch_dir: Option<String>,
    /// File suffix of staged payloads
    pub scratch_suffix: String,
    pub error_display: ErrorDisplay,
    /// Upper bound on waiting for the interpreter prompt during bootstrap
    pub bootstrap_timeout_ms: u64,
    /// Interpreter prompt printed when it is ready for input
    pub prompt: String,
    /// Command starting the control server. `{port}` is replaced with [Config::port].
    pub start_command: String,
    /// Capacity of channel between client handles and event loop
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10011,
            inline_limit: 1024,
            scratch_dir: None,
            scratch_suffix: ".jl".to_string(),
            error_display: ErrorDisplay::default(),
            bootstrap_timeout_ms: 5000,
            prompt: "julia> ".to_string(),
            start_command: "using ReplWire; ReplWire.start({port})".to_string(),
            channel_capacity: 32,
        }
    }
}

impl Config {
    /// Load user config file if present, defaults otherwise
    pub fn load() -> Result<Self> {
        match crate::config_file() {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => {
                debug!("no config file - using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load config from JSON file at `path`
    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        serde_json::from_slice(&data)
            .map_err(|e| Error::Config(format!("{} - {}", path.display(), e)))
    }

    /// Address of the control server
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn scratch_dir(&self) -> PathBuf {
        match &self.scratch_dir {
            Some(dir) => PathBuf::from(shellexpand::tilde(dir).to_string()),
            None => std::env::temp_dir(),
        }
    }

    pub fn stager(&self) -> Stager {
        Stager::new(self.scratch_dir(), self.scratch_suffix.clone())
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    /// Command that starts the control server on [Config::port]
    pub fn start_command(&self) -> String {
        self.start_command.replace("{port}", &self.port.to_string())
    }
}
