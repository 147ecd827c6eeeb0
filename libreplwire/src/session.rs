//! A session with one interpreter, connected on first use
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::OnceCell;
use tracing::info;

use crate::bootstrap;
use crate::client::Client;
use crate::config::Config;
use crate::connection::Connection;
use crate::editor::Editor;
use crate::{Error, Result};

/// Owns the [Client] for one interpreter. Sessions share nothing with each other.
pub struct Session {
    config: Config,
    editor: Arc<dyn Editor>,
    client: OnceCell<Client>,
}

impl Session {
    pub fn new(config: Config, editor: Arc<dyn Editor>) -> Self {
        Self {
            config,
            editor,
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Start the control server through the interpreter's terminal
    pub async fn bootstrap<T>(&self, terminal: &mut T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        bootstrap::start_server(
            terminal,
            &self.config.start_command(),
            &self.config.prompt,
            self.config.bootstrap_timeout(),
        )
        .await
    }

    /// The session's client, connecting on first call
    pub async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                let conn = Connection::connect(self.config.address()).await?;
                info!("session activated - {}", conn.peer());
                Ok::<_, Error>(Client::new(conn, self.editor.clone(), &self.config))
            })
            .await
    }

    /// Whether a client has been connected
    pub fn is_active(&self) -> bool {
        self.client.initialized()
    }

    /// Shut down client, completing any outstanding requests
    pub async fn shutdown(&self) {
        if let Some(client) = self.client.get() {
            client.shutdown().await;
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.config.address())
            .field("client", &self.client.get())
            .finish()
    }
}
