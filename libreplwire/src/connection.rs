//! Sending requests and receiving responses over the interpreter's control port.

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_util::codec::Framed;
use tracing::debug;

use crate::codec::WireCodec;
use crate::request::Request;
use crate::response::Response;

/// Byte stream a [Connection] runs over
pub trait Transport: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> Transport for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Connection to one interpreter's control server
pub struct Connection {
    stream: Framed<Box<dyn Transport>, WireCodec>,
    peer: String,
}

impl Connection {
    /// Returns a new [Connection] over given stream
    pub fn new(stream: impl Transport, peer: impl Into<String>) -> Self {
        let stream: Box<dyn Transport> = Box::new(stream);
        Connection {
            stream: Framed::new(stream, WireCodec::default()),
            peer: peer.into(),
        }
    }

    /// Connect to control server listening at `addr`
    pub async fn connect(addr: impl ToSocketAddrs + std::fmt::Display) -> std::io::Result<Self> {
        let peer = addr.to_string();
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        debug!("connected to {peer}");
        Ok(Connection::new(stream, peer))
    }

    /// Returns a [Connection] and the raw interpreter end of an in-memory stream
    pub fn pair() -> (Connection, DuplexStream) {
        let (local, remote) = tokio::io::duplex(64 * 1024);
        (Connection::new(local, "pair"), remote)
    }

    /// Description of remote end
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write request frame and flush
    pub async fn send(&mut self, req: &Request) -> Result<(), std::io::Error> {
        debug!("send req={}", req);
        self.stream.send(req).await
    }

    /// Receive next response event. Returns `None` once remote closes.
    pub async fn recv(&mut self) -> Option<Result<Response, std::io::Error>> {
        let resp = self.stream.next().await?;
        if let Ok(resp) = &resp {
            debug!("recv resp={:?}", resp);
        }
        Some(resp)
    }

    /// Shutdown the connection
    pub async fn shutdown(self) -> Result<(), std::io::Error> {
        debug!("shutdown {:?}", self);
        self.stream.into_inner().shutdown().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Connection {{ peer: {} }}", self.peer)
    }
}
