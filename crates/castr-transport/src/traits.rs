use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// A message received from a client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// One protocol frame. Text frames are delivered as their bytes.
    Frame(Bytes),
    /// Answer to a transport-level ping.
    Pong,
}

/// A message sent to a client socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(Bytes),
    /// Transport-level liveness ping.
    Ping,
    /// Close the socket; nothing is sent after this.
    Close,
}

/// Receiving half of a socket.
#[async_trait]
pub trait MessageSource: Send {
    /// Next message, or `None` once the peer has gone away.
    async fn recv(&mut self) -> Option<Result<Inbound>>;
}

/// Sending half of a socket.
#[async_trait]
pub trait MessageSink: Send {
    async fn send(&mut self, message: Outbound) -> Result<()>;
}

/// A freshly accepted socket, split into its halves.
pub struct AcceptedSocket {
    pub source: Box<dyn MessageSource>,
    pub sink: Box<dyn MessageSink>,
    /// Network origin, used for name caching and kick bans.
    pub origin: String,
    pub user_agent: String,
}

impl std::fmt::Debug for AcceptedSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptedSocket")
            .field("origin", &self.origin)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}
