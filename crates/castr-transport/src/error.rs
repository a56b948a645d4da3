use std::net::SocketAddr;

/// Errors that can occur in socket transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Every port tried was already in use.
    #[error("no free port after {attempts} attempts")]
    PortsExhausted { attempts: u32 },

    /// An I/O error occurred on the transport.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WebSocket layer reported an error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// The socket has been closed.
    #[error("socket closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
