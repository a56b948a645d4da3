//! Socket transport for recording sessions.
//!
//! A session only ever sees message-framed duplex sockets through the
//! [`MessageSource`] / [`MessageSink`] pair carried by an
//! [`AcceptedSocket`]:
//! - [`ws`] serves them from a WebSocket listener
//! - [`memory`] builds them from in-process channels for tests
//!
//! [`listener`] acquires the listening port.

pub mod error;
pub mod listener;
pub mod memory;
pub mod traits;
pub mod ws;

pub use error::{Result, TransportError};
pub use listener::{bind_with_retry, PortRange};
pub use memory::{memory_socket, MemoryClient};
pub use traits::{AcceptedSocket, Inbound, MessageSink, MessageSource, Outbound};
