//! Binary command codec for recording session sockets.
//!
//! Every message is one transport frame that starts with:
//! - a 4-byte little-endian command id (see [`command`])
//! - a command-specific body at fixed offsets
//!
//! Inbound frames decode into [`ClientMessage`], outbound frames are built
//! from [`ServerMessage`]. Both directions also have the opposite operation so
//! that test clients can speak the protocol.

pub mod client;
pub mod command;
pub mod error;
pub mod flags;
pub mod info;
pub mod server;

pub use client::ClientMessage;
pub use command::command_name;
pub use error::{ProtoError, Result};
pub use flags::{AdminAction, ConnectionType, DataFormat, LoginFlags, Mode};
pub use server::{InfoMessage, ServerMessage};

/// Admin target addressing every data connection.
pub const BROADCAST_TARGET: u32 = u32::MAX;
