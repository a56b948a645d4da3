//! One multi-party recording session.
//!
//! A session process accepts participant sockets for a single recording,
//! muxes every participant's audio into one Ogg container and coordinates
//! the recording lifecycle:
//! - [`tracks`] maps participants to stable track indices across reconnects
//! - [`session`] is the actor that owns all recording state
//! - [`recorder`] writes the header, data, users and info artifacts
//! - [`metering`] forwards charges to an [`Accounting`] collaborator
//! - [`bootstrap`] binds, handshakes with the parent process and runs it all

pub mod accounting;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod connection;
pub mod control;
pub mod error;
pub mod features;
pub mod flood;
pub mod headers;
pub mod login;
pub mod metering;
pub mod mode;
pub mod params;
pub mod recorder;
pub mod retry;
pub mod session;
pub mod sink;
pub mod sounds;
pub mod timers;
pub mod tracks;

pub use accounting::{tiered_rate, Accounting, LocalAccounting, TierCounts};
pub use config::SessionConfig;
pub use error::{AccountingError, LoginError, Result, SessionError, Violation};
pub use params::{Credentials, RecordingInfo, RecordingParams};
pub use recorder::{ArtifactPaths, MemorySinks, Recorder};
pub use session::{Session, SessionExit};
pub use tracks::{ConnId, TrackId};
