use castr_proto::{ConnectionType, Mode, ProtoError};

/// Errors that end a session or prevent it from starting.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] castr_transport::TransportError),

    /// Container error while writing a sink.
    #[error("container error: {0}")]
    Ogg(#[from] castr_ogg::OggError),

    /// Filesystem error on the recording artifacts.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The start-up message from the parent process was unusable.
    #[error("invalid start-up message: {0}")]
    InvalidStartup(String),

    /// Could not find an unused recording id.
    #[error("no unused recording id after {0} attempts")]
    IdsExhausted(u32),

    /// Configuration file problem.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Reasons a login frame is refused. The socket is closed without a reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error("first frame was {0}, not login")]
    NotLogin(&'static str),

    #[error("login for recording {got}, this is {expected}")]
    WrongSession { expected: u32, got: u32 },

    #[error("wrong key for {0} role")]
    BadKey(ConnectionType),

    #[error("unknown connection type {0:#x}")]
    UnknownRole(u32),
}

/// Why a connection was dropped. Always fatal to that connection only.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Violation {
    #[error("malformed frame: {0}")]
    Malformed(#[from] ProtoError),

    #[error("login refused: {0}")]
    Login(#[from] LoginError),

    #[error("{command} is not accepted on a {role} connection")]
    UnexpectedCommand {
        role: &'static str,
        command: &'static str,
    },

    #[error("recording does not accept {0} data")]
    IncompatibleFormat(&'static str),

    #[error("expected a sample rate announcement")]
    MissingSampleRate,

    #[error("sample rate changed from {expected} to {got}")]
    SampleRateChanged { expected: u32, got: u32 },

    #[error("info key {name} ({key:#x}) is not accepted from participants")]
    UnsupportedInfo { key: u32, name: &'static str },

    #[error("caption is not valid JSON")]
    InvalidCaption,

    #[error("unknown mode {0}")]
    UnknownMode(u32),

    #[error("mode change from {from} to {to} is not allowed")]
    InvalidTransition { from: Mode, to: Mode },

    #[error("flood threshold exceeded with {bytes} bytes in the window")]
    Flood { bytes: u64 },

    #[error("no login before timeout")]
    LoginTimeout,
}

/// Failure of the accounting collaborator. Retried, then logged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccountingError {
    #[error("accounting backend unavailable: {0}")]
    Unavailable(String),

    #[error("unknown recording {0}")]
    UnknownRecording(u32),
}
