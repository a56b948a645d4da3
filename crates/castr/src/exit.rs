use std::fmt;
use std::io;

use castr_ogg::OggError;
use castr_session::{SessionError, SessionExit};
use castr_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Permission problems keep their own code; anything else is `fallback`.
fn io_error(context: &str, err: &io::Error, fallback: i32) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        _ => fallback,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match &err {
        TransportError::Bind { source, .. } if source.kind() == io::ErrorKind::PermissionDenied => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn ogg_error(context: &str, err: OggError) -> CliError {
    match err {
        OggError::Io(source) => io_error(context, &source, FAILURE),
        other => CliError::new(DATA_INVALID, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::InvalidStartup(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        SessionError::Config(_) => CliError::new(USAGE, format!("{context}: {err}")),
        SessionError::IdsExhausted(_) => CliError::new(FAILURE, format!("{context}: {err}")),
        SessionError::Io(source) => io_error(context, &source, INTERNAL),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

/// Process status for a session that ran to an end.
pub fn session_exit_code(exit: SessionExit) -> i32 {
    match exit {
        SessionExit::Finished | SessionExit::Interrupted => SUCCESS,
        SessionExit::Abandoned => FAILURE,
    }
}
