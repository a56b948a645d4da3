/// Errors raised while decoding a protocol frame.
///
/// `command` fields hold the command's name as given by
/// [`command_name`](crate::command_name).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProtoError {
    /// The frame is shorter than its command requires.
    #[error("{command} frame too short ({len} bytes, need {min})")]
    TooShort {
        command: &'static str,
        len: usize,
        min: usize,
    },

    /// The command requires an exact length.
    #[error("{command} frame must be exactly {expected} bytes (got {len})")]
    BadLength {
        command: &'static str,
        len: usize,
        expected: usize,
    },

    /// The command id is not part of the protocol.
    #[error("unknown command {0:#x}")]
    UnknownCommand(u32),

    /// An info frame carries an unrecognized key.
    #[error("unknown info key {0:#x}")]
    UnknownInfoKey(u32),

    /// A text field that must be UTF-8 is not.
    #[error("{command} frame carries invalid UTF-8")]
    InvalidUtf8 { command: &'static str },

    /// A field holds a value outside its domain.
    #[error("invalid {field} in {command} frame")]
    InvalidField {
        command: &'static str,
        field: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
