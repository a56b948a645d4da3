use std::collections::HashMap;

use bytes::Bytes;
use castr_proto::{command_name, ClientMessage, ConnectionType, DataFormat, LoginFlags};

use crate::error::{LoginError, Violation};
use crate::params::{Credentials, RecordingParams};

/// An accepted login frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub role: ConnectionType,
    pub flags: LoginFlags,
    /// Already truncated; may be empty.
    pub nick: String,
}

/// Validate the first frame of a socket.
pub fn check_login(
    frame: Bytes,
    credentials: &Credentials,
    nick_length: usize,
) -> Result<LoginRequest, Violation> {
    let (session_id, key, flags, nick) = match ClientMessage::decode(frame)? {
        ClientMessage::Login {
            session_id,
            key,
            flags,
            nick,
        } => (session_id, key, flags, nick),
        other => return Err(LoginError::NotLogin(command_name(other.command())).into()),
    };

    if session_id != credentials.rid {
        return Err(LoginError::WrongSession {
            expected: credentials.rid,
            got: session_id,
        }
        .into());
    }

    let role = flags
        .connection_type()
        .ok_or(LoginError::UnknownRole(flags.bits() & castr_proto::flags::CONNECTION_TYPE_MASK))?;
    let expected_key = match role {
        ConnectionType::Master => credentials.master,
        ConnectionType::Data | ConnectionType::Ping => credentials.key,
    };
    if key != expected_key {
        return Err(LoginError::BadKey(role).into());
    }

    Ok(LoginRequest {
        role,
        flags,
        nick: truncate_chars(&nick, nick_length),
    })
}

/// Refuse data logins the recording can't take.
pub fn check_data_format(flags: LoginFlags, params: &RecordingParams) -> Result<(), Violation> {
    if flags.continuous() && !params.continuous {
        return Err(Violation::IncompatibleFormat("continuous"));
    }
    if flags.data_format() == DataFormat::Flac && params.format != DataFormat::Flac {
        return Err(Violation::IncompatibleFormat("flac"));
    }
    Ok(())
}

/// Sample rate a FLAC socket announced. Anything but 44.1 kHz is 48 kHz.
pub fn negotiated_rate(announced: u32) -> u32 {
    if announced == 44_100 {
        44_100
    } else {
        48_000
    }
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Display names for data sockets that didn't give one.
#[derive(Debug)]
pub struct NickBook {
    by_origin: HashMap<String, String>,
    next_anonymous: u32,
}

impl Default for NickBook {
    fn default() -> Self {
        Self {
            by_origin: HashMap::new(),
            next_anonymous: 1,
        }
    }
}

impl NickBook {
    /// The name to use for a data socket from `origin`. An empty `nick`
    /// reuses the last name seen from that origin, else gets a fresh
    /// anonymous one. The result is remembered for the origin.
    pub fn resolve(&mut self, origin: &str, nick: String) -> String {
        let nick = if !nick.is_empty() {
            nick
        } else if let Some(cached) = self.by_origin.get(origin) {
            cached.clone()
        } else {
            let name = format!("Anonymous {}", self.next_anonymous);
            self.next_anonymous += 1;
            name
        };
        self.by_origin.insert(origin.to_owned(), nick.clone());
        nick
    }
}
