use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{self, command_name, parts};
use crate::error::{ProtoError, Result};
use crate::flags::{AdminAction, LoginFlags};

/// Largest granule position the 48-bit wire field can carry.
pub const MAX_WIRE_GRANULE: u64 = (1 << 48) - 1;

/// A frame sent by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Login {
        session_id: u32,
        key: u32,
        flags: LoginFlags,
        nick: String,
    },
    Info {
        key: u32,
        value: u32,
        /// Bytes after the value, relayed untouched when forwarded.
        extra: Bytes,
    },
    Data {
        granule_pos: u64,
        packet: Bytes,
    },
    DataX {
        granule_pos: u64,
        sub_id: u32,
        packet: Bytes,
    },
    Text {
        text: String,
    },
    Caption {
        json: String,
    },
    Rtc {
        peer: u32,
        body: Bytes,
    },
    Ctcp {
        peer: u32,
        body: Bytes,
    },
    Error {
        text: String,
    },
    Ping {
        client_time: f64,
    },
    Mode {
        mode: u32,
    },
    Sound {
        play: bool,
        id: String,
    },
    Admin {
        target: u32,
        action: AdminAction,
        argument: Bytes,
    },
}

fn require_min(command: u32, frame: &[u8], min: usize) -> Result<()> {
    if frame.len() < min {
        return Err(ProtoError::TooShort {
            command: command_name(command),
            len: frame.len(),
            min,
        });
    }
    Ok(())
}

fn require_exact(command: u32, frame: &[u8], expected: usize) -> Result<()> {
    if frame.len() != expected {
        return Err(ProtoError::BadLength {
            command: command_name(command),
            len: frame.len(),
            expected,
        });
    }
    Ok(())
}

fn u32_at(frame: &[u8], at: usize) -> u32 {
    (&frame[at..at + 4]).get_u32_le()
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

impl ClientMessage {
    /// Decode one complete frame.
    pub fn decode(frame: Bytes) -> Result<Self> {
        require_min(u32::MAX, &frame, 4)?;
        let cmd = u32_at(&frame, 0);

        let message = match cmd {
            command::LOGIN => {
                use parts::login as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Login {
                    session_id: u32_at(&frame, p::ID),
                    key: u32_at(&frame, p::KEY),
                    flags: LoginFlags::from_bits(u32_at(&frame, p::FLAGS)),
                    nick: lossy(&frame[p::NICK..]),
                }
            }
            command::INFO => {
                use parts::info as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Info {
                    key: u32_at(&frame, p::KEY),
                    value: u32_at(&frame, p::VALUE),
                    extra: frame.slice(p::LENGTH..),
                }
            }
            command::DATA => {
                use parts::data as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Data {
                    granule_pos: (&frame[p::GRANULE_POS..]).get_uint_le(6),
                    packet: frame.slice(p::PACKET..),
                }
            }
            command::DATAX => {
                use parts::datax as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::DataX {
                    granule_pos: (&frame[p::GRANULE_POS..]).get_uint_le(6),
                    sub_id: u32_at(&frame, p::TRACK),
                    packet: frame.slice(p::PACKET..),
                }
            }
            command::TEXT => {
                use parts::text as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Text {
                    text: lossy(&frame[p::TEXT..]),
                }
            }
            command::CAPTION => {
                use parts::caption as p;
                require_min(cmd, &frame, p::LENGTH)?;
                let json = std::str::from_utf8(&frame[p::DATA..]).map_err(|_| {
                    ProtoError::InvalidUtf8 {
                        command: command_name(cmd),
                    }
                })?;
                Self::Caption {
                    json: json.to_owned(),
                }
            }
            command::RTC => {
                use parts::rtc as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Rtc {
                    peer: u32_at(&frame, p::PEER),
                    body: frame.slice(p::LENGTH..),
                }
            }
            command::CTCP => {
                use parts::ctcp as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Ctcp {
                    peer: u32_at(&frame, p::PEER),
                    body: frame.slice(p::LENGTH..),
                }
            }
            command::ERROR => Self::Error {
                text: lossy(&frame[4..]),
            },
            command::PING => {
                use parts::ping as p;
                require_exact(cmd, &frame, p::LENGTH)?;
                Self::Ping {
                    client_time: (&frame[p::CLIENT_TIME..]).get_f64_le(),
                }
            }
            command::MODE => {
                use parts::mode as p;
                require_exact(cmd, &frame, p::LENGTH)?;
                Self::Mode {
                    mode: u32_at(&frame, p::MODE),
                }
            }
            command::SOUND => {
                use parts::sound_request as p;
                require_min(cmd, &frame, p::LENGTH + 1)?;
                Self::Sound {
                    play: frame[p::STATUS] != 0,
                    id: lossy(&frame[p::ID..]),
                }
            }
            command::ADMIN => {
                use parts::admin as p;
                require_min(cmd, &frame, p::LENGTH)?;
                Self::Admin {
                    target: u32_at(&frame, p::TARGET),
                    action: AdminAction::from_u32(u32_at(&frame, p::ACTION)),
                    argument: frame.slice(p::ARGUMENT..),
                }
            }
            other => return Err(ProtoError::UnknownCommand(other)),
        };
        Ok(message)
    }

    /// The command id this message is sent under.
    pub fn command(&self) -> u32 {
        match self {
            Self::Login { .. } => command::LOGIN,
            Self::Info { .. } => command::INFO,
            Self::Data { .. } => command::DATA,
            Self::DataX { .. } => command::DATAX,
            Self::Text { .. } => command::TEXT,
            Self::Caption { .. } => command::CAPTION,
            Self::Rtc { .. } => command::RTC,
            Self::Ctcp { .. } => command::CTCP,
            Self::Error { .. } => command::ERROR,
            Self::Ping { .. } => command::PING,
            Self::Mode { .. } => command::MODE,
            Self::Sound { .. } => command::SOUND,
            Self::Admin { .. } => command::ADMIN,
        }
    }

    /// Encode into a frame. Granule positions are truncated to 48 bits.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u32_le(self.command());
        match self {
            Self::Login {
                session_id,
                key,
                flags,
                nick,
            } => {
                buf.put_u32_le(*session_id);
                buf.put_u32_le(*key);
                buf.put_u32_le(flags.bits());
                buf.put_slice(nick.as_bytes());
            }
            Self::Info { key, value, extra } => {
                buf.put_u32_le(*key);
                buf.put_u32_le(*value);
                buf.put_slice(extra);
            }
            Self::Data {
                granule_pos,
                packet,
            } => {
                buf.put_uint_le(granule_pos & MAX_WIRE_GRANULE, 6);
                buf.put_slice(packet);
            }
            Self::DataX {
                granule_pos,
                sub_id,
                packet,
            } => {
                buf.put_uint_le(granule_pos & MAX_WIRE_GRANULE, 6);
                buf.put_u32_le(*sub_id);
                buf.put_slice(packet);
            }
            Self::Text { text } => {
                buf.put_u32_le(0);
                buf.put_slice(text.as_bytes());
            }
            Self::Caption { json } => buf.put_slice(json.as_bytes()),
            Self::Rtc { peer, body } | Self::Ctcp { peer, body } => {
                buf.put_u32_le(*peer);
                buf.put_slice(body);
            }
            Self::Error { text } => buf.put_slice(text.as_bytes()),
            Self::Ping { client_time } => buf.put_f64_le(*client_time),
            Self::Mode { mode } => buf.put_u32_le(*mode),
            Self::Sound { play, id } => {
                buf.put_u8(u8::from(*play));
                buf.put_slice(id.as_bytes());
            }
            Self::Admin {
                target,
                action,
                argument,
            } => {
                buf.put_u32_le(*target);
                buf.put_u32_le(action.as_u32());
                buf.put_slice(argument);
            }
        }
        buf.freeze()
    }
}
