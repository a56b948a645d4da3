use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::command::{self, command_name, parts};
use crate::error::{ProtoError, Result};
use crate::flags::{AdminAction, Mode};
use crate::info;

/// Key/value announcements carried by `info` frames.
#[derive(Debug, Clone, PartialEq)]
pub enum InfoMessage {
    Id(u32),
    PeerContinuing(u32),
    PeerInitial(u32),
    PeerLost(u32),
    Mode {
        mode: Mode,
        /// Session time of the last pause or resume, in milliseconds.
        anchor_ms: f64,
        /// Recording time accumulated before that anchor, in milliseconds.
        elapsed_ms: f64,
    },
    RecName(String),
    StartTime(f64),
    CreditCost {
        currency: u32,
        credits: u32,
    },
    CreditRate {
        cost: u32,
        rate: u32,
    },
    /// JSON list of `{i, u, n}` sound entries.
    Sounds(String),
    /// JSON object of feature restrictions.
    Features(String),
    /// Admin relay from a data socket; `track` is the sender's index.
    AllowAdmin {
        track: u32,
        extra: Bytes,
    },
    AdminState {
        track: u32,
        extra: Bytes,
    },
}

impl InfoMessage {
    pub fn key(&self) -> u32 {
        match self {
            Self::Id(_) => info::ID,
            Self::PeerContinuing(_) => info::PEER_CONTINUING,
            Self::PeerInitial(_) => info::PEER_INITIAL,
            Self::PeerLost(_) => info::PEER_LOST,
            Self::Mode { .. } => info::MODE,
            Self::RecName(_) => info::REC_NAME,
            Self::StartTime(_) => info::START_TIME,
            Self::CreditCost { .. } => info::CREDIT_COST,
            Self::CreditRate { .. } => info::CREDIT_RATE,
            Self::Sounds(_) => info::SOUNDS,
            Self::Features(_) => info::FEATURES,
            Self::AllowAdmin { .. } => info::ALLOW_ADMIN,
            Self::AdminState { .. } => info::ADMIN_STATE,
        }
    }
}

/// A frame sent by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    Ack {
        acked: u32,
    },
    Nack {
        acked: u32,
        code: u32,
        reason: String,
    },
    Info(InfoMessage),
    /// Application-level keepalive.
    Ping,
    Pong {
        client_time: f64,
        server_time: f64,
    },
    Text {
        text: String,
    },
    User {
        index: u32,
        present: bool,
        nick: String,
    },
    Speech {
        index: u32,
        speaking: bool,
    },
    Sound {
        time: f64,
        play: bool,
        url: String,
    },
    Rtc {
        peer: u32,
        body: Bytes,
    },
    Ctcp {
        peer: u32,
        body: Bytes,
    },
    Admin {
        target: u32,
        action: AdminAction,
        argument: Bytes,
    },
}

impl ServerMessage {
    pub fn command(&self) -> u32 {
        match self {
            Self::Ack { .. } => command::ACK,
            Self::Nack { .. } => command::NACK,
            Self::Info(_) => command::INFO,
            Self::Ping => command::PING,
            Self::Pong { .. } => command::PONG,
            Self::Text { .. } => command::TEXT,
            Self::User { .. } => command::USER,
            Self::Speech { .. } => command::SPEECH,
            Self::Sound { .. } => command::SOUND,
            Self::Rtc { .. } => command::RTC,
            Self::Ctcp { .. } => command::CTCP,
            Self::Admin { .. } => command::ADMIN,
        }
    }

    /// Encode into a frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(32);
        buf.put_u32_le(self.command());
        match self {
            Self::Ack { acked } => buf.put_u32_le(*acked),
            Self::Nack {
                acked,
                code,
                reason,
            } => {
                buf.put_u32_le(*acked);
                buf.put_u32_le(*code);
                buf.put_slice(reason.as_bytes());
            }
            Self::Info(info) => encode_info(info, &mut buf),
            Self::Ping => {}
            Self::Pong {
                client_time,
                server_time,
            } => {
                buf.put_f64_le(*client_time);
                buf.put_f64_le(*server_time);
            }
            Self::Text { text } => {
                buf.put_u32_le(0);
                buf.put_slice(text.as_bytes());
            }
            Self::User {
                index,
                present,
                nick,
            } => {
                buf.put_u32_le(*index);
                buf.put_u32_le(u32::from(*present));
                buf.put_slice(nick.as_bytes());
            }
            Self::Speech { index, speaking } => {
                buf.put_u32_le((index << 1) | u32::from(*speaking));
            }
            Self::Sound { time, play, url } => {
                buf.put_f64_le(*time);
                buf.put_u8(u8::from(*play));
                buf.put_slice(url.as_bytes());
            }
            Self::Rtc { peer, body } | Self::Ctcp { peer, body } => {
                buf.put_u32_le(*peer);
                buf.put_slice(body);
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

    /// Decode a server frame, as a client would.
    pub fn decode(frame: Bytes) -> Result<Self> {
        if frame.len() < 4 {
            return Err(ProtoError::TooShort {
                command: "unknown",
                len: frame.len(),
                min: 4,
            });
        }
        let cmd = (&frame[..4]).get_u32_le();
        let min = |min: usize| -> Result<()> {
            if frame.len() < min {
                Err(ProtoError::TooShort {
                    command: command_name(cmd),
                    len: frame.len(),
                    min,
                })
            } else {
                Ok(())
            }
        };
        let u32_at = |at: usize| (&frame[at..at + 4]).get_u32_le();
        let f64_at = |at: usize| (&frame[at..at + 8]).get_f64_le();
        let text_at = |at: usize| String::from_utf8_lossy(&frame[at..]).into_owned();

        let message = match cmd {
            command::ACK => {
                min(parts::ack::LENGTH)?;
                Self::Ack {
                    acked: u32_at(parts::ack::ACKD),
                }
            }
            command::NACK => {
                use parts::nack as p;
                min(p::LENGTH)?;
                Self::Nack {
                    acked: u32_at(p::ACKD),
                    code: u32_at(p::CODE),
                    reason: text_at(p::MSG),
                }
            }
            command::INFO => Self::Info(decode_info(&frame)?),
            command::PING => Self::Ping,
            command::PONG => {
                use parts::pong as p;
                min(p::LENGTH)?;
                Self::Pong {
                    client_time: f64_at(p::CLIENT_TIME),
                    server_time: f64_at(p::SERVER_TIME),
                }
            }
            command::TEXT => {
                min(parts::text::LENGTH)?;
                Self::Text {
                    text: text_at(parts::text::TEXT),
                }
            }
            command::USER => {
                use parts::user as p;
                min(p::LENGTH)?;
                Self::User {
                    index: u32_at(p::INDEX),
                    present: u32_at(p::STATUS) != 0,
                    nick: text_at(p::NICK),
                }
            }
            command::SPEECH => {
                min(parts::speech::LENGTH)?;
                let packed = u32_at(parts::speech::INDEX_STATUS);
                Self::Speech {
                    index: packed >> 1,
                    speaking: packed & 1 != 0,
                }
            }
            command::SOUND => {
                use parts::sound as p;
                min(p::LENGTH)?;
                Self::Sound {
                    time: f64_at(p::TIME),
                    play: frame[p::STATUS] != 0,
                    url: text_at(p::URL),
                }
            }
            command::RTC | command::CTCP => {
                min(parts::rtc::LENGTH)?;
                let peer = u32_at(parts::rtc::PEER);
                let body = frame.slice(parts::rtc::LENGTH..);
                if cmd == command::RTC {
                    Self::Rtc { peer, body }
                } else {
                    Self::Ctcp { peer, body }
                }
            }
            command::ADMIN => {
                use parts::admin as p;
                min(p::LENGTH)?;
                Self::Admin {
                    target: u32_at(p::TARGET),
                    action: AdminAction::from_u32(u32_at(p::ACTION)),
                    argument: frame.slice(p::ARGUMENT..),
                }
            }
            other => return Err(ProtoError::UnknownCommand(other)),
        };
        Ok(message)
    }
}

fn encode_info(message: &InfoMessage, buf: &mut BytesMut) {
    buf.put_u32_le(message.key());
    match message {
        InfoMessage::Id(value)
        | InfoMessage::PeerContinuing(value)
        | InfoMessage::PeerInitial(value)
        | InfoMessage::PeerLost(value) => buf.put_u32_le(*value),
        InfoMessage::Mode {
            mode,
            anchor_ms,
            elapsed_ms,
        } => {
            buf.put_u32_le(mode.as_u32());
            buf.put_f64_le(*anchor_ms);
            buf.put_f64_le(*elapsed_ms);
        }
        InfoMessage::RecName(text) | InfoMessage::Sounds(text) => buf.put_slice(text.as_bytes()),
        InfoMessage::Features(json) => {
            // Clients read the first word as a value, so keep at least 4 bytes.
            buf.put_slice(json.as_bytes());
            for _ in json.len()..4 {
                buf.put_u8(b' ');
            }
        }
        InfoMessage::StartTime(time) => buf.put_f64_le(*time),
        InfoMessage::CreditCost { currency, credits } => {
            buf.put_u32_le(*currency);
            buf.put_u32_le(*credits);
        }
        InfoMessage::CreditRate { cost, rate } => {
            buf.put_u32_le(*cost);
            buf.put_u32_le(*rate);
        }
        InfoMessage::AllowAdmin { track, extra } | InfoMessage::AdminState { track, extra } => {
            buf.put_u32_le(*track);
            buf.put_slice(extra);
        }
    }
}

fn decode_info(frame: &Bytes) -> Result<InfoMessage> {
    use parts::info as p;

    let name = command_name(command::INFO);
    let need = |min: usize| -> Result<()> {
        if frame.len() < min {
            Err(ProtoError::TooShort {
                command: name,
                len: frame.len(),
                min,
            })
        } else {
            Ok(())
        }
    };
    need(p::VALUE)?;
    let key = (&frame[p::KEY..]).get_u32_le();
    let u32_at = |at: usize| (&frame[at..at + 4]).get_u32_le();
    let f64_at = |at: usize| (&frame[at..at + 8]).get_f64_le();
    let text = || String::from_utf8_lossy(&frame[p::VALUE..]).into_owned();

    let message = match key {
        info::REC_NAME => InfoMessage::RecName(text()),
        info::SOUNDS => InfoMessage::Sounds(text()),
        info::FEATURES => InfoMessage::Features(text().trim_end().to_owned()),
        info::START_TIME => {
            need(p::VALUE + 8)?;
            InfoMessage::StartTime(f64_at(p::VALUE))
        }
        info::MODE => {
            need(p::VALUE + 20)?;
            let raw = u32_at(p::VALUE);
            let mode = Mode::from_u32(raw).ok_or(ProtoError::InvalidField {
                command: name,
                field: "mode",
            })?;
            InfoMessage::Mode {
                mode,
                anchor_ms: f64_at(p::VALUE + 4),
                elapsed_ms: f64_at(p::VALUE + 12),
            }
        }
        info::CREDIT_COST | info::CREDIT_RATE => {
            need(p::LENGTH + 4)?;
            let (first, second) = (u32_at(p::VALUE), u32_at(p::VALUE + 4));
            if key == info::CREDIT_COST {
                InfoMessage::CreditCost {
                    currency: first,
                    credits: second,
                }
            } else {
                InfoMessage::CreditRate {
                    cost: first,
                    rate: second,
                }
            }
        }
        _ => {
            need(p::LENGTH)?;
            let value = u32_at(p::VALUE);
            let extra = frame.slice(p::LENGTH..);
            match key {
                info::ID => InfoMessage::Id(value),
                info::PEER_CONTINUING => InfoMessage::PeerContinuing(value),
                info::PEER_INITIAL => InfoMessage::PeerInitial(value),
                info::PEER_LOST => InfoMessage::PeerLost(value),
                info::ALLOW_ADMIN => InfoMessage::AllowAdmin {
                    track: value,
                    extra,
                },
                info::ADMIN_STATE => InfoMessage::AdminState {
                    track: value,
                    extra,
                },
                other => return Err(ProtoError::UnknownInfoKey(other)),
            }
        }
    };
    Ok(message)
}
