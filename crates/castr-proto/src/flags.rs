use serde::{Deserialize, Serialize};

/// Bits of the login flags selecting the socket's role.
pub const CONNECTION_TYPE_MASK: u32 = 0x0f;
/// Bits of the login flags selecting a data socket's encoding.
pub const DATA_TYPE_MASK: u32 = 0xf0;
/// Data is continuous (silence included) and carries a VAD byte per packet.
pub const FEATURE_CONTINUOUS: u32 = 0x100;
/// The client takes part in peer-to-peer audio.
pub const FEATURE_RTC: u32 = 0x200;

/// Role requested at login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    Data,
    Ping,
    Master,
}

impl ConnectionType {
    pub const fn bits(self) -> u32 {
        match self {
            Self::Data => 0x0,
            Self::Ping => 0x1,
            Self::Master => 0x2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Ping => "ping",
            Self::Master => "master",
        }
    }
}

impl std::fmt::Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio encoding of a data socket and of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    #[default]
    Opus,
    Flac,
}

impl DataFormat {
    pub const fn bits(self) -> u32 {
        match self {
            Self::Opus => 0x00,
            Self::Flac => 0x10,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opus => "opus",
            Self::Flac => "flac",
        }
    }
}

/// The login flags word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginFlags(u32);

impl LoginFlags {
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Flags for a socket of the given role and, for data, format.
    pub const fn new(connection: ConnectionType) -> Self {
        Self(connection.bits())
    }

    pub const fn with_format(self, format: DataFormat) -> Self {
        Self((self.0 & !DATA_TYPE_MASK) | format.bits())
    }

    pub const fn with_continuous(self) -> Self {
        Self(self.0 | FEATURE_CONTINUOUS)
    }

    pub const fn with_rtc(self) -> Self {
        Self(self.0 | FEATURE_RTC)
    }

    /// `None` for role bits outside the protocol.
    pub fn connection_type(self) -> Option<ConnectionType> {
        match self.0 & CONNECTION_TYPE_MASK {
            0x0 => Some(ConnectionType::Data),
            0x1 => Some(ConnectionType::Ping),
            0x2 => Some(ConnectionType::Master),
            _ => None,
        }
    }

    /// Anything but FLAC is treated as Opus.
    pub fn data_format(self) -> DataFormat {
        if self.0 & DATA_TYPE_MASK == DataFormat::Flac.bits() {
            DataFormat::Flac
        } else {
            DataFormat::Opus
        }
    }

    pub fn continuous(self) -> bool {
        self.0 & FEATURE_CONTINUOUS != 0
    }

    pub fn rtc(self) -> bool {
        self.0 & FEATURE_RTC != 0
    }
}

/// Recording mode, ordered by progress through the session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Mode {
    #[default]
    Init,
    Recording,
    Paused,
    Buffering,
    Finished,
}

impl Mode {
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Init => 0,
            Self::Recording => 1,
            Self::Paused => 2,
            Self::Buffering => 3,
            Self::Finished => 4,
        }
    }

    pub const fn from_u32(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Init),
            1 => Some(Self::Recording),
            2 => Some(Self::Paused),
            3 => Some(Self::Buffering),
            4 => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Buffering => "buffering",
            Self::Finished => "finished",
        }
    }

    /// Whether payload may be persisted in this mode.
    pub fn persists_payload(self) -> bool {
        matches!(self, Self::Recording | Self::Buffering)
    }

    /// Whether data frames are looked at at all in this mode.
    pub fn accepts_data(self) -> bool {
        matches!(self, Self::Recording | Self::Paused | Self::Buffering)
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Admin actions a master can address to a data socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Kick,
    /// Ask the target to grant admin access to the requesting master.
    Request,
    /// Any other action, relayed untouched.
    Other(u32),
}

impl AdminAction {
    pub const KICK: u32 = 0x0;
    pub const REQUEST: u32 = 0x1;

    pub fn from_u32(value: u32) -> Self {
        match value {
            Self::KICK => Self::Kick,
            Self::REQUEST => Self::Request,
            other => Self::Other(other),
        }
    }

    pub fn as_u32(self) -> u32 {
        match self {
            Self::Kick => Self::KICK,
            Self::Request => Self::REQUEST,
            Self::Other(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_flags_decompose() {
        let flags = LoginFlags::new(ConnectionType::Data)
            .with_format(DataFormat::Flac)
            .with_continuous();
        assert_eq!(flags.connection_type(), Some(ConnectionType::Data));
        assert_eq!(flags.data_format(), DataFormat::Flac);
        assert!(flags.continuous());
        assert!(!flags.rtc());
        assert_eq!(flags.bits(), 0x110);
    }

    #[test]
    fn unknown_role_bits() {
        assert_eq!(LoginFlags::from_bits(0x7).connection_type(), None);
        assert_eq!(
            LoginFlags::from_bits(0x2).connection_type(),
            Some(ConnectionType::Master)
        );
    }

    #[test]
    fn unknown_data_type_is_opus() {
        assert_eq!(LoginFlags::from_bits(0x30).data_format(), DataFormat::Opus);
    }

    #[test]
    fn modes_are_ordered() {
        assert!(Mode::Init < Mode::Recording);
        assert!(Mode::Paused < Mode::Buffering);
        assert!(Mode::Buffering < Mode::Finished);
        for value in 0..5 {
            assert_eq!(Mode::from_u32(value).map(Mode::as_u32), Some(value));
        }
        assert_eq!(Mode::from_u32(5), None);
    }

    #[test]
    fn format_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&DataFormat::Flac).unwrap(),
            "\"flac\""
        );
        let parsed: DataFormat = serde_json::from_str("\"opus\"").unwrap();
        assert_eq!(parsed, DataFormat::Opus);
    }

    #[test]
    fn admin_actions() {
        assert_eq!(AdminAction::from_u32(0), AdminAction::Kick);
        assert_eq!(AdminAction::from_u32(1), AdminAction::Request);
        assert_eq!(AdminAction::from_u32(9), AdminAction::Other(9));
        assert_eq!(AdminAction::Other(9).as_u32(), 9);
    }
}
