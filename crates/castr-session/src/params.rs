use castr_proto::DataFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Recording parameters handed over by the parent process.
///
/// Fields this server does not interpret are kept in `extra` and written
/// back out untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingParams {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub format: DataFormat,
    /// Data sockets send continuous, VAD-tagged audio.
    #[serde(default)]
    pub continuous: bool,
    #[serde(default)]
    pub rtc: bool,
    /// Data sockets also see presence and speech updates.
    #[serde(default)]
    pub universal_monitor: bool,
    /// Subscription tier of the recording's owner; 0 for none.
    #[serde(default)]
    pub subscription: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordingParams {
    /// Subscription tier that covers this recording without credits.
    pub fn needed_subscription(&self) -> u32 {
        if self.format == DataFormat::Flac || self.continuous {
            2
        } else {
            1
        }
    }
}

/// Keys `RecordingInfo` writes itself; a parent-supplied copy is dropped.
const RESERVED_KEYS: [&str; 6] = ["rid", "port", "key", "master", "wskey", "mode"];

/// Session identity and keys, generated at start-up.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Credentials {
    pub rid: u32,
    /// Key for data and ping sockets.
    pub key: u32,
    /// Key for master sockets.
    pub master: u32,
    /// Key for the lobby side channel; only handed upward.
    pub wskey: u32,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("rid", &self.rid)
            .field("key", &"<redacted>")
            .field("master", &"<redacted>")
            .field("wskey", &"<redacted>")
            .finish()
    }
}

/// Everything known about the recording: what `.info` and the readiness
/// message carry.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    #[serde(flatten)]
    pub params: RecordingParams,
    pub rid: u32,
    pub port: u16,
    pub key: u32,
    pub master: u32,
    pub wskey: u32,
    /// Mode at the time of writing, as its wire value.
    pub mode: u32,
}

impl RecordingInfo {
    pub fn new(mut params: RecordingParams, credentials: Credentials, port: u16) -> Self {
        params
            .extra
            .retain(|key, _| !RESERVED_KEYS.contains(&key.as_str()));
        Self {
            params,
            rid: credentials.rid,
            port,
            key: credentials.key,
            master: credentials.master,
            wskey: credentials.wskey,
            mode: castr_proto::Mode::Init.as_u32(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            rid: self.rid,
            key: self.key,
            master: self.master,
            wskey: self.wskey,
        }
    }
}

impl std::fmt::Debug for RecordingInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingInfo")
            .field("params", &self.params)
            .field("rid", &self.rid)
            .field("port", &self.port)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
