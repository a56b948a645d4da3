use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use castr_transport::PortRange;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};

/// Runtime configuration of one session process.
///
/// Every field has a default, so an empty JSON object (or no file at all)
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Directory the recording artifacts are written to.
    pub recording_dir: PathBuf,
    pub bind_host: IpAddr,
    pub ports: PortConfig,
    pub limits: Limits,
    pub timers: Timers,
    /// Finish immediately when the last data socket leaves while recording.
    pub auto_finish: bool,
    pub retry: RetryConfig,
    pub pricing: Pricing,
    pub credit_cost: CreditCost,
    pub sounds: Vec<SoundEntry>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            recording_dir: PathBuf::from("rec"),
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            ports: PortConfig::default(),
            limits: Limits::default(),
            timers: Timers::default(),
            auto_finish: true,
            retry: RetryConfig::default(),
            pricing: Pricing::default(),
            credit_cost: CreditCost::default(),
            sounds: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Load a configuration file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|err| SessionError::Config(format!("{}: {err}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| SessionError::Config(format!("{}: {err}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ports.len == 0 {
            return Err(SessionError::Config("ports.len must be positive".into()));
        }
        if self.ports.attempts == 0 {
            return Err(SessionError::Config("ports.attempts must be positive".into()));
        }
        if self.limits.max_tracks == 0 {
            return Err(SessionError::Config("limits.max_tracks must be positive".into()));
        }
        if self.limits.flood_window == 0 {
            return Err(SessionError::Config("limits.flood_window must be positive".into()));
        }
        if self.timers.keepalive_ms == 0 || self.timers.liveness_ms == 0 {
            return Err(SessionError::Config("ping intervals must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortConfig {
    pub start: u16,
    pub len: u16,
    /// Random ports tried before giving up.
    pub attempts: u32,
}

impl Default for PortConfig {
    fn default() -> Self {
        let range = PortRange::default();
        Self {
            start: range.start,
            len: range.len,
            attempts: 64,
        }
    }
}

impl PortConfig {
    pub fn range(&self) -> PortRange {
        PortRange {
            start: self.start,
            len: self.len,
        }
    }
}

/// Size and rate limits. Granule quantities are in 48 kHz ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Limits {
    /// Ceiling on the number of tracks a session may register.
    pub max_tracks: u32,
    /// Display names are truncated to this many characters.
    pub nick_length: usize,
    /// Chat messages are truncated to this many characters.
    pub text_length: usize,
    pub max_frame_bytes: usize,
    /// How far past the current time a granule position may point.
    pub lookahead: u64,
    /// Width of the flood window.
    pub flood_window: u64,
    /// Bytes a socket may send within one flood window.
    pub flood_budget: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_tracks: 16,
            nick_length: 32,
            text_length: 2048,
            max_frame_bytes: 1 << 20,
            lookahead: 30 * 48_000,
            flood_window: 48_000,
            flood_budget: 48_000 * 256,
        }
    }
}

/// Timer periods in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Timers {
    /// Time a socket has to send its login frame.
    pub login_ms: u64,
    /// Protocol-level ping to data and master sockets.
    pub keepalive_ms: u64,
    /// Transport-level ping; a socket that missed the previous one is dropped.
    pub liveness_ms: u64,
    /// Silence after which a speaking track is marked quiet.
    pub speech_ms: u64,
    /// Quiet period that ends buffering.
    pub buffering_ms: u64,
    pub metering_ms: u64,
    /// Idle time before an unstarted session is abandoned.
    pub idle_ms: u64,
    /// Interval of the post-finish check for remaining sockets.
    pub finish_check_ms: u64,
    /// Grace period between the last socket leaving and exit.
    pub exit_linger_ms: u64,
    pub kick_ban_ms: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self {
            login_ms: 10_000,
            keepalive_ms: 15_000,
            liveness_ms: 30_000,
            speech_ms: 1_000,
            buffering_ms: 10_000,
            metering_ms: 60_000,
            idle_ms: 3_600_000,
            finish_check_ms: 300_000,
            exit_linger_ms: 60_000,
            kick_ban_ms: 60_000,
        }
    }
}

impl Timers {
    pub fn login(&self) -> Duration {
        Duration::from_millis(self.login_ms)
    }

    pub fn keepalive(&self) -> Duration {
        Duration::from_millis(self.keepalive_ms)
    }

    pub fn liveness(&self) -> Duration {
        Duration::from_millis(self.liveness_ms)
    }

    pub fn speech(&self) -> Duration {
        Duration::from_millis(self.speech_ms)
    }

    pub fn buffering(&self) -> Duration {
        Duration::from_millis(self.buffering_ms)
    }

    pub fn metering(&self) -> Duration {
        Duration::from_millis(self.metering_ms)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn finish_check(&self) -> Duration {
        Duration::from_millis(self.finish_check_ms)
    }

    pub fn exit_linger(&self) -> Duration {
        Duration::from_millis(self.exit_linger_ms)
    }

    pub fn kick_ban(&self) -> Duration {
        Duration::from_millis(self.kick_ban_ms)
    }
}

/// Accounting retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            base_delay_ms: 100,
            max_delay_ms: 5_000,
        }
    }
}

/// Per-minute charge for one quality tier: `upton` covers the first `n`
/// tracks, each track beyond costs `plus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tier {
    pub n: u32,
    pub upton: u32,
    pub plus: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Pricing {
    /// FLAC or continuous tracks.
    pub hq: Tier,
    pub basic: Tier,
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            hq: Tier {
                n: 4,
                upton: 120,
                plus: 30,
            },
            basic: Tier {
                n: 4,
                upton: 60,
                plus: 15,
            },
        }
    }
}

/// Exchange rate announced to masters: `credits` cost `currency` cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CreditCost {
    pub currency: u32,
    pub credits: u32,
}

impl Default for CreditCost {
    fn default() -> Self {
        Self {
            currency: 100,
            credits: 3600,
        }
    }
}

/// A sound masters may trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SoundEntry {
    pub id: String,
    pub url: String,
    pub name: String,
    pub duration_secs: f64,
}
