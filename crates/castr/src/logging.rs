use clap::ValueEnum;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Crates whose events follow `--log-level`. Everything else (axum, hyper)
/// is held at warn.
const OWN_TARGETS: [&str; 5] = [
    "castr",
    "castr_ogg",
    "castr_proto",
    "castr_session",
    "castr_transport",
];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    /// Includes one event per muxed packet.
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

fn targets(level: LogLevel) -> Targets {
    let level = LevelFilter::from(level);
    OWN_TARGETS
        .iter()
        .fold(Targets::new().with_default(level.min(LevelFilter::WARN)), |targets, name| {
            targets.with_target(*name, level)
        })
}

/// Install the stderr subscriber. stdout belongs to the control channel, so
/// nothing here may write to it.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false);
    let registry = tracing_subscriber::registry().with(targets(level));

    // A subscriber may already be installed (tests); keep that one.
    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;

    #[test]
    fn session_crates_follow_the_requested_level() {
        let targets = targets(LogLevel::Debug);
        assert!(targets.would_enable("castr_session::session", &Level::DEBUG));
        assert!(targets.would_enable("castr_transport::ws", &Level::DEBUG));
        assert!(!targets.would_enable("castr_ogg::writer", &Level::TRACE));
    }

    #[test]
    fn dependencies_stay_at_warn() {
        let targets = targets(LogLevel::Trace);
        assert!(targets.would_enable("hyper::proto", &Level::WARN));
        assert!(!targets.would_enable("hyper::proto", &Level::INFO));

        let quiet = super::targets(LogLevel::Error);
        assert!(!quiet.would_enable("axum::serve", &Level::WARN));
        assert!(quiet.would_enable("castr", &Level::ERROR));
    }
}
