use std::sync::Arc;
use std::time::Duration;

use castr_session::{bootstrap, LocalAccounting, SessionConfig};
use tokio::io::BufReader;
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{session_error, session_exit_code, CliError, CliResult, INTERNAL, USAGE};

pub fn run(args: ServeArgs) -> CliResult<i32> {
    let config = build_config(&args)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime start failed: {err}")))?;

    runtime.block_on(async move {
        let accounting = Arc::new(LocalAccounting::new(config.pricing));
        let exit = bootstrap::run(
            config,
            accounting,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            shutdown_signal(),
        )
        .await
        .map_err(|err| session_error("session failed", err))?;
        info!(?exit, "exiting");
        Ok::<_, CliError>(session_exit_code(exit))
    })
}

/// Configuration file first, then flags and environment on top.
fn build_config(args: &ServeArgs) -> CliResult<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => {
            SessionConfig::load(path).map_err(|err| session_error("config load failed", err))?
        }
        None => SessionConfig::default(),
    };

    if let Some(dir) = &args.recording_dir {
        config.recording_dir = dir.clone();
    }
    if let Some(bind) = args.bind {
        config.bind_host = bind;
    }
    if let Some(start) = args.port_start {
        config.ports.start = start;
    }
    if let Some(len) = args.port_len {
        config.ports.len = len;
    }
    if let Some(attempts) = args.bind_attempts {
        config.ports.attempts = attempts;
    }
    if let Some(timeout) = &args.login_timeout {
        config.timers.login_ms = parse_duration(timeout)?.as_millis() as u64;
    }

    config
        .validate()
        .map_err(|err| session_error("invalid configuration", err))?;
    Ok(config)
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "cannot listen for interrupt");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    ctrl_c.await;

    info!("stop signal received");
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
