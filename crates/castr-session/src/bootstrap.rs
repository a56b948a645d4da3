//! Session start-up and teardown around [`Session::run`].

use std::future::Future;
use std::sync::Arc;

use castr_transport::{bind_with_retry, ws};
use rand::Rng;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::accounting::Accounting;
use crate::config::SessionConfig;
use crate::control::{read_startup, write_ready};
use crate::error::{Result, SessionError};
use crate::params::{Credentials, RecordingInfo};
use crate::recorder::{ArtifactPaths, Recorder};
use crate::session::{Session, SessionExit};

/// Random ids tried before giving up on finding an unused one.
const RID_ATTEMPTS: u32 = 1024;

/// Random positive 31-bit value.
fn random_id<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    rng.gen_range(1..=i32::MAX as u32)
}

/// Pick credentials whose recording id has no artifacts in `dir` yet.
pub fn generate_credentials<R: Rng + ?Sized>(
    rng: &mut R,
    dir: &std::path::Path,
) -> Result<(Credentials, ArtifactPaths)> {
    for _ in 0..RID_ATTEMPTS {
        let rid = random_id(rng);
        let paths = ArtifactPaths::new(dir, rid);
        if paths.any_exists() {
            debug!(rid, "recording id in use");
            continue;
        }
        let credentials = Credentials {
            rid,
            key: random_id(rng),
            master: random_id(rng),
            wskey: random_id(rng),
        };
        return Ok((credentials, paths));
    }
    Err(SessionError::IdsExhausted(RID_ATTEMPTS))
}

/// Run one recording session end to end.
///
/// Binds a port, reads the start-up message from `control_in`, creates the
/// artifacts, reports readiness on `control_out` and serves sockets until
/// the session ends. Resolving `shutdown` finishes the recording early.
/// Artifacts of an abandoned session are removed before returning.
pub async fn run<R, W, F>(
    config: SessionConfig,
    accounting: Arc<dyn Accounting>,
    control_in: R,
    control_out: W,
    shutdown: F,
) -> Result<SessionExit>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind_with_retry(config.bind_host, config.ports.range(), config.ports.attempts)
        .await?;
    let port = listener.local_addr()?.port();

    let params = read_startup(control_in).await?;
    std::fs::create_dir_all(&config.recording_dir)?;
    let (credentials, paths) =
        generate_credentials(&mut rand::thread_rng(), &config.recording_dir)?;
    let info = RecordingInfo::new(params, credentials, port);

    let tracker = TaskTracker::new();
    let mut recorder = Recorder::create(&paths, &tracker)?;
    recorder.begin(&info)?;

    let (sockets_tx, sockets) = mpsc::unbounded_channel();
    let router = ws::router(sockets_tx, config.limits.max_frame_bytes);
    let session = Session::new(
        config,
        info.clone(),
        recorder,
        accounting,
        sockets,
        tracker.clone(),
    );

    let listener_shutdown = session.listener_token();
    let server = tokio::spawn(async move {
        if let Err(err) = ws::serve(listener, router, listener_shutdown).await {
            error!(error = %err, "listener failed");
        }
    });

    let stop = session.stop_token();
    tracker.spawn(async move {
        tokio::select! {
            _ = shutdown => stop.cancel(),
            _ = stop.cancelled() => {}
        }
    });

    write_ready(control_out, &info).await?;
    info!(rid = info.rid, port, "ready");

    let stop = session.stop_token();
    let exit = session.run().await;
    stop.cancel();
    server.abort();
    tracker.close();
    tracker.wait().await;

    if exit == SessionExit::Abandoned {
        match paths.remove() {
            Ok(()) => info!(rid = info.rid, "abandoned recording removed"),
            Err(err) => warn!(rid = info.rid, error = %err, "removing abandoned recording failed"),
        }
    }
    Ok(exit)
}
