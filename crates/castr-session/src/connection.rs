use std::time::Duration;

use bytes::Bytes;
use castr_transport::{AcceptedSocket, Inbound, Outbound};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, trace};

use crate::tracks::ConnId;

/// Why a socket task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// The client went away.
    Hangup,
    /// The session closed it.
    Closed,
    /// The previous transport ping was never answered.
    Unresponsive,
    Transport(String),
    Shutdown,
}

impl CloseReason {
    /// Whether the session asked for it.
    pub fn expected(&self) -> bool {
        matches!(self, Self::Hangup | Self::Closed | Self::Shutdown)
    }
}

/// What socket tasks report to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnEvent {
    Frame(ConnId, Bytes),
    Closed(ConnId, CloseReason),
}

/// The session's side of a socket.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnId,
    pub origin: String,
    pub user_agent: String,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnectionHandle {
    /// Queue a frame. Silently dropped once the socket is gone.
    pub fn send(&self, frame: Bytes) {
        if self.tx.send(Outbound::Frame(frame)).is_err() {
            trace!(conn = self.id, "frame for closed socket dropped");
        }
    }

    /// Close after everything already queued has been sent.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }
}

/// Run one socket until it closes, forwarding its frames to `events`.
///
/// Every `liveness` period a transport ping is sent; a socket that did not
/// answer the previous one is closed.
pub fn spawn_connection(
    id: ConnId,
    socket: AcceptedSocket,
    events: mpsc::UnboundedSender<ConnEvent>,
    liveness: Duration,
    cancel: CancellationToken,
    tracker: &TaskTracker,
) -> ConnectionHandle {
    let AcceptedSocket {
        mut source,
        mut sink,
        origin,
        user_agent,
    } = socket;
    let (tx, mut rx) = mpsc::unbounded_channel();

    tracker.spawn(async move {
        let mut ticker = interval_at(Instant::now() + liveness, liveness);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut alive = true;

        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    let _ = sink.send(Outbound::Close).await;
                    break CloseReason::Shutdown;
                }
                inbound = source.recv() => match inbound {
                    Some(Ok(Inbound::Frame(frame))) => {
                        if events.send(ConnEvent::Frame(id, frame)).is_err() {
                            let _ = sink.send(Outbound::Close).await;
                            break CloseReason::Shutdown;
                        }
                    }
                    Some(Ok(Inbound::Pong)) => alive = true,
                    Some(Err(err)) => break CloseReason::Transport(err.to_string()),
                    None => break CloseReason::Hangup,
                },
                outbound = rx.recv() => match outbound {
                    Some(Outbound::Close) | None => {
                        let _ = sink.send(Outbound::Close).await;
                        break CloseReason::Closed;
                    }
                    Some(message) => {
                        if let Err(err) = sink.send(message).await {
                            break CloseReason::Transport(err.to_string());
                        }
                    }
                },
                _ = ticker.tick() => {
                    if !alive {
                        let _ = sink.send(Outbound::Close).await;
                        break CloseReason::Unresponsive;
                    }
                    alive = false;
                    if let Err(err) = sink.send(Outbound::Ping).await {
                        break CloseReason::Transport(err.to_string());
                    }
                }
            }
        };

        debug!(conn = id, ?reason, "socket closed");
        let _ = events.send(ConnEvent::Closed(id, reason));
    });

    ConnectionHandle {
        id,
        origin,
        user_agent,
        tx,
    }
}
