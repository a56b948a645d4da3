//! The session actor.
//!
//! One task owns every piece of recording state: the track registry, the
//! mode, the recorder, the timers and the table of live sockets. Socket
//! tasks, timers and the accounting worker feed it events and each handler
//! runs to completion before the next one starts, so nothing in here is
//! shared or locked.

mod data;
mod lifecycle;
mod login;
mod master;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use castr_proto::{InfoMessage, LoginFlags, ServerMessage};
use castr_transport::AcceptedSocket;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::accounting::Accounting;
use crate::clock::SessionClock;
use crate::config::SessionConfig;
use crate::connection::{spawn_connection, CloseReason, ConnEvent, ConnectionHandle};
use crate::error::Violation;
use crate::features::{BrowserLimits, FeatureTracker};
use crate::flood::FloodGuard;
use crate::login::NickBook;
use crate::metering::{spawn_meter, MeterEvent, MeterHandle};
use crate::mode::ModeState;
use crate::params::{Credentials, RecordingInfo};
use crate::recorder::{MetaEvent, Recorder};
use crate::sounds::SoundBoard;
use crate::timers::{TimerKind, Timers};
use crate::tracks::{ConnId, TrackId, TrackRegistry};

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionExit {
    /// The recording finished and everyone left.
    Finished,
    /// Stopped from outside; the recording was finished early.
    Interrupted,
    /// Never started and nobody came. The artifacts should go.
    Abandoned,
}

struct DataPeer {
    track: TrackId,
    flags: LoginFlags,
    /// Rate the client must keep announcing.
    sample_rate: u32,
    nick: String,
    flood: FloodGuard,
    limits: BrowserLimits,
}

enum Role {
    AwaitingLogin,
    /// FLAC data login waiting for its sample rate.
    AwaitingSampleRate {
        flags: LoginFlags,
        nick: String,
    },
    Data(DataPeer),
    Ping,
    Master {
        index: u32,
        nick: String,
    },
}

impl Role {
    fn name(&self) -> &'static str {
        match self {
            Self::AwaitingLogin | Self::AwaitingSampleRate { .. } => "login",
            Self::Data(_) => "data",
            Self::Ping => "ping",
            Self::Master { .. } => "master",
        }
    }

    /// Whether this socket keeps a finished session alive.
    fn holds_session(&self) -> bool {
        matches!(self, Self::Data(_) | Self::Master { .. })
    }
}

struct Peer {
    handle: ConnectionHandle,
    role: Role,
}

/// One recording, from first socket to last.
pub struct Session {
    config: SessionConfig,
    info: RecordingInfo,
    credentials: Credentials,
    clock: SessionClock,
    mode: ModeState,
    tracks: TrackRegistry,
    /// `None` once the artifacts are closed.
    recorder: Option<Recorder>,
    timers: Timers,
    features: FeatureTracker,
    sounds: SoundBoard,
    nicks: NickBook,
    /// Origins kicked recently.
    banned: HashSet<String>,
    peers: HashMap<ConnId, Peer>,
    /// `masters[i]` is master `i`; index 0 is never used.
    masters: Vec<Option<ConnId>>,
    speaking: HashSet<TrackId>,
    meter: MeterHandle,
    /// Latest cumulative cost reported by accounting.
    cost: Option<u32>,
    /// Waiting for accounting to forget the recording.
    abandoning: bool,
    next_conn: ConnId,
    sockets: mpsc::UnboundedReceiver<AcceptedSocket>,
    events_tx: mpsc::UnboundedSender<ConnEvent>,
    events: mpsc::UnboundedReceiver<ConnEvent>,
    meter_events: mpsc::UnboundedReceiver<MeterEvent>,
    stop: CancellationToken,
    listener_shutdown: CancellationToken,
    socket_shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl Session {
    /// Build a session around an already started recorder. Sockets arrive on
    /// `sockets`; background tasks are spawned on `tracker`.
    pub fn new(
        config: SessionConfig,
        info: RecordingInfo,
        recorder: Recorder,
        accounting: Arc<dyn Accounting>,
        sockets: mpsc::UnboundedReceiver<AcceptedSocket>,
        tracker: TaskTracker,
    ) -> Self {
        let credentials = info.credentials();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (meter_tx, meter_events) = mpsc::unbounded_channel();
        let meter = spawn_meter(accounting, credentials.rid, config.retry, meter_tx, &tracker);

        Self {
            tracks: TrackRegistry::new(config.limits.max_tracks),
            sounds: SoundBoard::new(config.sounds.clone()),
            config,
            info,
            credentials,
            clock: SessionClock::start(),
            mode: ModeState::default(),
            recorder: Some(recorder),
            timers: Timers::new(),
            features: FeatureTracker::default(),
            nicks: NickBook::default(),
            banned: HashSet::new(),
            peers: HashMap::new(),
            masters: vec![None],
            speaking: HashSet::new(),
            meter,
            cost: None,
            abandoning: false,
            next_conn: 1,
            sockets,
            events_tx,
            events,
            meter_events,
            stop: CancellationToken::new(),
            listener_shutdown: CancellationToken::new(),
            socket_shutdown: CancellationToken::new(),
            tracker,
        }
    }

    pub fn rid(&self) -> u32 {
        self.credentials.rid
    }

    /// Cancelling this finishes the recording and ends the session.
    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// Cancelled once the session takes no more sockets.
    pub fn listener_token(&self) -> CancellationToken {
        self.listener_shutdown.clone()
    }

    /// Serve the recording until it ends.
    pub async fn run(mut self) -> SessionExit {
        info!(rid = self.rid(), port = self.info.port, name = %self.info.params.name, "recording initialized");
        self.timers
            .arm(TimerKind::IdleWatchdog, self.config.timers.idle());

        let stop = self.stop.clone();
        let exit = loop {
            tokio::select! {
                _ = stop.cancelled() => {
                    self.interrupt();
                    break SessionExit::Interrupted;
                }
                Some(socket) = self.sockets.recv() => self.accept(socket),
                Some(event) = self.events.recv() => self.on_socket_event(event),
                Some(event) = self.meter_events.recv() => {
                    if let Some(exit) = self.on_meter_event(event) {
                        break exit;
                    }
                }
                kind = self.timers.next() => {
                    if let Some(exit) = self.on_timer(kind) {
                        break exit;
                    }
                }
            }
        };

        self.shut_down();
        info!(rid = self.rid(), ?exit, "session ended");
        exit
    }

    fn accept(&mut self, socket: AcceptedSocket) {
        let conn = self.next_conn;
        self.next_conn += 1;
        let banned = self.banned.contains(&socket.origin);
        let handle = spawn_connection(
            conn,
            socket,
            self.events_tx.clone(),
            self.config.timers.liveness(),
            self.socket_shutdown.child_token(),
            &self.tracker,
        );
        if banned {
            debug!(rid = self.rid(), conn, origin = %handle.origin, "refusing banned origin");
            handle.close();
            return;
        }

        debug!(rid = self.rid(), conn, origin = %handle.origin, "socket accepted");
        self.peers.insert(
            conn,
            Peer {
                handle,
                role: Role::AwaitingLogin,
            },
        );
        self.timers
            .arm(TimerKind::Login(conn), self.config.timers.login());
    }

    fn on_socket_event(&mut self, event: ConnEvent) {
        match event {
            ConnEvent::Frame(conn, frame) => {
                if let Err(violation) = self.dispatch(conn, frame) {
                    self.reject(conn, violation);
                }
            }
            ConnEvent::Closed(conn, reason) => self.closed(conn, reason),
        }
    }

    fn dispatch(&mut self, conn: ConnId, frame: Bytes) -> Result<(), Violation> {
        let Some(peer) = self.peers.get(&conn) else {
            return Ok(());
        };
        match &peer.role {
            Role::AwaitingLogin => self.on_login(conn, frame),
            Role::AwaitingSampleRate { flags, nick } => {
                let (flags, nick) = (*flags, nick.clone());
                self.on_sample_rate(conn, frame, flags, nick)
            }
            Role::Data(_) => self.on_data_frame(conn, frame),
            Role::Ping => self.on_ping_frame(conn, frame),
            Role::Master { .. } => self.on_master_frame(conn, frame),
        }
    }

    fn on_meter_event(&mut self, event: MeterEvent) -> Option<SessionExit> {
        match event {
            MeterEvent::CreditRate { cost, rate, only } => {
                self.cost = Some(cost);
                let frame = ServerMessage::Info(InfoMessage::CreditRate { cost, rate }).encode();
                match only {
                    Some(index) => self.send_master(index, frame),
                    None => self.broadcast_masters(&frame),
                }
                None
            }
            MeterEvent::Discarded => self.abandoning.then_some(SessionExit::Abandoned),
        }
    }

    /// Drop a socket for breaking the protocol.
    fn reject(&mut self, conn: ConnId, violation: Violation) {
        let role = self.peers.get(&conn).map_or("closed", |peer| peer.role.name());
        match &violation {
            Violation::Login(_) | Violation::LoginTimeout => {
                debug!(rid = self.rid(), conn, error = %violation, "login refused");
            }
            _ => warn!(rid = self.rid(), conn, role, error = %violation, "dropping connection"),
        }
        self.drop_peer(conn);
    }

    fn closed(&mut self, conn: ConnId, reason: CloseReason) {
        let Some(peer) = self.peers.remove(&conn) else {
            return;
        };
        if reason.expected() {
            debug!(rid = self.rid(), conn, role = peer.role.name(), ?reason, "socket closed");
        } else {
            warn!(rid = self.rid(), conn, role = peer.role.name(), ?reason, "unexpected disconnection");
        }
        self.part(conn, peer);
    }

    /// Close a socket and forget it.
    fn drop_peer(&mut self, conn: ConnId) {
        if let Some(peer) = self.peers.remove(&conn) {
            peer.handle.close();
            self.part(conn, peer);
        }
    }

    fn part(&mut self, conn: ConnId, peer: Peer) {
        self.timers.cancel_where(|kind| {
            matches!(kind, TimerKind::Login(c) | TimerKind::Keepalive(c) if *c == conn)
        });
        match peer.role {
            Role::Data(data) => self.data_left(conn, data),
            Role::Master { index, .. } => {
                if let Some(slot) = self.masters.get_mut(index as usize) {
                    *slot = None;
                }
                debug!(rid = self.rid(), conn, master = index, "master left");
            }
            Role::AwaitingLogin | Role::AwaitingSampleRate { .. } | Role::Ping => {}
        }
    }

    fn set_role(&mut self, conn: ConnId, role: Role) {
        if let Some(peer) = self.peers.get_mut(&conn) {
            peer.role = role;
        }
    }

    fn send(&self, conn: ConnId, message: &ServerMessage) {
        self.send_frame(conn, message.encode());
    }

    fn send_frame(&self, conn: ConnId, frame: Bytes) {
        if let Some(peer) = self.peers.get(&conn) {
            peer.handle.send(frame);
        }
    }

    /// Send to every data socket bound to a track, optionally skipping one.
    fn broadcast_data(&self, frame: &Bytes, except: Option<ConnId>) {
        for (_, conn) in self.tracks.live() {
            if Some(conn) != except {
                self.send_frame(conn, frame.clone());
            }
        }
    }

    fn broadcast_masters(&self, frame: &Bytes) {
        for conn in self.masters.iter().flatten() {
            self.send_frame(*conn, frame.clone());
        }
    }

    fn send_master(&self, index: u32, frame: Bytes) {
        if let Some(Some(conn)) = self.masters.get(index as usize) {
            self.send_frame(*conn, frame);
        }
    }

    fn write_meta(&mut self, event: &MetaEvent, granule_pos: u64) {
        let Some(recorder) = self.recorder.as_mut() else {
            return;
        };
        if let Err(err) = recorder.write_meta(event, granule_pos) {
            error!(rid = self.credentials.rid, error = %err, "writing metadata failed");
        }
    }

    fn shut_down(&mut self) {
        self.listener_shutdown.cancel();
        self.socket_shutdown.cancel();
        self.close_recorder();
    }
}
