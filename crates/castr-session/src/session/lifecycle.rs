use castr_proto::{InfoMessage, Mode, ServerMessage};
use tracing::{debug, error, info, warn};

use super::{Role, Session, SessionExit};
use crate::error::Violation;
use crate::metering::MeterRequest;
use crate::mode::Transition;
use crate::recorder::{MetaEvent, RecordingSummary};
use crate::timers::TimerKind;

impl Session {
    /// Carry out a mode change a master asked for.
    pub(super) fn transition(&mut self, transition: Transition) {
        let rid = self.rid();
        let granule_pos = self.mode.apply(transition, self.clock.now_ms());
        self.announce_mode();

        match transition {
            Transition::Start => {
                self.write_meta(&MetaEvent::Start, granule_pos);
                let start =
                    ServerMessage::Info(InfoMessage::StartTime(self.mode.begin_ms())).encode();
                self.broadcast_data(&start, None);
                self.meter.send(MeterRequest::Status(Mode::Recording));
                self.timers
                    .arm(TimerKind::Metering, self.config.timers.metering());
                self.timers.cancel(&TimerKind::IdleWatchdog);
                info!(rid, tracks = self.tracks.len(), "recording started");
            }
            Transition::Pause => {
                self.write_meta(&MetaEvent::Pause, granule_pos);
                self.timers.pause(&TimerKind::Metering);
                info!(rid, elapsed_ms = self.mode.elapsed_ms(), "recording paused");
            }
            Transition::Resume => {
                self.write_meta(&MetaEvent::Resume, granule_pos);
                self.timers.resume(&TimerKind::Metering);
                info!(rid, "recording resumed");
            }
            Transition::End => {
                self.timers
                    .arm(TimerKind::Buffering, self.config.timers.buffering());
                info!(rid, elapsed_ms = self.mode.elapsed_ms(), "recording stopped, draining");
            }
        }
    }

    /// Enter the terminal mode. Only the first call does anything.
    pub(super) fn finish(&mut self) {
        if !self.mode.finish(self.clock.now_ms()) {
            return;
        }
        let rid = self.rid();
        self.timers.cancel(&TimerKind::Buffering);
        self.timers.cancel(&TimerKind::IdleWatchdog);
        self.announce_mode();

        // Charge the part of an interval that has run since the last tick.
        if self.timers.cancel(&TimerKind::Metering) {
            self.meter.send(MeterRequest::Charge {
                counts: self.tracks.tier_counts(true),
            });
        }
        self.meter.send(MeterRequest::Status(Mode::Finished));
        self.timers
            .arm(TimerKind::FinishCheck, self.config.timers.finish_check());
        info!(
            rid,
            elapsed_ms = self.mode.elapsed_ms(),
            tracks = self.tracks.len(),
            "recording finished"
        );
    }

    /// Tell every data socket and master the current mode.
    fn announce_mode(&self) {
        let frame = ServerMessage::Info(self.mode.info()).encode();
        self.broadcast_data(&frame, None);
        self.broadcast_masters(&frame);
    }

    pub(super) fn on_timer(&mut self, kind: TimerKind) -> Option<SessionExit> {
        let rid = self.rid();
        match kind {
            TimerKind::Speech(id) => self.speech(id, false),
            TimerKind::Buffering => {
                debug!(rid, "no data while buffering");
                self.finish();
            }
            TimerKind::Metering => {
                self.meter.send(MeterRequest::Charge {
                    counts: self.tracks.tier_counts(true),
                });
                match self.mode.mode() {
                    Mode::Recording => self
                        .timers
                        .arm(TimerKind::Metering, self.config.timers.metering()),
                    Mode::Paused => {
                        self.timers
                            .arm(TimerKind::Metering, self.config.timers.metering());
                        self.timers.pause(&TimerKind::Metering);
                    }
                    _ => {}
                }
            }
            TimerKind::IdleWatchdog => {
                if self.mode.mode() != Mode::Init {
                    return None;
                }
                if !self.peers.is_empty() {
                    self.timers
                        .arm(TimerKind::IdleWatchdog, self.config.timers.idle());
                    return None;
                }
                warn!(rid, "recording never started, abandoning");
                self.abandoning = true;
                self.listener_shutdown.cancel();
                self.meter.send(MeterRequest::Discard);
            }
            TimerKind::FinishCheck => {
                if self.peers.values().any(|peer| peer.role.holds_session()) {
                    self.timers
                        .arm(TimerKind::FinishCheck, self.config.timers.finish_check());
                    return None;
                }
                info!(rid, "everyone has left, closing recording");
                self.listener_shutdown.cancel();
                self.close_recorder();
                self.timers
                    .arm(TimerKind::ExitLinger, self.config.timers.exit_linger());
            }
            TimerKind::ExitLinger => return Some(SessionExit::Finished),
            TimerKind::SoundExpiry(id) => {
                self.sounds.stop(&id);
            }
            TimerKind::KickBan(origin) => {
                self.banned.remove(&origin);
            }
            TimerKind::Login(conn) => {
                let waiting = self.peers.get(&conn).is_some_and(|peer| {
                    matches!(
                        peer.role,
                        Role::AwaitingLogin | Role::AwaitingSampleRate { .. }
                    )
                });
                if waiting {
                    self.reject(conn, Violation::LoginTimeout);
                }
            }
            TimerKind::Keepalive(conn) => {
                let keep = self
                    .peers
                    .get(&conn)
                    .is_some_and(|peer| peer.role.holds_session());
                if keep {
                    self.send(conn, &ServerMessage::Ping);
                    self.timers
                        .arm(TimerKind::Keepalive(conn), self.config.timers.keepalive());
                }
            }
        }
        None
    }

    /// Stop requested from outside: finish now and close up.
    pub(super) fn interrupt(&mut self) {
        info!(rid = self.rid(), mode = %self.mode.mode(), "stop requested");
        self.finish();
        self.close_recorder();
    }

    /// Append the summary and release the sinks. Later writes are dropped.
    pub(super) fn close_recorder(&mut self) {
        let Some(mut recorder) = self.recorder.take() else {
            return;
        };
        let summary = RecordingSummary {
            mode: self.mode.mode().as_u32(),
            start_time_ms: self.mode.begin_ms(),
            elapsed_ms: self.mode.elapsed_ms(),
            tracks: self.tracks.len(),
            cost: self.cost,
        };
        if let Err(err) = recorder.append_summary(&summary) {
            error!(rid = self.rid(), error = %err, "writing recording summary failed");
        }
        recorder.close();
    }
}
