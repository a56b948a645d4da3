use bytes::Bytes;
use castr_proto::{command_name, AdminAction, ClientMessage, Mode, ServerMessage, BROADCAST_TARGET};
use tracing::{debug, info};

use super::{Role, Session};
use crate::error::Violation;
use crate::recorder::MetaEvent;
use crate::timers::TimerKind;
use crate::tracks::ConnId;

impl Session {
    pub(super) fn on_master_frame(&mut self, conn: ConnId, frame: Bytes) -> Result<(), Violation> {
        match ClientMessage::decode(frame)? {
            ClientMessage::Mode { mode } => self.on_mode_request(mode),
            ClientMessage::Sound { play, id } => {
                self.on_sound(play, id);
                Ok(())
            }
            ClientMessage::Admin {
                target,
                action,
                argument,
            } => {
                self.on_admin(conn, target, action, argument);
                Ok(())
            }
            other => Err(Violation::UnexpectedCommand {
                role: "master",
                command: command_name(other.command()),
            }),
        }
    }

    pub(super) fn on_ping_frame(&mut self, conn: ConnId, frame: Bytes) -> Result<(), Violation> {
        match ClientMessage::decode(frame)? {
            ClientMessage::Ping { client_time } => {
                self.send(
                    conn,
                    &ServerMessage::Pong {
                        client_time,
                        server_time: self.clock.now_ms(),
                    },
                );
                Ok(())
            }
            other => Err(Violation::UnexpectedCommand {
                role: "ping",
                command: command_name(other.command()),
            }),
        }
    }

    fn on_mode_request(&mut self, requested: u32) -> Result<(), Violation> {
        let to = Mode::from_u32(requested).ok_or(Violation::UnknownMode(requested))?;
        if let Some(transition) = self.mode.request(to)? {
            self.transition(transition);
        }
        Ok(())
    }

    /// Start or stop a catalog sound for every participant.
    fn on_sound(&mut self, play: bool, id: String) {
        let Some(entry) = self.sounds.lookup(&id) else {
            debug!(rid = self.rid(), sound = %id, "unknown sound requested");
            return;
        };
        let frame = ServerMessage::Sound {
            time: self.clock.now_ms(),
            play,
            url: entry.url.clone(),
        }
        .encode();
        self.broadcast_data(&frame, None);

        let expiry = TimerKind::SoundExpiry(id.clone());
        self.timers.cancel(&expiry);
        if play {
            if let Some(duration) = self.sounds.start(&id, frame) {
                self.timers.arm(expiry, duration);
            }
        } else {
            self.sounds.stop(&id);
        }

        if self.mode.mode().persists_payload() {
            let now = self.clock.now_granule();
            self.write_meta(
                &MetaEvent::Sound {
                    sid: id,
                    status: u8::from(play),
                },
                now,
            );
        }
    }

    fn on_admin(&mut self, conn: ConnId, target: u32, action: AdminAction, argument: Bytes) {
        let Some(Role::Master { index, nick }) = self.peers.get(&conn).map(|peer| &peer.role) else {
            return;
        };
        let (index, nick) = (*index, nick.clone());

        match action {
            AdminAction::Kick => self.kick(index, target),
            AdminAction::Request => {
                if target == BROADCAST_TARGET {
                    return;
                }
                // The target learns who is asking.
                let nick = if nick.is_empty() {
                    String::from("Anonymous")
                } else {
                    nick
                };
                self.relay_admin(
                    target,
                    ServerMessage::Admin {
                        target: index,
                        action,
                        argument: Bytes::from(nick.into_bytes()),
                    },
                );
            }
            AdminAction::Other(_) if target == BROADCAST_TARGET => {
                let frame = ServerMessage::Admin {
                    target,
                    action,
                    argument,
                }
                .encode();
                self.broadcast_data(&frame, None);
            }
            AdminAction::Other(_) => self.relay_admin(
                target,
                ServerMessage::Admin {
                    target: index,
                    action,
                    argument,
                },
            ),
        }
    }

    fn relay_admin(&self, target: u32, message: ServerMessage) {
        if let Some(conn) = self.tracks.connection(target) {
            self.send(conn, &message);
        }
    }

    /// Disconnect a participant and keep its origin out for a while.
    fn kick(&mut self, master: u32, target: u32) {
        let Some(conn) = self.tracks.connection(target) else {
            return;
        };
        let Some(origin) = self.peers.get(&conn).map(|peer| peer.handle.origin.clone()) else {
            return;
        };
        info!(rid = self.rid(), master, track = target, origin = %origin, "participant kicked");
        self.banned.insert(origin.clone());
        self.timers
            .arm(TimerKind::KickBan(origin), self.config.timers.kick_ban());
        self.drop_peer(conn);
    }
}
