use bytes::Bytes;
use castr_proto::info::SAMPLE_RATE;
use castr_proto::{
    command, ClientMessage, ConnectionType, DataFormat, InfoMessage, LoginFlags, Mode,
    ServerMessage,
};
use tracing::{error, info, warn};

use super::{DataPeer, Role, Session};
use crate::error::Violation;
use crate::features::BrowserLimits;
use crate::flood::FloodGuard;
use crate::login::{check_data_format, check_login, negotiated_rate};
use crate::metering::MeterRequest;
use crate::timers::TimerKind;
use crate::tracks::{ConnId, Join, TrackIdentity};

/// Rate of every Opus track.
const OPUS_RATE: u32 = 48_000;

impl Session {
    pub(super) fn on_login(&mut self, conn: ConnId, frame: Bytes) -> Result<(), Violation> {
        let request = check_login(frame, &self.credentials, self.config.limits.nick_length)?;
        self.send(
            conn,
            &ServerMessage::Ack {
                acked: command::LOGIN,
            },
        );

        match request.role {
            ConnectionType::Data => self.data_login(conn, request.flags, request.nick),
            ConnectionType::Ping => {
                self.timers.cancel(&TimerKind::Login(conn));
                self.set_role(conn, Role::Ping);
                Ok(())
            }
            ConnectionType::Master => {
                self.master_login(conn, request.nick);
                Ok(())
            }
        }
    }

    fn data_login(
        &mut self,
        conn: ConnId,
        flags: LoginFlags,
        nick: String,
    ) -> Result<(), Violation> {
        let origin = self
            .peers
            .get(&conn)
            .map(|peer| peer.handle.origin.clone())
            .unwrap_or_default();
        let nick = self.nicks.resolve(&origin, nick);
        check_data_format(flags, &self.info.params)?;

        if flags.data_format() == DataFormat::Flac {
            self.set_role(conn, Role::AwaitingSampleRate { flags, nick });
            return Ok(());
        }
        self.join(conn, flags, nick, OPUS_RATE);
        Ok(())
    }

    pub(super) fn on_sample_rate(
        &mut self,
        conn: ConnId,
        frame: Bytes,
        flags: LoginFlags,
        nick: String,
    ) -> Result<(), Violation> {
        match ClientMessage::decode(frame)? {
            ClientMessage::Info {
                key: SAMPLE_RATE,
                value,
                ..
            } => {
                self.join(conn, flags, nick, negotiated_rate(value));
                Ok(())
            }
            _ => Err(Violation::MissingSampleRate),
        }
    }

    /// Bind a logged-in data socket to its track and tell everyone.
    fn join(&mut self, conn: ConnId, flags: LoginFlags, nick: String, sample_rate: u32) {
        let rid = self.rid();
        let identity = TrackIdentity {
            nick: nick.clone(),
            format: flags.data_format(),
            sample_rate,
            continuous: flags.continuous(),
        };
        let joined = match self.tracks.join(identity, conn) {
            Ok(joined) => joined,
            Err(full) => {
                warn!(rid, conn, nick = %nick, limit = full.limit, "track limit reached");
                self.send(
                    conn,
                    &ServerMessage::Nack {
                        acked: command::LOGIN,
                        code: 0,
                        reason: full.to_string(),
                    },
                );
                self.drop_peer(conn);
                return;
            }
        };
        let id = joined.id();

        if let Join::Created(id) = joined {
            if let (Some(recorder), Some(track)) =
                (self.recorder.as_mut(), self.tracks.get_mut(id))
            {
                if let Err(err) = recorder.open_track(id, &track.identity, &mut track.packet_no) {
                    error!(rid, track = id, error = %err, "writing track headers failed");
                }
            }
            self.meter.send(MeterRequest::HighWater(id));
        }
        info!(rid, track = id, conn, nick = %nick, rejoined = matches!(joined, Join::Rejoined(_)), "participant joined");

        let user_agent = self
            .peers
            .get(&conn)
            .map(|peer| peer.handle.user_agent.clone())
            .unwrap_or_default();
        let limits = BrowserLimits::from_user_agent(&user_agent);
        if self.features.join(limits) {
            let frame =
                ServerMessage::Info(InfoMessage::Features(self.features.to_json())).encode();
            self.broadcast_data(&frame, Some(conn));
        }

        self.timers.cancel(&TimerKind::Login(conn));
        self.set_role(
            conn,
            Role::Data(DataPeer {
                track: id,
                flags,
                sample_rate,
                nick: nick.clone(),
                flood: FloodGuard::new(
                    self.config.limits.flood_window,
                    self.config.limits.flood_budget,
                ),
                limits,
            }),
        );

        self.greet_participant(conn, id);

        let user = ServerMessage::User {
            index: id,
            present: true,
            nick,
        }
        .encode();
        self.broadcast_masters(&user);
        if self.info.params.universal_monitor {
            self.broadcast_data(&user, None);
        }

        for frame in self.sounds.playing() {
            self.send_frame(conn, frame.clone());
        }

        self.meter.send(MeterRequest::Quote {
            counts: self.tracks.tier_counts(false),
            only: None,
        });
        self.timers
            .arm(TimerKind::Keepalive(conn), self.config.timers.keepalive());
    }

    /// Session state a data socket needs before anything else.
    fn greet_participant(&self, conn: ConnId, id: u32) {
        let mut greeting = vec![
            InfoMessage::Features(self.features.to_json()),
            InfoMessage::Id(id),
            self.mode.info(),
            InfoMessage::RecName(self.info.params.name.clone()),
        ];
        if self.mode.has_started() {
            greeting.push(InfoMessage::StartTime(self.mode.begin_ms()));
        }
        for message in greeting {
            self.send(conn, &ServerMessage::Info(message));
        }

        let others: Vec<(u32, ConnId)> = self
            .tracks
            .live()
            .filter(|(other, _)| *other != id)
            .collect();
        let initial = ServerMessage::Info(InfoMessage::PeerInitial(id)).encode();
        for (other, other_conn) in &others {
            self.send(
                conn,
                &ServerMessage::Info(InfoMessage::PeerContinuing(*other)),
            );
            self.send_frame(*other_conn, initial.clone());
        }

        if self.info.params.universal_monitor {
            for (other, _) in &others {
                if let Some(track) = self.tracks.get(*other) {
                    self.send(
                        conn,
                        &ServerMessage::User {
                            index: *other,
                            present: true,
                            nick: track.identity.nick.clone(),
                        },
                    );
                }
            }
            let mut speaking: Vec<u32> = self.speaking.iter().copied().collect();
            speaking.sort_unstable();
            for index in speaking {
                self.send(
                    conn,
                    &ServerMessage::Speech {
                        index,
                        speaking: true,
                    },
                );
            }
        }
    }

    /// Undo a join once its socket is gone.
    pub(super) fn data_left(&mut self, conn: ConnId, peer: DataPeer) {
        let rid = self.rid();
        let id = peer.track;
        if !self.tracks.release(id, conn) {
            return;
        }
        info!(rid, track = id, conn, nick = %peer.nick, "participant parted");

        let lost = ServerMessage::Info(InfoMessage::PeerLost(id)).encode();
        self.broadcast_data(&lost, None);

        let user = ServerMessage::User {
            index: id,
            present: false,
            nick: peer.nick,
        }
        .encode();
        self.broadcast_masters(&user);
        if self.info.params.universal_monitor {
            self.broadcast_data(&user, None);
        }

        if self.features.leave(peer.limits) {
            let frame =
                ServerMessage::Info(InfoMessage::Features(self.features.to_json())).encode();
            self.broadcast_data(&frame, None);
        }

        if self.config.auto_finish
            && self.mode.mode() == Mode::Recording
            && self.tracks.live().next().is_none()
        {
            info!(rid, "everyone left, finishing");
            self.finish();
        }
    }

    fn master_login(&mut self, conn: ConnId, nick: String) {
        let index = match self.masters.iter().skip(1).position(Option::is_none) {
            Some(free) => free + 1,
            None => {
                self.masters.push(None);
                self.masters.len() - 1
            }
        };
        self.masters[index] = Some(conn);
        let index = index as u32;
        info!(rid = self.rid(), conn, master = index, "master joined");

        self.timers.cancel(&TimerKind::Login(conn));
        self.set_role(conn, Role::Master { index, nick });

        let params = &self.info.params;
        let currency = if params.subscription >= params.needed_subscription() {
            0
        } else {
            self.config.credit_cost.currency
        };
        self.send(
            conn,
            &ServerMessage::Info(InfoMessage::CreditCost {
                currency,
                credits: self.config.credit_cost.credits,
            }),
        );
        self.meter.send(MeterRequest::Quote {
            counts: self.tracks.tier_counts(false),
            only: Some(index),
        });
        self.send(conn, &ServerMessage::Info(self.mode.info()));

        for (id, track) in self.tracks.iter() {
            self.send(
                conn,
                &ServerMessage::User {
                    index: id,
                    present: track.connection.is_some(),
                    nick: track.identity.nick.clone(),
                },
            );
        }
        if let Some(list) = self.sounds.list_json() {
            self.send(conn, &ServerMessage::Info(InfoMessage::Sounds(list)));
        }
        for frame in self.sounds.playing() {
            self.send_frame(conn, frame.clone());
        }

        self.timers
            .arm(TimerKind::Keepalive(conn), self.config.timers.keepalive());
    }
}
