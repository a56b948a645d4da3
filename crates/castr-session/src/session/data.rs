use bytes::{BufMut, Bytes, BytesMut};
use castr_proto::info::{info_name, ADMIN_STATE, ALLOW_ADMIN, SAMPLE_RATE};
use castr_proto::{command_name, ClientMessage, DataFormat, InfoMessage, Mode, ServerMessage};
use serde_json::Value;
use tracing::{error, warn};

use super::{Role, Session};
use crate::error::Violation;
use crate::login::truncate_chars;
use crate::recorder::MetaEvent;
use crate::timers::TimerKind;
use crate::tracks::{ConnId, TrackId, TrackRegistry};

/// What the data socket `conn` is, copied out of the peer table.
struct Sender {
    track: TrackId,
    continuous: bool,
    flac: bool,
    sample_rate: u32,
    nick: String,
}

impl Session {
    fn sender(&self, conn: ConnId) -> Option<Sender> {
        match &self.peers.get(&conn)?.role {
            Role::Data(peer) => Some(Sender {
                track: peer.track,
                continuous: peer.flags.continuous(),
                flac: peer.flags.data_format() == DataFormat::Flac,
                sample_rate: peer.sample_rate,
                nick: peer.nick.clone(),
            }),
            _ => None,
        }
    }

    /// Account `len` bytes at `granule_pos` against the socket's flood budget.
    fn check_flood(&mut self, conn: ConnId, granule_pos: u64, len: usize) -> Result<(), Violation> {
        if let Some(Role::Data(peer)) = self.peers.get_mut(&conn).map(|peer| &mut peer.role) {
            if peer.flood.record(granule_pos, len as u64) {
                return Err(Violation::Flood {
                    bytes: peer.flood.total(),
                });
            }
        }
        Ok(())
    }

    pub(super) fn on_data_frame(&mut self, conn: ConnId, frame: Bytes) -> Result<(), Violation> {
        let Some(sender) = self.sender(conn) else {
            return Ok(());
        };
        match ClientMessage::decode(frame)? {
            ClientMessage::Data {
                granule_pos,
                packet,
            } => self.on_payload(conn, &sender, granule_pos, None, packet),
            ClientMessage::DataX {
                granule_pos,
                sub_id,
                packet,
            } => self.on_payload(conn, &sender, granule_pos, Some(sub_id), packet),
            ClientMessage::Text { text } => self.on_text(conn, &sender, &text),
            ClientMessage::Caption { json } => self.on_caption(conn, &sender, &json),
            ClientMessage::Info { key, value, extra } => {
                self.on_participant_info(&sender, key, value, extra)
            }
            ClientMessage::Rtc { peer, body } => {
                self.relay(peer, ServerMessage::Rtc {
                    peer: sender.track,
                    body,
                });
                Ok(())
            }
            ClientMessage::Ctcp { peer, body } => {
                self.relay(peer, ServerMessage::Ctcp {
                    peer: sender.track,
                    body,
                });
                Ok(())
            }
            ClientMessage::Error { text } => {
                warn!(rid = self.rid(), track = sender.track, nick = %sender.nick, message = %text, "client reported an error");
                Ok(())
            }
            other => Err(Violation::UnexpectedCommand {
                role: "data",
                command: command_name(other.command()),
            }),
        }
    }

    fn on_payload(
        &mut self,
        conn: ConnId,
        sender: &Sender,
        granule_pos: u64,
        sub_id: Option<u32>,
        packet: Bytes,
    ) -> Result<(), Violation> {
        if !self.mode.mode().accepts_data() {
            return Ok(());
        }
        let rid = self.rid();
        let now = self.clock.now_granule();
        let latest = now + self.config.limits.lookahead;

        let (serial, floor) = match sub_id {
            None => match self.tracks.get(sender.track) {
                Some(track) => (sender.track, track.last_granule),
                None => return Ok(()),
            },
            Some(sub_id) => {
                let Some((sub, created)) = self.tracks.sub_track(sender.track, sub_id) else {
                    return Ok(());
                };
                let stream = (sub.serial, sub.last_granule);
                if created {
                    self.write_meta(
                        &MetaEvent::Subtrack {
                            id: sender.track,
                            sub_id: sub_id as i32,
                        },
                        now,
                    );
                }
                stream
            }
        };

        // Late packets snap up to the floor, early ones down to the lookahead.
        let granule_pos = if granule_pos < floor {
            floor
        } else {
            granule_pos.min(latest)
        };
        if let Some((last_granule, _)) = stream_state(&mut self.tracks, sender.track, sub_id) {
            *last_granule = granule_pos;
        }

        let payload = match sub_id {
            None => packet.clone(),
            Some(sub_id) => {
                let mut prefixed = BytesMut::with_capacity(4 + packet.len());
                prefixed.put_u32_le(sub_id);
                prefixed.extend_from_slice(&packet);
                prefixed.freeze()
            }
        };
        self.check_flood(conn, granule_pos, payload.len())?;

        if !self.mode.should_persist(granule_pos) {
            return Ok(());
        }
        if let (Some(recorder), Some((_, packet_no))) = (
            self.recorder.as_mut(),
            stream_state(&mut self.tracks, sender.track, sub_id),
        ) {
            if let Err(err) = recorder.write_data(granule_pos, serial, packet_no, &payload) {
                error!(rid, track = sender.track, serial, error = %err, "writing data failed");
            }
        }

        let speaking = if sender.continuous {
            packet.first().is_some_and(|byte| *byte != 0)
        } else if sender.flac {
            packet.len() >= 16
        } else {
            packet.len() >= 8
        };
        self.speech(sender.track, speaking);

        if self.mode.mode() == Mode::Buffering {
            self.timers
                .arm(TimerKind::Buffering, self.config.timers.buffering());
        }
        Ok(())
    }

    /// Update a track's speaking flag, telling masters on change.
    pub(super) fn speech(&mut self, id: TrackId, speaking: bool) {
        let was_speaking = self.speaking.contains(&id);
        if speaking {
            self.timers
                .arm(TimerKind::Speech(id), self.config.timers.speech());
        }
        if speaking == was_speaking {
            return;
        }
        if speaking {
            self.speaking.insert(id);
        } else {
            self.speaking.remove(&id);
            self.timers.cancel(&TimerKind::Speech(id));
        }

        let frame = ServerMessage::Speech {
            index: id,
            speaking,
        }
        .encode();
        self.broadcast_masters(&frame);
        if self.info.params.universal_monitor {
            self.broadcast_data(&frame, None);
        }
    }

    fn on_text(&mut self, conn: ConnId, sender: &Sender, text: &str) -> Result<(), Violation> {
        let clean: String = text
            .chars()
            .filter(|c| !matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'))
            .collect();
        let text = truncate_chars(
            &format!("{}: {clean}", sender.nick),
            self.config.limits.text_length,
        );

        let floor = self.track_floor(sender.track);
        self.check_flood(conn, floor, text.len())?;

        let frame = ServerMessage::Text { text: text.clone() }.encode();
        self.broadcast_data(&frame, Some(conn));

        if self.mode.mode().persists_payload() {
            let now = self.clock.now_granule();
            self.write_meta(&MetaEvent::Text { text }, now);
        }
        Ok(())
    }

    fn on_caption(&mut self, conn: ConnId, sender: &Sender, json: &str) -> Result<(), Violation> {
        let caption: Value = serde_json::from_str(json).map_err(|_| Violation::InvalidCaption)?;

        let floor = self.track_floor(sender.track);
        self.check_flood(conn, floor, json.len())?;

        if self.mode.mode().persists_payload() {
            let now = self.clock.now_granule();
            self.write_meta(
                &MetaEvent::Caption {
                    id: sender.track,
                    caption,
                },
                now,
            );
        }
        Ok(())
    }

    fn on_participant_info(
        &mut self,
        sender: &Sender,
        key: u32,
        value: u32,
        extra: Bytes,
    ) -> Result<(), Violation> {
        match key {
            // Sent again whenever the client switches input device.
            SAMPLE_RATE if value != sender.sample_rate => Err(Violation::SampleRateChanged {
                expected: sender.sample_rate,
                got: value,
            }),
            SAMPLE_RATE => Ok(()),
            ALLOW_ADMIN | ADMIN_STATE => {
                let message = if key == ALLOW_ADMIN {
                    InfoMessage::AllowAdmin {
                        track: sender.track,
                        extra,
                    }
                } else {
                    InfoMessage::AdminState {
                        track: sender.track,
                        extra,
                    }
                };
                self.send_master(value, ServerMessage::Info(message).encode());
                Ok(())
            }
            other => Err(Violation::UnsupportedInfo {
                key: other,
                name: info_name(other),
            }),
        }
    }

    /// Forward a peer-addressed frame; dropped if nobody is on that track.
    fn relay(&self, target: TrackId, message: ServerMessage) {
        if let Some(conn) = self.tracks.connection(target) {
            self.send(conn, &message);
        }
    }

    fn track_floor(&self, id: TrackId) -> u64 {
        self.tracks.get(id).map_or(0, |track| track.last_granule)
    }
}

/// Clamp floor and page counter of a track or one of its sub-tracks.
fn stream_state(
    tracks: &mut TrackRegistry,
    id: TrackId,
    sub_id: Option<u32>,
) -> Option<(&mut u64, &mut u32)> {
    let track = tracks.get_mut(id)?;
    match sub_id {
        None => Some((&mut track.last_granule, &mut track.packet_no)),
        Some(sub_id) => {
            let sub = track.sub_tracks.get_mut(&sub_id)?;
            Some((&mut sub.last_granule, &mut sub.packet_no))
        }
    }
}
