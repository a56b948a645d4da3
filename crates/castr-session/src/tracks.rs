use std::collections::BTreeMap;

use castr_proto::DataFormat;
use serde::Serialize;

use crate::accounting::TierCounts;

/// Index of a track; 0 is the metadata stream.
pub type TrackId = u32;
/// Identifier of a live socket, unique for the life of the session.
pub type ConnId = u64;

/// Serial bit marking a sub-track stream.
pub const SUB_TRACK_FLAG: u32 = 0x8000_0000;

/// What makes two data logins the same participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackIdentity {
    pub nick: String,
    pub format: DataFormat,
    pub sample_rate: u32,
    pub continuous: bool,
}

#[derive(Debug, Clone)]
pub struct SubTrack {
    pub serial: u32,
    pub packet_no: u32,
    pub last_granule: u64,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub identity: TrackIdentity,
    /// Page sequence counter of the track's stream, headers included.
    pub packet_no: u32,
    /// Clamp floor for the next data packet.
    pub last_granule: u64,
    pub sub_tracks: BTreeMap<u32, SubTrack>,
    pub connection: Option<ConnId>,
    /// Counted for the next charge even if disconnected since.
    pub present: bool,
}

/// Result of a successful data login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    /// A new track was appended; its headers still need writing.
    Created(TrackId),
    /// An idle track with the same identity was taken over.
    Rejoined(TrackId),
}

impl Join {
    pub fn id(self) -> TrackId {
        match self {
            Self::Created(id) | Self::Rejoined(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("This recording is limited to {limit} tracks (users).")]
pub struct RegistryFull {
    pub limit: u32,
}

/// All participant tracks of the session, by index.
#[derive(Debug)]
pub struct TrackRegistry {
    /// `tracks[i]` is track `i + 1`.
    tracks: Vec<Track>,
    max_tracks: u32,
}

impl TrackRegistry {
    pub fn new(max_tracks: u32) -> Self {
        Self {
            tracks: Vec::new(),
            max_tracks,
        }
    }

    /// Bind `conn` to an idle track with this identity, or append a new one.
    pub fn join(
        &mut self,
        identity: TrackIdentity,
        conn: ConnId,
    ) -> std::result::Result<Join, RegistryFull> {
        if let Some(index) = self
            .tracks
            .iter()
            .position(|track| track.connection.is_none() && track.identity == identity)
        {
            let track = &mut self.tracks[index];
            track.connection = Some(conn);
            track.present = true;
            return Ok(Join::Rejoined(index as TrackId + 1));
        }

        if self.tracks.len() as u64 >= u64::from(self.max_tracks) {
            return Err(RegistryFull {
                limit: self.max_tracks,
            });
        }

        self.tracks.push(Track {
            identity,
            packet_no: 0,
            last_granule: 0,
            sub_tracks: BTreeMap::new(),
            connection: Some(conn),
            present: true,
        });
        Ok(Join::Created(self.tracks.len() as TrackId))
    }

    /// Unbind `conn` from track `id`. Returns `false` if it wasn't bound.
    pub fn release(&mut self, id: TrackId, conn: ConnId) -> bool {
        match self.get_mut(id) {
            Some(track) if track.connection == Some(conn) => {
                track.connection = None;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.tracks.get(index)
    }

    pub fn get_mut(&mut self, id: TrackId) -> Option<&mut Track> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.tracks.get_mut(index)
    }

    /// Connection bound to track `id`, if any.
    pub fn connection(&self, id: TrackId) -> Option<ConnId> {
        self.get(id).and_then(|track| track.connection)
    }

    /// Tracks with a live connection, in index order.
    pub fn live(&self) -> impl Iterator<Item = (TrackId, ConnId)> + '_ {
        self.iter()
            .filter_map(|(id, track)| track.connection.map(|conn| (id, conn)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(index, track)| (index as TrackId + 1, track))
    }

    /// Number of tracks ever registered.
    pub fn len(&self) -> u32 {
        self.tracks.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Look up or register sub-track `sub_id` of track `id`. The flag is
    /// `true` when the sub-track is new.
    pub fn sub_track(&mut self, id: TrackId, sub_id: u32) -> Option<(&mut SubTrack, bool)> {
        let track = self.get_mut(id)?;
        let created = !track.sub_tracks.contains_key(&sub_id);
        if created {
            let ordinal = track.sub_tracks.len() as u32;
            let serial = sub_track_serial(id, ordinal);
            track.sub_tracks.insert(
                sub_id,
                SubTrack {
                    serial,
                    packet_no: 0,
                    last_granule: 0,
                },
            );
        }
        let sub = track.sub_tracks.get_mut(&sub_id)?;
        Some((sub, created))
    }

    /// Count tracks by quality tier for charging. Tracks that were present
    /// since the last reset count even if disconnected; with `reset`,
    /// disconnected tracks stop counting from now on.
    pub fn tier_counts(&mut self, reset: bool) -> TierCounts {
        let mut counts = TierCounts::default();
        for track in &mut self.tracks {
            if !track.present && track.connection.is_none() {
                continue;
            }
            if reset && track.connection.is_none() {
                track.present = false;
            }
            if track.identity.format == DataFormat::Flac || track.identity.continuous {
                counts.hq += 1;
            } else {
                counts.basic += 1;
            }
        }
        counts
    }
}

/// Stream serial of the `ordinal`th sub-track of track `id`. The first
/// sub-track gets `id` with the high bit set.
pub fn sub_track_serial(id: TrackId, ordinal: u32) -> u32 {
    SUB_TRACK_FLAG | ((ordinal & 0x7fff) << 16) | (id & 0xffff)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(nick: &str) -> TrackIdentity {
        TrackIdentity {
            nick: nick.into(),
            format: DataFormat::Opus,
            sample_rate: 48_000,
            continuous: false,
        }
    }

    #[test]
    fn distinct_identities_get_new_tracks() {
        let mut registry = TrackRegistry::new(8);
        assert_eq!(registry.join(identity("a"), 1), Ok(Join::Created(1)));
        assert_eq!(registry.join(identity("b"), 2), Ok(Join::Created(2)));
        assert_eq!(registry.join(identity("c"), 3), Ok(Join::Created(3)));
        assert_eq!(registry.live().collect::<Vec<_>>(), vec![(1, 1), (2, 2), (3, 3)]);
    }

    #[test]
    fn rejoin_needs_idle_track_with_same_identity() {
        let mut registry = TrackRegistry::new(8);
        registry.join(identity("a"), 1).unwrap();
        registry.get_mut(1).unwrap().packet_no = 7;

        // Still connected: a second "a" is someone else.
        assert_eq!(registry.join(identity("a"), 2), Ok(Join::Created(2)));

        assert!(registry.release(1, 1));
        assert_eq!(registry.join(identity("a"), 3), Ok(Join::Rejoined(1)));
        assert_eq!(registry.get(1).unwrap().packet_no, 7);
        assert_eq!(registry.connection(1), Some(3));
    }

    #[test]
    fn any_differing_attribute_is_a_new_track() {
        let mut registry = TrackRegistry::new(8);
        registry.join(identity("a"), 1).unwrap();
        registry.release(1, 1);

        let mut flac = identity("a");
        flac.format = DataFormat::Flac;
        assert_eq!(registry.join(flac, 2), Ok(Join::Created(2)));

        let mut slow = identity("a");
        slow.sample_rate = 44_100;
        assert_eq!(registry.join(slow, 3), Ok(Join::Created(3)));

        let mut continuous = identity("a");
        continuous.continuous = true;
        assert_eq!(registry.join(continuous, 4), Ok(Join::Created(4)));
    }

    #[test]
    fn ceiling_applies_to_new_tracks_only() {
        let mut registry = TrackRegistry::new(2);
        registry.join(identity("a"), 1).unwrap();
        registry.join(identity("b"), 2).unwrap();
        assert_eq!(
            registry.join(identity("c"), 3),
            Err(RegistryFull { limit: 2 })
        );
        registry.release(2, 2);
        assert_eq!(registry.join(identity("b"), 4), Ok(Join::Rejoined(2)));
    }

    #[test]
    fn release_checks_owner() {
        let mut registry = TrackRegistry::new(2);
        registry.join(identity("a"), 1).unwrap();
        assert!(!registry.release(1, 99));
        assert!(!registry.release(5, 1));
        assert!(registry.release(1, 1));
        assert!(!registry.release(1, 1));
        assert!(registry.get(0).is_none());
    }

    #[test]
    fn sub_tracks_are_registered_once() {
        let mut registry = TrackRegistry::new(2);
        registry.join(identity("a"), 1).unwrap();

        let (sub, created) = registry.sub_track(1, 42).unwrap();
        assert!(created);
        assert_eq!(sub.serial, 0x8000_0001);
        sub.packet_no = 3;

        let (sub, created) = registry.sub_track(1, 42).unwrap();
        assert!(!created);
        assert_eq!(sub.packet_no, 3);

        let (sub, created) = registry.sub_track(1, -1i32 as u32).unwrap();
        assert!(created);
        assert_eq!(sub.serial, 0x8001_0001);

        assert!(registry.sub_track(2, 0).is_none());
    }

    #[test]
    fn tier_counts_reset_forgets_departed_tracks() {
        let mut registry = TrackRegistry::new(4);
        registry.join(identity("a"), 1).unwrap();
        let mut hq = identity("b");
        hq.format = DataFormat::Flac;
        registry.join(hq, 2).unwrap();
        registry.release(2, 2);

        assert_eq!(registry.tier_counts(false), TierCounts { hq: 1, basic: 1 });
        assert_eq!(registry.tier_counts(true), TierCounts { hq: 1, basic: 1 });
        assert_eq!(registry.tier_counts(true), TierCounts { hq: 0, basic: 1 });
    }
}
