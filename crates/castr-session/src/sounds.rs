use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;

use crate::config::SoundEntry;

#[derive(Serialize)]
struct ListEntry<'a> {
    i: &'a str,
    u: &'a str,
    n: &'a str,
}

/// Sounds masters can trigger, and the ones currently playing.
#[derive(Debug, Default)]
pub struct SoundBoard {
    catalog: Vec<SoundEntry>,
    /// Encoded `sound` frames of playing sounds, for late joiners.
    playing: BTreeMap<String, Bytes>,
}

impl SoundBoard {
    pub fn new(catalog: Vec<SoundEntry>) -> Self {
        Self {
            catalog,
            playing: BTreeMap::new(),
        }
    }

    /// The catalog as sent to masters; `None` when there is nothing to offer.
    pub fn list_json(&self) -> Option<String> {
        if self.catalog.is_empty() {
            return None;
        }
        let list: Vec<ListEntry<'_>> = self
            .catalog
            .iter()
            .map(|entry| ListEntry {
                i: &entry.id,
                u: &entry.url,
                n: &entry.name,
            })
            .collect();
        serde_json::to_string(&list).ok()
    }

    pub fn lookup(&self, id: &str) -> Option<&SoundEntry> {
        self.catalog.iter().find(|entry| entry.id == id)
    }

    /// Remember a playing sound. Returns how long it plays.
    pub fn start(&mut self, id: &str, frame: Bytes) -> Option<Duration> {
        let entry = self.lookup(id)?;
        let duration = Duration::try_from_secs_f64(entry.duration_secs).unwrap_or_default();
        self.playing.insert(id.to_owned(), frame);
        Some(duration)
    }

    /// Forget a sound, whether stopped or expired.
    pub fn stop(&mut self, id: &str) -> bool {
        self.playing.remove(id).is_some()
    }

    pub fn playing(&self) -> impl Iterator<Item = &Bytes> {
        self.playing.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> SoundBoard {
        SoundBoard::new(vec![
            SoundEntry {
                id: "7".into(),
                url: "sound/7.webm".into(),
                name: "Applause".into(),
                duration_secs: 3.5,
            },
            SoundEntry {
                id: "8".into(),
                url: "sound/8.webm".into(),
                name: "Bell".into(),
                duration_secs: -1.0,
            },
        ])
    }

    #[test]
    fn list_uses_short_keys() {
        assert_eq!(
            board().list_json().unwrap(),
            r#"[{"i":"7","u":"sound/7.webm","n":"Applause"},{"i":"8","u":"sound/8.webm","n":"Bell"}]"#
        );
        assert_eq!(SoundBoard::default().list_json(), None);
    }

    #[test]
    fn playing_sounds_are_remembered_until_stopped() {
        let mut board = board();
        assert_eq!(
            board.start("7", Bytes::from_static(b"frame")),
            Some(Duration::from_millis(3500))
        );
        assert_eq!(board.playing().count(), 1);
        assert!(board.stop("7"));
        assert!(!board.stop("7"));
        assert_eq!(board.playing().count(), 0);
    }

    #[test]
    fn unknown_or_bad_durations() {
        let mut board = board();
        assert_eq!(board.start("nope", Bytes::new()), None);
        assert_eq!(board.start("8", Bytes::new()), Some(Duration::ZERO));
    }
}
