use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use castr_ogg::{OggWriter, PageFlags};
use serde::Serialize;
use serde_json::Value;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::error::Result;
use crate::headers::{stream_headers, META_HEADER, META_TAGS};
use crate::params::RecordingInfo;
use crate::sink::{FileSink, SharedBuffer, Sink};
use crate::tracks::{TrackId, TrackIdentity};

/// Serial of the metadata stream.
pub const META_SERIAL: u32 = 0;

/// Paths of a recording's artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub header1: PathBuf,
    pub header2: PathBuf,
    pub data: PathBuf,
    pub users: PathBuf,
    pub info: PathBuf,
}

impl ArtifactPaths {
    pub fn new(dir: &Path, rid: u32) -> Self {
        let file = |suffix: &str| dir.join(format!("{rid}.ogg.{suffix}"));
        Self {
            header1: file("header1"),
            header2: file("header2"),
            data: file("data"),
            users: file("users"),
            info: file("info"),
        }
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.header1,
            &self.header2,
            &self.data,
            &self.users,
            &self.info,
        ]
    }

    pub fn any_exists(&self) -> bool {
        self.all().iter().any(|path| path.exists())
    }

    /// Delete every artifact that exists.
    pub fn remove(&self) -> io::Result<()> {
        for path in self.all() {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed artifact"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}

/// An event on the metadata stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "c", rename_all = "lowercase")]
pub enum MetaEvent {
    Start,
    Pause,
    Resume,
    Text {
        text: String,
    },
    Caption {
        id: TrackId,
        caption: Value,
    },
    Sound {
        sid: String,
        status: u8,
    },
    Subtrack {
        id: TrackId,
        #[serde(rename = "subId")]
        sub_id: i32,
    },
}

/// Line appended to `.info` when the recording finishes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub mode: u32,
    pub start_time_ms: f64,
    pub elapsed_ms: f64,
    pub tracks: u32,
    pub cost: Option<u32>,
}

/// The five sinks of one recording.
pub struct Sinks {
    pub header1: Sink,
    pub header2: Sink,
    pub data: Sink,
    pub users: Sink,
    pub info: Sink,
}

/// In-memory sinks, readable while the recorder owns clones of them.
#[derive(Debug, Clone, Default)]
pub struct MemorySinks {
    pub header1: SharedBuffer,
    pub header2: SharedBuffer,
    pub data: SharedBuffer,
    pub users: SharedBuffer,
    pub info: SharedBuffer,
}

impl MemorySinks {
    pub fn sinks(&self) -> Sinks {
        Sinks {
            header1: Box::new(self.header1.clone()),
            header2: Box::new(self.header2.clone()),
            data: Box::new(self.data.clone()),
            users: Box::new(self.users.clone()),
            info: Box::new(self.info.clone()),
        }
    }
}

/// Muxes every stream of a recording into its sinks.
///
/// `header1` gets the begin-of-stream page of every stream, `header2` its
/// second header page, `data` everything after, interleaved in arrival
/// order.
pub struct Recorder {
    header1: OggWriter<Sink>,
    header2: OggWriter<Sink>,
    data: OggWriter<Sink>,
    users: Sink,
    info: Sink,
    /// Page counter of the metadata stream once it exists.
    meta_packet_no: Option<u32>,
}

impl Recorder {
    pub fn new(sinks: Sinks) -> Self {
        Self {
            header1: OggWriter::new(sinks.header1).with_monotonic_granule(false),
            header2: OggWriter::new(sinks.header2).with_monotonic_granule(false),
            data: OggWriter::new(sinks.data),
            users: sinks.users,
            info: sinks.info,
            meta_packet_no: None,
        }
    }

    /// Create the artifact files, failing if any already exists.
    pub fn create(paths: &ArtifactPaths, tracker: &TaskTracker) -> Result<Self> {
        let open = |path: &PathBuf| -> Result<Sink> {
            let file = OpenOptions::new().write(true).create_new(true).open(path)?;
            Ok(Box::new(FileSink::spawn(tokio::fs::File::from_std(file), path.clone(), tracker)))
        };
        Ok(Self::new(Sinks {
            header1: open(&paths.header1)?,
            header2: open(&paths.header2)?,
            data: open(&paths.data)?,
            users: open(&paths.users)?,
            info: open(&paths.info)?,
        }))
    }

    /// Write the recording info and the users preamble.
    pub fn begin(&mut self, info: &RecordingInfo) -> Result<()> {
        serde_json::to_writer(&mut self.info, info)?;
        self.info.write_all(b"\n")?;
        self.users.write_all(b"\"0\":{}\n")?;
        Ok(())
    }

    /// Register a new track: users line plus its two header pages.
    pub fn open_track(
        &mut self,
        id: TrackId,
        identity: &TrackIdentity,
        packet_no: &mut u32,
    ) -> Result<()> {
        let mut line = format!(",\"{id}\":").into_bytes();
        serde_json::to_writer(&mut line, identity)?;
        line.push(b'\n');
        self.users.write_all(&line)?;

        let [head, tags] =
            stream_headers(identity.format, identity.sample_rate, identity.continuous);
        self.header1
            .write_packet(0, id, packet_no, &head, PageFlags::BEGIN)?;
        self.header2
            .write_packet(0, id, packet_no, &tags, PageFlags::NONE)?;
        Ok(())
    }

    /// Append one data packet.
    pub fn write_data(
        &mut self,
        granule_pos: u64,
        serial: u32,
        packet_no: &mut u32,
        packet: &[u8],
    ) -> Result<()> {
        self.data
            .write_packet(granule_pos, serial, packet_no, packet, PageFlags::NONE)?;
        Ok(())
    }

    /// Append a metadata event, opening the metadata stream on first use.
    pub fn write_meta(&mut self, event: &MetaEvent, granule_pos: u64) -> Result<()> {
        let body = serde_json::to_vec(event)?;
        let mut packet_no = match self.meta_packet_no {
            Some(packet_no) => packet_no,
            None => {
                let mut packet_no = 0;
                self.header1
                    .write_packet(0, META_SERIAL, &mut packet_no, META_HEADER, PageFlags::BEGIN)?;
                self.header2
                    .write_packet(0, META_SERIAL, &mut packet_no, META_TAGS, PageFlags::NONE)?;
                packet_no
            }
        };
        let result = self
            .data
            .write_packet(granule_pos, META_SERIAL, &mut packet_no, &body, PageFlags::NONE);
        self.meta_packet_no = Some(packet_no);
        result?;
        Ok(())
    }

    pub fn append_summary(&mut self, summary: &RecordingSummary) -> Result<()> {
        serde_json::to_writer(&mut self.info, summary)?;
        self.info.write_all(b"\n")?;
        Ok(())
    }

    /// Granule position of the last data page.
    pub fn last_granule(&self) -> u64 {
        self.data.last_granule()
    }

    /// Flush and release every sink.
    pub fn close(mut self) {
        for result in [
            self.header1.flush(),
            self.header2.flush(),
            self.data.flush(),
        ] {
            if let Err(err) = result {
                warn!(error = %err, "flushing container sink failed");
            }
        }
        for result in [self.users.flush(), self.info.flush()] {
            if let Err(err) = result {
                warn!(error = %err, "flushing sink failed");
            }
        }
    }
}
