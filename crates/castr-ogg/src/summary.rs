use std::io::Read;

use crate::error::Result;
use crate::packet::PacketAssembler;
use crate::page::PageFlags;
use crate::reader::PageReader;

/// Per-stream statistics gathered from a container file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    pub serial: u32,
    pub pages: u64,
    pub packets: u64,
    pub bytes: u64,
    pub first_sequence: u32,
    pub last_sequence: u32,
    /// Pages whose sequence number did not follow the previous one by 1.
    pub sequence_gaps: u64,
    /// Whether the stream's first page carried the begin flag.
    pub begins: bool,
    pub last_granule: u64,
    /// The input ended while one of this stream's packets was still open.
    pub truncated: bool,
}

impl StreamSummary {
    fn new(serial: u32, sequence: u32, begins: bool) -> Self {
        Self {
            serial,
            pages: 0,
            packets: 0,
            bytes: 0,
            first_sequence: sequence,
            last_sequence: sequence,
            sequence_gaps: 0,
            begins,
            last_granule: 0,
            truncated: false,
        }
    }

    pub fn is_contiguous(&self) -> bool {
        self.sequence_gaps == 0
    }
}

/// Read every page, verifying checksums and per-stream sequence continuity.
///
/// Streams are returned in order of first appearance.
pub fn summarize<R: Read>(mut reader: PageReader<R>) -> Result<Vec<StreamSummary>> {
    let mut streams: Vec<StreamSummary> = Vec::new();
    let mut assembler = PacketAssembler::new();

    while let Some(page) = reader.read_page()? {
        let header = page.header;
        let index = match streams.iter().position(|s| s.serial == header.serial) {
            Some(index) => {
                let stream = &mut streams[index];
                if header.sequence != stream.last_sequence.wrapping_add(1) {
                    stream.sequence_gaps += 1;
                }
                index
            }
            None => {
                streams.push(StreamSummary::new(
                    header.serial,
                    header.sequence,
                    header.flags.contains(PageFlags::BEGIN),
                ));
                streams.len() - 1
            }
        };

        let packets = assembler.push(&page)?;
        let stream = &mut streams[index];
        stream.pages += 1;
        stream.packets += packets.len() as u64;
        stream.bytes += page.body.len() as u64;
        stream.last_sequence = header.sequence;
        stream.last_granule = header.granule_pos;
    }

    for serial in assembler.unfinished() {
        if let Some(stream) = streams.iter_mut().find(|s| s.serial == serial) {
            stream.truncated = true;
        }
    }
    Ok(streams)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::BytesMut;

    use super::*;
    use crate::page::{encode_page, PageHeader};
    use crate::writer::OggWriter;

    #[test]
    fn summarizes_interleaved_streams() {
        let mut writer = OggWriter::new(Vec::new());
        let (mut a, mut b) = (0, 0);
        writer
            .write_packet(0, 10, &mut a, b"head-a", PageFlags::BEGIN)
            .unwrap();
        writer
            .write_packet(0, 20, &mut b, b"head-b", PageFlags::BEGIN)
            .unwrap();
        writer
            .write_packet(960, 10, &mut a, b"a1", PageFlags::NONE)
            .unwrap();
        writer
            .write_packet(1920, 10, &mut a, b"a2", PageFlags::NONE)
            .unwrap();

        let streams = summarize(PageReader::new(Cursor::new(writer.into_inner()))).unwrap();
        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].serial, 10);
        assert_eq!(streams[0].pages, 3);
        assert_eq!(streams[0].packets, 3);
        assert_eq!(streams[0].last_granule, 1920);
        assert!(streams[0].begins);
        assert!(streams[0].is_contiguous());
        assert!(!streams[0].truncated);
        assert_eq!(streams[1].serial, 20);
        assert_eq!(streams[1].pages, 1);
    }

    #[test]
    fn detects_sequence_gap() {
        let mut writer = OggWriter::new(Vec::new());
        let mut seq = 0;
        writer
            .write_packet(0, 1, &mut seq, b"x", PageFlags::BEGIN)
            .unwrap();
        seq += 3;
        writer
            .write_packet(0, 1, &mut seq, b"y", PageFlags::NONE)
            .unwrap();

        let streams = summarize(PageReader::new(Cursor::new(writer.into_inner()))).unwrap();
        assert_eq!(streams[0].sequence_gaps, 1);
        assert!(!streams[0].is_contiguous());
    }

    #[test]
    fn empty_input_has_no_streams() {
        let streams = summarize(PageReader::new(Cursor::new(Vec::new()))).unwrap();
        assert!(streams.is_empty());
    }

    #[test]
    fn flags_stream_that_ends_mid_packet() {
        let mut buf = BytesMut::new();
        let header = PageHeader {
            flags: PageFlags::BEGIN,
            granule_pos: 0,
            serial: 9,
            sequence: 0,
        };
        encode_page(&header, &[255], &[0x11; 255], &mut buf);

        let streams = summarize(PageReader::new(Cursor::new(buf.to_vec()))).unwrap();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].packets, 0);
        assert!(streams[0].truncated);
    }
}
