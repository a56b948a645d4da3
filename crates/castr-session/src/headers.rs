//! Fixed header packets written when a stream joins.
//!
//! Every stream gets two header packets: the first goes to `header1` on a
//! begin-of-stream page, the second to `header2`. Both carry granule 0.

use castr_proto::DataFormat;

/// Prefix of the first header of a continuous stream.
pub const VAD_HEADER: &[u8] = &[
    0x45, 0x43, 0x56, 0x41, 0x44, 0x44, // "ECVADD"
    0x03, 0x00, 0x00, 0x03, 0x01,
];

/// OpusHead: version 1, mono, 312 samples pre-skip, 48 kHz.
pub const OPUS_HEAD: &[u8] = &[
    0x4F, 0x70, 0x75, 0x73, 0x48, 0x65, 0x61, 0x64, // "OpusHead"
    0x01, 0x01, 0x38, 0x01, 0x80, 0xBB, 0x00, 0x00, 0x00, 0x00, 0x00,
];

pub const OPUS_TAGS: &[u8] = &[
    0x4F, 0x70, 0x75, 0x73, 0x54, 0x61, 0x67, 0x73, // "OpusTags"
    0x0A, 0x00, 0x00, 0x00, b'e', b'n', b'n', b'u', b'i', b'c', b'a', b's', b't', b'r',
];

/// Ogg FLAC mapping header carrying a 48 kHz STREAMINFO block.
pub const FLAC_HEADER_48K: &[u8] = &[
    0x7F, 0x46, 0x4C, 0x41, 0x43, 0x01, 0x00, 0x00, 0x03, 0x66, 0x4C, 0x61, 0x43, 0x00, 0x00,
    0x00, 0x22, 0x03, 0xC0, 0x03, 0xC0, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0B, 0xB8, 0x01,
    0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// As [`FLAC_HEADER_48K`] at 44.1 kHz.
pub const FLAC_HEADER_44K: &[u8] = &[
    0x7F, 0x46, 0x4C, 0x41, 0x43, 0x01, 0x00, 0x00, 0x03, 0x66, 0x4C, 0x61, 0x43, 0x00, 0x00,
    0x00, 0x22, 0x03, 0x72, 0x03, 0x72, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x0A, 0xC4, 0x41,
    0x70, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// VORBIS_COMMENT metadata block, marked last.
pub const FLAC_TAGS: &[u8] = &[
    0x04, 0x00, 0x00, 0x41, 0x0A, 0x00, 0x00, 0x00, b'e', b'n', b'n', b'u', b'i', b'c', b'a',
    b's', b't', b'r',
];

/// Headers of the metadata stream (serial 0).
pub const META_HEADER: &[u8] = &[0x45, 0x43, 0x4d, 0x45, 0x54, 0x41, 0x00, 0x00]; // "ECMETA"
pub const META_TAGS: &[u8] = &[0x00, 0x00];

/// The two header packets of a participant stream.
pub fn stream_headers(format: DataFormat, sample_rate: u32, continuous: bool) -> [Vec<u8>; 2] {
    let (head, tags) = match format {
        DataFormat::Opus => (OPUS_HEAD, OPUS_TAGS),
        DataFormat::Flac if sample_rate == 44_100 => (FLAC_HEADER_44K, FLAC_TAGS),
        DataFormat::Flac => (FLAC_HEADER_48K, FLAC_TAGS),
    };
    let mut first = Vec::with_capacity(VAD_HEADER.len() + head.len());
    if continuous {
        first.extend_from_slice(VAD_HEADER);
    }
    first.extend_from_slice(head);
    [first, tags.to_vec()]
}
