//! Ogg page multiplexing for recording sinks.
//!
//! Every packet handed to [`OggWriter`] becomes one page (or a run of
//! continuation pages when it exceeds 255 × 255 bytes) with:
//! - the `OggS` capture pattern and format version 0
//! - a 64-bit granule position, a 32-bit stream serial and page sequence number
//! - a CRC32 over the whole page, computed with the checksum field zeroed
//! - a lacing table describing how the body splits into packets
//!
//! Pages are written incrementally; nothing is buffered beyond the page being
//! encoded, so sinks can grow without bound.

pub mod crc;
pub mod error;
pub mod packet;
pub mod page;
pub mod reader;
pub mod summary;
pub mod writer;

pub use error::{OggError, Result};
pub use packet::{Packet, PacketAssembler};
pub use page::{
    decode_page, encode_page, lacing_values, Page, PageFlags, PageHeader, CAPTURE_PATTERN,
    HEADER_SIZE, MAX_PAGE_BODY, MAX_SEGMENTS,
};
pub use reader::PageReader;
pub use summary::{summarize, StreamSummary};
pub use writer::OggWriter;
