use std::ops::{BitOr, BitOrAssign};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::crc;
use crate::error::{OggError, Result};

/// Fixed page header: capture (4) + version (1) + flags (1) + granule (8) +
/// serial (4) + sequence (4) + checksum (4) + segment count (1) = 27 bytes.
pub const HEADER_SIZE: usize = 27;

/// Capture pattern: "OggS".
pub const CAPTURE_PATTERN: [u8; 4] = *b"OggS";

/// The only stream structure version defined by the format.
pub const VERSION: u8 = 0;

/// Maximum lacing entries per page.
pub const MAX_SEGMENTS: usize = 255;

/// Maximum body bytes per page.
pub const MAX_PAGE_BODY: usize = MAX_SEGMENTS * 255;

const CHECKSUM_OFFSET: usize = 22;

/// Page header flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PageFlags(u8);

impl PageFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The first packet on this page continues one from the previous page.
    pub const CONTINUED: Self = Self(0x01);
    /// First page of a logical stream.
    pub const BEGIN: Self = Self(0x02);
    /// Last page of a logical stream.
    pub const END: Self = Self(0x04);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersection(self, other: Self) -> Self {
        Self(self.0 & other.0)
    }
}

impl BitOr for PageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PageFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Header fields the caller chooses for a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHeader {
    pub flags: PageFlags,
    pub granule_pos: u64,
    pub serial: u32,
    pub sequence: u32,
}

/// A decoded, checksum-verified page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub header: PageHeader,
    /// Checksum as stored in the page.
    pub checksum: u32,
    /// Lacing table.
    pub lacing: Vec<u8>,
    /// Page body (concatenated segments).
    pub body: Bytes,
}

impl Page {
    /// The total wire size of this page.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.lacing.len() + self.body.len()
    }

    /// Whether the last packet on this page is complete.
    pub fn ends_packet(&self) -> bool {
        self.lacing.last().is_some_and(|&last| last < 255)
    }
}

/// Lacing values for a packet of `len` bytes: one 255 for every full segment
/// followed by the terminating remainder (which may be 0).
pub fn lacing_values(len: usize) -> Vec<u8> {
    let mut lacing = vec![255u8; len / 255];
    lacing.push((len % 255) as u8);
    lacing
}

/// Encode one page into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────┬─────┬───────┬──────────┬────────┬──────────┬──────────┬──────┬─────────┬──────┐
/// │ "OggS"   │ ver │ flags │ granule  │ serial │ sequence │ checksum │ nseg │ lacing  │ body │
/// │ (4B)     │(1B) │ (1B)  │ (8B LE)  │(4B LE) │ (4B LE)  │ (4B LE)  │ (1B) │ (nseg)  │      │
/// └──────────┴─────┴───────┴──────────┴────────┴──────────┴──────────┴──────┴─────────┴──────┘
/// ```
///
/// `lacing` must have at most [`MAX_SEGMENTS`] entries summing to `body.len()`.
pub fn encode_page(header: &PageHeader, lacing: &[u8], body: &[u8], dst: &mut BytesMut) {
    debug_assert!(lacing.len() <= MAX_SEGMENTS);
    debug_assert_eq!(
        lacing.iter().map(|&v| usize::from(v)).sum::<usize>(),
        body.len()
    );

    let start = dst.len();
    dst.reserve(HEADER_SIZE + lacing.len() + body.len());
    dst.put_slice(&CAPTURE_PATTERN);
    dst.put_u8(VERSION);
    dst.put_u8(header.flags.bits());
    dst.put_u64_le(header.granule_pos);
    dst.put_u32_le(header.serial);
    dst.put_u32_le(header.sequence);
    dst.put_u32_le(0);
    dst.put_u8(lacing.len() as u8);
    dst.put_slice(lacing);
    dst.put_slice(body);

    let checksum = crc::checksum(&dst[start..]);
    let at = start + CHECKSUM_OFFSET;
    dst[at..at + 4].copy_from_slice(&checksum.to_le_bytes());
}

/// Decode one page from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete page yet.
/// On success, consumes the page bytes from the buffer. A page that fails
/// validation is left in the buffer.
pub fn decode_page(src: &mut BytesMut) -> Result<Option<Page>> {
    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    if src[0..4] != CAPTURE_PATTERN {
        return Err(OggError::InvalidCapture);
    }
    if src[4] != VERSION {
        return Err(OggError::UnsupportedVersion(src[4]));
    }

    let segments = usize::from(src[26]);
    if src.len() < HEADER_SIZE + segments {
        return Ok(None);
    }
    let lacing = src[HEADER_SIZE..HEADER_SIZE + segments].to_vec();
    let body_len: usize = lacing.iter().map(|&v| usize::from(v)).sum();
    let total = HEADER_SIZE + segments + body_len;
    if src.len() < total {
        return Ok(None);
    }

    let mut stored = [0u8; 4];
    stored.copy_from_slice(&src[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4]);
    let stored = u32::from_le_bytes(stored);
    let computed = crc::update(
        crc::update(crc::checksum(&src[..CHECKSUM_OFFSET]), &[0; 4]),
        &src[CHECKSUM_OFFSET + 4..total],
    );
    if stored != computed {
        return Err(OggError::ChecksumMismatch { stored, computed });
    }

    let mut head = src.split_to(total);
    head.advance(5);
    let flags = PageFlags::from_bits(head.get_u8());
    let granule_pos = head.get_u64_le();
    let serial = head.get_u32_le();
    let sequence = head.get_u32_le();
    head.advance(4 + 1 + segments);

    Ok(Some(Page {
        header: PageHeader {
            flags,
            granule_pos,
            serial,
            sequence,
        },
        checksum: stored,
        lacing,
        body: head.freeze(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(sequence: u32) -> PageHeader {
        PageHeader {
            flags: PageFlags::BEGIN,
            granule_pos: 48_000,
            serial: 7,
            sequence,
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let body = b"OpusHead-ish";
        let mut buf = BytesMut::new();
        encode_page(&header(0), &lacing_values(body.len()), body, &mut buf);

        assert_eq!(buf.len(), HEADER_SIZE + 1 + body.len());

        let page = decode_page(&mut buf).unwrap().unwrap();
        assert_eq!(page.header, header(0));
        assert_eq!(page.lacing, vec![body.len() as u8]);
        assert_eq!(page.body.as_ref(), body);
        assert!(page.ends_packet());
        assert!(buf.is_empty());
    }

    #[test]
    fn lacing_for_exact_multiple_has_zero_terminator() {
        assert_eq!(lacing_values(0), vec![0]);
        assert_eq!(lacing_values(254), vec![254]);
        assert_eq!(lacing_values(255), vec![255, 0]);
        assert_eq!(lacing_values(600), vec![255, 255, 90]);
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&b"OggS\0"[..]);
        assert!(decode_page(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_incomplete_body() {
        let mut buf = BytesMut::new();
        encode_page(&header(1), &[5], b"hello", &mut buf);
        buf.truncate(buf.len() - 2);
        assert!(decode_page(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_invalid_capture() {
        let mut buf = BytesMut::from(&[0u8; HEADER_SIZE][..]);
        assert!(matches!(
            decode_page(&mut buf),
            Err(OggError::InvalidCapture)
        ));
    }

    #[test]
    fn single_bit_flip_fails_checksum() {
        let mut clean = BytesMut::new();
        encode_page(&header(3), &[11], b"hello world", &mut clean);

        for byte in 0..clean.len() {
            // Flipping the capture pattern or version is reported differently.
            if byte < 5 {
                continue;
            }
            let mut corrupted = clean.clone();
            corrupted[byte] ^= 0x10;
            let result = decode_page(&mut corrupted);
            assert!(
                result.is_err() || result.as_ref().is_ok_and(|page| page.is_none()),
                "flip at byte {byte} went unnoticed"
            );
        }
    }

    #[test]
    fn checksum_flip_in_body_is_mismatch() {
        let mut buf = BytesMut::new();
        encode_page(&header(3), &[4], b"data", &mut buf);
        let last = buf.len() - 1;
        buf[last] ^= 0x01;
        assert!(matches!(
            decode_page(&mut buf),
            Err(OggError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn multiple_pages() {
        let mut buf = BytesMut::new();
        encode_page(&header(0), &[3], b"one", &mut buf);
        encode_page(&header(1), &[3], b"two", &mut buf);

        let first = decode_page(&mut buf).unwrap().unwrap();
        let second = decode_page(&mut buf).unwrap().unwrap();
        assert_eq!(first.header.sequence, 0);
        assert_eq!(second.header.sequence, 1);
        assert_eq!(second.body.as_ref(), b"two");
        assert!(buf.is_empty());
    }

    #[test]
    fn flags_compose() {
        let flags = PageFlags::BEGIN | PageFlags::END;
        assert!(flags.contains(PageFlags::BEGIN));
        assert!(flags.contains(PageFlags::END));
        assert!(!flags.contains(PageFlags::CONTINUED));
        assert_eq!(flags.bits(), 0x06);
    }
}
