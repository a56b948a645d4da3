use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::error::{OggError, Result};
use crate::page::{encode_page, lacing_values, PageFlags, PageHeader, MAX_SEGMENTS};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Appends packets as pages to any `Write` sink.
///
/// One writer owns one sink. Granule positions are clamped so that they never
/// regress relative to the previous page written to this sink, whatever
/// stream that page belonged to.
pub struct OggWriter<W> {
    inner: W,
    buf: BytesMut,
    last_granule: u64,
    monotonic: bool,
}

impl<W: Write> OggWriter<W> {
    /// Create a new writer with sink-wide granule clamping enabled.
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            last_granule: 0,
            monotonic: true,
        }
    }

    /// Enable or disable the sink-wide granule clamp.
    ///
    /// The header sinks disable it: every stream's leading pages carry
    /// granule 0 regardless of when the stream joined.
    pub fn with_monotonic_granule(mut self, monotonic: bool) -> Self {
        self.monotonic = monotonic;
        self
    }

    /// Encode `data` as one packet and append it.
    ///
    /// `sequence` is the stream's page counter; it is used for the first page
    /// and advanced once per page written. `flags` may carry
    /// [`PageFlags::BEGIN`] (applied to the first page) and
    /// [`PageFlags::END`] (applied to the last page); continuation is decided
    /// here. Returns the number of pages written.
    pub fn write_packet(
        &mut self,
        granule_pos: u64,
        serial: u32,
        sequence: &mut u32,
        data: &[u8],
        flags: PageFlags,
    ) -> Result<usize> {
        let granule_pos = if self.monotonic {
            granule_pos.max(self.last_granule)
        } else {
            granule_pos
        };

        let lacing = lacing_values(data.len());
        let chunks = lacing.chunks(MAX_SEGMENTS);
        let count = chunks.len();

        self.buf.clear();
        let mut offset = 0usize;
        for (index, segments) in chunks.enumerate() {
            let mut page_flags = PageFlags::NONE;
            if index == 0 {
                page_flags |= flags.intersection(PageFlags::BEGIN);
            } else {
                page_flags |= PageFlags::CONTINUED;
            }
            if index + 1 == count {
                page_flags |= flags.intersection(PageFlags::END);
            }

            let len: usize = segments.iter().map(|&v| usize::from(v)).sum();
            let header = PageHeader {
                flags: page_flags,
                granule_pos,
                serial,
                sequence: *sequence,
            };
            encode_page(&header, segments, &data[offset..offset + len], &mut self.buf);
            offset += len;
            *sequence = sequence.wrapping_add(1);
        }

        self.write_all_buffered()?;
        self.last_granule = self.last_granule.max(granule_pos);
        tracing::trace!(serial, granule_pos, pages = count, bytes = data.len(), "packet written");
        Ok(count)
    }

    fn write_all_buffered(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(OggError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(OggError::Io(err)),
            }
        }
        Ok(())
    }

    /// Flush the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(OggError::Io(err)),
            }
        }
    }

    /// Highest granule position written so far.
    pub fn last_granule(&self) -> u64 {
        self.last_granule
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}
