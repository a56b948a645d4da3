use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::error::{OggError, Result};
use crate::page::{decode_page, Page};

const INITIAL_BUFFER_CAPACITY: usize = 64 * 1024;
const READ_CHUNK_SIZE: usize = 16 * 1024;

/// Reads checksum-verified pages from any `Read` source.
///
/// Handles partial reads internally; callers always get complete pages.
pub struct PageReader<R> {
    inner: R,
    buf: BytesMut,
    offset: u64,
    /// Set once iteration has yielded an error; the iterator is fused after it.
    failed: bool,
}

impl<R: Read> PageReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            offset: 0,
            failed: false,
        }
    }

    /// Read the next page.
    ///
    /// Returns `Ok(None)` at a clean end of input and
    /// `Err(OggError::Truncated)` if input ends inside a page.
    pub fn read_page(&mut self) -> Result<Option<Page>> {
        loop {
            if let Some(page) = decode_page(&mut self.buf)? {
                self.offset += page.wire_size() as u64;
                return Ok(Some(page));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(OggError::Io(err)),
            };

            if read == 0 {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(OggError::Truncated)
                };
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Byte offset of the next page in the source.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Iterator for PageReader<R> {
    type Item = Result<Page>;

    /// Yields at most one error: a bad page stays in the buffer, so
    /// iteration stops there instead of reporting it again.
    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self.read_page().transpose();
        if matches!(item, Some(Err(_))) {
            self.failed = true;
        }
        item
    }
}
