/// Errors that can occur while encoding or decoding container pages.
#[derive(Debug, thiserror::Error)]
pub enum OggError {
    /// The page does not start with the `OggS` capture pattern.
    #[error("invalid capture pattern (expected \"OggS\")")]
    InvalidCapture,

    /// The page declares a stream structure version other than 0.
    #[error("unsupported page version {0}")]
    UnsupportedVersion(u8),

    /// The stored checksum does not match the page contents.
    #[error("page checksum mismatch (stored {stored:#010x}, computed {computed:#010x})")]
    ChecksumMismatch { stored: u32, computed: u32 },

    /// A page flagged as continuation arrived for a stream with no open packet.
    #[error("continuation page for stream {serial:#x} without a pending packet")]
    OrphanContinuation { serial: u32 },

    /// The underlying sink or source failed.
    #[error("container I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The source ended in the middle of a page.
    #[error("truncated page at end of input")]
    Truncated,
}

pub type Result<T> = std::result::Result<T, OggError>;
