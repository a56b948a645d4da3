//! Append-only byte sinks behind `std::io::Write`.
//!
//! The container writer is synchronous; [`FileSink`] hands every write to a
//! background task owning the file, so the session never blocks on disk.
//! Chunks queued before the sink is dropped are still written.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::task::TaskTracker;
use tracing::{debug, error};

/// Any sink the recorder can own.
pub type Sink = Box<dyn Write + Send>;

/// Writes to a file from a tracked background task.
#[derive(Debug)]
pub struct FileSink {
    tx: mpsc::UnboundedSender<Bytes>,
}

impl FileSink {
    /// Start the writer task for `file`.
    pub fn spawn(file: tokio::fs::File, path: PathBuf, tracker: &TaskTracker) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();
        tracker.spawn(async move {
            let mut file = file;
            let mut written = 0u64;
            while let Some(chunk) = rx.recv().await {
                if let Err(err) = file.write_all(&chunk).await {
                    error!(path = %path.display(), error = %err, "sink write failed");
                    return;
                }
                written += chunk.len() as u64;
            }
            if let Err(err) = file.flush().await {
                error!(path = %path.display(), error = %err, "sink flush failed");
                return;
            }
            if let Err(err) = file.sync_all().await {
                error!(path = %path.display(), error = %err, "sink sync failed");
                return;
            }
            debug!(path = %path.display(), written, "sink closed");
        });
        Self { tx }
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "sink writer has stopped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// In-memory sink whose contents stay readable after it is handed over.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> Vec<u8> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
