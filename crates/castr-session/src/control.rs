//! Line-oriented JSON channel to the parent process.
//!
//! The parent sends one `{"c":"info","r":{...}}` line with the recording
//! parameters; the session answers with one `{"c":"ready","r":{...}}` line
//! once it is listening.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{Result, SessionError};
use crate::params::{RecordingInfo, RecordingParams};

const STARTUP_COMMAND: &str = "info";
const READY_COMMAND: &str = "ready";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    c: String,
    r: T,
}

/// Read lines until the start-up message arrives.
///
/// Blank lines and messages with another command are skipped.
pub async fn read_startup<R>(mut reader: R) -> Result<RecordingParams>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            return Err(SessionError::InvalidStartup(
                "control channel closed before start-up message".into(),
            ));
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let envelope: Envelope<Value> = serde_json::from_str(trimmed)
            .map_err(|err| SessionError::InvalidStartup(err.to_string()))?;
        if envelope.c != STARTUP_COMMAND {
            debug!(command = %envelope.c, "ignoring control message");
            continue;
        }
        return serde_json::from_value(envelope.r)
            .map_err(|err| SessionError::InvalidStartup(err.to_string()));
    }
}

/// The readiness message, without trailing newline.
pub fn ready_line(info: &RecordingInfo) -> Result<String> {
    Ok(serde_json::to_string(&Envelope {
        c: READY_COMMAND.to_owned(),
        r: info,
    })?)
}

pub async fn write_ready<W>(mut writer: W, info: &RecordingInfo) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = ready_line(info)?;
    line.push('\n');
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
