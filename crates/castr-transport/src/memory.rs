use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::traits::{AcceptedSocket, Inbound, MessageSink, MessageSource, Outbound};

struct MemorySource {
    rx: mpsc::UnboundedReceiver<Inbound>,
}

#[async_trait]
impl MessageSource for MemorySource {
    async fn recv(&mut self) -> Option<Result<Inbound>> {
        self.rx.recv().await.map(Ok)
    }
}

struct MemorySink {
    tx: Option<mpsc::UnboundedSender<Outbound>>,
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn send(&mut self, message: Outbound) -> Result<()> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        let closing = message == Outbound::Close;
        tx.send(message).map_err(|_| TransportError::Closed)?;
        if closing {
            self.tx = None;
        }
        Ok(())
    }
}

/// Client end of an in-memory socket.
pub struct MemoryClient {
    tx: Option<mpsc::UnboundedSender<Inbound>>,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl MemoryClient {
    /// Send one frame to the server. Returns `false` once the server side
    /// has stopped reading.
    pub fn send(&self, frame: impl Into<Bytes>) -> bool {
        self.push(Inbound::Frame(frame.into()))
    }

    /// Answer a transport-level ping.
    pub fn pong(&self) -> bool {
        self.push(Inbound::Pong)
    }

    fn push(&self, message: Inbound) -> bool {
        self.tx.as_ref().is_some_and(|tx| tx.send(message).is_ok())
    }

    /// Hang up; the server sees end of stream.
    pub fn disconnect(&mut self) {
        self.tx = None;
    }

    /// Next message from the server, or `None` once the server has dropped
    /// its end.
    pub async fn recv(&mut self) -> Option<Outbound> {
        self.rx.recv().await
    }

    /// Next message if one is already queued.
    pub fn try_recv(&mut self) -> Option<Outbound> {
        self.rx.try_recv().ok()
    }

    /// Every frame currently queued, skipping pings. Stops after a close.
    pub fn drain_frames(&mut self) -> Vec<Bytes> {
        let mut frames = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            match message {
                Outbound::Frame(bytes) => frames.push(bytes),
                Outbound::Ping => {}
                Outbound::Close => break,
            }
        }
        frames
    }
}

/// Build a connected in-memory socket pair.
pub fn memory_socket(origin: &str, user_agent: &str) -> (AcceptedSocket, MemoryClient) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let socket = AcceptedSocket {
        source: Box::new(MemorySource { rx: in_rx }),
        sink: Box::new(MemorySink { tx: Some(out_tx) }),
        origin: origin.to_owned(),
        user_agent: user_agent.to_owned(),
    };
    let client = MemoryClient {
        tx: Some(in_tx),
        rx: out_rx,
    };
    (socket, client)
}
