use std::net::SocketAddr;

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::{header, HeaderMap},
    response::IntoResponse,
    Router,
};
use bytes::Bytes;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{AcceptedSocket, Inbound, MessageSink, MessageSource, Outbound};

/// Receiving half of an upgraded WebSocket.
pub struct WsSource {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl MessageSource for WsSource {
    async fn recv(&mut self) -> Option<Result<Inbound>> {
        loop {
            let message = match self.inner.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(TransportError::WebSocket(err.to_string()))),
            };
            match message {
                Message::Binary(bytes) => return Some(Ok(Inbound::Frame(bytes))),
                Message::Text(text) => {
                    return Some(Ok(Inbound::Frame(Bytes::copy_from_slice(
                        text.as_str().as_bytes(),
                    ))))
                }
                Message::Pong(_) => return Some(Ok(Inbound::Pong)),
                // Answered by the WebSocket layer itself.
                Message::Ping(_) => continue,
                Message::Close(_) => return None,
            }
        }
    }
}

/// Sending half of an upgraded WebSocket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl MessageSink for WsSink {
    async fn send(&mut self, message: Outbound) -> Result<()> {
        let result = match message {
            Outbound::Frame(bytes) => self.inner.send(Message::Binary(bytes)).await,
            Outbound::Ping => self.inner.send(Message::Ping(Bytes::new())).await,
            Outbound::Close => {
                let _ = self.inner.send(Message::Close(None)).await;
                self.inner.close().await
            }
        };
        result.map_err(|err| TransportError::WebSocket(err.to_string()))
    }
}

#[derive(Clone)]
struct WsState {
    accepted: mpsc::UnboundedSender<AcceptedSocket>,
    max_message_size: usize,
}

/// A router that upgrades every request path to a WebSocket and hands the
/// split socket to `accepted`.
pub fn router(accepted: mpsc::UnboundedSender<AcceptedSocket>, max_message_size: usize) -> Router {
    Router::new().fallback(upgrade).with_state(WsState {
        accepted,
        max_message_size,
    })
}

async fn upgrade(
    State(state): State<WsState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    ws.max_message_size(state.max_message_size)
        .on_upgrade(move |socket| async move {
            let (sink, stream) = socket.split();
            let accepted = AcceptedSocket {
                source: Box::new(WsSource { inner: stream }),
                sink: Box::new(WsSink { inner: sink }),
                origin: addr.ip().to_string(),
                user_agent,
            };
            if state.accepted.send(accepted).is_err() {
                debug!(%addr, "socket accepted after session shutdown");
            }
        })
}

/// Serve `router` on `listener` until `shutdown` is cancelled.
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: CancellationToken,
) -> Result<()> {
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown.cancelled_owned())
    .await
    .map_err(TransportError::Io)
}
