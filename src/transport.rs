//! WebSocket plumbing between the game server and the dispatcher's channels.
//!
//! The transport never interprets frames: text goes to the dispatcher as-is
//! and outbound messages are serialized with [`OutboundMessage::to_text`].
//! There is no reconnect; when the socket ends the inbound channel closes and
//! the dispatcher treats that as a lost connection.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::messages::OutboundMessage;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const LOG_TARGET: &str = "werewolf::transport";

/// Transport-side channel ends, paired with `DispatcherChannels`.
pub struct TransportChannels {
    pub inbound: mpsc::Sender<String>,
    pub outbound: mpsc::Receiver<OutboundMessage>,
}

pub async fn connect(url: &Url, handshake_timeout: Duration) -> Result<WsStream> {
    let (stream, _) = timeout(handshake_timeout, connect_async(url.as_str()))
        .await
        .context("game server handshake timed out")?
        .context("game server handshake failed")?;
    info!(target = LOG_TARGET, url = %url, "connected to game server");
    Ok(stream)
}

/// Shuttle frames until the socket ends, the dispatcher goes away or `stop` fires.
pub async fn pump(
    stream: WsStream,
    channels: TransportChannels,
    stop: CancellationToken,
) -> Result<()> {
    let TransportChannels {
        inbound,
        mut outbound,
    } = channels;
    let (mut sink, mut source) = stream.split();

    loop {
        tokio::select! {
            _ = stop.cancelled() => {
                debug!(target = LOG_TARGET, "shutdown signal received");
                break;
            }
            message = outbound.recv() => {
                let Some(message) = message else {
                    debug!(target = LOG_TARGET, "dispatcher closed the outbound channel");
                    break;
                };
                let text = message
                    .to_text()
                    .with_context(|| format!("failed to encode {} frame", message.target()))?;
                sink.send(Message::Text(text))
                    .await
                    .context("failed to send frame")?;
            }
            msg = source.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if inbound.send(text).await.is_err() {
                            debug!(target = LOG_TARGET, "dispatcher gone, dropping inbound frame");
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        sink.send(Message::Pong(payload)).await.ok();
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(target = LOG_TARGET, ?frame, "socket closed by server");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(target = LOG_TARGET, error = %err, "websocket error");
                        break;
                    }
                    None => {
                        debug!(target = LOG_TARGET, "websocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    let _ = sink.close().await;
    info!(target = LOG_TARGET, "transport stopped");
    Ok(())
}
