//! WebSocket transport implementation.
//!
//! [`TransportFactory`] is the seam the session uses to open connections;
//! tests inject a mock factory, production uses [`WsTransport`] over
//! `tokio-tungstenite`. A live connection is a pair of channels: commands
//! out, events in. The inbound stream ending means the connection closed.

use std::time::Duration;

use async_trait::async_trait;
use futures_channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use telecare_shared::{ClientCommand, ServerEvent, WsEnvelope};

/// Transport errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// No "connected" signal within the client-side timeout.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),
}

/// Authentication payload for the transport handshake.
#[derive(Debug, Clone)]
pub struct AuthPayload {
    pub token: String,
}

/// A live transport connection.
///
/// Dropping the handle tears the connection down: the write task exits
/// when `outbound` closes, and the read task exits when `inbound` is gone.
pub struct TransportHandle {
    /// Commands to the server.
    pub outbound: UnboundedSender<WsEnvelope<ClientCommand>>,
    /// Events from the server. `None` from the stream means the
    /// connection closed (remote close frame, network error).
    pub inbound: UnboundedReceiver<WsEnvelope<ServerEvent>>,
}

/// Factory seam for opening transport connections.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    async fn connect(&self, url: &str, auth: &AuthPayload)
        -> Result<TransportHandle, TransportError>;
}

/// Production WebSocket transport.
///
/// WebSocket only, no fallback transports. The token travels in the
/// handshake query string.
#[derive(Debug, Clone)]
pub struct WsTransport {
    pub connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl TransportFactory for WsTransport {
    async fn connect(
        &self,
        url: &str,
        auth: &AuthPayload,
    ) -> Result<TransportHandle, TransportError> {
        let full_url = format!(
            "{}?token={}",
            url.trim_end_matches('/'),
            urlencoding::encode(&auth.token)
        );

        let (ws_stream, _response) = tokio::time::timeout(self.connect_timeout, connect_async(full_url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.connect_timeout))?
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        tracing::info!(url, "websocket connected");

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = unbounded::<WsEnvelope<ClientCommand>>();
        let (in_tx, in_rx) = unbounded::<WsEnvelope<ServerEvent>>();

        // Read task: parse server events until the stream ends.
        tokio::spawn(async move {
            while let Some(msg_result) = read.next().await {
                match msg_result {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<WsEnvelope<ServerEvent>>(text.as_str()) {
                            Ok(envelope) => {
                                if in_tx.unbounded_send(envelope).is_err() {
                                    // Session dropped its receiver
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::warn!("failed to parse server event: {e}");
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("websocket received close frame");
                        break;
                    }
                    Ok(Message::Ping(_)) => {
                        // Pong is handled automatically by tungstenite
                    }
                    Ok(_) => {
                        // Ignore binary, pong, etc.
                    }
                    Err(e) => {
                        tracing::warn!("websocket read error: {e}");
                        break;
                    }
                }
            }
            // in_tx drops here; the session sees the stream end.
        });

        // Write task: serialize outbound commands until the sender closes.
        tokio::spawn(async move {
            while let Some(envelope) = out_rx.next().await {
                match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        tracing::debug!("sending: {json}");
                        if let Err(e) = write.send(Message::Text(json.into())).await {
                            tracing::warn!("websocket send failed: {e}");
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("failed to serialize command: {e}");
                    }
                }
            }
        });

        Ok(TransportHandle { outbound: out_tx, inbound: in_rx })
    }
}
