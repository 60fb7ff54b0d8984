//! Tungstenite-based websocket transport.
//!
//! Implements [`TransportConnector`] with `tokio-tungstenite`. Pings are
//! answered by tungstenite itself; they surface as
//! [`TransportFrame::Heartbeat`] so they count as traffic.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::traits::{TransportConnector, TransportError, TransportFrame, TransportStream};

/// Opens websocket connections.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TransportConnector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportStream>, TransportError> {
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(TransportError::InvalidUrl(url.to_string()));
        }

        let (ws, response) = connect_async(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        debug!(url, status = response.status().as_u16(), "Websocket handshake done");

        Ok(Box::new(TungsteniteStream {
            ws,
            finished: false,
        }))
    }
}

/// One open websocket.
pub struct TungsteniteStream {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    finished: bool,
}

impl TungsteniteStream {
    fn finish(&mut self, reason: String) -> TransportFrame {
        self.finished = true;
        TransportFrame::Closed { reason }
    }
}

#[async_trait]
impl TransportStream for TungsteniteStream {
    async fn next_frame(&mut self) -> TransportFrame {
        if self.finished {
            return TransportFrame::Closed {
                reason: "already closed".to_string(),
            };
        }

        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return TransportFrame::Text(text),
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                    return TransportFrame::Heartbeat
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "closed by peer".to_string());
                    return self.finish(reason);
                }
                Some(Ok(Message::Binary(data))) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                    return TransportFrame::Heartbeat;
                }
                Some(Ok(Message::Frame(_))) => continue,
                Some(Err(e)) => return self.finish(e.to_string()),
                None => return self.finish("stream ended".to_string()),
            }
        }
    }

    async fn close(&mut self) {
        self.finished = true;
        if let Err(e) = self.ws.close(None).await {
            debug!(error = %e, "Websocket close handshake failed");
        }
    }
}
