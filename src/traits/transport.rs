//! Event transport trait abstraction.
//!
//! The session manager talks to the push-event endpoint only through these
//! traits, so tests can script welcome/keepalive/reconnect sequences with
//! [`crate::adapters::mock::MockConnector`].

use async_trait::async_trait;

/// One inbound unit from the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportFrame {
    /// A text message carrying a JSON envelope.
    Text(String),
    /// Transport-level liveness traffic (ping/pong). Counts as activity.
    Heartbeat,
    /// The remote end went away. Terminal: no frames follow.
    Closed { reason: String },
}

/// Transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Connection timeout: {0}")]
    Timeout(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// An open connection.
#[async_trait]
pub trait TransportStream: Send {
    /// Wait for the next frame. Returns [`TransportFrame::Closed`] once the
    /// connection is gone, and keeps returning it afterwards.
    async fn next_frame(&mut self) -> TransportFrame;

    /// Close the connection from our side.
    async fn close(&mut self);
}

/// Opens connections to an endpoint URL.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportStream>, TransportError>;
}
