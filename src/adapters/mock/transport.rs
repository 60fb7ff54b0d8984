//! Scriptable in-memory transport.
//!
//! Every successful [`MockConnector::connect`] hands the test a [`MockPeer`]
//! through the receiver returned by [`MockConnector::new`]. The peer plays
//! the provider's side of that one connection.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;

use crate::traits::{TransportConnector, TransportError, TransportFrame, TransportStream};

#[derive(Debug, Default)]
struct ConnectorState {
    failures_remaining: usize,
    attempts: Vec<(String, Instant)>,
}

/// Connector whose connections are driven by the test.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MockPeer>) {
        let (peers, rx) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(ConnectorState::default())),
            peers,
        };
        (connector, rx)
    }

    /// Make the next `count` connection attempts fail.
    pub fn fail_next(&self, count: usize) {
        self.state.lock().unwrap().failures_remaining = count;
    }

    /// URL and time of every attempt, failed ones included.
    pub fn attempts(&self) -> Vec<(String, Instant)> {
        self.state.lock().unwrap().attempts.clone()
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, url: &str) -> Result<Box<dyn TransportStream>, TransportError> {
        {
            let mut state = self.state.lock().unwrap();
            state.attempts.push((url.to_string(), Instant::now()));
            if state.failures_remaining > 0 {
                state.failures_remaining -= 1;
                return Err(TransportError::ConnectionFailed("mock refused".to_string()));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let closed_notify = Arc::new(Notify::new());
        let peer = MockPeer {
            url: url.to_string(),
            tx,
            closed: closed.clone(),
            closed_notify: closed_notify.clone(),
        };
        // The test may have stopped listening; the stream still works.
        let _ = self.peers.send(peer);

        Ok(Box::new(MockStream {
            rx,
            finished: false,
            closed,
            closed_notify,
        }))
    }
}

/// The provider's end of one mock connection.
pub struct MockPeer {
    pub url: String,
    tx: mpsc::UnboundedSender<TransportFrame>,
    closed: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
}

impl MockPeer {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(TransportFrame::Text(text.into()));
    }

    pub fn heartbeat(&self) {
        let _ = self.tx.send(TransportFrame::Heartbeat);
    }

    /// Drop the connection from the provider's side.
    pub fn drop_connection(&self, reason: &str) {
        let _ = self.tx.send(TransportFrame::Closed {
            reason: reason.to_string(),
        });
    }

    /// Whether the client closed this connection.
    pub fn is_closed_by_client(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Wait until the client closes this connection.
    pub async fn wait_closed(&self) {
        loop {
            let notified = self.closed_notify.notified();
            if self.is_closed_by_client() {
                return;
            }
            notified.await;
        }
    }
}

struct MockStream {
    rx: mpsc::UnboundedReceiver<TransportFrame>,
    finished: bool,
    closed: Arc<AtomicBool>,
    closed_notify: Arc<Notify>,
}

#[async_trait]
impl TransportStream for MockStream {
    async fn next_frame(&mut self) -> TransportFrame {
        if self.finished {
            return TransportFrame::Closed {
                reason: "already closed".to_string(),
            };
        }
        match self.rx.recv().await {
            Some(frame) => {
                if matches!(frame, TransportFrame::Closed { .. }) {
                    self.finished = true;
                }
                frame
            }
            None => {
                self.finished = true;
                TransportFrame::Closed {
                    reason: "peer dropped".to_string(),
                }
            }
        }
    }

    async fn close(&mut self) {
        self.finished = true;
        self.closed.store(true, Ordering::SeqCst);
        self.closed_notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peer_drives_stream() {
        let (connector, mut peers) = MockConnector::new();
        let mut stream = connector.connect("wss://mock/ws").await.unwrap();
        let peer = peers.recv().await.unwrap();
        assert_eq!(peer.url, "wss://mock/ws");

        peer.send_text("hello");
        peer.heartbeat();
        peer.drop_connection("bye");

        assert_eq!(stream.next_frame().await, TransportFrame::Text("hello".to_string()));
        assert_eq!(stream.next_frame().await, TransportFrame::Heartbeat);
        assert!(matches!(stream.next_frame().await, TransportFrame::Closed { .. }));
        assert!(matches!(stream.next_frame().await, TransportFrame::Closed { .. }));
        assert!(!peer.is_closed_by_client());
    }

    #[tokio::test]
    async fn test_client_close_is_observable() {
        let (connector, mut peers) = MockConnector::new();
        let mut stream = connector.connect("wss://mock/ws").await.unwrap();
        let peer = peers.recv().await.unwrap();

        stream.close().await;
        peer.wait_closed().await;
        assert!(peer.is_closed_by_client());
    }

    #[tokio::test]
    async fn test_fail_next() {
        let (connector, _peers) = MockConnector::new();
        connector.fail_next(2);

        assert!(connector.connect("wss://a").await.is_err());
        assert!(connector.connect("wss://a").await.is_err());
        assert!(connector.connect("wss://a").await.is_ok());
        assert_eq!(connector.attempts().len(), 3);
    }
}
