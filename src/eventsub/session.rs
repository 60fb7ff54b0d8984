//! Session bookkeeping.
//!
//! A [`Session`] exists from a `session_welcome` until its connection is
//! superseded or lost. It owns its keepalive watchdog, so a superseded
//! session's watchdog goes away with it.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use tokio::time::Instant;

use super::keepalive::KeepaliveMonitor;

/// Identifies one transport connection for the lifetime of the process.
pub type ConnectionId = u64;

/// Keepalive interval assumed when the welcome does not state one.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    None,
    /// Request sent, no answer yet.
    Pending,
    Active,
}

/// Observable lifecycle of the event session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingWelcome,
    Subscribing,
    Active,
    Reconnecting,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingWelcome => "awaiting_welcome",
            SessionState::Subscribing => "subscribing",
            SessionState::Active => "active",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// What the manager publishes on its watch channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Id of the current session, once welcomed.
    pub session_id: Option<String>,
    pub subscription: SubscriptionState,
}

impl SessionStatus {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            session_id: None,
            subscription: SubscriptionState::None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub connection: ConnectionId,
    pub keepalive: KeepaliveMonitor,
    pub subscription: SubscriptionState,
}

impl Session {
    pub fn new(
        id: String,
        connection: ConnectionId,
        keepalive_secs: Option<u64>,
        grace: Duration,
        now: Instant,
    ) -> Self {
        let interval = keepalive_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_KEEPALIVE);
        Self {
            id,
            connection,
            keepalive: KeepaliveMonitor::new(interval, grace, now),
            subscription: SubscriptionState::None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscription == SubscriptionState::Active
    }
}

/// Bounded memory of recently seen message ids.
///
/// The provider may deliver a message more than once, notably while a
/// connection migration has both sockets open.
#[derive(Debug)]
pub struct RecentMessageIds {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl RecentMessageIds {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// Returns `false` if `id` was already seen.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }
}
