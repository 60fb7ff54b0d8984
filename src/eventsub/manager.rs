//! The event-session state machine.
//!
//! One task runs [`SessionManager::run`] and is the only writer of session
//! state. Everything else reports back to it over a single `mpsc` channel:
//!
//! - connection attempts run on spawned tasks and report [`LoopEvent::Opened`]
//! - each open connection has a reader task forwarding frames tagged with
//!   its [`ConnectionId`]
//! - subscription requests run on spawned tasks and report back tagged with
//!   the session they were made for
//!
//! A `session_reconnect` opens a second ("migrating") connection next to the
//! current one. The migrating connection is promoted once its own session is
//! subscribed, or as soon as the current connection drops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::backoff::{ReconnectPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use super::keepalive::DEFAULT_GRACE;
use super::messages::{ChatMessageEvent, InboundMessage, SessionPayload};
use super::session::{
    ConnectionId, RecentMessageIds, Session, SessionState, SessionStatus, SubscriptionState,
};
use crate::error::{ApiError, SessionError};
use crate::helix::{HelixClient, SubscriptionInfo, SubscriptionRequest, CHAT_MESSAGE_SUBSCRIPTION};
use crate::review::ModerationEvent;
use crate::traits::{
    ReviewSink, TransportConnector, TransportError, TransportFrame, TransportStream,
};

/// Default EventSub websocket endpoint.
pub const EVENTSUB_WS_URL: &str = "wss://eventsub.wss.twitch.tv/ws";

const EVENT_CHANNEL_CAPACITY: usize = 256;
const RECENT_MESSAGE_CAPACITY: usize = 1024;
/// How long shutdown waits for readers to close their connections.
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Session manager settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    /// Broadcaster whose chat is watched.
    pub broadcaster_id: String,
    /// Account the subscription is made as (the credential's user).
    pub moderator_id: String,
    pub connect_timeout: Duration,
    /// How long an open connection may wait for its welcome.
    pub welcome_timeout: Duration,
    pub keepalive_grace: Duration,
    pub watchdog_period: Duration,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
}

impl SessionConfig {
    pub fn new(
        url: impl Into<String>,
        broadcaster_id: impl Into<String>,
        moderator_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            broadcaster_id: broadcaster_id.into(),
            moderator_id: moderator_id.into(),
            connect_timeout: Duration::from_secs(10),
            welcome_timeout: Duration::from_secs(10),
            keepalive_grace: DEFAULT_GRACE,
            watchdog_period: Duration::from_secs(1),
            backoff_base: DEFAULT_BASE_DELAY,
            backoff_max: DEFAULT_MAX_DELAY,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_welcome_timeout(mut self, timeout: Duration) -> Self {
        self.welcome_timeout = timeout;
        self
    }

    pub fn with_keepalive_grace(mut self, grace: Duration) -> Self {
        self.keepalive_grace = grace;
        self
    }

    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff_base = base;
        self.backoff_max = max;
        self
    }
}

/// Asks a running [`SessionManager`] to close and return.
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.tx.send_replace(true);
    }
}

enum LoopEvent {
    Opened {
        conn: ConnectionId,
        result: Result<Box<dyn TransportStream>, TransportError>,
    },
    Frame {
        conn: ConnectionId,
        frame: TransportFrame,
        received_at: Instant,
    },
    Subscribed {
        conn: ConnectionId,
        session_id: String,
        result: Result<SubscriptionInfo, ApiError>,
    },
}

/// Owns a reader task. Dropping it closes the connection.
struct ReaderHandle {
    close_tx: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ReaderHandle {
    fn spawn(
        conn: ConnectionId,
        mut stream: Box<dyn TransportStream>,
        events: mpsc::Sender<LoopEvent>,
    ) -> Self {
        let (close_tx, mut close_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    frame = stream.next_frame() => Some(frame),
                    _ = &mut close_rx => None,
                };
                let Some(frame) = frame else {
                    break;
                };

                let remote_closed = matches!(frame, TransportFrame::Closed { .. });
                let event = LoopEvent::Frame {
                    conn,
                    frame,
                    received_at: Instant::now(),
                };
                if events.send(event).await.is_err() {
                    break;
                }
                if remote_closed {
                    return;
                }
            }
            stream.close().await;
            debug!(conn, "Connection closed");
        });
        Self { close_tx, task }
    }

    /// Close the connection and wait (bounded) for the reader to finish.
    async fn close(self) {
        drop(self.close_tx);
        let _ = tokio::time::timeout(CLOSE_GRACE, self.task).await;
    }
}

/// One transport connection and the session running on it.
struct Link {
    id: ConnectionId,
    url: String,
    reader: Option<ReaderHandle>,
    opened_at: Option<Instant>,
    session: Option<Session>,
}

impl Link {
    fn new(id: ConnectionId, url: String) -> Self {
        Self {
            id,
            url,
            reader: None,
            opened_at: None,
            session: None,
        }
    }

    fn state(&self) -> SessionState {
        match (&self.reader, &self.session) {
            (None, _) => SessionState::Connecting,
            (Some(_), None) => SessionState::AwaitingWelcome,
            (Some(_), Some(session)) if session.is_active() => SessionState::Active,
            (Some(_), Some(_)) => SessionState::Subscribing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Primary,
    Migrating,
}

pub struct SessionManager {
    config: SessionConfig,
    connector: Arc<dyn TransportConnector>,
    helix: HelixClient,
    sink: Arc<dyn ReviewSink>,
    policy: ReconnectPolicy,
    status_tx: watch::Sender<SessionStatus>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    events_tx: mpsc::Sender<LoopEvent>,
    events_rx: mpsc::Receiver<LoopEvent>,
    next_conn: ConnectionId,
    primary: Option<Link>,
    migrating: Option<Link>,
    reconnect_at: Option<Instant>,
    seen: RecentMessageIds,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        connector: Arc<dyn TransportConnector>,
        helix: HelixClient,
        sink: Arc<dyn ReviewSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, _) = watch::channel(SessionStatus::new(SessionState::Disconnected));
        let (shutdown_tx, _) = watch::channel(false);
        let policy = ReconnectPolicy::new(config.backoff_base, config.backoff_max);

        Self {
            config,
            connector,
            helix,
            sink,
            policy,
            status_tx,
            shutdown_tx: Arc::new(shutdown_tx),
            events_tx,
            events_rx,
            next_conn: 0,
            primary: None,
            migrating: None,
            reconnect_at: None,
            seen: RecentMessageIds::new(RECENT_MESSAGE_CAPACITY),
        }
    }

    /// Observe the session state.
    pub fn status(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            tx: self.shutdown_tx.clone(),
        }
    }

    /// Run until shutdown or until the credential becomes unusable.
    ///
    /// Transport and subscription failures are handled here with reconnects.
    /// The only error returned is [`SessionError::AuthUnrecoverable`].
    pub async fn run(mut self) -> Result<(), SessionError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let mut watchdog = tokio::time::interval(self.config.watchdog_period);
        watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

        if *shutdown_rx.borrow_and_update() {
            self.status_tx
                .send_replace(SessionStatus::new(SessionState::Closed));
            return Ok(());
        }

        info!(url = %self.config.url, "Starting event session");
        self.connect(self.config.url.clone(), Slot::Primary);

        let result = loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Event session shutting down");
                        break Ok(());
                    }
                }

                Some(event) = self.events_rx.recv() => {
                    if let Err(err) = self.handle_event(event).await {
                        break Err(err);
                    }
                }

                _ = watchdog.tick() => {
                    self.check_liveness(Instant::now());
                }

                _ = sleep_until(reconnect_at.unwrap_or_else(Instant::now)), if reconnect_at.is_some() => {
                    self.reconnect_at = None;
                    self.connect(self.config.url.clone(), Slot::Primary);
                }
            }
        };

        if let Err(err) = &result {
            error!(error = %err, code = err.error_code(), "Event session ended");
        }
        self.close_all().await;
        self.status_tx
            .send_replace(SessionStatus::new(SessionState::Closed));
        result
    }

    fn link_mut(&mut self, slot: Slot) -> Option<&mut Link> {
        match slot {
            Slot::Primary => self.primary.as_mut(),
            Slot::Migrating => self.migrating.as_mut(),
        }
    }

    fn slot_of(&self, conn: ConnectionId) -> Option<Slot> {
        if self.primary.as_ref().is_some_and(|link| link.id == conn) {
            Some(Slot::Primary)
        } else if self.migrating.as_ref().is_some_and(|link| link.id == conn) {
            Some(Slot::Migrating)
        } else {
            None
        }
    }

    /// Publish the state of the primary connection.
    fn publish(&self) {
        let status = match &self.primary {
            Some(link) => SessionStatus {
                state: link.state(),
                session_id: link.session.as_ref().map(|s| s.id.clone()),
                subscription: link
                    .session
                    .as_ref()
                    .map(|s| s.subscription)
                    .unwrap_or(SubscriptionState::None),
            },
            None if self.reconnect_at.is_some() => SessionStatus::new(SessionState::Reconnecting),
            None => SessionStatus::new(SessionState::Disconnected),
        };
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }

    /// Start a connection attempt into `slot`, replacing whatever was there.
    fn connect(&mut self, url: String, slot: Slot) {
        self.next_conn += 1;
        let conn = self.next_conn;
        debug!(conn, url = %url, ?slot, "Connecting");

        let link = Link::new(conn, url.clone());
        match slot {
            Slot::Primary => self.primary = Some(link),
            Slot::Migrating => self.migrating = Some(link),
        }
        self.publish();

        let connector = self.connector.clone();
        let events = self.events_tx.clone();
        let timeout = self.config.connect_timeout;
        tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, connector.connect(&url)).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout(format!(
                    "no connection after {}s",
                    timeout.as_secs()
                ))),
            };
            let _ = events.send(LoopEvent::Opened { conn, result }).await;
        });
    }

    async fn handle_event(&mut self, event: LoopEvent) -> Result<(), SessionError> {
        match event {
            LoopEvent::Opened { conn, result } => {
                self.on_opened(conn, result);
                Ok(())
            }
            LoopEvent::Frame {
                conn,
                frame,
                received_at,
            } => {
                self.on_frame(conn, frame, received_at).await;
                Ok(())
            }
            LoopEvent::Subscribed {
                conn,
                session_id,
                result,
            } => self.on_subscribed(conn, session_id, result),
        }
    }

    fn on_opened(
        &mut self,
        conn: ConnectionId,
        result: Result<Box<dyn TransportStream>, TransportError>,
    ) {
        let Some(slot) = self.slot_of(conn) else {
            if let Ok(mut stream) = result {
                debug!(conn, "Discarding connection nobody waits for");
                tokio::spawn(async move { stream.close().await });
            }
            return;
        };

        match result {
            Ok(stream) => {
                let reader = ReaderHandle::spawn(conn, stream, self.events_tx.clone());
                if let Some(link) = self.link_mut(slot) {
                    info!(conn, url = %link.url, "Connected, awaiting welcome");
                    link.reader = Some(reader);
                    link.opened_at = Some(Instant::now());
                }
                self.publish();
            }
            Err(err) => {
                self.lose(
                    conn,
                    SessionError::TransportLost {
                        reason: err.to_string(),
                    },
                );
            }
        }
    }

    async fn on_frame(&mut self, conn: ConnectionId, frame: TransportFrame, received_at: Instant) {
        let Some(slot) = self.slot_of(conn) else {
            debug!(conn, "Ignoring frame from superseded connection");
            return;
        };

        if let Some(session) = self.link_mut(slot).and_then(|link| link.session.as_mut()) {
            session.keepalive.record(received_at);
        }

        let text = match frame {
            TransportFrame::Text(text) => text,
            TransportFrame::Heartbeat => return,
            TransportFrame::Closed { reason } => {
                self.lose(conn, SessionError::TransportLost { reason });
                return;
            }
        };

        let (metadata, message) = match InboundMessage::parse(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(conn, error = %err, code = err.error_code(), "Ignoring malformed message");
                return;
            }
        };

        match message {
            InboundMessage::Welcome(payload) => self.on_welcome(conn, slot, payload, received_at),
            InboundMessage::Keepalive => {}
            InboundMessage::Reconnect(payload) => self.on_reconnect(conn, slot, payload),
            InboundMessage::Notification {
                subscription,
                event,
            } => {
                let has_session = self
                    .link_mut(slot)
                    .is_some_and(|link| link.session.is_some());
                if !has_session {
                    warn!(conn, "Notification before welcome, ignoring");
                    return;
                }
                if !self.seen.insert(&metadata.message_id) {
                    debug!(message_id = %metadata.message_id, "Duplicate notification");
                    return;
                }
                if subscription.kind != CHAT_MESSAGE_SUBSCRIPTION {
                    debug!(kind = %subscription.kind, "Ignoring notification");
                    return;
                }
                match serde_json::from_value::<ChatMessageEvent>(event) {
                    Ok(chat) => {
                        self.sink
                            .submit(ModerationEvent::from_chat(chat, Utc::now()))
                            .await;
                    }
                    Err(err) => {
                        warn!(error = %err, "Unreadable chat message event");
                    }
                }
            }
            InboundMessage::Revocation(subscription) => {
                warn!(
                    conn,
                    kind = %subscription.kind,
                    status = %subscription.status,
                    "Subscription revoked"
                );
                self.lose(
                    conn,
                    SessionError::SubscriptionRejected {
                        reason: format!("revoked: {}", subscription.status),
                    },
                );
            }
            InboundMessage::Unknown(kind) => {
                debug!(conn, message_type = %kind, "Ignoring unknown message type");
            }
        }
    }

    fn on_welcome(
        &mut self,
        conn: ConnectionId,
        slot: Slot,
        payload: SessionPayload,
        received_at: Instant,
    ) {
        let grace = self.config.keepalive_grace;
        let Some(link) = self.link_mut(slot) else {
            return;
        };

        let mut session = Session::new(
            payload.id.clone(),
            conn,
            payload.keepalive_timeout_seconds,
            grace,
            received_at,
        );
        session.subscription = SubscriptionState::Pending;
        if let Some(previous) = link.session.replace(session) {
            debug!(conn, previous = %previous.id, "Welcome replaced an existing session");
        }
        info!(
            conn,
            session_id = %payload.id,
            keepalive_secs = payload.keepalive_timeout_seconds,
            "Session welcomed, subscribing"
        );

        self.subscribe(conn, payload.id);
        self.publish();
    }

    fn subscribe(&self, conn: ConnectionId, session_id: String) {
        let request = SubscriptionRequest::chat_messages(
            self.config.broadcaster_id.as_str(),
            self.config.moderator_id.as_str(),
            session_id.as_str(),
        );
        let helix = self.helix.clone();
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = helix.create_subscription(&request).await;
            let _ = events
                .send(LoopEvent::Subscribed {
                    conn,
                    session_id,
                    result,
                })
                .await;
        });
    }

    fn on_reconnect(&mut self, conn: ConnectionId, slot: Slot, payload: SessionPayload) {
        let Some(url) = payload.reconnect_url else {
            return;
        };
        match slot {
            Slot::Primary if self.migrating.is_some() => {
                debug!(conn, "Migration already in progress");
            }
            Slot::Primary | Slot::Migrating => {
                info!(conn, session_id = %payload.id, url = %url, "Provider asked to migrate");
                self.connect(url, Slot::Migrating);
            }
        }
    }

    fn on_subscribed(
        &mut self,
        conn: ConnectionId,
        session_id: String,
        result: Result<SubscriptionInfo, ApiError>,
    ) -> Result<(), SessionError> {
        let Some(slot) = self.slot_of(conn) else {
            debug!(conn, session_id = %session_id, "Discarding stale subscription result");
            return Ok(());
        };
        let current = self
            .link_mut(slot)
            .and_then(|link| link.session.as_ref())
            .is_some_and(|session| session.id == session_id);
        if !current {
            debug!(conn, session_id = %session_id, "Discarding stale subscription result");
            return Ok(());
        }

        match result {
            Ok(_) | Err(ApiError::Conflict { .. }) => {
                if let Some(session) = self.link_mut(slot).and_then(|link| link.session.as_mut()) {
                    session.subscription = SubscriptionState::Active;
                }
                info!(conn, session_id = %session_id, "Subscription active");
                self.policy.reset();
                if slot == Slot::Migrating {
                    self.promote();
                }
                self.publish();
                Ok(())
            }
            Err(ApiError::AuthUnrecoverable(err)) if err.is_fatal() => {
                Err(SessionError::AuthUnrecoverable(err))
            }
            Err(err) => {
                warn!(conn, error = %err, code = err.error_code(), "Subscription rejected");
                self.lose(
                    conn,
                    SessionError::SubscriptionRejected {
                        reason: err.to_string(),
                    },
                );
                Ok(())
            }
        }
    }

    /// Make the migrating connection the primary one. The old primary is
    /// closed.
    fn promote(&mut self) {
        let Some(next) = self.migrating.take() else {
            return;
        };
        info!(conn = next.id, "Migrated to new connection");
        if let Some(old) = self.primary.replace(next) {
            if let Some(reader) = old.reader {
                tokio::spawn(reader.close());
            }
        }
    }

    /// A connection failed or was judged dead.
    fn lose(&mut self, conn: ConnectionId, reason: SessionError) {
        match self.slot_of(conn) {
            Some(Slot::Migrating) => {
                warn!(conn, error = %reason, "Migration failed, staying on current connection");
                self.migrating = None;
            }
            Some(Slot::Primary) => {
                self.primary = None;
                if self.migrating.is_some() {
                    info!(conn, error = %reason, "Connection lost during migration, promoting");
                    self.primary = self.migrating.take();
                } else {
                    let delay = self.policy.next_delay();
                    warn!(
                        conn,
                        error = %reason,
                        code = reason.error_code(),
                        attempt = self.policy.attempt(),
                        delay_ms = delay.as_millis() as u64,
                        "Session lost, reconnecting"
                    );
                    self.reconnect_at = Some(Instant::now() + delay);
                }
                self.publish();
            }
            None => {}
        }
    }

    fn check_liveness(&mut self, now: Instant) {
        let welcome_timeout = self.config.welcome_timeout;
        let mut dead = Vec::new();

        // Migrating first, so a dead migration is never promoted.
        for link in [self.migrating.as_ref(), self.primary.as_ref()]
            .into_iter()
            .flatten()
        {
            match (&link.session, link.opened_at) {
                (Some(session), _) => {
                    if let Err(err) = session.keepalive.check(now) {
                        dead.push((link.id, err));
                    }
                }
                (None, Some(opened_at)) if now.saturating_duration_since(opened_at) > welcome_timeout => {
                    dead.push((
                        link.id,
                        SessionError::TransportLost {
                            reason: format!("no welcome within {}s", welcome_timeout.as_secs()),
                        },
                    ));
                }
                _ => {}
            }
        }

        for (conn, err) in dead {
            self.lose(conn, err);
        }
    }

    async fn close_all(&mut self) {
        let readers: Vec<ReaderHandle> = [self.migrating.take(), self.primary.take()]
            .into_iter()
            .flatten()
            .filter_map(|link| link.reader)
            .collect();
        for reader in readers {
            reader.close().await;
        }
    }
}
