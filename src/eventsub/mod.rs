//! Push-event session against the EventSub websocket.

pub mod backoff;
pub mod keepalive;
pub mod manager;
pub mod messages;
pub mod session;

pub use backoff::ReconnectPolicy;
pub use keepalive::KeepaliveMonitor;
pub use manager::{SessionConfig, SessionManager, ShutdownHandle, EVENTSUB_WS_URL};
pub use messages::{ChatMessageEvent, InboundMessage, Metadata};
pub use session::{Session, SessionState, SessionStatus, SubscriptionState};
