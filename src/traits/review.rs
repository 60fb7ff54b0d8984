//! Review pipeline trait abstractions.
//!
//! The chat-platform side that renders flagged messages is not part of this
//! crate. It plugs in through [`ReviewSink`]. Account metadata lookups go
//! through [`AccountDirectory`] so the age filter can be tested offline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ApiError;
use crate::review::ModerationEvent;

/// Destination for moderation-relevant chat events.
///
/// Called from the session loop in arrival order. Implementations should
/// hand the event off quickly; slow work belongs on a spawned task.
#[async_trait]
pub trait ReviewSink: Send + Sync {
    async fn submit(&self, event: ModerationEvent);
}

/// Lookup of account metadata by login name.
#[async_trait]
pub trait AccountDirectory: Send + Sync {
    /// Creation time of the account with `login`, or `None` if no such
    /// account exists.
    async fn account_created_at(&self, login: &str) -> Result<Option<DateTime<Utc>>, ApiError>;
}
