//! Review pipeline: what happens to chat messages after they arrive.
//!
//! The session manager turns each `channel.chat.message` notification into
//! a [`ModerationEvent`] and hands it to a [`ReviewSink`]. Sinks compose:
//! [`AccountAgeFilter`] forwards only messages from young accounts to the
//! sink it wraps. [`ModerationActions`] lets whoever reviews the event act
//! on it.

pub mod actions;
pub mod filter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::eventsub::messages::ChatMessageEvent;
use crate::traits::ReviewSink;

pub use actions::ModerationActions;
pub use filter::AccountAgeFilter;

/// A chat message flagged for review.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModerationEvent {
    pub message_id: String,
    pub broadcaster_id: String,
    pub broadcaster_login: String,
    pub chatter_id: String,
    pub chatter_login: String,
    pub chatter_display_name: String,
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl ModerationEvent {
    pub fn from_chat(event: ChatMessageEvent, received_at: DateTime<Utc>) -> Self {
        Self {
            message_id: event.message_id,
            broadcaster_id: event.broadcaster_user_id,
            broadcaster_login: event.broadcaster_user_login,
            chatter_id: event.chatter_user_id,
            chatter_login: event.chatter_user_login,
            chatter_display_name: event.chatter_user_name,
            text: event.message.text,
            received_at,
        }
    }
}

/// Sink that writes each event to the log.
///
/// Stands in for the chat-platform renderer, which lives outside this crate.
#[derive(Debug, Default, Clone)]
pub struct LoggingReviewSink {
    /// Destination channel id, carried into the log line.
    channel_id: Option<String>,
}

impl LoggingReviewSink {
    pub fn new(channel_id: Option<String>) -> Self {
        Self { channel_id }
    }
}

#[async_trait]
impl ReviewSink for LoggingReviewSink {
    async fn submit(&self, event: ModerationEvent) {
        info!(
            channel = self.channel_id.as_deref().unwrap_or("-"),
            message_id = %event.message_id,
            chatter = %event.chatter_login,
            chatter_id = %event.chatter_id,
            "{}: {}",
            event.chatter_display_name,
            event.text
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventsub::messages::ChatMessageBody;

    #[test]
    fn test_from_chat() {
        let chat = ChatMessageEvent {
            broadcaster_user_id: "100".to_string(),
            broadcaster_user_login: "streamer".to_string(),
            broadcaster_user_name: Some("Streamer".to_string()),
            chatter_user_id: "300".to_string(),
            chatter_user_login: "viewer".to_string(),
            chatter_user_name: "Viewer".to_string(),
            message_id: "m-1".to_string(),
            message: ChatMessageBody {
                text: "hi".to_string(),
            },
            message_type: Some("text".to_string()),
        };
        let received_at = Utc::now();
        let event = ModerationEvent::from_chat(chat, received_at);

        assert_eq!(event.message_id, "m-1");
        assert_eq!(event.broadcaster_id, "100");
        assert_eq!(event.chatter_login, "viewer");
        assert_eq!(event.chatter_display_name, "Viewer");
        assert_eq!(event.text, "hi");
        assert_eq!(event.received_at, received_at);
    }
}
