//! Helix request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription type for chat messages in a channel.
pub const CHAT_MESSAGE_SUBSCRIPTION: &str = "channel.chat.message";

/// An account as returned by `GET /users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HelixUser {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

/// Envelope Helix wraps every list response in.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DataEnvelope<T> {
    pub data: Vec<T>,
}

/// Body of `POST /eventsub/subscriptions`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub condition: SubscriptionCondition,
    pub transport: SubscriptionTransport,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionCondition {
    /// Channel whose chat is read.
    pub broadcaster_user_id: String,
    /// Account reading the chat (the credential's owner).
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SubscriptionTransport {
    pub method: String,
    pub session_id: String,
}

impl SubscriptionRequest {
    /// `channel.chat.message` v1 delivered over the given websocket session.
    pub fn chat_messages(
        broadcaster_user_id: impl Into<String>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            kind: CHAT_MESSAGE_SUBSCRIPTION.to_string(),
            version: "1".to_string(),
            condition: SubscriptionCondition {
                broadcaster_user_id: broadcaster_user_id.into(),
                user_id: user_id.into(),
            },
            transport: SubscriptionTransport {
                method: "websocket".to_string(),
                session_id: session_id.into(),
            },
        }
    }
}

/// The created subscription, from the 202 response.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubscriptionInfo {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of `POST /moderation/bans`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct BanRequest<'a> {
    pub data: BanData<'a>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct BanData<'a> {
    pub user_id: &'a str,
    /// Absent for a permanent ban.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}

/// Error body Helix returns on failures.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct HelixErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
