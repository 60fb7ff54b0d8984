//! EventSub websocket envelopes.
//!
//! Every frame is `{"metadata": {...}, "payload": {...}}`. The metadata's
//! `message_type` selects how the payload is read.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::SessionError;

/// Envelope metadata common to every message.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Metadata {
    pub message_id: String,
    pub message_type: String,
    pub message_timestamp: DateTime<Utc>,
    /// Present on `notification` and `revocation`.
    #[serde(default)]
    pub subscription_type: Option<String>,
    #[serde(default)]
    pub subscription_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Envelope {
    metadata: Metadata,
    #[serde(default)]
    payload: serde_json::Value,
}

/// Session description carried by `session_welcome` and `session_reconnect`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SessionPayload {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    /// Null on `session_reconnect`.
    #[serde(default)]
    pub keepalive_timeout_seconds: Option<u64>,
    /// Set on `session_reconnect` only.
    #[serde(default)]
    pub reconnect_url: Option<String>,
    #[serde(default)]
    pub connected_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct SessionWrapper {
    session: SessionPayload,
}

/// The subscription a notification or revocation refers to.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SubscriptionPayload {
    pub id: String,
    pub status: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct NotificationWrapper {
    subscription: SubscriptionPayload,
    #[serde(default)]
    event: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct RevocationWrapper {
    subscription: SubscriptionPayload,
}

/// Event body of a `channel.chat.message` notification.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatMessageEvent {
    pub broadcaster_user_id: String,
    pub broadcaster_user_login: String,
    #[serde(default)]
    pub broadcaster_user_name: Option<String>,
    pub chatter_user_id: String,
    pub chatter_user_login: String,
    pub chatter_user_name: String,
    pub message_id: String,
    pub message: ChatMessageBody,
    #[serde(default)]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChatMessageBody {
    pub text: String,
}

/// A classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Welcome(SessionPayload),
    Keepalive,
    /// The provider wants us on a new connection at `reconnect_url`.
    Reconnect(SessionPayload),
    Notification {
        subscription: SubscriptionPayload,
        event: serde_json::Value,
    },
    Revocation(SubscriptionPayload),
    /// A `message_type` we do not know. Still counts as traffic.
    Unknown(String),
}

impl InboundMessage {
    /// Parse a text frame.
    pub fn parse(text: &str) -> Result<(Metadata, InboundMessage), SessionError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(anomaly)?;
        let metadata = envelope.metadata;
        let payload = envelope.payload;

        let message = match metadata.message_type.as_str() {
            "session_welcome" => {
                let wrapper: SessionWrapper = serde_json::from_value(payload).map_err(anomaly)?;
                InboundMessage::Welcome(wrapper.session)
            }
            "session_keepalive" => InboundMessage::Keepalive,
            "session_reconnect" => {
                let wrapper: SessionWrapper = serde_json::from_value(payload).map_err(anomaly)?;
                if wrapper.session.reconnect_url.is_none() {
                    return Err(SessionError::ProtocolAnomaly {
                        detail: "session_reconnect without reconnect_url".to_string(),
                    });
                }
                InboundMessage::Reconnect(wrapper.session)
            }
            "notification" => {
                let wrapper: NotificationWrapper =
                    serde_json::from_value(payload).map_err(anomaly)?;
                InboundMessage::Notification {
                    subscription: wrapper.subscription,
                    event: wrapper.event,
                }
            }
            "revocation" => {
                let wrapper: RevocationWrapper = serde_json::from_value(payload).map_err(anomaly)?;
                InboundMessage::Revocation(wrapper.subscription)
            }
            other => InboundMessage::Unknown(other.to_string()),
        };

        Ok((metadata, message))
    }
}

fn anomaly(err: serde_json::Error) -> SessionError {
    SessionError::ProtocolAnomaly {
        detail: err.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Frames shaped like the ones the provider sends.

    pub fn welcome(session_id: &str, keepalive_secs: u64) -> String {
        format!(
            r#"{{"metadata":{{"message_id":"w-{id}","message_type":"session_welcome","message_timestamp":"2026-10-16T10:00:00.000Z"}},"payload":{{"session":{{"id":"{id}","status":"connected","connected_at":"2026-10-16T10:00:00.000Z","keepalive_timeout_seconds":{ka},"reconnect_url":null}}}}}}"#,
            id = session_id,
            ka = keepalive_secs
        )
    }

    pub fn keepalive() -> String {
        r#"{"metadata":{"message_id":"k","message_type":"session_keepalive","message_timestamp":"2026-10-16T10:00:05.000Z"},"payload":{}}"#.to_string()
    }

    pub fn reconnect(session_id: &str, url: &str) -> String {
        format!(
            r#"{{"metadata":{{"message_id":"r","message_type":"session_reconnect","message_timestamp":"2026-10-16T10:05:00.000Z"}},"payload":{{"session":{{"id":"{id}","status":"reconnecting","keepalive_timeout_seconds":null,"reconnect_url":"{url}","connected_at":"2026-10-16T10:00:00.000Z"}}}}}}"#,
            id = session_id,
            url = url
        )
    }

    pub fn chat_message(message_id: &str, chatter_login: &str, text: &str) -> String {
        format!(
            r#"{{"metadata":{{"message_id":"n-{mid}","message_type":"notification","message_timestamp":"2026-10-16T10:01:00.000Z","subscription_type":"channel.chat.message","subscription_version":"1"}},"payload":{{"subscription":{{"id":"sub-1","status":"enabled","type":"channel.chat.message","version":"1","condition":{{"broadcaster_user_id":"100","user_id":"200"}}}},"event":{{"broadcaster_user_id":"100","broadcaster_user_login":"streamer","broadcaster_user_name":"Streamer","chatter_user_id":"300","chatter_user_login":"{login}","chatter_user_name":"{login}","message_id":"{mid}","message":{{"text":"{text}","fragments":[]}},"color":"","badges":[],"message_type":"text"}}}}}}"#,
            mid = message_id,
            login = chatter_login,
            text = text
        )
    }

    pub fn revocation() -> String {
        r#"{"metadata":{"message_id":"v","message_type":"revocation","message_timestamp":"2026-10-16T10:09:00.000Z","subscription_type":"channel.chat.message","subscription_version":"1"},"payload":{"subscription":{"id":"sub-1","status":"authorization_revoked","type":"channel.chat.message","version":"1"}}}"#.to_string()
    }
}
