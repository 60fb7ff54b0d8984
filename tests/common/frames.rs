//! Websocket frames as the provider sends them.

pub fn welcome(session_id: &str, keepalive_secs: u64) -> String {
    serde_json::json!({
        "metadata": {
            "message_id": format!("welcome-{}", session_id),
            "message_type": "session_welcome",
            "message_timestamp": "2026-10-16T10:00:00.000Z",
        },
        "payload": {
            "session": {
                "id": session_id,
                "status": "connected",
                "connected_at": "2026-10-16T10:00:00.000Z",
                "keepalive_timeout_seconds": keepalive_secs,
                "reconnect_url": null,
            }
        }
    })
    .to_string()
}

pub fn reconnect(session_id: &str, url: &str) -> String {
    serde_json::json!({
        "metadata": {
            "message_id": format!("reconnect-{}", session_id),
            "message_type": "session_reconnect",
            "message_timestamp": "2026-10-16T10:05:00.000Z",
        },
        "payload": {
            "session": {
                "id": session_id,
                "status": "reconnecting",
                "connected_at": "2026-10-16T10:00:00.000Z",
                "keepalive_timeout_seconds": null,
                "reconnect_url": url,
            }
        }
    })
    .to_string()
}

pub fn chat_message(message_id: &str, chatter_login: &str, text: &str) -> String {
    serde_json::json!({
        "metadata": {
            "message_id": format!("notification-{}", message_id),
            "message_type": "notification",
            "message_timestamp": "2026-10-16T10:01:00.000Z",
            "subscription_type": "channel.chat.message",
            "subscription_version": "1",
        },
        "payload": {
            "subscription": {
                "id": "sub-1",
                "status": "enabled",
                "type": "channel.chat.message",
                "version": "1",
            },
            "event": {
                "broadcaster_user_id": super::BROADCASTER_ID,
                "broadcaster_user_login": "streamer",
                "broadcaster_user_name": "Streamer",
                "chatter_user_id": format!("id-{}", chatter_login),
                "chatter_user_login": chatter_login,
                "chatter_user_name": chatter_login,
                "message_id": message_id,
                "message": { "text": text, "fragments": [] },
                "message_type": "text",
            }
        }
    })
    .to_string()
}
