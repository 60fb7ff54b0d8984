//! Moderation actions on a reviewed event.

use tracing::info;

use super::ModerationEvent;
use crate::error::ApiError;
use crate::helix::HelixClient;

/// Acts on flagged messages as the moderator account.
///
/// Every action goes through [`HelixClient`], so a stale token is
/// refreshed once before the action fails.
#[derive(Clone)]
pub struct ModerationActions {
    helix: HelixClient,
    broadcaster_id: String,
    moderator_id: String,
}

impl ModerationActions {
    pub fn new(
        helix: HelixClient,
        broadcaster_id: impl Into<String>,
        moderator_id: impl Into<String>,
    ) -> Self {
        Self {
            helix,
            broadcaster_id: broadcaster_id.into(),
            moderator_id: moderator_id.into(),
        }
    }

    /// Remove the flagged message from chat.
    pub async fn delete_message(&self, event: &ModerationEvent) -> Result<(), ApiError> {
        self.helix
            .delete_chat_message(&self.broadcaster_id, &self.moderator_id, &event.message_id)
            .await?;
        info!(message_id = %event.message_id, chatter = %event.chatter_login, "Message deleted");
        Ok(())
    }

    pub async fn timeout(
        &self,
        event: &ModerationEvent,
        duration_secs: u32,
        reason: Option<&str>,
    ) -> Result<(), ApiError> {
        self.helix
            .timeout_user(
                &self.broadcaster_id,
                &self.moderator_id,
                &event.chatter_id,
                duration_secs,
                reason,
            )
            .await?;
        info!(chatter = %event.chatter_login, duration_secs, "Chatter timed out");
        Ok(())
    }

    pub async fn ban(&self, event: &ModerationEvent, reason: Option<&str>) -> Result<(), ApiError> {
        self.helix
            .ban_user(&self.broadcaster_id, &self.moderator_id, &event.chatter_id, reason)
            .await?;
        info!(chatter = %event.chatter_login, "Chatter banned");
        Ok(())
    }
}
