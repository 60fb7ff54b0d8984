//! Retry-wrapped Helix client bound to the credential store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::api::HelixApi;
use super::types::{HelixUser, SubscriptionInfo, SubscriptionRequest};
use crate::auth::CredentialStore;
use crate::error::ApiError;
use crate::retry::RetryableRequest;
use crate::traits::AccountDirectory;

/// The privileged REST surface. Every method presents the store's current
/// access token and refreshes once on a 401.
#[derive(Clone)]
pub struct HelixClient {
    api: HelixApi,
    store: Arc<CredentialStore>,
}

impl HelixClient {
    pub fn new(api: HelixApi, store: Arc<CredentialStore>) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    /// Look up an account by login, or the credential's own account.
    pub async fn get_user(&self, login: Option<&str>) -> Result<Option<HelixUser>, ApiError> {
        let api = &self.api;
        RetryableRequest::new(&self.store)
            .execute(move |token| async move { api.fetch_user(&token, login).await })
            .await
    }

    pub async fn create_subscription(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionInfo, ApiError> {
        let api = &self.api;
        RetryableRequest::new(&self.store)
            .execute(move |token| async move { api.create_subscription(&token, request).await })
            .await
    }

    pub async fn delete_chat_message(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        message_id: &str,
    ) -> Result<(), ApiError> {
        let api = &self.api;
        RetryableRequest::new(&self.store)
            .execute(move |token| async move {
                api.delete_chat_message(&token, broadcaster_id, moderator_id, message_id)
                    .await
            })
            .await
    }

    /// Temporarily ban `user_id` for `duration_secs`.
    pub async fn timeout_user(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        user_id: &str,
        duration_secs: u32,
        reason: Option<&str>,
    ) -> Result<(), ApiError> {
        let api = &self.api;
        RetryableRequest::new(&self.store)
            .execute(move |token| async move {
                api.ban_user(
                    &token,
                    broadcaster_id,
                    moderator_id,
                    user_id,
                    Some(duration_secs),
                    reason,
                )
                .await
            })
            .await
    }

    pub async fn ban_user(
        &self,
        broadcaster_id: &str,
        moderator_id: &str,
        user_id: &str,
        reason: Option<&str>,
    ) -> Result<(), ApiError> {
        let api = &self.api;
        RetryableRequest::new(&self.store)
            .execute(move |token| async move {
                api.ban_user(&token, broadcaster_id, moderator_id, user_id, None, reason)
                    .await
            })
            .await
    }
}

#[async_trait]
impl AccountDirectory for HelixClient {
    async fn account_created_at(&self, login: &str) -> Result<Option<DateTime<Utc>>, ApiError> {
        Ok(self.get_user(Some(login)).await?.map(|user| user.created_at))
    }
}
