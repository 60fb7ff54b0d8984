//! Credentials provider trait abstraction.
//!
//! Durable storage for the single credential record. The credential store
//! writes through this trait on every mutation.

use async_trait::async_trait;

use crate::auth::Credential;

/// Credentials storage errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialsError {
    #[error("Failed to load credentials: {0}")]
    LoadFailed(String),
    #[error("Failed to save credentials: {0}")]
    SaveFailed(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Trait for credential storage and retrieval.
///
/// ```ignore
/// if let Some(credential) = provider.load().await? {
///     store.install(credential).await;
/// }
/// ```
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Load the persisted credential.
    ///
    /// - `Ok(Some(credential))` if a record exists
    /// - `Ok(None)` if nothing is stored (selects device authorization)
    async fn load(&self) -> Result<Option<Credential>, CredentialsError>;

    /// Replace the persisted record. Must be atomic: a reader never observes
    /// a partially written credential.
    async fn save(&self, credential: &Credential) -> Result<(), CredentialsError>;
}
