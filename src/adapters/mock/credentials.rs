//! In-memory credentials provider for testing.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::auth::Credential;
use crate::traits::{CredentialsError, CredentialsProvider};

/// In-memory credentials provider.
///
/// Counts saves so tests can assert that a mutation was persisted exactly
/// once.
///
/// ```ignore
/// let provider = InMemoryCredentials::new();
/// assert!(provider.load().await?.is_none());
/// provider.save(&credential).await?;
/// assert_eq!(provider.save_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryCredentials {
    credential: Arc<Mutex<Option<Credential>>>,
    save_should_fail: Arc<Mutex<bool>>,
    load_should_fail: Arc<Mutex<bool>>,
    saves: Arc<Mutex<usize>>,
}

impl InMemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding an initial credential.
    pub fn with_credential(credential: Credential) -> Self {
        let provider = Self::new();
        provider.set_credential(Some(credential));
        provider
    }

    pub fn set_save_should_fail(&self, should_fail: bool) {
        *self.save_should_fail.lock().unwrap() = should_fail;
    }

    pub fn set_load_should_fail(&self, should_fail: bool) {
        *self.load_should_fail.lock().unwrap() = should_fail;
    }

    /// Current stored credential, read synchronously.
    pub fn get_credential(&self) -> Option<Credential> {
        self.credential.lock().unwrap().clone()
    }

    pub fn set_credential(&self, credential: Option<Credential>) {
        *self.credential.lock().unwrap() = credential;
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

#[async_trait]
impl CredentialsProvider for InMemoryCredentials {
    async fn load(&self) -> Result<Option<Credential>, CredentialsError> {
        if *self.load_should_fail.lock().unwrap() {
            return Err(CredentialsError::LoadFailed("Mock load failure".to_string()));
        }

        Ok(self.credential.lock().unwrap().clone())
    }

    async fn save(&self, credential: &Credential) -> Result<(), CredentialsError> {
        if *self.save_should_fail.lock().unwrap() {
            return Err(CredentialsError::SaveFailed("Mock save failure".to_string()));
        }

        *self.credential.lock().unwrap() = Some(credential.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential() -> Credential {
        Credential {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let provider = InMemoryCredentials::new();
        assert!(provider.load().await.unwrap().is_none());

        provider.save(&credential()).await.unwrap();
        assert_eq!(provider.load().await.unwrap(), Some(credential()));
        assert_eq!(provider.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_counted() {
        let provider = InMemoryCredentials::with_credential(credential());
        provider.set_save_should_fail(true);

        let err = provider.save(&Credential::new()).await.unwrap_err();
        assert!(matches!(err, CredentialsError::SaveFailed(_)));
        assert_eq!(provider.save_count(), 0);
        assert_eq!(provider.get_credential(), Some(credential()));

        provider.set_load_should_fail(true);
        assert!(provider.load().await.is_err());
    }
}
