//! File-based credentials provider adapter.
//!
//! Wraps [`CredentialsManager`] so the credential store can persist through
//! the [`CredentialsProvider`] trait.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::auth::credentials::{Credential, CredentialsManager};
use crate::traits::{CredentialsError, CredentialsProvider};

/// File-based credentials provider.
///
/// Defaults to `~/.modrelay/tokens.json`; [`FileCredentialsProvider::with_path`]
/// points it elsewhere.
#[derive(Debug, Clone)]
pub struct FileCredentialsProvider {
    manager: CredentialsManager,
}

impl FileCredentialsProvider {
    /// Provider for the default location.
    ///
    /// Fails if the home directory cannot be determined.
    pub fn new() -> Result<Self, CredentialsError> {
        CredentialsManager::new()
            .map(|manager| Self { manager })
            .ok_or_else(|| {
                CredentialsError::LoadFailed("Failed to determine home directory".to_string())
            })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            manager: CredentialsManager::with_path(path),
        }
    }

    pub fn credentials_path(&self) -> &Path {
        self.manager.credentials_path()
    }
}

#[async_trait]
impl CredentialsProvider for FileCredentialsProvider {
    async fn load(&self) -> Result<Option<Credential>, CredentialsError> {
        self.manager.load().map_err(|e| {
            CredentialsError::LoadFailed(format!(
                "{}: {}",
                self.manager.credentials_path().display(),
                e
            ))
        })
    }

    async fn save(&self, credential: &Credential) -> Result<(), CredentialsError> {
        self.manager.save(credential).map_err(|e| {
            CredentialsError::SaveFailed(format!(
                "{}: {}",
                self.manager.credentials_path().display(),
                e
            ))
        })
    }
}
