//! Credential record and its on-disk storage.
//!
//! The credential lives in `~/.modrelay/tokens.json` unless a different path
//! is configured. Writes go to a sibling temp file which is then renamed over
//! the target, so a crash mid-write never leaves a truncated record.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// The credentials directory name.
const CREDENTIALS_DIR: &str = ".modrelay";

/// The credentials file name.
const CREDENTIALS_FILE: &str = "tokens.json";

/// Token material for the privileged identity.
///
/// Every field is optional: the record starts empty, the device flow fills
/// in the pending-authorization fields, and completion fills in the tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credential {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Id of the account the tokens belong to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_uri: Option<String>,
}

impl Credential {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Replace the token pair, keeping the identity fields.
    pub fn with_tokens(mut self, access_token: String, refresh_token: Option<String>) -> Self {
        self.access_token = Some(access_token);
        if refresh_token.is_some() {
            self.refresh_token = refresh_token;
        }
        self
    }

    /// Drop the pending device-authorization fields once the grant completes.
    pub fn clear_device_fields(&mut self) {
        self.device_code = None;
        self.user_code = None;
        self.verification_uri = None;
    }
}

/// Reads and writes the credential file.
#[derive(Debug, Clone)]
pub struct CredentialsManager {
    credentials_path: PathBuf,
}

impl CredentialsManager {
    /// Manager for the default location under the home directory.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self::with_path(
            home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE),
        ))
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: path.into(),
        }
    }

    pub fn credentials_path(&self) -> &Path {
        &self.credentials_path
    }

    /// Load the stored credential.
    ///
    /// A missing file is `Ok(None)`. An unreadable or corrupt file is an
    /// error; startup logs it and authorizes again, which overwrites the
    /// broken record.
    pub fn load(&self) -> std::io::Result<Option<Credential>> {
        let file = match File::open(&self.credentials_path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };

        let reader = BufReader::new(file);
        let credential = serde_json::from_reader(reader)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Some(credential))
    }

    /// Atomically replace the stored credential.
    pub fn save(&self, credential: &Credential) -> std::io::Result<()> {
        if let Some(parent) = self.credentials_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = self.tmp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, credential)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
        }

        fs::rename(&tmp_path, &self.credentials_path)
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .credentials_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CREDENTIALS_FILE.into());
        name.push(".tmp");
        self.credentials_path.with_file_name(name)
    }
}
