/// Sync credentials and connection record
/// The bearer token is kept in the OS credential store; the rest of the
/// connection (account, container, version token) lives in sync.json
use crate::config::{KEYRING_SERVICE, SYNC_CONFIG_FILE};
use crate::error::{AppError, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;

/// Where the sync token is kept
pub trait SecretStore: Send + Sync {
    fn get_token(&self, account: &str) -> Result<Option<String>>;
    fn set_token(&self, account: &str, token: &str) -> Result<()>;
    fn delete_token(&self, account: &str) -> Result<()>;
}

/// OS credential store via keyring
pub struct KeyringSecretStore;

impl KeyringSecretStore {
    fn entry(account: &str) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE, account)
            .map_err(|e| AppError::Generic(format!("Failed to create keyring entry: {}", e)))
    }
}

impl SecretStore for KeyringSecretStore {
    fn get_token(&self, account: &str) -> Result<Option<String>> {
        match Self::entry(account)?.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(AppError::Generic(format!("Failed to retrieve token: {}", e))),
        }
    }

    fn set_token(&self, account: &str, token: &str) -> Result<()> {
        Self::entry(account)?
            .set_password(token)
            .map_err(|e| AppError::Generic(format!("Failed to store token: {}", e)))?;

        tracing::info!("Sync token stored in credential manager");
        Ok(())
    }

    fn delete_token(&self, account: &str) -> Result<()> {
        match Self::entry(account)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => {
                tracing::info!("Sync token deleted from credential manager");
                Ok(())
            }
            Err(e) => Err(AppError::Generic(format!("Failed to delete token: {}", e))),
        }
    }
}

/// Process-local secret store
#[derive(Default)]
pub struct MemorySecretStore {
    tokens: Mutex<HashMap<String, String>>,
}

impl SecretStore for MemorySecretStore {
    fn get_token(&self, account: &str) -> Result<Option<String>> {
        let tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tokens.get(account).cloned())
    }

    fn set_token(&self, account: &str, token: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.insert(account.to_string(), token.to_string());
        Ok(())
    }

    fn delete_token(&self, account: &str) -> Result<()> {
        let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
        tokens.remove(account);
        Ok(())
    }
}

/// Persisted connection state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Account handle returned by the identity check
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub container: Option<String>,
    /// Version token of the remote file as last seen
    #[serde(default)]
    pub file_sha: Option<String>,
    /// SHA-256 of the last snapshot pushed or pulled
    #[serde(default)]
    pub last_digest: Option<String>,
}

impl SyncConfig {
    pub fn is_connected(&self) -> bool {
        self.account.is_some() && self.container.is_some()
    }
}

/// sync.json on disk
#[derive(Clone)]
pub struct SyncConfigFile {
    path: PathBuf,
}

impl SyncConfigFile {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(SYNC_CONFIG_FILE),
        }
    }

    /// Load the sync config, or the disconnected default when absent
    pub async fn load(&self) -> Result<SyncConfig> {
        if !self.path.exists() {
            tracing::debug!("No sync config, sync is disconnected");
            return Ok(SyncConfig::default());
        }

        let content = fs::read_to_string(&self.path).await?;
        let config: SyncConfig = serde_json::from_str(&content)
            .map_err(|e| AppError::Parse(format!("Failed to parse sync config: {}", e)))?;

        Ok(config)
    }

    pub async fn save(&self, config: &SyncConfig) -> Result<()> {
        let content = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, content).await?;
        tracing::debug!("Sync config saved to {:?}", self.path);
        Ok(())
    }

    pub async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sync_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let file = SyncConfigFile::new(dir.path());

        assert_eq!(file.load().await.unwrap(), SyncConfig::default());

        let config = SyncConfig {
            account: Some("sam".to_string()),
            container: Some("books".to_string()),
            file_sha: Some("abc".to_string()),
            last_digest: None,
        };
        file.save(&config).await.unwrap();
        assert_eq!(file.load().await.unwrap(), config);
        assert!(config.is_connected());

        file.clear().await.unwrap();
        assert!(!file.load().await.unwrap().is_connected());
    }

    #[test]
    fn test_memory_secret_store() {
        let secrets = MemorySecretStore::default();
        assert_eq!(secrets.get_token("sam").unwrap(), None);

        secrets.set_token("sam", "t0k3n").unwrap();
        assert_eq!(secrets.get_token("sam").unwrap().as_deref(), Some("t0k3n"));

        secrets.delete_token("sam").unwrap();
        assert_eq!(secrets.get_token("sam").unwrap(), None);
    }
}
