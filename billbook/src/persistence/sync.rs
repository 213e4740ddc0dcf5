//! Remote sync
//!
//! Mirrors the dataset to one file in a remote container. Writes are
//! conditional on the last seen version token (`fileSha`): a conflict
//! re-reads the current token and retries once before giving up. Reads
//! replace whole collections through the configured merge strategy, run
//! address migration, and commit through the store so the local cache
//! follows.
//!
//! Known limitation: a pull that completes while the user is editing
//! replaces the edited collections wholesale (last writer wins).

use super::credentials::{SecretStore, SyncConfig, SyncConfigFile};
use super::debounce::Debouncer;
use super::merge::{check_snapshot, fold_snapshot, MergeStrategy};
use super::remote::{RemoteFile, RemoteStore, SyncResult};
use crate::config::REMOTE_DATA_FILE;
use crate::error::{AppError, Result, SyncError};
use crate::store::{Dataset, Snapshot, Store};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};

/// Visible sync indicator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SyncStatus {
    Disconnected,
    Syncing,
    Synced,
    Error(String),
}

/// Timings for remote exchanges
#[derive(Debug, Clone, Copy)]
pub struct SyncTimings {
    pub debounce: Duration,
    pub timeout: Duration,
    pub provision_wait: Duration,
}

/// Serialized dataset and its SHA-256
fn encode_dataset(data: &Dataset) -> Result<(String, String)> {
    let json = serde_json::to_string_pretty(data)?;
    let digest = format!("{:x}", Sha256::digest(json.as_bytes()));
    Ok((json, digest))
}

struct SyncInner {
    store: Store,
    remote: Arc<dyn RemoteStore>,
    secrets: Arc<dyn SecretStore>,
    merge: Arc<dyn MergeStrategy>,
    config_file: SyncConfigFile,
    /// Held for the whole of every exchange, so pushes and pulls never overlap
    config: Mutex<SyncConfig>,
    connected: AtomicBool,
    status: watch::Sender<SyncStatus>,
    timings: SyncTimings,
}

impl SyncInner {
    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    /// Record a failed exchange on the indicator and hand the error back
    fn fail(&self, operation: &str, e: AppError) -> AppError {
        tracing::error!("Sync {} failed: {}", operation, e);
        self.set_status(SyncStatus::Error(e.to_string()));
        e
    }

    async fn timed<T>(&self, call: impl Future<Output = SyncResult<T>>) -> SyncResult<T> {
        tokio::time::timeout(self.timings.timeout, call)
            .await
            .map_err(|_| SyncError::Timeout(self.timings.timeout))?
    }

    fn token_for(&self, config: &SyncConfig) -> Result<(String, String, String)> {
        let (Some(account), Some(container)) = (&config.account, &config.container) else {
            return Err(SyncError::NotConnected.into());
        };
        let token = self
            .secrets
            .get_token(account)?
            .ok_or(SyncError::NotConnected)?;
        Ok((account.clone(), container.clone(), token))
    }

    async fn put_once(
        &self,
        token: &str,
        container: &str,
        json: &str,
        sha: Option<&str>,
    ) -> SyncResult<String> {
        self.timed(self.remote.put_file(
            token,
            container,
            REMOTE_DATA_FILE,
            json,
            "Update billbook data",
            sha,
        ))
        .await
    }

    /// Push the current dataset. Returns false when nothing changed since
    /// the last exchange and `force` is not set.
    async fn push_locked(&self, config: &mut SyncConfig, force: bool) -> Result<bool> {
        let (_, container, token) = self.token_for(config)?;
        let (json, digest) = encode_dataset(&self.store.snapshot())?;

        if !force && config.last_digest.as_deref() == Some(digest.as_str()) {
            tracing::debug!("Dataset unchanged since last sync, skipping push");
            return Ok(false);
        }

        self.set_status(SyncStatus::Syncing);
        let sha = match self
            .put_once(&token, &container, &json, config.file_sha.as_deref())
            .await
        {
            Ok(sha) => sha,
            Err(SyncError::Conflict) => {
                tracing::warn!("Remote file moved, refreshing version token and retrying");
                let current = self
                    .timed(self.remote.get_file(&token, &container, REMOTE_DATA_FILE))
                    .await?
                    .map(|file| file.sha);

                match self
                    .put_once(&token, &container, &json, current.as_deref())
                    .await
                {
                    Ok(sha) => sha,
                    Err(SyncError::Conflict) => return Err(SyncError::ConflictExhausted.into()),
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        config.file_sha = Some(sha);
        config.last_digest = Some(digest);
        self.config_file.save(config).await?;

        self.set_status(SyncStatus::Synced);
        tracing::info!("Pushed dataset to {}/{}", container, REMOTE_DATA_FILE);
        Ok(true)
    }

    /// Fold a fetched remote file into the store
    fn apply_remote(&self, config: &mut SyncConfig, file: RemoteFile) -> Result<()> {
        let snapshot: Snapshot = serde_json::from_str(&file.content)
            .map_err(|e| SyncError::Decode(format!("Remote data is not valid: {}", e)))?;
        check_snapshot(&snapshot)
            .map_err(|e| SyncError::Decode(format!("Remote data is not valid: {}", e)))?;

        let merge = Arc::clone(&self.merge);
        self.store.mutate(move |data| {
            fold_snapshot(merge.as_ref(), data, snapshot);
            Ok(())
        })?;

        let (_, digest) = encode_dataset(&self.store.snapshot())?;
        config.file_sha = Some(file.sha);
        config.last_digest = Some(digest);
        Ok(())
    }

    /// Pull the remote file. Returns false when it does not exist.
    async fn pull_locked(&self, config: &mut SyncConfig) -> Result<bool> {
        let (_, container, token) = self.token_for(config)?;

        self.set_status(SyncStatus::Syncing);
        let file = self
            .timed(self.remote.get_file(&token, &container, REMOTE_DATA_FILE))
            .await?;

        let Some(file) = file else {
            tracing::info!("No remote data file yet in {}", container);
            self.set_status(SyncStatus::Synced);
            return Ok(false);
        };

        self.apply_remote(config, file)?;
        self.config_file.save(config).await?;

        self.set_status(SyncStatus::Synced);
        tracing::info!("Pulled dataset from {}/{}", container, REMOTE_DATA_FILE);
        Ok(true)
    }

    async fn debounced_push(&self) {
        if !self.connected.load(Ordering::SeqCst) {
            return;
        }
        let mut config = self.config.lock().await;
        if let Err(e) = self.push_locked(&mut config, false).await {
            self.fail("push", e);
        }
    }
}

/// Sync service handle
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncInner>,
    debouncer: Debouncer,
}

impl SyncService {
    /// Must be called inside a tokio runtime (spawns the debounce worker)
    pub fn new(
        store: Store,
        remote: Arc<dyn RemoteStore>,
        secrets: Arc<dyn SecretStore>,
        merge: Arc<dyn MergeStrategy>,
        config_file: SyncConfigFile,
        timings: SyncTimings,
    ) -> Self {
        let (status, _) = watch::channel(SyncStatus::Disconnected);
        let inner = Arc::new(SyncInner {
            store,
            remote,
            secrets,
            merge,
            config_file,
            config: Mutex::new(SyncConfig::default()),
            connected: AtomicBool::new(false),
            status,
            timings,
        });

        let weak: Weak<SyncInner> = Arc::downgrade(&inner);
        let debouncer = Debouncer::spawn(timings.debounce, move || {
            let weak = weak.clone();
            async move {
                if let Some(inner) = weak.upgrade() {
                    inner.debounced_push().await;
                }
            }
        });

        Self { inner, debouncer }
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    pub async fn config(&self) -> SyncConfig {
        self.inner.config.lock().await.clone()
    }

    /// Read sync.json. Leaves the indicator at synced (connected) or
    /// disconnected; no remote call is made.
    pub async fn load_config(&self) -> Result<SyncConfig> {
        let loaded = self.inner.config_file.load().await?;
        let connected = loaded.is_connected();

        *self.inner.config.lock().await = loaded.clone();
        self.inner.connected.store(connected, Ordering::SeqCst);
        self.inner.set_status(if connected {
            SyncStatus::Synced
        } else {
            SyncStatus::Disconnected
        });

        tracing::info!(
            "Sync config loaded ({})",
            if connected { "connected" } else { "disconnected" }
        );
        Ok(loaded)
    }

    /// Validate the token, make sure the container exists, then pull the
    /// remote file if there is one or push local data as the first copy.
    pub async fn connect(&self, token: &str, container: &str) -> Result<()> {
        let inner = &self.inner;
        let mut config = inner.config.lock().await;
        inner.set_status(SyncStatus::Syncing);

        let result = async {
            let account = inner.timed(inner.remote.identity(token)).await?;
            tracing::info!("Sync credential valid for {}", account);

            if !inner
                .timed(inner.remote.container_exists(token, container))
                .await?
            {
                inner
                    .timed(inner.remote.create_container(token, container))
                    .await?;
                tokio::time::sleep(inner.timings.provision_wait).await;
            }

            inner.secrets.set_token(&account, token)?;
            *config = SyncConfig {
                account: Some(account),
                container: Some(container.to_string()),
                file_sha: None,
                last_digest: None,
            };
            inner.config_file.save(&config).await?;
            inner.connected.store(true, Ordering::SeqCst);

            if !inner.pull_locked(&mut config).await? {
                inner.push_locked(&mut config, true).await?;
            }
            Ok::<(), AppError>(())
        }
        .await;

        result.map_err(|e| inner.fail("connect", e))
    }

    /// Push now, bypassing the debounce
    pub async fn push(&self) -> Result<bool> {
        let mut config = self.inner.config.lock().await;
        self.inner
            .push_locked(&mut config, false)
            .await
            .map_err(|e| self.inner.fail("push", e))
    }

    /// Pull now. Returns false when the remote file does not exist yet.
    pub async fn pull(&self) -> Result<bool> {
        let mut config = self.inner.config.lock().await;
        self.inner
            .pull_locked(&mut config)
            .await
            .map_err(|e| self.inner.fail("pull", e))
    }

    /// Forget the connection. Local data stays; no further remote calls.
    pub async fn disconnect(&self) -> Result<()> {
        let mut config = self.inner.config.lock().await;
        self.inner.connected.store(false, Ordering::SeqCst);
        self.debouncer.cancel();

        if let Some(account) = &config.account {
            self.inner.secrets.delete_token(account)?;
        }
        *config = SyncConfig::default();
        self.inner.config_file.clear().await?;

        self.inner.set_status(SyncStatus::Disconnected);
        tracing::info!("Sync disconnected");
        Ok(())
    }

    /// Queue a debounced push after a local change
    pub fn schedule(&self) {
        if self.is_connected() {
            self.debouncer.touch();
        }
    }

    /// Run a queued push immediately and wait for it
    pub async fn flush(&self) {
        self.debouncer.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::credentials::MemorySecretStore;
    use crate::persistence::merge::ReplaceCollections;
    use crate::store::{Address, Client, Settings};
    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct FakeState {
        containers: HashSet<String>,
        files: HashMap<String, RemoteFile>,
        version: u32,
        puts: usize,
        /// Conflicts to report before honouring writes
        conflicts: usize,
        hang: bool,
    }

    #[derive(Default)]
    struct FakeRemote {
        state: StdMutex<FakeState>,
    }

    impl FakeRemote {
        fn with_file(container: &str, content: &str) -> Self {
            let fake = Self::default();
            {
                let mut state = fake.state.lock().unwrap();
                state.containers.insert(container.to_string());
                state.files.insert(
                    container.to_string(),
                    RemoteFile {
                        content: content.to_string(),
                        sha: "v0".to_string(),
                    },
                );
            }
            fake
        }

        fn stored(&self, container: &str) -> Option<RemoteFile> {
            self.state.lock().unwrap().files.get(container).cloned()
        }
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn identity(&self, token: &str) -> SyncResult<String> {
            let hang = self.state.lock().unwrap().hang;
            if hang {
                std::future::pending::<()>().await;
            }
            match token {
                "good" => Ok("sam".to_string()),
                "readonly" => Err(SyncError::PermissionDenied("identity".to_string())),
                _ => Err(SyncError::BadCredential),
            }
        }

        async fn container_exists(&self, _token: &str, container: &str) -> SyncResult<bool> {
            Ok(self.state.lock().unwrap().containers.contains(container))
        }

        async fn create_container(&self, _token: &str, container: &str) -> SyncResult<()> {
            self.state.lock().unwrap().containers.insert(container.to_string());
            Ok(())
        }

        async fn get_file(
            &self,
            _token: &str,
            container: &str,
            _path: &str,
        ) -> SyncResult<Option<RemoteFile>> {
            Ok(self.stored(container))
        }

        async fn put_file(
            &self,
            _token: &str,
            container: &str,
            _path: &str,
            content: &str,
            _message: &str,
            sha: Option<&str>,
        ) -> SyncResult<String> {
            let mut state = self.state.lock().unwrap();
            state.puts += 1;

            if state.conflicts > 0 {
                state.conflicts -= 1;
                state.version += 1;
                let moved = format!("v{}", state.version);
                if let Some(file) = state.files.get_mut(container) {
                    file.sha = moved;
                }
                return Err(SyncError::Conflict);
            }

            let current = state.files.get(container).map(|f| f.sha.clone());
            if current.as_deref() != sha {
                return Err(SyncError::Conflict);
            }

            state.version += 1;
            let new_sha = format!("v{}", state.version);
            state.files.insert(
                container.to_string(),
                RemoteFile {
                    content: content.to_string(),
                    sha: new_sha.clone(),
                },
            );
            Ok(new_sha)
        }
    }

    fn timings() -> SyncTimings {
        SyncTimings {
            debounce: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            provision_wait: Duration::from_millis(10),
        }
    }

    fn service(dir: &TempDir, store: Store, remote: Arc<FakeRemote>) -> SyncService {
        SyncService::new(
            store,
            remote,
            Arc::new(MemorySecretStore::default()),
            Arc::new(ReplaceCollections),
            SyncConfigFile::new(dir.path()),
            timings(),
        )
    }

    fn store_with_prefix(prefix: &str) -> Store {
        let mut data = Dataset::default();
        data.settings = Settings {
            invoice_prefix: prefix.to_string(),
            ..Settings::default()
        };
        Store::new(data)
    }

    #[tokio::test]
    async fn test_connect_provisions_and_pushes_local_state() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let sync = service(&dir, store_with_prefix("LOCAL-"), Arc::clone(&remote));

        sync.connect("good", "books").await.unwrap();

        let stored = remote.stored("books").unwrap();
        assert!(stored.content.contains("LOCAL-"));
        assert_eq!(sync.status(), SyncStatus::Synced);

        let config = sync.config().await;
        assert_eq!(config.account.as_deref(), Some("sam"));
        assert_eq!(config.file_sha, Some(stored.sha));

        // Nothing changed since the push
        assert!(!sync.push().await.unwrap());
    }

    #[tokio::test]
    async fn test_connect_pulls_existing_remote_and_migrates() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::with_file(
            "books",
            r#"{
                "clients": [{
                    "id": "c1",
                    "company": "Remote Co",
                    "address": "5 Oak St\nDayton, OH 45402",
                    "createdAt": "2024-01-01T00:00:00Z",
                    "updatedAt": "2024-01-01T00:00:00Z"
                }]
            }"#,
        ));
        let store = store_with_prefix("LOCAL-");
        let sync = service(&dir, store.clone(), Arc::clone(&remote));

        sync.connect("good", "books").await.unwrap();

        let clients = store.list_clients();
        assert_eq!(clients.len(), 1);
        assert_eq!(clients[0].address.city, "Dayton");
        assert!(clients[0].address.legacy.is_none());
        // Collections absent remotely are left alone
        assert_eq!(store.settings().invoice_prefix, "LOCAL-");
        assert_eq!(sync.config().await.file_sha.as_deref(), Some("v0"));
        assert_eq!(remote.state.lock().unwrap().puts, 0);
    }

    const REMOTE_INVOICE: &str = r#"{
        "invoices": [{
            "id": "i1",
            "documentNumber": "INV-5000",
            "date": "2024-01-01",
            "from": {},
            "to": {"company": "Remote Co"},
            "lineItems": [{"description": "Work", "quantity": QTY, "rate": 100, "amount": 5}],
            "subtotal": 5,
            "total": 5,
            "status": "sent",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }]
    }"#;

    #[tokio::test]
    async fn test_pull_recomputes_derived_totals() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::with_file(
            "books",
            &REMOTE_INVOICE.replace("QTY", "2"),
        ));
        let store = Store::default();
        let sync = service(&dir, store.clone(), remote);

        sync.connect("good", "books").await.unwrap();

        let invoice = store.get_invoice("i1").unwrap();
        assert_eq!(invoice.body.line_items[0].amount, Decimal::from(200));
        assert_eq!(invoice.body.total, Decimal::from(200));
    }

    #[tokio::test]
    async fn test_pull_rejects_out_of_range_remote_data() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::with_file(
            "books",
            &REMOTE_INVOICE.replace("QTY", "1000000000000000"),
        ));
        let store = store_with_prefix("LOCAL-");
        let sync = service(&dir, store.clone(), remote);

        let result = sync.connect("good", "books").await;
        assert!(matches!(result, Err(AppError::Sync(SyncError::Decode(_)))));
        assert!(store.list_invoices().is_empty());
        assert_eq!(store.settings().invoice_prefix, "LOCAL-");
    }

    #[tokio::test]
    async fn test_connect_reports_distinct_failures() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let sync = service(&dir, Store::default(), remote);

        let bad = sync.connect("nope", "books").await;
        assert!(matches!(bad, Err(AppError::Sync(SyncError::BadCredential))));
        assert!(matches!(sync.status(), SyncStatus::Error(_)));
        assert!(!sync.is_connected());

        let denied = sync.connect("readonly", "books").await;
        assert!(matches!(
            denied,
            Err(AppError::Sync(SyncError::PermissionDenied(_)))
        ));
    }

    #[tokio::test]
    async fn test_conflict_retries_once() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let store = store_with_prefix("A-");
        let sync = service(&dir, store.clone(), Arc::clone(&remote));
        sync.connect("good", "books").await.unwrap();

        store
            .mutate(|data| {
                data.settings.invoice_prefix = "B-".to_string();
                Ok(())
            })
            .unwrap();
        remote.state.lock().unwrap().conflicts = 1;
        let puts_before = remote.state.lock().unwrap().puts;

        assert!(sync.push().await.unwrap());
        assert_eq!(remote.state.lock().unwrap().puts, puts_before + 2);
        assert!(remote.stored("books").unwrap().content.contains("B-"));

        store
            .mutate(|data| {
                data.settings.invoice_prefix = "C-".to_string();
                Ok(())
            })
            .unwrap();
        remote.state.lock().unwrap().conflicts = 2;

        let exhausted = sync.push().await;
        assert!(matches!(
            exhausted,
            Err(AppError::Sync(SyncError::ConflictExhausted))
        ));
        assert!(matches!(sync.status(), SyncStatus::Error(_)));
        // Local data is untouched by the failure
        assert_eq!(store.settings().invoice_prefix, "C-");
    }

    #[tokio::test]
    async fn test_disconnect_forgets_connection() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let store = store_with_prefix("A-");
        let sync = service(&dir, store.clone(), Arc::clone(&remote));
        sync.connect("good", "books").await.unwrap();

        sync.disconnect().await.unwrap();
        assert_eq!(sync.status(), SyncStatus::Disconnected);
        assert_eq!(sync.config().await, SyncConfig::default());
        assert!(matches!(
            sync.push().await,
            Err(AppError::Sync(SyncError::NotConnected))
        ));

        let puts = remote.state.lock().unwrap().puts;
        sync.schedule();
        sync.flush().await;
        assert_eq!(remote.state.lock().unwrap().puts, puts);

        let reloaded = service(&dir, Store::default(), remote);
        assert!(!reloaded.load_config().await.unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_scheduled_push_runs_on_flush() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let store = store_with_prefix("A-");
        let sync = service(&dir, store.clone(), Arc::clone(&remote));
        sync.connect("good", "books").await.unwrap();

        let now = Utc::now();
        store
            .mutate(|data| {
                data.clients.push(Client {
                    id: "c9".to_string(),
                    company: "Queued".to_string(),
                    name: String::new(),
                    email: String::new(),
                    phone: String::new(),
                    address: Address::default(),
                    created_at: now,
                    updated_at: now,
                });
                Ok(())
            })
            .unwrap();

        sync.schedule();
        sync.schedule();
        sync.flush().await;

        assert!(remote.stored("books").unwrap().content.contains("Queued"));
        assert_eq!(sync.status(), SyncStatus::Synced);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_remote_times_out() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(FakeRemote::default());
        remote.state.lock().unwrap().hang = true;
        let sync = service(&dir, Store::default(), remote);

        let result = sync.connect("good", "books").await;
        assert!(matches!(
            result,
            Err(AppError::Sync(SyncError::Timeout(_)))
        ));
        assert!(matches!(sync.status(), SyncStatus::Error(_)));
    }
}
