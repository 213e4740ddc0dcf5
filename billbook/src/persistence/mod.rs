//! Persistence layer
//!
//! Every committed mutation is written to the local cache right away and
//! queued for a debounced push to the remote store.

pub mod credentials;
pub mod debounce;
pub mod local;
pub mod merge;
pub mod remote;
pub mod sync;

pub use credentials::{KeyringSecretStore, MemorySecretStore, SecretStore, SyncConfig, SyncConfigFile};
pub use local::{export_file_name, export_json, parse_import, LocalCache};
pub use merge::{check_snapshot, fold_snapshot, MergeStrategy, ReplaceCollections};
pub use remote::{HttpRemoteStore, RemoteFile, RemoteStore};
pub use sync::{SyncService, SyncStatus, SyncTimings};

use crate::store::{CommitListener, Dataset};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Commit listener tying the store to the local cache and the sync service
pub struct Persistence {
    local: Arc<LocalCache>,
    sync: SyncService,
    durable: AtomicBool,
}

impl Persistence {
    pub fn new(local: Arc<LocalCache>, sync: SyncService) -> Self {
        Self {
            local,
            sync,
            durable: AtomicBool::new(true),
        }
    }

    /// False after a local write failed; the in-memory state is newer
    /// than what is on disk until the next successful write.
    pub fn is_durable(&self) -> bool {
        self.durable.load(Ordering::SeqCst)
    }

    pub fn local(&self) -> &LocalCache {
        &self.local
    }

    pub fn sync(&self) -> &SyncService {
        &self.sync
    }
}

impl CommitListener for Persistence {
    fn on_commit(&self, data: &Dataset) {
        match self.local.write(data) {
            Ok(_) => self.durable.store(true, Ordering::SeqCst),
            Err(e) => {
                tracing::error!("Change not durably saved: {}", e);
                self.durable.store(false, Ordering::SeqCst);
            }
        }

        self.sync.schedule();
    }
}
