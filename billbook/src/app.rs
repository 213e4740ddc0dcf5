//! Application context and initialization
//!
//! Every service is built here around one shared store and handed out
//! through `AppContext`. Startup order:
//!
//! 1. load the local cache (enables local writes)
//! 2. load the sync config
//! 3. attach persistence, then migrate legacy addresses
//! 4. overdue detection and recurring generation for today
//! 5. background pull when a remote is connected
//!
//! The background pull replaces whole collections when it lands, so edits
//! made while it is in flight can be lost (last writer wins).

use crate::config::EngineOptions;
use crate::error::Result;
use crate::persistence::{
    export_file_name, export_json, fold_snapshot, parse_import, HttpRemoteStore,
    KeyringSecretStore, LocalCache, MergeStrategy, Persistence, RemoteStore, ReplaceCollections,
    SecretStore, SyncConfigFile, SyncService, SyncTimings,
};
use crate::services::{
    migrate_addresses, needs_migration, CatalogService, ClientsService, DashboardStats,
    EstimatesService, ExpensesService, InvoicesService, Maintenance, MaintenanceReport,
    RecurringService, ReportsService, SettingsService,
};
use crate::store::Store;
use chrono::{Local, NaiveDate, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Central application state holding all services
#[derive(Clone)]
pub struct AppContext {
    pub options: EngineOptions,
    pub store: Store,
    pub invoices: InvoicesService,
    pub estimates: EstimatesService,
    pub recurring: RecurringService,
    pub clients: ClientsService,
    pub catalog: CatalogService,
    pub expenses: ExpensesService,
    pub reports: ReportsService,
    pub settings: SettingsService,
    persistence: Arc<Persistence>,
    merge: Arc<dyn MergeStrategy>,
}

impl AppContext {
    /// Set up against the HTTP remote store and the OS keyring
    pub async fn setup(options: EngineOptions) -> Result<Self> {
        let remote = Arc::new(HttpRemoteStore::new(&options.remote_url)?);
        Self::with_backends(options, remote, Arc::new(KeyringSecretStore)).await
    }

    pub async fn with_backends(
        options: EngineOptions,
        remote: Arc<dyn RemoteStore>,
        secrets: Arc<dyn SecretStore>,
    ) -> Result<Self> {
        tracing::info!("Initializing engine");
        tracing::info!("Data directory: {:?}", options.data_dir);

        tokio::fs::create_dir_all(&options.data_dir).await?;

        let local = Arc::new(LocalCache::new(&options.data_dir));
        let store = Store::new(local.load()?);

        let merge: Arc<dyn MergeStrategy> = Arc::new(ReplaceCollections);
        let sync = SyncService::new(
            store.clone(),
            remote,
            secrets,
            Arc::clone(&merge),
            SyncConfigFile::new(&options.data_dir),
            SyncTimings {
                debounce: options.debounce,
                timeout: options.sync_timeout,
                provision_wait: options.provision_wait,
            },
        );
        if let Err(e) = sync.load_config().await {
            tracing::error!("Ignoring unreadable sync config: {}", e);
        }

        let persistence = Arc::new(Persistence::new(local, sync));
        store.set_listener(persistence.clone());

        if store.read(needs_migration) {
            store.mutate(|data| Ok(migrate_addresses(data)))?;
        }

        let context = Self {
            invoices: InvoicesService::new(store.clone()),
            estimates: EstimatesService::new(store.clone()),
            recurring: RecurringService::new(store.clone(), options.catch_up),
            clients: ClientsService::new(store.clone()),
            catalog: CatalogService::new(store.clone()),
            expenses: ExpensesService::new(store.clone()),
            reports: ReportsService::new(store.clone()),
            settings: SettingsService::new(store.clone()),
            options,
            store,
            persistence,
            merge,
        };

        let today = Local::now().date_naive();
        if let Err(e) = context.run_maintenance(today) {
            tracing::error!("Startup maintenance failed: {}", e);
        }

        context.spawn_background_pull();

        tracing::info!("Engine initialized successfully");
        Ok(context)
    }

    pub fn sync(&self) -> &SyncService {
        self.persistence.sync()
    }

    /// False while the latest change exists only in memory
    pub fn is_durably_saved(&self) -> bool {
        self.persistence.is_durable()
    }

    pub fn maintenance(&self) -> Maintenance {
        Maintenance::new(self.invoices.clone(), self.recurring.clone())
    }

    /// Overdue detection and recurring generation for `today`
    pub fn run_maintenance(&self, today: NaiveDate) -> Result<MaintenanceReport> {
        let report = self.maintenance().run(today)?;
        tracing::debug!(
            "Maintenance for {}: {} overdue, {} generated",
            today,
            report.overdue.len(),
            report.generated.len()
        );
        Ok(report)
    }

    /// Dashboard figures after flipping invoices that went overdue by `today`
    pub fn refresh_dashboard(&self, today: NaiveDate) -> Result<DashboardStats> {
        self.invoices.detect_overdue(today)?;
        Ok(self.reports.dashboard())
    }

    /// Reconcile with the remote store without blocking the caller
    pub fn spawn_background_pull(&self) -> Option<JoinHandle<()>> {
        if !self.sync().is_connected() {
            return None;
        }

        let sync = self.sync().clone();
        Some(tokio::spawn(async move {
            if let Err(e) = sync.pull().await {
                tracing::warn!("Background pull failed: {}", e);
            }
        }))
    }

    /// Export file name and JSON body for `today`. Records the backup time
    /// first so the export carries it.
    pub fn export(&self, today: NaiveDate) -> Result<(String, String)> {
        self.settings.record_backup(Utc::now())?;
        let json = export_json(&self.store.snapshot())?;

        tracing::info!("Exported dataset ({} bytes)", json.len());
        Ok((export_file_name(today), json))
    }

    /// Import a file in export format. Present collections replace the
    /// current ones and derived totals are recomputed; a malformed file
    /// changes nothing.
    pub fn import(&self, json: &str) -> Result<()> {
        let snapshot = parse_import(json)?;
        let merge = Arc::clone(&self.merge);

        self.store.mutate(move |data| {
            fold_snapshot(merge.as_ref(), data, snapshot);
            Ok(())
        })?;

        tracing::info!("Imported dataset");
        Ok(())
    }
}
