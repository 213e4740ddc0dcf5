//! Local durable cache
//!
//! The whole dataset lives in one JSON file with the same shape as export
//! files. Writes go to a temp file first and are renamed into place.
//! Until `load` has run, writes are skipped so startup defaults never
//! overwrite data that has not been read yet.

use super::merge::check_snapshot;
use crate::config::LOCAL_CACHE_FILE;
use crate::error::{AppError, Result};
use crate::store::{Dataset, Snapshot};
use chrono::NaiveDate;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct LocalCache {
    path: PathBuf,
    loaded: AtomicBool,
}

impl LocalCache {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(LOCAL_CACHE_FILE),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Read the cache. A missing file yields an empty dataset.
    ///
    /// An unreadable file is moved aside to `<name>.corrupt` so the next
    /// write cannot destroy it, and an empty dataset is returned.
    pub fn load(&self) -> Result<Dataset> {
        let data = match fs::read_to_string(&self.path) {
            Ok(json) => match serde_json::from_str::<Dataset>(&json) {
                Ok(data) => {
                    tracing::info!(
                        "Loaded local cache: {} invoices, {} estimates, {} clients",
                        data.invoices.len(),
                        data.estimates.len(),
                        data.clients.len()
                    );
                    data
                }
                Err(e) => {
                    let aside = self.path.with_extension("json.corrupt");
                    tracing::error!("Local cache is unreadable ({}), moving it to {:?}", e, aside);
                    fs::rename(&self.path, &aside)?;
                    Dataset::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No local cache at {:?}, starting empty", self.path);
                Dataset::default()
            }
            Err(e) => return Err(e.into()),
        };

        self.loaded.store(true, Ordering::SeqCst);
        Ok(data)
    }

    /// Write the full dataset. Returns false when skipped because the
    /// initial load has not happened yet.
    pub fn write(&self, data: &Dataset) -> Result<bool> {
        if !self.is_loaded() {
            tracing::debug!("Skipping local write before initial load");
            return Ok(false);
        }

        let json = serde_json::to_vec_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let written = (|| -> std::io::Result<()> {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        written.map_err(|e| {
            AppError::Storage(format!("Failed to write {:?}: {}", self.path, e))
        })?;

        tracing::debug!("Wrote local cache ({} bytes)", json.len());
        Ok(true)
    }
}

/// Export file name for a given day, e.g. `billbook-export-2024-01-15.json`
pub fn export_file_name(today: NaiveDate) -> String {
    format!("billbook-export-{}.json", today.format("%Y-%m-%d"))
}

/// Serialize the dataset in the export/local-cache format
pub fn export_json(data: &Dataset) -> Result<String> {
    Ok(serde_json::to_string_pretty(data)?)
}

/// Parse an import file. Malformed JSON, an object carrying none of the
/// known collections, or amounts out of range reject the file as a whole.
pub fn parse_import(json: &str) -> Result<Snapshot> {
    let snapshot: Snapshot = serde_json::from_str(json)
        .map_err(|e| AppError::Parse(format!("Import file is not valid: {}", e)))?;

    if snapshot.is_empty() {
        return Err(AppError::Parse(
            "Import file contains no invoices, estimates, clients, services, expenses or settings"
                .to_string(),
        ));
    }

    check_snapshot(&snapshot)
        .map_err(|e| AppError::Parse(format!("Import file is not valid: {}", e)))?;
    Ok(snapshot)
}
