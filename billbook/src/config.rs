//! Application configuration constants
//!
//! Central location for all configuration constants, numbering rules,
//! sync timings and file names used throughout the application.

use crate::services::recurring::CatchUpPolicy;
use std::path::PathBuf;
use std::time::Duration;

// ===== Numbering =====

/// Highest number considered "already used" when a sequence is empty.
/// Sequences therefore start at 5000.
pub const DOCUMENT_NUMBER_FLOOR: u64 = 4999;

/// Minimum digits in a formatted document number (zero padded)
pub const DOCUMENT_NUMBER_WIDTH: usize = 4;

/// Default prefix for invoice numbers
pub const DEFAULT_INVOICE_PREFIX: &str = "INV-";

/// Default prefix for estimate numbers
pub const DEFAULT_ESTIMATE_PREFIX: &str = "EST-";

// ===== Document Defaults =====

/// Default payment terms in days (due date = date + terms)
pub const DEFAULT_PAYMENT_TERMS_DAYS: u32 = 30;

/// Maximum payment terms in days (one year)
pub const MAX_PAYMENT_TERMS_DAYS: u32 = 365;

/// Default ISO currency code
pub const DEFAULT_CURRENCY: &str = "USD";

/// Maximum length for a numbering prefix
pub const MAX_PREFIX_LENGTH: usize = 12;

// ===== Amount Limits =====
// Keep every product and sum the calculator forms well inside Decimal range.

/// Largest quantity on a single line
pub const MAX_QUANTITY: i64 = 1_000_000_000;

/// Largest rate, flat discount, deposit, payment or expense amount
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Most line items on one document
pub const MAX_LINE_ITEMS: usize = 1_000;

/// Highest tax rate in percent
pub const MAX_TAX_RATE: i64 = 100;

// ===== Sync Timings =====

/// Quiet period before a burst of local changes is pushed to the remote store
pub const SYNC_DEBOUNCE: Duration = Duration::from_secs(2);

/// Upper bound for a single remote exchange before the status flips to error
pub const SYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Wait after creating a remote container before using it
pub const PROVISION_WAIT: Duration = Duration::from_millis(1500);

/// User agent sent with every remote request
pub const USER_AGENT: &str = concat!("Billbook/", env!("CARGO_PKG_VERSION"));

/// Default base URL of the remote file store API (a local gateway)
pub const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:8787";

// ===== Files =====

/// Local durable cache (same shape as export files)
pub const LOCAL_CACHE_FILE: &str = "billbook.json";

/// Sync configuration (account, container, version token)
pub const SYNC_CONFIG_FILE: &str = "sync.json";

/// File name inside the remote container
pub const REMOTE_DATA_FILE: &str = "billbook-data.json";

/// Keyring service name for the sync token
pub const KEYRING_SERVICE: &str = "Billbook";

// ===== Maintenance =====

/// Daily maintenance (overdue detection, recurring generation) at 06:00
pub const MAINTENANCE_CRON: &str = "0 0 6 * * *";

/// Runtime options for the engine.
///
/// Defaults come from the constants above; `from_env` lets a launcher
/// point the engine somewhere else without recompiling.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub data_dir: PathBuf,
    pub remote_url: String,
    pub debounce: Duration,
    pub sync_timeout: Duration,
    pub provision_wait: Duration,
    pub catch_up: CatchUpPolicy,
}

impl EngineOptions {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            debounce: SYNC_DEBOUNCE,
            sync_timeout: SYNC_TIMEOUT,
            provision_wait: PROVISION_WAIT,
            catch_up: CatchUpPolicy::default(),
        }
    }

    /// Read `BILLBOOK_DATA_DIR` and `BILLBOOK_REMOTE_URL`, falling back to
    /// `./billbook-data` and the default remote.
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("BILLBOOK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("billbook-data"));

        let mut options = Self::new(data_dir);
        if let Ok(url) = std::env::var("BILLBOOK_REMOTE_URL") {
            options.remote_url = url;
        }
        options
    }
}
