//! Settings service
//!
//! The settings singleton lives inside the dataset, so it is persisted and
//! synced together with every other collection.

use crate::config::{MAX_PAYMENT_TERMS_DAYS, MAX_PREFIX_LENGTH};
use crate::error::{AppError, Result};
use crate::store::{Settings, Store};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

fn validate(settings: &Settings) -> Result<()> {
    if settings.tax_rate < Decimal::ZERO || settings.tax_rate > Decimal::ONE_HUNDRED {
        return Err(AppError::validation("Tax rate must be between 0 and 100"));
    }

    if settings.payment_terms > MAX_PAYMENT_TERMS_DAYS {
        return Err(AppError::validation(format!(
            "Payment terms must be at most {} days",
            MAX_PAYMENT_TERMS_DAYS
        )));
    }

    for (label, prefix) in [
        ("Invoice prefix", &settings.invoice_prefix),
        ("Estimate prefix", &settings.estimate_prefix),
    ] {
        if prefix.chars().count() > MAX_PREFIX_LENGTH {
            return Err(AppError::validation(format!(
                "{} must be at most {} characters",
                label, MAX_PREFIX_LENGTH
            )));
        }
    }

    let currency = settings.currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::validation("Currency must be a 3-letter code"));
    }

    Ok(())
}

/// Service for the settings singleton
#[derive(Clone)]
pub struct SettingsService {
    store: Store,
}

impl SettingsService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn get_settings(&self) -> Settings {
        self.store.settings()
    }

    /// Replace settings after validation
    pub fn update_settings(&self, mut settings: Settings) -> Result<Settings> {
        validate(&settings)?;
        settings.currency = settings.currency.trim().to_ascii_uppercase();

        let saved = self.store.mutate(|data| {
            data.settings = settings;
            Ok(data.settings.clone())
        })?;

        tracing::info!("Settings saved");
        Ok(saved)
    }

    /// Remember when the last export/backup was taken
    pub fn record_backup(&self, at: DateTime<Utc>) -> Result<()> {
        self.store.mutate(|data| {
            data.settings.last_backup = Some(at);
            Ok(())
        })
    }
}
