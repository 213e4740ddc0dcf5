//! Merge strategies for incoming snapshots (remote pulls and imports)

use crate::engine::calculator::{
    apply_totals, check_invoice_limits, check_limits, max_amount,
};
use crate::error::{AppError, Result};
use crate::services::migration::migrate_addresses;
use crate::store::{Dataset, Snapshot};

/// Folds an incoming snapshot into the local dataset
pub trait MergeStrategy: Send + Sync {
    fn merge(&self, local: &mut Dataset, incoming: Snapshot);
}

/// Last writer wins, per collection: every collection present in the
/// snapshot replaces the local one wholesale; absent ones are untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceCollections;

impl MergeStrategy for ReplaceCollections {
    fn merge(&self, local: &mut Dataset, incoming: Snapshot) {
        if let Some(invoices) = incoming.invoices {
            local.invoices = invoices;
        }
        if let Some(estimates) = incoming.estimates {
            local.estimates = estimates;
        }
        if let Some(clients) = incoming.clients {
            local.clients = clients;
        }
        if let Some(services) = incoming.services {
            local.services = services;
        }
        if let Some(expenses) = incoming.expenses {
            local.expenses = expenses;
        }
        if let Some(settings) = incoming.settings {
            local.settings = settings;
        }
    }
}

/// Reject incoming data the calculator cannot handle
pub fn check_snapshot(snapshot: &Snapshot) -> Result<()> {
    for invoice in snapshot.invoices.iter().flatten() {
        check_invoice_limits(invoice)?;
    }
    for estimate in snapshot.estimates.iter().flatten() {
        let body = &estimate.body;
        check_limits(&body.line_items, body.discount_value, body.tax_rate)?;
    }

    let too_large = snapshot
        .expenses
        .iter()
        .flatten()
        .map(|e| e.amount)
        .chain(snapshot.services.iter().flatten().map(|s| s.rate))
        .any(|amount| amount.abs() > max_amount());
    if too_large {
        return Err(AppError::validation(
            "Expense amounts and service rates must stay within limits",
        ));
    }
    Ok(())
}

/// Merge `incoming`, migrate legacy addresses, then recompute the derived
/// totals of every document. Stored amounts never come from the file.
pub fn fold_snapshot(strategy: &dyn MergeStrategy, data: &mut Dataset, incoming: Snapshot) {
    strategy.merge(data, incoming);
    migrate_addresses(data);

    for invoice in &mut data.invoices {
        apply_totals(&mut invoice.body);
    }
    for estimate in &mut data.estimates {
        apply_totals(&mut estimate.body);
    }
}
