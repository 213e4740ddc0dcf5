//! In-memory entity store
//!
//! Owns every collection behind a single lock. Mutations run on a copy of
//! the dataset and are swapped in only when the closure succeeds, so a
//! failed command never leaves partial state behind. After each successful
//! mutation the registered listener (persistence) sees the new state.

use super::models::*;
use crate::engine::next_document_number;
use crate::error::{AppError, Result};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Receives the full dataset after every committed mutation
pub trait CommitListener: Send + Sync {
    fn on_commit(&self, data: &Dataset);
}

/// Shared handle to the dataset
#[derive(Clone)]
pub struct Store {
    data: Arc<RwLock<Dataset>>,
    listener: Arc<RwLock<Option<Arc<dyn CommitListener>>>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(Dataset::default())
    }
}

impl Store {
    pub fn new(data: Dataset) -> Self {
        Self {
            data: Arc::new(RwLock::new(data)),
            listener: Arc::new(RwLock::new(None)),
        }
    }

    /// Register the commit listener, replacing any previous one
    pub fn set_listener(&self, listener: Arc<dyn CommitListener>) {
        let mut slot = self.listener.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(listener);
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Dataset> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Dataset> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a read-only query against the current state
    pub fn read<R>(&self, f: impl FnOnce(&Dataset) -> R) -> R {
        f(&self.read_guard())
    }

    /// Clone of the whole dataset
    pub fn snapshot(&self) -> Dataset {
        self.read_guard().clone()
    }

    /// Apply a mutation atomically and notify the listener
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Dataset) -> Result<R>) -> Result<R> {
        let value = {
            let mut guard = self.write_guard();
            let mut draft = guard.clone();
            let value = f(&mut draft)?;
            *guard = draft;
            value
        };

        self.notify();
        Ok(value)
    }

    fn notify(&self) {
        let listener = self
            .listener
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        if let Some(listener) = listener {
            let guard = self.read_guard();
            listener.on_commit(&guard);
        }
    }

    // ===== Read accessors =====

    pub fn list_invoices(&self) -> Vec<Invoice> {
        self.read(|d| d.invoices.clone())
    }

    pub fn get_invoice(&self, id: &str) -> Result<Invoice> {
        self.read(|d| d.invoice(id).cloned())
    }

    pub fn list_estimates(&self) -> Vec<Estimate> {
        self.read(|d| d.estimates.clone())
    }

    pub fn get_estimate(&self, id: &str) -> Result<Estimate> {
        self.read(|d| d.estimate(id).cloned())
    }

    pub fn list_clients(&self) -> Vec<Client> {
        self.read(|d| d.clients.clone())
    }

    pub fn list_services(&self) -> Vec<Service> {
        self.read(|d| d.services.clone())
    }

    pub fn list_expenses(&self) -> Vec<Expense> {
        self.read(|d| d.expenses.clone())
    }

    pub fn settings(&self) -> Settings {
        self.read(|d| d.settings.clone())
    }
}

impl Dataset {
    pub fn invoice(&self, id: &str) -> Result<&Invoice> {
        self.invoices
            .iter()
            .find(|i| i.body.id == id)
            .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    pub fn invoice_mut(&mut self, id: &str) -> Result<&mut Invoice> {
        self.invoices
            .iter_mut()
            .find(|i| i.body.id == id)
            .ok_or_else(|| AppError::not_found("Invoice", id))
    }

    pub fn estimate(&self, id: &str) -> Result<&Estimate> {
        self.estimates
            .iter()
            .find(|e| e.body.id == id)
            .ok_or_else(|| AppError::not_found("Estimate", id))
    }

    pub fn estimate_mut(&mut self, id: &str) -> Result<&mut Estimate> {
        self.estimates
            .iter_mut()
            .find(|e| e.body.id == id)
            .ok_or_else(|| AppError::not_found("Estimate", id))
    }

    pub fn client(&self, id: &str) -> Result<&Client> {
        self.clients
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    pub fn client_mut(&mut self, id: &str) -> Result<&mut Client> {
        self.clients
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("Client", id))
    }

    /// Case-insensitive lookup by company name
    pub fn client_by_company(&self, company: &str) -> Option<&Client> {
        let wanted = company.trim().to_lowercase();
        self.clients
            .iter()
            .find(|c| c.company.trim().to_lowercase() == wanted)
    }

    pub fn service(&self, id: &str) -> Result<&Service> {
        self.services
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found("Service", id))
    }

    pub fn service_mut(&mut self, id: &str) -> Result<&mut Service> {
        self.services
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found("Service", id))
    }

    pub fn expense_mut(&mut self, id: &str) -> Result<&mut Expense> {
        self.expenses
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::not_found("Expense", id))
    }

    /// Next number in the invoice sequence
    pub fn next_invoice_number(&self) -> String {
        next_document_number(
            self.invoices.iter().map(|i| i.number()),
            &self.settings.invoice_prefix,
        )
    }

    /// Next number in the estimate sequence
    pub fn next_estimate_number(&self) -> String {
        next_document_number(
            self.estimates.iter().map(|e| e.number()),
            &self.settings.estimate_prefix,
        )
    }
}
