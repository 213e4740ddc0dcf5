//! Clients service
//!
//! Client records are independent of documents: documents keep their own
//! snapshot of the "to" party, so editing a client never rewrites history.

use crate::engine::calculator::balance_due;
use crate::error::{AppError, Result};
use crate::store::{new_id, Address, Client, Dataset, InvoiceStatus, Store};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;

/// Client form input
#[derive(Debug, Clone, Default)]
pub struct ClientInput {
    pub company: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Address,
}

/// Derived figures shown next to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientStats {
    pub invoice_count: usize,
    pub estimate_count: usize,
    pub outstanding: Decimal,
}

fn same_company(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn validate(data: &Dataset, input: &ClientInput, own_id: Option<&str>) -> Result<()> {
    if input.company.trim().is_empty() {
        return Err(AppError::validation("Company is required"));
    }

    let duplicate = data
        .clients
        .iter()
        .any(|c| same_company(&c.company, &input.company) && Some(c.id.as_str()) != own_id);
    if duplicate {
        return Err(AppError::validation(format!(
            "A client named {} already exists",
            input.company.trim()
        )));
    }
    Ok(())
}

/// Service for managing clients
#[derive(Clone)]
pub struct ClientsService {
    store: Store,
}

impl ClientsService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// All clients sorted by company
    pub fn list_clients(&self) -> Vec<Client> {
        let mut clients = self.store.list_clients();
        clients.sort_by_key(|c| c.company.to_lowercase());
        clients
    }

    pub fn get_client(&self, id: &str) -> Result<Client> {
        self.store.read(|data| data.client(id).cloned())
    }

    pub fn find_by_company(&self, company: &str) -> Option<Client> {
        self.store.read(|data| data.client_by_company(company).cloned())
    }

    pub fn create_client(&self, input: ClientInput) -> Result<Client> {
        let client = self.store.mutate(|data| {
            validate(data, &input, None)?;

            let now = Utc::now();
            let client = Client {
                id: new_id(),
                company: input.company.trim().to_string(),
                name: input.name.clone(),
                email: input.email.clone(),
                phone: input.phone.clone(),
                address: input.address.clone(),
                created_at: now,
                updated_at: now,
            };
            data.clients.push(client.clone());
            Ok(client)
        })?;

        tracing::info!("Created client: {} ({})", client.company, client.id);
        Ok(client)
    }

    pub fn update_client(&self, id: &str, input: ClientInput) -> Result<Client> {
        let client = self.store.mutate(|data| {
            validate(data, &input, Some(id))?;

            let client = data.client_mut(id)?;
            client.company = input.company.trim().to_string();
            client.name = input.name.clone();
            client.email = input.email.clone();
            client.phone = input.phone.clone();
            client.address = input.address.clone();
            client.updated_at = Utc::now();
            Ok(client.clone())
        })?;

        tracing::debug!("Updated client: {}", client.id);
        Ok(client)
    }

    /// Delete a client record. Documents addressed to it are untouched.
    pub fn delete_client(&self, id: &str) -> Result<()> {
        self.store.mutate(|data| {
            let before = data.clients.len();
            data.clients.retain(|c| c.id != id);
            if data.clients.len() == before {
                return Err(AppError::not_found("Client", id));
            }
            Ok(())
        })?;

        tracing::info!("Deleted client: {}", id);
        Ok(())
    }

    /// Document counts and open balance for one client, matched by company
    pub fn client_stats(&self, id: &str) -> Result<ClientStats> {
        self.store.read(|data| {
            let client = data.client(id)?;

            let invoices: Vec<_> = data
                .invoices
                .iter()
                .filter(|i| same_company(&i.body.to_party.company, &client.company))
                .collect();

            let outstanding: Decimal = invoices
                .iter()
                .filter(|i| matches!(i.status, InvoiceStatus::Sent | InvoiceStatus::Overdue))
                .map(|i| balance_due(i).max(Decimal::ZERO))
                .sum();

            let estimate_count = data
                .estimates
                .iter()
                .filter(|e| same_company(&e.body.to_party.company, &client.company))
                .count();

            Ok(ClientStats {
                invoice_count: invoices.len(),
                estimate_count,
                outstanding,
            })
        })
    }
}
