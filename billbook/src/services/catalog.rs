//! Service catalog (rate card)
//!
//! Line items copy name, description and rate from a catalog entry and keep
//! only a soft `serviceId` tag, so deleting an entry never touches documents.

use crate::config::MAX_AMOUNT;
use crate::engine::calculator::max_amount;
use crate::error::{AppError, Result};
use crate::store::{new_id, LineItem, Service, Store};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Catalog entry form input
#[derive(Debug, Clone)]
pub struct ServiceInput {
    pub name: String,
    pub description: String,
    pub rate: Decimal,
}

fn validate(input: &ServiceInput) -> Result<()> {
    if input.name.trim().is_empty() {
        return Err(AppError::validation("Service name is required"));
    }
    if input.rate < Decimal::ZERO {
        return Err(AppError::validation("Rate must not be negative"));
    }
    if input.rate > max_amount() {
        return Err(AppError::validation(format!("Rate must not exceed {}", MAX_AMOUNT)));
    }
    Ok(())
}

/// Service for the rate catalog
#[derive(Clone)]
pub struct CatalogService {
    store: Store,
}

impl CatalogService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn list_services(&self) -> Vec<Service> {
        let mut services = self.store.list_services();
        services.sort_by_key(|s| s.name.to_lowercase());
        services
    }

    pub fn create_service(&self, input: ServiceInput) -> Result<Service> {
        validate(&input)?;

        let service = self.store.mutate(|data| {
            let service = Service {
                id: new_id(),
                name: input.name.trim().to_string(),
                description: input.description.clone(),
                rate: input.rate,
            };
            data.services.push(service.clone());
            Ok(service)
        })?;

        tracing::info!("Created service: {} ({})", service.name, service.id);
        Ok(service)
    }

    pub fn update_service(&self, id: &str, input: ServiceInput) -> Result<Service> {
        validate(&input)?;

        self.store.mutate(|data| {
            let service = data.service_mut(id)?;
            service.name = input.name.trim().to_string();
            service.description = input.description.clone();
            service.rate = input.rate;
            Ok(service.clone())
        })
    }

    pub fn delete_service(&self, id: &str) -> Result<()> {
        self.store.mutate(|data| {
            let before = data.services.len();
            data.services.retain(|s| s.id != id);
            if data.services.len() == before {
                return Err(AppError::not_found("Service", id));
            }
            Ok(())
        })?;

        tracing::info!("Deleted service: {}", id);
        Ok(())
    }

    /// Line items across all invoices and estimates tagged with each service
    pub fn usage_counts(&self) -> HashMap<String, usize> {
        self.store.read(|data| {
            let mut counts = HashMap::new();
            let lines = data
                .invoices
                .iter()
                .flat_map(|i| i.body.line_items.iter())
                .chain(data.estimates.iter().flat_map(|e| e.body.line_items.iter()));

            for service_id in lines.filter_map(|l| l.service_id.as_ref()) {
                *counts.entry(service_id.clone()).or_insert(0) += 1;
            }
            counts
        })
    }

    pub fn usage_count(&self, id: &str) -> usize {
        self.usage_counts().get(id).copied().unwrap_or(0)
    }

    /// New line item pre-filled from a catalog entry
    pub fn line_item_from_service(&self, id: &str, quantity: Decimal) -> Result<LineItem> {
        self.store.read(|data| {
            let service = data.service(id)?;
            let mut item = LineItem::new(service.description.clone(), quantity, service.rate);
            item.service_id = Some(service.id.clone());
            item.service_name = Some(service.name.clone());
            Ok(item)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InvoicesService;
    use crate::store::{DocumentDraft, InvoiceDraft};
    use chrono::NaiveDate;

    fn input(name: &str, rate: i64) -> ServiceInput {
        ServiceInput {
            name: name.to_string(),
            description: format!("{} work", name),
            rate: Decimal::from(rate),
        }
    }

    #[test]
    fn test_rate_must_not_be_negative() {
        let catalog = CatalogService::new(Store::default());
        assert!(catalog.create_service(input("Bad", -1)).is_err());
        assert!(catalog.create_service(input("", 1)).is_err());
        assert!(catalog.create_service(input("Free", 0)).is_ok());
    }

    #[test]
    fn test_usage_counts_and_delete_keeps_documents() {
        let store = Store::default();
        let catalog = CatalogService::new(store.clone());
        let consulting = catalog.create_service(input("Consulting", 150)).unwrap();

        let line = catalog
            .line_item_from_service(&consulting.id, Decimal::from(3))
            .unwrap();
        assert_eq!(line.rate, Decimal::from(150));
        assert_eq!(line.description, "Consulting work");

        let mut document = DocumentDraft::new("INV-5000", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        document.line_items = vec![line.clone(), line];
        let invoice = InvoicesService::new(store.clone())
            .save_invoice(InvoiceDraft::from(document))
            .unwrap();

        assert_eq!(catalog.usage_count(&consulting.id), 2);

        catalog.delete_service(&consulting.id).unwrap();
        let kept = store.get_invoice(&invoice.body.id).unwrap();
        assert_eq!(kept.body.total, Decimal::from(900));
        assert_eq!(kept.body.line_items[0].service_name.as_deref(), Some("Consulting"));
    }
}
