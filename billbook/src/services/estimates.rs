//! Estimates service
//!
//! Saving estimates, the approval gate and one-way conversion into invoices.

use super::documents::{
    build_body, copy_body, due_date_from_terms, ensure_unique_number, remember_client,
    validate_draft,
};
use crate::error::{AppError, Result};
use crate::store::{Estimate, EstimateDraft, EstimateStatus, Invoice, InvoiceStatus, Store};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

/// Service for managing estimates
#[derive(Clone)]
pub struct EstimatesService {
    store: Store,
}

impl EstimatesService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Number the next new estimate should get
    pub fn next_number(&self) -> String {
        self.store.read(|d| d.next_estimate_number())
    }

    pub fn get_estimate(&self, id: &str) -> Result<Estimate> {
        self.store.get_estimate(id)
    }

    /// All estimates, newest first
    pub fn list_estimates(&self) -> Vec<Estimate> {
        let mut estimates = self.store.list_estimates();
        estimates.sort_by(|a, b| b.body.date.cmp(&a.body.date));
        estimates
    }

    /// Create a new estimate or update an existing one
    pub fn save_estimate(&self, draft: EstimateDraft) -> Result<Estimate> {
        validate_draft(&draft.document)?;

        let estimate = self.store.mutate(|data| {
            let now = Utc::now();
            let own_id = draft.document.id.as_deref();

            ensure_unique_number(
                data.estimates.iter().map(|e| (e.id(), e.number())),
                &draft.document.document_number,
                own_id,
            )?;
            remember_client(data, &draft.document.to_party, now);

            match own_id {
                Some(id) => {
                    let estimate = data.estimate_mut(id)?;
                    estimate.body = build_body(&draft.document, Some(&estimate.body), now);
                    if let Some(status) = draft.status {
                        estimate.status = status;
                    }
                    Ok(estimate.clone())
                }
                None => {
                    let estimate = Estimate {
                        body: build_body(&draft.document, None, now),
                        status: EstimateStatus::Draft,
                        converted_to_invoice: None,
                    };
                    data.estimates.push(estimate.clone());
                    Ok(estimate)
                }
            }
        })?;

        tracing::info!("Saved estimate {} ({})", estimate.number(), estimate.id());
        Ok(estimate)
    }

    pub fn delete_estimate(&self, id: &str) -> Result<()> {
        self.store.mutate(|data| {
            let before = data.estimates.len();
            data.estimates.retain(|e| e.body.id != id);
            if data.estimates.len() == before {
                return Err(AppError::not_found("Estimate", id));
            }
            Ok(())
        })?;

        tracing::info!("Deleted estimate: {}", id);
        Ok(())
    }

    fn transition(
        &self,
        id: &str,
        next: impl FnOnce(&Estimate) -> Result<EstimateStatus>,
    ) -> Result<Estimate> {
        let estimate = self.store.mutate(|data| {
            let estimate = data.estimate_mut(id)?;
            estimate.status = next(estimate)?;
            estimate.body.updated_at = Utc::now();
            Ok(estimate.clone())
        })?;

        tracing::info!(
            "Estimate {} is now {}",
            estimate.number(),
            estimate.status.as_str()
        );
        Ok(estimate)
    }

    pub fn mark_estimate_sent(&self, id: &str) -> Result<Estimate> {
        self.transition(id, |estimate| match estimate.status {
            EstimateStatus::Draft | EstimateStatus::Sent => Ok(EstimateStatus::Sent),
            other => Err(AppError::validation(format!(
                "Cannot mark a {} estimate as sent",
                other.as_str()
            ))),
        })
    }

    /// Approve a draft or sent estimate
    pub fn approve_estimate(&self, id: &str) -> Result<Estimate> {
        self.transition(id, |estimate| match estimate.status {
            EstimateStatus::Draft | EstimateStatus::Sent | EstimateStatus::Approved => {
                Ok(EstimateStatus::Approved)
            }
            other => Err(AppError::validation(format!(
                "Cannot approve a {} estimate",
                other.as_str()
            ))),
        })
    }

    /// Undo an approval, back to draft
    pub fn revert_estimate_approval(&self, id: &str) -> Result<Estimate> {
        self.transition(id, |estimate| match estimate.status {
            EstimateStatus::Approved => Ok(EstimateStatus::Draft),
            other => Err(AppError::validation(format!(
                "Estimate is {}, not approved",
                other.as_str()
            ))),
        })
    }

    pub fn reject_estimate(&self, id: &str) -> Result<Estimate> {
        self.transition(id, |estimate| match estimate.status {
            EstimateStatus::Draft | EstimateStatus::Sent | EstimateStatus::Approved => {
                Ok(EstimateStatus::Rejected)
            }
            other => Err(AppError::validation(format!(
                "Cannot reject a {} estimate",
                other.as_str()
            ))),
        })
    }

    pub fn archive_estimate(&self, id: &str) -> Result<Estimate> {
        self.transition(id, |_| Ok(EstimateStatus::Archived))
    }

    /// Turn an estimate into a new draft invoice.
    ///
    /// Only approved estimates convert directly. Anything else, including an
    /// estimate that was already converted, needs `confirmed_override`.
    pub fn convert_estimate_to_invoice(
        &self,
        id: &str,
        today: NaiveDate,
        confirmed_override: bool,
    ) -> Result<Invoice> {
        let invoice = self.store.mutate(|data| {
            let estimate = data.estimate(id)?.clone();

            if !confirmed_override {
                match estimate.status {
                    EstimateStatus::Approved => {}
                    EstimateStatus::Converted => {
                        return Err(AppError::ConfirmationRequired(format!(
                            "Estimate {} was already converted to invoice {}",
                            estimate.number(),
                            estimate.converted_to_invoice.as_deref().unwrap_or("?")
                        )));
                    }
                    other => {
                        return Err(AppError::ConfirmationRequired(format!(
                            "Estimate {} is {}, not approved",
                            estimate.number(),
                            other.as_str()
                        )));
                    }
                }
            }

            let now = Utc::now();
            let number = data.next_invoice_number();
            let invoice = Invoice {
                body: copy_body(&estimate.body, number.clone(), today, now),
                status: InvoiceStatus::Draft,
                due_date: Some(due_date_from_terms(today, data.settings.payment_terms)),
                payments: Vec::new(),
                deposit_amount: Decimal::ZERO,
                deposit_date: None,
                recurrence: None,
                converted_from_estimate: Some(estimate.number().to_string()),
                generated_from_recurring: None,
            };
            data.invoices.push(invoice.clone());

            let stored = data.estimate_mut(id)?;
            stored.status = EstimateStatus::Converted;
            stored.converted_to_invoice = Some(number);
            stored.body.updated_at = now;

            Ok(invoice)
        })?;

        tracing::info!(
            "Converted estimate {} into invoice {}",
            id,
            invoice.number()
        );
        Ok(invoice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiscountType, DocumentDraft, LineItem, PartySnapshot};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn draft(number: &str) -> EstimateDraft {
        let mut document = DocumentDraft::new(number, ymd(2024, 1, 10));
        document.to_party = PartySnapshot {
            company: "Globex".to_string(),
            ..Default::default()
        };
        document.line_items = vec![
            LineItem::new("Design", Decimal::from(2), Decimal::from(100)),
            LineItem::new("Hosting", Decimal::ONE, Decimal::from(50))
                .with_discount(Decimal::from(10), DiscountType::Percent),
        ];
        document.tax_rate = Decimal::from(8);
        document.discount_value = Decimal::from(5);
        document.discount_type = DiscountType::Flat;
        document.into()
    }

    fn service() -> (EstimatesService, Store) {
        let store = Store::default();
        (EstimatesService::new(store.clone()), store)
    }

    #[test]
    fn test_save_numbers_and_totals() {
        let (service, _) = service();
        assert_eq!(service.next_number(), "EST-5000");

        let estimate = service.save_estimate(draft("EST-5000")).unwrap();
        assert_eq!(estimate.status, EstimateStatus::Draft);
        assert_eq!(estimate.body.total, Decimal::new(25920, 2));
        assert_eq!(service.next_number(), "EST-5001");
    }

    #[test]
    fn test_approval_toggle() {
        let (service, _) = service();
        let estimate = service.save_estimate(draft("EST-5000")).unwrap();
        let id = estimate.body.id.as_str();

        assert_eq!(service.approve_estimate(id).unwrap().status, EstimateStatus::Approved);
        assert_eq!(
            service.revert_estimate_approval(id).unwrap().status,
            EstimateStatus::Draft
        );
        assert!(service.revert_estimate_approval(id).is_err());

        service.mark_estimate_sent(id).unwrap();
        assert_eq!(service.approve_estimate(id).unwrap().status, EstimateStatus::Approved);
    }

    #[test]
    fn test_convert_approved_estimate() {
        let (service, store) = service();
        let estimate = service.save_estimate(draft("EST-5000")).unwrap();
        let id = estimate.body.id.clone();
        service.approve_estimate(&id).unwrap();

        let invoice = service
            .convert_estimate_to_invoice(&id, ymd(2024, 2, 1), false)
            .unwrap();

        assert_eq!(invoice.number(), "INV-5000");
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.body.line_items, estimate.body.line_items);
        assert_eq!(invoice.body.total, estimate.body.total);
        assert_eq!(invoice.converted_from_estimate.as_deref(), Some("EST-5000"));
        assert_eq!(invoice.due_date, Some(ymd(2024, 3, 2)));

        let converted = service.get_estimate(&id).unwrap();
        assert_eq!(converted.status, EstimateStatus::Converted);
        assert_eq!(converted.converted_to_invoice.as_deref(), Some("INV-5000"));
        assert_eq!(store.list_invoices().len(), 1);
    }

    #[test]
    fn test_double_conversion_needs_override() {
        let (service, store) = service();
        let estimate = service.save_estimate(draft("EST-5000")).unwrap();
        let id = estimate.body.id.clone();
        service.approve_estimate(&id).unwrap();
        service
            .convert_estimate_to_invoice(&id, ymd(2024, 2, 1), false)
            .unwrap();

        let again = service.convert_estimate_to_invoice(&id, ymd(2024, 2, 2), false);
        assert!(matches!(again, Err(AppError::ConfirmationRequired(_))));
        assert_eq!(store.list_invoices().len(), 1);

        let forced = service
            .convert_estimate_to_invoice(&id, ymd(2024, 2, 2), true)
            .unwrap();
        assert_eq!(forced.number(), "INV-5001");
    }

    #[test]
    fn test_unapproved_conversion_requires_confirmation() {
        let (service, store) = service();
        let estimate = service.save_estimate(draft("EST-5000")).unwrap();

        let result = service.convert_estimate_to_invoice(&estimate.body.id, ymd(2024, 2, 1), false);
        assert!(matches!(result, Err(AppError::ConfirmationRequired(_))));
        assert!(store.list_invoices().is_empty());
        assert_eq!(
            service.get_estimate(&estimate.body.id).unwrap().status,
            EstimateStatus::Draft
        );

        let invoice = service
            .convert_estimate_to_invoice(&estimate.body.id, ymd(2024, 2, 1), true)
            .unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
    }

    #[test]
    fn test_rejected_estimate_cannot_be_approved() {
        let (service, _) = service();
        let estimate = service.save_estimate(draft("EST-5000")).unwrap();
        service.reject_estimate(&estimate.body.id).unwrap();

        assert!(service.approve_estimate(&estimate.body.id).is_err());
    }
}
