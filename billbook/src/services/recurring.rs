//! Recurring invoice generation
//!
//! A recurring template is an ordinary invoice with an active
//! `RecurrenceSpec`. Each check materializes due occurrences as plain draft
//! invoices and moves the template's next date forward.

use super::documents::{copy_body, due_date_from_terms};
use crate::engine::next_occurrence;
use crate::error::Result;
use crate::store::{Dataset, Invoice, InvoiceStatus, Store};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

/// How many missed periods a single check makes up for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatchUpPolicy {
    /// At most one new invoice per template per check
    #[default]
    OnePerCheck,
    /// Generate every occurrence up to today
    AllMissed,
}

/// Ids of templates whose next occurrence is due
fn due_templates(data: &Dataset, today: NaiveDate) -> Vec<String> {
    data.invoices
        .iter()
        .filter(|invoice| {
            !matches!(
                invoice.status,
                InvoiceStatus::Cancelled | InvoiceStatus::Archived
            )
        })
        .filter_map(|invoice| {
            let recurrence = invoice.recurrence.as_ref().filter(|r| r.active)?;
            let next = recurrence
                .next_date
                .unwrap_or_else(|| next_occurrence(invoice.body.date, recurrence.frequency));
            let within_end = recurrence.end_date.map_or(true, |end| end >= today);
            (next <= today && within_end).then(|| invoice.body.id.clone())
        })
        .collect()
}

/// Generate one occurrence of `template_id`, if due. Returns the new invoice.
fn generate_once(data: &mut Dataset, template_id: &str, today: NaiveDate) -> Result<Option<Invoice>> {
    let template = data.invoice(template_id)?.clone();
    let Some(recurrence) = template.recurrence.as_ref().filter(|r| r.active) else {
        return Ok(None);
    };

    let occurrence = recurrence
        .next_date
        .unwrap_or_else(|| next_occurrence(template.body.date, recurrence.frequency));
    if occurrence > today || recurrence.end_date.is_some_and(|end| end < today) {
        return Ok(None);
    }

    let now = Utc::now();
    let number = data.next_invoice_number();
    let instance = Invoice {
        body: copy_body(&template.body, number, occurrence, now),
        status: InvoiceStatus::Draft,
        due_date: Some(due_date_from_terms(occurrence, data.settings.payment_terms)),
        payments: Vec::new(),
        deposit_amount: Decimal::ZERO,
        deposit_date: None,
        recurrence: None,
        converted_from_estimate: None,
        generated_from_recurring: Some(template.body.id.clone()),
    };
    data.invoices.push(instance.clone());

    let stored = data.invoice_mut(template_id)?;
    if let Some(schedule) = stored.recurrence.as_mut() {
        schedule.next_date = Some(next_occurrence(occurrence, schedule.frequency));
    }

    Ok(Some(instance))
}

/// Service for recurring invoice generation
#[derive(Clone)]
pub struct RecurringService {
    store: Store,
    policy: CatchUpPolicy,
}

impl RecurringService {
    pub fn new(store: Store, policy: CatchUpPolicy) -> Self {
        Self { store, policy }
    }

    /// Materialize due occurrences for every active template
    pub fn generate_due(&self, today: NaiveDate) -> Result<Vec<Invoice>> {
        let templates = self.store.read(|data| due_templates(data, today));
        if templates.is_empty() {
            return Ok(Vec::new());
        }

        let policy = self.policy;
        let generated = self.store.mutate(|data| {
            let mut generated = Vec::new();
            for template_id in &templates {
                while let Some(instance) = generate_once(data, template_id, today)? {
                    generated.push(instance);
                    if policy == CatchUpPolicy::OnePerCheck {
                        break;
                    }
                }
            }
            Ok(generated)
        })?;

        for instance in &generated {
            tracing::info!(
                "Generated recurring invoice {} dated {}",
                instance.number(),
                instance.body.date
            );
        }
        Ok(generated)
    }

    /// Templates with an active schedule
    pub fn list_templates(&self) -> Vec<Invoice> {
        self.store.read(|data| {
            data.invoices
                .iter()
                .filter(|i| i.is_recurring_template())
                .cloned()
                .collect()
        })
    }
}
