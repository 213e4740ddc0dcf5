//! Invoices service
//!
//! Saving, status transitions, payments and overdue detection for invoices.

use super::documents::{
    build_body, copy_body, due_date_from_terms, ensure_unique_number, remember_client,
    validate_draft,
};
use crate::config::MAX_AMOUNT;
use crate::engine::calculator::{amount_received, balance_due, max_amount};
use crate::error::{AppError, Result};
use crate::store::{new_id, Invoice, InvoiceDraft, InvoiceStatus, Payment, Store};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

/// Payment as entered by the user
#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub method: String,
    pub note: String,
}

/// Status implied by the current balance: settled invoices are paid, a paid
/// invoice that owes money again goes back to sent. Cancelled and archived
/// invoices keep their status.
fn settled_status(invoice: &Invoice) -> InvoiceStatus {
    match invoice.status {
        InvoiceStatus::Cancelled | InvoiceStatus::Archived => invoice.status,
        _ if balance_due(invoice) <= Decimal::ZERO => InvoiceStatus::Paid,
        InvoiceStatus::Paid => InvoiceStatus::Sent,
        status => status,
    }
}

/// Edits only re-settle invoices that went out and have money against them
fn settles_on_edit(invoice: &Invoice) -> bool {
    matches!(
        invoice.status,
        InvoiceStatus::Sent | InvoiceStatus::Overdue | InvoiceStatus::Paid
    ) && amount_received(invoice) > Decimal::ZERO
}

/// One-click status toggle used by list views
pub fn cycled_status(status: InvoiceStatus) -> InvoiceStatus {
    match status {
        InvoiceStatus::Draft => InvoiceStatus::Sent,
        InvoiceStatus::Sent => InvoiceStatus::Paid,
        InvoiceStatus::Paid => InvoiceStatus::Draft,
        InvoiceStatus::Overdue => InvoiceStatus::Paid,
        InvoiceStatus::Cancelled | InvoiceStatus::Archived => InvoiceStatus::Draft,
    }
}

/// Service for managing invoices
#[derive(Clone)]
pub struct InvoicesService {
    store: Store,
}

impl InvoicesService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Number the next new invoice should get
    pub fn next_number(&self) -> String {
        self.store.read(|d| d.next_invoice_number())
    }

    pub fn get_invoice(&self, id: &str) -> Result<Invoice> {
        self.store.get_invoice(id)
    }

    /// All invoices, newest first
    pub fn list_invoices(&self) -> Vec<Invoice> {
        let mut invoices = self.store.list_invoices();
        invoices.sort_by(|a, b| {
            b.body
                .date
                .cmp(&a.body.date)
                .then_with(|| b.body.document_number.cmp(&a.body.document_number))
        });
        invoices
    }

    /// Create a new invoice or update an existing one
    pub fn save_invoice(&self, draft: InvoiceDraft) -> Result<Invoice> {
        validate_draft(&draft.document)?;
        if draft.deposit_amount < Decimal::ZERO {
            return Err(AppError::validation("Deposit must not be negative"));
        }
        if draft.deposit_amount > max_amount() {
            return Err(AppError::validation(format!(
                "Deposit must not exceed {}",
                MAX_AMOUNT
            )));
        }

        let invoice = self.store.mutate(|data| {
            let now = Utc::now();
            let terms = data.settings.payment_terms;
            let own_id = draft.document.id.as_deref();

            ensure_unique_number(
                data.invoices.iter().map(|i| (i.id(), i.number())),
                &draft.document.document_number,
                own_id,
            )?;
            remember_client(data, &draft.document.to_party, now);

            let due_date = draft
                .due_date
                .unwrap_or_else(|| due_date_from_terms(draft.document.date, terms));

            match own_id {
                Some(id) => {
                    let invoice = data.invoice_mut(id)?;
                    invoice.body = build_body(&draft.document, Some(&invoice.body), now);
                    invoice.due_date = Some(due_date);
                    invoice.deposit_amount = draft.deposit_amount;
                    invoice.deposit_date = draft.deposit_date;
                    invoice.recurrence = merge_recurrence(invoice, draft.recurrence.clone());
                    match draft.status {
                        Some(status) => invoice.status = status,
                        None if settles_on_edit(invoice) => {
                            invoice.status = settled_status(invoice)
                        }
                        None => {}
                    }
                    Ok(invoice.clone())
                }
                None => {
                    let invoice = Invoice {
                        body: build_body(&draft.document, None, now),
                        status: InvoiceStatus::Draft,
                        due_date: Some(due_date),
                        payments: Vec::new(),
                        deposit_amount: draft.deposit_amount,
                        deposit_date: draft.deposit_date,
                        recurrence: draft.recurrence.clone(),
                        converted_from_estimate: None,
                        generated_from_recurring: None,
                    };
                    data.invoices.push(invoice.clone());
                    Ok(invoice)
                }
            }
        })?;

        tracing::info!("Saved invoice {} ({})", invoice.number(), invoice.id());
        Ok(invoice)
    }

    /// Remove an invoice permanently
    pub fn delete_invoice(&self, id: &str) -> Result<()> {
        self.store.mutate(|data| {
            let before = data.invoices.len();
            data.invoices.retain(|i| i.body.id != id);
            if data.invoices.len() == before {
                return Err(AppError::not_found("Invoice", id));
            }
            Ok(())
        })?;

        tracing::info!("Deleted invoice: {}", id);
        Ok(())
    }

    /// Copy an invoice as a new draft with a fresh number and no payments
    pub fn duplicate_invoice(&self, id: &str, today: NaiveDate) -> Result<Invoice> {
        let copy = self.store.mutate(|data| {
            let source = data.invoice(id)?.clone();
            let now = Utc::now();
            let number = data.next_invoice_number();

            let copy = Invoice {
                body: copy_body(&source.body, number, today, now),
                status: InvoiceStatus::Draft,
                due_date: Some(due_date_from_terms(today, data.settings.payment_terms)),
                payments: Vec::new(),
                deposit_amount: Decimal::ZERO,
                deposit_date: None,
                recurrence: None,
                converted_from_estimate: None,
                generated_from_recurring: None,
            };
            data.invoices.push(copy.clone());
            Ok(copy)
        })?;

        tracing::info!("Duplicated invoice {} as {}", id, copy.number());
        Ok(copy)
    }

    fn transition(
        &self,
        id: &str,
        next: impl FnOnce(&Invoice) -> Result<InvoiceStatus>,
    ) -> Result<Invoice> {
        let invoice = self.store.mutate(|data| {
            let invoice = data.invoice_mut(id)?;
            invoice.status = next(invoice)?;
            invoice.body.updated_at = Utc::now();
            Ok(invoice.clone())
        })?;

        tracing::info!(
            "Invoice {} is now {}",
            invoice.number(),
            invoice.status.as_str()
        );
        Ok(invoice)
    }

    /// Confirm that the invoice went out to the client
    pub fn mark_sent(&self, id: &str) -> Result<Invoice> {
        self.transition(id, |invoice| match invoice.status {
            InvoiceStatus::Draft | InvoiceStatus::Sent => Ok(InvoiceStatus::Sent),
            other => Err(AppError::validation(format!(
                "Cannot mark a {} invoice as sent",
                other.as_str()
            ))),
        })
    }

    /// draft -> sent -> paid -> draft, overdue -> paid, anything else -> draft
    pub fn cycle_status(&self, id: &str) -> Result<Invoice> {
        self.transition(id, |invoice| Ok(cycled_status(invoice.status)))
    }

    /// Archive an invoice. Only a direct edit brings it back.
    pub fn archive_invoice(&self, id: &str) -> Result<Invoice> {
        self.transition(id, |_| Ok(InvoiceStatus::Archived))
    }

    pub fn cancel_invoice(&self, id: &str) -> Result<Invoice> {
        self.transition(id, |invoice| match invoice.status {
            InvoiceStatus::Archived => Err(AppError::validation(
                "Cannot cancel an archived invoice",
            )),
            _ => Ok(InvoiceStatus::Cancelled),
        })
    }

    /// Append a payment and settle the status against the new balance
    pub fn record_payment(&self, invoice_id: &str, input: PaymentInput) -> Result<Invoice> {
        if input.amount <= Decimal::ZERO {
            return Err(AppError::validation("Payment amount must be greater than zero"));
        }
        if input.amount > max_amount() {
            return Err(AppError::validation(format!(
                "Payment amount must not exceed {}",
                MAX_AMOUNT
            )));
        }

        let invoice = self.store.mutate(|data| {
            let invoice = data.invoice_mut(invoice_id)?;
            invoice.payments.push(Payment {
                id: new_id(),
                amount: input.amount,
                date: input.date,
                method: input.method.clone(),
                note: input.note.clone(),
            });
            invoice.status = settled_status(invoice);
            invoice.body.updated_at = Utc::now();
            Ok(invoice.clone())
        })?;

        tracing::info!(
            "Recorded payment of {} on invoice {} (balance {}, status {})",
            input.amount,
            invoice.number(),
            balance_due(&invoice),
            invoice.status.as_str()
        );
        Ok(invoice)
    }

    /// Flip sent invoices past their due date to overdue.
    /// Returns the ids that changed.
    pub fn detect_overdue(&self, today: NaiveDate) -> Result<Vec<String>> {
        let is_overdue = |invoice: &Invoice| {
            invoice.status == InvoiceStatus::Sent
                && invoice.due_date.is_some_and(|due| due < today)
        };

        let due: Vec<String> = self.store.read(|data| {
            data.invoices
                .iter()
                .filter(|&i| is_overdue(i))
                .map(|i| i.body.id.clone())
                .collect()
        });

        if due.is_empty() {
            return Ok(due);
        }

        self.store.mutate(|data| {
            let now = Utc::now();
            for invoice in data.invoices.iter_mut().filter(|i| is_overdue(&**i)) {
                invoice.status = InvoiceStatus::Overdue;
                invoice.body.updated_at = now;
            }
            Ok(())
        })?;

        tracing::info!("Marked {} invoice(s) overdue", due.len());
        Ok(due)
    }

    /// `total - deposit - payments`; negative when overpaid
    pub fn balance_due(&self, id: &str) -> Result<Decimal> {
        self.store.read(|data| data.invoice(id).map(balance_due))
    }

    /// Sum of positive balances on invoices that still expect money
    pub fn outstanding_total(&self) -> Decimal {
        self.store.read(|data| {
            data.invoices
                .iter()
                .filter(|i| matches!(i.status, InvoiceStatus::Sent | InvoiceStatus::Overdue))
                .map(|i| balance_due(i).max(Decimal::ZERO))
                .sum()
        })
    }

    /// Money received on an invoice so far
    pub fn amount_received(&self, id: &str) -> Result<Decimal> {
        self.store.read(|data| data.invoice(id).map(amount_received))
    }

    /// Turn a recurring template back into a plain invoice
    pub fn stop_recurring(&self, id: &str) -> Result<Invoice> {
        self.store.mutate(|data| {
            let invoice = data.invoice_mut(id)?;
            if let Some(recurrence) = invoice.recurrence.as_mut() {
                recurrence.active = false;
            }
            invoice.body.updated_at = Utc::now();
            Ok(invoice.clone())
        })
    }
}

/// Keep the stored next-occurrence date when an edit leaves the schedule alone
fn merge_recurrence(
    invoice: &Invoice,
    incoming: Option<crate::store::RecurrenceSpec>,
) -> Option<crate::store::RecurrenceSpec> {
    let mut incoming = incoming?;
    if incoming.next_date.is_none() {
        if let Some(current) = &invoice.recurrence {
            if current.frequency == incoming.frequency {
                incoming.next_date = current.next_date;
            }
        }
    }
    Some(incoming)
}
