//! Shared rules for saving invoices and estimates

use crate::engine::calculator::{apply_totals, check_limits};
use crate::error::{AppError, Result};
use crate::store::{Client, Dataset, DocumentBody, DocumentDraft, PartySnapshot};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;

/// Reject drafts that cannot be saved. Runs before any state is touched.
pub(crate) fn validate_draft(draft: &DocumentDraft) -> Result<()> {
    if draft.document_number.trim().is_empty() {
        return Err(AppError::validation("Document number is required"));
    }

    if draft.line_items.is_empty() {
        return Err(AppError::validation("At least one line item is required"));
    }

    for (index, item) in draft.line_items.iter().enumerate() {
        if item.quantity < Decimal::ZERO || item.rate < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Line {}: quantity and rate must not be negative",
                index + 1
            )));
        }
        if item.discount_value < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "Line {}: discount must not be negative",
                index + 1
            )));
        }
    }

    if draft.tax_rate < Decimal::ZERO {
        return Err(AppError::validation("Tax rate must not be negative"));
    }

    if draft.discount_value < Decimal::ZERO {
        return Err(AppError::validation("Discount must not be negative"));
    }

    check_limits(&draft.line_items, draft.discount_value, draft.tax_rate)
}

/// Document numbers are unique within their sequence
pub(crate) fn ensure_unique_number<'a>(
    mut existing: impl Iterator<Item = (&'a str, &'a str)>,
    number: &str,
    own_id: Option<&str>,
) -> Result<()> {
    let number = number.trim();
    let taken = existing.any(|(id, existing_number)| {
        existing_number.trim() == number && Some(id) != own_id
    });

    if taken {
        return Err(AppError::validation(format!(
            "Document number {} is already in use",
            number
        )));
    }
    Ok(())
}

/// Build the stored body from a draft, keeping id and creation time of
/// the record being edited. Derived totals are recomputed.
pub(crate) fn build_body(
    draft: &DocumentDraft,
    existing: Option<&DocumentBody>,
    now: DateTime<Utc>,
) -> DocumentBody {
    let (id, created_at) = match existing {
        Some(body) => (body.id.clone(), body.created_at),
        None => (crate::store::new_id(), now),
    };

    let mut body = DocumentBody {
        id,
        document_number: draft.document_number.trim().to_string(),
        date: draft.date,
        from_party: draft.from_party.clone(),
        to_party: draft.to_party.clone(),
        line_items: draft.line_items.clone(),
        tax_rate: draft.tax_rate,
        discount_value: draft.discount_value,
        discount_type: draft.discount_type,
        subtotal: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        tax: Decimal::ZERO,
        total: Decimal::ZERO,
        memo: draft.memo.clone(),
        notes: draft.notes.clone(),
        created_at,
        updated_at: now,
    };
    apply_totals(&mut body);
    body
}

/// Copy of an existing body under a new id and number
pub(crate) fn copy_body(
    source: &DocumentBody,
    number: String,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> DocumentBody {
    let mut body = DocumentBody {
        id: crate::store::new_id(),
        document_number: number,
        date,
        created_at: now,
        updated_at: now,
        ..source.clone()
    };
    apply_totals(&mut body);
    body
}

/// Create a client from the "to" party unless one already matches.
/// Existing clients are never updated from documents.
pub(crate) fn remember_client(data: &mut Dataset, party: &PartySnapshot, now: DateTime<Utc>) {
    if party.company.trim().is_empty() || data.client_by_company(&party.company).is_some() {
        return;
    }

    let client = Client::from_party(party, now);
    tracing::info!("Auto-creating client: {}", client.company);
    data.clients.push(client);
}

/// Due date derived from payment terms
pub(crate) fn due_date_from_terms(date: NaiveDate, terms_days: u32) -> NaiveDate {
    date.checked_add_signed(Duration::days(i64::from(terms_days)))
        .unwrap_or(date)
}
