//! Document calculator
//!
//! Pure functions turning line items, an invoice-level discount and a tax
//! rate into totals. Cheap enough to call on every keystroke.

use super::money::round_money;
use crate::config::{MAX_AMOUNT, MAX_LINE_ITEMS, MAX_QUANTITY, MAX_TAX_RATE};
use crate::error::{AppError, Result};
use crate::store::models::{DiscountType, DocumentBody, DocumentDraft, Invoice, LineItem};
use rust_decimal::Decimal;
use serde::Serialize;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Derived totals of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

/// Apply a discount to `base`, never going below zero or above `base`
fn discounted(base: Decimal, value: Decimal, discount_type: DiscountType) -> Decimal {
    let reduction = match discount_type {
        DiscountType::Percent => base * value.min(HUNDRED) / HUNDRED,
        DiscountType::Flat => value,
    };
    (base - reduction.max(Decimal::ZERO)).max(Decimal::ZERO)
}

/// Largest accepted money amount
pub fn max_amount() -> Decimal {
    Decimal::from(MAX_AMOUNT)
}

/// Check that a document's inputs stay within the calculator's range.
/// Totals are only computed for input that passes.
pub fn check_limits(
    line_items: &[LineItem],
    discount_value: Decimal,
    tax_rate: Decimal,
) -> Result<()> {
    if line_items.len() > MAX_LINE_ITEMS {
        return Err(AppError::validation(format!(
            "At most {} line items are allowed",
            MAX_LINE_ITEMS
        )));
    }

    let max_quantity = Decimal::from(MAX_QUANTITY);
    for (index, item) in line_items.iter().enumerate() {
        if item.quantity.abs() > max_quantity {
            return Err(AppError::validation(format!(
                "Line {}: quantity exceeds {}",
                index + 1,
                MAX_QUANTITY
            )));
        }
        if item.rate.abs() > max_amount() || item.discount_value.abs() > max_amount() {
            return Err(AppError::validation(format!(
                "Line {}: rate and discount must not exceed {}",
                index + 1,
                MAX_AMOUNT
            )));
        }
    }

    if discount_value.abs() > max_amount() {
        return Err(AppError::validation(format!(
            "Discount must not exceed {}",
            MAX_AMOUNT
        )));
    }
    if tax_rate.abs() > Decimal::from(MAX_TAX_RATE) {
        return Err(AppError::validation(format!(
            "Tax rate must not exceed {}%",
            MAX_TAX_RATE
        )));
    }
    Ok(())
}

/// Limits for a stored invoice: its document inputs plus deposit and payments
pub fn check_invoice_limits(invoice: &Invoice) -> Result<()> {
    let body = &invoice.body;
    check_limits(&body.line_items, body.discount_value, body.tax_rate)?;

    let out_of_range = |amount: Decimal| amount.abs() > max_amount();
    if out_of_range(invoice.deposit_amount)
        || invoice.payments.iter().any(|p| out_of_range(p.amount))
    {
        return Err(AppError::validation(format!(
            "Invoice {}: deposit and payments must not exceed {}",
            body.document_number, MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Amount of a single line: quantity x rate less its own discount, floored at 0
pub fn line_amount(item: &LineItem) -> Decimal {
    let gross = item.quantity * item.rate;
    round_money(discounted(gross, item.discount_value, item.discount_type))
}

/// Document-level discount, clamped to `[0, subtotal]`
pub fn discount_amount(subtotal: Decimal, value: Decimal, discount_type: DiscountType) -> Decimal {
    round_money(subtotal - discounted(subtotal, value, discount_type))
        .clamp(Decimal::ZERO, subtotal.max(Decimal::ZERO))
}

/// Compute totals for a set of lines
pub fn compute_totals(
    line_items: &[LineItem],
    discount_value: Decimal,
    discount_type: DiscountType,
    tax_rate: Decimal,
) -> Totals {
    let subtotal = round_money(line_items.iter().map(line_amount).sum());
    let discount_amount = discount_amount(subtotal, discount_value, discount_type);
    let taxable = subtotal - discount_amount;
    let tax = round_money(taxable * tax_rate.max(Decimal::ZERO) / HUNDRED);

    Totals {
        subtotal,
        discount_amount,
        tax,
        total: round_money(taxable + tax),
    }
}

/// Live preview for an unsaved form. Out-of-range input is reported
/// instead of computed.
pub fn recalculate_preview(draft: &DocumentDraft) -> Result<Totals> {
    check_limits(&draft.line_items, draft.discount_value, draft.tax_rate)?;
    Ok(compute_totals(
        &draft.line_items,
        draft.discount_value,
        draft.discount_type,
        draft.tax_rate,
    ))
}

/// Recompute every derived field of a document in place
pub fn apply_totals(body: &mut DocumentBody) {
    for item in &mut body.line_items {
        item.amount = line_amount(item);
    }

    let totals = compute_totals(
        &body.line_items,
        body.discount_value,
        body.discount_type,
        body.tax_rate,
    );
    body.subtotal = totals.subtotal;
    body.discount_amount = totals.discount_amount;
    body.tax = totals.tax;
    body.total = totals.total;
}

/// Sum of deposit and recorded payments
pub fn amount_received(invoice: &Invoice) -> Decimal {
    invoice.deposit_amount + invoice.payments.iter().map(|p| p.amount).sum::<Decimal>()
}

/// `total - deposit - payments`. Negative means overpaid.
pub fn balance_due(invoice: &Invoice) -> Decimal {
    invoice.body.total - amount_received(invoice)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(value: i64, scale: u32) -> Decimal {
        Decimal::new(value, scale)
    }

    #[test]
    fn test_reference_invoice_totals() {
        let items = vec![
            LineItem::new("Design", Decimal::from(2), Decimal::from(100)),
            LineItem::new("Hosting", Decimal::ONE, Decimal::from(50))
                .with_discount(Decimal::from(10), DiscountType::Percent),
        ];

        let totals = compute_totals(&items, Decimal::from(5), DiscountType::Flat, Decimal::from(8));

        assert_eq!(totals.subtotal, Decimal::from(245));
        assert_eq!(totals.discount_amount, Decimal::from(5));
        assert_eq!(totals.tax, dec(1920, 2));
        assert_eq!(totals.total, dec(25920, 2));
    }

    #[test]
    fn test_line_discount_never_goes_negative() {
        let flat = LineItem::new("x", Decimal::from(3), Decimal::from(10))
            .with_discount(Decimal::from(500), DiscountType::Flat);
        assert_eq!(line_amount(&flat), Decimal::ZERO);

        let percent = LineItem::new("x", Decimal::from(3), Decimal::from(10))
            .with_discount(Decimal::from(150), DiscountType::Percent);
        assert_eq!(line_amount(&percent), Decimal::ZERO);

        let partial = LineItem::new("x", Decimal::from(3), Decimal::from(10))
            .with_discount(Decimal::from(7), DiscountType::Flat);
        assert_eq!(line_amount(&partial), Decimal::from(23));
    }

    #[test]
    fn test_line_amount_matches_formula_over_grid() {
        for qty in 0..6i64 {
            for rate in [0i64, 1, 999, 12_345] {
                for disc in [0i64, 1, 50, 100, 100_000] {
                    let item = LineItem::new("x", Decimal::from(qty), dec(rate, 2))
                        .with_discount(dec(disc, 2), DiscountType::Flat);
                    let expected = (Decimal::from(qty) * dec(rate, 2) - dec(disc, 2)).max(Decimal::ZERO);
                    assert_eq!(line_amount(&item), expected);
                    assert!(line_amount(&item) >= Decimal::ZERO);
                }
            }
        }
    }

    #[test]
    fn test_document_discount_clamped_to_subtotal() {
        let items = vec![LineItem::new("x", Decimal::ONE, Decimal::from(40))];

        let flat = compute_totals(&items, Decimal::from(1000), DiscountType::Flat, Decimal::from(10));
        assert_eq!(flat.discount_amount, Decimal::from(40));
        assert_eq!(flat.tax, Decimal::ZERO);
        assert_eq!(flat.total, Decimal::ZERO);

        let percent = compute_totals(&items, Decimal::from(250), DiscountType::Percent, Decimal::ZERO);
        assert_eq!(percent.discount_amount, Decimal::from(40));

        let negative = compute_totals(&items, Decimal::from(-5), DiscountType::Flat, Decimal::ZERO);
        assert_eq!(negative.discount_amount, Decimal::ZERO);
        assert_eq!(negative.total, Decimal::from(40));
    }

    #[test]
    fn test_total_identity_holds() {
        let items = vec![
            LineItem::new("a", dec(15, 1), dec(3333, 2)),
            LineItem::new("b", dec(7, 0), dec(1999, 2))
                .with_discount(dec(125, 1), DiscountType::Percent),
        ];

        for (value, kind) in [
            (Decimal::ZERO, DiscountType::Flat),
            (dec(333, 1), DiscountType::Percent),
            (Decimal::from(17), DiscountType::Flat),
        ] {
            let t = compute_totals(&items, value, kind, dec(725, 2));
            assert_eq!(t.total, t.subtotal - t.discount_amount + t.tax);
            assert!(t.discount_amount >= Decimal::ZERO && t.discount_amount <= t.subtotal);
        }
    }

    #[test]
    fn test_huge_percent_discount_is_capped() {
        let item = LineItem::new("x", Decimal::from(MAX_QUANTITY), max_amount())
            .with_discount(max_amount(), DiscountType::Percent);
        assert_eq!(line_amount(&item), Decimal::ZERO);

        let totals = compute_totals(&[item], max_amount(), DiscountType::Percent, Decimal::ZERO);
        assert_eq!(totals.total, Decimal::ZERO);
    }

    #[test]
    fn test_largest_accepted_document_computes() {
        let items: Vec<LineItem> = (0..MAX_LINE_ITEMS)
            .map(|_| LineItem::new("x", Decimal::from(MAX_QUANTITY), max_amount()))
            .collect();
        assert!(check_limits(&items, max_amount(), Decimal::from(MAX_TAX_RATE)).is_ok());

        let totals = compute_totals(
            &items,
            Decimal::ZERO,
            DiscountType::Flat,
            Decimal::from(MAX_TAX_RATE),
        );
        assert_eq!(totals.total, totals.subtotal * Decimal::from(2));
    }

    #[test]
    fn test_preview_rejects_out_of_range_input() {
        let mut draft = DocumentDraft::new("INV-5000", chrono::NaiveDate::MIN);
        draft.line_items.push(LineItem::new(
            "x",
            Decimal::from(1_000_000_000_000_000i64),
            Decimal::from(1_000_000_000_000_000i64),
        ));
        assert!(matches!(recalculate_preview(&draft), Err(AppError::Validation(_))));

        draft.line_items[0] = LineItem::new("x", Decimal::from(2), Decimal::from(100));
        assert_eq!(recalculate_preview(&draft).unwrap().total, dec(20000, 2));

        draft.tax_rate = Decimal::from(1000);
        assert!(recalculate_preview(&draft).is_err());
    }

    #[test]
    fn test_empty_document_is_zero() {
        let t = compute_totals(&[], Decimal::from(10), DiscountType::Percent, Decimal::from(8));
        assert_eq!(t, Totals::default());
    }
}
