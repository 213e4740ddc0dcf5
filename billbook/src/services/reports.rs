//! Reporting queries
//!
//! Cash-basis figures: revenue is money received (deposits and payments)
//! inside the period, profit is revenue less expenses dated in the period.

use crate::engine::calculator::balance_due;
use crate::store::{Dataset, EstimateStatus, ExpenseCategory, InvoiceStatus, Store};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Inclusive date range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Period {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl Period {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub revenue: Decimal,
    pub expenses: Decimal,
    pub profit: Decimal,
    pub expenses_by_category: BTreeMap<ExpenseCategory, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub draft_invoices: usize,
    pub sent_invoices: usize,
    pub paid_invoices: usize,
    pub overdue_invoices: usize,
    pub outstanding: Decimal,
    pub overdue_amount: Decimal,
    pub open_estimates: usize,
    pub approved_estimates: usize,
}

fn revenue_in(data: &Dataset, period: Period) -> Decimal {
    data.invoices
        .iter()
        .filter(|i| i.status != InvoiceStatus::Cancelled)
        .map(|invoice| {
            let deposit = match invoice.deposit_date {
                Some(date) if period.contains(date) => invoice.deposit_amount,
                _ => Decimal::ZERO,
            };
            let payments: Decimal = invoice
                .payments
                .iter()
                .filter(|p| period.contains(p.date))
                .map(|p| p.amount)
                .sum();
            deposit + payments
        })
        .sum()
}

/// Service for dashboard and report figures
#[derive(Clone)]
pub struct ReportsService {
    store: Store,
}

impl ReportsService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn financial_summary(&self, period: Period) -> FinancialSummary {
        self.store.read(|data| {
            let mut by_category = BTreeMap::new();
            for expense in data.expenses.iter().filter(|e| period.contains(e.date)) {
                *by_category.entry(expense.category).or_insert(Decimal::ZERO) += expense.amount;
            }

            let revenue = revenue_in(data, period);
            let expenses: Decimal = by_category.values().copied().sum();

            FinancialSummary {
                revenue,
                expenses,
                profit: revenue - expenses,
                expenses_by_category: by_category,
            }
        })
    }

    pub fn dashboard(&self) -> DashboardStats {
        self.store.read(|data| {
            let count = |status: InvoiceStatus| {
                data.invoices.iter().filter(|i| i.status == status).count()
            };
            let open_balance = |status: InvoiceStatus| -> Decimal {
                data.invoices
                    .iter()
                    .filter(|i| i.status == status)
                    .map(|i| balance_due(i).max(Decimal::ZERO))
                    .sum()
            };

            let overdue_amount = open_balance(InvoiceStatus::Overdue);

            DashboardStats {
                draft_invoices: count(InvoiceStatus::Draft),
                sent_invoices: count(InvoiceStatus::Sent),
                paid_invoices: count(InvoiceStatus::Paid),
                overdue_invoices: count(InvoiceStatus::Overdue),
                outstanding: open_balance(InvoiceStatus::Sent) + overdue_amount,
                overdue_amount,
                open_estimates: data
                    .estimates
                    .iter()
                    .filter(|e| matches!(e.status, EstimateStatus::Draft | EstimateStatus::Sent))
                    .count(),
                approved_estimates: data
                    .estimates
                    .iter()
                    .filter(|e| e.status == EstimateStatus::Approved)
                    .count(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ExpenseInput, ExpensesService, InvoicesService, PaymentInput};
    use crate::store::{DocumentDraft, InvoiceDraft, LineItem};

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_profit_is_cash_received_minus_expenses() {
        let store = Store::default();
        let invoices = InvoicesService::new(store.clone());
        let expenses = ExpensesService::new(store.clone());

        let mut document = DocumentDraft::new("INV-5000", ymd(2024, 1, 5));
        document
            .line_items
            .push(LineItem::new("Build", Decimal::ONE, Decimal::from(1000)));
        let mut draft = InvoiceDraft::from(document);
        draft.deposit_amount = Decimal::from(200);
        draft.deposit_date = Some(ymd(2024, 1, 5));
        let invoice = invoices.save_invoice(draft).unwrap();
        invoices.mark_sent(invoice.id()).unwrap();

        invoices
            .record_payment(
                invoice.id(),
                PaymentInput {
                    amount: Decimal::from(300),
                    date: ymd(2024, 2, 10),
                    method: "transfer".to_string(),
                    note: String::new(),
                },
            )
            .unwrap();

        for (day, category, amount) in [
            (3, ExpenseCategory::Software, 40),
            (20, ExpenseCategory::Software, 10),
            (21, ExpenseCategory::Travel, 100),
        ] {
            expenses
                .create_expense(ExpenseInput {
                    date: ymd(2024, 1, day),
                    category,
                    vendor: String::new(),
                    amount: Decimal::from(amount),
                    description: String::new(),
                })
                .unwrap();
        }

        let reports = ReportsService::new(store);
        let january = reports.financial_summary(Period {
            from: ymd(2024, 1, 1),
            to: ymd(2024, 1, 31),
        });
        assert_eq!(january.revenue, Decimal::from(200));
        assert_eq!(january.expenses, Decimal::from(150));
        assert_eq!(january.profit, Decimal::from(50));
        assert_eq!(
            january.expenses_by_category.get(&ExpenseCategory::Software),
            Some(&Decimal::from(50))
        );

        let dashboard = reports.dashboard();
        assert_eq!(dashboard.sent_invoices, 1);
        assert_eq!(dashboard.outstanding, Decimal::from(500));
        assert_eq!(dashboard.overdue_amount, Decimal::ZERO);
    }
}
