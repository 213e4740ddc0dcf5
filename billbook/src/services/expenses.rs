//! Expenses service

use crate::config::MAX_AMOUNT;
use crate::engine::calculator::max_amount;
use crate::error::{AppError, Result};
use crate::store::{new_id, Expense, ExpenseCategory, Store};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Expense form input
#[derive(Debug, Clone)]
pub struct ExpenseInput {
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    pub vendor: String,
    pub amount: Decimal,
    pub description: String,
}

fn validate(input: &ExpenseInput) -> Result<()> {
    if input.amount < Decimal::ZERO {
        return Err(AppError::validation("Expense amount must not be negative"));
    }
    if input.amount > max_amount() {
        return Err(AppError::validation(format!(
            "Expense amount must not exceed {}",
            MAX_AMOUNT
        )));
    }
    Ok(())
}

/// Service for managing expenses
#[derive(Clone)]
pub struct ExpensesService {
    store: Store,
}

impl ExpensesService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// All expenses, newest first
    pub fn list_expenses(&self) -> Vec<Expense> {
        let mut expenses = self.store.list_expenses();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        expenses
    }

    pub fn create_expense(&self, input: ExpenseInput) -> Result<Expense> {
        validate(&input)?;

        let expense = self.store.mutate(|data| {
            let expense = Expense {
                id: new_id(),
                date: input.date,
                category: input.category,
                vendor: input.vendor.trim().to_string(),
                amount: input.amount,
                description: input.description.clone(),
            };
            data.expenses.push(expense.clone());
            Ok(expense)
        })?;

        tracing::info!("Recorded expense {} ({})", expense.amount, expense.id);
        Ok(expense)
    }

    pub fn update_expense(&self, id: &str, input: ExpenseInput) -> Result<Expense> {
        validate(&input)?;

        self.store.mutate(|data| {
            let expense = data.expense_mut(id)?;
            expense.date = input.date;
            expense.category = input.category;
            expense.vendor = input.vendor.trim().to_string();
            expense.amount = input.amount;
            expense.description = input.description.clone();
            Ok(expense.clone())
        })
    }

    pub fn delete_expense(&self, id: &str) -> Result<()> {
        self.store.mutate(|data| {
            let before = data.expenses.len();
            data.expenses.retain(|e| e.id != id);
            if data.expenses.len() == before {
                return Err(AppError::not_found("Expense", id));
            }
            Ok(())
        })
    }
}
