//! Document computation engine
//!
//! Pure, side-effect free rules shared by the store and the services:
//! - `money`: rounding and display formatting
//! - `calculator`: line amounts, subtotal, discount, tax, total, balance
//! - `numbering`: sequential document numbers and recurrence dates

pub mod calculator;
pub mod money;
pub mod numbering;

pub use calculator::{balance_due, check_limits, compute_totals, recalculate_preview, Totals};
pub use money::{format_currency, format_date, round_money};
pub use numbering::{next_document_number, next_occurrence};
