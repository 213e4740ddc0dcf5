//! Services module
//!
//! Business logic services that coordinate between callers and the store.

pub(crate) mod documents;

pub mod catalog;
pub mod clients;
pub mod estimates;
pub mod expenses;
pub mod invoices;
pub mod migration;
pub mod recurring;
pub mod reports;
pub mod scheduler;
pub mod settings;

pub use catalog::{CatalogService, ServiceInput};
pub use clients::{ClientInput, ClientStats, ClientsService};
pub use estimates::EstimatesService;
pub use expenses::{ExpenseInput, ExpensesService};
pub use invoices::{InvoicesService, PaymentInput};
pub use migration::{migrate_addresses, needs_migration, parse_legacy_address};
pub use recurring::{CatchUpPolicy, RecurringService};
pub use reports::{DashboardStats, FinancialSummary, Period, ReportsService};
pub use scheduler::{Maintenance, MaintenanceReport, SchedulerService};
pub use settings::SettingsService;
