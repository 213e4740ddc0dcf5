//! Data model
//!
//! Rust structs for every entity the store owns. All models use serde with
//! camelCase keys; the JSON produced here is the local cache, export and
//! remote sync format, so field names must stay stable.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type Id = String;

/// Generate a fresh entity identifier
pub fn new_id() -> Id {
    uuid::Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

// ===== Line Items & Documents =====

/// How a discount value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    #[default]
    Percent,
    Flat,
}

/// A single billable row. `amount` is derived from the other fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// Soft tag pointing at the catalog entry this line was copied from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub rate: Decimal,
    #[serde(default)]
    pub discount_value: Decimal,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub amount: Decimal,
}

impl LineItem {
    pub fn new(description: impl Into<String>, quantity: Decimal, rate: Decimal) -> Self {
        Self {
            service_id: None,
            service_name: None,
            description: description.into(),
            quantity,
            rate,
            discount_value: Decimal::ZERO,
            discount_type: DiscountType::Percent,
            amount: Decimal::ZERO,
        }
    }

    pub fn with_discount(mut self, value: Decimal, discount_type: DiscountType) -> Self {
        self.discount_value = value;
        self.discount_type = discount_type;
        self
    }
}

/// Structured postal address.
///
/// `legacy` holds the old single free-text field; address migration
/// parses it into the structured fields and removes it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    #[serde(default)]
    pub address1: String,
    #[serde(default)]
    pub address2: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub zip: String,
    #[serde(default, rename = "address", skip_serializing_if = "Option::is_none")]
    pub legacy: Option<String>,
}

/// Copy of a business or client identity taken when a document is saved
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(flatten)]
    pub address: Address,
}

/// Fields shared by invoices and estimates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentBody {
    pub id: Id,
    pub document_number: String,
    pub date: NaiveDate,
    #[serde(rename = "from")]
    pub from_party: PartySnapshot,
    #[serde(rename = "to")]
    pub to_party: PartySnapshot,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_value: Decimal,
    #[serde(default)]
    pub discount_type: DiscountType,
    #[serde(default)]
    pub subtotal: Decimal,
    #[serde(default)]
    pub discount_amount: Decimal,
    #[serde(default)]
    pub tax: Decimal,
    #[serde(default)]
    pub total: Decimal,
    #[serde(default)]
    pub memo: String,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Cancelled,
    Archived,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
            InvoiceStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EstimateStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Converted,
    Archived,
}

impl EstimateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EstimateStatus::Draft => "draft",
            EstimateStatus::Sent => "sent",
            EstimateStatus::Approved => "approved",
            EstimateStatus::Rejected => "rejected",
            EstimateStatus::Converted => "converted",
            EstimateStatus::Archived => "archived",
        }
    }
}

/// A recorded payment. Never edited or removed once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Id,
    pub amount: Decimal,
    pub date: NaiveDate,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
}

/// Schedule attached to a recurring invoice template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceSpec {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Next date an instance is due; computed from the template date when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_date: Option<NaiveDate>,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl RecurrenceSpec {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            end_date: None,
            next_date: None,
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[serde(flatten)]
    pub body: DocumentBody,
    pub status: InvoiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub deposit_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<RecurrenceSpec>,
    /// Number of the estimate this invoice was converted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_from_estimate: Option<String>,
    /// Id of the recurring template that generated this invoice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_from_recurring: Option<Id>,
}

impl Invoice {
    pub fn id(&self) -> &str {
        &self.body.id
    }

    pub fn number(&self) -> &str {
        &self.body.document_number
    }

    pub fn is_recurring_template(&self) -> bool {
        self.recurrence.as_ref().is_some_and(|r| r.active)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Estimate {
    #[serde(flatten)]
    pub body: DocumentBody,
    pub status: EstimateStatus,
    /// Number of the invoice produced by conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted_to_invoice: Option<String>,
}

impl Estimate {
    pub fn id(&self) -> &str {
        &self.body.id
    }

    pub fn number(&self) -> &str {
        &self.body.document_number
    }
}

// ===== Clients, Catalog, Expenses =====

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: Id,
    pub company: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(flatten)]
    pub address: Address,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Build a client record from the "to" party of a document
    pub fn from_party(party: &PartySnapshot, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            company: party.company.trim().to_string(),
            name: party.name.clone(),
            email: party.email.clone(),
            phone: party.phone.clone(),
            address: Address {
                legacy: None,
                ..party.address.clone()
            },
            created_at: now,
            updated_at: now,
        }
    }

    pub fn to_party(&self) -> PartySnapshot {
        PartySnapshot {
            company: self.company.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            address: self.address.clone(),
        }
    }
}

/// Reusable rate-card entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Id,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub rate: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseCategory {
    Software,
    Hardware,
    Office,
    Travel,
    Meals,
    Marketing,
    Utilities,
    ProfessionalServices,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: Id,
    pub date: NaiveDate,
    pub category: ExpenseCategory,
    #[serde(default)]
    pub vendor: String,
    pub amount: Decimal,
    #[serde(default)]
    pub description: String,
}

// ===== Settings =====

/// Process-wide settings singleton
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Business identity copied into the "from" party of new documents
    #[serde(default)]
    pub business: PartySnapshot,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default = "default_payment_terms")]
    pub payment_terms: u32,
    #[serde(default = "default_invoice_prefix")]
    pub invoice_prefix: String,
    #[serde(default = "default_estimate_prefix")]
    pub estimate_prefix: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub default_memo: String,
    /// Logo as a data URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    /// Payment-link handle printed on invoices
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_backup: Option<DateTime<Utc>>,
}

fn default_payment_terms() -> u32 {
    crate::config::DEFAULT_PAYMENT_TERMS_DAYS
}

fn default_invoice_prefix() -> String {
    crate::config::DEFAULT_INVOICE_PREFIX.to_string()
}

fn default_estimate_prefix() -> String {
    crate::config::DEFAULT_ESTIMATE_PREFIX.to_string()
}

fn default_currency() -> String {
    crate::config::DEFAULT_CURRENCY.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            business: PartySnapshot::default(),
            tax_rate: Decimal::ZERO,
            payment_terms: default_payment_terms(),
            invoice_prefix: default_invoice_prefix(),
            estimate_prefix: default_estimate_prefix(),
            currency: default_currency(),
            default_memo: String::new(),
            logo: None,
            payment_link: None,
            last_backup: None,
        }
    }
}

// ===== Whole Dataset =====

/// Everything the store owns. Serializes to the local/export record.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub invoices: Vec<Invoice>,
    #[serde(default)]
    pub estimates: Vec<Estimate>,
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub services: Vec<Service>,
    #[serde(default)]
    pub expenses: Vec<Expense>,
    #[serde(default)]
    pub settings: Settings,
}

/// A partial dataset as read from an import file or the remote store.
/// Absent keys mean "leave that collection alone".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Snapshot {
    pub invoices: Option<Vec<Invoice>>,
    pub estimates: Option<Vec<Estimate>>,
    pub clients: Option<Vec<Client>>,
    pub services: Option<Vec<Service>>,
    pub expenses: Option<Vec<Expense>>,
    pub settings: Option<Settings>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.invoices.is_none()
            && self.estimates.is_none()
            && self.clients.is_none()
            && self.services.is_none()
            && self.expenses.is_none()
            && self.settings.is_none()
    }
}

impl From<Dataset> for Snapshot {
    fn from(data: Dataset) -> Self {
        Self {
            invoices: Some(data.invoices),
            estimates: Some(data.estimates),
            clients: Some(data.clients),
            services: Some(data.services),
            expenses: Some(data.expenses),
            settings: Some(data.settings),
        }
    }
}

// ===== Command Inputs =====

/// Form input for saving an invoice or estimate. Totals are never taken
/// from input; they are recomputed on save.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDraft {
    /// Set when editing an existing document
    pub id: Option<Id>,
    pub document_number: String,
    pub date: NaiveDate,
    pub from_party: PartySnapshot,
    pub to_party: PartySnapshot,
    pub line_items: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub discount_value: Decimal,
    pub discount_type: DiscountType,
    pub memo: String,
    pub notes: String,
}

impl DocumentDraft {
    pub fn new(document_number: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: None,
            document_number: document_number.into(),
            date,
            from_party: PartySnapshot::default(),
            to_party: PartySnapshot::default(),
            line_items: Vec::new(),
            tax_rate: Decimal::ZERO,
            discount_value: Decimal::ZERO,
            discount_type: DiscountType::Percent,
            memo: String::new(),
            notes: String::new(),
        }
    }
}

/// Invoice-specific form input
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub document: DocumentDraft,
    /// Defaults to date + payment terms when unset
    pub due_date: Option<NaiveDate>,
    pub deposit_amount: Decimal,
    pub deposit_date: Option<NaiveDate>,
    pub recurrence: Option<RecurrenceSpec>,
    /// Direct status edit; only honoured when updating
    pub status: Option<InvoiceStatus>,
}

impl From<DocumentDraft> for InvoiceDraft {
    fn from(document: DocumentDraft) -> Self {
        Self {
            document,
            due_date: None,
            deposit_amount: Decimal::ZERO,
            deposit_date: None,
            recurrence: None,
            status: None,
        }
    }
}

/// Estimate-specific form input
#[derive(Debug, Clone, PartialEq)]
pub struct EstimateDraft {
    pub document: DocumentDraft,
    /// Direct status edit; only honoured when updating
    pub status: Option<EstimateStatus>,
}

impl From<DocumentDraft> for EstimateDraft {
    fn from(document: DocumentDraft) -> Self {
        Self {
            document,
            status: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_address_field_round_trip() {
        let json = r#"{
            "id": "c1",
            "company": "Acme",
            "address": "1 Main St\nSpringfield, IL 62701",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }"#;

        let client: Client = serde_json::from_str(json).unwrap();
        assert_eq!(
            client.address.legacy.as_deref(),
            Some("1 Main St\nSpringfield, IL 62701")
        );
        assert!(client.address.address1.is_empty());

        let out = serde_json::to_value(&client).unwrap();
        assert!(out.get("address").is_some());
        assert!(out.get("address1").is_some());
    }

    #[test]
    fn test_settings_defaults_fill_missing_keys() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.payment_terms, 30);
        assert_eq!(settings.invoice_prefix, "INV-");
        assert_eq!(settings.estimate_prefix, "EST-");
        assert_eq!(settings.currency, "USD");
    }

    #[test]
    fn test_snapshot_absent_keys_are_none() {
        let snapshot: Snapshot = serde_json::from_str(r#"{"services": []}"#).unwrap();
        assert!(snapshot.services.is_some());
        assert!(snapshot.invoices.is_none());
        assert!(snapshot.settings.is_none());
        assert!(!snapshot.is_empty());
    }

    #[test]
    fn test_invoice_accepts_numeric_amounts() {
        let json = r#"{
            "id": "i1",
            "documentNumber": "INV-5000",
            "date": "2024-01-15",
            "from": {},
            "to": {"company": "Acme"},
            "lineItems": [{"description": "Work", "quantity": 2, "rate": 100.5}],
            "taxRate": 8,
            "status": "sent",
            "createdAt": "2024-01-15T00:00:00Z",
            "updatedAt": "2024-01-15T00:00:00Z"
        }"#;

        let invoice: Invoice = serde_json::from_str(json).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Sent);
        assert_eq!(invoice.body.line_items[0].rate, Decimal::new(1005, 1));
        assert_eq!(invoice.body.tax_rate, Decimal::from(8));
        assert!(invoice.payments.is_empty());
    }
}
