// src/model.rs

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// One inventory record. `sku` is the unique key within the ledger;
/// uniqueness comparison is case-insensitive and trimmed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub sku: String,
    pub name: String,
    pub grade: String,
    pub size: String,
    /// Current quantity. May go negative (oversold / backordered).
    pub stock: i64,
    /// Snapshot taken at creation; low-stock denominator, never mutated.
    pub initial_stock: i64,
    pub price: f64,
}

// ---------------------------------------------------------------------------
// Extraction result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    InitialSetup,
    Sale,
    Purchase,
    Unknown,
}

/// Customer identity as the extraction engine reports it. Only `name`
/// is guaranteed present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

/// A single line item extracted from a document or note. Free text,
/// unnormalized; consumed entirely by one reconciliation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedItem {
    #[serde(default)]
    pub sku: Option<String>,
    pub name: String,
    pub grade: String,
    pub size: String,
    pub qty: f64,
    #[serde(default)]
    pub price: Option<f64>,
}

/// Validated output of one extraction call.
#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub transaction_type: TransactionType,
    pub summary: String,
    pub customer_info: Option<CustomerInfo>,
    pub extracted_items: Vec<ExtractedItem>,
    pub alerts: Vec<String>,
}

// ---------------------------------------------------------------------------
// Reconciliation effects
// ---------------------------------------------------------------------------

/// Before/after stock for one reconciled line item. Ordering mirrors the
/// input item order; `previous_stock == 0` marks a freshly created record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AffectedItem {
    pub sku: String,
    pub previous_stock: i64,
    pub new_stock: i64,
}

// ---------------------------------------------------------------------------
// Customers
// ---------------------------------------------------------------------------

/// An order item as frozen into a customer's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub sku: String,
    pub qty: f64,
    pub price: f64,
}

/// Immutable once created; owned by its parent customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// RFC 3339 creation timestamp.
    pub date: String,
    pub r#type: TransactionType,
    pub items: Vec<OrderItem>,
    pub total_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    /// De-duplication key, compared case-insensitively and trimmed.
    pub name: String,
    pub email: String,
    pub contact: String,
    /// Newest first.
    pub order_history: Vec<Order>,
}

// ---------------------------------------------------------------------------
// Analytics
// ---------------------------------------------------------------------------

/// Derived view over inventory + customers; recomputed on every read.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total_inventory_value: f64,
    pub low_stock_count: usize,
    pub total_sales: f64,
    pub top_product: Option<Product>,
}
