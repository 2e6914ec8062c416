//! # Domain Types
//!
//! Core domain types used throughout BranchPOS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Reference data (read-only for the engine)                              │
//! │  ┌─────────────────┐   ┌─────────────────┐                              │
//! │  │     Branch      │   │     Product     │                              │
//! │  │  code, tax bps  │   │  sku, price,    │                              │
//! │  │  is_active      │   │  has_sizes      │                              │
//! │  └─────────────────┘   └─────────────────┘                              │
//! │                                                                         │
//! │  Stock counters (mutated only by the ledger)                            │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   BranchStock   │   │   ProductSize   │   │    StockKey     │       │
//! │  │ (branch,product)│   │ (prod,br,size)  │   │ size None/Some  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Append-only audit + transactions                                       │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │InventoryMovement│   │ Sale / SaleItem │   │  StockTransfer  │       │
//! │  │ prev → new, Δ   │   │  OrderStatus    │   │  OUT + IN pair  │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Identity
//! Every entity has a UUID v4 `id` used for relations. Branches, products and
//! sales also carry a human-readable business key (code, sku, sale_number).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, TaxRate};

// =============================================================================
// Branch
// =============================================================================

/// A physical store or the online storefront's fulfilment branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Branch {
    pub id: String,
    /// Short code used in sale numbers ("CENTRO", "NORTE").
    pub code: String,
    pub name: String,
    /// Branch-level tax override in basis points.
    pub tax_rate_bps: Option<i64>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// Returns the branch tax override, if one is configured.
    pub fn tax_override(&self) -> Option<TaxRate> {
        self.tax_rate_bps
            .and_then(|bps| u32::try_from(bps).ok())
            .map(TaxRate::from_bps)
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown on receipts and sale items.
    pub name: String,

    /// Price in cents (smallest currency unit).
    pub price_cents: i64,

    /// Cost in cents.
    pub cost_cents: Option<i64>,

    /// Default low-stock threshold copied to new branch counters.
    pub min_stock: i64,

    /// Whether stock is tracked per size (clothing, footwear).
    pub has_sizes: bool,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }
}

// =============================================================================
// Stock Counters
// =============================================================================

/// Stock counter for a product without sizes at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BranchStock {
    pub branch_id: String,
    pub product_id: String,
    pub stock_quantity: i64,
    pub min_stock: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Stock counter for one size of a product at one branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ProductSize {
    pub product_id: String,
    pub branch_id: String,
    pub size: String,
    pub stock_quantity: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Identifies one stock counter: the unit of serialization.
///
/// `size = None` addresses the `branch_stock` row, `Some` the
/// `product_sizes` row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockKey {
    pub product_id: String,
    pub branch_id: String,
    pub size: Option<String>,
}

impl StockKey {
    pub fn new(product_id: impl Into<String>, branch_id: impl Into<String>) -> Self {
        StockKey {
            product_id: product_id.into(),
            branch_id: branch_id.into(),
            size: None,
        }
    }

    pub fn sized(
        product_id: impl Into<String>,
        branch_id: impl Into<String>,
        size: impl Into<String>,
    ) -> Self {
        StockKey {
            product_id: product_id.into(),
            branch_id: branch_id.into(),
            size: Some(size.into()),
        }
    }

    /// Same product and size at another branch.
    pub fn at_branch(&self, branch_id: impl Into<String>) -> Self {
        StockKey {
            product_id: self.product_id.clone(),
            branch_id: branch_id.into(),
            size: self.size.clone(),
        }
    }
}

impl fmt::Display for StockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.size {
            Some(size) => write!(f, "{}@{}#{}", self.product_id, self.branch_id, size),
            None => write!(f, "{}@{}", self.product_id, self.branch_id),
        }
    }
}

/// A counter row flattened for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockLevel {
    pub product_id: String,
    pub branch_id: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub min_stock: i64,
    /// `quantity <= min_stock`.
    pub is_low: bool,
}

// =============================================================================
// Inventory Movements
// =============================================================================

/// Kind of stock movement recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementType {
    Sale,
    TransferIn,
    TransferOut,
    Adjustment,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Sale => "SALE",
            MovementType::TransferIn => "TRANSFER_IN",
            MovementType::TransferOut => "TRANSFER_OUT",
            MovementType::Adjustment => "ADJUSTMENT",
        }
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable entry of the stock audit log.
///
/// `new_stock = previous_stock + quantity` always holds; `seq` orders the
/// entries of every key by application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryMovement {
    pub seq: i64,
    pub id: String,
    pub product_id: String,
    pub branch_id: String,
    pub size: Option<String>,
    pub movement_type: MovementType,
    /// Signed delta (negative for decreases).
    pub quantity: i64,
    pub previous_stock: i64,
    pub new_stock: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InventoryMovement {
    pub fn key(&self) -> StockKey {
        StockKey {
            product_id: self.product_id.clone(),
            branch_id: self.branch_id.clone(),
            size: self.size.clone(),
        }
    }
}

// =============================================================================
// Sale Type
// =============================================================================

/// Channel a sale was made through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleType {
    /// Counter sale at a branch.
    Pos,
    /// Online storefront order fulfilled by a branch.
    Ecommerce,
}

impl SaleType {
    /// Prefix used in sale numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            SaleType::Pos => "POS",
            SaleType::Ecommerce => "WEB",
        }
    }
}

impl Default for SaleType {
    fn default() -> Self {
        SaleType::Pos
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Fulfilment status of a sale.
///
/// ## State Machine
/// ```text
/// PENDING ──► PROCESSING ──► SHIPPED ──► DELIVERED
///    │             │
///    └──────┬──────┘
///           ▼
///       CANCELLED
/// ```
/// DELIVERED and CANCELLED are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Checks the state machine above.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Shipped)
                | (Shipped, Delivered)
                | (Pending, Cancelled)
                | (Processing, Cancelled)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    DebitCard,
    CreditCard,
    BankTransfer,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::BankTransfer => "bank_transfer",
        }
    }
}

/// Payment method plus installment count chosen for a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentSelection {
    pub method: PaymentMethod,
    #[serde(default = "default_installments")]
    pub installments: u32,
}

fn default_installments() -> u32 {
    1
}

impl PaymentSelection {
    pub fn new(method: PaymentMethod, installments: u32) -> Self {
        PaymentSelection {
            method,
            installments,
        }
    }

    pub fn cash() -> Self {
        PaymentSelection::new(PaymentMethod::Cash, 1)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A persisted sale. Financial fields never change after creation.
///
/// `total = subtotal + surcharge + tax - discount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// `{POS|WEB}-{BRANCHCODE}-{YYYYMMDD}-{NNNNN}`.
    pub sale_number: String,
    pub sale_type: SaleType,
    pub branch_id: String,
    pub user_id: String,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub surcharge_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Rate the tax was computed with; None when an explicit amount was given.
    pub tax_rate_bps: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub installments: i64,
    pub order_status: OrderStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Checks the stored components still add up to the stored total.
    pub fn is_balanced(&self) -> bool {
        self.subtotal_cents + self.surcharge_cents + self.tax_cents - self.discount_cents
            == self.total_cents
    }
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line of a sale.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    /// 1-based position in the request.
    pub line_number: i64,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub size: Option<String>,
    pub quantity: i64,
    /// Unit price in cents at time of sale (frozen).
    pub unit_price_cents: i64,
    /// unit_price × quantity.
    pub total_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SaleItem {
    pub fn key(&self, branch_id: &str) -> StockKey {
        StockKey {
            product_id: self.product_id.clone(),
            branch_id: branch_id.to_string(),
            size: self.size.clone(),
        }
    }
}

// =============================================================================
// Stock Transfer
// =============================================================================

/// Header linking the TRANSFER_OUT / TRANSFER_IN movement pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockTransfer {
    pub id: String,
    pub product_id: String,
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub size: Option<String>,
    pub quantity: i64,
    pub reason: Option<String>,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Reference Types
// =============================================================================

/// `reference_type` recorded on movements written by a sale.
pub const REFERENCE_SALE: &str = "SALE";

/// `reference_type` recorded on transfer movements.
pub const REFERENCE_TRANSFER: &str = "TRANSFER";

/// `reference_type` recorded on restocks caused by a cancellation.
pub const REFERENCE_SALE_CANCELLATION: &str = "SALE_CANCELLATION";

/// `reference_type` recorded on manual adjustments.
pub const REFERENCE_MANUAL: &str = "MANUAL";

// =============================================================================
// Unit Tests
// =============================================================================
