//! # branchpos-core: Pure Business Logic for BranchPOS
//!
//! This crate holds the domain model of the multi-branch point-of-sale
//! backend as pure functions and plain types with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BranchPOS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    apps/api (axum routes)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        branchpos-engine (Sale / Transfer / Inventory)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              ★ branchpos-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  pricing  │  │ validation│  │   │
//! │  │   │  Product  │  │   Money   │  │ Calculator│  │   rules   │  │   │
//! │  │   │   Sale    │  │  TaxRate  │  │ Breakdown │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              branchpos-db (SQLite, StockLedger)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Branch, Product, Sale, InventoryMovement, ...)
//! - [`money`] - Money, TaxRate and SurchargeRate with integer arithmetic
//! - [`pricing`] - The order-level pricing calculator
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Example Usage
//!
//! ```rust
//! use branchpos_core::money::{Money, TaxRate};
//! use branchpos_core::pricing::{PriceLine, PricingCalculator, TaxBasis};
//!
//! let lines = [PriceLine::new(Money::from_cents(10_000), 3)];
//! let breakdown = PricingCalculator::compute(
//!     &lines,
//!     TaxBasis::Rate(TaxRate::from_bps(2100)),
//!     None,
//!     None,
//! )
//! .unwrap();
//!
//! assert_eq!(breakdown.subtotal.cents(), 30_000);
//! assert_eq!(breakdown.tax.cents(), 6_300);
//! assert_eq!(breakdown.total.cents(), 36_300);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{CurrencyFormat, Money, SurchargeRate, TaxRate};
pub use pricing::{PriceLine, PricingBreakdown, PricingCalculator, TaxBasis};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum number of lines allowed in a single sale request.
pub const MAX_SALE_LINES: usize = 200;

/// Maximum quantity of a single line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 10).
pub const MAX_LINE_QUANTITY: i64 = 9_999;

/// Maximum installments accepted for a card payment plan.
pub const MAX_INSTALLMENTS: u32 = 48;
