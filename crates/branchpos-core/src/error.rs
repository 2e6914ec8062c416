//! # Error Types
//!
//! Domain-specific error types for branchpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  branchpos-core errors (this file)                                     │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  branchpos-db errors                                                   │
//! │  └── DbError          - Database failures (+ wrapped CoreError)        │
//! │                                                                         │
//! │  branchpos-engine errors                                               │
//! │  └── EngineError      - Stable codes, retryable vs terminal            │
//! │                                                                         │
//! │  apps/api errors                                                       │
//! │  └── ApiError         - JSON body + HTTP status                        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → EngineError → ApiError  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::types::OrderStatus;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Product does not exist or is inactive.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Branch does not exist or is inactive.
    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    /// Sale not found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Applying a movement would take a stock counter below zero.
    ///
    /// ## User Workflow
    /// ```text
    /// Sale line (qty: 5)
    ///      │
    ///      ▼
    /// Ledger: stock 3 + (-5) < 0
    ///      │
    ///      ▼
    /// InsufficientStock { available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole sale rolled back, nothing persisted
    /// ```
    #[error(
        "Insufficient stock for product {product_id} at branch {branch_id}{}: \
         available {available}, requested {requested}",
        size_suffix(.size)
    )]
    InsufficientStock {
        product_id: String,
        branch_id: String,
        size: Option<String>,
        available: i64,
        requested: i64,
    },

    /// The order status state machine does not allow this move.
    #[error("Sale {sale_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        sale_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// Discount is larger than the amount it is applied to.
    #[error("Discount {discount} exceeds order amount {gross}")]
    DiscountExceedsTotal { discount: i64, gross: i64 },

    /// Amount arithmetic left the representable range.
    #[error("Amount overflow while computing {field}")]
    AmountOverflow { field: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

fn size_suffix(size: &Option<String>) -> String {
    match size {
        Some(size) => format!(" (size {})", size),
        None => String::new(),
    }
}

fn size_rule(has_sizes: &bool) -> &'static str {
    if *has_sizes {
        "requires a size"
    } else {
        "does not take a size"
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any business logic or database access runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Value must not be negative.
    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (e.g., invalid UUID).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Two fields that must differ are equal.
    #[error("{field} must differ from {other}")]
    MustDiffer { field: String, other: String },

    /// A size was given for a product without sizes, or omitted for one with sizes.
    #[error("Product {product_id} {}", size_rule(.has_sizes))]
    SizeMismatch { product_id: String, has_sizes: bool },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
