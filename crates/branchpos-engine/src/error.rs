//! # Engine Error Types
//!
//! The error surface of every service in this crate.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Engine Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Not Found    │  │    Terminal     │  │      Retryable          │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ ProductNotFound │  │ InsufficientStk │  │  ConcurrencyConflict    │ │
//! │  │ BranchNotFound  │  │ InvalidStatus   │  │  (busy / locked /       │ │
//! │  │ SaleNotFound    │  │ Validation      │  │   pool timeout)         │ │
//! │  │                 │  │ SaleRejected    │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │ Database - anything else from SQLite; details are logged, the   │   │
//! │  │            caller only sees the code                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use branchpos_core::{CoreError, OrderStatus};
use branchpos_db::DbError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// One rejected line of a sale request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineFailure {
    /// 1-based position in the request.
    pub line: usize,
    pub product_id: String,
    pub size: Option<String>,
    /// Stable code of the underlying error.
    pub code: String,
    pub message: String,
}

/// Engine error type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    // =========================================================================
    // Not Found
    // =========================================================================
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Branch not found: {0}")]
    BranchNotFound(String),

    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    // =========================================================================
    // Terminal
    // =========================================================================
    /// A stock counter would go below zero. Never retried.
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

    #[error("Sale {sale_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        sale_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    /// More than one line of a sale request failed.
    #[error("Sale rejected: {} line(s) failed", .failures.len())]
    SaleRejected { failures: Vec<LineFailure> },

    // =========================================================================
    // Retryable
    // =========================================================================
    /// Lost the race for the write lock on every attempt.
    #[error("Concurrency conflict persisted after {attempts} attempt(s)")]
    ConcurrencyConflict { attempts: u32 },

    // =========================================================================
    // Internal
    // =========================================================================
    #[error("Database error: {0}")]
    Database(String),
}

fn size_suffix(size: &Option<String>) -> String {
    match size {
        Some(size) => format!(" (size {})", size),
        None => String::new(),
    }
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            EngineError::BranchNotFound(_) => "BRANCH_NOT_FOUND",
            EngineError::SaleNotFound(_) => "SALE_NOT_FOUND",
            EngineError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            EngineError::InvalidStatusTransition { .. } => "INVALID_STATUS_TRANSITION",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::SaleRejected { .. } => "SALE_REJECTED",
            EngineError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
            EngineError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Whether re-running the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict { .. })
    }

    /// Flattens this error into a [`LineFailure`] for line `line`.
    pub fn to_line_failure(
        &self,
        line: usize,
        product_id: &str,
        size: Option<&str>,
    ) -> LineFailure {
        LineFailure {
            line,
            product_id: product_id.to_string(),
            size: size.map(str::to_string),
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => EngineError::ProductNotFound(id),
            CoreError::BranchNotFound(id) => EngineError::BranchNotFound(id),
            CoreError::SaleNotFound(id) => EngineError::SaleNotFound(id),
            CoreError::InsufficientStock {
                product_id,
                branch_id,
                size,
                available,
                requested,
            } => EngineError::InsufficientStock {
                product_id,
                branch_id,
                size,
                available,
                requested,
            },
            CoreError::InvalidStatusTransition { sale_id, from, to } => {
                EngineError::InvalidStatusTransition { sale_id, from, to }
            }
            other => EngineError::Validation(match other {
                CoreError::Validation(inner) => inner.to_string(),
                other => other.to_string(),
            }),
        }
    }
}

impl From<branchpos_core::ValidationError> for EngineError {
    fn from(err: branchpos_core::ValidationError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<DbError> for EngineError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::Conflict(_) | DbError::PoolExhausted => {
                EngineError::ConcurrencyConflict { attempts: 1 }
            }
            DbError::NotFound { entity, id } => match entity.as_str() {
                "Product" => EngineError::ProductNotFound(id),
                "Branch" => EngineError::BranchNotFound(id),
                "Sale" => EngineError::SaleNotFound(id),
                _ => EngineError::Database(format!("{} not found: {}", entity, id)),
            },
            other => EngineError::Database(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        DbError::from(err).into()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
