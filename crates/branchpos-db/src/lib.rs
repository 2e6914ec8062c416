//! # branchpos-db: Database Layer for BranchPOS
//!
//! SQLite storage for the engine: connection pool, embedded migrations,
//! the stock ledger and the repositories.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        BranchPOS Data Flow                              │
//! │                                                                         │
//! │  SaleTransactionService / StockTransferService (branchpos-engine)       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   branchpos-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ StockLedger   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ SaleRepo      │    │ 001_initial  │  │   │
//! │  │   │ begin()       │    │ ProductRepo   │    │  _schema.sql │  │   │
//! │  │   │               │    │ BranchRepo    │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL, one writer at a time)                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use branchpos_db::{Database, DbConfig};
//! use branchpos_core::StockKey;
//!
//! let db = Database::new(DbConfig::new("branchpos.db")).await?;
//! let on_hand = db.stock().get_stock(&StockKey::new(product_id, branch_id)).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::branch::BranchRepository;
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::sale::SaleRepository;
pub use repository::stock::{AppliedMovement, MovementRequest, StockLedger};
pub use repository::transfer::TransferRepository;

/// Transaction type handed to `_in` repository functions.
pub type DbTransaction = sqlx::Transaction<'static, sqlx::Sqlite>;
