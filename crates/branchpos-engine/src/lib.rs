//! # branchpos-engine: Sale & Inventory Orchestration
//!
//! Services that own the units of work of the BranchPOS backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         BranchPOS Engine                                │
//! │                                                                         │
//! │  apps/api handlers                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                branchpos-engine (THIS CRATE)                    │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────────────┐ ┌──────────────────┐ ┌────────────────┐  │   │
//! │  │  │ SaleTransaction  │ │ StockTransfer    │ │ Inventory      │  │   │
//! │  │  │ Service          │ │ Service          │ │ Service        │  │   │
//! │  │  │ create / status  │ │ debit + credit   │ │ queries, adjust│  │   │
//! │  │  └────────┬─────────┘ └────────┬─────────┘ └───────┬────────┘  │   │
//! │  │           │     PricingPolicy  │   RetryPolicy     │           │   │
//! │  │           └────────────────────┼───────────────────┘           │   │
//! │  └────────────────────────────────┼───────────────────────────────┘   │
//! │                                   ▼                                     │
//! │           branchpos-db (StockLedger, repositories, transactions)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust,ignore
//! let policy = Arc::new(StaticPricingPolicy::new(TaxRate::from_bps(2100)));
//! let sales = SaleTransactionService::new(db.clone(), policy);
//! let completed = sales
//!     .create_sale(CreateSaleRequest::new(branch_id, user_id, lines))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

mod catalog;
pub mod error;
pub mod inventory;
pub mod policy;
pub mod retry;
pub mod sale;
pub mod transfer;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{EngineError, EngineResult, LineFailure};
pub use inventory::{
    stock_key, AdjustmentRequest, InventoryService, LedgerCheck, StockQuery, StockReference,
};
pub use policy::{PaymentPlan, PricingPolicy, StaticPricingPolicy};
pub use retry::RetryPolicy;
pub use sale::{
    CompletedSale, CreateSaleRequest, SaleDetails, SaleLineRequest, SaleServiceOptions,
    SaleTransactionService, StatusUpdate,
};
pub use transfer::{StockChange, StockTransferService, TransferRequest, TransferResult};

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::path::{Path, PathBuf};
    use std::sync::Arc;
    use std::time::Duration;

    use branchpos_core::{Branch, MovementType, PaymentMethod, Product, StockKey, TaxRate};
    use branchpos_db::{Database, DbConfig, MovementRequest, NewProduct};
    use uuid::Uuid;

    use crate::policy::{PaymentPlan, PricingPolicy, StaticPricingPolicy};
    use crate::retry::RetryPolicy;

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// WAL database in the temp dir with a real multi-connection pool.
    pub async fn file_db() -> (Database, PathBuf) {
        file_db_with_busy_timeout(Duration::from_secs(10)).await
    }

    pub async fn file_db_with_busy_timeout(busy_timeout: Duration) -> (Database, PathBuf) {
        let path = std::env::temp_dir().join(format!("branchpos-test-{}.db", Uuid::new_v4()));
        let config = DbConfig::new(path.clone())
            .max_connections(4)
            .min_connections(1)
            .busy_timeout(busy_timeout);
        (Database::new(config).await.unwrap(), path)
    }

    pub async fn remove_file_db(db: Database, path: &Path) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let mut file = path.as_os_str().to_owned();
            file.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(file));
        }
    }

    pub async fn branch(db: &Database, code: &str) -> Branch {
        db.branches()
            .create(code, &format!("Branch {}", code), None)
            .await
            .unwrap()
    }

    pub async fn branch_with_tax(db: &Database, code: &str, tax_bps: u32) -> Branch {
        db.branches()
            .create(code, &format!("Branch {}", code), Some(tax_bps))
            .await
            .unwrap()
    }

    /// Product with `min_stock = 2`.
    pub async fn product(db: &Database, sku: &str, price_cents: i64, has_sizes: bool) -> Product {
        db.products()
            .create(NewProduct {
                sku: sku.to_string(),
                barcode: None,
                name: format!("Product {}", sku),
                price_cents,
                cost_cents: None,
                min_stock: 2,
                has_sizes,
            })
            .await
            .unwrap()
    }

    /// Opening stock through the ledger (one ADJUSTMENT movement).
    pub async fn stock(db: &Database, key: &StockKey, quantity: i64) {
        db.stock()
            .apply_movement(
                MovementRequest::new(key.clone(), quantity, MovementType::Adjustment)
                    .with_reference("TEST", "opening-stock"),
            )
            .await
            .unwrap();
    }

    /// 21% tax; credit card in 3 installments adds 10%.
    pub fn policy() -> Arc<dyn PricingPolicy> {
        Arc::new(
            StaticPricingPolicy::new(TaxRate::from_bps(2100))
                .with_plans(vec![PaymentPlan::new(PaymentMethod::CreditCard, 3, 1000)])
                .unwrap(),
        )
    }

    pub fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(8, Duration::from_millis(2), Duration::from_millis(50))
    }
}
