//! # Inventory Service
//!
//! Stock queries plus the decrease / increase primitives the sale and
//! transfer services build on. Every write goes through the
//! [`StockLedger`]; this service adds validation, references and retry.
//!
//! ## Two Ways to Change Stock
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Standalone:          inventory.decrease_stock(key, 3, reference)      │
//! │                         └── own transaction, retried on conflict       │
//! │                                                                         │
//! │  Inside a unit of work:                                                 │
//! │    let mut tx = db.begin().await?;                                      │
//! │    InventoryService::decrease_stock_in(&mut tx, &key, 3, reference)    │
//! │    ... other writes ...                                                 │
//! │    tx.commit().await?;                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use branchpos_core::validation::{
    validate_adjustment_delta, validate_required, validate_size,
};
use branchpos_core::{
    InventoryMovement, MovementType, StockKey, StockLevel, REFERENCE_MANUAL, REFERENCE_SALE,
    REFERENCE_SALE_CANCELLATION, REFERENCE_TRANSFER,
};
use branchpos_db::{AppliedMovement, Database, MovementRequest, StockLedger};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{require_branch, require_product};
use crate::error::{EngineError, EngineResult};
use crate::retry::RetryPolicy;

// =============================================================================
// Request / Result Types
// =============================================================================

/// What a movement is recorded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockReference {
    pub movement_type: MovementType,
    pub reference_type: String,
    pub reference_id: String,
    pub notes: Option<String>,
    pub user_id: Option<String>,
}

impl StockReference {
    pub fn new(
        movement_type: MovementType,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        StockReference {
            movement_type,
            reference_type: reference_type.into(),
            reference_id: reference_id.into(),
            notes: None,
            user_id: None,
        }
    }

    pub fn sale(sale_id: impl Into<String>) -> Self {
        StockReference::new(MovementType::Sale, REFERENCE_SALE, sale_id)
    }

    pub fn transfer_out(transfer_id: impl Into<String>) -> Self {
        StockReference::new(MovementType::TransferOut, REFERENCE_TRANSFER, transfer_id)
    }

    pub fn transfer_in(transfer_id: impl Into<String>) -> Self {
        StockReference::new(MovementType::TransferIn, REFERENCE_TRANSFER, transfer_id)
    }

    /// Restock of a cancelled sale.
    pub fn cancellation(sale_id: impl Into<String>) -> Self {
        StockReference::new(MovementType::Adjustment, REFERENCE_SALE_CANCELLATION, sale_id)
    }

    pub fn manual(adjustment_id: impl Into<String>) -> Self {
        StockReference::new(MovementType::Adjustment, REFERENCE_MANUAL, adjustment_id)
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    fn into_request(self, key: StockKey, delta: i64) -> MovementRequest {
        MovementRequest::new(key, delta, self.movement_type)
            .with_reference(self.reference_type, self.reference_id)
            .with_notes(self.notes)
            .with_user(self.user_id)
    }
}

/// Manual correction of one counter (receiving, shrinkage, recount).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct AdjustmentRequest {
    pub product_id: String,
    pub branch_id: String,
    #[serde(default)]
    pub size: Option<String>,
    /// Signed change, non-zero.
    pub delta: i64,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Answer of [`InventoryService::get_stock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export)]
pub enum StockQuery {
    /// Quantity at one branch (one size, or all sizes summed).
    Quantity {
        product_id: String,
        branch_id: String,
        size: Option<String>,
        quantity: i64,
    },
    /// Every counter of the product across branches.
    Levels {
        product_id: String,
        total: i64,
        levels: Vec<StockLevel>,
    },
}

/// Counter compared with the replay of its movement log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LedgerCheck {
    pub key: StockKey,
    pub counter: i64,
    pub replayed: i64,
    pub movement_count: usize,
    pub consistent: bool,
}

// =============================================================================
// Inventory Service
// =============================================================================

#[derive(Debug, Clone)]
pub struct InventoryService {
    db: Database,
    retry: RetryPolicy,
}

impl InventoryService {
    pub fn new(db: Database) -> Self {
        InventoryService::with_retry(db, RetryPolicy::default())
    }

    pub fn with_retry(db: Database, retry: RetryPolicy) -> Self {
        InventoryService { db, retry }
    }

    fn ledger(&self) -> StockLedger {
        self.db.stock()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Advisory availability check. The decrement itself is authoritative.
    pub async fn has_sufficient_stock(
        &self,
        product_id: &str,
        branch_id: &str,
        quantity: i64,
        size: Option<&str>,
    ) -> EngineResult<bool> {
        let key = stock_key(product_id, branch_id, size);
        let available = self.ledger().get_stock(&key).await?;
        Ok(available >= quantity)
    }

    /// Sum over every branch and size.
    pub async fn calculate_total_stock(&self, product_id: &str) -> EngineResult<i64> {
        Ok(self.ledger().total_for_product(product_id).await?)
    }

    /// Sum over every size at one branch.
    pub async fn get_product_stock_for_branch(
        &self,
        product_id: &str,
        branch_id: &str,
    ) -> EngineResult<i64> {
        Ok(self
            .ledger()
            .total_for_product_at_branch(product_id, branch_id)
            .await?)
    }

    /// Quantity at one branch, or every level when no branch is given.
    ///
    /// Without a size, a sized product reports the sum of its sizes.
    pub async fn get_stock(
        &self,
        product_id: &str,
        branch_id: Option<&str>,
        size: Option<&str>,
    ) -> EngineResult<StockQuery> {
        validate_required("product_id", product_id)?;
        let product = self
            .db
            .products()
            .get_by_id(product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound(product_id.to_string()))?;

        match branch_id {
            Some(branch_id) => {
                let quantity = match size {
                    Some(size) => {
                        let key = StockKey::sized(&product.id, branch_id, size);
                        self.ledger().get_stock(&key).await?
                    }
                    None if product.has_sizes => {
                        self.get_product_stock_for_branch(&product.id, branch_id)
                            .await?
                    }
                    None => {
                        let key = StockKey::new(&product.id, branch_id);
                        self.ledger().get_stock(&key).await?
                    }
                };
                Ok(StockQuery::Quantity {
                    product_id: product.id,
                    branch_id: branch_id.to_string(),
                    size: size.map(str::to_string),
                    quantity,
                })
            }
            None => {
                let mut levels = self.ledger().levels_for_product(&product.id).await?;
                if let Some(size) = size {
                    levels.retain(|level| level.size.as_deref() == Some(size));
                }
                let total = levels.iter().map(|level| level.quantity).sum();
                Ok(StockQuery::Levels {
                    product_id: product.id,
                    total,
                    levels,
                })
            }
        }
    }

    /// Counters at a branch at or below their `min_stock`.
    pub async fn low_stock(&self, branch_id: &str) -> EngineResult<Vec<StockLevel>> {
        require_branch(&self.db, branch_id).await?;
        let levels = self.ledger().levels_for_branch(branch_id).await?;
        Ok(levels.into_iter().filter(|level| level.is_low).collect())
    }

    /// Movement log of one counter, oldest first.
    pub async fn movements(&self, key: &StockKey) -> EngineResult<Vec<InventoryMovement>> {
        Ok(self.ledger().movements(key).await?)
    }

    /// Compares a counter with the replay of its movement log.
    pub async fn verify_ledger(&self, key: &StockKey) -> EngineResult<LedgerCheck> {
        let ledger = self.ledger();
        let counter = ledger.get_stock(key).await?;
        let replayed = ledger.replay(key).await?;
        let movement_count = ledger.movements(key).await?.len();
        Ok(LedgerCheck {
            key: key.clone(),
            counter,
            replayed,
            movement_count,
            consistent: counter == replayed,
        })
    }

    // =========================================================================
    // Writes inside a caller's unit of work
    // =========================================================================

    /// Removes `quantity` from a counter; `InsufficientStock` (nothing
    /// written) when it would go below zero.
    pub async fn decrease_stock_in(
        conn: &mut SqliteConnection,
        key: &StockKey,
        quantity: i64,
        reference: StockReference,
    ) -> EngineResult<AppliedMovement> {
        ensure_positive(quantity)?;
        let request = reference.into_request(key.clone(), -quantity);
        Ok(StockLedger::apply_movement_in(conn, request).await?)
    }

    /// Adds `quantity` to a counter, creating it when missing.
    pub async fn increase_stock_in(
        conn: &mut SqliteConnection,
        key: &StockKey,
        quantity: i64,
        reference: StockReference,
    ) -> EngineResult<AppliedMovement> {
        ensure_positive(quantity)?;
        let request = reference.into_request(key.clone(), quantity);
        Ok(StockLedger::apply_movement_in(conn, request).await?)
    }

    // =========================================================================
    // Standalone writes
    // =========================================================================

    pub async fn decrease_stock(
        &self,
        key: &StockKey,
        quantity: i64,
        reference: StockReference,
    ) -> EngineResult<AppliedMovement> {
        ensure_positive(quantity)?;
        self.retry
            .run("decrease_stock", || {
                self.apply_standalone(key, -quantity, reference.clone())
            })
            .await
    }

    pub async fn increase_stock(
        &self,
        key: &StockKey,
        quantity: i64,
        reference: StockReference,
    ) -> EngineResult<AppliedMovement> {
        ensure_positive(quantity)?;
        self.retry
            .run("increase_stock", || {
                self.apply_standalone(key, quantity, reference.clone())
            })
            .await
    }

    async fn apply_standalone(
        &self,
        key: &StockKey,
        delta: i64,
        reference: StockReference,
    ) -> EngineResult<AppliedMovement> {
        let mut tx = self.db.begin().await?;
        let applied = if delta < 0 {
            Self::decrease_stock_in(&mut tx, key, -delta, reference).await?
        } else {
            Self::increase_stock_in(&mut tx, key, delta, reference).await?
        };
        tx.commit().await?;
        Ok(applied)
    }

    /// Applies a manual ADJUSTMENT movement.
    pub async fn adjust_stock(&self, request: AdjustmentRequest) -> EngineResult<AppliedMovement> {
        validate_adjustment_delta(request.delta)?;
        let product = require_product(&self.db, &request.product_id).await?;
        let branch = require_branch(&self.db, &request.branch_id).await?;
        validate_size(&product.id, product.has_sizes, request.size.as_deref())?;

        let key = stock_key(&product.id, &branch.id, request.size.as_deref());
        let reference = StockReference::manual(Uuid::new_v4().to_string())
            .with_notes(request.notes.clone())
            .with_user(request.user_id.clone());

        debug!(key = %key, delta = request.delta, "Adjusting stock");

        let applied = if request.delta > 0 {
            self.increase_stock(&key, request.delta, reference).await?
        } else {
            self.decrease_stock(&key, -request.delta, reference).await?
        };

        info!(
            key = %key,
            previous = applied.previous_stock,
            new = applied.new_stock,
            "Stock adjusted"
        );

        Ok(applied)
    }
}

/// Builds the counter key for an optional size.
pub fn stock_key(product_id: &str, branch_id: &str, size: Option<&str>) -> StockKey {
    match size {
        Some(size) => StockKey::sized(product_id, branch_id, size),
        None => StockKey::new(product_id, branch_id),
    }
}

fn ensure_positive(quantity: i64) -> EngineResult<()> {
    if quantity <= 0 {
        return Err(EngineError::Validation(
            "quantity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[tokio::test]
    async fn test_has_sufficient_stock() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let product = testing::product(&db, "MUG", 500, false).await;
        testing::stock(&db, &StockKey::new(&product.id, &branch.id), 5).await;

        let inventory = InventoryService::new(db);
        assert!(inventory
            .has_sufficient_stock(&product.id, &branch.id, 5, None)
            .await
            .unwrap());
        assert!(!inventory
            .has_sufficient_stock(&product.id, &branch.id, 6, None)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_decrease_records_sale_movement() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let product = testing::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        testing::stock(&db, &key, 10).await;

        let inventory = InventoryService::new(db);
        let applied = inventory
            .decrease_stock(&key, 3, StockReference::sale("sale-1"))
            .await
            .unwrap();

        assert_eq!(applied.previous_stock, 10);
        assert_eq!(applied.new_stock, 7);
        assert_eq!(applied.movement.movement_type, MovementType::Sale);
        assert_eq!(applied.movement.quantity, -3);
        assert_eq!(applied.movement.reference_id.as_deref(), Some("sale-1"));
    }

    #[tokio::test]
    async fn test_decrease_below_zero_is_rejected() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let product = testing::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        testing::stock(&db, &key, 2).await;

        let inventory = InventoryService::new(db.clone());
        let err = inventory
            .decrease_stock(&key, 3, StockReference::sale("sale-1"))
            .await
            .unwrap_err();

        assert_eq!(
            err,
            EngineError::InsufficientStock {
                product_id: product.id.clone(),
                branch_id: branch.id.clone(),
                size: None,
                available: 2,
                requested: 3,
            }
        );
        assert_eq!(db.stock().get_stock(&key).await.unwrap(), 2);
        assert_eq!(inventory.movements(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_zero_quantity_is_validation() {
        let db = testing::db().await;
        let inventory = InventoryService::new(db);
        let err = inventory
            .increase_stock(&StockKey::new("p", "b"), 0, StockReference::manual("x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_totals_across_branches_and_sizes() {
        let db = testing::db().await;
        let a = testing::branch(&db, "A").await;
        let b = testing::branch(&db, "B").await;
        let shirt = testing::product(&db, "SHIRT", 1000, true).await;
        testing::stock(&db, &StockKey::sized(&shirt.id, &a.id, "M"), 4).await;
        testing::stock(&db, &StockKey::sized(&shirt.id, &a.id, "L"), 1).await;
        testing::stock(&db, &StockKey::sized(&shirt.id, &b.id, "M"), 2).await;

        let inventory = InventoryService::new(db);
        assert_eq!(inventory.calculate_total_stock(&shirt.id).await.unwrap(), 7);
        assert_eq!(
            inventory
                .get_product_stock_for_branch(&shirt.id, &a.id)
                .await
                .unwrap(),
            5
        );

        match inventory.get_stock(&shirt.id, Some(&a.id), None).await.unwrap() {
            StockQuery::Quantity { quantity, .. } => assert_eq!(quantity, 5),
            other => panic!("unexpected {:?}", other),
        }
        match inventory
            .get_stock(&shirt.id, Some(&a.id), Some("L"))
            .await
            .unwrap()
        {
            StockQuery::Quantity { quantity, .. } => assert_eq!(quantity, 1),
            other => panic!("unexpected {:?}", other),
        }
        match inventory.get_stock(&shirt.id, None, None).await.unwrap() {
            StockQuery::Levels { total, levels, .. } => {
                assert_eq!(total, 7);
                assert_eq!(levels.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        match inventory.get_stock(&shirt.id, None, Some("M")).await.unwrap() {
            StockQuery::Levels { total, levels, .. } => {
                assert_eq!(total, 6);
                assert_eq!(levels.len(), 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_stock_unknown_product() {
        let db = testing::db().await;
        let inventory = InventoryService::new(db);
        let err = inventory.get_stock("missing", None, None).await.unwrap_err();
        assert_eq!(err, EngineError::ProductNotFound("missing".into()));
    }

    #[tokio::test]
    async fn test_adjust_stock_both_directions() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let product = testing::product(&db, "MUG", 500, false).await;
        let inventory = InventoryService::new(db);

        let received = inventory
            .adjust_stock(AdjustmentRequest {
                product_id: product.id.clone(),
                branch_id: branch.id.clone(),
                size: None,
                delta: 12,
                notes: Some("delivery".into()),
                user_id: Some("u-1".into()),
            })
            .await
            .unwrap();
        assert_eq!(received.new_stock, 12);
        assert_eq!(received.movement.movement_type, MovementType::Adjustment);
        assert_eq!(received.movement.reference_type.as_deref(), Some(REFERENCE_MANUAL));
        assert_eq!(received.movement.user_id.as_deref(), Some("u-1"));

        let shrink = inventory
            .adjust_stock(AdjustmentRequest {
                product_id: product.id.clone(),
                branch_id: branch.id.clone(),
                size: None,
                delta: -5,
                notes: Some("damaged".into()),
                user_id: None,
            })
            .await
            .unwrap();
        assert_eq!(shrink.previous_stock, 12);
        assert_eq!(shrink.new_stock, 7);
    }

    #[tokio::test]
    async fn test_adjust_stock_checks_size_rule() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let shirt = testing::product(&db, "SHIRT", 1000, true).await;
        let inventory = InventoryService::new(db);

        let err = inventory
            .adjust_stock(AdjustmentRequest {
                product_id: shirt.id.clone(),
                branch_id: branch.id.clone(),
                size: None,
                delta: 3,
                notes: None,
                user_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = inventory
            .adjust_stock(AdjustmentRequest {
                product_id: shirt.id,
                branch_id: "nowhere".into(),
                size: Some("M".into()),
                delta: 3,
                notes: None,
                user_id: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err, EngineError::BranchNotFound("nowhere".into()));
    }

    #[tokio::test]
    async fn test_low_stock_lists_levels_at_or_below_min() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        // min_stock is 2 for fixture products
        let mug = testing::product(&db, "MUG", 500, false).await;
        let cap = testing::product(&db, "CAP", 800, false).await;
        testing::stock(&db, &StockKey::new(&mug.id, &branch.id), 2).await;
        testing::stock(&db, &StockKey::new(&cap.id, &branch.id), 9).await;

        let inventory = InventoryService::new(db);
        let low = inventory.low_stock(&branch.id).await.unwrap();
        assert_eq!(low.len(), 1);
        assert_eq!(low[0].product_id, mug.id);
        assert!(low[0].is_low);
    }

    #[tokio::test]
    async fn test_verify_ledger_matches_replay() {
        let db = testing::db().await;
        let branch = testing::branch(&db, "CENTRO").await;
        let product = testing::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        testing::stock(&db, &key, 10).await;

        let inventory = InventoryService::new(db);
        inventory
            .decrease_stock(&key, 4, StockReference::sale("s-1"))
            .await
            .unwrap();
        inventory
            .increase_stock(&key, 1, StockReference::cancellation("s-1"))
            .await
            .unwrap();

        let check = inventory.verify_ledger(&key).await.unwrap();
        assert_eq!(check.counter, 7);
        assert_eq!(check.replayed, 7);
        assert_eq!(check.movement_count, 3);
        assert!(check.consistent);
    }
}
