//! # Stock Ledger
//!
//! The only writer of stock counters. Every change is a check-and-set on
//! one [`StockKey`] plus one appended [`InventoryMovement`], in the same
//! transaction.
//!
//! ## Applying a Movement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply_movement_in(conn, { key, delta, type, reference })               │
//! │                                                                         │
//! │  delta < 0 (decrease)                                                   │
//! │    UPDATE counter SET qty = qty + Δ                                     │
//! │     WHERE key AND qty + Δ >= 0          ← check and set in ONE stmt     │
//! │     RETURNING qty                                                        │
//! │       ├── row  → new = qty                                              │
//! │       └── none → InsufficientStock { available: current }  (no write)  │
//! │                                                                         │
//! │  delta > 0 (increase)                                                   │
//! │    INSERT counter (qty = Δ) ON CONFLICT DO UPDATE qty = qty + Δ         │
//! │     RETURNING qty                       ← lazily creates the row        │
//! │                                                                         │
//! │  then INSERT inventory_movements (prev = new − Δ, new, Δ)               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite holds one write lock per database, so two writers on the same
//! key are serialized. A writer that cannot get the lock within
//! `busy_timeout` fails with [`DbError::Conflict`].

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use branchpos_core::{
    CoreError, InventoryMovement, MovementType, StockKey, StockLevel, ValidationError,
};

const MOVEMENT_COLUMNS: &str = "seq, id, product_id, branch_id, size, movement_type, quantity, \
                                previous_stock, new_stock, reference_type, reference_id, notes, \
                                user_id, created_at";

/// One requested change to a stock counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementRequest {
    pub key: StockKey,
    /// Signed delta. Must not be zero.
    pub delta: i64,
    pub movement_type: MovementType,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    pub user_id: Option<String>,
}

impl MovementRequest {
    pub fn new(key: StockKey, delta: i64, movement_type: MovementType) -> Self {
        MovementRequest {
            key,
            delta,
            movement_type,
            reference_type: None,
            reference_id: None,
            notes: None,
            user_id: None,
        }
    }

    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }
}

/// Outcome of a successful movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMovement {
    pub previous_stock: i64,
    pub new_stock: i64,
    pub movement: InventoryMovement,
}

/// Stock counters (`branch_stock`, `product_sizes`) and their movement log.
#[derive(Debug, Clone)]
pub struct StockLedger {
    pool: SqlitePool,
}

impl StockLedger {
    pub fn new(pool: SqlitePool) -> Self {
        StockLedger { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Current quantity for a key; 0 when no counter row exists yet.
    pub async fn get_stock(&self, key: &StockKey) -> DbResult<i64> {
        Self::get_stock_in(&self.pool, key).await
    }

    pub async fn get_stock_in<'e, E>(executor: E, key: &StockKey) -> DbResult<i64>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let quantity: Option<i64> = match &key.size {
            None => {
                sqlx::query_scalar(
                    "SELECT stock_quantity FROM branch_stock \
                     WHERE branch_id = ?1 AND product_id = ?2",
                )
                .bind(&key.branch_id)
                .bind(&key.product_id)
                .fetch_optional(executor)
                .await?
            }
            Some(size) => {
                sqlx::query_scalar(
                    "SELECT stock_quantity FROM product_sizes \
                     WHERE product_id = ?1 AND branch_id = ?2 AND size = ?3",
                )
                .bind(&key.product_id)
                .bind(&key.branch_id)
                .bind(size)
                .fetch_optional(executor)
                .await?
            }
        };

        Ok(quantity.unwrap_or(0))
    }

    /// Movement log for one key in application order.
    pub async fn movements(&self, key: &StockKey) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {} FROM inventory_movements \
             WHERE product_id = ?1 AND branch_id = ?2 AND size IS ?3 \
             ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(&key.product_id)
            .bind(&key.branch_id)
            .bind(&key.size)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Movements written on behalf of one sale, transfer or adjustment.
    pub async fn movements_by_reference(
        &self,
        reference_type: &str,
        reference_id: &str,
    ) -> DbResult<Vec<InventoryMovement>> {
        let sql = format!(
            "SELECT {} FROM inventory_movements \
             WHERE reference_type = ?1 AND reference_id = ?2 ORDER BY seq",
            MOVEMENT_COLUMNS
        );
        let movements = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(reference_type)
            .bind(reference_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(movements)
    }

    /// Stock reconstructed from the movement log alone.
    pub async fn replay(&self, key: &StockKey) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_movements \
             WHERE product_id = ?1 AND branch_id = ?2 AND size IS ?3",
        )
        .bind(&key.product_id)
        .bind(&key.branch_id)
        .bind(&key.size)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Every counter (plain and sized) of a product, across branches.
    pub async fn levels_for_product(&self, product_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT bs.product_id, bs.branch_id, NULL AS size,
                   bs.stock_quantity AS quantity, bs.min_stock,
                   (bs.stock_quantity <= bs.min_stock) AS is_low
            FROM branch_stock bs
            WHERE bs.product_id = ?1
            UNION ALL
            SELECT ps.product_id, ps.branch_id, ps.size,
                   ps.stock_quantity AS quantity, p.min_stock,
                   (ps.stock_quantity <= p.min_stock) AS is_low
            FROM product_sizes ps
            JOIN products p ON p.id = ps.product_id
            WHERE ps.product_id = ?1
            ORDER BY 2, 3
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// Every counter (plain and sized) held by a branch.
    pub async fn levels_for_branch(&self, branch_id: &str) -> DbResult<Vec<StockLevel>> {
        let levels = sqlx::query_as::<_, StockLevel>(
            r#"
            SELECT bs.product_id, bs.branch_id, NULL AS size,
                   bs.stock_quantity AS quantity, bs.min_stock,
                   (bs.stock_quantity <= bs.min_stock) AS is_low
            FROM branch_stock bs
            WHERE bs.branch_id = ?1
            UNION ALL
            SELECT ps.product_id, ps.branch_id, ps.size,
                   ps.stock_quantity AS quantity, p.min_stock,
                   (ps.stock_quantity <= p.min_stock) AS is_low
            FROM product_sizes ps
            JOIN products p ON p.id = ps.product_id
            WHERE ps.branch_id = ?1
            ORDER BY 1, 3
            "#,
        )
        .bind(branch_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(levels)
    }

    /// Sum over every branch and size of a product.
    pub async fn total_for_product(&self, product_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COALESCE(SUM(stock_quantity), 0) FROM branch_stock WHERE product_id = ?1)
              + (SELECT COALESCE(SUM(stock_quantity), 0) FROM product_sizes WHERE product_id = ?1)
            "#,
        )
        .bind(product_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Sum over every size of a product at one branch.
    pub async fn total_for_product_at_branch(
        &self,
        product_id: &str,
        branch_id: &str,
    ) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT
                (SELECT COALESCE(SUM(stock_quantity), 0) FROM branch_stock
                  WHERE product_id = ?1 AND branch_id = ?2)
              + (SELECT COALESCE(SUM(stock_quantity), 0) FROM product_sizes
                  WHERE product_id = ?1 AND branch_id = ?2)
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Applies one movement as its own unit of work.
    pub async fn apply_movement(&self, request: MovementRequest) -> DbResult<AppliedMovement> {
        let mut tx = self.pool.begin().await?;
        let applied = Self::apply_movement_in(&mut tx, request).await?;
        tx.commit().await?;
        Ok(applied)
    }

    /// Applies one movement inside the caller's transaction.
    ///
    /// Fails with `InsufficientStock` (nothing written) when the counter
    /// would go below zero. The caller decides whether to commit.
    pub async fn apply_movement_in(
        conn: &mut SqliteConnection,
        request: MovementRequest,
    ) -> DbResult<AppliedMovement> {
        let delta = request.delta;
        if delta == 0 {
            return Err(DbError::Domain(
                ValidationError::InvalidFormat {
                    field: "quantity".to_string(),
                    reason: "movement quantity must not be zero".to_string(),
                }
                .into(),
            ));
        }

        let key = &request.key;
        let now = Utc::now();

        let new_stock = if delta < 0 {
            Self::try_decrease(&mut *conn, key, delta, now).await?
        } else {
            Some(Self::increase(&mut *conn, key, delta, now).await?)
        };

        let new_stock = match new_stock {
            Some(new_stock) => new_stock,
            None => {
                let available = Self::get_stock_in(&mut *conn, key).await?;
                debug!(key = %key, available, requested = -delta, "Stock check failed");
                return Err(CoreError::InsufficientStock {
                    product_id: key.product_id.clone(),
                    branch_id: key.branch_id.clone(),
                    size: key.size.clone(),
                    available,
                    requested: -delta,
                }
                .into());
            }
        };
        let previous_stock = new_stock - delta;

        let sql = format!(
            r#"
            INSERT INTO inventory_movements (
                id, product_id, branch_id, size, movement_type, quantity,
                previous_stock, new_stock, reference_type, reference_id,
                notes, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        );
        let movement = sqlx::query_as::<_, InventoryMovement>(&sql)
            .bind(Uuid::new_v4().to_string())
            .bind(&key.product_id)
            .bind(&key.branch_id)
            .bind(&key.size)
            .bind(request.movement_type)
            .bind(delta)
            .bind(previous_stock)
            .bind(new_stock)
            .bind(&request.reference_type)
            .bind(&request.reference_id)
            .bind(&request.notes)
            .bind(&request.user_id)
            .bind(now)
            .fetch_one(&mut *conn)
            .await?;

        debug!(
            key = %key,
            movement_type = %request.movement_type,
            delta,
            previous_stock,
            new_stock,
            "Applied stock movement"
        );

        Ok(AppliedMovement {
            previous_stock,
            new_stock,
            movement,
        })
    }

    /// Conditional decrement. `None` when the counter is missing or too low.
    async fn try_decrease(
        conn: &mut SqliteConnection,
        key: &StockKey,
        delta: i64,
        now: chrono::DateTime<Utc>,
    ) -> DbResult<Option<i64>> {
        let new_stock: Option<i64> = match &key.size {
            None => {
                sqlx::query_scalar(
                    r#"
                    UPDATE branch_stock
                    SET stock_quantity = stock_quantity + ?1, updated_at = ?2
                    WHERE branch_id = ?3 AND product_id = ?4
                      AND stock_quantity + ?1 >= 0
                    RETURNING stock_quantity
                    "#,
                )
                .bind(delta)
                .bind(now)
                .bind(&key.branch_id)
                .bind(&key.product_id)
                .fetch_optional(&mut *conn)
                .await?
            }
            Some(size) => {
                sqlx::query_scalar(
                    r#"
                    UPDATE product_sizes
                    SET stock_quantity = stock_quantity + ?1, updated_at = ?2
                    WHERE product_id = ?3 AND branch_id = ?4 AND size = ?5
                      AND stock_quantity + ?1 >= 0
                    RETURNING stock_quantity
                    "#,
                )
                .bind(delta)
                .bind(now)
                .bind(&key.product_id)
                .bind(&key.branch_id)
                .bind(size)
                .fetch_optional(&mut *conn)
                .await?
            }
        };
        Ok(new_stock)
    }

    /// Upsert increment; creates the counter on first use.
    async fn increase(
        conn: &mut SqliteConnection,
        key: &StockKey,
        delta: i64,
        now: chrono::DateTime<Utc>,
    ) -> DbResult<i64> {
        let new_stock: i64 = match &key.size {
            None => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO branch_stock
                        (branch_id, product_id, stock_quantity, min_stock, updated_at)
                    VALUES (
                        ?1, ?2, ?3,
                        COALESCE((SELECT min_stock FROM products WHERE id = ?2), 0),
                        ?4
                    )
                    ON CONFLICT (branch_id, product_id) DO UPDATE
                    SET stock_quantity = stock_quantity + excluded.stock_quantity,
                        updated_at = excluded.updated_at
                    RETURNING stock_quantity
                    "#,
                )
                .bind(&key.branch_id)
                .bind(&key.product_id)
                .bind(delta)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?
            }
            Some(size) => {
                sqlx::query_scalar(
                    r#"
                    INSERT INTO product_sizes
                        (product_id, branch_id, size, stock_quantity, updated_at)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT (product_id, branch_id, size) DO UPDATE
                    SET stock_quantity = stock_quantity + excluded.stock_quantity,
                        updated_at = excluded.updated_at
                    RETURNING stock_quantity
                    "#,
                )
                .bind(&key.product_id)
                .bind(&key.branch_id)
                .bind(size)
                .bind(delta)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?
            }
        };
        Ok(new_stock)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_missing_counter_reads_as_zero() {
        let db = fixtures::db().await;
        let key = StockKey::new("nope", "nope");
        assert_eq!(db.stock().get_stock(&key).await.unwrap(), 0);
        assert!(db.stock().movements(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_increase_creates_counter_and_movement() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);

        let applied = db
            .stock()
            .apply_movement(
                MovementRequest::new(key.clone(), 10, MovementType::Adjustment)
                    .with_reference("MANUAL", "opening"),
            )
            .await
            .unwrap();

        assert_eq!(applied.previous_stock, 0);
        assert_eq!(applied.new_stock, 10);
        assert_eq!(applied.movement.quantity, 10);
        assert_eq!(applied.movement.reference_id.as_deref(), Some("opening"));
        assert_eq!(db.stock().get_stock(&key).await.unwrap(), 10);

        // min_stock copied from the product on lazy creation
        let levels = db.stock().levels_for_branch(&branch.id).await.unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].min_stock, 2);
        assert!(!levels[0].is_low);
    }

    #[tokio::test]
    async fn test_decrease_records_previous_and_new() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        let ledger = db.stock();

        ledger
            .apply_movement(MovementRequest::new(key.clone(), 10, MovementType::Adjustment))
            .await
            .unwrap();
        let applied = ledger
            .apply_movement(
                MovementRequest::new(key.clone(), -3, MovementType::Sale)
                    .with_reference("SALE", "s-1"),
            )
            .await
            .unwrap();

        assert_eq!(applied.previous_stock, 10);
        assert_eq!(applied.new_stock, 7);
        assert_eq!(applied.movement.movement_type, MovementType::Sale);
        assert_eq!(applied.movement.quantity, -3);
    }

    #[tokio::test]
    async fn test_decrease_below_zero_fails_without_writing() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        let ledger = db.stock();

        ledger
            .apply_movement(MovementRequest::new(key.clone(), 2, MovementType::Adjustment))
            .await
            .unwrap();
        let err = ledger
            .apply_movement(MovementRequest::new(key.clone(), -3, MovementType::Sale))
            .await
            .unwrap_err();

        match err {
            DbError::Domain(CoreError::InsufficientStock {
                available,
                requested,
                ..
            }) => {
                assert_eq!(available, 2);
                assert_eq!(requested, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(ledger.get_stock(&key).await.unwrap(), 2);
        assert_eq!(ledger.movements(&key).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decrease_on_missing_counter_fails() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);

        let err = db
            .stock()
            .apply_movement(MovementRequest::new(key.clone(), -1, MovementType::Sale))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 0, .. })
        ));
        assert!(db.stock().levels_for_branch(&branch.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_delta_is_rejected() {
        let db = fixtures::db().await;
        let err = db
            .stock()
            .apply_movement(MovementRequest::new(
                StockKey::new("p", "b"),
                0,
                MovementType::Adjustment,
            ))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_sized_counters_are_independent() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "TSHIRT", 10_000, true).await;
        let m = StockKey::sized(&product.id, &branch.id, "M");
        let l = StockKey::sized(&product.id, &branch.id, "L");
        let ledger = db.stock();

        for (key, delta, kind) in [
            (&m, 5, MovementType::Adjustment),
            (&l, 1, MovementType::Adjustment),
            (&m, -4, MovementType::Sale),
        ] {
            ledger
                .apply_movement(MovementRequest::new(key.clone(), delta, kind))
                .await
                .unwrap();
        }

        assert_eq!(ledger.get_stock(&m).await.unwrap(), 1);
        assert_eq!(ledger.get_stock(&l).await.unwrap(), 1);
        assert_eq!(
            ledger.total_for_product_at_branch(&product.id, &branch.id).await.unwrap(),
            2
        );

        let levels = ledger.levels_for_product(&product.id).await.unwrap();
        assert_eq!(levels.len(), 2);
        assert!(levels.iter().all(|l| l.is_low));
    }

    #[tokio::test]
    async fn test_replay_matches_counter() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        let ledger = db.stock();

        for delta in [10, -3, -2, 4, -9] {
            ledger
                .apply_movement(MovementRequest::new(key.clone(), delta, MovementType::Adjustment))
                .await
                .unwrap();
        }
        // rejected movements leave no trace
        assert!(ledger
            .apply_movement(MovementRequest::new(key.clone(), -1, MovementType::Sale))
            .await
            .is_err());

        assert_eq!(ledger.get_stock(&key).await.unwrap(), 0);
        assert_eq!(ledger.replay(&key).await.unwrap(), 0);

        let movements = ledger.movements(&key).await.unwrap();
        assert_eq!(movements.len(), 5);
        for pair in movements.windows(2) {
            assert!(pair[0].seq < pair[1].seq);
            assert_eq!(pair[0].new_stock, pair[1].previous_stock);
        }
    }

    #[tokio::test]
    async fn test_total_across_branches() {
        let db = fixtures::db().await;
        let a = fixtures::branch(&db, "A").await;
        let b = fixtures::branch(&db, "B").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let ledger = db.stock();

        for (branch, quantity) in [(&a, 3), (&b, 4)] {
            let key = StockKey::new(&product.id, &branch.id);
            ledger
                .apply_movement(MovementRequest::new(key, quantity, MovementType::Adjustment))
                .await
                .unwrap();
        }

        assert_eq!(ledger.total_for_product(&product.id).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_movements_are_append_only() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);
        db.stock()
            .apply_movement(MovementRequest::new(key, 1, MovementType::Adjustment))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE inventory_movements SET quantity = 100")
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(matches!(update, Err(DbError::ConstraintViolation { .. })));

        let delete = sqlx::query("DELETE FROM inventory_movements")
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(matches!(delete, Err(DbError::ConstraintViolation { .. })));
    }

    #[tokio::test]
    async fn test_rolled_back_movement_leaves_nothing() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 500, false).await;
        let key = StockKey::new(&product.id, &branch.id);

        {
            let mut tx = db.begin().await.unwrap();
            StockLedger::apply_movement_in(
                &mut tx,
                MovementRequest::new(key.clone(), 5, MovementType::Adjustment),
            )
            .await
            .unwrap();
            // dropped without commit
        }

        assert_eq!(db.stock().get_stock(&key).await.unwrap(), 0);
        assert!(db.stock().movements(&key).await.unwrap().is_empty());
    }
}
