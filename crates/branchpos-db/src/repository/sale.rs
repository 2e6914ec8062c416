//! # Sale Repository
//!
//! Database operations for sales, sale items and sale numbers.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction, driven by the engine)                      │
//! │     ├── next_sale_number_in()  → POS-CENTRO-20240315-00042             │
//! │     ├── insert_sale_in()       → Sale { order_status: PENDING }        │
//! │     ├── insert_item_in() × N   → SaleItem (snapshots)                  │
//! │     └── ledger decrement × N   → SALE movements                        │
//! │                                                                         │
//! │  2. STATUS CHANGES                                                      │
//! │     └── update_status_in(from, to) guarded by WHERE order_status=from  │
//! │                                                                         │
//! │  Financial columns are immutable (trigger-enforced).                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use branchpos_core::{Branch, OrderStatus, Sale, SaleItem, SaleType};

const SALE_COLUMNS: &str = "id, sale_number, sale_type, branch_id, user_id, subtotal_cents, \
                            tax_cents, surcharge_cents, discount_cents, total_cents, \
                            tax_rate_bps, payment_method, installments, order_status, notes, \
                            created_at, updated_at";

const ITEM_COLUMNS: &str = "id, sale_id, line_number, product_id, sku_snapshot, name_snapshot, \
                            size, quantity, unit_price_cents, total_price_cents, created_at";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        Self::get_by_id_in(&self.pool, id).await
    }

    pub async fn get_by_id_in<'e, E>(executor: E, id: &str) -> DbResult<Option<Sale>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {} FROM sales WHERE id = ?1", SALE_COLUMNS);
        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(sale)
    }

    /// Gets the items of a sale in line order.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        Self::get_items_in(&self.pool, sale_id).await
    }

    pub async fn get_items_in<'e, E>(executor: E, sale_id: &str) -> DbResult<Vec<SaleItem>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!(
            "SELECT {} FROM sale_items WHERE sale_id = ?1 ORDER BY line_number",
            ITEM_COLUMNS
        );
        let items = sqlx::query_as::<_, SaleItem>(&sql)
            .bind(sale_id)
            .fetch_all(executor)
            .await?;
        Ok(items)
    }

    /// Counts all sales.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Counts all sale items.
    pub async fn count_items(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // =========================================================================
    // Writes (inside the caller's unit of work)
    // =========================================================================

    /// Reserves the next sale number for a branch and day.
    ///
    /// Format: `{POS|WEB}-{BRANCHCODE}-{YYYYMMDD}-{NNNNN}`. The counter row
    /// is upserted, so this is also the statement that takes the write lock
    /// when called first in a transaction.
    pub async fn next_sale_number_in(
        conn: &mut SqliteConnection,
        branch: &Branch,
        sale_type: SaleType,
        at: DateTime<Utc>,
    ) -> DbResult<String> {
        let sale_date = at.format("%Y%m%d").to_string();

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sale_sequences (branch_id, sale_date, last_value)
            VALUES (?1, ?2, 1)
            ON CONFLICT (branch_id, sale_date) DO UPDATE
            SET last_value = last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(&branch.id)
        .bind(&sale_date)
        .fetch_one(&mut *conn)
        .await?;

        Ok(format_sale_number(sale_type, &branch.code, &sale_date, value))
    }

    /// Inserts a sale row.
    pub async fn insert_sale_in<'e, E>(executor: E, sale: &Sale) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, sale_type, branch_id, user_id,
                subtotal_cents, tax_cents, surcharge_cents, discount_cents, total_cents,
                tax_rate_bps, payment_method, installments, order_status, notes,
                created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5,
                ?6, ?7, ?8, ?9, ?10,
                ?11, ?12, ?13, ?14, ?15,
                ?16, ?17
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(sale.sale_type)
        .bind(&sale.branch_id)
        .bind(&sale.user_id)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.surcharge_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.tax_rate_bps)
        .bind(sale.payment_method)
        .bind(sale.installments)
        .bind(sale.order_status)
        .bind(&sale.notes)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Inserts a sale item.
    ///
    /// ## Snapshot Pattern
    /// Product sku, name and price are copied into the item so the sale
    /// history survives later catalog edits.
    pub async fn insert_item_in<'e, E>(executor: E, item: &SaleItem) -> DbResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(sale_id = %item.sale_id, line = item.line_number, "Inserting sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, line_number, product_id, sku_snapshot, name_snapshot,
                size, quantity, unit_price_cents, total_price_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(item.line_number)
        .bind(&item.product_id)
        .bind(&item.sku_snapshot)
        .bind(&item.name_snapshot)
        .bind(&item.size)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.total_price_cents)
        .bind(item.created_at)
        .execute(executor)
        .await?;

        Ok(())
    }

    /// Moves a sale from `from` to `to`.
    ///
    /// Returns false when the stored status is no longer `from` (another
    /// writer got there first).
    pub async fn update_status_in<'e, E>(
        executor: E,
        sale_id: &str,
        from: OrderStatus,
        to: OrderStatus,
        at: DateTime<Utc>,
    ) -> DbResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        debug!(sale_id = %sale_id, %from, %to, "Updating sale status");

        let result = sqlx::query(
            "UPDATE sales SET order_status = ?1, updated_at = ?2 \
             WHERE id = ?3 AND order_status = ?4",
        )
        .bind(to)
        .bind(at)
        .bind(sale_id)
        .bind(from)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

/// Builds a sale number from its parts.
pub fn format_sale_number(
    sale_type: SaleType,
    branch_code: &str,
    sale_date: &str,
    value: i64,
) -> String {
    format!(
        "{}-{}-{}-{:05}",
        sale_type.number_prefix(),
        branch_code,
        sale_date,
        value
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn sale(branch: &Branch, number: &str) -> Sale {
        let now = Utc::now();
        Sale {
            id: Uuid::new_v4().to_string(),
            sale_number: number.to_string(),
            sale_type: SaleType::Pos,
            branch_id: branch.id.clone(),
            user_id: "u-1".to_string(),
            subtotal_cents: 30_000,
            tax_cents: 6_300,
            surcharge_cents: 0,
            discount_cents: 0,
            total_cents: 36_300,
            tax_rate_bps: Some(2100),
            payment_method: None,
            installments: 1,
            order_status: OrderStatus::Pending,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_format_sale_number() {
        assert_eq!(
            format_sale_number(SaleType::Pos, "CENTRO", "20240315", 42),
            "POS-CENTRO-20240315-00042"
        );
        assert_eq!(
            format_sale_number(SaleType::Ecommerce, "WEB1", "20240315", 1),
            "WEB-WEB1-20240315-00001"
        );
    }

    #[tokio::test]
    async fn test_sale_numbers_are_sequential_per_branch_and_day() {
        let db = fixtures::db().await;
        let a = fixtures::branch(&db, "A").await;
        let b = fixtures::branch(&db, "B").await;
        let day = Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 3, 16, 10, 0, 0).unwrap();

        let mut tx = db.begin().await.unwrap();
        let mut numbers = Vec::new();
        for (branch, sale_type, at) in [
            (&a, SaleType::Pos, day),
            (&a, SaleType::Ecommerce, day),
            (&b, SaleType::Pos, day),
            (&a, SaleType::Pos, next_day),
        ] {
            let number = SaleRepository::next_sale_number_in(&mut tx, branch, sale_type, at)
                .await
                .unwrap();
            numbers.push(number);
        }
        let [n1, n2, n3, n4]: [String; 4] = numbers.try_into().unwrap();
        tx.commit().await.unwrap();

        assert_eq!(n1, "POS-A-20240315-00001");
        assert_eq!(n2, "WEB-A-20240315-00002");
        assert_eq!(n3, "POS-B-20240315-00001");
        assert_eq!(n4, "POS-A-20240316-00001");
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let product = fixtures::product(&db, "MUG", 10_000, false).await;
        let sale = sale(&branch, "POS-CENTRO-20240315-00001");
        let item = SaleItem {
            id: Uuid::new_v4().to_string(),
            sale_id: sale.id.clone(),
            line_number: 1,
            product_id: product.id.clone(),
            sku_snapshot: product.sku.clone(),
            name_snapshot: product.name.clone(),
            size: None,
            quantity: 3,
            unit_price_cents: 10_000,
            total_price_cents: 30_000,
            created_at: sale.created_at,
        };

        SaleRepository::insert_sale_in(db.pool(), &sale).await.unwrap();
        SaleRepository::insert_item_in(db.pool(), &item).await.unwrap();

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.sale_number, sale.sale_number);
        assert_eq!(stored.order_status, OrderStatus::Pending);
        assert!(stored.is_balanced());
        let items = db.sales().get_items(&sale.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, item.id);
        assert_eq!(items[0].sku_snapshot, "MUG");
        assert_eq!(items[0].total_price_cents, 30_000);
    }

    #[tokio::test]
    async fn test_unbalanced_total_is_rejected() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let mut bad = sale(&branch, "POS-CENTRO-20240315-00001");
        bad.total_cents += 1;

        let err = SaleRepository::insert_sale_in(db.pool(), &bad).await.unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
        assert_eq!(db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_status_update_is_guarded() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let sale = sale(&branch, "POS-CENTRO-20240315-00001");
        SaleRepository::insert_sale_in(db.pool(), &sale).await.unwrap();

        let now = Utc::now();
        assert!(SaleRepository::update_status_in(
            db.pool(),
            &sale.id,
            OrderStatus::Pending,
            OrderStatus::Processing,
            now
        )
        .await
        .unwrap());
        // stale `from` matches nothing
        assert!(!SaleRepository::update_status_in(
            db.pool(),
            &sale.id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            now
        )
        .await
        .unwrap());

        let stored = db.sales().get_by_id(&sale.id).await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::Processing);
    }

    #[tokio::test]
    async fn test_financial_fields_are_immutable() {
        let db = fixtures::db().await;
        let branch = fixtures::branch(&db, "CENTRO").await;
        let sale = sale(&branch, "POS-CENTRO-20240315-00001");
        SaleRepository::insert_sale_in(db.pool(), &sale).await.unwrap();

        let err = sqlx::query(
            "UPDATE sales SET discount_cents = 100, total_cents = 36200 WHERE id = ?1",
        )
            .bind(&sale.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from)
            .unwrap_err();
        assert!(matches!(err, DbError::ConstraintViolation { .. }));
    }
}
