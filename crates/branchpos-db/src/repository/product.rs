//! # Product Repository
//!
//! Catalog lookups. Products are reference data: the engine reads them to
//! validate lines and snapshot sku/name/price into sale items. Stock is not
//! stored here; see [`StockLedger`](super::stock::StockLedger).

use chrono::Utc;
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use branchpos_core::validation::{validate_name, validate_non_negative_cents, validate_sku};
use branchpos_core::{CoreError, Product};

const PRODUCT_COLUMNS: &str = "id, sku, barcode, name, price_cents, cost_cents, min_stock, \
                               has_sizes, is_active, created_at, updated_at";

/// Input for [`ProductRepository::create`].
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub price_cents: i64,
    pub cost_cents: Option<i64>,
    pub min_stock: i64,
    pub has_sizes: bool,
}

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Validates and inserts an active product.
    pub async fn create(&self, input: NewProduct) -> DbResult<Product> {
        validate_sku(&input.sku).map_err(CoreError::from)?;
        validate_name("name", &input.name).map_err(CoreError::from)?;
        validate_non_negative_cents("price_cents", input.price_cents).map_err(CoreError::from)?;
        validate_non_negative_cents("min_stock", input.min_stock).map_err(CoreError::from)?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4().to_string(),
            sku: input.sku.trim().to_string(),
            barcode: input.barcode,
            name: input.name.trim().to_string(),
            price_cents: input.price_cents,
            cost_cents: input.cost_cents,
            min_stock: input.min_stock,
            has_sizes: input.has_sizes,
            is_active: true,
            created_at: now,
            updated_at: now,
        };

        self.insert(&product).await?;
        Ok(product)
    }

    /// Inserts a fully-formed product row.
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, sku = %product.sku, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, sku, barcode, name, price_cents, cost_cents, min_stock,
                has_sizes, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&product.id)
        .bind(&product.sku)
        .bind(&product.barcode)
        .bind(&product.name)
        .bind(product.price_cents)
        .bind(product.cost_cents)
        .bind(product.min_stock)
        .bind(product.has_sizes)
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by ID (active or not).
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        Self::get_by_id_in(&self.pool, id).await
    }

    pub async fn get_by_id_in<'e, E>(executor: E, id: &str) -> DbResult<Option<Product>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let sql = format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(product)
    }

    /// Gets a product by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Product>> {
        let sql = format!("SELECT {} FROM products WHERE sku = ?1", PRODUCT_COLUMNS);
        let product = sqlx::query_as::<_, Product>(&sql)
            .bind(sku)
            .fetch_optional(&self.pool)
            .await?;
        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Product>> {
        let sql = format!(
            "SELECT {} FROM products WHERE is_active = 1 ORDER BY name LIMIT ?1",
            PRODUCT_COLUMNS
        );
        let products = sqlx::query_as::<_, Product>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(products)
    }

    /// Soft-deletes a product. Existing sales keep their snapshots.
    pub async fn soft_delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Soft deleting product");

        sqlx::query("UPDATE products SET is_active = 0, updated_at = ?1 WHERE id = ?2")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Counts all products.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures;

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = fixtures::db().await;
        let created = fixtures::product(&db, "TSHIRT-BLK", 10_000, true).await;

        let by_id = db.products().get_by_id(&created.id).await.unwrap().unwrap();
        let by_sku = db.products().get_by_sku("TSHIRT-BLK").await.unwrap().unwrap();

        assert_eq!(by_id, by_sku);
        assert!(by_id.has_sizes);
        assert_eq!(by_id.price().cents(), 10_000);
        assert_eq!(db.products().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_is_rejected() {
        let db = fixtures::db().await;
        fixtures::product(&db, "MUG", 500, false).await;

        let err = db
            .products()
            .create(NewProduct {
                sku: "MUG".into(),
                barcode: None,
                name: "Another mug".into(),
                price_cents: 700,
                cost_cents: None,
                min_stock: 0,
                has_sizes: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_from_active_list() {
        let db = fixtures::db().await;
        let mug = fixtures::product(&db, "MUG", 500, false).await;
        fixtures::product(&db, "CAP", 900, false).await;

        db.products().soft_delete(&mug.id).await.unwrap();

        let active = db.products().list_active(10).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].sku, "CAP");
        assert!(!db.products().get_by_id(&mug.id).await.unwrap().unwrap().is_active);
    }
}
