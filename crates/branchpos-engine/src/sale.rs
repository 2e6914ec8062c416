//! # Sale Transaction Service
//!
//! Turns a sale request into a persisted sale, its items and one SALE
//! movement per line as a single unit of work.
//!
//! ## create_sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  (pool, no transaction)                                                 │
//! │  1. validate request ─► resolve branch ─► resolve products, sizes      │
//! │  2. advisory pre-check, demand summed per stock key                     │
//! │     └── 1 failing line → that error, n > 1 → SaleRejected              │
//! │  3. price: explicit tax → branch rate → system rate, + surcharge       │
//! │                                                                         │
//! │  (one transaction, re-run on conflict)                                  │
//! │  4. reserve sale number ─► INSERT sale ─► INSERT items                 │
//! │  5. decrease_stock_in per line ─► any failure drops the transaction    │
//! │  6. COMMIT                                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 2 only saves work on obviously failing requests; the conditional
//! decrement in step 5 is what keeps stock non-negative.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use branchpos_core::validation::{
    validate_line_count, validate_non_negative_cents, validate_quantity, validate_required,
    validate_size,
};
use branchpos_core::{
    Branch, InventoryMovement, Money, OrderStatus, PaymentSelection, PriceLine,
    PricingBreakdown, PricingCalculator, Product, Sale, SaleItem, SaleType, StockKey, TaxBasis,
    REFERENCE_SALE, REFERENCE_SALE_CANCELLATION,
};
use branchpos_db::{Database, SaleRepository};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use ts_rs::TS;
use uuid::Uuid;

use crate::catalog::{require_branch, require_product};
use crate::error::{EngineError, EngineResult};
use crate::inventory::{stock_key, InventoryService, StockReference};
use crate::policy::PricingPolicy;
use crate::retry::RetryPolicy;

// =============================================================================
// Request / Result Types
// =============================================================================

/// One requested line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
    #[serde(default)]
    pub size: Option<String>,
    /// Overrides the catalog price for this line.
    #[serde(default)]
    pub unit_price_cents: Option<i64>,
}

impl SaleLineRequest {
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        SaleLineRequest {
            product_id: product_id.into(),
            quantity,
            size: None,
            unit_price_cents: None,
        }
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CreateSaleRequest {
    pub branch_id: String,
    #[serde(default)]
    pub sale_type: SaleType,
    /// Authenticated user; the API fills it from the request header.
    #[serde(default)]
    pub user_id: String,
    pub lines: Vec<SaleLineRequest>,
    /// Tax amount decided by the caller; skips rate-based tax.
    #[serde(default)]
    pub tax_amount_cents: Option<i64>,
    #[serde(default)]
    pub discount_cents: Option<i64>,
    #[serde(default)]
    pub payment: Option<PaymentSelection>,
    /// Defaults to PENDING.
    #[serde(default)]
    pub initial_status: Option<OrderStatus>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CreateSaleRequest {
    pub fn new(
        branch_id: impl Into<String>,
        user_id: impl Into<String>,
        lines: Vec<SaleLineRequest>,
    ) -> Self {
        CreateSaleRequest {
            branch_id: branch_id.into(),
            sale_type: SaleType::Pos,
            user_id: user_id.into(),
            lines,
            tax_amount_cents: None,
            discount_cents: None,
            payment: None,
            initial_status: None,
            notes: None,
        }
    }
}

/// A committed sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CompletedSale {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// One SALE movement per line, in line order.
    pub movements: Vec<InventoryMovement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SaleDetails {
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    /// SALE movements, then the restocks of a cancellation if any.
    pub movements: Vec<InventoryMovement>,
}

/// Result of a status change. `movements` holds the restocks of a
/// cancellation and is empty otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusUpdate {
    pub sale: Sale,
    pub movements: Vec<InventoryMovement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaleServiceOptions {
    /// Run the advisory availability check before opening the transaction.
    pub precheck_availability: bool,
    pub retry: RetryPolicy,
}

impl Default for SaleServiceOptions {
    fn default() -> Self {
        SaleServiceOptions {
            precheck_availability: true,
            retry: RetryPolicy::default(),
        }
    }
}

/// A request line after product and size resolution.
#[derive(Debug, Clone)]
struct ResolvedLine {
    line: usize,
    product: Product,
    key: StockKey,
    quantity: i64,
    unit_price: Money,
}

/// A line that failed resolution or the pre-check.
#[derive(Debug)]
struct LineError {
    line: usize,
    product_id: String,
    size: Option<String>,
    error: EngineError,
}

// =============================================================================
// Sale Transaction Service
// =============================================================================

#[derive(Clone)]
pub struct SaleTransactionService {
    db: Database,
    policy: Arc<dyn PricingPolicy>,
    options: SaleServiceOptions,
}

impl SaleTransactionService {
    pub fn new(db: Database, policy: Arc<dyn PricingPolicy>) -> Self {
        SaleTransactionService::with_options(db, policy, SaleServiceOptions::default())
    }

    pub fn with_options(
        db: Database,
        policy: Arc<dyn PricingPolicy>,
        options: SaleServiceOptions,
    ) -> Self {
        SaleTransactionService {
            db,
            policy,
            options,
        }
    }

    pub fn options(&self) -> &SaleServiceOptions {
        &self.options
    }

    // =========================================================================
    // Create
    // =========================================================================

    /// Creates a sale: all of it (sale, items, movements) or nothing.
    pub async fn create_sale(&self, request: CreateSaleRequest) -> EngineResult<CompletedSale> {
        validate_required("user_id", &request.user_id)?;
        validate_line_count(request.lines.len())?;
        if let Some(tax) = request.tax_amount_cents {
            validate_non_negative_cents("tax_amount", tax)?;
        }
        if let Some(discount) = request.discount_cents {
            validate_non_negative_cents("discount", discount)?;
        }

        let initial_status = request.initial_status.unwrap_or_default();
        if initial_status == OrderStatus::Cancelled {
            return Err(EngineError::Validation(
                "a sale cannot be created as CANCELLED".to_string(),
            ));
        }

        let branch = require_branch(&self.db, &request.branch_id).await?;
        let lines = self.resolve_lines(&branch, &request.lines).await?;
        let breakdown = self.price(&branch, &request, &lines)?;

        debug!(
            branch = %branch.code,
            lines = lines.len(),
            total = %breakdown.total,
            "Sale priced"
        );

        let completed = self
            .options
            .retry
            .run("create_sale", || {
                self.persist_sale(&branch, &request, &lines, &breakdown, initial_status)
            })
            .await?;

        info!(
            sale_id = %completed.sale.id,
            sale_number = %completed.sale.sale_number,
            total = %completed.sale.total(),
            "Sale committed"
        );

        Ok(completed)
    }

    /// Resolves every line, collecting per-line failures.
    async fn resolve_lines(
        &self,
        branch: &Branch,
        lines: &[SaleLineRequest],
    ) -> EngineResult<Vec<ResolvedLine>> {
        let mut products: HashMap<String, Product> = HashMap::new();
        let mut resolved = Vec::with_capacity(lines.len());
        let mut failures = Vec::new();

        for (index, line) in lines.iter().enumerate() {
            let number = index + 1;
            match self.resolve_line(number, line, branch, &mut products).await {
                Ok(line) => resolved.push(line),
                Err(
                    error @ (EngineError::Database(_) | EngineError::ConcurrencyConflict { .. }),
                ) => return Err(error),
                Err(error) => failures.push(LineError {
                    line: number,
                    product_id: line.product_id.clone(),
                    size: line.size.clone(),
                    error,
                }),
            }
        }

        if self.options.precheck_availability {
            // key -> (first line using it, total demand)
            let mut demand: BTreeMap<&StockKey, (usize, i64)> = BTreeMap::new();
            for line in &resolved {
                let entry = demand.entry(&line.key).or_insert((line.line, 0));
                entry.1 += line.quantity;
            }

            let ledger = self.db.stock();
            for (key, (line, requested)) in demand {
                let available = ledger.get_stock(key).await?;
                if available < requested {
                    failures.push(LineError {
                        line,
                        product_id: key.product_id.clone(),
                        size: key.size.clone(),
                        error: EngineError::InsufficientStock {
                            product_id: key.product_id.clone(),
                            branch_id: key.branch_id.clone(),
                            size: key.size.clone(),
                            available,
                            requested,
                        },
                    });
                }
            }
        }

        reject_failures(failures)?;
        Ok(resolved)
    }

    async fn resolve_line(
        &self,
        number: usize,
        line: &SaleLineRequest,
        branch: &Branch,
        products: &mut HashMap<String, Product>,
    ) -> EngineResult<ResolvedLine> {
        validate_quantity(line.quantity)?;
        if let Some(price) = line.unit_price_cents {
            validate_non_negative_cents("unit_price", price)?;
        }

        let product = match products.get(&line.product_id) {
            Some(product) => product.clone(),
            None => {
                let product = require_product(&self.db, &line.product_id).await?;
                products.insert(product.id.clone(), product.clone());
                product
            }
        };

        validate_size(&product.id, product.has_sizes, line.size.as_deref())?;

        let unit_price = line
            .unit_price_cents
            .map(Money::from_cents)
            .unwrap_or_else(|| product.price());

        Ok(ResolvedLine {
            line: number,
            key: stock_key(&product.id, &branch.id, line.size.as_deref()),
            product,
            quantity: line.quantity,
            unit_price,
        })
    }

    fn price(
        &self,
        branch: &Branch,
        request: &CreateSaleRequest,
        lines: &[ResolvedLine],
    ) -> EngineResult<PricingBreakdown> {
        let price_lines: Vec<PriceLine> = lines
            .iter()
            .map(|line| PriceLine::new(line.unit_price, line.quantity))
            .collect();

        let tax = match request.tax_amount_cents {
            Some(cents) => TaxBasis::Fixed(Money::from_cents(cents)),
            None => TaxBasis::Rate(
                branch
                    .tax_override()
                    .unwrap_or_else(|| self.policy.system_tax_rate()),
            ),
        };

        let surcharge = self.policy.surcharge_for(request.payment.as_ref())?;

        Ok(PricingCalculator::compute(
            &price_lines,
            tax,
            Some(surcharge),
            request.discount_cents.map(Money::from_cents),
        )?)
    }

    /// One attempt at the write half of `create_sale`.
    async fn persist_sale(
        &self,
        branch: &Branch,
        request: &CreateSaleRequest,
        lines: &[ResolvedLine],
        breakdown: &PricingBreakdown,
        status: OrderStatus,
    ) -> EngineResult<CompletedSale> {
        let now = Utc::now();
        let sale_id = Uuid::new_v4().to_string();

        let mut tx = self.db.begin().await?;

        // First statement is a write: a competing writer queues on the lock
        // here instead of failing later on a stale snapshot.
        let sale_number =
            SaleRepository::next_sale_number_in(&mut tx, branch, request.sale_type, now).await?;

        let sale = Sale {
            id: sale_id.clone(),
            sale_number,
            sale_type: request.sale_type,
            branch_id: branch.id.clone(),
            user_id: request.user_id.clone(),
            subtotal_cents: breakdown.subtotal.cents(),
            tax_cents: breakdown.tax.cents(),
            surcharge_cents: breakdown.surcharge.cents(),
            discount_cents: breakdown.discount.cents(),
            total_cents: breakdown.total.cents(),
            tax_rate_bps: breakdown.tax_rate.map(|rate| i64::from(rate.bps())),
            payment_method: request.payment.map(|payment| payment.method),
            installments: request
                .payment
                .map(|payment| i64::from(payment.installments))
                .unwrap_or(1),
            order_status: status,
            notes: request.notes.clone(),
            created_at: now,
            updated_at: now,
        };
        debug_assert!(sale.is_balanced(), "pricing breakdown must balance");
        SaleRepository::insert_sale_in(&mut *tx, &sale).await?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item = SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale_id.clone(),
                line_number: line.line as i64,
                product_id: line.product.id.clone(),
                sku_snapshot: line.product.sku.clone(),
                name_snapshot: line.product.name.clone(),
                size: line.key.size.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                total_price_cents: line.unit_price.multiply_quantity(line.quantity).cents(),
                created_at: now,
            };
            SaleRepository::insert_item_in(&mut *tx, &item).await?;
            items.push(item);
        }

        let mut movements = Vec::with_capacity(lines.len());
        for line in lines {
            let reference =
                StockReference::sale(&sale_id).with_user(Some(request.user_id.clone()));
            let applied =
                InventoryService::decrease_stock_in(&mut tx, &line.key, line.quantity, reference)
                    .await?;
            movements.push(applied.movement);
        }

        tx.commit().await?;

        Ok(CompletedSale {
            sale,
            items,
            movements,
        })
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Moves a sale along the order state machine.
    ///
    /// Cancelling puts every item back on its counter in the same
    /// transaction.
    pub async fn update_status(
        &self,
        sale_id: &str,
        to: OrderStatus,
        user_id: &str,
    ) -> EngineResult<StatusUpdate> {
        validate_required("sale_id", sale_id)?;
        validate_required("user_id", user_id)?;

        self.options
            .retry
            .run("update_status", || self.update_status_once(sale_id, to, user_id))
            .await
    }

    async fn update_status_once(
        &self,
        sale_id: &str,
        to: OrderStatus,
        user_id: &str,
    ) -> EngineResult<StatusUpdate> {
        let current = self
            .db
            .sales()
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;

        let from = current.order_status;
        if !from.can_transition_to(to) {
            return Err(EngineError::InvalidStatusTransition {
                sale_id: sale_id.to_string(),
                from,
                to,
            });
        }

        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        if !SaleRepository::update_status_in(&mut *tx, sale_id, from, to, now).await? {
            // Status moved since it was read; the retry re-reads and re-checks.
            return Err(EngineError::ConcurrencyConflict { attempts: 1 });
        }

        let mut movements = Vec::new();
        if to == OrderStatus::Cancelled {
            let items = SaleRepository::get_items_in(&mut *tx, sale_id).await?;
            for item in &items {
                let reference = StockReference::cancellation(sale_id)
                    .with_user(Some(user_id.to_string()))
                    .with_notes(Some(format!("Cancellation of {}", current.sale_number)));
                let applied = InventoryService::increase_stock_in(
                    &mut tx,
                    &item.key(&current.branch_id),
                    item.quantity,
                    reference,
                )
                .await?;
                movements.push(applied.movement);
            }
        }

        let sale = SaleRepository::get_by_id_in(&mut *tx, sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;

        tx.commit().await?;

        info!(
            sale_id = %sale_id,
            %from,
            %to,
            restocked = movements.len(),
            "Sale status updated"
        );

        Ok(StatusUpdate { sale, movements })
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_sale(&self, sale_id: &str) -> EngineResult<SaleDetails> {
        let sales = self.db.sales();
        let sale = sales
            .get_by_id(sale_id)
            .await?
            .ok_or_else(|| EngineError::SaleNotFound(sale_id.to_string()))?;
        let items = sales.get_items(sale_id).await?;

        let ledger = self.db.stock();
        let mut movements = ledger.movements_by_reference(REFERENCE_SALE, sale_id).await?;
        movements.extend(
            ledger
                .movements_by_reference(REFERENCE_SALE_CANCELLATION, sale_id)
                .await?,
        );

        Ok(SaleDetails {
            sale,
            items,
            movements,
        })
    }
}

/// One failure → that error; several → `SaleRejected` in line order.
fn reject_failures(mut failures: Vec<LineError>) -> EngineResult<()> {
    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0).error),
        _ => {
            failures.sort_by_key(|failure| failure.line);
            Err(EngineError::SaleRejected {
                failures: failures
                    .iter()
                    .map(|f| f.error.to_line_failure(f.line, &f.product_id, f.size.as_deref()))
                    .collect(),
            })
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
