//! # HTTP Routes
//!
//! ```text
//! GET  /health
//! POST /api/sales                                 201 sale + items + movements
//! GET  /api/sales/{id}
//! POST /api/sales/{id}/status                     {"status": "CANCELLED"}
//! POST /api/transfers                             201 transfer + stock changes
//! GET  /api/stock/{product_id}?branch_id=&size=   quantity or levels
//! GET  /api/stock/{product_id}/movements?branch_id=&size=
//! GET  /api/stock/{product_id}/verify?branch_id=&size=
//! POST /api/stock/adjustments                     201
//! GET  /api/branches/{branch_id}/low-stock
//! ```
//!
//! Writes require the `X-User-Id` header.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use branchpos_core::{InventoryMovement, Money, OrderStatus, Sale, StockLevel};
use branchpos_engine::{
    stock_key, AdjustmentRequest, CompletedSale, CreateSaleRequest, LedgerCheck, SaleDetails,
    StatusUpdate, StockQuery, TransferRequest, TransferResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::error::{ApiError, ApiJson, ApiResult, USER_HEADER};
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sales", post(create_sale))
        .route("/api/sales/{id}", get(get_sale))
        .route("/api/sales/{id}/status", post(update_status))
        .route("/api/transfers", post(create_transfer))
        .route("/api/stock/adjustments", post(adjust_stock))
        .route("/api/stock/{product_id}", get(get_stock))
        .route("/api/stock/{product_id}/movements", get(get_movements))
        .route("/api/stock/{product_id}/verify", get(verify_ledger))
        .route("/api/branches/{branch_id}/low-stock", get(low_stock))
        .with_state(state)
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct StockParams {
    pub branch_id: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// Sale amounts rendered with the configured currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTotals {
    pub subtotal: String,
    pub tax: String,
    pub surcharge: String,
    pub discount: String,
    pub total: String,
}

impl FormattedTotals {
    fn new(state: &AppState, sale: &Sale) -> Self {
        let show = |cents: i64| state.currency.format(Money::from_cents(cents));
        FormattedTotals {
            subtotal: show(sale.subtotal_cents),
            tax: show(sale.tax_cents),
            surcharge: show(sale.surcharge_cents),
            discount: show(sale.discount_cents),
            total: show(sale.total_cents),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleResponse<T> {
    #[serde(flatten)]
    pub body: T,
    pub formatted: FormattedTotals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentResponse {
    pub previous_stock: i64,
    pub new_stock: i64,
    pub movement: InventoryMovement,
}

/// Authenticated user from the gateway header.
fn user_id(headers: &HeaderMap) -> ApiResult<String> {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToString::to_string)
        .ok_or(ApiError::MissingUser)
}

// =============================================================================
// Handlers
// =============================================================================

async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    if state.db.health_check().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}

async fn create_sale(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(mut request): ApiJson<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleResponse<CompletedSale>>)> {
    request.user_id = user_id(&headers)?;
    debug!(branch_id = %request.branch_id, lines = request.lines.len(), "Create sale");

    let completed = state.sales.create_sale(request).await?;
    let formatted = FormattedTotals::new(&state, &completed.sale);
    Ok((
        StatusCode::CREATED,
        Json(SaleResponse {
            body: completed,
            formatted,
        }),
    ))
}

async fn get_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleResponse<SaleDetails>>> {
    let details = state.sales.get_sale(&id).await?;
    let formatted = FormattedTotals::new(&state, &details.sale);
    Ok(Json(SaleResponse {
        body: details,
        formatted,
    }))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    ApiJson(change): ApiJson<StatusChange>,
) -> ApiResult<Json<StatusUpdate>> {
    let user = user_id(&headers)?;
    let update = state.sales.update_status(&id, change.status, &user).await?;
    Ok(Json(update))
}

async fn create_transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(mut request): ApiJson<TransferRequest>,
) -> ApiResult<(StatusCode, Json<TransferResult>)> {
    request.user_id = Some(user_id(&headers)?);
    let result = state.transfers.transfer(request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn get_stock(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Query(params): Query<StockParams>,
) -> ApiResult<Json<StockQuery>> {
    let stock = state
        .inventory
        .get_stock(
            &product_id,
            params.branch_id.as_deref(),
            params.size.as_deref(),
        )
        .await?;
    Ok(Json(stock))
}

async fn get_movements(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Query(params): Query<StockParams>,
) -> ApiResult<Json<Vec<InventoryMovement>>> {
    let branch_id = params
        .branch_id
        .ok_or_else(|| ApiError::BadRequest("branch_id is required".into()))?;
    let key = stock_key(&product_id, &branch_id, params.size.as_deref());
    let movements = state.inventory.movements(&key).await?;
    Ok(Json(movements))
}

async fn verify_ledger(
    State(state): State<Arc<AppState>>,
    Path(product_id): Path<String>,
    Query(params): Query<StockParams>,
) -> ApiResult<Json<LedgerCheck>> {
    let branch_id = params
        .branch_id
        .ok_or_else(|| ApiError::BadRequest("branch_id is required".into()))?;
    let key = stock_key(&product_id, &branch_id, params.size.as_deref());
    let check = state.inventory.verify_ledger(&key).await?;
    Ok(Json(check))
}

async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ApiJson(mut request): ApiJson<AdjustmentRequest>,
) -> ApiResult<(StatusCode, Json<AdjustmentResponse>)> {
    request.user_id = Some(user_id(&headers)?);
    let applied = state.inventory.adjust_stock(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(AdjustmentResponse {
            previous_stock: applied.previous_stock,
            new_stock: applied.new_stock,
            movement: applied.movement,
        }),
    ))
}

async fn low_stock(
    State(state): State<Arc<AppState>>,
    Path(branch_id): Path<String>,
) -> ApiResult<Json<Vec<StockLevel>>> {
    let levels = state.inventory.low_stock(&branch_id).await?;
    Ok(Json(levels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use branchpos_core::{Branch, MovementType, Product, StockKey};
    use branchpos_db::{Database, DbConfig, MovementRequest, NewProduct};
    use http_body_util::BodyExt;
    use tower::ServiceExt; // For oneshot()

    use crate::config::AppConfig;

    struct Fixture {
        app: Router,
        db: Database,
        branch: Branch,
        other: Branch,
        product: Product,
    }

    /// CENTRO holds 10 units of a 100.00 product, NORTE holds none.
    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let branch = db.branches().create("CENTRO", "Centro", None).await.unwrap();
        let other = db.branches().create("NORTE", "Norte", None).await.unwrap();
        let product = db
            .products()
            .create(NewProduct {
                sku: "MUG".into(),
                barcode: None,
                name: "Mug".into(),
                price_cents: 10_000,
                cost_cents: None,
                min_stock: 2,
                has_sizes: false,
            })
            .await
            .unwrap();
        db.stock()
            .apply_movement(
                MovementRequest::new(
                    StockKey::new(&product.id, &branch.id),
                    10,
                    MovementType::Adjustment,
                )
                .with_reference("TEST", "opening-stock"),
            )
            .await
            .unwrap();

        let state = AppState::new(db.clone(), &AppConfig::default()).unwrap();
        Fixture {
            app: router(Arc::new(state)),
            db,
            branch,
            other,
            product,
        }
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn sale_body(f: &Fixture, quantity: i64) -> Value {
        json!({
            "branch_id": f.branch.id,
            "lines": [{ "product_id": f.product.id, "quantity": quantity }]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let f = fixture().await;
        let (status, body) = send(&f.app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_sale_returns_201() {
        let f = fixture().await;
        let (status, body) =
            send(&f.app, "POST", "/api/sales", Some("cashier-1"), Some(sale_body(&f, 3))).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["sale"]["subtotal_cents"], 30_000);
        assert_eq!(body["sale"]["tax_cents"], 6_300);
        assert_eq!(body["sale"]["total_cents"], 36_300);
        assert_eq!(body["sale"]["user_id"], "cashier-1");
        assert_eq!(body["formatted"]["total"], "$363.00");
        assert_eq!(body["movements"][0]["previous_stock"], 10);
        assert_eq!(body["movements"][0]["new_stock"], 7);

        let key = StockKey::new(&f.product.id, &f.branch.id);
        assert_eq!(f.db.stock().get_stock(&key).await.unwrap(), 7);

        let id = body["sale"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/sales/{}", id);
        let (status, fetched) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["items"].as_array().unwrap().len(), 1);
        assert_eq!(fetched["formatted"]["tax"], "$63.00");
    }

    #[tokio::test]
    async fn test_writes_require_user_header() {
        let f = fixture().await;
        let (status, body) = send(&f.app, "POST", "/api/sales", None, Some(sale_body(&f, 1))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "MISSING_USER");

        let key = StockKey::new(&f.product.id, &f.branch.id);
        assert_eq!(f.db.stock().get_stock(&key).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_unreadable_bodies_use_error_envelope() {
        let f = fixture().await;
        let key = StockKey::new(&f.product.id, &f.branch.id);

        let wrong_type = json!({
            "branch_id": f.branch.id,
            "lines": [{ "product_id": f.product.id, "quantity": "three" }]
        });
        let (status, body) =
            send(&f.app, "POST", "/api/sales", Some("cashier-1"), Some(wrong_type)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert!(body["message"].as_str().unwrap().starts_with("Invalid request body"));

        let (status, body) = send(
            &f.app,
            "POST",
            "/api/stock/adjustments",
            Some("manager-1"),
            Some(json!({ "product_id": f.product.id })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        // Not JSON at all, and JSON without a content type.
        for content_type in [Some("application/json"), None] {
            let mut builder = Request::builder()
                .method("POST")
                .uri("/api/transfers")
                .header(USER_HEADER, "manager-1");
            if let Some(content_type) = content_type {
                builder = builder.header("content-type", content_type);
            }
            let request = builder.body(Body::from("{not json")).unwrap();
            let response = f.app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let bytes = response.into_body().collect().await.unwrap().to_bytes();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert_eq!(body["code"], "VALIDATION_ERROR");
        }

        assert_eq!(f.db.sales().count().await.unwrap(), 0);
        assert_eq!(f.db.stock().get_stock(&key).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_insufficient_stock_is_409() {
        let f = fixture().await;
        let (status, body) =
            send(&f.app, "POST", "/api/sales", Some("cashier-1"), Some(sale_body(&f, 11))).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INSUFFICIENT_STOCK");
        assert_eq!(body["details"]["available"], 10);
        assert_eq!(f.db.sales().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_sale_is_404() {
        let f = fixture().await;
        let (status, body) = send(&f.app, "GET", "/api/sales/ghost", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "SALE_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_cancel_restocks() {
        let f = fixture().await;
        let (_, created) =
            send(&f.app, "POST", "/api/sales", Some("cashier-1"), Some(sale_body(&f, 4))).await;
        let id = created["sale"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &f.app,
            "POST",
            &format!("/api/sales/{}/status", id),
            Some("manager-1"),
            Some(json!({ "status": "CANCELLED" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sale"]["order_status"], "CANCELLED");
        assert_eq!(body["movements"].as_array().unwrap().len(), 1);

        let key = StockKey::new(&f.product.id, &f.branch.id);
        assert_eq!(f.db.stock().get_stock(&key).await.unwrap(), 10);

        let (status, body) = send(
            &f.app,
            "POST",
            &format!("/api/sales/{}/status", id),
            Some("manager-1"),
            Some(json!({ "status": "PROCESSING" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "INVALID_STATUS_TRANSITION");
    }

    #[tokio::test]
    async fn test_transfer_and_stock_queries() {
        let f = fixture().await;
        let (status, body) = send(
            &f.app,
            "POST",
            "/api/transfers",
            Some("stocker-1"),
            Some(json!({
                "product_id": f.product.id,
                "from_branch_id": f.branch.id,
                "to_branch_id": f.other.id,
                "quantity": 4
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["source"]["after"], 6);
        assert_eq!(body["destination"]["after"], 4);

        let uri = format!("/api/stock/{}?branch_id={}", f.product.id, f.other.id);
        let (status, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["kind"], "quantity");
        assert_eq!(body["quantity"], 4);

        let uri = format!("/api/stock/{}", f.product.id);
        let (_, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(body["kind"], "levels");
        assert_eq!(body["total"], 10);

        let uri = format!("/api/stock/{}/movements?branch_id={}", f.product.id, f.branch.id);
        let (status, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);

        let uri = format!("/api/stock/{}/verify?branch_id={}", f.product.id, f.branch.id);
        let (_, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(body["consistent"], true);
        assert_eq!(body["counter"], 6);
    }

    #[tokio::test]
    async fn test_movements_require_branch() {
        let f = fixture().await;
        let uri = format!("/api/stock/{}/movements", f.product.id);
        let (status, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_adjustment_and_low_stock() {
        let f = fixture().await;
        let (status, body) = send(
            &f.app,
            "POST",
            "/api/stock/adjustments",
            Some("stocker-1"),
            Some(json!({
                "product_id": f.product.id,
                "branch_id": f.branch.id,
                "delta": -8,
                "notes": "breakage"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["previous_stock"], 10);
        assert_eq!(body["new_stock"], 2);
        assert_eq!(body["movement"]["user_id"], "stocker-1");

        let uri = format!("/api/branches/{}/low-stock", f.branch.id);
        let (status, body) = send(&f.app, "GET", &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        let levels = body.as_array().unwrap();
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0]["quantity"], 2);
    }
}
