//! # API Error Mapping
//!
//! Turns engine errors into HTTP responses.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EngineError ──► ApiError ──► (StatusCode, {"code","message","details"})│
//! │                                                                         │
//! │  *_NOT_FOUND                 404                                        │
//! │  VALIDATION_ERROR            400   also unreadable JSON bodies          │
//! │  INSUFFICIENT_STOCK          409                                        │
//! │  INVALID_STATUS_TRANSITION   409                                        │
//! │  SALE_REJECTED               422   details = failed lines               │
//! │  CONCURRENCY_CONFLICT        503                                        │
//! │  DATABASE_ERROR              500   logged, generic message              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use branchpos_engine::EngineError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

/// Header carrying the authenticated user, set by the auth gateway.
pub const USER_HEADER: &str = "x-user-id";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Missing or empty X-User-Id header")]
    MissingUser,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Body missing, not JSON, or not the expected shape.
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

/// `Json` whose rejection is an [`ApiError`], so malformed bodies get the
/// same error envelope as everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Engine(err) => match err {
                EngineError::ProductNotFound(_)
                | EngineError::BranchNotFound(_)
                | EngineError::SaleNotFound(_) => StatusCode::NOT_FOUND,
                EngineError::Validation(_) => StatusCode::BAD_REQUEST,
                EngineError::InsufficientStock { .. }
                | EngineError::InvalidStatusTransition { .. } => StatusCode::CONFLICT,
                EngineError::SaleRejected { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::ConcurrencyConflict { .. } => StatusCode::SERVICE_UNAVAILABLE,
                EngineError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::MissingUser => "MISSING_USER",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::InvalidBody(_) => "VALIDATION_ERROR",
            ApiError::Engine(err) => err.code(),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let details = match self {
            ApiError::Engine(EngineError::SaleRejected { failures }) => Some(json!(failures)),
            ApiError::Engine(EngineError::InsufficientStock {
                product_id,
                branch_id,
                size,
                available,
                requested,
            }) => Some(json!({
                "product_id": product_id,
                "branch_id": branch_id,
                "size": size,
                "available": available,
                "requested": requested,
            })),
            ApiError::Engine(EngineError::ConcurrencyConflict { attempts }) => {
                Some(json!({ "attempts": attempts }))
            }
            _ => None,
        };

        let message = match self {
            // Internal details stay in the logs.
            ApiError::Engine(EngineError::Database(_)) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        ErrorBody {
            code: self.code().to_string(),
            message,
            details,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Engine(EngineError::Database(detail)) = &self {
            error!(error = %detail, "Internal error while handling request");
        }
        (self.status(), Json(self.body())).into_response()
    }
}
