//! # branchpos-api
//!
//! axum routes, configuration and error mapping for the BranchPOS backend.
//! `main.rs` only wires these together.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{AppConfig, ConfigError};
pub use error::{ApiError, ApiJson, ApiResult, ErrorBody, USER_HEADER};
pub use routes::router;
pub use state::AppState;
