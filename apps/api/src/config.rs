//! # API Configuration
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     BRANCHPOS_PORT=8080                                                │
//! │     BRANCHPOS_DB_PATH=/var/lib/branchpos/branchpos.db                  │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, BRANCHPOS_CONFIG, or                              │
//! │     ~/.config/branchpos/config.toml (Linux)                            │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "branchpos.db"
//! max_connections = 8
//!
//! [pricing]
//! default_tax_rate_bps = 2100
//!
//! [pricing.currency]
//! code = "USD"
//! symbol = "$"
//! decimals = 2
//!
//! [[pricing.payment_plans]]
//! method = "credit_card"
//! installments = 3
//! surcharge_bps = 1000
//!
//! [engine]
//! max_attempts = 5
//! initial_backoff_ms = 20
//! max_backoff_ms = 500
//! precheck_availability = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use branchpos_core::{CurrencyFormat, TaxRate};
use branchpos_engine::{PaymentPlan, RetryPolicy, SaleServiceOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Server Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

impl ServerSettings {
    /// `bind_addr:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("branchpos.db")
}

fn default_max_connections() -> u32 {
    8
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

// =============================================================================
// Pricing Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingSettings {
    /// System tax rate, used when neither the request nor the branch sets one.
    #[serde(default = "default_tax_rate_bps")]
    pub default_tax_rate_bps: u32,

    #[serde(default)]
    pub currency: CurrencyFormat,

    #[serde(default)]
    pub payment_plans: Vec<PaymentPlan>,
}

fn default_tax_rate_bps() -> u32 {
    2100
}

impl Default for PricingSettings {
    fn default() -> Self {
        PricingSettings {
            default_tax_rate_bps: default_tax_rate_bps(),
            currency: CurrencyFormat::default(),
            payment_plans: Vec::new(),
        }
    }
}

impl PricingSettings {
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_bps(self.default_tax_rate_bps)
    }
}

// =============================================================================
// Engine Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Attempts per unit of work before a conflict is reported.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_true")]
    pub precheck_availability: bool,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff() -> u64 {
    20
}

fn default_max_backoff() -> u64 {
    500
}

fn default_true() -> bool {
    true
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            precheck_availability: default_true(),
        }
    }
}

impl EngineSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }

    pub fn sale_options(&self) -> SaleServiceOptions {
        SaleServiceOptions {
            precheck_availability: self.precheck_availability,
            retry: self.retry_policy(),
        }
    }
}

// =============================================================================
// App Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub pricing: PricingSettings,

    #[serde(default)]
    pub engine: EngineSettings,
}

impl AppConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (config.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = Self::from_toml(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_addr must not be empty".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be greater than 0".into(),
            ));
        }

        if self.pricing.default_tax_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(format!(
                "pricing.default_tax_rate_bps must be at most 10000, got {}",
                self.pricing.default_tax_rate_bps
            )));
        }

        if self.pricing.currency.code.len() != 3 {
            return Err(ConfigError::Invalid(format!(
                "pricing.currency.code must be a 3-letter code, got '{}'",
                self.pricing.currency.code
            )));
        }

        if self.pricing.currency.decimals > 4 {
            return Err(ConfigError::Invalid(
                "pricing.currency.decimals must be at most 4".into(),
            ));
        }

        if self.engine.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_attempts must be greater than 0".into(),
            ));
        }

        if self.engine.initial_backoff_ms > self.engine.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "engine.initial_backoff_ms must not exceed engine.max_backoff_ms".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("BRANCHPOS_BIND_ADDR") {
            debug!(bind_addr = %addr, "Overriding bind address from environment");
            self.server.bind_addr = addr;
        }

        if let Ok(port) = std::env::var("BRANCHPOS_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding port from environment");
                    self.server.port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid BRANCHPOS_PORT"),
            }
        }

        if let Ok(path) = std::env::var("BRANCHPOS_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("BRANCHPOS_DB_MAX_CONNECTIONS") {
            if let Ok(m) = max.parse::<u32>() {
                self.database.max_connections = m;
            }
        }

        if let Ok(bps) = std::env::var("BRANCHPOS_TAX_RATE_BPS") {
            match bps.parse::<u32>() {
                Ok(b) => {
                    debug!(bps = b, "Overriding system tax rate from environment");
                    self.pricing.default_tax_rate_bps = b;
                }
                Err(_) => warn!(bps = %bps, "Ignoring invalid BRANCHPOS_TAX_RATE_BPS"),
            }
        }

        if let Ok(attempts) = std::env::var("BRANCHPOS_MAX_ATTEMPTS") {
            if let Ok(a) = attempts.parse::<u32>() {
                self.engine.max_attempts = a;
            }
        }

        if let Ok(precheck) = std::env::var("BRANCHPOS_PRECHECK") {
            match precheck.to_lowercase().as_str() {
                "1" | "true" | "on" => self.engine.precheck_availability = true,
                "0" | "false" | "off" => self.engine.precheck_availability = false,
                _ => warn!(value = %precheck, "Unknown BRANCHPOS_PRECHECK value"),
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "branchpos", "api")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use branchpos_core::PaymentMethod;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database.path, PathBuf::from("branchpos.db"));
        assert_eq!(config.pricing.tax_rate(), TaxRate::from_bps(2100));
        assert_eq!(config.pricing.currency.code, "USD");
        assert!(config.engine.precheck_availability);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_file() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            port = 9090

            [database]
            path = ":memory:"
            max_connections = 1

            [pricing]
            default_tax_rate_bps = 1050

            [pricing.currency]
            code = "EUR"
            symbol = "€"
            decimals = 2

            [[pricing.payment_plans]]
            method = "credit_card"
            installments = 6
            surcharge_bps = 1500

            [engine]
            max_attempts = 3
            precheck_availability = false
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.database.max_connections, 1);
        assert_eq!(config.pricing.currency.symbol, "€");
        assert_eq!(
            config.pricing.payment_plans,
            vec![PaymentPlan::new(PaymentMethod::CreditCard, 6, 1500)]
        );
        assert_eq!(config.engine.max_attempts, 3);
        assert_eq!(config.engine.initial_backoff_ms, 20);
        assert!(!config.engine.sale_options().precheck_availability);
        assert_eq!(config.engine.retry_policy().max_attempts, 3);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = AppConfig::from_toml("[server]\nport = 3000\n").unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database, DatabaseSettings::default());
        assert_eq!(config.engine, EngineSettings::default());
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.database.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pricing.default_tax_rate_bps = 10_001;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.pricing.currency.code = "DOLLAR".into();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.engine.initial_backoff_ms = 1_000;
        config.engine.max_backoff_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_serialization() {
        let mut config = AppConfig::default();
        config.pricing.payment_plans = vec![PaymentPlan::new(PaymentMethod::DebitCard, 2, 300)];

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("debit_card"));

        let parsed = AppConfig::from_toml(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }
}
