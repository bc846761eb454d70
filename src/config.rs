use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::ContractError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    #[serde(default)]
    pub ledger: LedgerConfig,
}

/// Settings for the external anchoring ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub enabled: bool,
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    pub network: String,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
    pub submit_timeout_secs: u64,
    pub sweep_interval_secs: u64,
    /// Wait for the ledger submission before answering the approving request.
    pub await_submission: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gateway_url: None,
            api_key: None,
            network: "sepolia".to_string(),
            max_retries: 3,
            retry_delay_secs: 5,
            submit_timeout_secs: 60,
            sweep_interval_secs: 300,
            await_submission: true,
        }
    }
}

impl LedgerConfig {
    /// Anchoring is live only when switched on and pointed at a gateway.
    pub fn is_enabled(&self) -> bool {
        self.enabled
            && self
                .gateway_url
                .as_deref()
                .map(|url| !url.trim().is_empty())
                .unwrap_or(false)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ContractError> {
        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://contracts.db".to_string());

        let server_host = env::var("SERVER_HOST")
            .unwrap_or_else(|_| "0.0.0.0".to_string());

        let server_port = parse_env("SERVER_PORT", 3000)?;

        let defaults = LedgerConfig::default();
        let ledger = LedgerConfig {
            enabled: parse_env("LEDGER_ENABLED", defaults.enabled)?,
            gateway_url: env::var("LEDGER_GATEWAY_URL").ok(),
            api_key: env::var("LEDGER_API_KEY").ok(),
            network: env::var("LEDGER_NETWORK").unwrap_or(defaults.network),
            max_retries: parse_env("LEDGER_MAX_RETRIES", defaults.max_retries)?,
            retry_delay_secs: parse_env("LEDGER_RETRY_DELAY_SECS", defaults.retry_delay_secs)?,
            submit_timeout_secs: parse_env(
                "LEDGER_SUBMIT_TIMEOUT_SECS",
                defaults.submit_timeout_secs,
            )?,
            sweep_interval_secs: parse_env(
                "LEDGER_SWEEP_INTERVAL_SECS",
                defaults.sweep_interval_secs,
            )?,
            await_submission: parse_env("LEDGER_AWAIT_SUBMISSION", defaults.await_submission)?,
        };

        Ok(AppConfig {
            database_url,
            server_host,
            server_port,
            ledger,
        })
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ContractError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ContractError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&raw).map_err(|e| {
            ContractError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T, ContractError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ContractError::ConfigError(format!("Invalid {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}
