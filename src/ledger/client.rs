//! Ledger Client
//!
//! Talks to the anchoring gateway that fronts the external ledger.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::error::ContractError;
use crate::ledger::hash::idempotency_key;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("ledger unreachable: {0}")]
    Unavailable(String),

    #[error("submission rejected: {0}")]
    Rejected(String),

    #[error("submission timed out after {0}s")]
    Timeout(u64),

    #[error("ledger anchoring is disabled")]
    Disabled,
}

impl From<LedgerError> for ContractError {
    fn from(err: LedgerError) -> Self {
        ContractError::LedgerTransientError(err.to_string())
    }
}

/// One anchoring request. The idempotency key is identical for every retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnchorSubmission {
    pub contract_id: Uuid,
    pub document_hash: String,
    pub network: String,
    pub idempotency_key: String,
}

impl AnchorSubmission {
    pub fn new(contract_id: Uuid, document_hash: &str, network: &str) -> Self {
        Self {
            contract_id,
            document_hash: document_hash.to_string(),
            network: network.to_string(),
            idempotency_key: idempotency_key(contract_id, document_hash),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerReceipt {
    pub tx_reference: String,
    #[serde(default)]
    pub block_number: Option<u64>,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn submit(&self, submission: &AnchorSubmission) -> Result<LedgerReceipt, LedgerError>;

    /// Whether the ledger has `document_hash` recorded for `contract_id`.
    async fn verify(&self, contract_id: Uuid, document_hash: &str) -> Result<bool, LedgerError>;
}

/// Stand-in used when no gateway is configured.
pub struct DisabledLedger;

#[async_trait]
impl LedgerClient for DisabledLedger {
    async fn submit(&self, _submission: &AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        Err(LedgerError::Disabled)
    }

    async fn verify(&self, _contract_id: Uuid, _document_hash: &str) -> Result<bool, LedgerError> {
        Err(LedgerError::Disabled)
    }
}

pub struct HttpLedgerClient {
    gateway_url: String,
    api_key: Option<String>,
    http_client: Client,
}

#[derive(Deserialize)]
struct AnchorLookup {
    document_hash: String,
}

impl HttpLedgerClient {
    pub fn new(gateway_url: String, api_key: Option<String>) -> Self {
        Self {
            gateway_url: gateway_url.trim_end_matches('/').to_string(),
            api_key,
            http_client: Client::new(),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, ContractError> {
        let url = config
            .gateway_url
            .clone()
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| ContractError::ConfigError("ledger.gateway_url is not set".to_string()))?;
        Ok(Self::new(url, config.api_key.clone()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, submission: &AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        debug!(contract_id = %submission.contract_id, "Submitting {} to ledger gateway", submission.document_hash);

        let response = self
            .authorize(
                self.http_client
                    .post(format!("{}/anchors", self.gateway_url))
                    .header("Idempotency-Key", &submission.idempotency_key)
                    .json(submission),
            )
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(if status.is_server_error() {
                LedgerError::Unavailable(format!("{}: {}", status, body))
            } else {
                LedgerError::Rejected(format!("{}: {}", status, body))
            });
        }

        let receipt: LedgerReceipt = response
            .json()
            .await
            .map_err(|e| LedgerError::Unavailable(format!("Malformed gateway response: {}", e)))?;
        info!(contract_id = %submission.contract_id, "Ledger accepted anchor in {}", receipt.tx_reference);
        Ok(receipt)
    }

    async fn verify(&self, contract_id: Uuid, document_hash: &str) -> Result<bool, LedgerError> {
        let response = self
            .authorize(
                self.http_client
                    .get(format!("{}/anchors/{}", self.gateway_url, contract_id)),
            )
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => {
                let lookup: AnchorLookup = response
                    .json()
                    .await
                    .map_err(|e| LedgerError::Unavailable(format!("Malformed gateway response: {}", e)))?;
                Ok(lookup.document_hash.eq_ignore_ascii_case(document_hash))
            }
            status => Err(LedgerError::Unavailable(format!("gateway returned {}", status))),
        }
    }
}
