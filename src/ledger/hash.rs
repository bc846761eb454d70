//! Canonical anchoring payload and content hash

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::database::models::ContractRecord;

/// The immutable facts about a contract that get anchored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalDocument {
    pub contract_id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub document_sha256: String,
}

impl CanonicalDocument {
    pub fn from_contract(contract: &ContractRecord) -> Self {
        Self {
            contract_id: contract.id,
            owner_id: contract.owner_id,
            filename: contract.filename.clone(),
            created_at: contract.created_at,
            document_sha256: hex::encode(Sha256::digest(&contract.document)),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        format!(
            "contract_id:{}|owner_id:{}|filename:{}|created_at:{}|document_sha256:{}",
            self.contract_id,
            self.owner_id,
            self.filename,
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.document_sha256
        )
        .into_bytes()
    }
}

/// `0x`-prefixed lowercase SHA-256 of `payload`, sized for a `bytes32` ledger slot.
pub fn content_hash(payload: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha256::digest(payload)))
}

/// Stable per-contract key a ledger gateway can use to drop duplicate submissions.
pub fn idempotency_key(contract_id: Uuid, document_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(contract_id.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(document_hash.as_bytes());
    hex::encode(hasher.finalize())
}
