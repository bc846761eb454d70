//! Audit Event
//!
//! Immutable contract audit events, chained per contract by SHA-256 so that any
//! rewrite of history is detectable.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Previous-hash value of the first event of every contract.
pub const GENESIS_HASH: &str =
    "sha256:0000000000000000000000000000000000000000000000000000000000000000";

/// Closed set of audit event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    DocumentUploaded,
    AiAnalysisCompleted,
    TranslationViewed,
    FirstPartyApproved,
    FirstPartyRejected,
    SecondPartyAdded,
    SecondPartyRemoved,
    SecondPartyApproved,
    SecondPartyRejected,
    ContractFinalized,
    BlockchainVerified,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::DocumentUploaded,
        EventKind::AiAnalysisCompleted,
        EventKind::TranslationViewed,
        EventKind::FirstPartyApproved,
        EventKind::FirstPartyRejected,
        EventKind::SecondPartyAdded,
        EventKind::SecondPartyRemoved,
        EventKind::SecondPartyApproved,
        EventKind::SecondPartyRejected,
        EventKind::ContractFinalized,
        EventKind::BlockchainVerified,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::DocumentUploaded => "document_uploaded",
            EventKind::AiAnalysisCompleted => "ai_analysis_completed",
            EventKind::TranslationViewed => "translation_viewed",
            EventKind::FirstPartyApproved => "first_party_approved",
            EventKind::FirstPartyRejected => "first_party_rejected",
            EventKind::SecondPartyAdded => "second_party_added",
            EventKind::SecondPartyRemoved => "second_party_removed",
            EventKind::SecondPartyApproved => "second_party_approved",
            EventKind::SecondPartyRejected => "second_party_rejected",
            EventKind::ContractFinalized => "contract_finalized",
            EventKind::BlockchainVerified => "blockchain_verified",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == s)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit event with its position in the contract's hash chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub contract_id: Uuid,
    pub sequence: i64,
    pub kind: EventKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub actor: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub previous_hash: String,
    pub this_hash: String,
}

impl AuditEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        contract_id: Uuid,
        sequence: i64,
        kind: EventKind,
        description: String,
        metadata: Option<serde_json::Value>,
        actor: Option<Uuid>,
        created_at: DateTime<Utc>,
        previous_hash: String,
    ) -> Self {
        let mut event = Self {
            contract_id,
            sequence,
            kind,
            description,
            metadata,
            actor,
            created_at,
            previous_hash,
            this_hash: String::new(),
        };
        event.this_hash = event.calculate_hash();
        event
    }

    /// Create canonical string representation for hashing
    pub fn canonical_string(&self) -> String {
        format!(
            "contract_id:{}|sequence:{}|kind:{}|description:{}|metadata:{}|actor:{}|created_at:{}|previous_hash:{}",
            self.contract_id,
            self.sequence,
            self.kind.as_str(),
            self.description,
            self.metadata
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_default(),
            self.actor.map(|a| a.to_string()).unwrap_or_default(),
            self.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.previous_hash,
        )
    }

    pub fn calculate_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical_string().as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    pub fn verify_hash(&self) -> bool {
        self.this_hash == self.calculate_hash()
    }

    pub fn summary(&self) -> String {
        format!("#{} {}: {}", self.sequence, self.kind, self.description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample(metadata: Option<serde_json::Value>) -> AuditEvent {
        AuditEvent::new(
            Uuid::nil(),
            0,
            EventKind::DocumentUploaded,
            "Document uploaded".to_string(),
            metadata,
            None,
            crate::database::now(),
            GENESIS_HASH.to_string(),
        )
    }

    #[test]
    fn test_event_kind_names_are_closed_set() {
        let names: Vec<&str> = EventKind::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "document_uploaded",
                "ai_analysis_completed",
                "translation_viewed",
                "first_party_approved",
                "first_party_rejected",
                "second_party_added",
                "second_party_removed",
                "second_party_approved",
                "second_party_rejected",
                "contract_finalized",
                "blockchain_verified",
            ]
        );
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_str(kind.as_str()), Some(kind));
            assert_eq!(
                serde_json::to_value(kind).unwrap(),
                serde_json::Value::String(kind.as_str().to_string())
            );
        }
        assert_eq!(EventKind::from_str("contract_deleted"), None);
    }

    #[test]
    fn test_hash_calculation() {
        let event = sample(Some(json!({"filename": "lease.pdf"})));
        assert!(event.verify_hash());
        assert!(event.this_hash.starts_with("sha256:"));
        assert_eq!(event.this_hash.len(), 71);
    }

    #[test]
    fn test_tampering_breaks_hash() {
        let mut event = sample(None);
        event.description = "Document replaced".to_string();
        assert!(!event.verify_hash());
    }

    #[test]
    fn test_metadata_key_order_does_not_matter() {
        let a = sample(Some(json!({"a": 1, "b": 2})));
        let mut b = a.clone();
        b.metadata = Some(serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap());
        assert_eq!(a.calculate_hash(), b.calculate_hash());
    }
}
