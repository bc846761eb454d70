//! Facade views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::approval::ApprovalState;
use crate::audit::EventKind;
use crate::database::models::{AnchorRecord, ChainStatus, ContractCategory, User};
use crate::parties::{Party, PartyApproval, PartyRole};

/// Hand-off from the ingestion pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContract {
    pub filename: String,
    #[serde(skip)]
    pub document: Vec<u8>,
    pub risk_summary: Option<String>,
    pub category: Option<ContractCategory>,
    pub expiry_date: Option<DateTime<Utc>>,
    /// Present once AI analysis has run over the document.
    pub analysis: Option<AnalysisSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub clauses: u32,
    pub risks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyView {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: PartyRole,
    pub approval_status: PartyApproval,
    pub approved_at: Option<DateTime<Utc>>,
}

impl PartyView {
    pub fn new(party: &Party, user: Option<&User>) -> Self {
        Self {
            user_id: party.user_id,
            email: user.map(|u| u.email.clone()),
            name: user.map(|u| u.display_name().to_string()),
            role: party.role,
            approval_status: party.approval,
            approved_at: party.approved_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorView {
    pub document_hash: String,
    pub tx_reference: Option<String>,
    pub chain_status: ChainStatus,
    pub confirmed_at: Option<DateTime<Utc>>,
}

impl From<&AnchorRecord> for AnchorView {
    fn from(record: &AnchorRecord) -> Self {
        Self {
            document_hash: record.document_hash.clone(),
            tx_reference: record.tx_reference.clone(),
            chain_status: record.chain_status,
            confirmed_at: record.confirmed_at,
        }
    }
}

/// Approval snapshot as seen by one party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub contract_id: Uuid,
    pub first_party: PartyView,
    pub second_party: Option<PartyView>,
    pub overall_status: ApprovalState,
    pub can_approve: bool,
    pub is_owner: bool,
    pub anchor: Option<AnchorView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrailEntry {
    pub sequence: i64,
    pub event_type: EventKind,
    pub description: String,
    pub metadata: Option<serde_json::Value>,
    pub user_id: Option<Uuid>,
    pub user_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub contract_id: Uuid,
    pub events: Vec<AuditTrailEntry>,
    pub anchor: Option<AnchorView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorVerification {
    pub contract_id: Uuid,
    pub document_hash: String,
    pub tx_reference: Option<String>,
    pub on_chain: bool,
}
