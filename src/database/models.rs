use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.email)
    }
}

/// Coarse stored lifecycle of a contract. Rewritten in the same transaction as every
/// approval transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    PendingReview,
    Rejected,
    Finalized,
}

impl ContractStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractStatus::PendingReview => "pending_review",
            ContractStatus::Rejected => "rejected",
            ContractStatus::Finalized => "finalized",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending_review" => Some(ContractStatus::PendingReview),
            "rejected" => Some(ContractStatus::Rejected),
            "finalized" => Some(ContractStatus::Finalized),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractCategory {
    Employment,
    Rental,
    Nda,
    Service,
    Sales,
    Partnership,
    Loan,
    Insurance,
    Other,
}

impl ContractCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractCategory::Employment => "employment",
            ContractCategory::Rental => "rental",
            ContractCategory::Nda => "nda",
            ContractCategory::Service => "service",
            ContractCategory::Sales => "sales",
            ContractCategory::Partnership => "partnership",
            ContractCategory::Loan => "loan",
            ContractCategory::Insurance => "insurance",
            ContractCategory::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "employment" => Some(ContractCategory::Employment),
            "rental" => Some(ContractCategory::Rental),
            "nda" => Some(ContractCategory::Nda),
            "service" => Some(ContractCategory::Service),
            "sales" => Some(ContractCategory::Sales),
            "partnership" => Some(ContractCategory::Partnership),
            "loan" => Some(ContractCategory::Loan),
            "insurance" => Some(ContractCategory::Insurance),
            "other" => Some(ContractCategory::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub filename: String,
    #[serde(skip)]
    pub document: Vec<u8>,
    pub status: ContractStatus,
    pub risk_summary: Option<String>,
    pub category: Option<ContractCategory>,
    pub expiry_date: Option<DateTime<Utc>>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// On-chain confirmation sub-status of an anchored contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainStatus {
    /// Anchoring is administratively disabled; only the hash exists.
    NotSubmitted,
    /// Hash stored, ledger confirmation outstanding.
    Pending,
    Confirmed,
}

impl ChainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChainStatus::NotSubmitted => "not_submitted",
            ChainStatus::Pending => "pending",
            ChainStatus::Confirmed => "confirmed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "not_submitted" => Some(ChainStatus::NotSubmitted),
            "pending" => Some(ChainStatus::Pending),
            "confirmed" => Some(ChainStatus::Confirmed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub contract_id: Uuid,
    pub document_hash: String,
    pub tx_reference: Option<String>,
    pub chain_status: ChainStatus,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AnchorRecord {
    pub fn is_confirmed(&self) -> bool {
        self.tx_reference.is_some()
    }
}
