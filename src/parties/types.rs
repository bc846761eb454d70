//! Party Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    FirstParty,
    SecondParty,
}

impl PartyRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyRole::FirstParty => "first_party",
            PartyRole::SecondParty => "second_party",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "first_party" => Some(PartyRole::FirstParty),
            "second_party" => Some(PartyRole::SecondParty),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PartyRole::FirstParty => "First party",
            PartyRole::SecondParty => "Second party",
        }
    }
}

/// Approval state of a single party.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyApproval {
    Pending,
    Approved,
    Rejected,
}

impl PartyApproval {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartyApproval::Pending => "pending",
            PartyApproval::Approved => "approved",
            PartyApproval::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PartyApproval::Pending),
            "approved" => Some(PartyApproval::Approved),
            "rejected" => Some(PartyApproval::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub contract_id: Uuid,
    pub user_id: Uuid,
    pub role: PartyRole,
    #[serde(rename = "approval_status")]
    pub approval: PartyApproval,
    /// Set only on a transition into approved or rejected.
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The optional counterpart of a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecondParty {
    Absent,
    Present(Party),
}

impl SecondParty {
    pub fn as_party(&self) -> Option<&Party> {
        match self {
            SecondParty::Absent => None,
            SecondParty::Present(party) => Some(party),
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, SecondParty::Present(_))
    }
}

/// The current pairing of a contract: the owner plus, possibly, a counterpart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub first: Party,
    pub second: SecondParty,
}

impl Pairing {
    /// The party role `user_id` holds on this contract, if any.
    pub fn party_for(&self, user_id: Uuid) -> Option<&Party> {
        if self.first.user_id == user_id {
            return Some(&self.first);
        }
        self.second.as_party().filter(|p| p.user_id == user_id)
    }

    pub fn owner_id(&self) -> Uuid {
        self.first.user_id
    }
}
