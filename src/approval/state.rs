//! Overall Approval State
//!
//! The overall status of a contract is never stored on its own; it is recomputed from the
//! two party states plus whether an anchor hash exists.

use serde::{Deserialize, Serialize};

use crate::database::models::ContractStatus;
use crate::parties::{Pairing, PartyApproval, SecondParty};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    NoSecondParty,
    AwaitingApproval,
    ApprovedPendingAnchor,
    Finalized,
    Rejected,
}

impl ApprovalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalState::NoSecondParty => "no_second_party",
            ApprovalState::AwaitingApproval => "awaiting_approval",
            ApprovalState::ApprovedPendingAnchor => "approved_pending_anchor",
            ApprovalState::Finalized => "finalized",
            ApprovalState::Rejected => "rejected",
        }
    }

    /// Coarse lifecycle status persisted on the contract row.
    pub fn contract_status(&self) -> ContractStatus {
        match self {
            ApprovalState::Finalized => ContractStatus::Finalized,
            ApprovalState::Rejected => ContractStatus::Rejected,
            _ => ContractStatus::PendingReview,
        }
    }
}

impl std::fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derive the overall state of a pairing.
pub fn derive_state(pairing: &Pairing, hash_present: bool) -> ApprovalState {
    let second = match &pairing.second {
        SecondParty::Absent => return ApprovalState::NoSecondParty,
        SecondParty::Present(party) => party,
    };

    match (pairing.first.approval, second.approval) {
        (PartyApproval::Rejected, _) | (_, PartyApproval::Rejected) => ApprovalState::Rejected,
        (PartyApproval::Approved, PartyApproval::Approved) if hash_present => {
            ApprovalState::Finalized
        }
        (PartyApproval::Approved, PartyApproval::Approved) => ApprovalState::ApprovedPendingAnchor,
        _ => ApprovalState::AwaitingApproval,
    }
}
