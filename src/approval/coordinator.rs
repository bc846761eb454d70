//! Approval Coordinator
//!
//! Validates and applies every party transition. Each operation holds the contract's
//! lock and runs in a single transaction: the party change, its audit event, the stored
//! lifecycle status and (on the triggering approval) the anchor hash commit together.

use serde_json::json;
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

use crate::approval::locks::ContractLocks;
use crate::approval::state::{derive_state, ApprovalState};
use crate::audit::{AuditLog, EventKind};
use crate::database::models::{AnchorRecord, User};
use crate::database::queries::Queries;
use crate::database::{self, Database};
use crate::error::ContractError;
use crate::ledger::{AnchoringService, CanonicalDocument};
use crate::parties::{Pairing, Party, PartyApproval, PartyRegistry, PartyRole, SecondParty};

/// Result of an approve/reject call.
#[derive(Debug, Clone)]
pub struct Decision {
    pub state: ApprovalState,
    /// The anchor record created by this decision, if it finalized the contract.
    pub finalized: Option<AnchorRecord>,
    /// False when the call was an idempotent replay and nothing was written.
    pub recorded: bool,
}

#[derive(Clone)]
pub struct ApprovalCoordinator {
    database: Database,
    audit: AuditLog,
    anchoring: AnchoringService,
    locks: ContractLocks,
}

impl ApprovalCoordinator {
    pub fn new(
        database: Database,
        audit: AuditLog,
        anchoring: AnchoringService,
        locks: ContractLocks,
    ) -> Self {
        Self {
            database,
            audit,
            anchoring,
            locks,
        }
    }

    /// Attach `invitee` as second party. Only the owner may do this, and only while the
    /// contract has no second party.
    pub async fn add_second_party(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        invitee: &User,
    ) -> Result<Party, ContractError> {
        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;

        Queries::require_contract(&mut tx, contract_id).await?;
        let mut pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
        require_owner(&pairing, contract_id, actor, "add a second party")?;

        if pairing.second.is_present() {
            return Err(ContractError::ConflictError(format!(
                "Contract {} already has a second party",
                contract_id
            )));
        }
        if invitee.id == pairing.owner_id() {
            return Err(ContractError::ConflictError(
                "The contract owner cannot also be the second party".to_string(),
            ));
        }

        let now = database::now();
        let party =
            PartyRegistry::attach(&mut tx, contract_id, invitee.id, PartyRole::SecondParty, now)
                .await?;
        self.audit
            .record(
                &mut tx,
                contract_id,
                EventKind::SecondPartyAdded,
                format!("{} was added as second party", invitee.display_name()),
                Some(json!({ "user_id": invitee.id, "email": invitee.email })),
                Some(actor),
            )
            .await?;

        pairing.second = SecondParty::Present(party.clone());
        let state = self.sync_status(&mut tx, contract_id, &pairing).await?;
        tx.commit().await?;

        info!(%contract_id, "Second party {} added, now {}", invitee.id, state);
        Ok(party)
    }

    /// Detach the second party and discard every approval given so far.
    pub async fn remove_second_party(
        &self,
        contract_id: Uuid,
        actor: Uuid,
    ) -> Result<(), ContractError> {
        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;

        Queries::require_contract(&mut tx, contract_id).await?;
        let mut pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
        require_owner(&pairing, contract_id, actor, "remove the second party")?;

        let anchored = Queries::get_anchor(&mut tx, contract_id).await?.is_some();
        let state = derive_state(&pairing, anchored);
        if state == ApprovalState::Finalized {
            return Err(ContractError::invalid_state(
                "A finalized contract keeps its parties",
                state,
            ));
        }

        let removed = pairing.second.as_party().cloned().ok_or_else(|| {
            ContractError::NotFoundError(format!("Contract {} has no second party", contract_id))
        })?;

        PartyRegistry::detach(&mut tx, contract_id, PartyRole::SecondParty).await?;
        PartyRegistry::reset(&mut tx, contract_id, PartyRole::FirstParty).await?;
        self.audit
            .record(
                &mut tx,
                contract_id,
                EventKind::SecondPartyRemoved,
                "Second party was removed; approvals reset",
                Some(json!({ "user_id": removed.user_id })),
                Some(actor),
            )
            .await?;

        pairing.second = SecondParty::Absent;
        pairing.first.approval = PartyApproval::Pending;
        pairing.first.approved_at = None;
        self.sync_status(&mut tx, contract_id, &pairing).await?;
        tx.commit().await?;

        info!(%contract_id, "Second party {} removed", removed.user_id);
        Ok(())
    }

    /// Record `actor`'s approval or rejection. The approval that completes the pair
    /// stores the anchor hash before this returns; ledger submission is left to the
    /// caller once the lock is released.
    pub async fn decide(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        approved: bool,
    ) -> Result<Decision, ContractError> {
        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;

        let contract = Queries::require_contract(&mut tx, contract_id).await?;
        let mut pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
        let (role, current) = pairing
            .party_for(actor)
            .map(|party| (party.role, party.approval))
            .ok_or_else(|| ContractError::not_a_party(contract_id))?;

        let mut anchored = Queries::get_anchor(&mut tx, contract_id).await?.is_some();
        let state = derive_state(&pairing, anchored);
        let target = if approved {
            PartyApproval::Approved
        } else {
            PartyApproval::Rejected
        };

        if state == ApprovalState::Finalized {
            if approved && current == PartyApproval::Approved {
                debug!(%contract_id, "Repeated approval on finalized contract");
                return Ok(Decision {
                    state,
                    finalized: None,
                    recorded: false,
                });
            }
            return Err(ContractError::invalid_state("Contract is already finalized", state));
        }
        if current == target {
            return Err(ContractError::invalid_state(
                format!("{} has already {} the contract", role.label(), target.as_str()),
                state,
            ));
        }

        let now = database::now();
        PartyRegistry::set_approval(&mut tx, contract_id, role, target, Some(now)).await?;
        let party = match role {
            PartyRole::FirstParty => Some(&mut pairing.first),
            PartyRole::SecondParty => match &mut pairing.second {
                SecondParty::Present(party) => Some(party),
                SecondParty::Absent => None,
            },
        };
        if let Some(party) = party {
            party.approval = target;
            party.approved_at = Some(now);
        }

        self.audit
            .record(
                &mut tx,
                contract_id,
                decision_event(role, approved),
                format!("{} {} the contract", role.label(), target.as_str()),
                Some(json!({ "role": role.as_str() })),
                Some(actor),
            )
            .await?;

        let mut finalized = None;
        if derive_state(&pairing, false) == ApprovalState::ApprovedPendingAnchor {
            let payload = CanonicalDocument::from_contract(&contract).to_bytes();
            let (record, created) = self.anchoring.store_hash(&mut tx, contract_id, &payload).await?;
            if created {
                self.audit
                    .record(
                        &mut tx,
                        contract_id,
                        EventKind::ContractFinalized,
                        "Both parties approved; contract finalized",
                        Some(json!({ "document_hash": record.document_hash })),
                        None,
                    )
                    .await?;
                finalized = Some(record);
            }
            anchored = true;
        }

        let new_state = derive_state(&pairing, anchored);
        Queries::update_contract_status(
            &mut tx,
            contract_id,
            new_state.contract_status(),
            (new_state == ApprovalState::Finalized).then_some(now),
            now,
        )
        .await?;
        tx.commit().await?;

        info!(%contract_id, "{} {}, contract now {}", role.label(), target.as_str(), new_state);
        Ok(Decision {
            state: new_state,
            finalized,
            recorded: true,
        })
    }

    async fn sync_status(
        &self,
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        pairing: &Pairing,
    ) -> Result<ApprovalState, ContractError> {
        let anchored = Queries::get_anchor(&mut *conn, contract_id).await?.is_some();
        let state = derive_state(pairing, anchored);
        Queries::update_contract_status(
            &mut *conn,
            contract_id,
            state.contract_status(),
            None,
            database::now(),
        )
        .await?;
        Ok(state)
    }
}

fn require_owner(
    pairing: &Pairing,
    contract_id: Uuid,
    actor: Uuid,
    action: &str,
) -> Result<(), ContractError> {
    match pairing.party_for(actor) {
        None => Err(ContractError::not_a_party(contract_id)),
        Some(party) if party.role != PartyRole::FirstParty => Err(ContractError::owner_only(action)),
        Some(_) => Ok(()),
    }
}

fn decision_event(role: PartyRole, approved: bool) -> EventKind {
    match (role, approved) {
        (PartyRole::FirstParty, true) => EventKind::FirstPartyApproved,
        (PartyRole::FirstParty, false) => EventKind::FirstPartyRejected,
        (PartyRole::SecondParty, true) => EventKind::SecondPartyApproved,
        (PartyRole::SecondParty, false) => EventKind::SecondPartyRejected,
    }
}
