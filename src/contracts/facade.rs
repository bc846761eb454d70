//! Contract Facade
//!
//! The entry point the rest of the application uses. Mutations go through the approval
//! coordinator; reads take a consistent snapshot in a read transaction and resolve user
//! names afterwards.

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approval::{derive_state, ApprovalCoordinator, ApprovalState, ContractLocks};
use crate::audit::{verify_trail, AuditLog, EventKind, TrailVerification};
use crate::config::LedgerConfig;
use crate::contracts::types::*;
use crate::database::models::{ContractCategory, ContractRecord, ContractStatus, User};
use crate::database::queries::Queries;
use crate::database::{self, Database};
use crate::directory::{normalize_email, UserDirectory};
use crate::error::ContractError;
use crate::ledger::{AnchoringService, ConfirmationSweeper, LedgerClient};
use crate::parties::{Pairing, Party, PartyApproval, PartyRegistry, PartyRole};

const EXPIRING_LIMIT: i64 = 10;

#[derive(Clone)]
pub struct ContractFacade {
    database: Database,
    audit: AuditLog,
    directory: Arc<dyn UserDirectory>,
    coordinator: ApprovalCoordinator,
    anchoring: AnchoringService,
    locks: ContractLocks,
}

impl ContractFacade {
    pub fn new(
        database: Database,
        directory: Arc<dyn UserDirectory>,
        ledger: Arc<dyn LedgerClient>,
        ledger_config: LedgerConfig,
    ) -> Self {
        let locks = ContractLocks::new();
        let audit = AuditLog::new(database.clone());
        let anchoring = AnchoringService::new(
            database.clone(),
            audit.clone(),
            ledger,
            ledger_config,
            locks.clone(),
        );
        let coordinator = ApprovalCoordinator::new(
            database.clone(),
            audit.clone(),
            anchoring.clone(),
            locks.clone(),
        );

        Self {
            database,
            audit,
            directory,
            coordinator,
            anchoring,
            locks,
        }
    }

    pub fn anchoring(&self) -> &AnchoringService {
        &self.anchoring
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn sweeper(&self) -> ConfirmationSweeper {
        ConfirmationSweeper::new(self.database.clone(), self.anchoring.clone(), self.locks.clone())
    }

    /// Store a freshly ingested contract with its owner as first party.
    pub async fn register_contract(
        &self,
        owner_id: Uuid,
        new: NewContract,
    ) -> Result<ContractRecord, ContractError> {
        if new.filename.trim().is_empty() {
            return Err(ContractError::ValidationError("filename is required".to_string()));
        }
        if new.document.is_empty() {
            return Err(ContractError::ValidationError("document is empty".to_string()));
        }

        let now = database::now();
        let contract = ContractRecord {
            id: Uuid::new_v4(),
            owner_id,
            filename: new.filename.trim().to_string(),
            document: new.document,
            status: ContractStatus::PendingReview,
            risk_summary: new.risk_summary,
            category: new.category,
            expiry_date: new.expiry_date,
            finalized_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.database.pool().begin().await?;
        Queries::insert_contract(&mut tx, &contract).await?;
        PartyRegistry::attach(&mut tx, contract.id, owner_id, PartyRole::FirstParty, now).await?;
        self.audit
            .record(
                &mut tx,
                contract.id,
                EventKind::DocumentUploaded,
                format!("Uploaded {}", contract.filename),
                Some(json!({ "filename": contract.filename, "size": contract.document.len() })),
                Some(owner_id),
            )
            .await?;
        if let Some(analysis) = new.analysis {
            self.audit
                .record(
                    &mut tx,
                    contract.id,
                    EventKind::AiAnalysisCompleted,
                    format!(
                        "Analysis found {} clauses and {} risks",
                        analysis.clauses, analysis.risks
                    ),
                    Some(json!({ "clauses": analysis.clauses, "risks": analysis.risks })),
                    None,
                )
                .await?;
        }
        tx.commit().await?;

        info!(contract_id = %contract.id, "Registered contract {}", contract.filename);
        Ok(contract)
    }

    pub async fn add_second_party(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        email: &str,
    ) -> Result<Party, ContractError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ContractError::ValidationError("email is required".to_string()));
        }

        let invitee = self
            .directory
            .find_by_email(&email)
            .await?
            .ok_or_else(|| ContractError::NotFoundError(format!("No account matches {}", email)))?;

        self.coordinator.add_second_party(contract_id, actor, &invitee).await
    }

    pub async fn remove_second_party(&self, contract_id: Uuid, actor: Uuid) -> Result<(), ContractError> {
        self.coordinator.remove_second_party(contract_id, actor).await
    }

    /// Approve or reject, then report the resulting snapshot. A finalizing approval
    /// hands the stored hash to the ledger once the contract lock is released.
    pub async fn decide_approval(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        approved: bool,
    ) -> Result<ApprovalStatus, ContractError> {
        let decision = self.coordinator.decide(contract_id, actor, approved).await?;

        if decision.finalized.is_some() && self.anchoring.is_enabled() {
            let submission = self.anchoring.dispatch(contract_id);
            if self.anchoring.config().await_submission {
                match submission.await {
                    Ok(Ok(outcome)) => {
                        debug!(%contract_id, "Submission finished: {:?}", outcome.chain_status)
                    }
                    Ok(Err(e)) => warn!(%contract_id, "Ledger submission error: {}", e),
                    Err(e) => warn!(%contract_id, "Ledger submission task failed: {}", e),
                }
            }
        }

        self.get_approval_status(contract_id, actor).await
    }

    pub async fn get_approval_status(
        &self,
        contract_id: Uuid,
        actor: Uuid,
    ) -> Result<ApprovalStatus, ContractError> {
        let mut tx = self.database.pool().begin().await?;
        Queries::require_contract(&mut tx, contract_id).await?;
        let pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
        let anchor = Queries::get_anchor(&mut tx, contract_id).await?;
        tx.commit().await?;

        let party = pairing
            .party_for(actor)
            .ok_or_else(|| ContractError::not_a_party(contract_id))?;
        let overall_status = derive_state(&pairing, anchor.is_some());
        let can_approve =
            overall_status != ApprovalState::Finalized && party.approval != PartyApproval::Approved;
        let is_owner = party.role == PartyRole::FirstParty;

        let users = self.resolve_users(party_ids(&pairing)).await?;
        let view = |party: &Party| PartyView::new(party, users.get(&party.user_id));

        Ok(ApprovalStatus {
            contract_id,
            first_party: view(&pairing.first),
            second_party: pairing.second.as_party().map(view),
            overall_status,
            can_approve,
            is_owner,
            anchor: anchor.as_ref().map(AnchorView::from),
        })
    }

    /// All events of a contract in order, with the anchor if one exists.
    pub async fn get_audit_trail(&self, contract_id: Uuid) -> Result<AuditTrail, ContractError> {
        let mut tx = self.database.pool().begin().await?;
        Queries::require_contract(&mut tx, contract_id).await?;
        let events = AuditLog::list_with(&mut tx, contract_id).await?;
        let anchor = Queries::get_anchor(&mut tx, contract_id).await?;
        tx.commit().await?;

        let users = self
            .resolve_users(events.iter().filter_map(|e| e.actor).collect())
            .await?;

        let events = events
            .into_iter()
            .map(|event| AuditTrailEntry {
                sequence: event.sequence,
                event_type: event.kind,
                user_name: event
                    .actor
                    .and_then(|id| users.get(&id))
                    .map(|u| u.display_name().to_string()),
                description: event.description,
                metadata: event.metadata,
                user_id: event.actor,
                created_at: event.created_at,
                hash: event.this_hash,
            })
            .collect();

        Ok(AuditTrail {
            contract_id,
            events,
            anchor: anchor.as_ref().map(AnchorView::from),
        })
    }

    /// Whether `user_id` holds a party role on the contract.
    pub async fn is_party(&self, contract_id: Uuid, user_id: Uuid) -> Result<bool, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Queries::require_contract(&mut conn, contract_id).await?;
        let pairing = PartyRegistry::load_pairing(&mut conn, contract_id).await?;
        Ok(pairing.party_for(user_id).is_some())
    }

    pub async fn record_translation_viewed(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        language: &str,
    ) -> Result<(), ContractError> {
        let language = language.trim();
        if language.is_empty() {
            return Err(ContractError::ValidationError("language is required".to_string()));
        }

        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;
        Queries::require_contract(&mut tx, contract_id).await?;
        let pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
        if pairing.party_for(actor).is_none() {
            return Err(ContractError::not_a_party(contract_id));
        }

        self.audit
            .record(
                &mut tx,
                contract_id,
                EventKind::TranslationViewed,
                format!("Viewed translation ({})", language),
                Some(json!({ "language": language })),
                Some(actor),
            )
            .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Owner-only edit of category and expiry. Absent fields keep their value.
    pub async fn update_details(
        &self,
        contract_id: Uuid,
        actor: Uuid,
        category: Option<ContractCategory>,
        expiry_date: Option<DateTime<Utc>>,
    ) -> Result<ContractRecord, ContractError> {
        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;
        let contract = Queries::require_contract(&mut tx, contract_id).await?;
        if contract.owner_id != actor {
            return Err(ContractError::owner_only("edit contract details"));
        }

        Queries::update_contract_details(&mut tx, contract_id, category, expiry_date, database::now())
            .await?;
        let updated = Queries::require_contract(&mut tx, contract_id).await?;
        tx.commit().await?;
        Ok(updated)
    }

    /// Up to ten contracts the user is party to that expire within `within_days`,
    /// soonest first.
    pub async fn expiring_contracts(
        &self,
        user_id: Uuid,
        within_days: i64,
    ) -> Result<Vec<ContractRecord>, ContractError> {
        if within_days < 0 {
            return Err(ContractError::ValidationError(
                "within_days must not be negative".to_string(),
            ));
        }
        let from = database::now();
        let until = from + Duration::days(within_days);
        let mut conn = self.database.pool().acquire().await?;
        Queries::expiring_contracts(&mut conn, user_id, from, until, EXPIRING_LIMIT).await
    }

    /// Ask the ledger whether the contract's stored hash is recorded. Parties only.
    pub async fn verify_anchor(
        &self,
        contract_id: Uuid,
        actor: Uuid,
    ) -> Result<AnchorVerification, ContractError> {
        if !self.is_party(contract_id, actor).await? {
            return Err(ContractError::not_a_party(contract_id));
        }

        let record = self.anchoring.record(contract_id).await?.ok_or_else(|| {
            ContractError::NotFoundError(format!("Contract {} has not been anchored", contract_id))
        })?;
        let on_chain = self.anchoring.verify_on_chain(contract_id).await?;

        Ok(AnchorVerification {
            contract_id,
            document_hash: record.document_hash,
            tx_reference: record.tx_reference,
            on_chain,
        })
    }

    pub async fn verify_audit_trail(&self, contract_id: Uuid) -> Result<TrailVerification, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Queries::require_contract(&mut conn, contract_id).await?;
        let events = AuditLog::list_with(&mut conn, contract_id).await?;
        Ok(verify_trail(&events))
    }

    async fn resolve_users(&self, ids: Vec<Uuid>) -> Result<HashMap<Uuid, User>, ContractError> {
        let mut users = HashMap::new();
        for id in ids {
            if users.contains_key(&id) {
                continue;
            }
            if let Some(user) = self.directory.find_by_id(id).await? {
                users.insert(id, user);
            }
        }
        Ok(users)
    }
}

fn party_ids(pairing: &Pairing) -> Vec<Uuid> {
    std::iter::once(pairing.first.user_id)
        .chain(pairing.second.as_party().map(|p| p.user_id))
        .collect()
}
