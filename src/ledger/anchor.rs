//! Anchoring Service
//!
//! Stores a contract's content hash once and pushes it to the ledger. The hash write
//! joins the caller's transaction; the ledger submission runs outside every lock and
//! only ever touches the transaction reference.

use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqliteConnection;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::approval::{derive_state, ApprovalState, ContractLocks};
use crate::audit::{AuditLog, EventKind};
use crate::config::LedgerConfig;
use crate::database::models::{AnchorRecord, ChainStatus};
use crate::database::queries::Queries;
use crate::database::{self, Database};
use crate::error::ContractError;
use crate::ledger::client::{AnchorSubmission, LedgerClient, LedgerError, LedgerReceipt};
use crate::ledger::hash::content_hash;
use crate::parties::PartyRegistry;

/// What the caller learns about an anchoring attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorOutcome {
    pub contract_id: Uuid,
    pub document_hash: String,
    pub tx_reference: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub chain_status: ChainStatus,
    /// Whether this call reached the ledger.
    pub submitted: bool,
}

impl AnchorOutcome {
    fn from_record(record: &AnchorRecord, submitted: bool) -> Self {
        Self {
            contract_id: record.contract_id,
            document_hash: record.document_hash.clone(),
            tx_reference: record.tx_reference.clone(),
            confirmed_at: record.confirmed_at,
            chain_status: record.chain_status,
            submitted,
        }
    }
}

#[derive(Clone)]
pub struct AnchoringService {
    database: Database,
    audit: AuditLog,
    client: Arc<dyn LedgerClient>,
    config: LedgerConfig,
    locks: ContractLocks,
    in_flight: Arc<DashSet<Uuid>>,
}

/// Marks a contract as having a submission underway until dropped.
struct InFlight {
    set: Arc<DashSet<Uuid>>,
    contract_id: Uuid,
}

impl InFlight {
    fn enter(set: &Arc<DashSet<Uuid>>, contract_id: Uuid) -> Option<Self> {
        set.insert(contract_id).then(|| Self {
            set: Arc::clone(set),
            contract_id,
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.remove(&self.contract_id);
    }
}

impl AnchoringService {
    pub fn new(
        database: Database,
        audit: AuditLog,
        client: Arc<dyn LedgerClient>,
        config: LedgerConfig,
        locks: ContractLocks,
    ) -> Self {
        Self {
            database,
            audit,
            client,
            config,
            locks,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Store the content hash of `payload` for `contract_id` inside the caller's
    /// transaction. An existing hash is returned untouched. The flag reports whether
    /// this call created the record.
    pub(crate) async fn store_hash(
        &self,
        conn: &mut SqliteConnection,
        contract_id: Uuid,
        payload: &[u8],
    ) -> Result<(AnchorRecord, bool), ContractError> {
        if let Some(existing) = Queries::get_anchor(&mut *conn, contract_id).await? {
            debug!(%contract_id, "Reusing stored hash {}", existing.document_hash);
            return Ok((existing, false));
        }

        let record = AnchorRecord {
            contract_id,
            document_hash: content_hash(payload),
            tx_reference: None,
            chain_status: if self.is_enabled() {
                ChainStatus::Pending
            } else {
                ChainStatus::NotSubmitted
            },
            attempts: 0,
            last_error: None,
            confirmed_at: None,
            created_at: database::now(),
        };

        let created = Queries::insert_anchor_if_absent(&mut *conn, &record).await?;
        if !created {
            let existing = Queries::get_anchor(&mut *conn, contract_id)
                .await?
                .ok_or_else(|| ContractError::DatabaseError("Anchor record vanished".to_string()))?;
            return Ok((existing, false));
        }

        info!(%contract_id, "Stored content hash {}", record.document_hash);
        Ok((record, true))
    }

    /// Hash `payload` (or reuse the stored hash) and submit it to the ledger. Refused
    /// until both parties have approved.
    pub async fn anchor(&self, contract_id: Uuid, payload: &[u8]) -> Result<AnchorOutcome, ContractError> {
        {
            let _guard = self.locks.lock(contract_id).await;
            let mut tx = self.database.pool().begin().await?;

            let pairing = PartyRegistry::load_pairing(&mut tx, contract_id).await?;
            if derive_state(&pairing, false) != ApprovalState::ApprovedPendingAnchor {
                let anchored = Queries::get_anchor(&mut tx, contract_id).await?.is_some();
                return Err(ContractError::invalid_state(
                    "Both parties must approve before the contract is anchored",
                    derive_state(&pairing, anchored),
                ));
            }

            self.store_hash(&mut tx, contract_id, payload).await?;
            tx.commit().await?;
        }
        self.submit(contract_id).await
    }

    /// Run the submission on the runtime so it survives the caller being cancelled.
    pub fn dispatch(&self, contract_id: Uuid) -> JoinHandle<Result<AnchorOutcome, ContractError>> {
        let service = self.clone();
        tokio::spawn(async move { service.submit(contract_id).await })
    }

    /// Submit the stored hash unless it is already confirmed, anchoring is disabled or
    /// another submission for the contract is underway.
    pub async fn submit(&self, contract_id: Uuid) -> Result<AnchorOutcome, ContractError> {
        let record = self.load(contract_id).await?;
        if record.is_confirmed() || !self.is_enabled() {
            return Ok(AnchorOutcome::from_record(&record, false));
        }

        let Some(_flight) = InFlight::enter(&self.in_flight, contract_id) else {
            debug!(%contract_id, "Submission already in flight");
            return Ok(AnchorOutcome::from_record(&record, false));
        };

        let submission =
            AnchorSubmission::new(contract_id, &record.document_hash, &self.config.network);
        let attempts = self.config.max_retries.max(1);

        for attempt in 1..=attempts {
            match self.submit_once(&submission).await {
                Ok(receipt) => return self.confirm(contract_id, &receipt).await,
                Err(e) => {
                    warn!(%contract_id, attempt, "Ledger submission failed: {}", e);
                    let mut conn = self.database.pool().acquire().await?;
                    Queries::record_anchor_failure(&mut conn, contract_id, 1, &e.to_string()).await?;
                    drop(conn);

                    if attempt < attempts {
                        tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                }
            }
        }

        warn!(%contract_id, "Hash stored but not confirmed after {} attempts", attempts);
        let record = self.load(contract_id).await?;
        Ok(AnchorOutcome::from_record(&record, true))
    }

    /// Ask the ledger whether the stored hash is recorded.
    pub async fn verify_on_chain(&self, contract_id: Uuid) -> Result<bool, ContractError> {
        let record = self.load(contract_id).await?;
        if !self.is_enabled() {
            return Err(LedgerError::Disabled.into());
        }
        Ok(self.client.verify(contract_id, &record.document_hash).await?)
    }

    pub async fn record(&self, contract_id: Uuid) -> Result<Option<AnchorRecord>, ContractError> {
        let mut conn = self.database.pool().acquire().await?;
        Queries::get_anchor(&mut conn, contract_id).await
    }

    async fn load(&self, contract_id: Uuid) -> Result<AnchorRecord, ContractError> {
        self.record(contract_id).await?.ok_or_else(|| {
            ContractError::NotFoundError(format!("Contract {} has not been anchored", contract_id))
        })
    }

    async fn submit_once(&self, submission: &AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        let limit = self.config.submit_timeout_secs;
        tokio::time::timeout(Duration::from_secs(limit), self.client.submit(submission))
            .await
            .map_err(|_| LedgerError::Timeout(limit))?
    }

    /// Attach the transaction under the contract lock. A transaction already present
    /// is kept and no second event is written.
    async fn confirm(
        &self,
        contract_id: Uuid,
        receipt: &LedgerReceipt,
    ) -> Result<AnchorOutcome, ContractError> {
        let _guard = self.locks.lock(contract_id).await;
        let mut tx = self.database.pool().begin().await?;

        let attached =
            Queries::confirm_anchor(&mut tx, contract_id, &receipt.tx_reference, database::now())
                .await?;
        let record = Queries::get_anchor(&mut tx, contract_id)
            .await?
            .ok_or_else(|| ContractError::DatabaseError("Anchor record vanished".to_string()))?;

        if attached {
            self.audit
                .record(
                    &mut tx,
                    contract_id,
                    EventKind::BlockchainVerified,
                    format!("Contract hash recorded on {}", self.config.network),
                    Some(json!({
                        "document_hash": record.document_hash,
                        "tx_reference": receipt.tx_reference,
                        "network": self.config.network,
                        "block_number": receipt.block_number,
                    })),
                    None,
                )
                .await?;
        }
        tx.commit().await?;

        if attached {
            info!(%contract_id, "Anchor confirmed in {}", receipt.tx_reference);
        }
        Ok(AnchorOutcome::from_record(&record, true))
    }
}
