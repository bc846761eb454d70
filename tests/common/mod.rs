#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use contract_anchor::audit::EventKind;
use contract_anchor::config::LedgerConfig;
use contract_anchor::contracts::{AnalysisSummary, NewContract};
use contract_anchor::database::models::{AnchorRecord, User};
use contract_anchor::database::Database;
use contract_anchor::directory::SqlUserDirectory;
use contract_anchor::ledger::{AnchorSubmission, LedgerClient, LedgerError, LedgerReceipt};
use contract_anchor::ContractFacade;

/// Ledger double that counts submissions and can simulate an outage or a slow gateway.
#[derive(Default)]
pub struct RecordingLedger {
    submissions: AtomicUsize,
    failing: AtomicBool,
    delay_ms: AtomicU64,
    recorded: Mutex<HashMap<Uuid, String>>,
    idempotency_keys: Mutex<Vec<String>>,
}

impl RecordingLedger {
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Hold every submission for `delay` before answering.
    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn idempotency_keys(&self) -> Vec<String> {
        self.idempotency_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for RecordingLedger {
    async fn submit(&self, submission: &AnchorSubmission) -> Result<LedgerReceipt, LedgerError> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        self.idempotency_keys
            .lock()
            .unwrap()
            .push(submission.idempotency_key.clone());

        // Widen race windows a little.
        let delay = self.delay_ms.load(Ordering::SeqCst).max(5);
        tokio::time::sleep(Duration::from_millis(delay)).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }

        self.recorded
            .lock()
            .unwrap()
            .insert(submission.contract_id, submission.document_hash.clone());
        Ok(LedgerReceipt {
            tx_reference: format!("0xtx{:04}", n),
            block_number: Some(1000 + n as u64),
        })
    }

    async fn verify(&self, contract_id: Uuid, document_hash: &str) -> Result<bool, LedgerError> {
        Ok(self
            .recorded
            .lock()
            .unwrap()
            .get(&contract_id)
            .map(|h| h == document_hash)
            .unwrap_or(false))
    }
}

pub fn ledger_config(enabled: bool) -> LedgerConfig {
    LedgerConfig {
        enabled,
        gateway_url: Some("http://ledger.test".to_string()),
        api_key: None,
        network: "testnet".to_string(),
        max_retries: 2,
        retry_delay_secs: 0,
        submit_timeout_secs: 5,
        sweep_interval_secs: 1,
        await_submission: true,
    }
}

pub struct TestApp {
    pub database: Database,
    pub directory: Arc<SqlUserDirectory>,
    pub ledger: Arc<RecordingLedger>,
    pub facade: ContractFacade,
    pub alice: User,
    pub bob: User,
    pub carol: User,
}

pub async fn setup(ledger_enabled: bool) -> TestApp {
    setup_with(ledger_config(ledger_enabled)).await
}

pub async fn setup_with(config: LedgerConfig) -> TestApp {
    let database = Database::new_in_memory()
        .await
        .expect("Failed to create test database");
    let directory = Arc::new(SqlUserDirectory::new(database.clone()));
    let ledger = Arc::new(RecordingLedger::default());

    let alice = directory
        .register_user("alice@example.com", Some("Alice Owner"))
        .await
        .unwrap();
    let bob = directory
        .register_user("bob@example.com", Some("Bob Counterparty"))
        .await
        .unwrap();
    let carol = directory.register_user("carol@example.com", None).await.unwrap();

    let facade = ContractFacade::new(
        database.clone(),
        directory.clone(),
        ledger.clone(),
        config,
    );

    TestApp {
        database,
        directory,
        ledger,
        facade,
        alice,
        bob,
        carol,
    }
}

impl TestApp {
    /// Upload a contract owned by alice.
    pub async fn upload(&self) -> Uuid {
        self.facade
            .register_contract(
                self.alice.id,
                NewContract {
                    filename: "rental-agreement.pdf".to_string(),
                    document: format!("rental agreement {}", Utc::now()).into_bytes(),
                    risk_summary: Some("Deposit is non-refundable".to_string()),
                    ..NewContract::default()
                },
            )
            .await
            .unwrap()
            .id
    }

    pub async fn upload_analyzed(&self) -> Uuid {
        self.facade
            .register_contract(
                self.alice.id,
                NewContract {
                    filename: "employment.pdf".to_string(),
                    document: b"employment terms".to_vec(),
                    analysis: Some(AnalysisSummary { clauses: 12, risks: 3 }),
                    ..NewContract::default()
                },
            )
            .await
            .unwrap()
            .id
    }

    /// Upload, pair with bob and have both approve.
    pub async fn finalized_contract(&self) -> Uuid {
        let id = self.upload().await;
        self.facade
            .add_second_party(id, self.alice.id, &self.bob.email)
            .await
            .unwrap();
        self.facade.decide_approval(id, self.alice.id, true).await.unwrap();
        self.facade.decide_approval(id, self.bob.id, true).await.unwrap();
        id
    }

    /// Poll until a background submission has attached its transaction.
    pub async fn wait_for_confirmation(&self, contract_id: Uuid) -> AnchorRecord {
        for _ in 0..200 {
            if let Some(record) = self.facade.anchoring().record(contract_id).await.unwrap() {
                if record.is_confirmed() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("anchor for {} was never confirmed", contract_id);
    }

    pub async fn event_kinds(&self, contract_id: Uuid) -> Vec<EventKind> {
        self.facade
            .get_audit_trail(contract_id)
            .await
            .unwrap()
            .events
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    pub async fn count(&self, contract_id: Uuid, kind: EventKind) -> usize {
        self.event_kinds(contract_id)
            .await
            .into_iter()
            .filter(|k| *k == kind)
            .count()
    }
}
