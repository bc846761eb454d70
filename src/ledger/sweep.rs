//! Confirmation sweep
//!
//! Periodically retries ledger submission for contracts whose hash is stored but whose
//! transaction never confirmed.

use serde::Serialize;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::approval::ContractLocks;
use crate::database::queries::Queries;
use crate::database::Database;
use crate::error::ContractError;
use crate::ledger::anchor::AnchoringService;

const SWEEP_BATCH: i64 = 50;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub confirmed: usize,
    pub still_pending: usize,
    pub pruned_locks: usize,
}

pub struct ConfirmationSweeper {
    database: Database,
    anchoring: AnchoringService,
    locks: ContractLocks,
}

impl ConfirmationSweeper {
    pub fn new(database: Database, anchoring: AnchoringService, locks: ContractLocks) -> Self {
        Self {
            database,
            anchoring,
            locks,
        }
    }

    pub async fn sweep_once(&self) -> Result<SweepReport, ContractError> {
        let mut report = SweepReport {
            pruned_locks: self.locks.prune(),
            ..SweepReport::default()
        };

        if !self.anchoring.is_enabled() {
            return Ok(report);
        }

        let pending = {
            let mut conn = self.database.pool().acquire().await?;
            Queries::unconfirmed_anchors(&mut conn, SWEEP_BATCH).await?
        };

        for record in pending {
            report.examined += 1;
            match self.anchoring.submit(record.contract_id).await {
                Ok(outcome) if outcome.tx_reference.is_some() => report.confirmed += 1,
                Ok(_) => report.still_pending += 1,
                Err(e) => {
                    warn!(contract_id = %record.contract_id, "Sweep could not resubmit: {}", e);
                    report.still_pending += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                "Confirmation sweep: {} examined, {} confirmed, {} pending",
                report.examined, report.confirmed, report.still_pending
            );
        }
        Ok(report)
    }

    /// Sweep forever at the configured interval.
    pub async fn run(self) {
        let period = Duration::from_secs(self.anchoring.config().sweep_interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        info!("Starting confirmation sweep every {:?}", period);

        loop {
            ticker.tick().await;
            if let Err(e) = self.sweep_once().await {
                error!("Confirmation sweep failed: {}", e);
            }
        }
    }
}
