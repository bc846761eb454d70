//! Audit Trail Verification
//!
//! Replays a contract's events and checks sequence, hash chain and timestamp order.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::audit::entry::{AuditEvent, GENESIS_HASH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailVerification {
    pub valid: bool,
    pub events_checked: usize,
    pub head_hash: String,
    pub problem: Option<String>,
}

/// Verify a contract's complete audit trail, as returned by `AuditLog::list_for_contract`.
pub fn verify_trail(events: &[AuditEvent]) -> TrailVerification {
    let mut head_hash = GENESIS_HASH.to_string();

    for (i, event) in events.iter().enumerate() {
        let problem = if event.contract_id != events[0].contract_id {
            Some(format!("Entry {} belongs to contract {}", i, event.contract_id))
        } else if event.sequence != i as i64 {
            Some(format!("Sequence gap at entry {}: found {}", i, event.sequence))
        } else if !event.verify_hash() {
            Some(format!("Invalid hash in entry {}", i))
        } else if event.previous_hash != head_hash {
            Some(format!(
                "Hash chain broken at entry {}: expected {}, got {}",
                i, head_hash, event.previous_hash
            ))
        } else if i > 0 && event.created_at < events[i - 1].created_at {
            Some(format!(
                "Non-monotonic timestamp at entry {}: {} < {}",
                i,
                event.created_at,
                events[i - 1].created_at
            ))
        } else {
            None
        };

        if let Some(problem) = problem {
            warn!("Audit trail verification failed: {}", problem);
            return TrailVerification {
                valid: false,
                events_checked: i,
                head_hash,
                problem: Some(problem),
            };
        }

        head_hash = event.this_hash.clone();
    }

    info!("Audit trail verification successful: {} entries", events.len());
    TrailVerification {
        valid: true,
        events_checked: events.len(),
        head_hash,
        problem: None,
    }
}
