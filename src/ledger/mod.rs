//! Ledger Anchoring
//!
//! Content hashing, the ledger gateway client and the idempotent anchoring service,
//! plus the background sweep that finishes unconfirmed submissions.

pub mod anchor;
pub mod client;
pub mod hash;
pub mod sweep;

pub use anchor::{AnchorOutcome, AnchoringService};
pub use client::{
    AnchorSubmission, DisabledLedger, HttpLedgerClient, LedgerClient, LedgerError, LedgerReceipt,
};
pub use hash::{content_hash, idempotency_key, CanonicalDocument};
pub use sweep::{ConfirmationSweeper, SweepReport};
