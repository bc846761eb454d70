//! Audit Log System
//!
//! Append-only, hash-chained record of everything that happens to a contract.

pub mod entry;
pub mod logger;
pub mod verify;

pub use entry::{AuditEvent, EventKind, GENESIS_HASH};
pub use logger::AuditLog;
pub use verify::{verify_trail, TrailVerification};
