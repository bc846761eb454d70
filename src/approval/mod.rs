//! Approval Coordinator
//!
//! The two-party state machine, its pure status derivation and the per-contract locks
//! that serialize it.

pub mod coordinator;
pub mod locks;
pub mod state;

pub use coordinator::{ApprovalCoordinator, Decision};
pub use locks::ContractLocks;
pub use state::{derive_state, ApprovalState};
