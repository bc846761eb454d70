//! Party Registry
//!
//! Tracks the owner (first party) and the optional counterpart (second party) of each
//! contract, each with an independent approval state.

pub mod registry;
pub mod types;

pub use registry::PartyRegistry;
pub use types::*;
