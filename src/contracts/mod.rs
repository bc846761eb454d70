//! Contract Facade

pub mod facade;
pub mod types;

pub use facade::ContractFacade;
pub use types::*;
