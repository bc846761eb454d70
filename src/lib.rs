pub mod api;
pub mod approval;
pub mod audit;
pub mod config;
pub mod contracts;
pub mod database;
pub mod directory;
pub mod error;
pub mod ledger;
pub mod parties;

pub use contracts::ContractFacade;
pub use error::ContractError;
