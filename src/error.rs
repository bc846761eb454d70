use thiserror::Error;

use crate::approval::ApprovalState;

impl From<serde_json::Error> for ContractError {
    fn from(err: serde_json::Error) -> Self {
        Self::DatabaseError(format!("JSON serialization error: {}", err))
    }
}

impl From<sqlx::Error> for ContractError {
    fn from(err: sqlx::Error) -> Self {
        Self::DatabaseError(format!("Database error: {}", err))
    }
}

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("Not authorized: {0}")]
    AuthorizationError(String),

    #[error("Conflict: {0}")]
    ConflictError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    #[error("Invalid state ({status}): {message}")]
    InvalidStateError {
        message: String,
        status: ApprovalState,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Ledger unavailable: {0}")]
    LedgerTransientError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ContractError {
    pub fn contract_not_found(contract_id: uuid::Uuid) -> Self {
        Self::NotFoundError(format!("Contract {} not found", contract_id))
    }

    pub fn not_a_party(contract_id: uuid::Uuid) -> Self {
        Self::AuthorizationError(format!(
            "User holds no party role on contract {}",
            contract_id
        ))
    }

    pub fn owner_only(action: &str) -> Self {
        Self::AuthorizationError(format!("Only the contract owner can {}", action))
    }

    pub fn invalid_state(message: impl Into<String>, status: ApprovalState) -> Self {
        Self::InvalidStateError {
            message: message.into(),
            status,
        }
    }

    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AuthorizationError(_) => "authorization",
            Self::ConflictError(_) => "conflict",
            Self::NotFoundError(_) => "not_found",
            Self::InvalidStateError { .. } => "invalid_state",
            Self::ValidationError(_) => "validation",
            Self::LedgerTransientError(_) => "ledger_unavailable",
            Self::DatabaseError(_) => "database",
            Self::ConfigError(_) => "config",
        }
    }
}
