use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tracing::error;

use crate::error::ContractError;

impl ContractError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AuthorizationError(_) => StatusCode::FORBIDDEN,
            Self::ConflictError(_) | Self::InvalidStateError { .. } => StatusCode::CONFLICT,
            Self::NotFoundError(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::LedgerTransientError(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError(_) | Self::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ContractError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let mut body = json!({
            "error": self.kind(),
            "message": self.to_string(),
        });
        if let Self::InvalidStateError { status: current, .. } = &self {
            body["current_status"] = json!(current);
        }

        (status, Json(body)).into_response()
    }
}
