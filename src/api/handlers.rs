use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::Json,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::api::AppState;
use crate::audit::TrailVerification;
use crate::contracts::{AnchorVerification, ApprovalStatus, AuditTrail};
use crate::error::ContractError;
use crate::parties::Party;

/// Header the upstream authentication layer fills with the caller's user id.
pub const USER_HEADER: &str = "x-user-id";

/// The authenticated caller.
pub struct Actor(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = ContractError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ContractError::ValidationError(format!("missing {} header", USER_HEADER)))?
            .to_str()
            .map_err(|_| ContractError::ValidationError(format!("unreadable {} header", USER_HEADER)))?;

        Uuid::parse_str(raw.trim())
            .map(Actor)
            .map_err(|_| ContractError::ValidationError(format!("invalid {} header", USER_HEADER)))
    }
}

#[derive(Debug, Deserialize)]
pub struct AddPartyRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub approved: bool,
}

pub async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "contract-anchor",
        "timestamp": chrono::Utc::now()
    }))
}

pub async fn add_second_party(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<AddPartyRequest>,
) -> Result<(StatusCode, Json<Party>), ContractError> {
    let party = state
        .facade
        .add_second_party(contract_id, actor, &request.email)
        .await?;
    Ok((StatusCode::CREATED, Json(party)))
}

pub async fn remove_second_party(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
) -> Result<StatusCode, ContractError> {
    state.facade.remove_second_party(contract_id, actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn decide_approval(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<ApprovalStatus>, ContractError> {
    info!(%contract_id, "Approval decision from {}: {}", actor, request.approved);
    let status = state
        .facade
        .decide_approval(contract_id, actor, request.approved)
        .await?;
    Ok(Json(status))
}

pub async fn approval_status(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<ApprovalStatus>, ContractError> {
    Ok(Json(state.facade.get_approval_status(contract_id, actor).await?))
}

pub async fn audit_trail(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<AuditTrail>, ContractError> {
    if !state.facade.is_party(contract_id, actor).await? {
        return Err(ContractError::not_a_party(contract_id));
    }
    Ok(Json(state.facade.get_audit_trail(contract_id).await?))
}

pub async fn verify_audit_trail(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<TrailVerification>, ContractError> {
    if !state.facade.is_party(contract_id, actor).await? {
        return Err(ContractError::not_a_party(contract_id));
    }
    Ok(Json(state.facade.verify_audit_trail(contract_id).await?))
}

pub async fn verify_anchor(
    State(state): State<AppState>,
    Actor(actor): Actor,
    Path(contract_id): Path<Uuid>,
) -> Result<Json<AnchorVerification>, ContractError> {
    Ok(Json(state.facade.verify_anchor(contract_id, actor).await?))
}
