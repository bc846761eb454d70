//! HTTP surface
//!
//! Thin axum layer over [`ContractFacade`]. Identity comes from the `x-user-id` header
//! set by the authentication layer in front of this service.

pub mod error;
pub mod handlers;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::contracts::ContractFacade;

#[derive(Clone)]
pub struct AppState {
    pub facade: ContractFacade,
}

pub fn router(facade: ContractFacade) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/contracts/:id/parties", post(handlers::add_second_party))
        .route("/contracts/:id/parties/second", delete(handlers::remove_second_party))
        .route(
            "/contracts/:id/approval",
            post(handlers::decide_approval).get(handlers::approval_status),
        )
        .route("/contracts/:id/audit-trail", get(handlers::audit_trail))
        .route("/contracts/:id/audit-trail/verify", get(handlers::verify_audit_trail))
        .route("/contracts/:id/anchor/verify", get(handlers::verify_anchor))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .into_inner(),
        )
        .with_state(AppState { facade })
}
