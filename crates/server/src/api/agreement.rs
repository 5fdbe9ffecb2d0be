//! # Agreement API
//!
//! Checklist evaluation, toggles and batch consent. Every mutation goes
//! through the shared `AgreementSession`, so a failed write leaves the
//! agreement untouched.

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use studio_core::agreement::{Agreement, AgreementSession};
use utoipa::ToSchema;

use super::{ApiError, ApiResult};
use crate::SharedState;

/// Agreement as the founder sees it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AgreementResponse {
    #[schema(value_type = Object)]
    pub agreement: Agreement,
    pub can_proceed: bool,
    /// No project data to evaluate yet
    pub blocked: bool,
    pub recommended_action: String,
    pub readiness_percent: u8,
    pub pending_items: Vec<String>,
    pub pending_consent: Vec<String>,
}

impl AgreementResponse {
    pub fn from_session(session: &AgreementSession) -> Self {
        let verdict = session.verdict();
        Self {
            agreement: session.snapshot(),
            can_proceed: session.can_proceed(),
            blocked: session.is_blocked(),
            recommended_action: session.recommended_action().to_string(),
            readiness_percent: session.agreement().readiness_percent(),
            pending_items: verdict.pending_items,
            pending_consent: verdict.pending_consent,
        }
    }
}

/// Consent for several risky choices at once
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConsentRequest {
    pub ids: Vec<String>,
}

pub fn agreement_routes() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_agreement))
        .route("/evaluate", post(evaluate_agreement))
        .route("/critical/:id/toggle", post(toggle_critical))
        .route("/optional/:id/toggle", post(toggle_optional))
        .route("/consent", post(grant_consent))
}

/// Get the current agreement
#[utoipa::path(
    get,
    path = "/api/v1/agreement",
    tag = "agreement",
    responses(
        (status = 200, description = "Current agreement", body = AgreementResponse)
    )
)]
pub async fn get_agreement(State(state): State<SharedState>) -> Json<AgreementResponse> {
    let session = state.session.read().await;
    Json(AgreementResponse::from_session(&session))
}

/// Evaluate the stored project data and replace the agreement
#[utoipa::path(
    post,
    path = "/api/v1/agreement/evaluate",
    tag = "agreement",
    responses(
        (status = 200, description = "Fresh agreement", body = AgreementResponse)
    )
)]
pub async fn evaluate_agreement(
    State(state): State<SharedState>,
) -> ApiResult<AgreementResponse> {
    let (fresh, proposal) =
        AgreementSession::propose_from_store(state.store.clone()).map_err(ApiError::internal)?;
    tracing::info!(
        critical = proposal.critical_items.len(),
        optional = proposal.optional_items.len(),
        risky = proposal.risky_choices.len(),
        "Agreement evaluated"
    );

    let mut session = state.session.write().await;
    *session = fresh;
    Ok(Json(AgreementResponse::from_session(&session)))
}

/// Flip a critical item's completion
#[utoipa::path(
    post,
    path = "/api/v1/agreement/critical/{id}/toggle",
    tag = "agreement",
    params(("id" = String, Path, description = "Critical item ID")),
    responses(
        (status = 200, description = "Updated agreement", body = AgreementResponse),
        (status = 400, description = "Unknown item", body = super::ApiResponse)
    )
)]
pub async fn toggle_critical(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<AgreementResponse> {
    let mut session = state.session.write().await;
    session.toggle_critical(&id)?;
    Ok(Json(AgreementResponse::from_session(&session)))
}

/// Flip an optional item's inclusion
#[utoipa::path(
    post,
    path = "/api/v1/agreement/optional/{id}/toggle",
    tag = "agreement",
    params(("id" = String, Path, description = "Optional item ID")),
    responses(
        (status = 200, description = "Updated agreement", body = AgreementResponse),
        (status = 400, description = "Unknown item", body = super::ApiResponse)
    )
)]
pub async fn toggle_optional(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<AgreementResponse> {
    let mut session = state.session.write().await;
    session.toggle_optional(&id)?;
    Ok(Json(AgreementResponse::from_session(&session)))
}

/// Grant consent for a batch of risky choices, all or nothing
#[utoipa::path(
    post,
    path = "/api/v1/agreement/consent",
    tag = "agreement",
    request_body = ConsentRequest,
    responses(
        (status = 200, description = "Updated agreement", body = AgreementResponse),
        (status = 400, description = "Empty batch or unknown ID", body = super::ApiResponse)
    )
)]
pub async fn grant_consent(
    State(state): State<SharedState>,
    Json(req): Json<ConsentRequest>,
) -> ApiResult<AgreementResponse> {
    let mut session = state.session.write().await;
    session.grant_consent(&req.ids)?;
    tracing::info!(count = req.ids.len(), "Consent granted");
    Ok(Json(AgreementResponse::from_session(&session)))
}
