//! # Project API
//!
//! Read and replace the project data handed over by the co-founder chat.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use studio_core::state::{keys, load_json, save_json, ProjectData};
use utoipa::ToSchema;

use super::{ApiError, ApiResponse, ApiResult};
use crate::SharedState;

/// Stored project data, if any
#[derive(Debug, Serialize, ToSchema)]
pub struct ProjectResponse {
    #[schema(value_type = Option<Object>)]
    pub project: Option<ProjectData>,
}

/// Replace the stored project data
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectRequest {
    #[schema(value_type = Object)]
    pub project: ProjectData,
}

pub fn project_routes() -> Router<SharedState> {
    Router::new().route("/", get(get_project).put(update_project))
}

/// Get the stored project data
#[utoipa::path(
    get,
    path = "/api/v1/project",
    tag = "project",
    responses(
        (status = 200, description = "Stored project data", body = ProjectResponse)
    )
)]
pub async fn get_project(State(state): State<SharedState>) -> ApiResult<ProjectResponse> {
    let project = load_json(state.store.as_ref(), keys::PROJECT_DATA).map_err(ApiError::internal)?;
    Ok(Json(ProjectResponse { project }))
}

/// Replace the stored project data.
///
/// The agreement built from the old data is dropped and the gate stays
/// closed until `/agreement/evaluate` builds one for the new data.
#[utoipa::path(
    put,
    path = "/api/v1/project",
    tag = "project",
    request_body = UpdateProjectRequest,
    responses(
        (status = 200, description = "Project stored", body = ApiResponse)
    )
)]
pub async fn update_project(
    State(state): State<SharedState>,
    Json(req): Json<UpdateProjectRequest>,
) -> ApiResult<ApiResponse> {
    let mut session = state.session.write().await;
    session
        .invalidate("Project data changed. Evaluate the project to rebuild the checklist.")
        .map_err(ApiError::internal)?;
    save_json(state.store.as_ref(), keys::PROJECT_DATA, &req.project)
        .map_err(ApiError::internal)?;
    tracing::info!(project = %req.project.name, features = req.project.features.len(), "Project data replaced");
    Ok(Json(ApiResponse::ok(format!("Saved {}", req.project.name))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::pipeline::start_pipeline;
    use crate::api::test_state;
    use axum::http::StatusCode;
    use studio_core::agreement::{AgreementProposal, AgreementSession, ChecklistItem, ItemCategory};
    use studio_core::state::{FeaturePriority, FeatureSpec, KeyValueStore, MemoryStore};
    use std::sync::Arc;

    fn project(name: &str) -> ProjectData {
        ProjectData {
            name: name.to_string(),
            features: vec![FeatureSpec {
                name: "Booking".to_string(),
                priority: FeaturePriority::MustHave,
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_replacing_project_closes_gate() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        save_json(store.as_ref(), keys::PROJECT_DATA, &project("PetPal")).unwrap();
        let proposal = AgreementProposal {
            critical_items: vec![ChecklistItem::new(
                "core-scope",
                ItemCategory::Scope,
                "Launch scope",
                "Sign-off",
            )],
            ..Default::default()
        };
        let mut session = AgreementSession::from_proposal(store.clone(), proposal).unwrap();
        session.toggle_critical("core-scope").unwrap();
        assert!(session.can_proceed());
        let state = test_state(store.clone(), session);

        let req = UpdateProjectRequest {
            project: project("PetPal v2"),
        };
        update_project(State(state.clone()), Json(req)).await.unwrap();

        assert!(!state.session.read().await.can_proceed());
        assert!(store.get(keys::AGREEMENT).unwrap().is_none());
        match start_pipeline(State(state.clone())).await {
            Err(err) => assert_eq!(err.status, StatusCode::CONFLICT),
            Ok(_) => panic!("pipeline started under an agreement for other data"),
        }

        let stored = get_project(State(state)).await.unwrap();
        assert_eq!(stored.0.project.unwrap().name, "PetPal v2");
    }
}
