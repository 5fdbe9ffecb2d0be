//! # Pipeline API
//!
//! Start and cancel runs, read progress and the last artifact, stream events
//! over SSE, and render page mockups from the last run.

use axum::{
    extract::State,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use studio_core::pipeline::{
    ArtifactSummary, FinalArtifact, PipelineError, PipelineEvent, PipelineRun, ProgressSnapshot,
    StageOutput,
};
use studio_core::skills::{Mockup, MockupSkill, PageSet};
use studio_core::state::{keys, load_json, ProjectData};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use utoipa::ToSchema;

use super::{ApiError, ApiResponse, ApiResult};
use crate::SharedState;

/// Progress of the latest run
#[derive(Debug, Serialize, ToSchema)]
pub struct ProgressResponse {
    #[schema(value_type = Object)]
    pub progress: ProgressSnapshot,
    /// Token of the run currently allowed to make progress
    pub live_run: Option<String>,
}

/// Result of a cancel request
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// Cancelled run, if one was live
    pub cancelled: Option<String>,
}

/// Last completed run
#[derive(Debug, Serialize, ToSchema)]
pub struct ArtifactResponse {
    #[schema(value_type = Option<Object>)]
    pub summary: Option<ArtifactSummary>,
    #[schema(value_type = Option<Object>)]
    pub artifact: Option<FinalArtifact>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MockupResponse {
    #[schema(value_type = Vec<Object>)]
    pub mockups: Vec<Mockup>,
}

pub fn pipeline_routes() -> Router<SharedState> {
    Router::new()
        .route("/start", post(start_pipeline))
        .route("/cancel", post(cancel_pipeline))
        .route("/progress", get(get_progress))
        .route("/events", get(events))
        .route("/artifact", get(get_artifact))
}

pub fn mockup_routes() -> Router<SharedState> {
    Router::new().route("/", post(generate_mockups))
}

/// Start a pipeline run.
///
/// Any run still in flight is superseded. The run itself proceeds in the
/// background; follow it through `/pipeline/events` or `/pipeline/progress`.
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/start",
    tag = "pipeline",
    responses(
        (status = 202, description = "Run accepted", body = ApiResponse),
        (status = 409, description = "Agreement incomplete", body = ApiResponse)
    )
)]
pub async fn start_pipeline(
    State(state): State<SharedState>,
) -> Result<(StatusCode, Json<ApiResponse>), ApiError> {
    let project: ProjectData = load_json(state.store.as_ref(), keys::PROJECT_DATA)
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::new(StatusCode::CONFLICT, "No project data stored"))?;

    let agreement = {
        let session = state.session.read().await;
        if !session.can_proceed() {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                session.recommended_action().to_string(),
            ));
        }
        session.snapshot()
    };

    let orchestrator = state.orchestrator.clone();
    let name = project.name.clone();
    tokio::spawn(async move {
        match orchestrator.execute(project, &agreement).await {
            Ok(run) => tracing::info!(run = %run.token, "Run finished"),
            Err(e @ PipelineError::StaleRunDiscarded(_)) => tracing::debug!("{}", e),
            Err(e) => tracing::warn!("Run ended without artifact: {}", e),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(format!("Generating {}", name))),
    ))
}

/// Cancel the live run at its next boundary
#[utoipa::path(
    post,
    path = "/api/v1/pipeline/cancel",
    tag = "pipeline",
    responses(
        (status = 200, description = "Cancellation requested", body = CancelResponse)
    )
)]
pub async fn cancel_pipeline(State(state): State<SharedState>) -> Json<CancelResponse> {
    let cancelled = state.orchestrator.cancel().map(|t| t.to_string());
    Json(CancelResponse { cancelled })
}

/// Latest progress snapshot
#[utoipa::path(
    get,
    path = "/api/v1/pipeline/progress",
    tag = "pipeline",
    responses(
        (status = 200, description = "Current progress", body = ProgressResponse)
    )
)]
pub async fn get_progress(State(state): State<SharedState>) -> Json<ProgressResponse> {
    Json(ProgressResponse {
        progress: state.reporter.snapshot(),
        live_run: state.orchestrator.current_token().map(|t| t.to_string()),
    })
}

/// Summary and artifact of the last completed run
#[utoipa::path(
    get,
    path = "/api/v1/pipeline/artifact",
    tag = "pipeline",
    responses(
        (status = 200, description = "Last artifact, if any", body = ArtifactResponse)
    )
)]
pub async fn get_artifact(State(state): State<SharedState>) -> ApiResult<ArtifactResponse> {
    let summary = state
        .orchestrator
        .last_summary()
        .map_err(ApiError::internal)?;
    let artifact = state
        .orchestrator
        .last_run()
        .map_err(ApiError::internal)?
        .and_then(|run| run.final_artifact);
    Ok(Json(ArtifactResponse { summary, artifact }))
}

/// SSE stream: the current snapshot first, then every event as it happens
pub async fn events(
    State(state): State<SharedState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (snapshot, rx) = state.reporter.subscribe();

    let initial = stream::once(async move {
        let json = serde_json::to_string(&snapshot).unwrap_or_default();
        Ok::<Event, Infallible>(Event::default().event("snapshot").data(json))
    });

    let live = BroadcastStream::new(rx).filter_map(|item| async move {
        match item {
            Ok(event) => Some(Ok::<Event, Infallible>(to_sse(&event))),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "SSE observer lagged");
                None
            }
        }
    });

    Sse::new(initial.chain(live)).keep_alive(KeepAlive::default())
}

fn to_sse(event: &PipelineEvent) -> Event {
    let name = serde_json::to_value(event.kind)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_else(|| "event".to_string());
    let json = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(name).id(event.id.clone()).data(json)
}

/// Page set of a run, if its pages stage produced one
pub fn pages_of(run: &PipelineRun) -> Option<&PageSet> {
    run.stage_results.iter().find_map(|r| match r.output() {
        StageOutput::Pages(pages) => Some(pages),
        _ => None,
    })
}

/// Render one mockup per page of the last completed run
#[utoipa::path(
    post,
    path = "/api/v1/mockups",
    tag = "mockups",
    responses(
        (status = 200, description = "Mockups, failures included per page", body = MockupResponse),
        (status = 404, description = "No completed run", body = ApiResponse)
    )
)]
pub async fn generate_mockups(State(state): State<SharedState>) -> ApiResult<MockupResponse> {
    let run = state
        .orchestrator
        .last_run()
        .map_err(ApiError::internal)?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "No completed run yet"))?;
    let pages = pages_of(&run)
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Last run has no pages"))?;
    let project = run
        .final_artifact
        .as_ref()
        .map(|a| a.project.clone())
        .unwrap_or_default();

    let mockups = MockupSkill::new(state.images.clone())
        .generate(&project, pages)
        .await;
    Ok(Json(MockupResponse { mockups }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use studio_core::pipeline::{
        PipelineEventKind, PipelinePhase, RunToken, StageKind, StageOutcome, StageResult,
    };
    use studio_core::skills::PageSpec;

    #[test]
    fn test_pages_found_in_run() {
        let pages = PageSet {
            pages: vec![PageSpec {
                route: "/".to_string(),
                title: "Home".to_string(),
                purpose: "Landing".to_string(),
                components: vec![],
            }],
        };
        let mut run = PipelineRun::new(RunToken(1));
        assert!(pages_of(&run).is_none());

        let result = StageResult::finalize(
            StageKind::Pages,
            StageOutcome::Ok {
                output: StageOutput::Pages(pages.clone()),
                attempts: 1,
            },
            Utc::now(),
        )
        .unwrap();
        run.stage_results.push(result);
        assert_eq!(pages_of(&run), Some(&pages));
    }

    #[test]
    fn test_sse_event_named_by_kind() {
        let event = PipelineEvent::new(
            PipelineEventKind::StageCompleted,
            RunToken(1),
            PipelinePhase::Analyzing,
            10,
        );
        let _ = to_sse(&event);
        assert_eq!(serde_json::to_value(event.kind).unwrap(), "stage_completed");
    }
}
