//! HTTP API under `/api/v1`.

pub mod agreement;
pub mod pipeline;
pub mod project;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use studio_core::agreement::SessionError;
use studio_core::pipeline::PipelineError;
use utoipa::ToSchema;

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Error rendered as an `ApiResponse` with a status code
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{:#}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let status = match &err {
            SessionError::Gate(_) => StatusCode::BAD_REQUEST,
            SessionError::Blocked(_) => StatusCode::CONFLICT,
            SessionError::Persist(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::Precondition(_) => StatusCode::CONFLICT,
            PipelineError::OrchestratorFault { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            PipelineError::StaleRunDiscarded(_) | PipelineError::Cancelled(_) => {
                StatusCode::GONE
            }
        };
        Self::new(status, err.to_string())
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;

/// App state over `store` with a generator that is never reached
#[cfg(test)]
pub(crate) fn test_state(
    store: std::sync::Arc<dyn studio_core::state::KeyValueStore>,
    session: studio_core::agreement::AgreementSession,
) -> crate::SharedState {
    use std::sync::Arc;
    use studio_core::config::PipelineConfig;
    use studio_core::generation::HttpGenerator;
    use studio_core::models::ModelConfig;
    use studio_core::pipeline::{PipelineOrchestrator, ProgressReporter};

    let generator = Arc::new(HttpGenerator::new(ModelConfig::default()));
    let reporter = Arc::new(ProgressReporter::new());
    let orchestrator =
        PipelineOrchestrator::new(generator.clone(), store.clone(), &PipelineConfig::immediate())
            .with_reporter(reporter.clone());
    Arc::new(crate::AppState {
        store,
        session: tokio::sync::RwLock::new(session),
        orchestrator: Arc::new(orchestrator),
        reporter,
        images: generator,
    })
}
