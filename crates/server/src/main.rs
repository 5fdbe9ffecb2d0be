//! CTO Studio Server
//!
//! Axum server exposing the agreement checklist and the generation pipeline,
//! plus a headless CLI for evaluating and running a project file.

mod api;

use anyhow::{bail, Context};
use axum::{routing::get, Json, Router};
use clap::{Parser, Subcommand};
use std::{net::SocketAddr, path::Path, sync::Arc};
use studio_core::agreement::{Agreement, AgreementEvaluator, AgreementSession, ConsentGate};
use studio_core::config::{ensure_runtime_dir, get_runtime_path, StudioConfig};
use studio_core::generation::{HttpGenerator, ImageGenerator};
use studio_core::pipeline::{PipelineOrchestrator, ProgressReporter};
use studio_core::state::{KeyValueStore, MemoryStore, ProjectData, SqliteStore, StudioDb};
use tokio::{net::TcpListener, sync::RwLock};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;

/// Application state
pub struct AppState {
    pub store: Arc<dyn KeyValueStore>,
    /// The one agreement the founder edits
    pub session: RwLock<AgreementSession>,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub reporter: Arc<ProgressReporter>,
    pub images: Arc<dyn ImageGenerator>,
}

pub type SharedState = Arc<AppState>;

#[derive(Parser, Clone)]
#[command(author, version, about = "CTO Studio - agreement checklist and app generation pipeline")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the Studio server (default)
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the agreement proposal for a project file
    Agreement {
        /// Path to a project data JSON file
        path: String,
    },
    /// Run the pipeline on a project file (CLI mode, no server)
    Run {
        /// Path to a project data JSON file
        path: String,
        /// Mark every critical item complete and consent to every risky choice
        #[arg(long)]
        acknowledge_all: bool,
    },
}

// === OpenAPI Definition ===

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CTO Studio API",
        version = "1.0.0",
        description = "Agreement checklist, consent gate and generation pipeline"
    ),
    paths(
        api::project::get_project,
        api::project::update_project,
        api::agreement::get_agreement,
        api::agreement::evaluate_agreement,
        api::agreement::toggle_critical,
        api::agreement::toggle_optional,
        api::agreement::grant_consent,
        api::pipeline::start_pipeline,
        api::pipeline::cancel_pipeline,
        api::pipeline::get_progress,
        api::pipeline::get_artifact,
        api::pipeline::generate_mockups
    ),
    components(
        schemas(
            api::ApiResponse,
            api::project::ProjectResponse,
            api::project::UpdateProjectRequest,
            api::agreement::AgreementResponse,
            api::agreement::ConsentRequest,
            api::pipeline::ProgressResponse,
            api::pipeline::CancelResponse,
            api::pipeline::ArtifactResponse,
            api::pipeline::MockupResponse
        )
    ),
    tags(
        (name = "project", description = "Upstream project data"),
        (name = "agreement", description = "Checklist and consent"),
        (name = "pipeline", description = "Generation runs and progress"),
        (name = "mockups", description = "Page mockup images")
    )
)]
struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_env() {
    // Runtime-local keys win over the working directory's .env
    let env_path = get_runtime_path().join(".env");
    if env_path.exists() {
        let _ = dotenvy::from_path(&env_path);
    }
    let _ = dotenvy::dotenv();
}

fn read_project(path: &str) -> anyhow::Result<serde_json::Value> {
    let content = std::fs::read_to_string(Path::new(path))
        .with_context(|| format!("Failed to read project file: {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path))
}

/// Complete every critical item and consent to every risky choice
fn acknowledge_all(agreement: &mut Agreement) -> anyhow::Result<()> {
    let pending: Vec<String> = agreement.pending_critical().map(|i| i.id.clone()).collect();
    for id in &pending {
        ConsentGate::toggle_critical(agreement, id)?;
    }
    let risks: Vec<String> = agreement.pending_risks().map(|r| r.id.clone()).collect();
    if !risks.is_empty() {
        ConsentGate::grant_consent(agreement, &risks)?;
    }
    Ok(())
}

fn print_agreement(path: &str) -> anyhow::Result<()> {
    let raw = read_project(path)?;
    let proposal = AgreementEvaluator::evaluate_raw(Some(&raw));
    println!("{}", serde_json::to_string_pretty(&proposal)?);
    Ok(())
}

async fn run_headless(path: &str, acknowledge: bool, config: &StudioConfig) -> anyhow::Result<()> {
    let raw = read_project(path)?;
    let proposal = AgreementEvaluator::evaluate_raw(Some(&raw));
    if proposal.is_empty() {
        bail!("{}", proposal.recommended_action);
    }
    let project: ProjectData = serde_json::from_value(raw)?;

    let mut agreement = proposal.into_agreement();
    if acknowledge {
        acknowledge_all(&mut agreement)?;
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let generator = Arc::new(HttpGenerator::new(config.model.clone()));
    let orchestrator = PipelineOrchestrator::new(generator, store, &config.pipeline);

    let (_, mut rx) = orchestrator.reporter().subscribe();
    let printer = tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            let stage = event.stage.map(|s| s.to_string()).unwrap_or_default();
            println!("[{:>3}%] {:?} {}", event.percent, event.kind, stage);
            if event.kind.is_terminal() {
                break;
            }
        }
    });

    let result = orchestrator.execute(project, &agreement).await;
    // Closing the channel lets the printer drain what is buffered and exit
    drop(orchestrator);
    let _ = printer.await;

    let run = result?;
    if let Some(artifact) = &run.final_artifact {
        println!("{}", serde_json::to_string_pretty(&artifact.summary(run.token))?);
        if !artifact.degraded_stages.is_empty() {
            tracing::warn!(stages = ?artifact.degraded_stages, "Some stages used fallback output");
        }
    }
    Ok(())
}

pub async fn run_server(port: u16, config: StudioConfig) -> anyhow::Result<()> {
    ensure_runtime_dir().await?;
    let db = StudioDb::open()?;
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(&db));

    let session = AgreementSession::load(store.clone())?;
    let generator = Arc::new(HttpGenerator::new(config.model.clone()));
    let reporter = Arc::new(ProgressReporter::new());
    let orchestrator = PipelineOrchestrator::new(generator.clone(), store.clone(), &config.pipeline)
        .with_reporter(reporter.clone());

    let state: SharedState = Arc::new(AppState {
        store,
        session: RwLock::new(session),
        orchestrator: Arc::new(orchestrator),
        reporter,
        images: generator,
    });

    let app = Router::new()
        .nest("/api/v1/project", api::project::project_routes())
        .nest("/api/v1/agreement", api::agreement::agreement_routes())
        .nest("/api/v1/pipeline", api::pipeline::pipeline_routes())
        .nest("/api/v1/mockups", api::pipeline::mockup_routes())
        .route("/api/v1/openapi.json", get(openapi_json))
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Studio server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    load_env();

    let args = Args::parse();
    let config = StudioConfig::load().await;

    match args.command {
        Some(CliCommand::Agreement { path }) => print_agreement(&path),
        Some(CliCommand::Run {
            path,
            acknowledge_all,
        }) => run_headless(&path, acknowledge_all, &config).await,
        Some(CliCommand::Serve { port }) => {
            let port = port.unwrap_or(config.port);
            run_server(port, config).await
        }
        None => {
            let port = config.port;
            run_server(port, config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::agreement::{ChecklistItem, ItemCategory, RiskLevel, RiskyChoice};

    #[test]
    fn test_acknowledge_all_opens_gate() {
        let mut agreement = Agreement::new(
            vec![ChecklistItem::new("core-scope", ItemCategory::Scope, "Scope", "Sign-off")],
            vec![],
            vec![RiskyChoice::new(
                "skip-tests",
                "Skip automated tests",
                RiskLevel::Medium,
                "Regressions ship unnoticed",
            )],
        );
        assert!(!ConsentGate::can_proceed(&agreement));

        acknowledge_all(&mut agreement).unwrap();
        assert!(ConsentGate::can_proceed(&agreement));
        assert!(agreement.timestamp.is_some());
    }

    #[test]
    fn test_openapi_lists_pipeline_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/pipeline/start"));
        assert!(doc.paths.paths.contains_key("/api/v1/agreement/consent"));
    }

    #[test]
    fn test_cli_parses_run_flags() {
        let args = Args::parse_from(["studio", "run", "project.json", "--acknowledge-all"]);
        assert!(matches!(
            args.command,
            Some(CliCommand::Run { acknowledge_all: true, .. })
        ));
    }
}
