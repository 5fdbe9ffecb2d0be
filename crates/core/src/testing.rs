//! Fakes shared by the crate's tests.

use crate::agreement::{Agreement, ChecklistItem, ItemCategory};
use crate::generation::{GenerationError, GenerationRequest, Generator};
use crate::state::{FeaturePriority, FeatureSpec, ProjectData};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::Notify;

pub fn analysis_json() -> Value {
    json!({
        "summary": "Marketplace connecting pet owners with vetted sitters",
        "target_users": ["pet owners", "sitters"],
        "core_features": ["Booking"],
        "constraints": [],
        "complexity": "moderate"
    })
}

/// A conforming output for whichever stage a request's schema names
pub fn valid_output(schema_name: &str) -> Value {
    match schema_name {
        "ContextAnalysis" => analysis_json(),
        "ArchitecturePlan" => json!({
            "frontend": "React", "backend": "Axum", "database": "PostgreSQL", "hosting": "Fly.io",
            "entities": [{ "name": "Booking", "fields": ["id", "starts_at"] }],
            "notes": []
        }),
        "ComponentLibrary" => json!({
            "components": [{ "name": "BookingCard", "purpose": "Shows a booking", "props": ["booking"] }]
        }),
        "PageSet" => json!({
            "pages": [{ "route": "/", "title": "Home", "purpose": "Landing", "components": ["BookingCard"] }]
        }),
        "IntegrationPlan" => json!({
            "integrations": [{
                "service": "Stripe", "purpose": "Payments",
                "env_vars": ["STRIPE_API_KEY"], "modules": ["checkout"]
            }]
        }),
        "AssemblyOutput" => json!({
            "files": [
                { "path": "src/main.tsx", "purpose": "Entry point" },
                { "path": "README.md", "purpose": "Docs" }
            ],
            "config": [{ "key": "STRIPE_API_KEY", "value": "changeme" }],
            "setup_steps": ["npm install"],
            "readme": "PetPal"
        }),
        _ => json!("free text"),
    }
}

pub fn sample_project() -> ProjectData {
    ProjectData {
        name: "PetPal".to_string(),
        description: "Book trusted pet sitters".to_string(),
        features: vec![FeatureSpec {
            name: "Booking".to_string(),
            priority: FeaturePriority::MustHave,
            integrations: vec!["Stripe".to_string()],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Agreement whose gate is open
pub fn open_agreement() -> Agreement {
    let mut item = ChecklistItem::new("core-scope", ItemCategory::Scope, "Launch scope", "Sign-off");
    item.is_complete = true;
    Agreement::new(vec![item], vec![], vec![])
}

/// Replays a fixed script of responses, then fails
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<Value, GenerationError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<Value, GenerationError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn invoke(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(GenerationError::Transport("script exhausted".to_string())))
    }
}

/// Every call fails
#[derive(Default)]
pub struct FailingGenerator {
    calls: AtomicUsize,
}

impl FailingGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for FailingGenerator {
    async fn invoke(&self, _request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(GenerationError::Transport("connection refused".to_string()))
    }
}

/// Answers every stage correctly; the first call for `gate_on` blocks until released
pub struct GatedGenerator {
    gate_on: String,
    armed: AtomicBool,
    pub entered: Notify,
    pub release: Notify,
    schemas: Mutex<Vec<String>>,
}

impl GatedGenerator {
    pub fn new(gate_on: &str) -> Self {
        Self {
            gate_on: gate_on.to_string(),
            armed: AtomicBool::new(true),
            entered: Notify::new(),
            release: Notify::new(),
            schemas: Mutex::new(Vec::new()),
        }
    }

    /// Never blocks
    pub fn open() -> Self {
        let generator = Self::new("");
        generator.armed.store(false, Ordering::SeqCst);
        generator
    }

    /// Schema names requested, in call order
    pub fn schemas(&self) -> Vec<String> {
        self.schemas.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for GatedGenerator {
    async fn invoke(&self, request: &GenerationRequest) -> Result<Value, GenerationError> {
        self.schemas.lock().unwrap().push(request.schema_name.clone());
        if request.schema_name == self.gate_on && self.armed.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        Ok(valid_output(&request.schema_name))
    }
}
