//! Shared helpers for handler tests: a router over an in-memory store and a
//! scripted analyzer, plus request/response plumbing.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
    Router,
};
use base64::{engine::general_purpose, Engine as _};
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::analysis::analyzer::Analyzer;
use crate::analysis::image::DecodedImage;
use crate::analysis::report::{parse_analysis_text, AnalysisOutcome};
use crate::llm_client::LlmError;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::memory::MemoryStore;

pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R',
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00,
];

/// A structured model answer with one fix.
pub const ANALYSIS_JSON: &str = r#"{
    "error_detected": "Missing DLL",
    "category": "Software",
    "estimated_impact": "The app will not start",
    "solutions": [{
        "title": "Reinstall the redistributable",
        "description": "Restores the missing library",
        "steps": ["Download the installer", "Run it", "Reboot"],
        "difficulty": "Easy",
        "success_rate": "90%"
    }]
}"#;

const TEST_DEADLINE: Duration = Duration::from_secs(150);

type ErrorFactory = Box<dyn Fn() -> LlmError + Send + Sync>;

/// Analyzer that replays a canned model answer or a canned failure.
pub struct ScriptedAnalyzer {
    answer: Option<String>,
    error: Option<ErrorFactory>,
    delay: Option<Duration>,
}

impl ScriptedAnalyzer {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Some(text.to_string()),
            error: None,
            delay: None,
        }
    }

    pub fn failing(make_error: impl Fn() -> LlmError + Send + Sync + 'static) -> Self {
        Self {
            answer: None,
            error: Some(Box::new(make_error)),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Analyzer for ScriptedAnalyzer {
    async fn analyze(
        &self,
        _image: &DecodedImage,
        _context: &str,
    ) -> Result<AnalysisOutcome, LlmError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match (&self.answer, &self.error) {
            (_, Some(make_error)) => Err(make_error()),
            (Some(text), None) => Ok(parse_analysis_text(text)),
            (None, None) => Err(LlmError::EmptyContent),
        }
    }
}

pub fn app(store: Arc<MemoryStore>, analyzer: ScriptedAnalyzer) -> Router {
    build_router(AppState {
        store,
        analyzer: Arc::new(analyzer),
        analysis_deadline: TEST_DEADLINE,
    })
}

pub fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn read_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn png_data_uri() -> String {
    format!("data:image/png;base64,{}", general_purpose::STANDARD.encode(PNG_BYTES))
}

/// Creates a user through the API and returns its id.
pub async fn create_user(app: &Router, username: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/users",
            &json!({ "username": username, "email": format!("{username}@example.com") }),
        ))
        .await
        .unwrap();
    let body = read_json(response).await;
    body["id"].as_str().unwrap().to_string()
}
