use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Completed => "completed",
            AnalysisStatus::Failed => "failed",
        }
    }
}

/// One row per accepted analysis request. The decoded image is stored inline
/// but never serialized back to clients.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ErrorAnalysis {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub context: String,
    pub image_mime: String,
    pub image_size: i32,
    #[serde(skip_serializing, default)]
    pub image_data: Vec<u8>,
    pub status: String,
    pub failure_reason: Option<String>,
    pub error_type: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Solution {
    pub id: Uuid,
    pub analysis_id: Uuid,
    pub title: String,
    pub explanation: String,
    pub report: Value,
    pub structured: bool,
    pub created_at: DateTime<Utc>,
}

/// Parameters for recording an incoming analysis request.
pub struct NewAnalysis<'a> {
    pub user_id: Option<Uuid>,
    pub context: &'a str,
    pub image_mime: &'a str,
    pub image: &'a [u8],
}

/// The model's answer, flattened for persistence. The summary fields are
/// copied onto the analysis row when it completes.
#[derive(Debug, Clone)]
pub struct NewSolution {
    pub title: String,
    pub explanation: String,
    pub report: Value,
    pub structured: bool,
    pub error_type: Option<String>,
    pub category: Option<String>,
    pub severity: Option<String>,
    pub confidence: Option<f64>,
}
