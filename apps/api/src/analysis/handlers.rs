//! Axum route handlers for the Analysis API.

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::analysis::image::decode_image_payload;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath};
use crate::models::analysis::{AnalysisStatus, ErrorAnalysis, NewAnalysis, Solution};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeErrorRequest {
    pub image: Option<String>,
    pub context: Option<String>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeErrorResponse {
    pub analysis_id: Uuid,
    pub status: AnalysisStatus,
    pub solution: Solution,
}

#[derive(Debug, Serialize)]
pub struct AnalysisDetailResponse {
    pub analysis: ErrorAnalysis,
    pub solution: Option<Solution>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/analyze-error
///
/// Decodes the screenshot, records the request, asks the model and stores
/// its answer. Any failure after the row is written leaves it `failed`.
pub async fn handle_analyze_error(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AnalyzeErrorRequest>,
) -> Result<Json<AnalyzeErrorResponse>, AppError> {
    // 1. Validate and decode
    let raw_image = request
        .image
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Validation("No image provided".to_string()))?;
    let context = request.context.unwrap_or_default();

    let image = decode_image_payload(raw_image)?;

    // 2. Record the request
    if let Some(user_id) = request.user_id {
        state
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;
    }

    let analysis = state
        .store
        .create_analysis(NewAnalysis {
            user_id: request.user_id,
            context: &context,
            image_mime: image.mime_type,
            image: &image.bytes,
        })
        .await?;
    info!(
        "Analysis {} received: {} bytes of {}, {} chars of context",
        analysis.id,
        image.bytes.len(),
        image.mime_type,
        context.chars().count()
    );

    // 3. Ask the model, bounded by the handler deadline
    let result = tokio::time::timeout(
        state.analysis_deadline,
        state.analyzer.analyze(&image, &context),
    )
    .await;

    let outcome = match result {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => return Err(record_failure(&state, analysis.id, AppError::from(e)).await),
        Err(_) => {
            let err = AppError::UpstreamTimeout(format!(
                "no answer within {}s",
                state.analysis_deadline.as_secs()
            ));
            return Err(record_failure(&state, analysis.id, err).await);
        }
    };

    // 4. Persist the answer. Failures here are ours, not the upstream's.
    let saved = match outcome.to_new_solution() {
        Ok(new_solution) => state
            .store
            .complete_analysis(analysis.id, &new_solution)
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(format!("report could not be serialized: {e}")),
    };
    let solution = match saved {
        Ok(solution) => solution,
        Err(reason) => {
            error!("Failed to store solution for analysis {}: {reason}", analysis.id);
            let err = AppError::AnalysisNotSaved(analysis.id);
            return Err(record_failure(&state, analysis.id, err).await);
        }
    };

    info!(
        "Analysis {} completed (structured: {})",
        analysis.id, solution.structured
    );

    Ok(Json(AnalyzeErrorResponse {
        analysis_id: analysis.id,
        status: AnalysisStatus::Completed,
        solution,
    }))
}

/// Marks the analysis failed so the attempt stays auditable, then hands the
/// original error back. A failure to mark is logged, not returned.
async fn record_failure(state: &AppState, analysis_id: Uuid, err: AppError) -> AppError {
    warn!("Analysis {analysis_id} failed: {err}");
    if let Err(mark_err) = state
        .store
        .fail_analysis(analysis_id, &err.to_string())
        .await
    {
        error!("Could not mark analysis {analysis_id} as failed: {mark_err}");
    }
    err
}

async fn load_analysis(state: &AppState, analysis_id: Uuid) -> Result<ErrorAnalysis, AppError> {
    state
        .store
        .get_analysis(analysis_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Analysis {analysis_id} not found")))
}

/// GET /api/analyses/:id
pub async fn handle_get_analysis(
    State(state): State<AppState>,
    ApiPath(analysis_id): ApiPath<Uuid>,
) -> Result<Json<AnalysisDetailResponse>, AppError> {
    let analysis = load_analysis(&state, analysis_id).await?;
    let solution = state.store.get_solution_for_analysis(analysis_id).await?;

    Ok(Json(AnalysisDetailResponse { analysis, solution }))
}

/// GET /api/analyses/:id/image
///
/// The screenshot exactly as it was submitted, for auditing an answer.
pub async fn handle_get_analysis_image(
    State(state): State<AppState>,
    ApiPath(analysis_id): ApiPath<Uuid>,
) -> Result<Response, AppError> {
    let analysis = load_analysis(&state, analysis_id).await?;
    Ok(([(header::CONTENT_TYPE, analysis.image_mime)], analysis.image_data).into_response())
}
