use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::ApiJson;
use crate::feedback::analytics::{summarize, AnalyticsReport};
use crate::models::feedback::NewFeedback;
use crate::state::AppState;
use crate::store::POPULAR_SOLUTIONS_LIMIT;

#[derive(Debug, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub solution_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    /// Which fix option inside the report the feedback is about.
    pub fix_id: Option<i32>,
    pub rating: Option<i64>,
    pub solved: Option<bool>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitFeedbackResponse {
    pub status: &'static str,
    pub message: &'static str,
    pub feedback_id: Uuid,
}

/// POST /api/submit-feedback
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<SubmitFeedbackResponse>), AppError> {
    let solution_id = request
        .solution_id
        .ok_or_else(|| AppError::Validation("solution_id is required".to_string()))?;

    let rating = match request.rating {
        Some(r) if (1..=5).contains(&r) => Some(r as i16),
        Some(r) => {
            return Err(AppError::Validation(format!(
                "rating must be between 1 and 5 (got {r})"
            )))
        }
        None => None,
    };

    state
        .store
        .get_solution(solution_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Solution {solution_id} not found")))?;

    let feedback = state
        .store
        .create_feedback(&NewFeedback {
            solution_id,
            user_id: request.user_id,
            fix_id: request.fix_id,
            rating,
            solved: request.solved,
            comment: request.comment.unwrap_or_default().trim().to_string(),
        })
        .await?;

    info!("Feedback {} submitted for solution {solution_id}", feedback.id);

    Ok((
        StatusCode::CREATED,
        Json(SubmitFeedbackResponse {
            status: "success",
            message: "Thank you for your feedback!",
            feedback_id: feedback.id,
        }),
    ))
}

/// GET /api/analytics
pub async fn handle_analytics(
    State(state): State<AppState>,
) -> Result<Json<AnalyticsReport>, AppError> {
    let totals = state.store.feedback_totals(POPULAR_SOLUTIONS_LIMIT).await?;
    Ok(Json(summarize(totals)))
}
