//! Axum route handlers for the Community API.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::community::{
    build_threads, validate_comment, CommentThread, ListParams, Pagination, SharePayload,
    UserVote,
};
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::community::{NewComment, SharedSolution, VoteAction};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// A shared solution, plus the viewer's own vote and bookmark when a
/// `user_id` was given.
#[derive(Debug, Serialize)]
pub struct SharedSolutionView {
    #[serde(flatten)]
    pub solution: SharedSolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_vote: Option<UserVote>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_bookmarked: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub solutions: Vec<SharedSolutionView>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub message: &'static str,
    pub solution: SharedSolution,
}

#[derive(Debug, Deserialize)]
pub struct ViewerParams {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct VoteRequest {
    pub user_id: Option<Uuid>,
    #[serde(default = "default_upvote")]
    pub is_upvote: bool,
}

fn default_upvote() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct VoteResponse {
    pub message: String,
    pub action: VoteAction,
    pub upvote_count: i64,
    pub downvote_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct BookmarkRequest {
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct BookmarkResponse {
    pub message: &'static str,
    pub is_bookmarked: bool,
    pub bookmark_count: i64,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub user_id: Option<Uuid>,
    pub content: Option<String>,
    pub parent_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct CommentsResponse {
    pub comments: Vec<CommentThread>,
}

fn require_user(user_id: Option<Uuid>) -> Result<Uuid, AppError> {
    user_id.ok_or_else(|| AppError::Validation("user_id is required".to_string()))
}

fn solution_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Shared solution {id} not found"))
}

async fn with_viewer(
    state: &AppState,
    solution: SharedSolution,
    viewer: Option<Uuid>,
) -> Result<SharedSolutionView, AppError> {
    let (user_vote, is_bookmarked) = match viewer {
        Some(user_id) => {
            let viewer = state.store.viewer_state(solution.id, user_id).await?;
            (Some(UserVote::from(&viewer)), Some(viewer.is_bookmarked))
        }
        None => (None, None),
    };
    Ok(SharedSolutionView {
        solution,
        user_vote,
        is_bookmarked,
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/community/solutions
pub async fn handle_list_solutions(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ListParams>,
) -> Result<Json<ListResponse>, AppError> {
    let query = params.to_query()?;
    let page = state.store.list_shared_solutions(&query).await?;

    let mut solutions = Vec::with_capacity(page.solutions.len());
    for solution in page.solutions {
        solutions.push(with_viewer(&state, solution, params.user_id).await?);
    }

    Ok(Json(ListResponse {
        solutions,
        pagination: Pagination::new(query.page, query.per_page, page.total),
    }))
}

/// POST /api/community/solutions
///
/// Publishes a solution. With `analysis_id`, the analysis must be completed
/// and belong to the author; its answer fills any field left out.
pub async fn handle_share_solution(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SharePayload>,
) -> Result<(StatusCode, Json<ShareResponse>), AppError> {
    // 1. Resolve the author
    let author_id = require_user(payload.author_id)?;
    state
        .store
        .get_user(author_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {author_id} not found")))?;

    // 2. Resolve the analysis being shared, if any
    let source = match payload.analysis_id {
        Some(analysis_id) => {
            let analysis = state
                .store
                .get_analysis(analysis_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Analysis {analysis_id} not found")))?;
            if analysis.user_id.is_some_and(|owner| owner != author_id) {
                return Err(AppError::Validation(format!(
                    "Analysis {analysis_id} belongs to another user"
                )));
            }
            let solution = state
                .store
                .get_solution_for_analysis(analysis_id)
                .await?
                .ok_or_else(|| {
                    AppError::Validation(format!(
                        "Analysis {analysis_id} has no completed solution to share"
                    ))
                })?;
            Some((analysis, solution))
        }
        None => None,
    };

    // 3. Validate and store
    let new_solution = payload
        .into_new_shared_solution(author_id, source.as_ref().map(|(a, s)| (a, s)))?;
    let solution = state.store.share_solution(&new_solution).await?;
    info!("User {author_id} shared solution {}", solution.id);

    Ok((
        StatusCode::CREATED,
        Json(ShareResponse {
            message: "Solution shared successfully",
            solution,
        }),
    ))
}

/// GET /api/community/solutions/:id
///
/// Counts as a view.
pub async fn handle_get_solution(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiQuery(params): ApiQuery<ViewerParams>,
) -> Result<Json<SharedSolutionView>, AppError> {
    let solution = state
        .store
        .record_solution_view(id)
        .await?
        .ok_or_else(|| solution_not_found(id))?;
    Ok(Json(with_viewer(&state, solution, params.user_id).await?))
}

/// POST /api/community/solutions/:id/vote
///
/// Repeating the same vote withdraws it; the opposite vote replaces it.
pub async fn handle_vote_solution(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<VoteRequest>,
) -> Result<Json<VoteResponse>, AppError> {
    let user_id = require_user(request.user_id)?;
    let outcome = state
        .store
        .vote_solution(id, user_id, request.is_upvote)
        .await?;

    let kind = if request.is_upvote { "Upvote" } else { "Downvote" };
    let message = match outcome.action {
        VoteAction::Recorded => format!("{kind} recorded"),
        VoteAction::Changed => format!("Vote changed to {}", kind.to_lowercase()),
        VoteAction::Removed => format!("{kind} removed"),
    };

    Ok(Json(VoteResponse {
        message,
        action: outcome.action,
        upvote_count: outcome.upvote_count,
        downvote_count: outcome.downvote_count,
    }))
}

/// POST /api/community/solutions/:id/bookmark
///
/// Toggles the user's bookmark.
pub async fn handle_bookmark_solution(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<BookmarkRequest>,
) -> Result<Json<BookmarkResponse>, AppError> {
    let user_id = require_user(request.user_id)?;
    let outcome = state.store.toggle_bookmark(id, user_id).await?;

    Ok(Json(BookmarkResponse {
        message: if outcome.is_bookmarked {
            "Solution bookmarked"
        } else {
            "Bookmark removed"
        },
        is_bookmarked: outcome.is_bookmarked,
        bookmark_count: outcome.bookmark_count,
    }))
}

/// GET /api/community/solutions/:id/comments
pub async fn handle_list_comments(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<CommentsResponse>, AppError> {
    state
        .store
        .get_shared_solution(id)
        .await?
        .ok_or_else(|| solution_not_found(id))?;
    let comments = state.store.list_comments(id).await?;
    Ok(Json(CommentsResponse {
        comments: build_threads(comments),
    }))
}

/// POST /api/community/solutions/:id/comments
pub async fn handle_add_comment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentThread>), AppError> {
    let user_id = require_user(request.user_id)?;
    let content = validate_comment(request.content)?;

    if let Some(parent_id) = request.parent_id {
        let parent = state
            .store
            .get_comment(parent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Comment {parent_id} not found")))?;
        if parent.solution_id != id {
            return Err(AppError::Validation(format!(
                "Comment {parent_id} belongs to a different solution"
            )));
        }
    }

    let comment = state
        .store
        .add_comment(&NewComment {
            solution_id: id,
            author_id: user_id,
            parent_id: request.parent_id,
            content,
        })
        .await?;
    info!("User {user_id} commented on solution {id}");

    Ok((
        StatusCode::CREATED,
        Json(CommentThread {
            comment,
            replies: Vec::new(),
        }),
    ))
}
