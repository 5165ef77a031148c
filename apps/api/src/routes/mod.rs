pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::community::handlers as community;
use crate::feedback::handlers as feedback;
use crate::state::AppState;
use crate::users::handlers as users;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Analysis API
        .route("/api/analyze-error", post(analysis::handle_analyze_error))
        .route("/api/analyses/:id", get(analysis::handle_get_analysis))
        .route("/api/analyses/:id/image", get(analysis::handle_get_analysis_image))
        // Feedback API
        .route("/api/submit-feedback", post(feedback::handle_submit_feedback))
        .route("/api/analytics", get(feedback::handle_analytics))
        // User API
        .route(
            "/api/users",
            get(users::handle_list_users).post(users::handle_create_user),
        )
        .route(
            "/api/users/:id",
            get(users::handle_get_user)
                .put(users::handle_update_user)
                .delete(users::handle_delete_user),
        )
        // Community API
        .route(
            "/api/community/solutions",
            get(community::handle_list_solutions).post(community::handle_share_solution),
        )
        .route("/api/community/solutions/:id", get(community::handle_get_solution))
        .route(
            "/api/community/solutions/:id/vote",
            post(community::handle_vote_solution),
        )
        .route(
            "/api/community/solutions/:id/bookmark",
            post(community::handle_bookmark_solution),
        )
        .route(
            "/api/community/solutions/:id/comments",
            get(community::handle_list_comments).post(community::handle_add_comment),
        )
        .with_state(state)
}
