//! Persistence layer. Handlers only see the `Store` trait; `main` injects a
//! `PgStore` and the tests inject a `MemoryStore`.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::analysis::{ErrorAnalysis, NewAnalysis, NewSolution, Solution};
use crate::models::community::{
    BookmarkOutcome, Comment, NewComment, NewSharedSolution, SharedSolution,
    SharedSolutionPage, SharedSolutionQuery, ViewerState, VoteOutcome,
};
use crate::models::feedback::{Feedback, FeedbackTotals, NewFeedback};
use crate::models::user::{NewUser, User, UserChanges};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

/// How many solutions the analytics endpoint ranks.
pub const POPULAR_SOLUTIONS_LIMIT: i64 = 5;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique column already holds this value.
    #[error("{0}")]
    Duplicate(String),

    /// A foreign key points at a row that does not exist.
    #[error("{0}")]
    MissingReference(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError>;

    /// Returns `None` when no user has this id.
    async fn update_user(&self, id: Uuid, changes: &UserChanges)
        -> Result<Option<User>, StoreError>;

    /// Returns `false` when no user has this id. Cascades to the user's
    /// feedback and community content, and detaches their analyses.
    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Records an incoming request with status `pending`.
    async fn create_analysis(&self, analysis: NewAnalysis<'_>)
        -> Result<ErrorAnalysis, StoreError>;

    /// Atomically stores the solution, marks the analysis `completed` and
    /// bumps the owner's analysis count.
    async fn complete_analysis(
        &self,
        analysis_id: Uuid,
        solution: &NewSolution,
    ) -> Result<Solution, StoreError>;

    async fn fail_analysis(&self, analysis_id: Uuid, reason: &str) -> Result<(), StoreError>;

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ErrorAnalysis>, StoreError>;

    async fn get_solution(&self, id: Uuid) -> Result<Option<Solution>, StoreError>;

    async fn get_solution_for_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Solution>, StoreError>;

    async fn create_feedback(&self, feedback: &NewFeedback) -> Result<Feedback, StoreError>;

    async fn feedback_totals(&self, popular_limit: i64) -> Result<FeedbackTotals, StoreError>;

    // ── Community ──────────────────────────────────────────────────────────

    /// Publishes a solution and credits the author.
    async fn share_solution(
        &self,
        solution: &NewSharedSolution,
    ) -> Result<SharedSolution, StoreError>;

    async fn list_shared_solutions(
        &self,
        query: &SharedSolutionQuery,
    ) -> Result<SharedSolutionPage, StoreError>;

    async fn get_shared_solution(&self, id: Uuid) -> Result<Option<SharedSolution>, StoreError>;

    /// Counts a view and returns the solution, or `None` if it does not exist.
    async fn record_solution_view(&self, id: Uuid)
        -> Result<Option<SharedSolution>, StoreError>;

    async fn viewer_state(&self, solution_id: Uuid, user_id: Uuid)
        -> Result<ViewerState, StoreError>;

    /// Casts, switches or (when repeated) withdraws a vote, adjusting the
    /// author's reputation in the same transaction.
    async fn vote_solution(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
        is_upvote: bool,
    ) -> Result<VoteOutcome, StoreError>;

    async fn toggle_bookmark(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
    ) -> Result<BookmarkOutcome, StoreError>;

    /// All comments on a solution, oldest first.
    async fn list_comments(&self, solution_id: Uuid) -> Result<Vec<Comment>, StoreError>;

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError>;

    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, StoreError>;
}
