use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::user::User;

/// Reputation awarded to an author for each community action.
pub mod reputation {
    pub const SHARE: i32 = 10;
    pub const UPVOTE: i32 = 5;
    pub const DOWNVOTE: i32 = -2;
    pub const COMMENT: i32 = 2;
}

/// Net change to an author's reputation when a vote moves from `before` to
/// `after` (`None` = no vote, `Some(true)` = upvote).
pub fn vote_reputation_delta(before: Option<bool>, after: Option<bool>) -> i32 {
    fn worth(vote: Option<bool>) -> i32 {
        match vote {
            Some(true) => reputation::UPVOTE,
            Some(false) => reputation::DOWNVOTE,
            None => 0,
        }
    }
    worth(after) - worth(before)
}

/// Public profile shown next to community content. Selected from `users`
/// under `author_*` aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthorSummary {
    #[sqlx(rename = "author_id")]
    pub id: Uuid,
    #[sqlx(rename = "author_username")]
    pub username: String,
    #[sqlx(rename = "author_display_name")]
    pub display_name: Option<String>,
    #[sqlx(rename = "author_avatar_url")]
    pub avatar_url: Option<String>,
    #[sqlx(rename = "author_reputation")]
    pub reputation: i32,
}

impl From<&User> for AuthorSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar_url: user.avatar_url.clone(),
            reputation: user.reputation,
        }
    }
}

/// A solution published to the community. Vote, comment and bookmark counts
/// are computed when the row is read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SharedSolution {
    pub id: Uuid,
    pub analysis_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub error_type: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub problem_description: Option<String>,
    pub solution_steps: Vec<String>,
    pub difficulty: Option<String>,
    pub estimated_time: Option<String>,
    pub success_rate: Option<f64>,
    pub view_count: i32,
    pub upvote_count: i64,
    pub downvote_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
    #[sqlx(flatten)]
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewSharedSolution {
    pub author_id: Uuid,
    pub analysis_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub error_type: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub problem_description: Option<String>,
    pub solution_steps: Vec<String>,
    pub difficulty: Option<String>,
    pub estimated_time: Option<String>,
    pub success_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolutionSort {
    /// Newest first.
    #[default]
    Recent,
    /// Most viewed first.
    Popular,
    /// Most upvoted first.
    Top,
}

impl SolutionSort {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recent" => Some(SolutionSort::Recent),
            "popular" => Some(SolutionSort::Popular),
            "top" => Some(SolutionSort::Top),
            _ => None,
        }
    }

    /// Column the listing is ordered by, descending.
    pub fn column(&self) -> &'static str {
        match self {
            SolutionSort::Recent => "created_at",
            SolutionSort::Popular => "view_count",
            SolutionSort::Top => "upvote_count",
        }
    }
}

/// Filters and paging for the community listing. `page` starts at 1.
#[derive(Debug, Clone, Default)]
pub struct SharedSolutionQuery {
    pub category: Option<String>,
    pub error_type: Option<String>,
    pub difficulty: Option<String>,
    /// Case-insensitive substring of title, description or problem.
    pub search: Option<String>,
    pub sort: SolutionSort,
    pub page: i64,
    pub per_page: i64,
}

impl SharedSolutionQuery {
    pub fn offset(&self) -> i64 {
        (self.page - 1).max(0) * self.per_page
    }
}

#[derive(Debug, Clone)]
pub struct SharedSolutionPage {
    pub solutions: Vec<SharedSolution>,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction {
    Recorded,
    Changed,
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteOutcome {
    pub action: VoteAction,
    pub upvote_count: i64,
    pub downvote_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookmarkOutcome {
    pub is_bookmarked: bool,
    pub bookmark_count: i64,
}

/// How one user has interacted with a shared solution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewerState {
    /// `Some(true)` for an upvote, `Some(false)` for a downvote.
    pub vote: Option<bool>,
    pub is_bookmarked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: Uuid,
    pub solution_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    #[sqlx(flatten)]
    pub author: AuthorSummary,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub solution_id: Uuid,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
}
