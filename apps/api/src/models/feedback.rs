use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Feedback {
    pub id: Uuid,
    pub solution_id: Uuid,
    pub user_id: Option<Uuid>,
    pub fix_id: Option<i32>,
    pub rating: Option<i16>,
    pub solved: Option<bool>,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub solution_id: Uuid,
    pub user_id: Option<Uuid>,
    pub fix_id: Option<i32>,
    pub rating: Option<i16>,
    pub solved: Option<bool>,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SolutionCount {
    pub solution_id: Uuid,
    pub count: i64,
}

/// Raw aggregates over the feedback table, before rounding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackTotals {
    pub total_analyses: i64,
    pub total_feedback: i64,
    pub rating_sum: i64,
    pub rating_count: i64,
    pub solved_count: i64,
    pub popular: Vec<SolutionCount>,
}
