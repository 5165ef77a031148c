// Community sharing: users publish solutions, vote on them, bookmark them
// and discuss them in threaded comments.

pub mod handlers;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::report::AnalysisReport;
use crate::errors::AppError;
use crate::models::analysis::{ErrorAnalysis, Solution};
use crate::models::community::{
    Comment, NewSharedSolution, SharedSolutionQuery, SolutionSort, ViewerState,
};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;
const MAX_TITLE_LEN: usize = 255;
const MAX_TAGS: usize = 10;
const MAX_COMMENT_LEN: usize = 5000;

/// Body of POST /api/community/solutions.
///
/// When `analysis_id` points at a completed analysis, missing fields are
/// filled from its stored answer.
#[derive(Debug, Default, Deserialize)]
pub struct SharePayload {
    pub author_id: Option<Uuid>,
    pub analysis_id: Option<Uuid>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub solution_steps: Option<Vec<String>>,
    pub error_type: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub problem_description: Option<String>,
    pub difficulty: Option<String>,
    pub estimated_time: Option<String>,
    pub success_rate: Option<f64>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|c| c == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}

/// Parses a success rate given as a percentage, such as `"85%"` or `"85"`.
fn parse_rate(text: &str) -> Option<f64> {
    text.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|r| (0.0..=100.0).contains(r))
}

impl SharePayload {
    /// Validates the payload, filling gaps from `source` when sharing the
    /// answer of an analysis.
    pub fn into_new_shared_solution(
        self,
        author_id: Uuid,
        source: Option<(&ErrorAnalysis, &Solution)>,
    ) -> Result<NewSharedSolution, AppError> {
        let first_fix = source
            .and_then(|(_, solution)| {
                serde_json::from_value::<AnalysisReport>(solution.report.clone()).ok()
            })
            .and_then(|report| report.solutions.into_iter().next());

        let title = non_blank(self.title)
            .or_else(|| source.map(|(_, s)| s.title.clone()))
            .ok_or_else(|| AppError::Validation("title is required".to_string()))?;
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "title must be at most {MAX_TITLE_LEN} characters"
            )));
        }

        let description = non_blank(self.description)
            .or_else(|| source.map(|(_, s)| s.explanation.trim().to_string()))
            .filter(|d| !d.is_empty())
            .ok_or_else(|| AppError::Validation("description is required".to_string()))?;

        let solution_steps = self
            .solution_steps
            .map(clean_list)
            .filter(|steps| !steps.is_empty())
            .or_else(|| first_fix.as_ref().map(|f| clean_list(f.steps.clone())))
            .filter(|steps| !steps.is_empty())
            .ok_or_else(|| {
                AppError::Validation("solution_steps must list at least one step".to_string())
            })?;

        let tags = clean_list(self.tags.unwrap_or_default());
        if tags.len() > MAX_TAGS {
            return Err(AppError::Validation(format!(
                "at most {MAX_TAGS} tags are allowed"
            )));
        }

        let success_rate = match self.success_rate {
            Some(rate) if (0.0..=100.0).contains(&rate) => Some(rate),
            Some(rate) => {
                return Err(AppError::Validation(format!(
                    "success_rate must be between 0 and 100 (got {rate})"
                )))
            }
            None => first_fix
                .as_ref()
                .and_then(|f| f.success_rate.as_deref())
                .and_then(parse_rate),
        };

        let analysis = source.map(|(a, _)| a);
        Ok(NewSharedSolution {
            author_id,
            analysis_id: analysis.map(|a| a.id),
            title,
            description,
            error_type: non_blank(self.error_type)
                .or_else(|| analysis.and_then(|a| a.error_type.clone())),
            category: non_blank(self.category)
                .or_else(|| analysis.and_then(|a| a.category.clone())),
            tags,
            problem_description: non_blank(self.problem_description)
                .or_else(|| analysis.and_then(|a| non_blank(Some(a.context.clone())))),
            solution_steps,
            difficulty: non_blank(self.difficulty)
                .or_else(|| first_fix.as_ref().and_then(|f| f.difficulty.clone())),
            estimated_time: non_blank(self.estimated_time)
                .or_else(|| first_fix.as_ref().and_then(|f| f.estimated_time.clone())),
            success_rate,
        })
    }
}

/// Query string of GET /api/community/solutions.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub category: Option<String>,
    pub error_type: Option<String>,
    pub difficulty: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    /// Adds this user's vote and bookmark to each item.
    pub user_id: Option<Uuid>,
}

impl ListParams {
    pub fn to_query(&self) -> Result<SharedSolutionQuery, AppError> {
        let page = self.page.unwrap_or(1);
        if page < 1 {
            return Err(AppError::Validation(format!("page must be at least 1 (got {page})")));
        }
        let sort = match self.sort_by.as_deref() {
            Some(raw) => SolutionSort::parse(raw).ok_or_else(|| {
                AppError::Validation(format!(
                    "sort_by must be one of recent, popular, top (got '{raw}')"
                ))
            })?,
            None => SolutionSort::default(),
        };

        Ok(SharedSolutionQuery {
            category: non_blank(self.category.clone()),
            error_type: non_blank(self.error_type.clone()),
            difficulty: non_blank(self.difficulty.clone()),
            search: non_blank(self.search.clone()),
            sort,
            page,
            per_page: self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64, total: i64) -> Self {
        let pages = (total + per_page - 1) / per_page;
        Self {
            page,
            per_page,
            total,
            pages,
            has_next: page < pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserVote {
    pub voted: bool,
    pub is_upvote: Option<bool>,
}

impl From<&ViewerState> for UserVote {
    fn from(state: &ViewerState) -> Self {
        Self {
            voted: state.vote.is_some(),
            is_upvote: state.vote,
        }
    }
}

pub fn validate_comment(content: Option<String>) -> Result<String, AppError> {
    let content = non_blank(content)
        .ok_or_else(|| AppError::Validation("content is required".to_string()))?;
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::Validation(format!(
            "content must be at most {MAX_COMMENT_LEN} characters"
        )));
    }
    Ok(content)
}

/// A comment with its replies, recursively.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentThread>,
}

/// Arranges a flat, oldest-first list into threads: newest conversations
/// first, replies in the order they were written.
pub fn build_threads(comments: Vec<Comment>) -> Vec<CommentThread> {
    let mut children: HashMap<Option<Uuid>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        children.entry(comment.parent_id).or_default().push(comment);
    }

    fn attach(
        comment: Comment,
        children: &mut HashMap<Option<Uuid>, Vec<Comment>>,
    ) -> CommentThread {
        let replies = children
            .remove(&Some(comment.id))
            .unwrap_or_default()
            .into_iter()
            .map(|reply| attach(reply, children))
            .collect();
        CommentThread { comment, replies }
    }

    let roots = children.remove(&None).unwrap_or_default();
    roots
        .into_iter()
        .rev()
        .map(|root| attach(root, &mut children))
        .collect()
}
