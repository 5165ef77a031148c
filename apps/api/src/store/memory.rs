//! In-process `Store` used by the handler tests. Mirrors the constraints the
//! PostgreSQL schema enforces (unique columns, foreign keys, delete policy).

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::analysis::{
    AnalysisStatus, ErrorAnalysis, NewAnalysis, NewSolution, Solution,
};
use crate::models::community::{
    reputation, vote_reputation_delta, AuthorSummary, BookmarkOutcome, Comment, NewComment,
    NewSharedSolution, SharedSolution, SharedSolutionPage, SharedSolutionQuery, SolutionSort,
    ViewerState, VoteAction, VoteOutcome,
};
use crate::models::feedback::{Feedback, FeedbackTotals, NewFeedback, SolutionCount};
use crate::models::user::{NewUser, User, UserChanges};
use crate::store::{Store, StoreError};

struct VoteRow {
    solution_id: Uuid,
    user_id: Uuid,
    is_upvote: bool,
}

struct BookmarkRow {
    solution_id: Uuid,
    user_id: Uuid,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    analyses: Vec<ErrorAnalysis>,
    solutions: Vec<Solution>,
    feedback: Vec<Feedback>,
    // Stored with stale counts and author; `present` fills them in on read.
    shared: Vec<SharedSolution>,
    votes: Vec<VoteRow>,
    bookmarks: Vec<BookmarkRow>,
    comments: Vec<Comment>,
}

impl Tables {
    fn author(&self, id: Uuid) -> Option<AuthorSummary> {
        self.users.iter().find(|u| u.id == id).map(AuthorSummary::from)
    }

    fn present(&self, stored: &SharedSolution) -> SharedSolution {
        let id = stored.id;
        let count = |up: bool| {
            self.votes
                .iter()
                .filter(|v| v.solution_id == id && v.is_upvote == up)
                .count() as i64
        };
        SharedSolution {
            upvote_count: count(true),
            downvote_count: count(false),
            comment_count: self.comments.iter().filter(|c| c.solution_id == id).count() as i64,
            bookmark_count: self.bookmarks.iter().filter(|b| b.solution_id == id).count() as i64,
            author: self.author(stored.author.id).unwrap_or_else(|| stored.author.clone()),
            ..stored.clone()
        }
    }

    fn present_comment(&self, stored: &Comment) -> Comment {
        Comment {
            author: self.author(stored.author.id).unwrap_or_else(|| stored.author.clone()),
            ..stored.clone()
        }
    }

    fn adjust_reputation(&mut self, user_id: Uuid, delta: i32) {
        if let Some(user) = self.users.iter_mut().find(|u| u.id == user_id) {
            user.reputation += delta;
        }
    }

    /// Removes every comment whose parent is gone, repeatedly.
    fn drop_orphan_replies(&mut self) {
        loop {
            let ids: Vec<Uuid> = self.comments.iter().map(|c| c.id).collect();
            let before = self.comments.len();
            self.comments
                .retain(|c| c.parent_id.map_or(true, |parent| ids.contains(&parent)));
            if self.comments.len() == before {
                break;
            }
        }
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(needle))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_completion: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose `complete_analysis` always errors.
    pub fn failing_completion() -> Self {
        Self {
            fail_completion: true,
            ..Self::default()
        }
    }

    pub fn analyses(&self) -> Vec<ErrorAnalysis> {
        self.tables.lock().unwrap().analyses.clone()
    }

    pub fn solutions(&self) -> Vec<Solution> {
        self.tables.lock().unwrap().solutions.clone()
    }

    pub fn feedback(&self) -> Vec<Feedback> {
        self.tables.lock().unwrap().feedback.clone()
    }
}

fn check_unique(
    tables: &Tables,
    skip: Option<Uuid>,
    username: &str,
    email: &str,
) -> Result<(), StoreError> {
    let others = tables.users.iter().filter(|u| Some(u.id) != skip);
    for user in others {
        if user.email == email {
            return Err(StoreError::Duplicate(
                "A user with this email already exists".to_string(),
            ));
        }
        if user.username == username {
            return Err(StoreError::Duplicate(
                "A user with this username already exists".to_string(),
            ));
        }
    }
    Ok(())
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.tables.lock().unwrap().users.clone())
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        check_unique(&tables, None, &user.username, &user.email)?;
        let now = Utc::now();
        let created = User {
            id: Uuid::new_v4(),
            username: user.username.clone(),
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            bio: user.bio.clone(),
            avatar_url: user.avatar_url.clone(),
            role: user.role.as_str().to_string(),
            subscription: user.subscription.as_str().to_string(),
            analysis_count: 0,
            solutions_shared: 0,
            reputation: 0,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(current) = tables.users.iter().find(|u| u.id == id).cloned() else {
            return Ok(None);
        };
        let username = changes.username.clone().unwrap_or(current.username.clone());
        let email = changes.email.clone().unwrap_or(current.email.clone());
        check_unique(&tables, Some(id), &username, &email)?;

        let user = tables.users.iter_mut().find(|u| u.id == id).unwrap();
        user.username = username;
        user.email = email;
        if let Some(v) = &changes.display_name {
            user.display_name = Some(v.clone());
        }
        if let Some(v) = &changes.bio {
            user.bio = Some(v.clone());
        }
        if let Some(v) = &changes.avatar_url {
            user.avatar_url = Some(v.clone());
        }
        if let Some(role) = changes.role {
            user.role = role.as_str().to_string();
        }
        if let Some(tier) = changes.subscription {
            user.subscription = tier.as_str().to_string();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        tables.feedback.retain(|f| f.user_id != Some(id));

        let authored: Vec<Uuid> = tables
            .shared
            .iter()
            .filter(|s| s.author.id == id)
            .map(|s| s.id)
            .collect();
        tables.shared.retain(|s| s.author.id != id);
        tables
            .votes
            .retain(|v| v.user_id != id && !authored.contains(&v.solution_id));
        tables
            .bookmarks
            .retain(|b| b.user_id != id && !authored.contains(&b.solution_id));
        tables
            .comments
            .retain(|c| c.author.id != id && !authored.contains(&c.solution_id));
        tables.drop_orphan_replies();

        for analysis in tables.analyses.iter_mut().filter(|a| a.user_id == Some(id)) {
            analysis.user_id = None;
        }
        Ok(true)
    }

    async fn create_analysis(
        &self,
        analysis: NewAnalysis<'_>,
    ) -> Result<ErrorAnalysis, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(user_id) = analysis.user_id {
            if !tables.users.iter().any(|u| u.id == user_id) {
                return Err(StoreError::MissingReference(format!("User {user_id} not found")));
            }
        }
        let row = ErrorAnalysis {
            id: Uuid::new_v4(),
            user_id: analysis.user_id,
            context: analysis.context.to_string(),
            image_mime: analysis.image_mime.to_string(),
            image_size: i32::try_from(analysis.image.len()).unwrap_or(i32::MAX),
            image_data: analysis.image.to_vec(),
            status: AnalysisStatus::Pending.as_str().to_string(),
            failure_reason: None,
            error_type: None,
            category: None,
            severity: None,
            confidence: None,
            created_at: Utc::now(),
        };
        tables.analyses.push(row.clone());
        Ok(row)
    }

    async fn complete_analysis(
        &self,
        analysis_id: Uuid,
        solution: &NewSolution,
    ) -> Result<Solution, StoreError> {
        if self.fail_completion {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let mut tables = self.tables.lock().unwrap();
        if tables.solutions.iter().any(|s| s.analysis_id == analysis_id) {
            return Err(StoreError::Duplicate(format!(
                "Analysis {analysis_id} already has a solution"
            )));
        }
        let Some(analysis) = tables.analyses.iter_mut().find(|a| a.id == analysis_id) else {
            return Err(StoreError::MissingReference(format!(
                "Analysis {analysis_id} not found"
            )));
        };
        analysis.status = AnalysisStatus::Completed.as_str().to_string();
        analysis.error_type = solution.error_type.clone();
        analysis.category = solution.category.clone();
        analysis.severity = solution.severity.clone();
        analysis.confidence = solution.confidence;
        let owner = analysis.user_id;

        if let Some(user) = tables.users.iter_mut().find(|u| Some(u.id) == owner) {
            user.analysis_count += 1;
        }

        let stored = Solution {
            id: Uuid::new_v4(),
            analysis_id,
            title: solution.title.clone(),
            explanation: solution.explanation.clone(),
            report: solution.report.clone(),
            structured: solution.structured,
            created_at: Utc::now(),
        };
        tables.solutions.push(stored.clone());
        Ok(stored)
    }

    async fn fail_analysis(&self, analysis_id: Uuid, reason: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if let Some(analysis) = tables.analyses.iter_mut().find(|a| a.id == analysis_id) {
            analysis.status = AnalysisStatus::Failed.as_str().to_string();
            analysis.failure_reason = Some(reason.to_string());
        }
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ErrorAnalysis>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.analyses.iter().find(|a| a.id == id).cloned())
    }

    async fn get_solution(&self, id: Uuid) -> Result<Option<Solution>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.solutions.iter().find(|s| s.id == id).cloned())
    }

    async fn get_solution_for_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Solution>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .solutions
            .iter()
            .find(|s| s.analysis_id == analysis_id)
            .cloned())
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> Result<Feedback, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.solutions.iter().any(|s| s.id == feedback.solution_id) {
            return Err(StoreError::MissingReference(format!(
                "Solution {} not found",
                feedback.solution_id
            )));
        }
        if let Some(user_id) = feedback.user_id {
            if !tables.users.iter().any(|u| u.id == user_id) {
                return Err(StoreError::MissingReference(format!("User {user_id} not found")));
            }
        }
        let row = Feedback {
            id: Uuid::new_v4(),
            solution_id: feedback.solution_id,
            user_id: feedback.user_id,
            fix_id: feedback.fix_id,
            rating: feedback.rating,
            solved: feedback.solved,
            comment: feedback.comment.clone(),
            created_at: Utc::now(),
        };
        tables.feedback.push(row.clone());
        Ok(row)
    }

    async fn feedback_totals(&self, popular_limit: i64) -> Result<FeedbackTotals, StoreError> {
        let tables = self.tables.lock().unwrap();
        let mut popular: Vec<SolutionCount> = Vec::new();
        for f in &tables.feedback {
            match popular.iter_mut().find(|c| c.solution_id == f.solution_id) {
                Some(entry) => entry.count += 1,
                None => popular.push(SolutionCount {
                    solution_id: f.solution_id,
                    count: 1,
                }),
            }
        }
        popular.sort_by(|a, b| b.count.cmp(&a.count).then(a.solution_id.cmp(&b.solution_id)));
        popular.truncate(usize::try_from(popular_limit).unwrap_or(0));

        let ratings: Vec<i64> = tables
            .feedback
            .iter()
            .filter_map(|f| f.rating.map(i64::from))
            .collect();

        Ok(FeedbackTotals {
            total_analyses: tables.analyses.len() as i64,
            total_feedback: tables.feedback.len() as i64,
            rating_sum: ratings.iter().sum(),
            rating_count: ratings.len() as i64,
            solved_count: tables
                .feedback
                .iter()
                .filter(|f| f.solved == Some(true))
                .count() as i64,
            popular,
        })
    }

    async fn share_solution(
        &self,
        solution: &NewSharedSolution,
    ) -> Result<SharedSolution, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let author = tables.author(solution.author_id).ok_or_else(|| {
            StoreError::MissingReference(format!("User {} not found", solution.author_id))
        })?;
        if let Some(analysis_id) = solution.analysis_id {
            if !tables.analyses.iter().any(|a| a.id == analysis_id) {
                return Err(StoreError::MissingReference(format!(
                    "Analysis {analysis_id} not found"
                )));
            }
        }

        let now = Utc::now();
        let stored = SharedSolution {
            id: Uuid::new_v4(),
            analysis_id: solution.analysis_id,
            title: solution.title.clone(),
            description: solution.description.clone(),
            error_type: solution.error_type.clone(),
            category: solution.category.clone(),
            tags: solution.tags.clone(),
            problem_description: solution.problem_description.clone(),
            solution_steps: solution.solution_steps.clone(),
            difficulty: solution.difficulty.clone(),
            estimated_time: solution.estimated_time.clone(),
            success_rate: solution.success_rate,
            view_count: 0,
            upvote_count: 0,
            downvote_count: 0,
            comment_count: 0,
            bookmark_count: 0,
            author,
            created_at: now,
            updated_at: now,
        };
        tables.shared.push(stored.clone());

        if let Some(user) = tables.users.iter_mut().find(|u| u.id == solution.author_id) {
            user.solutions_shared += 1;
            user.reputation += reputation::SHARE;
        }
        Ok(tables.present(&stored))
    }

    async fn list_shared_solutions(
        &self,
        query: &SharedSolutionQuery,
    ) -> Result<SharedSolutionPage, StoreError> {
        let tables = self.tables.lock().unwrap();
        let search = query.search.as_deref().map(str::to_lowercase);

        let mut matching: Vec<SharedSolution> = tables
            .shared
            .iter()
            .filter(|s| query.category.is_none() || s.category == query.category)
            .filter(|s| query.error_type.is_none() || s.error_type == query.error_type)
            .filter(|s| query.difficulty.is_none() || s.difficulty == query.difficulty)
            .filter(|s| match &search {
                Some(term) => {
                    contains_ci(Some(&s.title), term)
                        || contains_ci(Some(&s.description), term)
                        || contains_ci(s.problem_description.as_deref(), term)
                }
                None => true,
            })
            .map(|s| tables.present(s))
            .collect();

        matching.sort_by(|a, b| {
            let primary = match query.sort {
                SolutionSort::Recent => b.created_at.cmp(&a.created_at),
                SolutionSort::Popular => b.view_count.cmp(&a.view_count),
                SolutionSort::Top => b.upvote_count.cmp(&a.upvote_count),
            };
            primary
                .then(b.created_at.cmp(&a.created_at))
                .then(a.id.cmp(&b.id))
        });

        let total = matching.len() as i64;
        let solutions = matching
            .into_iter()
            .skip(usize::try_from(query.offset()).unwrap_or(0))
            .take(usize::try_from(query.per_page).unwrap_or(0))
            .collect();
        Ok(SharedSolutionPage { solutions, total })
    }

    async fn get_shared_solution(&self, id: Uuid) -> Result<Option<SharedSolution>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .shared
            .iter()
            .find(|s| s.id == id)
            .map(|s| tables.present(s)))
    }

    async fn record_solution_view(
        &self,
        id: Uuid,
    ) -> Result<Option<SharedSolution>, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(stored) = tables.shared.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        stored.view_count += 1;
        let stored = stored.clone();
        Ok(Some(tables.present(&stored)))
    }

    async fn viewer_state(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
    ) -> Result<ViewerState, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(ViewerState {
            vote: tables
                .votes
                .iter()
                .find(|v| v.solution_id == solution_id && v.user_id == user_id)
                .map(|v| v.is_upvote),
            is_bookmarked: tables
                .bookmarks
                .iter()
                .any(|b| b.solution_id == solution_id && b.user_id == user_id),
        })
    }

    async fn vote_solution(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
        is_upvote: bool,
    ) -> Result<VoteOutcome, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        let Some(author_id) = tables
            .shared
            .iter()
            .find(|s| s.id == solution_id)
            .map(|s| s.author.id)
        else {
            return Err(StoreError::MissingReference(format!(
                "Shared solution {solution_id} not found"
            )));
        };
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::MissingReference(format!("User {user_id} not found")));
        }

        let existing = tables
            .votes
            .iter()
            .position(|v| v.solution_id == solution_id && v.user_id == user_id);
        let previous = existing.map(|i| tables.votes[i].is_upvote);

        let (action, current) = match existing {
            None => {
                tables.votes.push(VoteRow {
                    solution_id,
                    user_id,
                    is_upvote,
                });
                (VoteAction::Recorded, Some(is_upvote))
            }
            Some(i) if tables.votes[i].is_upvote == is_upvote => {
                tables.votes.remove(i);
                (VoteAction::Removed, None)
            }
            Some(i) => {
                tables.votes[i].is_upvote = is_upvote;
                (VoteAction::Changed, Some(is_upvote))
            }
        };
        tables.adjust_reputation(author_id, vote_reputation_delta(previous, current));

        let count = |up: bool| {
            tables
                .votes
                .iter()
                .filter(|v| v.solution_id == solution_id && v.is_upvote == up)
                .count() as i64
        };
        Ok(VoteOutcome {
            action,
            upvote_count: count(true),
            downvote_count: count(false),
        })
    }

    async fn toggle_bookmark(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
    ) -> Result<BookmarkOutcome, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.shared.iter().any(|s| s.id == solution_id) {
            return Err(StoreError::MissingReference(format!(
                "Shared solution {solution_id} not found"
            )));
        }
        if !tables.users.iter().any(|u| u.id == user_id) {
            return Err(StoreError::MissingReference(format!("User {user_id} not found")));
        }

        let before = tables.bookmarks.len();
        tables
            .bookmarks
            .retain(|b| !(b.solution_id == solution_id && b.user_id == user_id));
        let removed = tables.bookmarks.len() < before;
        if !removed {
            tables.bookmarks.push(BookmarkRow {
                solution_id,
                user_id,
            });
        }

        Ok(BookmarkOutcome {
            is_bookmarked: !removed,
            bookmark_count: tables
                .bookmarks
                .iter()
                .filter(|b| b.solution_id == solution_id)
                .count() as i64,
        })
    }

    async fn list_comments(&self, solution_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let tables = self.tables.lock().unwrap();
        // insertion order is creation order
        Ok(tables
            .comments
            .iter()
            .filter(|c| c.solution_id == solution_id)
            .map(|c| tables.present_comment(c))
            .collect())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .comments
            .iter()
            .find(|c| c.id == id)
            .map(|c| tables.present_comment(c)))
    }

    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let mut tables = self.tables.lock().unwrap();
        if !tables.shared.iter().any(|s| s.id == comment.solution_id) {
            return Err(StoreError::MissingReference(format!(
                "Shared solution {} not found",
                comment.solution_id
            )));
        }
        if let Some(parent_id) = comment.parent_id {
            if !tables.comments.iter().any(|c| c.id == parent_id) {
                return Err(StoreError::MissingReference(format!(
                    "Comment {parent_id} not found"
                )));
            }
        }
        let author = tables.author(comment.author_id).ok_or_else(|| {
            StoreError::MissingReference(format!("User {} not found", comment.author_id))
        })?;

        let stored = Comment {
            id: Uuid::new_v4(),
            solution_id: comment.solution_id,
            parent_id: comment.parent_id,
            content: comment.content.clone(),
            author,
            created_at: Utc::now(),
        };
        tables.comments.push(stored.clone());
        tables.adjust_reputation(comment.author_id, reputation::COMMENT);
        Ok(tables.present_comment(&stored))
    }
}
