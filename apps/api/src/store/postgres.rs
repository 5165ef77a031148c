use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::models::analysis::{
    AnalysisStatus, ErrorAnalysis, NewAnalysis, NewSolution, Solution,
};
use crate::models::community::{
    reputation, vote_reputation_delta, BookmarkOutcome, Comment, NewComment, NewSharedSolution,
    SharedSolution, SharedSolutionPage, SharedSolutionQuery, ViewerState, VoteAction,
    VoteOutcome,
};
use crate::models::feedback::{Feedback, FeedbackTotals, NewFeedback, SolutionCount};
use crate::models::user::{NewUser, User, UserChanges};
use crate::store::{Store, StoreError};

/// `Store` backed by the shared PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Splits constraint violations out of generic database failures so the
/// route layer can answer 400/404 instead of 500.
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("").to_string();
        if db_err.is_unique_violation() {
            let message = if constraint.contains("email") {
                "A user with this email already exists".to_string()
            } else if constraint.contains("username") {
                "A user with this username already exists".to_string()
            } else {
                format!("Record already exists ({constraint})")
            };
            return StoreError::Duplicate(message);
        }
        if db_err.is_foreign_key_violation() {
            return StoreError::MissingReference(format!(
                "Referenced record does not exist ({constraint})"
            ));
        }
    }
    StoreError::Database(err)
}

// Community rows are read with their author and live counts.
const SHARED_SOLUTION_SELECT: &str = r#"
    SELECT s.id, s.analysis_id, s.title, s.description, s.error_type, s.category, s.tags,
           s.problem_description, s.solution_steps, s.difficulty, s.estimated_time,
           s.success_rate, s.view_count, s.created_at, s.updated_at,
           (SELECT COUNT(*) FROM votes v WHERE v.solution_id = s.id AND v.is_upvote)
               AS upvote_count,
           (SELECT COUNT(*) FROM votes v WHERE v.solution_id = s.id AND NOT v.is_upvote)
               AS downvote_count,
           (SELECT COUNT(*) FROM comments c WHERE c.solution_id = s.id) AS comment_count,
           (SELECT COUNT(*) FROM bookmarks b WHERE b.solution_id = s.id) AS bookmark_count,
           u.id AS author_id, u.username AS author_username,
           u.display_name AS author_display_name, u.avatar_url AS author_avatar_url,
           u.reputation AS author_reputation
    FROM shared_solutions s
    JOIN users u ON u.id = s.author_id
"#;

const SHARED_SOLUTION_FILTER: &str = r#"
    WHERE ($1::TEXT IS NULL OR category = $1)
      AND ($2::TEXT IS NULL OR error_type = $2)
      AND ($3::TEXT IS NULL OR difficulty = $3)
      AND ($4::TEXT IS NULL
           OR title ILIKE $4 OR description ILIKE $4 OR problem_description ILIKE $4)
"#;

const COMMENT_SELECT: &str = r#"
    SELECT c.id, c.solution_id, c.parent_id, c.content, c.created_at,
           u.id AS author_id, u.username AS author_username,
           u.display_name AS author_display_name, u.avatar_url AS author_avatar_url,
           u.reputation AS author_reputation
    FROM comments c
    JOIN users u ON u.id = c.author_id
"#;

/// `%term%` with LIKE wildcards in the term escaped.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

async fn fetch_shared_solution<'e, E>(
    executor: E,
    id: Uuid,
) -> Result<Option<SharedSolution>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("{SHARED_SOLUTION_SELECT} WHERE s.id = $1");
    sqlx::query_as::<_, SharedSolution>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

async fn fetch_comment<'e, E>(executor: E, id: Uuid) -> Result<Option<Comment>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let sql = format!("{COMMENT_SELECT} WHERE c.id = $1");
    sqlx::query_as::<_, Comment>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await
}

fn inserted_row_missing(table: &str) -> StoreError {
    StoreError::Database(sqlx::Error::Protocol(format!(
        "{table} row vanished inside its own transaction"
    )))
}

#[async_trait]
impl Store for PgStore {
    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(
            sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at, id")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    async fn get_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create_user(&self, user: &NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users
                (id, username, email, display_name, bio, avatar_url, role, subscription)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.bio)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(user.subscription.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)?;

        info!("Created user {} ({})", created.id, created.username);
        Ok(created)
    }

    async fn update_user(
        &self,
        id: Uuid,
        changes: &UserChanges,
    ) -> Result<Option<User>, StoreError> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                username     = COALESCE($2, username),
                email        = COALESCE($3, email),
                display_name = COALESCE($4, display_name),
                bio          = COALESCE($5, bio),
                avatar_url   = COALESCE($6, avatar_url),
                role         = COALESCE($7, role),
                subscription = COALESCE($8, subscription),
                updated_at   = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.username)
        .bind(&changes.email)
        .bind(&changes.display_name)
        .bind(&changes.bio)
        .bind(&changes.avatar_url)
        .bind(changes.role.map(|r| r.as_str()))
        .bind(changes.subscription.map(|s| s.as_str()))
        .fetch_optional(&self.pool)
        .await
        .map_err(classify)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool, StoreError> {
        // feedback and community rows cascade, error_analyses.user_id is nulled
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_analysis(
        &self,
        analysis: NewAnalysis<'_>,
    ) -> Result<ErrorAnalysis, StoreError> {
        sqlx::query_as::<_, ErrorAnalysis>(
            r#"
            INSERT INTO error_analyses
                (id, user_id, context, image_mime, image_size, image_data, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(analysis.user_id)
        .bind(analysis.context)
        .bind(analysis.image_mime)
        .bind(i32::try_from(analysis.image.len()).unwrap_or(i32::MAX))
        .bind(analysis.image)
        .bind(AnalysisStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn complete_analysis(
        &self,
        analysis_id: Uuid,
        solution: &NewSolution,
    ) -> Result<Solution, StoreError> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Solution>(
            r#"
            INSERT INTO solutions (id, analysis_id, title, explanation, report, structured)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(analysis_id)
        .bind(&solution.title)
        .bind(&solution.explanation)
        .bind(&solution.report)
        .bind(solution.structured)
        .fetch_one(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            r#"
            UPDATE error_analyses SET
                status = $2, error_type = $3, category = $4, severity = $5, confidence = $6
            WHERE id = $1
            "#,
        )
        .bind(analysis_id)
        .bind(AnalysisStatus::Completed.as_str())
        .bind(&solution.error_type)
        .bind(&solution.category)
        .bind(&solution.severity)
        .bind(solution.confidence)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE users SET analysis_count = analysis_count + 1
            WHERE id = (SELECT user_id FROM error_analyses WHERE id = $1)
            "#,
        )
        .bind(analysis_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("Stored solution {} for analysis {analysis_id}", stored.id);
        Ok(stored)
    }

    async fn fail_analysis(&self, analysis_id: Uuid, reason: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE error_analyses SET status = $2, failure_reason = $3 WHERE id = $1")
            .bind(analysis_id)
            .bind(AnalysisStatus::Failed.as_str())
            .bind(reason)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_analysis(&self, id: Uuid) -> Result<Option<ErrorAnalysis>, StoreError> {
        Ok(
            sqlx::query_as::<_, ErrorAnalysis>("SELECT * FROM error_analyses WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_solution(&self, id: Uuid) -> Result<Option<Solution>, StoreError> {
        Ok(
            sqlx::query_as::<_, Solution>("SELECT * FROM solutions WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn get_solution_for_analysis(
        &self,
        analysis_id: Uuid,
    ) -> Result<Option<Solution>, StoreError> {
        Ok(
            sqlx::query_as::<_, Solution>("SELECT * FROM solutions WHERE analysis_id = $1")
                .bind(analysis_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn create_feedback(&self, feedback: &NewFeedback) -> Result<Feedback, StoreError> {
        sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedback
                (id, solution_id, user_id, fix_id, rating, solved, comment)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(feedback.solution_id)
        .bind(feedback.user_id)
        .bind(feedback.fix_id)
        .bind(feedback.rating)
        .bind(feedback.solved)
        .bind(&feedback.comment)
        .fetch_one(&self.pool)
        .await
        .map_err(classify)
    }

    async fn feedback_totals(&self, popular_limit: i64) -> Result<FeedbackTotals, StoreError> {
        let total_analyses: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM error_analyses")
            .fetch_one(&self.pool)
            .await?;

        let (total_feedback, rating_sum, rating_count, solved_count): (i64, i64, i64, i64) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(rating), 0)::BIGINT,
                       COUNT(rating),
                       COUNT(*) FILTER (WHERE solved)
                FROM feedback
                "#,
            )
            .fetch_one(&self.pool)
            .await?;

        let popular = sqlx::query_as::<_, SolutionCount>(
            r#"
            SELECT solution_id, COUNT(*) AS count
            FROM feedback
            GROUP BY solution_id
            ORDER BY count DESC, solution_id
            LIMIT $1
            "#,
        )
        .bind(popular_limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(FeedbackTotals {
            total_analyses,
            total_feedback,
            rating_sum,
            rating_count,
            solved_count,
            popular,
        })
    }

    async fn share_solution(
        &self,
        solution: &NewSharedSolution,
    ) -> Result<SharedSolution, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO shared_solutions
                (id, author_id, analysis_id, title, description, error_type, category, tags,
                 problem_description, solution_steps, difficulty, estimated_time, success_rate)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(id)
        .bind(solution.author_id)
        .bind(solution.analysis_id)
        .bind(&solution.title)
        .bind(&solution.description)
        .bind(&solution.error_type)
        .bind(&solution.category)
        .bind(&solution.tags)
        .bind(&solution.problem_description)
        .bind(&solution.solution_steps)
        .bind(&solution.difficulty)
        .bind(&solution.estimated_time)
        .bind(solution.success_rate)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query(
            r#"
            UPDATE users SET
                solutions_shared = solutions_shared + 1,
                reputation = reputation + $2
            WHERE id = $1
            "#,
        )
        .bind(solution.author_id)
        .bind(reputation::SHARE)
        .execute(&mut *tx)
        .await?;

        let shared = fetch_shared_solution(&mut *tx, id)
            .await?
            .ok_or_else(|| inserted_row_missing("shared_solutions"))?;
        tx.commit().await?;

        info!("User {} shared solution {id}", solution.author_id);
        Ok(shared)
    }

    async fn list_shared_solutions(
        &self,
        query: &SharedSolutionQuery,
    ) -> Result<SharedSolutionPage, StoreError> {
        let search = query.search.as_deref().map(like_pattern);

        let count_sql = format!("SELECT COUNT(*) FROM shared_solutions {SHARED_SOLUTION_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&query.category)
            .bind(&query.error_type)
            .bind(&query.difficulty)
            .bind(&search)
            .fetch_one(&self.pool)
            .await?;

        let list_sql = format!(
            "SELECT * FROM ({SHARED_SOLUTION_SELECT}) listed {SHARED_SOLUTION_FILTER} \
             ORDER BY {} DESC, created_at DESC, id LIMIT $5 OFFSET $6",
            query.sort.column()
        );
        let solutions = sqlx::query_as::<_, SharedSolution>(&list_sql)
            .bind(&query.category)
            .bind(&query.error_type)
            .bind(&query.difficulty)
            .bind(&search)
            .bind(query.per_page)
            .bind(query.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(SharedSolutionPage { solutions, total })
    }

    async fn get_shared_solution(&self, id: Uuid) -> Result<Option<SharedSolution>, StoreError> {
        Ok(fetch_shared_solution(&self.pool, id).await?)
    }

    async fn record_solution_view(
        &self,
        id: Uuid,
    ) -> Result<Option<SharedSolution>, StoreError> {
        let updated = sqlx::query("UPDATE shared_solutions SET view_count = view_count + 1 WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(fetch_shared_solution(&self.pool, id).await?)
    }

    async fn viewer_state(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
    ) -> Result<ViewerState, StoreError> {
        let (vote, is_bookmarked): (Option<bool>, bool) = sqlx::query_as(
            r#"
            SELECT (SELECT is_upvote FROM votes WHERE solution_id = $1 AND user_id = $2),
                   EXISTS (SELECT 1 FROM bookmarks WHERE solution_id = $1 AND user_id = $2)
            "#,
        )
        .bind(solution_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(ViewerState { vote, is_bookmarked })
    }

    async fn vote_solution(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
        is_upvote: bool,
    ) -> Result<VoteOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<bool> = sqlx::query_scalar(
            "SELECT is_upvote FROM votes WHERE solution_id = $1 AND user_id = $2 FOR UPDATE",
        )
        .bind(solution_id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let (action, current) = match previous {
            None => {
                sqlx::query(
                    "INSERT INTO votes (id, solution_id, user_id, is_upvote) VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(solution_id)
                .bind(user_id)
                .bind(is_upvote)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
                (VoteAction::Recorded, Some(is_upvote))
            }
            Some(same) if same == is_upvote => {
                sqlx::query("DELETE FROM votes WHERE solution_id = $1 AND user_id = $2")
                    .bind(solution_id)
                    .bind(user_id)
                    .execute(&mut *tx)
                    .await?;
                (VoteAction::Removed, None)
            }
            Some(_) => {
                sqlx::query("UPDATE votes SET is_upvote = $3 WHERE solution_id = $1 AND user_id = $2")
                    .bind(solution_id)
                    .bind(user_id)
                    .bind(is_upvote)
                    .execute(&mut *tx)
                    .await?;
                (VoteAction::Changed, Some(is_upvote))
            }
        };

        sqlx::query(
            r#"
            UPDATE users SET reputation = reputation + $2
            WHERE id = (SELECT author_id FROM shared_solutions WHERE id = $1)
            "#,
        )
        .bind(solution_id)
        .bind(vote_reputation_delta(previous, current))
        .execute(&mut *tx)
        .await?;

        let (upvote_count, downvote_count): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE is_upvote), COUNT(*) FILTER (WHERE NOT is_upvote)
            FROM votes WHERE solution_id = $1
            "#,
        )
        .bind(solution_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(VoteOutcome {
            action,
            upvote_count,
            downvote_count,
        })
    }

    async fn toggle_bookmark(
        &self,
        solution_id: Uuid,
        user_id: Uuid,
    ) -> Result<BookmarkOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM bookmarks WHERE solution_id = $1 AND user_id = $2")
            .bind(solution_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            sqlx::query("INSERT INTO bookmarks (id, solution_id, user_id) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(solution_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await
                .map_err(classify)?;
        }

        let bookmark_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM bookmarks WHERE solution_id = $1")
                .bind(solution_id)
                .fetch_one(&mut *tx)
                .await?;

        tx.commit().await?;

        Ok(BookmarkOutcome {
            is_bookmarked: !removed,
            bookmark_count,
        })
    }

    async fn list_comments(&self, solution_id: Uuid) -> Result<Vec<Comment>, StoreError> {
        let sql = format!("{COMMENT_SELECT} WHERE c.solution_id = $1 ORDER BY c.created_at, c.id");
        Ok(sqlx::query_as::<_, Comment>(&sql)
            .bind(solution_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>, StoreError> {
        Ok(fetch_comment(&self.pool, id).await?)
    }

    async fn add_comment(&self, comment: &NewComment) -> Result<Comment, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = Uuid::new_v4();

        sqlx::query(
            r#"
            INSERT INTO comments (id, solution_id, author_id, parent_id, content)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(comment.solution_id)
        .bind(comment.author_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .execute(&mut *tx)
        .await
        .map_err(classify)?;

        sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
            .bind(comment.author_id)
            .bind(reputation::COMMENT)
            .execute(&mut *tx)
            .await?;

        let stored = fetch_comment(&mut *tx, id)
            .await?
            .ok_or_else(|| inserted_row_missing("comments"))?;
        tx.commit().await?;

        Ok(stored)
    }
}
