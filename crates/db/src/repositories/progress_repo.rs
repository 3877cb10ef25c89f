//! Repository for the `task_progress` table.

use learnhub_core::progress::ProgressState;
use learnhub_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::progress::{ProgressCountRow, TaskProgress, TaskProgressView};

const COLUMNS: &str = "id, user_id, task_id, status, start_date, completion_date, \
                        time_spent_secs, created_at, updated_at";

/// Visible tasks are published and not soft-deleted.
const VISIBLE_TASK: &str = "t.is_published AND NOT t.is_deleted";

pub struct ProgressRepo;

impl ProgressRepo {
    pub async fn find<'e, E>(
        executor: E,
        user_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskProgress>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query =
            format!("SELECT {COLUMNS} FROM task_progress WHERE user_id = $1 AND task_id = $2");
        sqlx::query_as::<_, TaskProgress>(&query)
            .bind(user_id)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    /// Find a progress row and lock it for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        user_id: DbId,
        task_id: DbId,
    ) -> Result<Option<TaskProgress>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM task_progress WHERE user_id = $1 AND task_id = $2 FOR UPDATE"
        );
        sqlx::query_as::<_, TaskProgress>(&query)
            .bind(user_id)
            .bind(task_id)
            .fetch_optional(conn)
            .await
    }

    /// Write a state computed by `learnhub_core::progress::apply_transition`.
    ///
    /// Creates the row on first touch; `time_spent_increment` is added to the
    /// accumulated total.
    pub async fn upsert<'e, E>(
        executor: E,
        user_id: DbId,
        task_id: DbId,
        state: &ProgressState,
        time_spent_increment: i64,
    ) -> Result<TaskProgress, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO task_progress (user_id, task_id, status, start_date, completion_date, time_spent_secs)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT ON CONSTRAINT uq_task_progress_user_task DO UPDATE SET
                status = EXCLUDED.status,
                start_date = EXCLUDED.start_date,
                completion_date = EXCLUDED.completion_date,
                time_spent_secs = task_progress.time_spent_secs + EXCLUDED.time_spent_secs
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TaskProgress>(&query)
            .bind(user_id)
            .bind(task_id)
            .bind(state.status.as_str())
            .bind(state.start_date)
            .bind(state.completion_date)
            .bind(time_spent_increment)
            .fetch_one(executor)
            .await
    }

    /// A course's visible tasks in display order, each with the user's progress.
    pub async fn list_for_course(
        pool: &PgPool,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Vec<TaskProgressView>, sqlx::Error> {
        let query = format!(
            "SELECT t.id AS task_id, t.title, t.task_type, t.sort_order,
                    COALESCE(p.status, 'not_started') AS status,
                    p.start_date, p.completion_date,
                    COALESCE(p.time_spent_secs, 0) AS time_spent_secs,
                    p.updated_at
             FROM learning_tasks t
             LEFT JOIN task_progress p ON p.task_id = t.id AND p.user_id = $1
             WHERE t.course_id = $2 AND {VISIBLE_TASK}
             ORDER BY t.sort_order, t.id"
        );
        sqlx::query_as::<_, TaskProgressView>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }

    /// Completion counts for one user over a course's visible tasks.
    pub async fn counts_for_course<'e, E>(
        executor: E,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<ProgressCountRow, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT COUNT(t.id) AS total,
                    COUNT(p.id) FILTER (WHERE p.status = 'completed') AS completed,
                    COUNT(p.id) FILTER (WHERE p.status = 'in_progress') AS in_progress
             FROM learning_tasks t
             LEFT JOIN task_progress p ON p.task_id = t.id AND p.user_id = $1
             WHERE t.course_id = $2 AND {VISIBLE_TASK}"
        );
        sqlx::query_as::<_, ProgressCountRow>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_one(executor)
            .await
    }
}
