//! Repository for the `learning_tasks` table.

use learnhub_core::access::TaskScope;
use learnhub_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::task::{CreateTask, Task, TaskProgressCountRow, UpdateTask};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, course_id, title, description, task_type, sort_order, \
                        is_published, is_deleted, deleted_at, created_at, updated_at";

/// Provides CRUD, soft-delete and membership queries for tasks.
pub struct TaskRepo;

impl TaskRepo {
    /// Insert a task at an already-resolved `sort_order`.
    pub async fn create<'e, E>(
        executor: E,
        course_id: DbId,
        sort_order: i32,
        task_type: &str,
        input: &CreateTask,
    ) -> Result<Task, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO learning_tasks (course_id, title, description, task_type, sort_order, is_published)
             VALUES ($1, $2, COALESCE($3, ''), $4, $5, COALESCE($6, false))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(course_id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(task_type)
            .bind(sort_order)
            .bind(input.is_published)
            .fetch_one(executor)
            .await
    }

    /// Find a task by ID, soft-deleted rows included.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Task>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM learning_tasks WHERE id = $1");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a task and lock its row until the enclosing transaction ends.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM learning_tasks WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Tasks of a course in display order (`sort_order`, then id).
    pub async fn list_by_course(
        pool: &PgPool,
        course_id: DbId,
        scope: TaskScope,
    ) -> Result<Vec<Task>, sqlx::Error> {
        let visible_only = scope == TaskScope::PublishedOnly;
        let query = format!(
            "SELECT {COLUMNS} FROM learning_tasks
             WHERE course_id = $1
               AND ($2 = FALSE OR (is_published AND NOT is_deleted))
             ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(course_id)
            .bind(visible_only)
            .fetch_all(pool)
            .await
    }

    /// Highest `sort_order` in use for a course, `None` when it has no tasks.
    pub async fn max_sort_order<'e, E>(
        executor: E,
        course_id: DbId,
    ) -> Result<Option<i32>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (Option<i32>,) =
            sqlx::query_as("SELECT MAX(sort_order) FROM learning_tasks WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(executor)
                .await?;
        Ok(row.0)
    }

    /// Update a task. Only non-`None` fields in `input` are applied.
    pub async fn update(
        pool: &PgPool,
        id: DbId,
        input: &UpdateTask,
    ) -> Result<Option<Task>, sqlx::Error> {
        let query = format!(
            "UPDATE learning_tasks SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                sort_order = COALESCE($4, sort_order),
                is_published = COALESCE($5, is_published)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Task>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(input.sort_order)
            .bind(input.is_published)
            .fetch_optional(pool)
            .await
    }

    /// Soft-delete a task. Returns `true` if a row was marked deleted.
    pub async fn soft_delete<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE learning_tasks SET is_deleted = TRUE, deleted_at = NOW() \
             WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Restore a soft-deleted task. Returns `true` if a row was restored.
    pub async fn restore<'e, E>(executor: E, id: DbId) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE learning_tasks SET is_deleted = FALSE, deleted_at = NULL \
             WHERE id = $1 AND is_deleted",
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// In-progress and completed tallies for each requested task.
    ///
    /// Every existing task id gets a row, with zeros when nobody has started it.
    pub async fn progress_counts<'e, E>(
        executor: E,
        task_ids: &[DbId],
    ) -> Result<Vec<TaskProgressCountRow>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, TaskProgressCountRow>(
            "SELECT t.id AS task_id,
                    COUNT(p.id) FILTER (WHERE p.status = 'in_progress') AS in_progress,
                    COUNT(p.id) FILTER (WHERE p.status = 'completed') AS completed
             FROM learning_tasks t
             LEFT JOIN task_progress p ON p.task_id = t.id
             WHERE t.id = ANY($1)
             GROUP BY t.id
             ORDER BY t.id",
        )
        .bind(task_ids)
        .fetch_all(executor)
        .await
    }

    /// Ids of a course's non-deleted tasks, ascending. This is the snapshot task set.
    pub async fn live_task_ids<'e, E>(executor: E, course_id: DbId) -> Result<Vec<DbId>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM learning_tasks WHERE course_id = $1 AND NOT is_deleted ORDER BY id",
        )
        .bind(course_id)
        .fetch_all(executor)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Like [`TaskRepo::live_task_ids`], locking the rows until the
    /// enclosing transaction ends.
    pub async fn lock_live_task_ids(
        conn: &mut PgConnection,
        course_id: DbId,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let rows: Vec<(DbId,)> = sqlx::query_as(
            "SELECT id FROM learning_tasks WHERE course_id = $1 AND NOT is_deleted
             ORDER BY id FOR UPDATE",
        )
        .bind(course_id)
        .fetch_all(conn)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Number of non-deleted tasks, published or not.
    pub async fn count_live<'e, E>(executor: E, course_id: DbId) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM learning_tasks WHERE course_id = $1 AND NOT is_deleted",
        )
        .bind(course_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Make the live task set of a course exactly `task_ids`.
    ///
    /// Restores soft-deleted members of the set and soft-deletes live tasks
    /// outside it. Ids that belong to other courses are ignored.
    pub async fn reassign_live_set(
        conn: &mut PgConnection,
        course_id: DbId,
        task_ids: &[DbId],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE learning_tasks SET is_deleted = FALSE, deleted_at = NULL
             WHERE course_id = $1 AND id = ANY($2) AND is_deleted",
        )
        .bind(course_id)
        .bind(task_ids)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            "UPDATE learning_tasks SET is_deleted = TRUE, deleted_at = NOW()
             WHERE course_id = $1 AND NOT (id = ANY($2)) AND NOT is_deleted",
        )
        .bind(course_id)
        .bind(task_ids)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
