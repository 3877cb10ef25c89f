//! Repository for the append-only `course_status_transitions` table.

use learnhub_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::status_transition::{CreateStatusTransition, StatusTransition};

const COLUMNS: &str = "id, course_id, from_status, to_status, changed_by, reason, \
                        changed_at, created_at, updated_at";

pub struct StatusTransitionRepo;

impl StatusTransitionRepo {
    pub async fn create<'e, E>(
        executor: E,
        input: &CreateStatusTransition,
    ) -> Result<StatusTransition, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO course_status_transitions (course_id, from_status, to_status, changed_by, reason)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StatusTransition>(&query)
            .bind(input.course_id)
            .bind(&input.from_status)
            .bind(&input.to_status)
            .bind(input.changed_by)
            .bind(&input.reason)
            .fetch_one(executor)
            .await
    }

    /// Transitions for a course in the order they happened.
    pub async fn list_by_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<StatusTransition>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM course_status_transitions
             WHERE course_id = $1
             ORDER BY changed_at, id"
        );
        sqlx::query_as::<_, StatusTransition>(&query)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }
}
