//! Repository for the `course_instructors` table.

use learnhub_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::course_instructor::{CourseInstructor, CourseInstructorWithUser};

const COLUMNS: &str = "id, course_id, user_id, assigned_by, created_at, updated_at";

pub struct InstructorRepo;

impl InstructorRepo {
    /// Assign an instructor. Re-assigning an existing pair returns the existing row.
    pub async fn assign<'e, E>(
        executor: E,
        course_id: DbId,
        user_id: DbId,
        assigned_by: DbId,
    ) -> Result<CourseInstructor, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO course_instructors (course_id, user_id, assigned_by)
             VALUES ($1, $2, $3)
             ON CONFLICT ON CONSTRAINT uq_course_instructors_course_user
             DO UPDATE SET updated_at = course_instructors.updated_at
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CourseInstructor>(&query)
            .bind(course_id)
            .bind(user_id)
            .bind(assigned_by)
            .fetch_one(executor)
            .await
    }

    /// Remove an assignment. Returns `true` if a row was deleted.
    pub async fn remove(pool: &PgPool, course_id: DbId, user_id: DbId) -> Result<bool, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM course_instructors WHERE course_id = $1 AND user_id = $2")
                .bind(course_id)
                .bind(user_id)
                .execute(pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_by_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<CourseInstructorWithUser>, sqlx::Error> {
        sqlx::query_as::<_, CourseInstructorWithUser>(
            "SELECT ci.course_id, ci.user_id, u.username, u.email, u.role,
                    ci.created_at AS assigned_at
             FROM course_instructors ci
             JOIN users u ON u.id = ci.user_id
             WHERE ci.course_id = $1
             ORDER BY ci.created_at, ci.id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count<'e, E>(executor: E, course_id: DbId) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM course_instructors WHERE course_id = $1")
                .bind(course_id)
                .fetch_one(executor)
                .await?;
        Ok(row.0)
    }
}
