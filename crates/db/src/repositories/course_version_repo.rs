//! Repository for the `course_versions` table.

use learnhub_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::course_version::{CourseVersion, CreateCourseVersion};

const COLUMNS: &str =
    "id, course_id, version_number, content_snapshot, notes, created_by, created_at, updated_at";

/// Insert-only access to course versions.
pub struct CourseVersionRepo;

impl CourseVersionRepo {
    /// Record a version. Fails on `uq_course_versions_course_version` if the
    /// number is already taken.
    pub async fn create<'e, E>(
        executor: E,
        input: &CreateCourseVersion,
    ) -> Result<CourseVersion, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO course_versions (course_id, version_number, content_snapshot, notes, created_by)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CourseVersion>(&query)
            .bind(input.course_id)
            .bind(input.version_number)
            .bind(&input.content_snapshot)
            .bind(&input.notes)
            .bind(input.created_by)
            .fetch_one(executor)
            .await
    }

    /// Overwrite the snapshot of one version. Only the course's current
    /// version is ever refreshed; superseded versions stay as recorded.
    pub async fn refresh_snapshot<'e, E>(
        executor: E,
        course_id: DbId,
        version_number: i32,
        content_snapshot: &serde_json::Value,
    ) -> Result<bool, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE course_versions SET content_snapshot = $3
             WHERE course_id = $1 AND version_number = $2",
        )
        .bind(course_id)
        .bind(version_number)
        .bind(content_snapshot)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find<'e, E>(
        executor: E,
        course_id: DbId,
        version_number: i32,
    ) -> Result<Option<CourseVersion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM course_versions WHERE course_id = $1 AND version_number = $2"
        );
        sqlx::query_as::<_, CourseVersion>(&query)
            .bind(course_id)
            .bind(version_number)
            .fetch_optional(executor)
            .await
    }

    /// All versions of a course, newest first.
    pub async fn list_by_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<CourseVersion>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM course_versions WHERE course_id = $1 ORDER BY version_number DESC"
        );
        sqlx::query_as::<_, CourseVersion>(&query)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }

    /// Highest recorded version number, or 0 when none exist.
    pub async fn max_version<'e, E>(executor: E, course_id: DbId) -> Result<i32, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i32,) = sqlx::query_as(
            "SELECT COALESCE(MAX(version_number), 0) FROM course_versions WHERE course_id = $1",
        )
        .bind(course_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }
}
