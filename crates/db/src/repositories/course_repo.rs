//! Repository for the `courses` table.

use learnhub_core::access::CourseScope;
use learnhub_core::types::DbId;
use learnhub_core::versioning::CourseSnapshot;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::course::{Course, CourseListParams, CreateCourse, UpdateCourse};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, title, creator_id, description, learning_objectives, prerequisites, \
                        version, status, visibility, created_at, updated_at";

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// Provides CRUD, status and snapshot operations for courses.
pub struct CourseRepo;

impl CourseRepo {
    /// Insert a new draft course at version 1.
    pub async fn create<'e, E>(
        executor: E,
        creator_id: DbId,
        input: &CreateCourse,
    ) -> Result<Course, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO courses
                (title, creator_id, description, learning_objectives, prerequisites, visibility)
             VALUES ($1, $2, COALESCE($3, ''), COALESCE($4, ''), COALESCE($5, ''),
                     COALESCE($6, 'private'))
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(&input.title)
            .bind(creator_id)
            .bind(&input.description)
            .bind(&input.learning_objectives)
            .bind(&input.prerequisites)
            .bind(&input.visibility)
            .fetch_one(executor)
            .await
    }

    /// Find a course by ID.
    pub async fn find_by_id<'e, E>(executor: E, id: DbId) -> Result<Option<Course>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM courses WHERE id = $1");
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find a course and lock its row until the enclosing transaction ends.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<Course>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM courses WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List courses visible under `scope`, newest first.
    pub async fn list(
        pool: &PgPool,
        scope: CourseScope,
        params: &CourseListParams,
    ) -> Result<Vec<Course>, sqlx::Error> {
        let (restricted, or_creator) = match scope {
            CourseScope::All => (false, None),
            CourseScope::PublishedOrCreatedBy(uid) => (true, Some(uid)),
            CourseScope::PublishedOnly => (true, None),
        };
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);
        let search = params
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('%', "\\%").replace('_', "\\_")));

        let query = format!(
            "SELECT {COLUMNS} FROM courses
             WHERE ($1 = FALSE OR status = 'published' OR creator_id = $2)
               AND ($3::TEXT IS NULL OR status = $3)
               AND ($4::BIGINT IS NULL OR creator_id = $4)
               AND ($5::TEXT IS NULL OR title ILIKE $5)
             ORDER BY created_at DESC, id DESC
             LIMIT $6 OFFSET $7"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(restricted)
            .bind(or_creator)
            .bind(&params.status)
            .bind(params.creator_id)
            .bind(search)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Courses a user created or is assigned to teach.
    pub async fn list_taught_by(pool: &PgPool, user_id: DbId) -> Result<Vec<Course>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM courses c
             WHERE c.creator_id = $1
                OR EXISTS (SELECT 1 FROM course_instructors ci
                           WHERE ci.course_id = c.id AND ci.user_id = $1)
             ORDER BY c.created_at DESC, c.id DESC"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Apply an edit and set the version number in one statement.
    ///
    /// Passing the current version leaves it unchanged.
    pub async fn update<'e, E>(
        executor: E,
        id: DbId,
        input: &UpdateCourse,
        version: i32,
    ) -> Result<Option<Course>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE courses SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                learning_objectives = COALESCE($4, learning_objectives),
                prerequisites = COALESCE($5, prerequisites),
                visibility = COALESCE($6, visibility),
                version = $7
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .bind(&input.learning_objectives)
            .bind(&input.prerequisites)
            .bind(&input.visibility)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Bump only the version number.
    pub async fn set_version<'e, E>(
        executor: E,
        id: DbId,
        version: i32,
    ) -> Result<Option<Course>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("UPDATE courses SET version = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(version)
            .fetch_optional(executor)
            .await
    }

    /// Write a new status and visibility.
    pub async fn set_status<'e, E>(
        executor: E,
        id: DbId,
        status: &str,
        visibility: &str,
    ) -> Result<Option<Course>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE courses SET status = $2, visibility = $3 WHERE id = $1 RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(status)
            .bind(visibility)
            .fetch_optional(executor)
            .await
    }

    /// Overwrite the content fields from a snapshot and set status, visibility
    /// and version. Status and visibility are resolved by the caller.
    pub async fn apply_snapshot<'e, E>(
        executor: E,
        id: DbId,
        snapshot: &CourseSnapshot,
        status: &str,
        visibility: &str,
        version: i32,
    ) -> Result<Option<Course>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE courses SET
                title = $2,
                description = $3,
                learning_objectives = $4,
                prerequisites = $5,
                status = $6,
                visibility = $7,
                version = $8
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Course>(&query)
            .bind(id)
            .bind(&snapshot.title)
            .bind(&snapshot.description)
            .bind(&snapshot.learning_objectives)
            .bind(&snapshot.prerequisites)
            .bind(status)
            .bind(visibility)
            .bind(version)
            .fetch_optional(executor)
            .await
    }
}
