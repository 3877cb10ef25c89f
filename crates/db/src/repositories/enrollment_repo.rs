//! Repository for the `course_enrollments` table.
//!
//! Rows are never deleted here: unenrolment is a status update so the
//! `(user_id, course_id)` pair stays unique and history is kept.

use learnhub_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::enrollment::{Enrollment, EnrollmentCountRow, EnrollmentWithCourse};

const COLUMNS: &str =
    "id, user_id, course_id, enrollment_date, status, settings, created_at, updated_at";

const WITH_COURSE_COLUMNS: &str = "e.id, e.user_id, e.course_id, c.title AS course_title, \
                                    c.status AS course_status, e.enrollment_date, e.status, \
                                    e.updated_at";

pub struct EnrollmentRepo;

impl EnrollmentRepo {
    pub async fn find<'e, E>(
        executor: E,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Option<Enrollment>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {COLUMNS} FROM course_enrollments WHERE user_id = $1 AND course_id = $2"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(executor)
            .await
    }

    /// Find the enrolment for a pair and lock it for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        user_id: DbId,
        course_id: DbId,
    ) -> Result<Option<Enrollment>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM course_enrollments
             WHERE user_id = $1 AND course_id = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .fetch_optional(conn)
            .await
    }

    /// Insert an `active` enrolment. Fails on `uq_course_enrollments_user_course`
    /// if the pair already exists.
    pub async fn create<'e, E>(
        executor: E,
        user_id: DbId,
        course_id: DbId,
        settings: &serde_json::Value,
    ) -> Result<Enrollment, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO course_enrollments (user_id, course_id, settings)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(user_id)
            .bind(course_id)
            .bind(settings)
            .fetch_one(executor)
            .await
    }

    pub async fn set_status<'e, E>(
        executor: E,
        id: DbId,
        status: &str,
    ) -> Result<Enrollment, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query =
            format!("UPDATE course_enrollments SET status = $2 WHERE id = $1 RETURNING {COLUMNS}");
        sqlx::query_as::<_, Enrollment>(&query)
            .bind(id)
            .bind(status)
            .fetch_one(executor)
            .await
    }

    /// A user's enrolments with course context, newest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<EnrollmentWithCourse>, sqlx::Error> {
        let query = format!(
            "SELECT {WITH_COURSE_COLUMNS}
             FROM course_enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE e.user_id = $1
             ORDER BY e.enrollment_date DESC, e.id DESC"
        );
        sqlx::query_as::<_, EnrollmentWithCourse>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Enrolments of one course, oldest first.
    pub async fn list_for_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<EnrollmentWithCourse>, sqlx::Error> {
        let query = format!(
            "SELECT {WITH_COURSE_COLUMNS}
             FROM course_enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE e.course_id = $1
             ORDER BY e.enrollment_date, e.id"
        );
        sqlx::query_as::<_, EnrollmentWithCourse>(&query)
            .bind(course_id)
            .fetch_all(pool)
            .await
    }

    /// Enrolments on courses a user created or teaches, newest first.
    pub async fn list_for_teacher(
        pool: &PgPool,
        teacher_id: DbId,
    ) -> Result<Vec<EnrollmentWithCourse>, sqlx::Error> {
        let query = format!(
            "SELECT {WITH_COURSE_COLUMNS}
             FROM course_enrollments e
             JOIN courses c ON c.id = e.course_id
             WHERE c.creator_id = $1
                OR EXISTS (SELECT 1 FROM course_instructors ci
                           WHERE ci.course_id = c.id AND ci.user_id = $1)
             ORDER BY e.enrollment_date DESC, e.id DESC"
        );
        sqlx::query_as::<_, EnrollmentWithCourse>(&query)
            .bind(teacher_id)
            .fetch_all(pool)
            .await
    }

    /// Every enrolment, newest first.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<EnrollmentWithCourse>, sqlx::Error> {
        let query = format!(
            "SELECT {WITH_COURSE_COLUMNS}
             FROM course_enrollments e
             JOIN courses c ON c.id = e.course_id
             ORDER BY e.enrollment_date DESC, e.id DESC"
        );
        sqlx::query_as::<_, EnrollmentWithCourse>(&query)
            .fetch_all(pool)
            .await
    }

    /// Counts by status, for one course or (with `None`) the whole platform.
    pub async fn counts(
        pool: &PgPool,
        course_id: Option<DbId>,
    ) -> Result<EnrollmentCountRow, sqlx::Error> {
        sqlx::query_as::<_, EnrollmentCountRow>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status = 'active') AS active,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                    COUNT(*) FILTER (WHERE status = 'dropped') AS dropped
             FROM course_enrollments
             WHERE ($1::BIGINT IS NULL OR course_id = $1)",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await
    }

    /// Counts by status across one user's enrolments.
    pub async fn counts_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<EnrollmentCountRow, sqlx::Error> {
        sqlx::query_as::<_, EnrollmentCountRow>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status = 'active') AS active,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                    COUNT(*) FILTER (WHERE status = 'dropped') AS dropped
             FROM course_enrollments
             WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await
    }
}
