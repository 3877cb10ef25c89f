//! Read-only aggregate queries behind the analytics reports and dashboards.
//!
//! Every query returns raw counts or rows; rates, buckets and labels are
//! derived in `learnhub_core::analytics`. "Visible" tasks are published and
//! not soft-deleted; only `completed` attempts carry a meaningful score.

use learnhub_core::types::DbId;
use sqlx::PgPool;

use crate::models::analytics::{
    ActivityRow, AttemptRow, AttemptTotalsRow, CategoryStatRow, CourseEnrollmentCountRow,
    CourseScoreRow, CourseStatusCountRow, NextTaskRow, ProgressDetailRow, QuestionStatRow,
    RecentEnrollmentRow, RoleCountRow, StudentCompletionRow, TaskTypeCountRow, UserAttemptRow,
};

pub struct AnalyticsRepo;

impl AnalyticsRepo {
    // ── Platform-wide ────────────────────────────────────────────────

    pub async fn role_counts(pool: &PgPool) -> Result<RoleCountRow, sqlx::Error> {
        sqlx::query_as::<_, RoleCountRow>(
            "SELECT COUNT(*) FILTER (WHERE role = 'student') AS student,
                    COUNT(*) FILTER (WHERE role = 'instructor') AS instructor,
                    COUNT(*) FILTER (WHERE role = 'admin') AS admin,
                    COUNT(*) AS total
             FROM users",
        )
        .fetch_one(pool)
        .await
    }

    pub async fn course_status_counts(pool: &PgPool) -> Result<CourseStatusCountRow, sqlx::Error> {
        sqlx::query_as::<_, CourseStatusCountRow>(
            "SELECT COUNT(*) FILTER (WHERE status = 'draft') AS draft,
                    COUNT(*) FILTER (WHERE status = 'published') AS published,
                    COUNT(*) FILTER (WHERE status = 'archived') AS archived,
                    COUNT(*) FILTER (WHERE status = 'deprecated') AS deprecated,
                    COUNT(*) AS total
             FROM courses",
        )
        .fetch_one(pool)
        .await
    }

    pub async fn attempt_totals(pool: &PgPool) -> Result<AttemptTotalsRow, sqlx::Error> {
        sqlx::query_as::<_, AttemptTotalsRow>(
            "SELECT COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE completion_status = 'completed') AS completed,
                    (AVG(score) FILTER (WHERE completion_status = 'completed'))::FLOAT8
                        AS average_score
             FROM quiz_attempts",
        )
        .fetch_one(pool)
        .await
    }

    // ── Per course ───────────────────────────────────────────────────

    /// Learning/quiz split over a course's non-deleted tasks.
    pub async fn task_type_counts(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<TaskTypeCountRow, sqlx::Error> {
        sqlx::query_as::<_, TaskTypeCountRow>(
            "SELECT COUNT(*) FILTER (WHERE task_type = 'learning') AS learning,
                    COUNT(*) FILTER (WHERE task_type = 'quiz') AS quiz,
                    COUNT(*) AS total
             FROM learning_tasks
             WHERE course_id = $1 AND NOT is_deleted",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await
    }

    /// Non-dropped enrolments with per-student counts over visible tasks.
    pub async fn student_completion(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<StudentCompletionRow>, sqlx::Error> {
        sqlx::query_as::<_, StudentCompletionRow>(
            "SELECT e.user_id, u.username, e.status AS enrollment_status,
                    COUNT(p.id) FILTER (WHERE p.status = 'completed') AS completed,
                    COUNT(p.id) FILTER (WHERE p.status = 'in_progress') AS in_progress
             FROM course_enrollments e
             JOIN users u ON u.id = e.user_id
             LEFT JOIN learning_tasks t
                    ON t.course_id = e.course_id AND t.is_published AND NOT t.is_deleted
             LEFT JOIN task_progress p ON p.task_id = t.id AND p.user_id = e.user_id
             WHERE e.course_id = $1 AND e.status <> 'dropped'
             GROUP BY e.user_id, u.username, e.status
             ORDER BY e.user_id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
    }

    /// Every progress row on a course's visible tasks.
    pub async fn progress_details(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<ProgressDetailRow>, sqlx::Error> {
        sqlx::query_as::<_, ProgressDetailRow>(
            "SELECT p.user_id, p.task_id, p.status, p.start_date, p.completion_date, p.updated_at
             FROM task_progress p
             JOIN learning_tasks t ON t.id = p.task_id
             WHERE t.course_id = $1 AND t.is_published AND NOT t.is_deleted
             ORDER BY p.user_id, t.sort_order, t.id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
    }

    /// Mean score of completed attempts on a course's non-deleted quizzes.
    pub async fn average_score_for_course(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Option<f64>, sqlx::Error> {
        let row: (Option<f64>,) = sqlx::query_as(
            "SELECT AVG(a.score)::FLOAT8
             FROM quiz_attempts a
             JOIN learning_tasks t ON t.id = a.quiz_id
             WHERE t.course_id = $1 AND NOT t.is_deleted AND a.completion_status = 'completed'",
        )
        .bind(course_id)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Response tallies for every question on a course's non-deleted quizzes.
    pub async fn question_stats(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<QuestionStatRow>, sqlx::Error> {
        sqlx::query_as::<_, QuestionStatRow>(
            "SELECT q.id AS question_id, q.quiz_id, q.text,
                    COUNT(r.id) AS total_responses,
                    COUNT(r.id) FILTER (WHERE r.is_correct) AS correct_responses
             FROM quiz_questions q
             JOIN learning_tasks t ON t.id = q.quiz_id
             LEFT JOIN quiz_responses r ON r.question_id = q.id
             WHERE t.course_id = $1 AND NOT t.is_deleted
             GROUP BY q.id
             ORDER BY q.quiz_id, q.sort_order, q.id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
    }

    /// Every attempt on a course's quizzes, grouped by quiz and user in start order.
    pub async fn course_attempts(
        pool: &PgPool,
        course_id: DbId,
    ) -> Result<Vec<AttemptRow>, sqlx::Error> {
        sqlx::query_as::<_, AttemptRow>(
            "SELECT a.id, a.user_id, a.quiz_id, a.score, a.completion_status,
                    a.started_at, a.time_taken_secs
             FROM quiz_attempts a
             JOIN learning_tasks t ON t.id = a.quiz_id
             WHERE t.course_id = $1
             ORDER BY a.quiz_id, a.user_id, a.started_at, a.id",
        )
        .bind(course_id)
        .fetch_all(pool)
        .await
    }

    // ── Per student ──────────────────────────────────────────────────

    /// A user's attempts with quiz/course context and response tallies, newest first.
    pub async fn user_attempts(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<UserAttemptRow>, sqlx::Error> {
        sqlx::query_as::<_, UserAttemptRow>(
            "SELECT a.id AS attempt_id, a.quiz_id, t.title AS quiz_title,
                    t.course_id, c.title AS course_title,
                    a.score, a.completion_status, a.started_at, a.time_taken_secs,
                    COUNT(r.id) FILTER (WHERE r.is_correct) AS correct,
                    COUNT(r.id) AS total
             FROM quiz_attempts a
             JOIN learning_tasks t ON t.id = a.quiz_id
             JOIN courses c ON c.id = t.course_id
             LEFT JOIN quiz_responses r ON r.attempt_id = a.id
             WHERE a.user_id = $1
             GROUP BY a.id, t.title, t.course_id, c.title
             ORDER BY a.started_at DESC, a.id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Response tallies per question category for one user. Uncategorised questions are skipped.
    pub async fn user_category_stats(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<CategoryStatRow>, sqlx::Error> {
        sqlx::query_as::<_, CategoryStatRow>(
            "SELECT q.category AS category,
                    COUNT(r.id) AS responses,
                    COUNT(r.id) FILTER (WHERE r.is_correct) AS correct
             FROM quiz_responses r
             JOIN quiz_attempts a ON a.id = r.attempt_id
             JOIN quiz_questions q ON q.id = r.question_id
             WHERE a.user_id = $1 AND q.category IS NOT NULL
             GROUP BY q.category
             ORDER BY q.category",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// A user's progress rows on non-deleted tasks, most recently touched first.
    pub async fn user_activity(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Vec<ActivityRow>, sqlx::Error> {
        sqlx::query_as::<_, ActivityRow>(
            "SELECT t.course_id, p.task_id, t.title AS task_title, p.status, p.updated_at
             FROM task_progress p
             JOIN learning_tasks t ON t.id = p.task_id
             WHERE p.user_id = $1 AND NOT t.is_deleted
             ORDER BY p.updated_at DESC, p.id DESC",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// For each active enrolment, the first visible task the user has not completed.
    pub async fn next_tasks(pool: &PgPool, user_id: DbId) -> Result<Vec<NextTaskRow>, sqlx::Error> {
        sqlx::query_as::<_, NextTaskRow>(
            "SELECT DISTINCT ON (t.course_id)
                    t.course_id, t.id AS task_id, t.title, t.task_type
             FROM course_enrollments e
             JOIN learning_tasks t
               ON t.course_id = e.course_id AND t.is_published AND NOT t.is_deleted
             LEFT JOIN task_progress p ON p.task_id = t.id AND p.user_id = e.user_id
             WHERE e.user_id = $1
               AND e.status = 'active'
               AND COALESCE(p.status, 'not_started') <> 'completed'
             ORDER BY t.course_id, t.sort_order, t.id",
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    // ── Per course set (instructor dashboard) ────────────────────────

    pub async fn enrollment_counts_by_course(
        pool: &PgPool,
        course_ids: &[DbId],
    ) -> Result<Vec<CourseEnrollmentCountRow>, sqlx::Error> {
        sqlx::query_as::<_, CourseEnrollmentCountRow>(
            "SELECT course_id,
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status = 'active') AS active,
                    COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                    COUNT(*) FILTER (WHERE status = 'dropped') AS dropped
             FROM course_enrollments
             WHERE course_id = ANY($1)
             GROUP BY course_id",
        )
        .bind(course_ids)
        .fetch_all(pool)
        .await
    }

    pub async fn average_scores_by_course(
        pool: &PgPool,
        course_ids: &[DbId],
    ) -> Result<Vec<CourseScoreRow>, sqlx::Error> {
        sqlx::query_as::<_, CourseScoreRow>(
            "SELECT t.course_id, AVG(a.score)::FLOAT8 AS average_score
             FROM quiz_attempts a
             JOIN learning_tasks t ON t.id = a.quiz_id
             WHERE t.course_id = ANY($1) AND NOT t.is_deleted
               AND a.completion_status = 'completed'
             GROUP BY t.course_id",
        )
        .bind(course_ids)
        .fetch_all(pool)
        .await
    }

    /// Distinct users holding a non-dropped enrolment in any of the courses.
    pub async fn distinct_students(pool: &PgPool, course_ids: &[DbId]) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(DISTINCT user_id) FROM course_enrollments
             WHERE course_id = ANY($1) AND status <> 'dropped'",
        )
        .bind(course_ids)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    pub async fn recent_enrollments(
        pool: &PgPool,
        course_ids: &[DbId],
        limit: i64,
    ) -> Result<Vec<RecentEnrollmentRow>, sqlx::Error> {
        sqlx::query_as::<_, RecentEnrollmentRow>(
            "SELECT e.course_id, c.title AS course_title, e.user_id, u.username, e.enrollment_date
             FROM course_enrollments e
             JOIN courses c ON c.id = e.course_id
             JOIN users u ON u.id = e.user_id
             WHERE e.course_id = ANY($1)
             ORDER BY e.enrollment_date DESC, e.id DESC
             LIMIT $2",
        )
        .bind(course_ids)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
