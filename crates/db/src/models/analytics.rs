//! Aggregate rows read by the analytics aggregator.
//!
//! These never map to a single table; each matches the projection of one
//! query in `AnalyticsRepo`.

use learnhub_core::analytics::QuestionSuccess;
use learnhub_core::reports::{
    ActivityItem, AttemptTotals, CourseStatusCounts, NextTask, RecentEnrollment, RoleCounts,
    TaskTypeDistribution,
};
use learnhub_core::types::{DbId, Timestamp};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct RoleCountRow {
    pub student: i64,
    pub instructor: i64,
    pub admin: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct CourseStatusCountRow {
    pub draft: i64,
    pub published: i64,
    pub archived: i64,
    pub deprecated: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct TaskTypeCountRow {
    pub learning: i64,
    pub quiz: i64,
    pub total: i64,
}

/// One enrolled student with completion counts over the course's visible tasks.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct StudentCompletionRow {
    pub user_id: DbId,
    pub username: String,
    pub enrollment_status: String,
    pub completed: i64,
    pub in_progress: i64,
}

/// A progress row on a visible task of a course.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ProgressDetailRow {
    pub user_id: DbId,
    pub task_id: DbId,
    pub status: String,
    pub start_date: Option<Timestamp>,
    pub completion_date: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Response tallies for one question.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct QuestionStatRow {
    pub question_id: DbId,
    pub quiz_id: DbId,
    pub text: String,
    pub total_responses: i64,
    pub correct_responses: i64,
}

/// Attempt projection used for per-task quiz statistics.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct AttemptRow {
    pub id: DbId,
    pub user_id: DbId,
    pub quiz_id: DbId,
    pub score: i32,
    pub completion_status: String,
    pub started_at: Timestamp,
    pub time_taken_secs: Option<i32>,
}

/// One of a user's attempts with its quiz/course context and response tallies.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UserAttemptRow {
    pub attempt_id: DbId,
    pub quiz_id: DbId,
    pub quiz_title: String,
    pub course_id: DbId,
    pub course_title: String,
    pub score: i32,
    pub completion_status: String,
    pub started_at: Timestamp,
    pub time_taken_secs: Option<i32>,
    pub correct: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CategoryStatRow {
    pub category: String,
    pub responses: i64,
    pub correct: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ActivityRow {
    pub course_id: DbId,
    pub task_id: DbId,
    pub task_title: String,
    pub status: String,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct NextTaskRow {
    pub course_id: DbId,
    pub task_id: DbId,
    pub title: String,
    pub task_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct CourseEnrollmentCountRow {
    pub course_id: DbId,
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub dropped: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, FromRow)]
pub struct CourseScoreRow {
    pub course_id: DbId,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RecentEnrollmentRow {
    pub course_id: DbId,
    pub course_title: String,
    pub user_id: DbId,
    pub username: String,
    pub enrollment_date: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, FromRow)]
pub struct AttemptTotalsRow {
    pub total: i64,
    pub completed: i64,
    pub average_score: Option<f64>,
}

// ---------------------------------------------------------------------------
// Row -> report conversions
// ---------------------------------------------------------------------------

impl From<RoleCountRow> for RoleCounts {
    fn from(row: RoleCountRow) -> Self {
        Self {
            student: row.student,
            instructor: row.instructor,
            admin: row.admin,
            total: row.total,
        }
    }
}

impl From<CourseStatusCountRow> for CourseStatusCounts {
    fn from(row: CourseStatusCountRow) -> Self {
        Self {
            draft: row.draft,
            published: row.published,
            archived: row.archived,
            deprecated: row.deprecated,
            total: row.total,
        }
    }
}

impl From<TaskTypeCountRow> for TaskTypeDistribution {
    fn from(row: TaskTypeCountRow) -> Self {
        Self {
            learning: row.learning,
            quiz: row.quiz,
            total: row.total,
        }
    }
}

impl From<AttemptTotalsRow> for AttemptTotals {
    fn from(row: AttemptTotalsRow) -> Self {
        Self {
            total: row.total,
            completed: row.completed,
            average_score: row.average_score.map(learnhub_core::progress::round2),
        }
    }
}

impl From<QuestionStatRow> for QuestionSuccess {
    fn from(row: QuestionStatRow) -> Self {
        QuestionSuccess::new(
            row.question_id,
            row.quiz_id,
            row.text,
            row.total_responses,
            row.correct_responses,
        )
    }
}

impl From<ActivityRow> for ActivityItem {
    fn from(row: ActivityRow) -> Self {
        Self {
            course_id: row.course_id,
            task_id: row.task_id,
            task_title: row.task_title,
            status: row.status,
            updated_at: row.updated_at,
        }
    }
}

impl From<NextTaskRow> for NextTask {
    fn from(row: NextTaskRow) -> Self {
        Self {
            course_id: row.course_id,
            task_id: row.task_id,
            title: row.title,
            task_type: row.task_type,
        }
    }
}

impl From<RecentEnrollmentRow> for RecentEnrollment {
    fn from(row: RecentEnrollmentRow) -> Self {
        Self {
            course_id: row.course_id,
            course_title: row.course_title,
            user_id: row.user_id,
            username: row.username,
            enrollment_date: row.enrollment_date,
        }
    }
}
