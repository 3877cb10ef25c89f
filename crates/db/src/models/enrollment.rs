//! Course enrolment model and DTOs.

use learnhub_core::reports::EnrollmentCounts;
use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `course_enrollments` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: DbId,
    pub user_id: DbId,
    pub course_id: DbId,
    pub enrollment_date: Timestamp,
    pub status: String,
    pub settings: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Enrolment joined with its course title and status.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct EnrollmentWithCourse {
    pub id: DbId,
    pub user_id: DbId,
    pub course_id: DbId,
    pub course_title: String,
    pub course_status: String,
    pub enrollment_date: Timestamp,
    pub status: String,
    pub updated_at: Timestamp,
}

/// Enrolment counts by status (one aggregate row).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct EnrollmentCountRow {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub dropped: i64,
}

impl From<EnrollmentCountRow> for EnrollmentCounts {
    fn from(row: EnrollmentCountRow) -> Self {
        Self {
            total: row.total,
            active: row.active,
            completed: row.completed,
            dropped: row.dropped,
        }
    }
}
