//! Course instructor assignments.

use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `course_instructors` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CourseInstructor {
    pub id: DbId,
    pub course_id: DbId,
    pub user_id: DbId,
    pub assigned_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Assignment joined with the instructor's identity.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CourseInstructorWithUser {
    pub course_id: DbId,
    pub user_id: DbId,
    pub username: String,
    pub email: String,
    pub role: String,
    pub assigned_at: Timestamp,
}
