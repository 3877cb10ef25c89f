//! Course version entity model.

use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `course_versions` table. Never updated after insert.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct CourseVersion {
    pub id: DbId,
    pub course_id: DbId,
    pub version_number: i32,
    pub content_snapshot: serde_json::Value,
    pub notes: String,
    pub created_by: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for recording a version.
#[derive(Debug, Clone)]
pub struct CreateCourseVersion {
    pub course_id: DbId,
    pub version_number: i32,
    pub content_snapshot: serde_json::Value,
    pub notes: String,
    pub created_by: DbId,
}
