//! Course entity model and DTOs.

use learnhub_core::course::{CourseStatus, Visibility};
use learnhub_core::error::CoreError;
use learnhub_core::types::{DbId, Timestamp};
use learnhub_core::versioning::CourseSnapshot;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `courses` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Course {
    pub id: DbId,
    pub title: String,
    pub creator_id: DbId,
    pub description: String,
    pub learning_objectives: String,
    pub prerequisites: String,
    pub version: i32,
    pub status: String,
    pub visibility: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Course {
    /// Capture the versioned fields together with the given task membership.
    pub fn snapshot(&self, task_ids: Vec<DbId>) -> Result<CourseSnapshot, CoreError> {
        Ok(CourseSnapshot {
            title: self.title.clone(),
            description: self.description.clone(),
            learning_objectives: self.learning_objectives.clone(),
            prerequisites: self.prerequisites.clone(),
            status: self.status()?,
            visibility: Visibility::from_str_value(&self.visibility)?,
            task_ids,
        })
    }

    pub fn status(&self) -> Result<CourseStatus, CoreError> {
        CourseStatus::from_str_value(&self.status)
    }
}

/// DTO for creating a new course. The creator comes from the requester.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCourse {
    pub title: String,
    pub description: Option<String>,
    pub learning_objectives: Option<String>,
    pub prerequisites: Option<String>,
    pub visibility: Option<String>,
}

/// DTO for updating a course. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCourse {
    pub title: Option<String>,
    pub description: Option<String>,
    pub learning_objectives: Option<String>,
    pub prerequisites: Option<String>,
    pub visibility: Option<String>,
}

impl UpdateCourse {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.learning_objectives.is_none()
            && self.prerequisites.is_none()
            && self.visibility.is_none()
    }
}

/// Query parameters for the catalogue listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseListParams {
    pub status: Option<String>,
    pub creator_id: Option<DbId>,
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
