//! Learning task entity model and DTOs.

use learnhub_core::task::TaskProgressCounts;
use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `learning_tasks` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Task {
    pub id: DbId,
    pub course_id: DbId,
    pub title: String,
    pub description: String,
    pub task_type: String,
    pub sort_order: i32,
    pub is_published: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a task. `sort_order` defaults to the next free slot.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub task_type: Option<String>,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

/// DTO for updating a task. All fields optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub sort_order: Option<i32>,
    pub is_published: Option<bool>,
}

/// Per-task progress tallies used by the deletion guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow, Serialize)]
pub struct TaskProgressCountRow {
    pub task_id: DbId,
    pub in_progress: i64,
    pub completed: i64,
}

impl From<TaskProgressCountRow> for TaskProgressCounts {
    fn from(row: TaskProgressCountRow) -> Self {
        Self {
            task_id: row.task_id,
            in_progress: row.in_progress,
            completed: row.completed,
        }
    }
}
