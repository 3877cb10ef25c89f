//! Task progress model.

use learnhub_core::progress::{ProgressState, ProgressStatus};
use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `task_progress` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TaskProgress {
    pub id: DbId,
    pub user_id: DbId,
    pub task_id: DbId,
    pub status: String,
    pub start_date: Option<Timestamp>,
    pub completion_date: Option<Timestamp>,
    pub time_spent_secs: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TaskProgress {
    /// The transition-relevant part of the row.
    pub fn state(&self) -> Result<ProgressState, learnhub_core::error::CoreError> {
        Ok(ProgressState {
            status: ProgressStatus::from_str_value(&self.status)?,
            start_date: self.start_date,
            completion_date: self.completion_date,
        })
    }
}

/// A visible task joined with one user's progress; tasks without a row read as `not_started`.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct TaskProgressView {
    pub task_id: DbId,
    pub title: String,
    pub task_type: String,
    pub sort_order: i32,
    pub status: String,
    pub start_date: Option<Timestamp>,
    pub completion_date: Option<Timestamp>,
    pub time_spent_secs: i64,
    pub updated_at: Option<Timestamp>,
}

/// Completion counts of one user over a course's visible tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, FromRow)]
pub struct ProgressCountRow {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
}
