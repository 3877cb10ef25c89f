//! Learning task rules: type discriminator, ordering, and the deletion guard.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CONFLICT_TASK_HAS_PROGRESS};
use crate::types::DbId;

pub const TASK_TYPE_LEARNING: &str = "learning";
pub const TASK_TYPE_QUIZ: &str = "quiz";

pub const VALID_TASK_TYPES: &[&str] = &[TASK_TYPE_LEARNING, TASK_TYPE_QUIZ];

/// Maximum length for a task title.
pub const MAX_TASK_TITLE_LENGTH: usize = 200;

/// Discriminator for the task variants. Quiz-specific fields live in a side
/// record sharing the task's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Learning,
    Quiz,
}

impl TaskType {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            TASK_TYPE_LEARNING => Ok(Self::Learning),
            TASK_TYPE_QUIZ => Ok(Self::Quiz),
            _ => Err(CoreError::Validation(format!(
                "Invalid task type '{s}'. Must be one of: {}",
                VALID_TASK_TYPES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Learning => TASK_TYPE_LEARNING,
            Self::Quiz => TASK_TYPE_QUIZ,
        }
    }
}

pub fn validate_task_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Task title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TASK_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Task title exceeds maximum length of {MAX_TASK_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_order(order: i32) -> Result<(), CoreError> {
    if order < 0 {
        return Err(CoreError::Validation(format!(
            "Task order must be >= 0, got {order}"
        )));
    }
    Ok(())
}

/// The order assigned to a new task when none is given: one past the
/// current maximum, or 0 for the first task of a course.
pub fn next_order(current_max: Option<i32>) -> i32 {
    current_max.map_or(0, |max| max + 1)
}

/// Display ordering: by `order`, ties broken by id.
pub fn display_cmp(a: (i32, DbId), b: (i32, DbId)) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then(a.1.cmp(&b.1))
}

// ---------------------------------------------------------------------------
// Deletion guard
// ---------------------------------------------------------------------------

/// Student progress on one task, used to decide whether it may be deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskProgressCounts {
    pub task_id: DbId,
    pub in_progress: i64,
    pub completed: i64,
}

impl TaskProgressCounts {
    pub fn students_affected(&self) -> i64 {
        self.in_progress + self.completed
    }

    pub fn can_delete(&self) -> bool {
        self.students_affected() == 0
    }

    /// Structured payload attached to a refused deletion.
    pub fn details(&self) -> serde_json::Value {
        serde_json::json!({
            "task_id": self.task_id,
            "students_affected": self.students_affected(),
            "in_progress": self.in_progress,
            "completed": self.completed,
            "can_delete": self.can_delete(),
        })
    }
}

/// Refuse deletion when any student has started the task.
pub fn check_deletable(counts: &TaskProgressCounts) -> Result<(), CoreError> {
    if counts.can_delete() {
        return Ok(());
    }
    Err(CoreError::conflict_with_details(
        CONFLICT_TASK_HAS_PROGRESS,
        format!(
            "Task {} cannot be deleted: {} student(s) have started it",
            counts.task_id,
            counts.students_affected()
        ),
        counts.details(),
    ))
}

/// Refuse removing a group of tasks when any of them has been started.
///
/// The details total the started progress over the blocking tasks.
pub fn check_all_deletable(counts: &[TaskProgressCounts]) -> Result<(), CoreError> {
    let blocked: Vec<&TaskProgressCounts> = counts.iter().filter(|c| !c.can_delete()).collect();
    if blocked.is_empty() {
        return Ok(());
    }
    let in_progress: i64 = blocked.iter().map(|c| c.in_progress).sum();
    let completed: i64 = blocked.iter().map(|c| c.completed).sum();
    let task_ids: Vec<DbId> = blocked.iter().map(|c| c.task_id).collect();
    Err(CoreError::conflict_with_details(
        CONFLICT_TASK_HAS_PROGRESS,
        format!(
            "{} task(s) would be removed but students have started them",
            task_ids.len()
        ),
        serde_json::json!({
            "task_ids": task_ids,
            "students_affected": in_progress + completed,
            "in_progress": in_progress,
            "completed": completed,
            "can_delete": false,
        }),
    ))
}
