//! Per-task progress transitions and derived completion statistics.
//!
//! ```text
//! not_started ──▶ in_progress ──▶ completed
//!      ▲               │               │
//!      └──── admin reset ◀─────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CONFLICT_INVALID_STATUS_TRANSITION};
use crate::types::Timestamp;

pub const PROGRESS_NOT_STARTED: &str = "not_started";
pub const PROGRESS_IN_PROGRESS: &str = "in_progress";
pub const PROGRESS_COMPLETED: &str = "completed";

pub const VALID_PROGRESS_STATUSES: &[&str] =
    &[PROGRESS_NOT_STARTED, PROGRESS_IN_PROGRESS, PROGRESS_COMPLETED];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl ProgressStatus {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            PROGRESS_NOT_STARTED => Ok(Self::NotStarted),
            PROGRESS_IN_PROGRESS => Ok(Self::InProgress),
            PROGRESS_COMPLETED => Ok(Self::Completed),
            _ => Err(CoreError::Validation(format!(
                "Invalid progress status '{s}'. Must be one of: {}",
                VALID_PROGRESS_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => PROGRESS_NOT_STARTED,
            Self::InProgress => PROGRESS_IN_PROGRESS,
            Self::Completed => PROGRESS_COMPLETED,
        }
    }
}

/// The mutable part of a progress row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub status: ProgressStatus,
    pub start_date: Option<Timestamp>,
    pub completion_date: Option<Timestamp>,
}

impl ProgressState {
    pub fn not_started() -> Self {
        Self {
            status: ProgressStatus::NotStarted,
            start_date: None,
            completion_date: None,
        }
    }
}

/// Compute the state after moving to `to` at `now`.
///
/// - Entering `in_progress` stamps `start_date` only if it is unset.
/// - Entering `completed` stamps `completion_date`; a student jumping
///   straight from `not_started` passes through `in_progress`, so both
///   dates are stamped.
/// - Re-applying the current status is a no-op that keeps both dates.
/// - Any move back to `not_started` requires `admin_reset` and clears the dates.
/// - `completed → in_progress` is never allowed.
pub fn apply_transition(
    current: &ProgressState,
    to: ProgressStatus,
    now: Timestamp,
    admin_reset: bool,
) -> Result<ProgressState, CoreError> {
    use ProgressStatus::*;

    if current.status == to {
        return Ok(*current);
    }

    match (current.status, to) {
        (NotStarted, InProgress) => Ok(ProgressState {
            status: InProgress,
            start_date: current.start_date.or(Some(now)),
            completion_date: None,
        }),
        (NotStarted, Completed) | (InProgress, Completed) => Ok(ProgressState {
            status: Completed,
            start_date: current.start_date.or(Some(now)),
            completion_date: Some(now),
        }),
        (InProgress, NotStarted) | (Completed, NotStarted) if admin_reset => {
            Ok(ProgressState::not_started())
        }
        (from, to) => Err(CoreError::conflict_with_details(
            CONFLICT_INVALID_STATUS_TRANSITION,
            format!(
                "Cannot move task progress from {} to {}",
                from.as_str(),
                to.as_str()
            ),
            serde_json::json!({ "from": from.as_str(), "to": to.as_str() }),
        )),
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Progress counts for one enrolment, recomputed on every read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressStats {
    pub total: i64,
    pub completed: i64,
    pub in_progress: i64,
    pub not_started: i64,
    pub completion_percentage: f64,
}

impl ProgressStats {
    pub fn compute(total: i64, completed: i64, in_progress: i64) -> Self {
        let not_started = (total - (completed + in_progress)).max(0);
        Self {
            total,
            completed,
            in_progress,
            not_started,
            completion_percentage: completion_percentage(completed, total),
        }
    }

    pub fn is_course_completed(&self) -> bool {
        is_course_completed(self.total, self.completed)
    }
}

/// `completed / total · 100`, or 0 when there are no tasks.
pub fn completion_percentage(completed: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    round2(completed as f64 / total as f64 * 100.0)
}

/// A course is complete when every counted task is completed and there is at least one.
pub fn is_course_completed(total: i64, completed: i64) -> bool {
    total > 0 && completed == total
}

/// Round to two decimal places for presentation.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
