//! Task progress and course completion.

use learnhub_core::access::{self, Principal};
use learnhub_core::enrollment::{self, EnrollmentStatus};
use learnhub_core::error::CoreError;
use learnhub_core::progress::{self, ProgressState, ProgressStats, ProgressStatus};
use learnhub_core::task::TaskType;
use learnhub_core::types::DbId;
use learnhub_db::models::progress::{TaskProgress, TaskProgressView};
use learnhub_db::repositories::{EnrollmentRepo, ProgressRepo};
use serde::Serialize;
use sqlx::PgConnection;

use crate::courses::{find_course, is_enrolled};
use crate::error::ServiceResult;
use crate::state::EngineState;
use crate::tasks::{find_task, task_not_found};

/// One user's progress through one course, recomputed on every read.
#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub user_id: DbId,
    pub course_id: DbId,
    pub stats: ProgressStats,
    pub is_completed: bool,
    pub tasks: Vec<TaskProgressView>,
}

// ---------------------------------------------------------------------------
// Shared transaction steps
// ---------------------------------------------------------------------------

/// Re-derive the enrolment status from current progress.
///
/// Returns the new status when it changed. Users without an enrolment, and
/// dropped enrolments, are left alone.
pub(crate) async fn sync_enrollment_status(
    conn: &mut PgConnection,
    user_id: DbId,
    course_id: DbId,
) -> ServiceResult<Option<EnrollmentStatus>> {
    let Some(row) = EnrollmentRepo::find_for_update(&mut *conn, user_id, course_id).await? else {
        return Ok(None);
    };
    let current = EnrollmentStatus::from_str_value(&row.status)?;

    let counts = ProgressRepo::counts_for_course(&mut *conn, user_id, course_id).await?;
    let completed = progress::is_course_completed(counts.total, counts.completed);
    let next = enrollment::status_after_progress(current, completed);
    if next == current {
        return Ok(None);
    }

    EnrollmentRepo::set_status(&mut *conn, row.id, next.as_str()).await?;
    tracing::info!(
        user_id,
        course_id,
        from = current.as_str(),
        to = next.as_str(),
        "Enrolment status changed by progress"
    );
    Ok(Some(next))
}

/// Apply a validated transition to a progress row, creating it on first touch.
pub(crate) async fn write_progress(
    conn: &mut PgConnection,
    user_id: DbId,
    task_id: DbId,
    to: ProgressStatus,
    admin_reset: bool,
    time_spent_increment: i64,
) -> ServiceResult<TaskProgress> {
    let current = match ProgressRepo::find_for_update(&mut *conn, user_id, task_id).await? {
        Some(row) => row.state()?,
        None => ProgressState::not_started(),
    };
    let next = progress::apply_transition(&current, to, chrono::Utc::now(), admin_reset)?;
    let row = ProgressRepo::upsert(&mut *conn, user_id, task_id, &next, time_spent_increment).await?;
    Ok(row)
}

fn rank(status: ProgressStatus) -> u8 {
    match status {
        ProgressStatus::NotStarted => 0,
        ProgressStatus::InProgress => 1,
        ProgressStatus::Completed => 2,
    }
}

/// Move progress forward to `to`, leaving rows already at or past it untouched.
pub(crate) async fn advance_progress(
    conn: &mut PgConnection,
    user_id: DbId,
    task_id: DbId,
    to: ProgressStatus,
) -> ServiceResult<()> {
    let current = ProgressRepo::find_for_update(&mut *conn, user_id, task_id)
        .await?
        .map(|row| row.state())
        .transpose()?
        .unwrap_or_else(ProgressState::not_started);
    if rank(current.status) >= rank(to) {
        return Ok(());
    }
    let next = progress::apply_transition(&current, to, chrono::Utc::now(), false)?;
    ProgressRepo::upsert(&mut *conn, user_id, task_id, &next, 0).await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Per-task progress and derived statistics for one user in one course.
pub async fn get_task_progress(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    course_id: DbId,
) -> ServiceResult<CourseProgress> {
    access::require_progress_reader(requester, user_id)?;
    find_course(&state.pool, course_id).await?;

    let tasks = ProgressRepo::list_for_course(&state.pool, user_id, course_id).await?;
    let counts = ProgressRepo::counts_for_course(&state.pool, user_id, course_id).await?;
    let stats = ProgressStats::compute(counts.total, counts.completed, counts.in_progress);

    Ok(CourseProgress {
        user_id,
        course_id,
        is_completed: stats.is_course_completed(),
        stats,
        tasks,
    })
}

/// Record a progress change for `user_id` on `task_id`.
///
/// Users update their own progress; admins may update anyone's and are the
/// only ones allowed to reset a task to `not_started`. Quiz tasks complete
/// through a passing attempt, not through this call. `time_spent_secs` is
/// added to the accumulated time on the row.
pub async fn update_task_status(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    task_id: DbId,
    new_status: ProgressStatus,
    time_spent_secs: Option<i64>,
) -> ServiceResult<TaskProgress> {
    let admin = requester.is_admin();
    if requester.user_id != user_id && !admin {
        return Err(CoreError::Forbidden("Cannot update another user's progress".into()).into());
    }
    let increment = time_spent_secs.unwrap_or(0);
    if increment < 0 {
        return Err(CoreError::Validation("Time spent must not be negative".into()).into());
    }

    let task = find_task(&state.pool, task_id).await?;
    if task.is_deleted || !task.is_published {
        return Err(task_not_found(task_id).into());
    }
    if TaskType::from_str_value(&task.task_type)? == TaskType::Quiz
        && new_status == ProgressStatus::Completed
        && !admin
    {
        return Err(CoreError::Validation(
            "Quiz tasks are completed by passing an attempt".into(),
        )
        .into());
    }
    if !is_enrolled(&state.pool, user_id, task.course_id).await? {
        return Err(CoreError::Forbidden("User is not enrolled in this course".into()).into());
    }

    let mut tx = state.pool.begin().await?;
    let row = write_progress(&mut tx, user_id, task_id, new_status, admin, increment).await?;
    sync_enrollment_status(&mut tx, user_id, task.course_id).await?;
    tx.commit().await?;

    tracing::info!(
        user_id,
        task_id,
        course_id = task.course_id,
        status = new_status.as_str(),
        "Task progress updated"
    );
    Ok(row)
}

/// Whether the user has completed every visible task of the course.
pub async fn is_course_completed(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    course_id: DbId,
) -> ServiceResult<bool> {
    access::require_progress_reader(requester, user_id)?;
    find_course(&state.pool, course_id).await?;
    let counts = ProgressRepo::counts_for_course(&state.pool, user_id, course_id).await?;
    Ok(progress::is_course_completed(counts.total, counts.completed))
}
