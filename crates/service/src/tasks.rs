//! Learning and quiz tasks of a course.

use learnhub_core::access::{self, Principal};
use learnhub_core::error::CoreError;
use learnhub_core::quiz::QuizSettings;
use learnhub_core::task::{self, TaskProgressCounts, TaskType};
use learnhub_core::types::DbId;
use learnhub_db::models::task::{CreateTask, Task, UpdateTask};
use learnhub_db::repositories::{QuizRepo, TaskRepo};
use sqlx::PgExecutor;

use crate::courses::{ensure_can_view, find_course, lock_course};
use crate::error::ServiceResult;
use crate::state::EngineState;
use crate::versions::track_task_set_change;

pub(crate) fn task_not_found(id: DbId) -> CoreError {
    CoreError::NotFound { entity: "Task", id }
}

pub(crate) async fn find_task<'e, E>(executor: E, task_id: DbId) -> ServiceResult<Task>
where
    E: PgExecutor<'e>,
{
    TaskRepo::find_by_id(executor, task_id)
        .await?
        .ok_or_else(|| task_not_found(task_id).into())
}

/// Tasks of a course in display order, filtered by the requester's task scope.
pub async fn list_tasks(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<Vec<Task>> {
    let course = find_course(&state.pool, course_id).await?;
    ensure_can_view(state, requester, &course).await?;

    let scope = access::task_scope(requester, course.creator_id);
    let tasks = TaskRepo::list_by_course(&state.pool, course_id, scope).await?;
    tracing::debug!(course_id, count = tasks.len(), ?scope, "Listed tasks");
    Ok(tasks)
}

/// Add a task. Without an explicit order it goes after the current last task.
///
/// Quiz tasks get their settings side record with default values.
pub async fn create_task(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    input: &CreateTask,
) -> ServiceResult<Task> {
    task::validate_task_title(&input.title)?;
    let task_type = match &input.task_type {
        Some(t) => TaskType::from_str_value(t)?,
        None => TaskType::Learning,
    };

    let mut tx = state.pool.begin().await?;
    let course = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;

    let sort_order = match input.sort_order {
        Some(order) => order,
        None => task::next_order(TaskRepo::max_sort_order(&mut *tx, course_id).await?),
    };
    task::validate_order(sort_order)?;

    let created = TaskRepo::create(&mut *tx, course_id, sort_order, task_type.as_str(), input).await?;
    if task_type == TaskType::Quiz {
        QuizRepo::upsert_settings(&mut *tx, created.id, &QuizSettings::default()).await?;
    }
    track_task_set_change(
        &mut tx,
        &course,
        requester.user_id,
        &format!("Added task '{}'", created.title),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(
        course_id,
        task_id = created.id,
        task_type = task_type.as_str(),
        sort_order,
        "Task created"
    );
    Ok(created)
}

pub async fn update_task(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
    input: &UpdateTask,
) -> ServiceResult<Task> {
    if let Some(title) = &input.title {
        task::validate_task_title(title)?;
    }
    if let Some(order) = input.sort_order {
        task::validate_order(order)?;
    }

    let existing = find_task(&state.pool, task_id).await?;
    let course = find_course(&state.pool, existing.course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;

    let updated = TaskRepo::update(&state.pool, task_id, input)
        .await?
        .ok_or_else(|| task_not_found(task_id))?;
    tracing::info!(task_id, course_id = course.id, "Task updated");
    Ok(updated)
}

/// Soft-delete a task nobody has started.
///
/// The course and task rows are locked while progress is counted, so the
/// check and the flag flip happen atomically.
pub async fn delete_task(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
) -> ServiceResult<()> {
    let course_id = find_task(&state.pool, task_id).await?.course_id;

    let mut tx = state.pool.begin().await?;
    let course = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;
    let existing = TaskRepo::find_for_update(&mut tx, task_id)
        .await?
        .filter(|t| !t.is_deleted)
        .ok_or_else(|| task_not_found(task_id))?;

    let counts = single_task_counts(&mut *tx, task_id).await?;
    task::check_deletable(&counts)?;

    TaskRepo::soft_delete(&mut *tx, task_id).await?;
    track_task_set_change(
        &mut tx,
        &course,
        requester.user_id,
        &format!("Removed task '{}'", existing.title),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(task_id, course_id, "Task soft-deleted");
    Ok(())
}

/// Clear the soft-delete flag.
pub async fn restore_task(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
) -> ServiceResult<Task> {
    let course_id = find_task(&state.pool, task_id).await?.course_id;

    let mut tx = state.pool.begin().await?;
    let course = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;

    if !TaskRepo::restore(&mut *tx, task_id).await? {
        return Err(CoreError::Validation(format!("Task {task_id} is not deleted")).into());
    }
    let restored = find_task(&mut *tx, task_id).await?;
    track_task_set_change(
        &mut tx,
        &course,
        requester.user_id,
        &format!("Restored task '{}'", restored.title),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(task_id, course_id, "Task restored");
    Ok(restored)
}

/// Per-task tallies of started progress, so callers can tell whether
/// deletion would be refused. Unknown ids are omitted.
pub async fn progress_counts(
    state: &EngineState,
    requester: &Principal,
    task_ids: &[DbId],
) -> ServiceResult<Vec<TaskProgressCounts>> {
    access::require_instructor_or_admin(requester)?;
    let rows = TaskRepo::progress_counts(&state.pool, task_ids).await?;
    Ok(rows.into_iter().map(TaskProgressCounts::from).collect())
}

async fn single_task_counts<'e, E>(executor: E, task_id: DbId) -> ServiceResult<TaskProgressCounts>
where
    E: PgExecutor<'e>,
{
    let row = TaskRepo::progress_counts(executor, &[task_id])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| task_not_found(task_id))?;
    Ok(row.into())
}
