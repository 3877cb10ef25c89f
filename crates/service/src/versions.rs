//! Course versions: explicit snapshots, rollback, comparison and audit reads.

use learnhub_core::access::{self, Principal};
use learnhub_core::course::{self, CourseStatus, PublishChecklist};
use learnhub_core::error::CoreError;
use learnhub_core::task::{self, TaskProgressCounts};
use learnhub_core::types::DbId;
use learnhub_core::versioning::{self, CourseSnapshot, VersionComparison};
use learnhub_db::models::course::Course;
use learnhub_db::models::course_version::{CourseVersion, CreateCourseVersion};
use learnhub_db::models::status_transition::{CreateStatusTransition, StatusTransition};
use learnhub_db::repositories::{
    CourseRepo, CourseVersionRepo, InstructorRepo, StatusTransitionRepo, TaskRepo,
};
use sqlx::PgConnection;

use crate::courses::{course_not_found, find_course, lock_course};
use crate::error::ServiceResult;
use crate::state::EngineState;

/// Persist the snapshot of `course` at its current version number.
pub(crate) async fn record_version(
    conn: &mut PgConnection,
    course: &Course,
    actor: DbId,
    notes: &str,
) -> ServiceResult<CourseVersion> {
    let task_ids = TaskRepo::live_task_ids(&mut *conn, course.id).await?;
    let snapshot = course.snapshot(task_ids)?;
    let version = CourseVersionRepo::create(
        &mut *conn,
        &CreateCourseVersion {
            course_id: course.id,
            version_number: course.version,
            content_snapshot: snapshot.to_json(),
            notes: notes.to_string(),
            created_by: actor,
        },
    )
    .await?;
    tracing::info!(course_id = course.id, version = course.version, "Course version created");
    Ok(version)
}

/// Rewrite the current version's snapshot from the live course state.
///
/// Used for changes that do not bump the version, so that version N always
/// holds the state the course had while it was at N.
pub(crate) async fn refresh_current_version(
    conn: &mut PgConnection,
    course: &Course,
) -> ServiceResult<()> {
    let task_ids = TaskRepo::live_task_ids(&mut *conn, course.id).await?;
    let snapshot = course.snapshot(task_ids)?;
    CourseVersionRepo::refresh_snapshot(&mut *conn, course.id, course.version, &snapshot.to_json())
        .await?;
    tracing::debug!(course_id = course.id, version = course.version, "Course version refreshed");
    Ok(())
}

/// Follow a change to the live task set of a locked course.
///
/// A published course gets a new version; any other course has its current
/// version refreshed.
pub(crate) async fn track_task_set_change(
    conn: &mut PgConnection,
    course: &Course,
    actor: DbId,
    notes: &str,
) -> ServiceResult<()> {
    if !course.status()?.is_versioned_on_edit() {
        return refresh_current_version(conn, course).await;
    }
    let bumped = CourseRepo::set_version(&mut *conn, course.id, course.version + 1)
        .await?
        .ok_or_else(|| course_not_found(course.id))?;
    record_version(conn, &bumped, actor, notes).await?;
    Ok(())
}

async fn load_snapshot(
    conn: &mut PgConnection,
    course_id: DbId,
    version_number: i32,
) -> ServiceResult<CourseSnapshot> {
    let version = CourseVersionRepo::find(conn, course_id, version_number)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "CourseVersion",
            id: version_number as DbId,
        })?;
    Ok(CourseSnapshot::from_json(&version.content_snapshot)?)
}

/// Bump the version and snapshot the current state.
pub async fn create_version(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    notes: &str,
) -> ServiceResult<CourseVersion> {
    versioning::validate_notes(notes)?;

    let mut tx = state.pool.begin().await?;
    let current = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, current.creator_id)?;

    let course = CourseRepo::set_version(&mut *tx, course_id, current.version + 1)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    let version = record_version(&mut tx, &course, requester.user_id, notes.trim()).await?;
    tx.commit().await?;

    Ok(version)
}

/// Restore the state captured in `version_number` as a new version.
///
/// Content fields and the task set come from the snapshot. The snapshot
/// status is applied only along a valid status-machine edge, and a move to
/// published must pass the publish checklist. Tasks leaving the live set must
/// be unstarted. Older versions are never modified.
pub async fn rollback_version(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    version_number: i32,
    reason: &str,
) -> ServiceResult<CourseVersion> {
    versioning::validate_notes(reason)?;

    let mut tx = state.pool.begin().await?;
    let current = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, current.creator_id)?;
    versioning::validate_version_number(version_number, current.version)?;

    let snapshot = load_snapshot(&mut tx, course_id, version_number).await?;
    let from = current.status()?;
    let to = versioning::rollback_status(from, snapshot.status)?;

    let keep = snapshot.task_set();
    let removed: Vec<DbId> = TaskRepo::lock_live_task_ids(&mut tx, course_id)
        .await?
        .into_iter()
        .filter(|id| !keep.contains(id))
        .collect();
    if !removed.is_empty() {
        let counts: Vec<TaskProgressCounts> = TaskRepo::progress_counts(&mut *tx, &removed)
            .await?
            .into_iter()
            .map(TaskProgressCounts::from)
            .collect();
        task::check_all_deletable(&counts)?;
    }
    TaskRepo::reassign_live_set(&mut tx, course_id, &snapshot.task_ids).await?;

    if to == CourseStatus::Published && from != CourseStatus::Published {
        let checklist = PublishChecklist {
            title: snapshot.title.clone(),
            description: snapshot.description.clone(),
            learning_objectives: snapshot.learning_objectives.clone(),
            instructor_count: InstructorRepo::count(&mut *tx, course_id).await?,
            task_count: TaskRepo::count_live(&mut *tx, course_id).await?,
        };
        course::check_publishable(&checklist)?;
    }

    let new_version = current.version + 1;
    let visibility = course::visibility_after_transition(to, snapshot.visibility);
    let restored = CourseRepo::apply_snapshot(
        &mut *tx,
        course_id,
        &snapshot,
        to.as_str(),
        visibility.as_str(),
        new_version,
    )
    .await?
    .ok_or_else(|| course_not_found(course_id))?;

    let notes = versioning::rollback_notes(version_number, reason);
    if from != to {
        StatusTransitionRepo::create(
            &mut *tx,
            &CreateStatusTransition {
                course_id,
                from_status: from.as_str().to_string(),
                to_status: to.as_str().to_string(),
                changed_by: requester.user_id,
                reason: notes.clone(),
            },
        )
        .await?;
    }

    let version = record_version(&mut tx, &restored, requester.user_id, &notes).await?;
    tx.commit().await?;

    tracing::info!(
        course_id,
        target_version = version_number,
        new_version,
        status = to.as_str(),
        removed_tasks = removed.len(),
        "Course rolled back"
    );
    Ok(version)
}

/// Field-wise diff of two recorded versions.
pub async fn compare_versions(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    from_version: i32,
    to_version: i32,
) -> ServiceResult<VersionComparison> {
    let course = find_course(&state.pool, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;
    versioning::validate_version_number(from_version, course.version)?;
    versioning::validate_version_number(to_version, course.version)?;

    let mut conn = state.pool.acquire().await?;
    let from = load_snapshot(&mut conn, course_id, from_version).await?;
    let to = load_snapshot(&mut conn, course_id, to_version).await?;

    Ok(versioning::compare_snapshots(from_version, &from, to_version, &to))
}

/// Every version of a course, newest first.
pub async fn list_versions(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<Vec<CourseVersion>> {
    let course = find_course(&state.pool, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;
    Ok(CourseVersionRepo::list_by_course(&state.pool, course_id).await?)
}

/// Status audit trail, oldest first.
pub async fn list_status_transitions(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<Vec<StatusTransition>> {
    let course = find_course(&state.pool, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;
    Ok(StatusTransitionRepo::list_by_course(&state.pool, course_id).await?)
}
