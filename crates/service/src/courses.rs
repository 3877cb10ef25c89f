//! Course catalogue: listing, authoring, status machine and instructors.

use learnhub_core::access::{self, Principal};
use learnhub_core::course::{self, CourseStatus, PublishChecklist, Visibility};
use learnhub_core::enrollment::EnrollmentStatus;
use learnhub_core::error::CoreError;
use learnhub_core::types::DbId;
use learnhub_db::models::course::{Course, CourseListParams, CreateCourse, UpdateCourse};
use learnhub_db::models::course_instructor::{CourseInstructor, CourseInstructorWithUser};
use learnhub_db::models::status_transition::CreateStatusTransition;
use learnhub_db::repositories::{
    CourseRepo, EnrollmentRepo, InstructorRepo, StatusTransitionRepo, TaskRepo, UserRepo,
};
use sqlx::{PgConnection, PgExecutor};

use crate::auth::principal_for;
use crate::error::ServiceResult;
use crate::state::EngineState;
use crate::versions::{record_version, refresh_current_version};

// ---------------------------------------------------------------------------
// Shared lookups
// ---------------------------------------------------------------------------

pub(crate) fn course_not_found(id: DbId) -> CoreError {
    CoreError::NotFound {
        entity: "Course",
        id,
    }
}

pub(crate) async fn find_course<'e, E>(executor: E, course_id: DbId) -> ServiceResult<Course>
where
    E: PgExecutor<'e>,
{
    CourseRepo::find_by_id(executor, course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id).into())
}

pub(crate) async fn lock_course(conn: &mut PgConnection, course_id: DbId) -> ServiceResult<Course> {
    CourseRepo::find_for_update(conn, course_id)
        .await?
        .ok_or_else(|| course_not_found(course_id).into())
}

/// Whether the user holds an enrolment that grants access (active or completed).
pub(crate) async fn is_enrolled<'e, E>(
    executor: E,
    user_id: DbId,
    course_id: DbId,
) -> ServiceResult<bool>
where
    E: PgExecutor<'e>,
{
    match EnrollmentRepo::find(executor, user_id, course_id).await? {
        Some(enrollment) => Ok(EnrollmentStatus::from_str_value(&enrollment.status)?.grants_access()),
        None => Ok(false),
    }
}

/// Catalogue visibility, widened to courses the requester is enrolled in.
pub(crate) async fn ensure_can_view(
    state: &EngineState,
    requester: &Principal,
    course: &Course,
) -> ServiceResult<()> {
    if access::can_view_course(requester, course.creator_id, course.status()?) {
        return Ok(());
    }
    if is_enrolled(&state.pool, requester.user_id, course.id).await? {
        return Ok(());
    }
    Err(CoreError::Forbidden("Course is not visible to you".into()).into())
}

fn validate_fields(
    title: Option<&str>,
    description: Option<&str>,
    learning_objectives: Option<&str>,
    prerequisites: Option<&str>,
    visibility: Option<&str>,
) -> Result<(), CoreError> {
    if let Some(title) = title {
        course::validate_title(title)?;
    }
    for (field, value) in [
        ("Description", description),
        ("Learning objectives", learning_objectives),
        ("Prerequisites", prerequisites),
    ] {
        if let Some(value) = value {
            course::validate_text_field(field, value)?;
        }
    }
    if let Some(visibility) = visibility {
        Visibility::from_str_value(visibility)?;
    }
    Ok(())
}

/// Summarise which fields an edit touches, for version notes.
fn edit_notes(input: &UpdateCourse) -> String {
    let mut fields = Vec::new();
    if input.title.is_some() {
        fields.push("title");
    }
    if input.description.is_some() {
        fields.push("description");
    }
    if input.learning_objectives.is_some() {
        fields.push("learning_objectives");
    }
    if input.prerequisites.is_some() {
        fields.push("prerequisites");
    }
    if input.visibility.is_some() {
        fields.push("visibility");
    }
    format!("Updated {}", fields.join(", "))
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

pub async fn list_courses(
    state: &EngineState,
    requester: &Principal,
    params: &CourseListParams,
) -> ServiceResult<Vec<Course>> {
    if let Some(status) = &params.status {
        CourseStatus::from_str_value(status)?;
    }
    let scope = access::course_scope(requester);
    let courses = CourseRepo::list(&state.pool, scope, params).await?;
    tracing::debug!(user_id = requester.user_id, count = courses.len(), "Listed courses");
    Ok(courses)
}

pub async fn get_course(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<Course> {
    let course = find_course(&state.pool, course_id).await?;
    ensure_can_view(state, requester, &course).await?;
    Ok(course)
}

/// Create a draft course owned by the requester.
///
/// The creator is assigned as an instructor and version 1 is recorded.
pub async fn create_course(
    state: &EngineState,
    requester: &Principal,
    input: &CreateCourse,
) -> ServiceResult<Course> {
    access::require_instructor_or_admin(requester)?;
    validate_fields(
        Some(&input.title),
        input.description.as_deref(),
        input.learning_objectives.as_deref(),
        input.prerequisites.as_deref(),
        input.visibility.as_deref(),
    )?;

    let mut tx = state.pool.begin().await?;
    let course = CourseRepo::create(&mut *tx, requester.user_id, input).await?;
    InstructorRepo::assign(&mut *tx, course.id, requester.user_id, requester.user_id).await?;
    record_version(&mut tx, &course, requester.user_id, "Initial version").await?;
    tx.commit().await?;

    tracing::info!(course_id = course.id, creator_id = requester.user_id, "Course created");
    Ok(course)
}

/// Edit a course. Editing a published course records a new version; other
/// edits refresh the current one.
pub async fn update_course(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    input: &UpdateCourse,
) -> ServiceResult<Course> {
    validate_fields(
        input.title.as_deref(),
        input.description.as_deref(),
        input.learning_objectives.as_deref(),
        input.prerequisites.as_deref(),
        input.visibility.as_deref(),
    )?;

    let mut tx = state.pool.begin().await?;
    let current = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, current.creator_id)?;

    if input.is_empty() {
        return Ok(current);
    }

    let versioned = current.status()?.is_versioned_on_edit();
    let version = if versioned {
        current.version + 1
    } else {
        current.version
    };

    let updated = CourseRepo::update(&mut *tx, course_id, input, version)
        .await?
        .ok_or_else(|| course_not_found(course_id))?;
    if versioned {
        record_version(&mut tx, &updated, requester.user_id, &edit_notes(input)).await?;
    } else {
        refresh_current_version(&mut tx, &updated).await?;
    }
    tx.commit().await?;

    tracing::info!(course_id, version = updated.version, versioned, "Course updated");
    Ok(updated)
}

/// Move a course along the status machine and audit the change.
///
/// The status is written into the current version rather than a new one.
pub async fn transition_status(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    to: CourseStatus,
    reason: &str,
) -> ServiceResult<Course> {
    course::validate_reason(reason)?;

    let mut tx = state.pool.begin().await?;
    let current = lock_course(&mut tx, course_id).await?;
    access::require_course_creator(requester, current.creator_id)?;

    let from = current.status()?;
    course::validate_transition(from, to)?;

    if to == CourseStatus::Published {
        let checklist = PublishChecklist {
            title: current.title.clone(),
            description: current.description.clone(),
            learning_objectives: current.learning_objectives.clone(),
            instructor_count: InstructorRepo::count(&mut *tx, course_id).await?,
            task_count: TaskRepo::count_live(&mut *tx, course_id).await?,
        };
        course::check_publishable(&checklist)?;
    }

    let visibility =
        course::visibility_after_transition(to, Visibility::from_str_value(&current.visibility)?);
    let updated = CourseRepo::set_status(&mut *tx, course_id, to.as_str(), visibility.as_str())
        .await?
        .ok_or_else(|| course_not_found(course_id))?;

    StatusTransitionRepo::create(
        &mut *tx,
        &CreateStatusTransition {
            course_id,
            from_status: from.as_str().to_string(),
            to_status: to.as_str().to_string(),
            changed_by: requester.user_id,
            reason: reason.trim().to_string(),
        },
    )
    .await?;
    refresh_current_version(&mut tx, &updated).await?;
    tx.commit().await?;

    tracing::info!(
        course_id,
        from = from.as_str(),
        to = to.as_str(),
        actor = requester.user_id,
        "Course status changed"
    );
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Instructors
// ---------------------------------------------------------------------------

pub async fn assign_instructor(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    user_id: DbId,
) -> ServiceResult<CourseInstructor> {
    let course = find_course(&state.pool, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user_id,
        })?;
    if !principal_for(&user)?.is_instructor_or_admin() || !user.is_active {
        return Err(CoreError::Validation(format!(
            "User {user_id} cannot teach: instructor role and an active account are required"
        ))
        .into());
    }

    let assignment = InstructorRepo::assign(&state.pool, course_id, user_id, requester.user_id).await?;
    tracing::info!(course_id, user_id, "Instructor assigned");
    Ok(assignment)
}

pub async fn remove_instructor(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
    user_id: DbId,
) -> ServiceResult<()> {
    let course = find_course(&state.pool, course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;

    if !InstructorRepo::remove(&state.pool, course_id, user_id).await? {
        return Err(CoreError::NotFound {
            entity: "CourseInstructor",
            id: user_id,
        }
        .into());
    }
    tracing::info!(course_id, user_id, "Instructor removed");
    Ok(())
}

pub async fn list_instructors(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<Vec<CourseInstructorWithUser>> {
    let course = find_course(&state.pool, course_id).await?;
    ensure_can_view(state, requester, &course).await?;
    Ok(InstructorRepo::list_by_course(&state.pool, course_id).await?)
}
