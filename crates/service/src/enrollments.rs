//! Enrolment lifecycle.

use learnhub_core::access::{self, Principal};
use learnhub_core::course::CourseStatus;
use learnhub_core::enrollment::{self, EnrollDecision, EnrollmentStatus, UnenrollDecision};
use learnhub_core::error::CoreError;
use learnhub_core::types::DbId;
use learnhub_db::models::enrollment::{Enrollment, EnrollmentWithCourse};
use learnhub_db::repositories::EnrollmentRepo;

use crate::courses::find_course;
use crate::error::ServiceResult;
use crate::progress::sync_enrollment_status;
use crate::state::EngineState;

/// Users manage their own enrolments; admins manage anyone's.
fn require_self_or_admin(requester: &Principal, user_id: DbId) -> Result<(), CoreError> {
    if requester.user_id == user_id || requester.is_admin() {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Cannot manage another user's enrolments".into(),
        ))
    }
}

/// Enrol a user, or reactivate a dropped enrolment.
///
/// Reactivation keeps existing progress; if that progress already covers
/// every task the enrolment comes back as completed.
pub async fn enroll(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    course_id: DbId,
    settings: Option<&serde_json::Value>,
) -> ServiceResult<Enrollment> {
    require_self_or_admin(requester, user_id)?;
    if let Some(settings) = settings {
        enrollment::validate_settings(settings)?;
    }

    let mut tx = state.pool.begin().await?;
    let course = find_course(&mut *tx, course_id).await?;
    if course.status()? != CourseStatus::Published {
        return Err(CoreError::Validation(format!(
            "Course {course_id} is not open for enrolment"
        ))
        .into());
    }

    let existing = EnrollmentRepo::find_for_update(&mut tx, user_id, course_id).await?;
    let existing_status = existing
        .as_ref()
        .map(|e| EnrollmentStatus::from_str_value(&e.status))
        .transpose()?;

    let result = match (enrollment::decide_enroll(existing_status)?, existing) {
        (EnrollDecision::Reactivate, Some(row)) => {
            EnrollmentRepo::set_status(&mut *tx, row.id, EnrollmentStatus::Active.as_str()).await?;
            sync_enrollment_status(&mut tx, user_id, course_id).await?;
            EnrollmentRepo::find(&mut *tx, user_id, course_id)
                .await?
                .ok_or(CoreError::Internal("Reactivated enrolment vanished".into()))?
        }
        _ => {
            let default_settings = serde_json::json!({});
            EnrollmentRepo::create(
                &mut *tx,
                user_id,
                course_id,
                settings.unwrap_or(&default_settings),
            )
            .await?
        }
    };
    tx.commit().await?;

    tracing::info!(user_id, course_id, status = %result.status, "User enrolled");
    Ok(result)
}

/// Drop an enrolment. Dropping twice, or never having enrolled, succeeds without change.
pub async fn unenroll(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    course_id: DbId,
) -> ServiceResult<()> {
    require_self_or_admin(requester, user_id)?;

    let mut tx = state.pool.begin().await?;
    let existing = EnrollmentRepo::find_for_update(&mut tx, user_id, course_id).await?;
    let existing_status = existing
        .as_ref()
        .map(|e| EnrollmentStatus::from_str_value(&e.status))
        .transpose()?;

    match (enrollment::decide_unenroll(existing_status), existing) {
        (UnenrollDecision::Drop, Some(row)) => {
            EnrollmentRepo::set_status(&mut *tx, row.id, EnrollmentStatus::Dropped.as_str())
                .await?;
            tx.commit().await?;
            tracing::info!(user_id, course_id, "User unenrolled");
        }
        _ => {
            tracing::debug!(user_id, course_id, "Unenrol was a no-op");
        }
    }
    Ok(())
}

/// Enrolments visible to the requester.
///
/// Students see their own, instructors see those in courses they teach,
/// admins see all.
pub async fn list_enrolments(
    state: &EngineState,
    requester: &Principal,
) -> ServiceResult<Vec<EnrollmentWithCourse>> {
    let rows = if access::is_admin(requester) {
        EnrollmentRepo::list_all(&state.pool).await?
    } else if access::is_instructor_or_admin(requester) {
        EnrollmentRepo::list_for_teacher(&state.pool, requester.user_id).await?
    } else {
        EnrollmentRepo::list_for_user(&state.pool, requester.user_id).await?
    };
    tracing::debug!(user_id = requester.user_id, count = rows.len(), "Listed enrolments");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use learnhub_core::roles::Role;

    use super::*;

    #[test]
    fn only_self_or_admin_manage_enrolments() {
        let student = Principal::new(1, Role::Student, false);
        let instructor = Principal::new(2, Role::Instructor, false);
        let admin = Principal::new(3, Role::Admin, false);

        assert!(require_self_or_admin(&student, 1).is_ok());
        assert!(require_self_or_admin(&student, 4).is_err());
        assert!(require_self_or_admin(&instructor, 1).is_err());
        assert!(require_self_or_admin(&admin, 1).is_ok());
    }
}
