//! Capability predicates and visibility scopes.
//!
//! Authorisation is a table of predicates over a [`Principal`] rather than a
//! per-role type hierarchy. `is_staff` always counts as admin. Predicates
//! that need stored facts (creator id, enrolment) take them as arguments so
//! this module stays free of database access.

use serde::Serialize;

use crate::course::CourseStatus;
use crate::error::CoreError;
use crate::roles::Role;
use crate::types::DbId;

/// The authenticated identity an operation runs on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: DbId,
    pub role: Role,
    pub is_staff: bool,
}

impl Principal {
    pub fn new(user_id: DbId, role: Role, is_staff: bool) -> Self {
        Self {
            user_id,
            role,
            is_staff,
        }
    }

    pub fn is_admin(&self) -> bool {
        is_admin(self)
    }

    pub fn is_instructor_or_admin(&self) -> bool {
        is_instructor_or_admin(self)
    }
}

/// `role = admin` or `is_staff`.
pub fn is_admin(principal: &Principal) -> bool {
    principal.role == Role::Admin || principal.is_staff
}

/// `role ∈ {instructor, admin}` or `is_staff`.
pub fn is_instructor_or_admin(principal: &Principal) -> bool {
    matches!(principal.role, Role::Instructor | Role::Admin) || principal.is_staff
}

/// The principal created the course, or is an admin.
pub fn is_course_creator(principal: &Principal, course_creator_id: DbId) -> bool {
    principal.user_id == course_creator_id || is_admin(principal)
}

/// A student may read only their own progress; instructors and admins may read anyone's.
pub fn can_read_progress_of(principal: &Principal, target_user_id: DbId) -> bool {
    principal.user_id == target_user_id || is_instructor_or_admin(principal)
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

pub fn require_admin(principal: &Principal) -> Result<(), CoreError> {
    if is_admin(principal) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Admin role required".into()))
    }
}

pub fn require_instructor_or_admin(principal: &Principal) -> Result<(), CoreError> {
    if is_instructor_or_admin(principal) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Instructor or Admin role required".into(),
        ))
    }
}

pub fn require_course_creator(
    principal: &Principal,
    course_creator_id: DbId,
) -> Result<(), CoreError> {
    if is_course_creator(principal, course_creator_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Only the course creator or an admin may modify this course".into(),
        ))
    }
}

pub fn require_progress_reader(
    principal: &Principal,
    target_user_id: DbId,
) -> Result<(), CoreError> {
    if can_read_progress_of(principal, target_user_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(
            "Students may only read their own progress".into(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Which courses a principal may list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseScope {
    /// Every course at any status.
    All,
    /// Published courses plus every course created by this user.
    PublishedOrCreatedBy(DbId),
    /// Published courses only.
    PublishedOnly,
}

pub fn course_scope(principal: &Principal) -> CourseScope {
    if is_admin(principal) {
        CourseScope::All
    } else if is_instructor_or_admin(principal) {
        CourseScope::PublishedOrCreatedBy(principal.user_id)
    } else {
        CourseScope::PublishedOnly
    }
}

/// Whether a single course is visible under the listing rules.
pub fn can_view_course(principal: &Principal, creator_id: DbId, status: CourseStatus) -> bool {
    match course_scope(principal) {
        CourseScope::All => true,
        CourseScope::PublishedOrCreatedBy(uid) => {
            status == CourseStatus::Published || creator_id == uid
        }
        CourseScope::PublishedOnly => status == CourseStatus::Published,
    }
}

/// Which tasks of one course a principal may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskScope {
    /// Every task, soft-deleted and unpublished ones included.
    All,
    /// Published, non-deleted tasks.
    PublishedOnly,
}

pub fn task_scope(principal: &Principal, course_creator_id: DbId) -> TaskScope {
    if is_course_creator(principal, course_creator_id) {
        TaskScope::All
    } else {
        TaskScope::PublishedOnly
    }
}

/// Whether one task is visible to the principal.
pub fn can_view_task(
    principal: &Principal,
    course_creator_id: DbId,
    is_published: bool,
    is_deleted: bool,
) -> bool {
    match task_scope(principal, course_creator_id) {
        TaskScope::All => true,
        TaskScope::PublishedOnly => is_published && !is_deleted,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(id: DbId) -> Principal {
        Principal::new(id, Role::Student, false)
    }

    fn instructor(id: DbId) -> Principal {
        Principal::new(id, Role::Instructor, false)
    }

    fn admin(id: DbId) -> Principal {
        Principal::new(id, Role::Admin, false)
    }

    #[test]
    fn staff_flag_counts_as_admin() {
        let staff_student = Principal::new(7, Role::Student, true);
        assert!(is_admin(&staff_student));
        assert!(is_instructor_or_admin(&staff_student));
        assert!(is_course_creator(&staff_student, 99));
    }

    #[test]
    fn instructor_is_not_admin() {
        assert!(!is_admin(&instructor(1)));
        assert!(is_instructor_or_admin(&instructor(1)));
    }

    #[test]
    fn student_has_no_elevated_capability() {
        let s = student(1);
        assert!(!is_admin(&s));
        assert!(!is_instructor_or_admin(&s));
        assert!(!is_course_creator(&s, 2));
    }

    #[test]
    fn creator_matches_own_course_only() {
        assert!(is_course_creator(&instructor(5), 5));
        assert!(!is_course_creator(&instructor(5), 6));
    }

    #[test]
    fn progress_readers() {
        assert!(can_read_progress_of(&student(3), 3));
        assert!(!can_read_progress_of(&student(3), 4));
        assert!(can_read_progress_of(&instructor(1), 4));
        assert!(require_progress_reader(&student(3), 4).is_err());
    }

    #[test]
    fn scopes_by_role() {
        assert_eq!(course_scope(&admin(1)), CourseScope::All);
        assert_eq!(
            course_scope(&instructor(2)),
            CourseScope::PublishedOrCreatedBy(2)
        );
        assert_eq!(course_scope(&student(3)), CourseScope::PublishedOnly);
    }

    #[test]
    fn students_never_see_unpublished_courses() {
        let s = student(3);
        for status in [
            CourseStatus::Draft,
            CourseStatus::Archived,
            CourseStatus::Deprecated,
        ] {
            assert!(!can_view_course(&s, 3, status));
        }
        assert!(can_view_course(&s, 9, CourseStatus::Published));
    }

    #[test]
    fn instructors_see_own_drafts() {
        let i = instructor(2);
        assert!(can_view_course(&i, 2, CourseStatus::Draft));
        assert!(!can_view_course(&i, 3, CourseStatus::Draft));
        assert!(can_view_course(&i, 3, CourseStatus::Published));
    }

    #[test]
    fn task_visibility_cascade() {
        // Owner sees everything.
        assert!(can_view_task(&instructor(2), 2, false, true));
        // Other instructors see only published, live tasks.
        assert!(!can_view_task(&instructor(3), 2, false, false));
        assert!(can_view_task(&instructor(3), 2, true, false));
        // Students never see deleted tasks.
        assert!(!can_view_task(&student(4), 2, true, true));
        assert!(can_view_task(&student(4), 2, true, false));
        // Admin sees all.
        assert!(can_view_task(&admin(1), 2, false, true));
    }

    #[test]
    fn guards_return_forbidden() {
        let err = require_admin(&instructor(1)).unwrap_err();
        assert_eq!(err.code(), "forbidden");
        assert!(require_instructor_or_admin(&student(1)).is_err());
        assert!(require_course_creator(&instructor(1), 2).is_err());
        assert!(require_course_creator(&admin(1), 2).is_ok());
    }
}
