//! Enrolment state rules.
//!
//! One row per (user, course); unenrolment flips the status rather than
//! deleting the row, so re-enrolment reactivates the same row.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CONFLICT_ALREADY_ENROLLED};

pub const ENROLLMENT_ACTIVE: &str = "active";
pub const ENROLLMENT_COMPLETED: &str = "completed";
pub const ENROLLMENT_DROPPED: &str = "dropped";

pub const VALID_ENROLLMENT_STATUSES: &[&str] =
    &[ENROLLMENT_ACTIVE, ENROLLMENT_COMPLETED, ENROLLMENT_DROPPED];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            ENROLLMENT_ACTIVE => Ok(Self::Active),
            ENROLLMENT_COMPLETED => Ok(Self::Completed),
            ENROLLMENT_DROPPED => Ok(Self::Dropped),
            _ => Err(CoreError::Validation(format!(
                "Invalid enrollment status '{s}'. Must be one of: {}",
                VALID_ENROLLMENT_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => ENROLLMENT_ACTIVE,
            Self::Completed => ENROLLMENT_COMPLETED,
            Self::Dropped => ENROLLMENT_DROPPED,
        }
    }

    /// Active and completed enrolments both grant course access.
    pub fn grants_access(&self) -> bool {
        !matches!(self, Self::Dropped)
    }
}

/// What `enroll` must do given the existing row (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrollDecision {
    Create,
    Reactivate,
}

pub fn decide_enroll(existing: Option<EnrollmentStatus>) -> Result<EnrollDecision, CoreError> {
    match existing {
        None => Ok(EnrollDecision::Create),
        Some(EnrollmentStatus::Dropped) => Ok(EnrollDecision::Reactivate),
        Some(status) => Err(CoreError::conflict_with_details(
            CONFLICT_ALREADY_ENROLLED,
            "User is already enrolled in this course",
            serde_json::json!({ "status": status.as_str() }),
        )),
    }
}

/// What `unenroll` must do given the existing row (if any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnenrollDecision {
    Drop,
    /// Already dropped or never enrolled; succeed without writing.
    Noop,
}

pub fn decide_unenroll(existing: Option<EnrollmentStatus>) -> UnenrollDecision {
    match existing {
        Some(EnrollmentStatus::Active) | Some(EnrollmentStatus::Completed) => UnenrollDecision::Drop,
        Some(EnrollmentStatus::Dropped) | None => UnenrollDecision::Noop,
    }
}

/// Enrolment status after a progress change, given whether the course is now complete.
///
/// Dropped enrolments are never touched by progress.
pub fn status_after_progress(current: EnrollmentStatus, course_completed: bool) -> EnrollmentStatus {
    match (current, course_completed) {
        (EnrollmentStatus::Active, true) => EnrollmentStatus::Completed,
        (EnrollmentStatus::Completed, false) => EnrollmentStatus::Active,
        (status, _) => status,
    }
}

/// Enrolment settings must be a JSON object.
pub fn validate_settings(settings: &serde_json::Value) -> Result<(), CoreError> {
    if !settings.is_object() {
        return Err(CoreError::Validation(
            "Enrollment settings must be a JSON object".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn first_enrolment_creates() {
        assert_eq!(decide_enroll(None).unwrap(), EnrollDecision::Create);
    }

    #[test]
    fn dropped_enrolment_reactivates() {
        assert_eq!(
            decide_enroll(Some(EnrollmentStatus::Dropped)).unwrap(),
            EnrollDecision::Reactivate
        );
    }

    #[test]
    fn active_enrolment_conflicts() {
        let err = decide_enroll(Some(EnrollmentStatus::Active)).unwrap_err();
        assert_matches!(err, CoreError::Conflict { reason: CONFLICT_ALREADY_ENROLLED, .. });
    }

    #[test]
    fn completed_enrolment_conflicts() {
        assert!(decide_enroll(Some(EnrollmentStatus::Completed)).is_err());
    }

    #[test]
    fn unenroll_is_idempotent() {
        assert_eq!(
            decide_unenroll(Some(EnrollmentStatus::Active)),
            UnenrollDecision::Drop
        );
        assert_eq!(
            decide_unenroll(Some(EnrollmentStatus::Dropped)),
            UnenrollDecision::Noop
        );
        assert_eq!(decide_unenroll(None), UnenrollDecision::Noop);
    }

    #[test]
    fn progress_completes_and_reopens_enrolment() {
        use EnrollmentStatus::*;
        assert_eq!(status_after_progress(Active, true), Completed);
        assert_eq!(status_after_progress(Completed, false), Active);
        assert_eq!(status_after_progress(Active, false), Active);
        assert_eq!(status_after_progress(Dropped, true), Dropped);
    }

    #[test]
    fn access_requires_non_dropped() {
        assert!(EnrollmentStatus::Active.grants_access());
        assert!(EnrollmentStatus::Completed.grants_access());
        assert!(!EnrollmentStatus::Dropped.grants_access());
    }

    #[test]
    fn settings_must_be_object() {
        assert!(validate_settings(&serde_json::json!({})).is_ok());
        assert!(validate_settings(&serde_json::json!([1])).is_err());
    }
}
