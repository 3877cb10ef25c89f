//! Course lifecycle: status machine, visibility, and publish checklist.
//!
//! ```text
//! draft ──publish──▶ published ──archive──▶ archived
//!                     │                       │
//!                     └─deprecate─▶ deprecated◀┘
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CONFLICT_INVALID_STATUS_TRANSITION, CONFLICT_PUBLISH_REQUIREMENTS_UNMET};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const STATUS_DRAFT: &str = "draft";
pub const STATUS_PUBLISHED: &str = "published";
pub const STATUS_ARCHIVED: &str = "archived";
pub const STATUS_DEPRECATED: &str = "deprecated";

pub const VALID_COURSE_STATUSES: &[&str] = &[
    STATUS_DRAFT,
    STATUS_PUBLISHED,
    STATUS_ARCHIVED,
    STATUS_DEPRECATED,
];

pub const VISIBILITY_PRIVATE: &str = "private";
pub const VISIBILITY_INTERNAL: &str = "internal";
pub const VISIBILITY_PUBLIC: &str = "public";

pub const VALID_VISIBILITIES: &[&str] = &[VISIBILITY_PRIVATE, VISIBILITY_INTERNAL, VISIBILITY_PUBLIC];

/// Maximum length for a course title.
pub const MAX_TITLE_LENGTH: usize = 200;

/// Maximum length for a course description or objectives block.
pub const MAX_TEXT_LENGTH: usize = 50_000;

/// Maximum length for a transition reason.
pub const MAX_REASON_LENGTH: usize = 2_000;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
    Deprecated,
}

impl CourseStatus {
    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            STATUS_DRAFT => Ok(Self::Draft),
            STATUS_PUBLISHED => Ok(Self::Published),
            STATUS_ARCHIVED => Ok(Self::Archived),
            STATUS_DEPRECATED => Ok(Self::Deprecated),
            _ => Err(CoreError::Validation(format!(
                "Invalid course status '{s}'. Must be one of: {}",
                VALID_COURSE_STATUSES.join(", ")
            ))),
        }
    }

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => STATUS_DRAFT,
            Self::Published => STATUS_PUBLISHED,
            Self::Archived => STATUS_ARCHIVED,
            Self::Deprecated => STATUS_DEPRECATED,
        }
    }

    /// Deprecated is the only terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Deprecated)
    }

    /// Edits to a course in this status produce a new version.
    pub fn is_versioned_on_edit(&self) -> bool {
        matches!(self, Self::Published)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Private,
    Internal,
    Public,
}

impl Visibility {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            VISIBILITY_PRIVATE => Ok(Self::Private),
            VISIBILITY_INTERNAL => Ok(Self::Internal),
            VISIBILITY_PUBLIC => Ok(Self::Public),
            _ => Err(CoreError::Validation(format!(
                "Invalid visibility '{s}'. Must be one of: {}",
                VALID_VISIBILITIES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => VISIBILITY_PRIVATE,
            Self::Internal => VISIBILITY_INTERNAL,
            Self::Public => VISIBILITY_PUBLIC,
        }
    }
}

// ---------------------------------------------------------------------------
// Status machine
// ---------------------------------------------------------------------------

/// Whether `from → to` is an edge of the course status machine.
pub fn is_valid_transition(from: CourseStatus, to: CourseStatus) -> bool {
    use CourseStatus::*;
    matches!(
        (from, to),
        (Draft, Published) | (Published, Archived) | (Published, Deprecated) | (Archived, Deprecated)
    )
}

/// Validate a requested status change.
///
/// Archive and deprecate are refused from draft; every non-edge is a conflict.
pub fn validate_transition(from: CourseStatus, to: CourseStatus) -> Result<(), CoreError> {
    if is_valid_transition(from, to) {
        return Ok(());
    }
    let message = if from == to {
        format!("Course is already {}", to.as_str())
    } else if from == CourseStatus::Draft {
        format!("A draft course cannot be moved to {}; publish it first", to.as_str())
    } else if from.is_terminal() {
        "Deprecated courses cannot change status".to_string()
    } else {
        format!("Cannot transition course from {} to {}", from.as_str(), to.as_str())
    };
    Err(CoreError::conflict_with_details(
        CONFLICT_INVALID_STATUS_TRANSITION,
        message,
        serde_json::json!({ "from": from.as_str(), "to": to.as_str() }),
    ))
}

/// Visibility a course must carry after entering `to`.
///
/// Deprecation forces the course private; other transitions keep `current`.
pub fn visibility_after_transition(to: CourseStatus, current: Visibility) -> Visibility {
    if to == CourseStatus::Deprecated {
        Visibility::Private
    } else {
        current
    }
}

// ---------------------------------------------------------------------------
// Publish checklist
// ---------------------------------------------------------------------------

/// Facts about a course gathered before publishing it.
#[derive(Debug, Clone, Default)]
pub struct PublishChecklist {
    pub title: String,
    pub description: String,
    pub learning_objectives: String,
    pub instructor_count: i64,
    pub task_count: i64,
}

impl PublishChecklist {
    /// Names of the unmet requirements, in a stable order.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.title.trim().is_empty() {
            missing.push("title");
        }
        if self.description.trim().is_empty() {
            missing.push("description");
        }
        if self.learning_objectives.trim().is_empty() {
            missing.push("learning_objectives");
        }
        if self.instructor_count < 1 {
            missing.push("instructor");
        }
        if self.task_count < 1 {
            missing.push("task");
        }
        missing
    }
}

pub fn check_publishable(checklist: &PublishChecklist) -> Result<(), CoreError> {
    let missing = checklist.missing();
    if missing.is_empty() {
        return Ok(());
    }
    Err(CoreError::conflict_with_details(
        CONFLICT_PUBLISH_REQUIREMENTS_UNMET,
        format!("Course cannot be published; missing: {}", missing.join(", ")),
        serde_json::json!({ "missing": missing }),
    ))
}

// ---------------------------------------------------------------------------
// Field validation
// ---------------------------------------------------------------------------

pub fn validate_title(title: &str) -> Result<(), CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::Validation("Course title must not be empty".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Course title exceeds maximum length of {MAX_TITLE_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_text_field(field: &str, value: &str) -> Result<(), CoreError> {
    if value.len() > MAX_TEXT_LENGTH {
        return Err(CoreError::Validation(format!(
            "{field} exceeds maximum length of {MAX_TEXT_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn validate_reason(reason: &str) -> Result<(), CoreError> {
    if reason.len() > MAX_REASON_LENGTH {
        return Err(CoreError::Validation(format!(
            "Reason exceeds maximum length of {MAX_REASON_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn status_round_trip() {
        for s in VALID_COURSE_STATUSES {
            assert_eq!(CourseStatus::from_str_value(s).unwrap().as_str(), *s);
        }
        assert!(CourseStatus::from_str_value("live").is_err());
    }

    #[test]
    fn visibility_round_trip() {
        for s in VALID_VISIBILITIES {
            assert_eq!(Visibility::from_str_value(s).unwrap().as_str(), *s);
        }
        assert!(Visibility::from_str_value("secret").is_err());
    }

    #[test]
    fn machine_edges() {
        use CourseStatus::*;
        assert!(is_valid_transition(Draft, Published));
        assert!(is_valid_transition(Published, Archived));
        assert!(is_valid_transition(Published, Deprecated));
        assert!(is_valid_transition(Archived, Deprecated));

        assert!(!is_valid_transition(Draft, Archived));
        assert!(!is_valid_transition(Draft, Deprecated));
        assert!(!is_valid_transition(Archived, Published));
        assert!(!is_valid_transition(Deprecated, Published));
        assert!(!is_valid_transition(Published, Draft));
        assert!(!is_valid_transition(Published, Published));
    }

    #[test]
    fn draft_cannot_be_archived() {
        let err = validate_transition(CourseStatus::Draft, CourseStatus::Archived).unwrap_err();
        assert_matches!(
            err,
            CoreError::Conflict { reason: CONFLICT_INVALID_STATUS_TRANSITION, ref message, .. }
                if message.contains("publish it first")
        );
    }

    #[test]
    fn deprecated_is_terminal() {
        assert!(CourseStatus::Deprecated.is_terminal());
        let err =
            validate_transition(CourseStatus::Deprecated, CourseStatus::Archived).unwrap_err();
        assert!(err.to_string().contains("Deprecated courses"));
    }

    #[test]
    fn deprecation_forces_private() {
        assert_eq!(
            visibility_after_transition(CourseStatus::Deprecated, Visibility::Public),
            Visibility::Private
        );
        assert_eq!(
            visibility_after_transition(CourseStatus::Archived, Visibility::Public),
            Visibility::Public
        );
    }

    #[test]
    fn publish_checklist_reports_everything_missing() {
        let checklist = PublishChecklist::default();
        assert_eq!(
            checklist.missing(),
            vec!["title", "description", "learning_objectives", "instructor", "task"]
        );
        let err = check_publishable(&checklist).unwrap_err();
        assert_eq!(err.conflict_reason(), Some(CONFLICT_PUBLISH_REQUIREMENTS_UNMET));
    }

    #[test]
    fn publish_checklist_passes_when_complete() {
        let checklist = PublishChecklist {
            title: "Rust 101".into(),
            description: "Intro".into(),
            learning_objectives: "Ownership".into(),
            instructor_count: 1,
            task_count: 3,
        };
        assert!(check_publishable(&checklist).is_ok());
    }

    #[test]
    fn whitespace_title_rejected() {
        assert!(validate_title("   ").is_err());
        assert!(validate_title("Py 101").is_ok());
        assert!(validate_title(&"x".repeat(MAX_TITLE_LENGTH + 1)).is_err());
    }

    #[test]
    fn only_published_edits_are_versioned() {
        assert!(CourseStatus::Published.is_versioned_on_edit());
        assert!(!CourseStatus::Draft.is_versioned_on_edit());
    }
}
