use crate::types::DbId;

/// Conflict reason: an active enrolment already exists for the pair.
pub const CONFLICT_ALREADY_ENROLLED: &str = "already_enrolled";

/// Conflict reason: the user has used every allowed quiz attempt.
pub const CONFLICT_ATTEMPT_CAP_REACHED: &str = "attempt_cap_reached";

/// Conflict reason: the requested state change is not an edge of the state machine.
pub const CONFLICT_INVALID_STATUS_TRANSITION: &str = "invalid_status_transition";

/// Conflict reason: a task cannot be deleted because students have started it.
pub const CONFLICT_TASK_HAS_PROGRESS: &str = "task_has_progress";

/// Conflict reason: a uniqueness constraint would be violated.
pub const CONFLICT_DUPLICATE: &str = "duplicate";

/// Conflict reason: a course does not satisfy the publish checklist.
pub const CONFLICT_PUBLISH_REQUIREMENTS_UNMET: &str = "publish_requirements_unmet";

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict ({reason}): {message}")]
    Conflict {
        reason: &'static str,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("Stale state: {0}")]
    StaleState(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Build a conflict error without structured details.
    pub fn conflict(reason: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            reason,
            message: message.into(),
            details: None,
        }
    }

    /// Build a conflict error carrying a structured details payload.
    pub fn conflict_with_details(
        reason: &'static str,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Conflict {
            reason,
            message: message.into(),
            details: Some(details),
        }
    }

    /// The stable error kind exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::Validation(_) => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::StaleState(_) => "stale_state",
            Self::Unauthorized(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
            Self::Internal(_) => "internal",
        }
    }

    /// The conflict reason, if this is a conflict.
    pub fn conflict_reason(&self) -> Option<&'static str> {
        match self {
            Self::Conflict { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_error_kinds() {
        assert_eq!(CoreError::Validation("x".into()).code(), "validation_error");
        assert_eq!(
            CoreError::NotFound {
                entity: "Course",
                id: 1
            }
            .code(),
            "not_found"
        );
        assert_eq!(CoreError::Forbidden("x".into()).code(), "forbidden");
        assert_eq!(CoreError::Unauthorized("x".into()).code(), "unauthenticated");
        assert_eq!(CoreError::StaleState("x".into()).code(), "stale_state");
        assert_eq!(CoreError::Internal("x".into()).code(), "internal");
        assert_eq!(
            CoreError::conflict(CONFLICT_DUPLICATE, "dup").code(),
            "conflict"
        );
    }

    #[test]
    fn conflict_keeps_reason_and_details() {
        let err = CoreError::conflict_with_details(
            CONFLICT_TASK_HAS_PROGRESS,
            "Task has student progress",
            serde_json::json!({"in_progress": 1}),
        );
        assert_eq!(err.conflict_reason(), Some(CONFLICT_TASK_HAS_PROGRESS));
        match err {
            CoreError::Conflict { details, .. } => {
                assert_eq!(details.unwrap()["in_progress"], 1);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn display_includes_reason() {
        let err = CoreError::conflict(CONFLICT_ATTEMPT_CAP_REACHED, "No attempts left");
        assert_eq!(
            err.to_string(),
            "Conflict (attempt_cap_reached): No attempts left"
        );
    }
}
