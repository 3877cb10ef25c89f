use learnhub_core::error::{CoreError, CONFLICT_DUPLICATE};
use serde::Serialize;
use serde_json::json;

/// Error type returned by every engine operation.
///
/// Wraps [`CoreError`] for domain failures and `sqlx::Error` for storage
/// failures. [`ServiceError::payload`] turns either into the stable
/// `{code, message, details}` shape callers expose.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// The caller-facing error shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    /// Stable error kind, e.g. `"conflict"` or `"not_found"`.
    pub fn code(&self) -> &'static str {
        self.payload().code
    }

    /// Conflict reason, when this error is (or classifies as) a conflict.
    pub fn conflict_reason(&self) -> Option<&'static str> {
        match self {
            ServiceError::Core(core) => core.conflict_reason(),
            ServiceError::Database(err) => unique_violation(err).map(|_| CONFLICT_DUPLICATE),
        }
    }

    pub fn payload(&self) -> ErrorPayload {
        match self {
            ServiceError::Core(core) => core_payload(core),
            ServiceError::Database(err) => classify_sqlx_error(err),
        }
    }
}

fn core_payload(core: &CoreError) -> ErrorPayload {
    let message = match core {
        CoreError::NotFound { entity, id } => format!("{entity} with id {id} not found"),
        CoreError::Validation(msg)
        | CoreError::StaleState(msg)
        | CoreError::Unauthorized(msg)
        | CoreError::Forbidden(msg) => msg.clone(),
        CoreError::Conflict { message, .. } => message.clone(),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            "An internal error occurred".to_string()
        }
    };

    let details = match core {
        CoreError::Conflict {
            reason, details, ..
        } => {
            let mut merged = json!({ "reason": reason });
            if let (Some(serde_json::Value::Object(extra)), Some(target)) =
                (details, merged.as_object_mut())
            {
                for (k, v) in extra {
                    target.insert(k.clone(), v.clone());
                }
            }
            Some(merged)
        }
        _ => None,
    };

    ErrorPayload {
        code: core.code(),
        message,
        details,
    }
}

/// Name of the `uq_` constraint a unique violation hit, if any.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => db_err
            .constraint()
            .filter(|c| c.starts_with("uq_"))
            .map(str::to_string),
        _ => None,
    }
}

/// Classify a sqlx error.
///
/// - Unique violations on a `uq_` constraint become `conflict/duplicate`.
/// - `RowNotFound` becomes `not_found`.
/// - Everything else becomes `internal` with a sanitised message; the
///   detail goes to the log.
fn classify_sqlx_error(err: &sqlx::Error) -> ErrorPayload {
    if let Some(constraint) = unique_violation(err) {
        return ErrorPayload {
            code: "conflict",
            message: format!("Duplicate value violates unique constraint: {constraint}"),
            details: Some(json!({ "reason": CONFLICT_DUPLICATE, "constraint": constraint })),
        };
    }

    if let sqlx::Error::RowNotFound = err {
        return ErrorPayload {
            code: "not_found",
            message: "Resource not found".to_string(),
            details: None,
        };
    }

    tracing::error!(error = %err, "Database error");
    ErrorPayload {
        code: "internal",
        message: "An internal error occurred".to_string(),
        details: None,
    }
}

#[cfg(test)]
mod tests {
    use learnhub_core::error::CONFLICT_ATTEMPT_CAP_REACHED;

    use super::*;

    #[test]
    fn conflict_payload_merges_reason_into_details() {
        let err = ServiceError::from(CoreError::conflict_with_details(
            CONFLICT_ATTEMPT_CAP_REACHED,
            "No attempts left",
            json!({ "attempts_used": 2, "max_attempts": 2 }),
        ));
        let payload = err.payload();

        assert_eq!(payload.code, "conflict");
        assert_eq!(payload.message, "No attempts left");
        let details = payload.details.unwrap();
        assert_eq!(details["reason"], "attempt_cap_reached");
        assert_eq!(details["attempts_used"], 2);
        assert_eq!(err.conflict_reason(), Some(CONFLICT_ATTEMPT_CAP_REACHED));
    }

    #[test]
    fn not_found_payload_names_entity() {
        let err = ServiceError::from(CoreError::NotFound {
            entity: "Course",
            id: 9,
        });
        let payload = err.payload();
        assert_eq!(payload.code, "not_found");
        assert_eq!(payload.message, "Course with id 9 not found");
        assert!(payload.details.is_none());
    }

    #[test]
    fn internal_messages_are_sanitised() {
        let err = ServiceError::from(CoreError::Internal("pool exhausted at 10.0.0.3".into()));
        assert_eq!(err.payload().message, "An internal error occurred");

        let err = ServiceError::from(sqlx::Error::PoolTimedOut);
        assert_eq!(err.code(), "internal");
        assert_eq!(err.payload().message, "An internal error occurred");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = ServiceError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.code(), "not_found");
        assert_eq!(err.conflict_reason(), None);
    }

    #[test]
    fn payload_serialises_without_empty_details() {
        let err = ServiceError::from(CoreError::Forbidden("Admin role required".into()));
        let value = serde_json::to_value(err.payload()).unwrap();
        assert_eq!(
            value,
            json!({ "code": "forbidden", "message": "Admin role required" })
        );
    }
}
