//! Course version snapshots and field-wise comparison.
//!
//! A [`CourseSnapshot`] is the structured value persisted in
//! `course_versions.content_snapshot`. Tasks are referenced by id only, which
//! keeps the snapshot free of cycles back into the task table.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::course::{self, CourseStatus, Visibility};
use crate::error::{CoreError, CONFLICT_INVALID_STATUS_TRANSITION};
use crate::types::DbId;

/// Maximum length for version notes.
pub const MAX_NOTES_LENGTH: usize = 5_000;

/// The versioned fields of a course at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSnapshot {
    pub title: String,
    pub description: String,
    pub learning_objectives: String,
    pub prerequisites: String,
    pub status: CourseStatus,
    pub visibility: Visibility,
    pub task_ids: Vec<DbId>,
}

impl CourseSnapshot {
    /// Parse a stored `content_snapshot` JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, CoreError> {
        serde_json::from_value(value.clone())
            .map_err(|e| CoreError::Internal(format!("Malformed course snapshot: {e}")))
    }

    pub fn to_json(&self) -> serde_json::Value {
        // A struct of strings, enums and integers always serializes.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Task ids with duplicates removed, in ascending order.
    pub fn task_set(&self) -> BTreeSet<DbId> {
        self.task_ids.iter().copied().collect()
    }
}

/// The status of one field in a comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Changed,
    Unchanged,
}

/// One field of a snapshot comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub status: DiffStatus,
    pub from: serde_json::Value,
    pub to: serde_json::Value,
}

/// Result of comparing two versions of the same course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VersionComparison {
    pub from_version: i32,
    pub to_version: i32,
    pub fields: Vec<FieldDiff>,
    pub tasks_added: Vec<DbId>,
    pub tasks_removed: Vec<DbId>,
}

impl VersionComparison {
    /// Names of the fields whose values differ.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.status == DiffStatus::Changed)
            .map(|f| f.field)
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed_fields().is_empty()
    }
}

fn field_diff(field: &'static str, from: serde_json::Value, to: serde_json::Value) -> FieldDiff {
    let status = if from == to {
        DiffStatus::Unchanged
    } else {
        DiffStatus::Changed
    };
    FieldDiff {
        field,
        status,
        from,
        to,
    }
}

/// Compare two snapshots field by field.
///
/// `task_ids` is compared as a set; ordering differences are not changes.
pub fn compare_snapshots(
    from_version: i32,
    from: &CourseSnapshot,
    to_version: i32,
    to: &CourseSnapshot,
) -> VersionComparison {
    use serde_json::json;

    let from_tasks = from.task_set();
    let to_tasks = to.task_set();
    let tasks_added: Vec<DbId> = to_tasks.difference(&from_tasks).copied().collect();
    let tasks_removed: Vec<DbId> = from_tasks.difference(&to_tasks).copied().collect();

    let fields = vec![
        field_diff("title", json!(from.title), json!(to.title)),
        field_diff("description", json!(from.description), json!(to.description)),
        field_diff(
            "learning_objectives",
            json!(from.learning_objectives),
            json!(to.learning_objectives),
        ),
        field_diff("prerequisites", json!(from.prerequisites), json!(to.prerequisites)),
        field_diff("status", json!(from.status), json!(to.status)),
        field_diff("visibility", json!(from.visibility), json!(to.visibility)),
        field_diff(
            "task_ids",
            json!(from_tasks.iter().collect::<Vec<_>>()),
            json!(to_tasks.iter().collect::<Vec<_>>()),
        ),
    ];

    VersionComparison {
        from_version,
        to_version,
        fields,
        tasks_added,
        tasks_removed,
    }
}

/// Notes recorded on the version created by a rollback.
pub fn rollback_notes(target_version: i32, reason: &str) -> String {
    let reason = reason.trim();
    if reason.is_empty() {
        format!("Rolled back to version {target_version}")
    } else {
        format!("Rolled back to version {target_version}: {reason}")
    }
}

pub fn validate_notes(notes: &str) -> Result<(), CoreError> {
    if notes.len() > MAX_NOTES_LENGTH {
        return Err(CoreError::Validation(format!(
            "Version notes exceed maximum length of {MAX_NOTES_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Status a course ends up in after rolling back to a snapshot taken in `target`.
///
/// The snapshot status is applied only when the status machine allows the
/// move; otherwise the current status is kept. Deprecated courses are frozen.
pub fn rollback_status(current: CourseStatus, target: CourseStatus) -> Result<CourseStatus, CoreError> {
    if current.is_terminal() {
        return Err(CoreError::conflict_with_details(
            CONFLICT_INVALID_STATUS_TRANSITION,
            "Deprecated courses cannot be rolled back",
            serde_json::json!({ "from": current.as_str(), "to": target.as_str() }),
        ));
    }
    if course::is_valid_transition(current, target) {
        Ok(target)
    } else {
        Ok(current)
    }
}

/// Validate a requested version number against the course's current version.
pub fn validate_version_number(requested: i32, current: i32) -> Result<(), CoreError> {
    if requested < 1 || requested > current {
        return Err(CoreError::Validation(format!(
            "Version {requested} does not exist; course is at version {current}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(title: &str, tasks: &[DbId]) -> CourseSnapshot {
        CourseSnapshot {
            title: title.to_string(),
            description: "desc".into(),
            learning_objectives: "objectives".into(),
            prerequisites: String::new(),
            status: CourseStatus::Published,
            visibility: Visibility::Public,
            task_ids: tasks.to_vec(),
        }
    }

    #[test]
    fn json_round_trip_preserves_fields() {
        let s = snapshot("Py 101", &[3, 1, 2]);
        let parsed = CourseSnapshot::from_json(&s.to_json()).unwrap();
        assert_eq!(parsed, s);
        assert_eq!(s.to_json()["status"], "published");
    }

    #[test]
    fn malformed_snapshot_is_internal_error() {
        let err = CourseSnapshot::from_json(&serde_json::json!({"title": 1})).unwrap_err();
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let a = snapshot("Py 101", &[1, 2]);
        let b = snapshot("Py 101", &[2, 1]);
        let cmp = compare_snapshots(1, &a, 2, &b);
        assert!(!cmp.has_changes());
        assert!(cmp.tasks_added.is_empty());
        assert!(cmp.tasks_removed.is_empty());
    }

    #[test]
    fn title_and_task_changes_detected() {
        let a = snapshot("Py 101", &[1, 2]);
        let b = snapshot("Py 201", &[2, 3]);
        let cmp = compare_snapshots(1, &a, 3, &b);
        assert_eq!(cmp.changed_fields(), vec!["title", "task_ids"]);
        assert_eq!(cmp.tasks_added, vec![3]);
        assert_eq!(cmp.tasks_removed, vec![1]);
        let title = cmp.fields.iter().find(|f| f.field == "title").unwrap();
        assert_eq!(title.from, "Py 101");
        assert_eq!(title.to, "Py 201");
    }

    #[test]
    fn rollback_notes_format() {
        assert_eq!(rollback_notes(1, ""), "Rolled back to version 1");
        assert_eq!(
            rollback_notes(2, " typo "),
            "Rolled back to version 2: typo"
        );
    }

    #[test]
    fn rollback_never_leaves_deprecated() {
        let err = rollback_status(CourseStatus::Deprecated, CourseStatus::Draft).unwrap_err();
        assert_eq!(err.conflict_reason(), Some(CONFLICT_INVALID_STATUS_TRANSITION));
    }

    #[test]
    fn rollback_status_follows_the_machine() {
        use CourseStatus::*;
        assert_eq!(rollback_status(Published, Draft).unwrap(), Published);
        assert_eq!(rollback_status(Archived, Published).unwrap(), Archived);
        assert_eq!(rollback_status(Published, Archived).unwrap(), Archived);
        assert_eq!(rollback_status(Draft, Published).unwrap(), Published);
        assert_eq!(rollback_status(Draft, Draft).unwrap(), Draft);
    }

    #[test]
    fn version_number_bounds() {
        assert!(validate_version_number(1, 3).is_ok());
        assert!(validate_version_number(3, 3).is_ok());
        assert!(validate_version_number(0, 3).is_err());
        assert!(validate_version_number(4, 3).is_err());
    }
}
