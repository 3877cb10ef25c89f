//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - A `Deserialize` update DTO (all `Option` fields) for patches
//!
//! `analytics` only holds read-side aggregate rows.

pub mod analytics;
pub mod course;
pub mod course_instructor;
pub mod course_version;
pub mod enrollment;
pub mod progress;
pub mod quiz;
pub mod quiz_attempt;
pub mod status_transition;
pub mod task;
pub mod user;
