//! Course status transition audit rows.

use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `course_status_transitions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct StatusTransition {
    pub id: DbId,
    pub course_id: DbId,
    pub from_status: String,
    pub to_status: String,
    pub changed_by: Option<DbId>,
    pub reason: String,
    pub changed_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct CreateStatusTransition {
    pub course_id: DbId,
    pub from_status: String,
    pub to_status: String,
    pub changed_by: DbId,
    pub reason: String,
}
