//! Quiz attempt and response rows.

use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quiz_attempts` table.
///
/// `completion_status` is the stored value; readers must pass it through
/// `learnhub_core::quiz::effective_status` before trusting it.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: DbId,
    pub user_id: DbId,
    pub quiz_id: DbId,
    pub score: i32,
    pub time_taken_secs: Option<i32>,
    pub completion_status: String,
    pub started_at: Timestamp,
    pub attempt_date: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `quiz_responses` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizResponse {
    pub id: DbId,
    pub attempt_id: DbId,
    pub question_id: DbId,
    pub selected_option_id: DbId,
    pub is_correct: bool,
    pub time_spent_secs: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
