//! Quiz side records, questions and options.

use learnhub_core::quiz::{OptionDraft, QuizSettings};
use learnhub_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `quiz_tasks` table. `id` is the parent task id.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizTask {
    pub id: DbId,
    pub time_limit_minutes: i32,
    pub pass_threshold: i32,
    pub max_attempts: i32,
    pub randomize_questions: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl QuizTask {
    pub fn settings(&self) -> QuizSettings {
        QuizSettings {
            time_limit_minutes: self.time_limit_minutes,
            pass_threshold: self.pass_threshold,
            max_attempts: self.max_attempts,
            randomize_questions: self.randomize_questions,
        }
    }
}

/// A row from the `quiz_questions` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: DbId,
    pub quiz_id: DbId,
    pub text: String,
    pub explanation: Option<String>,
    pub points: i32,
    pub sort_order: i32,
    pub category: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `quiz_options` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct QuizOption {
    pub id: DbId,
    pub question_id: DbId,
    pub text: String,
    pub is_correct: bool,
    pub sort_order: i32,
    pub explanation: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for adding a question together with its options.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateQuestion {
    pub text: String,
    pub explanation: Option<String>,
    pub points: Option<i32>,
    pub sort_order: Option<i32>,
    pub category: Option<String>,
    pub options: Vec<OptionDraft>,
}

/// Question with its options, in authored order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionWithOptions {
    pub question: QuizQuestion,
    pub options: Vec<QuizOption>,
}
