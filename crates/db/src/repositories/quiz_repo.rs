//! Repository for `quiz_tasks`, `quiz_questions` and `quiz_options`.

use learnhub_core::quiz::{OptionDraft, QuizSettings};
use learnhub_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::quiz::{CreateQuestion, QuizOption, QuizQuestion, QuizTask};

const QUIZ_COLUMNS: &str = "id, time_limit_minutes, pass_threshold, max_attempts, \
                             randomize_questions, created_at, updated_at";

const QUESTION_COLUMNS: &str = "id, quiz_id, text, explanation, points, sort_order, category, \
                                 created_at, updated_at";

const OPTION_COLUMNS: &str =
    "id, question_id, text, is_correct, sort_order, explanation, created_at, updated_at";

/// `OPTION_COLUMNS` qualified with the `o` alias for joins.
const OPTION_COLUMNS_JOINED: &str = "o.id, o.question_id, o.text, o.is_correct, o.sort_order, \
                                      o.explanation, o.created_at, o.updated_at";

/// Provides access to quiz settings and authored questions.
pub struct QuizRepo;

impl QuizRepo {
    // ── Settings ─────────────────────────────────────────────────────

    /// Create or replace the quiz side record of a task.
    pub async fn upsert_settings<'e, E>(
        executor: E,
        task_id: DbId,
        settings: &QuizSettings,
    ) -> Result<QuizTask, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO quiz_tasks (id, time_limit_minutes, pass_threshold, max_attempts, randomize_questions)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                time_limit_minutes = EXCLUDED.time_limit_minutes,
                pass_threshold = EXCLUDED.pass_threshold,
                max_attempts = EXCLUDED.max_attempts,
                randomize_questions = EXCLUDED.randomize_questions
             RETURNING {QUIZ_COLUMNS}"
        );
        sqlx::query_as::<_, QuizTask>(&query)
            .bind(task_id)
            .bind(settings.time_limit_minutes)
            .bind(settings.pass_threshold)
            .bind(settings.max_attempts)
            .bind(settings.randomize_questions)
            .fetch_one(executor)
            .await
    }

    pub async fn find_settings<'e, E>(
        executor: E,
        task_id: DbId,
    ) -> Result<Option<QuizTask>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {QUIZ_COLUMNS} FROM quiz_tasks WHERE id = $1");
        sqlx::query_as::<_, QuizTask>(&query)
            .bind(task_id)
            .fetch_optional(executor)
            .await
    }

    // ── Questions ────────────────────────────────────────────────────

    /// Insert a question and its options inside the caller's transaction.
    ///
    /// `sort_order` defaults to one past the current maximum for the quiz.
    pub async fn create_question(
        conn: &mut PgConnection,
        quiz_id: DbId,
        input: &CreateQuestion,
    ) -> Result<(QuizQuestion, Vec<QuizOption>), sqlx::Error> {
        let query = format!(
            "INSERT INTO quiz_questions (quiz_id, text, explanation, points, sort_order, category)
             VALUES ($1, $2, $3, COALESCE($4, 1),
                     COALESCE($5, (SELECT COALESCE(MAX(sort_order) + 1, 0)
                                   FROM quiz_questions WHERE quiz_id = $1)),
                     $6)
             RETURNING {QUESTION_COLUMNS}"
        );
        let question = sqlx::query_as::<_, QuizQuestion>(&query)
            .bind(quiz_id)
            .bind(&input.text)
            .bind(&input.explanation)
            .bind(input.points)
            .bind(input.sort_order)
            .bind(&input.category)
            .fetch_one(&mut *conn)
            .await?;

        let mut options = Vec::with_capacity(input.options.len());
        for (idx, draft) in input.options.iter().enumerate() {
            let option = Self::insert_option(&mut *conn, question.id, draft, idx as i32).await?;
            options.push(option);
        }

        Ok((question, options))
    }

    /// Questions of a quiz in authored order (`sort_order`, then id).
    pub async fn list_questions<'e, E>(
        executor: E,
        quiz_id: DbId,
    ) -> Result<Vec<QuizQuestion>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {QUESTION_COLUMNS} FROM quiz_questions WHERE quiz_id = $1 ORDER BY sort_order, id"
        );
        sqlx::query_as::<_, QuizQuestion>(&query)
            .bind(quiz_id)
            .fetch_all(executor)
            .await
    }

    /// Every option of every question in a quiz, grouped by question in authored order.
    pub async fn list_options_for_quiz<'e, E>(
        executor: E,
        quiz_id: DbId,
    ) -> Result<Vec<QuizOption>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "SELECT {OPTION_COLUMNS_JOINED} FROM quiz_options o
             JOIN quiz_questions q ON q.id = o.question_id
             WHERE q.quiz_id = $1
             ORDER BY q.sort_order, q.id, o.sort_order, o.id"
        );
        sqlx::query_as::<_, QuizOption>(&query)
            .bind(quiz_id)
            .fetch_all(executor)
            .await
    }

    /// Number of questions authored on a quiz.
    pub async fn count_questions(pool: &PgPool, quiz_id: DbId) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM quiz_questions WHERE quiz_id = $1")
            .bind(quiz_id)
            .fetch_one(pool)
            .await?;
        Ok(row.0)
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    async fn insert_option(
        conn: &mut PgConnection,
        question_id: DbId,
        draft: &OptionDraft,
        sort_order: i32,
    ) -> Result<QuizOption, sqlx::Error> {
        let query = format!(
            "INSERT INTO quiz_options (question_id, text, is_correct, sort_order, explanation)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {OPTION_COLUMNS}"
        );
        sqlx::query_as::<_, QuizOption>(&query)
            .bind(question_id)
            .bind(&draft.text)
            .bind(draft.is_correct)
            .bind(sort_order)
            .bind(&draft.explanation)
            .fetch_one(conn)
            .await
    }
}
