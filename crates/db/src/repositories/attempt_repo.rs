//! Repository for `quiz_attempts` and `quiz_responses`.

use learnhub_core::quiz::GradedAnswer;
use learnhub_core::types::DbId;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::quiz_attempt::{QuizAttempt, QuizResponse};

const COLUMNS: &str = "id, user_id, quiz_id, score, time_taken_secs, completion_status, \
                        started_at, attempt_date, created_at, updated_at";

const RESPONSE_COLUMNS: &str = "id, attempt_id, question_id, selected_option_id, is_correct, \
                                 time_spent_secs, created_at, updated_at";

/// Attempt lifecycle persistence.
pub struct AttemptRepo;

impl AttemptRepo {
    /// Lock the user row so concurrent attempt creation for one user serialises.
    pub async fn lock_user(conn: &mut PgConnection, user_id: DbId) -> Result<bool, sqlx::Error> {
        let row: Option<(DbId,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
        Ok(row.is_some())
    }

    /// Number of attempts a user has started on a quiz, whatever their status.
    pub async fn count_for_user<'e, E>(
        executor: E,
        user_id: DbId,
        quiz_id: DbId,
    ) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM quiz_attempts WHERE user_id = $1 AND quiz_id = $2",
        )
        .bind(user_id)
        .bind(quiz_id)
        .fetch_one(executor)
        .await?;
        Ok(row.0)
    }

    /// Start a new attempt at `NOW()`.
    pub async fn create<'e, E>(
        executor: E,
        user_id: DbId,
        quiz_id: DbId,
    ) -> Result<QuizAttempt, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO quiz_attempts (user_id, quiz_id) VALUES ($1, $2) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(user_id)
            .bind(quiz_id)
            .fetch_one(executor)
            .await
    }

    pub async fn find_by_id<'e, E>(
        executor: E,
        id: DbId,
    ) -> Result<Option<QuizAttempt>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!("SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1");
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Find an attempt and hold a row lock on it for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<QuizAttempt>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Attempts of one user on one quiz, oldest first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        quiz_id: DbId,
    ) -> Result<Vec<QuizAttempt>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM quiz_attempts
             WHERE user_id = $1 AND quiz_id = $2
             ORDER BY started_at, id"
        );
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(user_id)
            .bind(quiz_id)
            .fetch_all(pool)
            .await
    }

    /// Move an `in_progress` attempt to a terminal status without scoring it.
    ///
    /// Returns `None` when the attempt is no longer `in_progress`.
    pub async fn close<'e, E>(
        executor: E,
        id: DbId,
        status: &str,
    ) -> Result<Option<QuizAttempt>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE quiz_attempts SET completion_status = $2
             WHERE id = $1 AND completion_status = 'in_progress'
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await
    }

    /// Store the final score and mark the attempt `completed` at `NOW()`.
    pub async fn complete<'e, E>(
        executor: E,
        id: DbId,
        score: i32,
        time_taken_secs: i32,
    ) -> Result<QuizAttempt, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "UPDATE quiz_attempts SET
                score = $2,
                time_taken_secs = $3,
                completion_status = 'completed',
                attempt_date = NOW()
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, QuizAttempt>(&query)
            .bind(id)
            .bind(score)
            .bind(time_taken_secs)
            .fetch_one(executor)
            .await
    }

    // ── Responses ────────────────────────────────────────────────────

    pub async fn insert_response<'e, E>(
        executor: E,
        attempt_id: DbId,
        answer: &GradedAnswer,
    ) -> Result<QuizResponse, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let query = format!(
            "INSERT INTO quiz_responses
                (attempt_id, question_id, selected_option_id, is_correct, time_spent_secs)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {RESPONSE_COLUMNS}"
        );
        sqlx::query_as::<_, QuizResponse>(&query)
            .bind(attempt_id)
            .bind(answer.question_id)
            .bind(answer.option_id)
            .bind(answer.is_correct)
            .bind(answer.time_spent_secs)
            .fetch_one(executor)
            .await
    }

    pub async fn list_responses(
        pool: &PgPool,
        attempt_id: DbId,
    ) -> Result<Vec<QuizResponse>, sqlx::Error> {
        let query = format!(
            "SELECT {RESPONSE_COLUMNS} FROM quiz_responses WHERE attempt_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, QuizResponse>(&query)
            .bind(attempt_id)
            .fetch_all(pool)
            .await
    }
}
