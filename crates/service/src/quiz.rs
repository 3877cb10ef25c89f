//! Quiz engine: authoring, attempts, grading and review.

use std::collections::HashMap;

use learnhub_core::access::{self, Principal};
use learnhub_core::error::CoreError;
use learnhub_core::progress::ProgressStatus;
use learnhub_core::quiz::{
    self, AttemptStatus, QuestionKey, QuizSettings, SubmittedAnswer, ATTEMPT_ABANDONED,
    ATTEMPT_INCOMPLETE,
};
use learnhub_core::task::TaskType;
use learnhub_core::types::{DbId, Timestamp};
use learnhub_db::models::quiz::{CreateQuestion, QuestionWithOptions, QuizOption, QuizTask};
use learnhub_db::models::quiz_attempt::{QuizAttempt, QuizResponse};
use learnhub_db::models::task::Task;
use learnhub_db::repositories::{AttemptRepo, QuizRepo};
use serde::Serialize;
use sqlx::PgExecutor;

use crate::courses::{find_course, is_enrolled};
use crate::error::ServiceResult;
use crate::progress::{advance_progress, sync_enrollment_status};
use crate::state::EngineState;
use crate::tasks::{find_task, task_not_found};

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

/// An option as shown to the student, without its correctness flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedOption {
    pub option_id: DbId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedQuestion {
    pub question_id: DbId,
    pub text: String,
    pub points: i32,
    pub category: Option<String>,
    pub options: Vec<PresentedOption>,
}

/// The questions of an attempt in presentation order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptPaper {
    pub attempt_id: DbId,
    pub quiz_id: DbId,
    pub status: AttemptStatus,
    pub started_at: Timestamp,
    pub expires_at: Timestamp,
    pub questions: Vec<PresentedQuestion>,
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptResult {
    pub attempt: QuizAttempt,
    pub correct: i64,
    pub total: i64,
    pub score: i32,
    pub passed: bool,
}

/// An attempt with its status as a reader must see it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptView {
    pub attempt: QuizAttempt,
    pub status: AttemptStatus,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttemptReview {
    pub attempt: AttemptView,
    pub responses: Vec<QuizResponse>,
}

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// A quiz task together with its settings side record.
async fn find_quiz<'e, E>(executor: E, task: &Task) -> ServiceResult<QuizTask>
where
    E: PgExecutor<'e>,
{
    if TaskType::from_str_value(&task.task_type)? != TaskType::Quiz {
        return Err(CoreError::Validation(format!("Task {} is not a quiz", task.id)).into());
    }
    QuizRepo::find_settings(executor, task.id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "QuizTask",
                id: task.id,
            }
            .into()
        })
}

async fn find_attempt<'e, E>(executor: E, attempt_id: DbId) -> ServiceResult<QuizAttempt>
where
    E: PgExecutor<'e>,
{
    AttemptRepo::find_by_id(executor, attempt_id)
        .await?
        .ok_or_else(|| {
            CoreError::NotFound {
                entity: "QuizAttempt",
                id: attempt_id,
            }
            .into()
        })
}

async fn require_quiz_author(
    state: &EngineState,
    requester: &Principal,
    task: &Task,
) -> ServiceResult<()> {
    let course = find_course(&state.pool, task.course_id).await?;
    access::require_course_creator(requester, course.creator_id)?;
    Ok(())
}

fn require_attempt_reader(requester: &Principal, attempt: &QuizAttempt) -> Result<(), CoreError> {
    if access::can_read_progress_of(requester, attempt.user_id) {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Cannot view another user's attempt".into()))
    }
}

fn require_attempt_owner(requester: &Principal, attempt: &QuizAttempt) -> Result<(), CoreError> {
    if requester.user_id == attempt.user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden("Only the attempt owner may do this".into()))
    }
}

/// Build the answer key from a quiz's options.
fn answer_key(options: &[QuizOption]) -> Result<Vec<QuestionKey>, CoreError> {
    let mut order = Vec::new();
    let mut grouped: HashMap<DbId, (Option<DbId>, Vec<DbId>)> = HashMap::new();
    for option in options {
        let entry = grouped.entry(option.question_id).or_insert_with(|| {
            order.push(option.question_id);
            (None, Vec::new())
        });
        entry.1.push(option.id);
        if option.is_correct {
            entry.0 = Some(option.id);
        }
    }

    order
        .into_iter()
        .map(|question_id| {
            let (correct, option_ids) = grouped.remove(&question_id).unwrap_or_default();
            let correct_option_id = correct.ok_or_else(|| {
                CoreError::Internal(format!("Question {question_id} has no correct option"))
            })?;
            Ok(QuestionKey {
                question_id,
                correct_option_id,
                option_ids,
            })
        })
        .collect()
}

fn attempt_view(attempt: QuizAttempt, settings: &QuizSettings, now: Timestamp) -> ServiceResult<AttemptView> {
    let stored = AttemptStatus::from_str_value(&attempt.completion_status)?;
    let status = quiz::effective_status(stored, attempt.started_at, settings.time_limit_minutes, now);
    let passed = status == AttemptStatus::Completed && quiz::passes(attempt.score, settings.pass_threshold);
    Ok(AttemptView {
        attempt,
        status,
        passed,
    })
}

/// Persist `incomplete` on an in-progress attempt whose time limit has run out.
async fn persist_expiry(
    state: &EngineState,
    attempt: &QuizAttempt,
    settings: &QuizSettings,
    now: Timestamp,
) -> ServiceResult<()> {
    let stored = AttemptStatus::from_str_value(&attempt.completion_status)?;
    if stored == AttemptStatus::InProgress
        && quiz::is_expired(attempt.started_at, settings.time_limit_minutes, now)
        && AttemptRepo::close(&state.pool, attempt.id, ATTEMPT_INCOMPLETE).await?.is_some()
    {
        tracing::info!(attempt_id = attempt.id, "Attempt timed out");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Authoring
// ---------------------------------------------------------------------------

/// Replace the settings of a quiz task.
pub async fn configure_quiz(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
    settings: &QuizSettings,
) -> ServiceResult<QuizTask> {
    settings.validate()?;
    let task = find_task(&state.pool, task_id).await?;
    require_quiz_author(state, requester, &task).await?;
    find_quiz(&state.pool, &task).await?;

    let updated = QuizRepo::upsert_settings(&state.pool, task_id, settings).await?;
    tracing::info!(
        task_id,
        time_limit_minutes = settings.time_limit_minutes,
        pass_threshold = settings.pass_threshold,
        max_attempts = settings.max_attempts,
        "Quiz configured"
    );
    Ok(updated)
}

/// Add a question with its options. Exactly one option must be correct.
pub async fn add_question(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
    input: &CreateQuestion,
) -> ServiceResult<QuestionWithOptions> {
    quiz::validate_question(&input.text, input.points.unwrap_or(1))?;
    quiz::validate_options(&input.options)?;

    let task = find_task(&state.pool, task_id).await?;
    require_quiz_author(state, requester, &task).await?;
    find_quiz(&state.pool, &task).await?;

    let mut tx = state.pool.begin().await?;
    let (question, options) = QuizRepo::create_question(&mut tx, task_id, input).await?;
    tx.commit().await?;

    tracing::info!(task_id, question_id = question.id, options = options.len(), "Question added");
    Ok(QuestionWithOptions { question, options })
}

/// Questions with options and correctness flags, for quiz authors.
pub async fn list_questions(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
) -> ServiceResult<Vec<QuestionWithOptions>> {
    let task = find_task(&state.pool, task_id).await?;
    require_quiz_author(state, requester, &task).await?;
    find_quiz(&state.pool, &task).await?;

    let questions = QuizRepo::list_questions(&state.pool, task_id).await?;
    let mut options_by_question: HashMap<DbId, Vec<QuizOption>> = HashMap::new();
    for option in QuizRepo::list_options_for_quiz(&state.pool, task_id).await? {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(option);
    }

    Ok(questions
        .into_iter()
        .map(|question| {
            let options = options_by_question.remove(&question.id).unwrap_or_default();
            QuestionWithOptions { question, options }
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Attempts
// ---------------------------------------------------------------------------

/// Start an attempt for the requester.
///
/// The user row is locked while attempts are counted so two concurrent
/// starts cannot both slip under the cap. The quiz task's progress moves to
/// `in_progress`.
pub async fn create_attempt(
    state: &EngineState,
    requester: &Principal,
    task_id: DbId,
) -> ServiceResult<QuizAttempt> {
    let user_id = requester.user_id;
    let task = find_task(&state.pool, task_id).await?;
    if task.is_deleted || !task.is_published {
        return Err(task_not_found(task_id).into());
    }
    let settings = find_quiz(&state.pool, &task).await?.settings();
    if !is_enrolled(&state.pool, user_id, task.course_id).await? {
        return Err(CoreError::Forbidden("User is not enrolled in this course".into()).into());
    }
    if QuizRepo::count_questions(&state.pool, task_id).await? == 0 {
        return Err(CoreError::Validation(format!("Quiz {task_id} has no questions")).into());
    }

    let mut tx = state.pool.begin().await?;
    AttemptRepo::lock_user(&mut tx, user_id).await?;
    let used = AttemptRepo::count_for_user(&mut *tx, user_id, task_id).await?;
    quiz::check_attempt_cap(used, settings.max_attempts)?;

    let attempt = AttemptRepo::create(&mut *tx, user_id, task_id).await?;
    advance_progress(&mut tx, user_id, task_id, ProgressStatus::InProgress).await?;
    tx.commit().await?;

    tracing::info!(
        attempt_id = attempt.id,
        user_id,
        quiz_id = task_id,
        attempt_number = used + 1,
        "Quiz attempt started"
    );
    Ok(attempt)
}

/// Questions of an attempt in its presentation order.
///
/// The order is a per-attempt permutation when the quiz randomises questions.
pub async fn get_attempt_questions(
    state: &EngineState,
    requester: &Principal,
    attempt_id: DbId,
) -> ServiceResult<AttemptPaper> {
    let attempt = find_attempt(&state.pool, attempt_id).await?;
    require_attempt_reader(requester, &attempt)?;
    let task = find_task(&state.pool, attempt.quiz_id).await?;
    let settings = find_quiz(&state.pool, &task).await?.settings();

    let now = chrono::Utc::now();
    persist_expiry(state, &attempt, &settings, now).await?;
    let view = attempt_view(attempt, &settings, now)?;

    let questions = QuizRepo::list_questions(&state.pool, task.id).await?;
    let mut options_by_question: HashMap<DbId, Vec<PresentedOption>> = HashMap::new();
    for option in QuizRepo::list_options_for_quiz(&state.pool, task.id).await? {
        options_by_question
            .entry(option.question_id)
            .or_default()
            .push(PresentedOption {
                option_id: option.id,
                text: option.text,
            });
    }

    let ids: Vec<DbId> = questions.iter().map(|q| q.id).collect();
    let order = quiz::presentation_order(&ids, attempt_id, settings.randomize_questions);
    let mut by_id: HashMap<DbId, _> = questions.into_iter().map(|q| (q.id, q)).collect();

    let presented = order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .map(|q| PresentedQuestion {
            question_id: q.id,
            options: options_by_question.remove(&q.id).unwrap_or_default(),
            text: q.text,
            points: q.points,
            category: q.category,
        })
        .collect();

    Ok(AttemptPaper {
        attempt_id,
        quiz_id: task.id,
        status: view.status,
        started_at: view.attempt.started_at,
        expires_at: view.attempt.started_at
            + chrono::Duration::minutes(i64::from(settings.time_limit_minutes)),
        questions: presented,
    })
}

/// Grade and store the answers of an active attempt.
///
/// The attempt row stays locked from the activity check until the score is
/// written, so a second submit sees `completed` and is refused. A passing
/// score completes the quiz task for the user.
pub async fn submit_responses(
    state: &EngineState,
    requester: &Principal,
    attempt_id: DbId,
    answers: &[SubmittedAnswer],
) -> ServiceResult<AttemptResult> {
    let mut tx = state.pool.begin().await?;
    let attempt = AttemptRepo::find_for_update(&mut tx, attempt_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "QuizAttempt",
            id: attempt_id,
        })?;
    require_attempt_owner(requester, &attempt)?;

    let task = find_task(&mut *tx, attempt.quiz_id).await?;
    let settings = find_quiz(&mut *tx, &task).await?.settings();

    let now = chrono::Utc::now();
    let stored = AttemptStatus::from_str_value(&attempt.completion_status)?;
    if let Err(stale) = quiz::ensure_active(stored, attempt.started_at, settings.time_limit_minutes, now) {
        if stored == AttemptStatus::InProgress {
            AttemptRepo::close(&mut *tx, attempt_id, ATTEMPT_INCOMPLETE).await?;
            tx.commit().await?;
            tracing::info!(attempt_id, "Late submission; attempt marked incomplete");
        }
        return Err(stale.into());
    }

    let options = QuizRepo::list_options_for_quiz(&mut *tx, task.id).await?;
    let keys = answer_key(&options)?;
    let graded = quiz::grade_submission(&keys, answers)?;

    for answer in &graded.answers {
        AttemptRepo::insert_response(&mut *tx, attempt_id, answer).await?;
    }
    let completed = AttemptRepo::complete(
        &mut *tx,
        attempt_id,
        graded.score,
        quiz::elapsed_secs(attempt.started_at, now),
    )
    .await?;

    let passed = quiz::passes(graded.score, settings.pass_threshold);
    if passed {
        advance_progress(&mut tx, attempt.user_id, task.id, ProgressStatus::Completed).await?;
        sync_enrollment_status(&mut tx, attempt.user_id, task.course_id).await?;
    }
    tx.commit().await?;

    tracing::info!(
        attempt_id,
        user_id = attempt.user_id,
        quiz_id = task.id,
        score = graded.score,
        correct = graded.correct,
        total = graded.total,
        passed,
        "Quiz attempt submitted"
    );
    Ok(AttemptResult {
        attempt: completed,
        correct: graded.correct,
        total: graded.total,
        score: graded.score,
        passed,
    })
}

/// Close an active attempt without scoring it.
pub async fn abandon_attempt(
    state: &EngineState,
    requester: &Principal,
    attempt_id: DbId,
) -> ServiceResult<QuizAttempt> {
    let mut tx = state.pool.begin().await?;
    let attempt = AttemptRepo::find_for_update(&mut tx, attempt_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "QuizAttempt",
            id: attempt_id,
        })?;
    require_attempt_owner(requester, &attempt)?;

    let task = find_task(&mut *tx, attempt.quiz_id).await?;
    let settings = find_quiz(&mut *tx, &task).await?.settings();

    let now = chrono::Utc::now();
    let stored = AttemptStatus::from_str_value(&attempt.completion_status)?;
    if let Err(stale) = quiz::ensure_active(stored, attempt.started_at, settings.time_limit_minutes, now) {
        if stored == AttemptStatus::InProgress {
            AttemptRepo::close(&mut *tx, attempt_id, ATTEMPT_INCOMPLETE).await?;
            tx.commit().await?;
        }
        return Err(stale.into());
    }

    let closed = AttemptRepo::close(&mut *tx, attempt_id, ATTEMPT_ABANDONED)
        .await?
        .ok_or_else(|| CoreError::StaleState("Attempt is no longer in progress".into()))?;
    tx.commit().await?;

    tracing::info!(attempt_id, user_id = attempt.user_id, "Quiz attempt abandoned");
    Ok(closed)
}

/// An attempt with the responses recorded for it.
pub async fn get_attempt_responses(
    state: &EngineState,
    requester: &Principal,
    attempt_id: DbId,
) -> ServiceResult<AttemptReview> {
    let attempt = find_attempt(&state.pool, attempt_id).await?;
    require_attempt_reader(requester, &attempt)?;
    let task = find_task(&state.pool, attempt.quiz_id).await?;
    let settings = find_quiz(&state.pool, &task).await?.settings();

    let now = chrono::Utc::now();
    persist_expiry(state, &attempt, &settings, now).await?;
    let responses = AttemptRepo::list_responses(&state.pool, attempt_id).await?;

    Ok(AttemptReview {
        attempt: attempt_view(attempt, &settings, now)?,
        responses,
    })
}

/// A user's attempts on one quiz, oldest first, with effective statuses.
pub async fn list_attempts(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    task_id: DbId,
) -> ServiceResult<Vec<AttemptView>> {
    access::require_progress_reader(requester, user_id)?;
    let task = find_task(&state.pool, task_id).await?;
    let settings = find_quiz(&state.pool, &task).await?.settings();

    let now = chrono::Utc::now();
    AttemptRepo::list_for_user(&state.pool, user_id, task_id)
        .await?
        .into_iter()
        .map(|attempt| attempt_view(attempt, &settings, now))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn option(id: DbId, question_id: DbId, is_correct: bool) -> QuizOption {
        QuizOption {
            id,
            question_id,
            text: format!("option {id}"),
            is_correct,
            sort_order: 0,
            explanation: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn answer_key_groups_options_by_question() {
        let options = vec![
            option(10, 1, false),
            option(11, 1, true),
            option(20, 2, true),
            option(21, 2, false),
        ];
        let keys = answer_key(&options).unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].question_id, 1);
        assert_eq!(keys[0].correct_option_id, 11);
        assert_eq!(keys[0].option_ids, vec![10, 11]);
        assert_eq!(keys[1].correct_option_id, 20);
    }

    #[test]
    fn answer_key_without_correct_option_is_internal() {
        let err = answer_key(&[option(10, 1, false), option(11, 1, false)]).unwrap_err();
        assert_eq!(err.code(), "internal");
    }

    fn attempt(status: &str, started_minutes_ago: i64, score: i32) -> QuizAttempt {
        let started_at = Utc::now() - chrono::Duration::minutes(started_minutes_ago);
        QuizAttempt {
            id: 1,
            user_id: 2,
            quiz_id: 3,
            score,
            time_taken_secs: None,
            completion_status: status.into(),
            started_at,
            attempt_date: None,
            created_at: started_at,
            updated_at: started_at,
        }
    }

    #[test]
    fn view_reports_expired_attempts_as_incomplete() {
        let settings = QuizSettings::default();
        let view = attempt_view(attempt("in_progress", 45, 0), &settings, Utc::now()).unwrap();
        assert_eq!(view.status, AttemptStatus::Incomplete);
        assert!(!view.passed);
    }

    #[test]
    fn view_passes_completed_attempt_at_threshold() {
        let settings = QuizSettings::default();
        let view = attempt_view(attempt("completed", 5, 70), &settings, Utc::now()).unwrap();
        assert_eq!(view.status, AttemptStatus::Completed);
        assert!(view.passed);
    }

    #[test]
    fn only_owner_may_submit() {
        use learnhub_core::roles::Role;
        let a = attempt("in_progress", 1, 0);
        assert!(require_attempt_owner(&Principal::new(2, Role::Student, false), &a).is_ok());
        assert!(require_attempt_owner(&Principal::new(9, Role::Admin, false), &a).is_err());
        assert!(require_attempt_reader(&Principal::new(9, Role::Instructor, false), &a).is_ok());
        assert!(require_attempt_reader(&Principal::new(9, Role::Student, false), &a).is_err());
    }
}
