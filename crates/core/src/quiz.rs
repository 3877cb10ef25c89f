//! Quiz engine rules: settings, attempt lifecycle, grading, and ordering.
//!
//! ```text
//! ─create──▶ in_progress ──submit──▶ completed
//!                │
//!                ├─timeout──▶ incomplete
//!                └─close────▶ abandoned
//! ```
//!
//! The stored attempt status is never trusted on its own: an attempt is
//! active only while it is `in_progress` *and* inside its time limit.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CONFLICT_ATTEMPT_CAP_REACHED};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

pub const MIN_TIME_LIMIT_MINUTES: i32 = 1;
pub const MAX_TIME_LIMIT_MINUTES: i32 = 180;
pub const MIN_PASS_THRESHOLD: i32 = 0;
pub const MAX_PASS_THRESHOLD: i32 = 100;

/// Defaults applied when a quiz task is created without explicit settings.
pub const DEFAULT_TIME_LIMIT_MINUTES: i32 = 30;
pub const DEFAULT_PASS_THRESHOLD: i32 = 70;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Minimum number of options on a question.
pub const MIN_OPTIONS_PER_QUESTION: usize = 2;

/// Maximum length for question text.
pub const MAX_QUESTION_TEXT_LENGTH: usize = 10_000;

pub const ATTEMPT_IN_PROGRESS: &str = "in_progress";
pub const ATTEMPT_COMPLETED: &str = "completed";
pub const ATTEMPT_INCOMPLETE: &str = "incomplete";
pub const ATTEMPT_ABANDONED: &str = "abandoned";

pub const VALID_ATTEMPT_STATUSES: &[&str] = &[
    ATTEMPT_IN_PROGRESS,
    ATTEMPT_COMPLETED,
    ATTEMPT_INCOMPLETE,
    ATTEMPT_ABANDONED,
];

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// The quiz-specific side record of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSettings {
    pub time_limit_minutes: i32,
    pub pass_threshold: i32,
    pub max_attempts: i32,
    pub randomize_questions: bool,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            time_limit_minutes: DEFAULT_TIME_LIMIT_MINUTES,
            pass_threshold: DEFAULT_PASS_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            randomize_questions: false,
        }
    }
}

impl QuizSettings {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(MIN_TIME_LIMIT_MINUTES..=MAX_TIME_LIMIT_MINUTES).contains(&self.time_limit_minutes) {
            return Err(CoreError::Validation(format!(
                "time_limit_minutes must be between {MIN_TIME_LIMIT_MINUTES} and \
                 {MAX_TIME_LIMIT_MINUTES}, got {}",
                self.time_limit_minutes
            )));
        }
        if !(MIN_PASS_THRESHOLD..=MAX_PASS_THRESHOLD).contains(&self.pass_threshold) {
            return Err(CoreError::Validation(format!(
                "pass_threshold must be between {MIN_PASS_THRESHOLD} and {MAX_PASS_THRESHOLD}, got {}",
                self.pass_threshold
            )));
        }
        if self.max_attempts < 1 {
            return Err(CoreError::Validation(format!(
                "max_attempts must be at least 1, got {}",
                self.max_attempts
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Attempt lifecycle
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    Incomplete,
    Abandoned,
}

impl AttemptStatus {
    pub fn from_str_value(s: &str) -> Result<Self, CoreError> {
        match s {
            ATTEMPT_IN_PROGRESS => Ok(Self::InProgress),
            ATTEMPT_COMPLETED => Ok(Self::Completed),
            ATTEMPT_INCOMPLETE => Ok(Self::Incomplete),
            ATTEMPT_ABANDONED => Ok(Self::Abandoned),
            _ => Err(CoreError::Validation(format!(
                "Invalid attempt status '{s}'. Must be one of: {}",
                VALID_ATTEMPT_STATUSES.join(", ")
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => ATTEMPT_IN_PROGRESS,
            Self::Completed => ATTEMPT_COMPLETED,
            Self::Incomplete => ATTEMPT_INCOMPLETE,
            Self::Abandoned => ATTEMPT_ABANDONED,
        }
    }
}

/// Refuse a new attempt once `existing_attempts` has reached the cap.
pub fn check_attempt_cap(existing_attempts: i64, max_attempts: i32) -> Result<(), CoreError> {
    if existing_attempts >= i64::from(max_attempts) {
        return Err(CoreError::conflict_with_details(
            CONFLICT_ATTEMPT_CAP_REACHED,
            format!("Maximum of {max_attempts} attempt(s) reached for this quiz"),
            serde_json::json!({
                "attempts_used": existing_attempts,
                "max_attempts": max_attempts,
            }),
        ));
    }
    Ok(())
}

/// Whether the time limit has elapsed at `now`.
pub fn is_expired(started_at: Timestamp, time_limit_minutes: i32, now: Timestamp) -> bool {
    now - started_at > chrono::Duration::minutes(i64::from(time_limit_minutes))
}

/// `in_progress` and still within the time limit.
pub fn is_attempt_active(
    status: AttemptStatus,
    started_at: Timestamp,
    time_limit_minutes: i32,
    now: Timestamp,
) -> bool {
    status == AttemptStatus::InProgress && !is_expired(started_at, time_limit_minutes, now)
}

/// The status a reader must report: an expired `in_progress` attempt is `incomplete`.
pub fn effective_status(
    status: AttemptStatus,
    started_at: Timestamp,
    time_limit_minutes: i32,
    now: Timestamp,
) -> AttemptStatus {
    if status == AttemptStatus::InProgress && is_expired(started_at, time_limit_minutes, now) {
        AttemptStatus::Incomplete
    } else {
        status
    }
}

/// Guard for submit/abandon: the attempt must be active.
pub fn ensure_active(
    status: AttemptStatus,
    started_at: Timestamp,
    time_limit_minutes: i32,
    now: Timestamp,
) -> Result<(), CoreError> {
    match effective_status(status, started_at, time_limit_minutes, now) {
        AttemptStatus::InProgress => Ok(()),
        AttemptStatus::Completed => Err(CoreError::StaleState(
            "Attempt has already been submitted".into(),
        )),
        AttemptStatus::Incomplete => Err(CoreError::StaleState(
            "Attempt time limit has elapsed".into(),
        )),
        AttemptStatus::Abandoned => Err(CoreError::StaleState(
            "Attempt has been closed".into(),
        )),
    }
}

/// Whole seconds between `started_at` and `now`, clamped to `i32`.
pub fn elapsed_secs(started_at: Timestamp, now: Timestamp) -> i32 {
    let secs = (now - started_at).num_seconds().max(0);
    i32::try_from(secs).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Integer percentage `100·correct/total`, rounded half-up; 0 when `total` is 0.
pub fn compute_score(correct: i64, total: i64) -> i32 {
    if total <= 0 {
        return 0;
    }
    let correct = correct.clamp(0, total);
    // (200c + t) / 2t == floor(100c/t + 1/2)
    ((200 * correct + total) / (2 * total)) as i32
}

/// An attempt passes when its score meets the threshold (inclusive).
pub fn passes(score: i32, pass_threshold: i32) -> bool {
    score >= pass_threshold
}

/// Answer key for one question of a quiz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionKey {
    pub question_id: DbId,
    pub correct_option_id: DbId,
    pub option_ids: Vec<DbId>,
}

/// One submitted answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedAnswer {
    pub question_id: DbId,
    pub option_id: DbId,
    #[serde(default)]
    pub time_spent_secs: Option<i32>,
}

/// A graded answer ready to be persisted as a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GradedAnswer {
    pub question_id: DbId,
    pub option_id: DbId,
    pub is_correct: bool,
    pub time_spent_secs: i32,
}

/// Outcome of grading a whole submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GradedSubmission {
    pub answers: Vec<GradedAnswer>,
    pub correct: i64,
    pub total: i64,
    pub score: i32,
}

/// Grade `answers` against the quiz's answer key.
///
/// Every answer must reference a question of this quiz and one of that
/// question's options; a question may be answered at most once.
pub fn grade_submission(
    keys: &[QuestionKey],
    answers: &[SubmittedAnswer],
) -> Result<GradedSubmission, CoreError> {
    let by_question: HashMap<DbId, &QuestionKey> =
        keys.iter().map(|k| (k.question_id, k)).collect();
    let mut seen = HashSet::new();
    let mut graded = Vec::with_capacity(answers.len());

    for answer in answers {
        let key = by_question.get(&answer.question_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "Question {} does not belong to this quiz",
                answer.question_id
            ))
        })?;
        if !seen.insert(answer.question_id) {
            return Err(CoreError::Validation(format!(
                "Question {} was answered more than once",
                answer.question_id
            )));
        }
        if !key.option_ids.contains(&answer.option_id) {
            return Err(CoreError::Validation(format!(
                "Option {} is not an option of question {}",
                answer.option_id, answer.question_id
            )));
        }
        if let Some(t) = answer.time_spent_secs {
            if t < 0 {
                return Err(CoreError::Validation(
                    "time_spent_secs must not be negative".into(),
                ));
            }
        }
        graded.push(GradedAnswer {
            question_id: answer.question_id,
            option_id: answer.option_id,
            is_correct: answer.option_id == key.correct_option_id,
            time_spent_secs: answer.time_spent_secs.unwrap_or(0),
        });
    }

    let total = graded.len() as i64;
    let correct = graded.iter().filter(|a| a.is_correct).count() as i64;
    Ok(GradedSubmission {
        score: compute_score(correct, total),
        answers: graded,
        correct,
        total,
    })
}

// ---------------------------------------------------------------------------
// Authoring
// ---------------------------------------------------------------------------

/// An option as supplied by a quiz author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionDraft {
    pub text: String,
    pub is_correct: bool,
    #[serde(default)]
    pub explanation: Option<String>,
}

pub fn validate_question(text: &str, points: i32) -> Result<(), CoreError> {
    if text.trim().is_empty() {
        return Err(CoreError::Validation("Question text must not be empty".into()));
    }
    if text.len() > MAX_QUESTION_TEXT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Question text exceeds maximum length of {MAX_QUESTION_TEXT_LENGTH} characters"
        )));
    }
    if points < 0 {
        return Err(CoreError::Validation(format!(
            "Question points must be >= 0, got {points}"
        )));
    }
    Ok(())
}

/// A question needs at least two options and exactly one correct option.
pub fn validate_options(options: &[OptionDraft]) -> Result<(), CoreError> {
    if options.len() < MIN_OPTIONS_PER_QUESTION {
        return Err(CoreError::Validation(format!(
            "A question needs at least {MIN_OPTIONS_PER_QUESTION} options"
        )));
    }
    if options.iter().any(|o| o.text.trim().is_empty()) {
        return Err(CoreError::Validation("Option text must not be empty".into()));
    }
    let correct = options.iter().filter(|o| o.is_correct).count();
    if correct != 1 {
        return Err(CoreError::Validation(format!(
            "A question must have exactly one correct option, found {correct}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ordering
// ---------------------------------------------------------------------------

/// The order questions are presented in for one attempt.
///
/// `question_ids` must already be in authored order. With randomisation on,
/// the result is a permutation seeded by the attempt id, so the same attempt
/// always sees the same order.
pub fn presentation_order(question_ids: &[DbId], attempt_id: DbId, randomize: bool) -> Vec<DbId> {
    let mut ordered = question_ids.to_vec();
    if randomize {
        let mut rng = StdRng::seed_from_u64(attempt_id as u64);
        ordered.shuffle(&mut rng);
    }
    ordered
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration, Utc};

    use super::*;

    fn keys() -> Vec<QuestionKey> {
        (1..=4)
            .map(|q| QuestionKey {
                question_id: q,
                correct_option_id: q * 10 + 1,
                option_ids: vec![q * 10 + 1, q * 10 + 2],
            })
            .collect()
    }

    fn answer(question_id: DbId, option_id: DbId) -> SubmittedAnswer {
        SubmittedAnswer {
            question_id,
            option_id,
            time_spent_secs: None,
        }
    }

    #[test]
    fn settings_bounds() {
        assert!(QuizSettings::default().validate().is_ok());
        let bad = |f: fn(&mut QuizSettings)| {
            let mut s = QuizSettings::default();
            f(&mut s);
            s.validate().is_err()
        };
        assert!(bad(|s| s.time_limit_minutes = 0));
        assert!(bad(|s| s.time_limit_minutes = 181));
        assert!(bad(|s| s.pass_threshold = 101));
        assert!(bad(|s| s.pass_threshold = -1));
        assert!(bad(|s| s.max_attempts = 0));
    }

    #[test]
    fn boundary_settings_accepted() {
        let s = QuizSettings {
            time_limit_minutes: 180,
            pass_threshold: 100,
            max_attempts: 1,
            randomize_questions: true,
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn cap_allows_until_reached() {
        assert!(check_attempt_cap(0, 2).is_ok());
        assert!(check_attempt_cap(1, 2).is_ok());
        let err = check_attempt_cap(2, 2).unwrap_err();
        assert_matches!(err, CoreError::Conflict { reason: CONFLICT_ATTEMPT_CAP_REACHED, .. });
    }

    #[test]
    fn activity_depends_on_clock() {
        let start = Utc::now();
        assert!(is_attempt_active(
            AttemptStatus::InProgress,
            start,
            10,
            start + Duration::minutes(10)
        ));
        assert!(!is_attempt_active(
            AttemptStatus::InProgress,
            start,
            10,
            start + Duration::minutes(10) + Duration::seconds(1)
        ));
        assert!(!is_attempt_active(AttemptStatus::Completed, start, 10, start));
    }

    #[test]
    fn expired_attempt_reads_as_incomplete() {
        let start = Utc::now() - Duration::hours(2);
        assert_eq!(
            effective_status(AttemptStatus::InProgress, start, 30, Utc::now()),
            AttemptStatus::Incomplete
        );
        assert_eq!(
            effective_status(AttemptStatus::Abandoned, start, 30, Utc::now()),
            AttemptStatus::Abandoned
        );
    }

    #[test]
    fn double_submit_is_stale() {
        let now = Utc::now();
        let err = ensure_active(AttemptStatus::Completed, now, 30, now).unwrap_err();
        assert_matches!(err, CoreError::StaleState(_));
        let err = ensure_active(AttemptStatus::InProgress, now - Duration::hours(1), 30, now)
            .unwrap_err();
        assert_matches!(err, CoreError::StaleState(ref m) if m.contains("time limit"));
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(compute_score(3, 4), 75);
        assert_eq!(compute_score(1, 3), 33);
        assert_eq!(compute_score(2, 3), 67);
        assert_eq!(compute_score(1, 8), 13); // 12.5 → 13
        assert_eq!(compute_score(0, 0), 0);
        assert_eq!(compute_score(5, 5), 100);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert!(passes(70, 70));
        assert!(!passes(69, 70));
        assert!(passes(0, 0));
    }

    #[test]
    fn grading_three_of_four() {
        let graded = grade_submission(
            &keys(),
            &[answer(1, 11), answer(2, 21), answer(3, 32), answer(4, 41)],
        )
        .unwrap();
        assert_eq!(graded.correct, 3);
        assert_eq!(graded.total, 4);
        assert_eq!(graded.score, 75);
        assert!(!graded.answers[2].is_correct);
    }

    #[test]
    fn empty_submission_scores_zero() {
        let graded = grade_submission(&keys(), &[]).unwrap();
        assert_eq!(graded.score, 0);
        assert_eq!(graded.total, 0);
    }

    #[test]
    fn foreign_question_rejected() {
        let err = grade_submission(&keys(), &[answer(99, 11)]).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn option_from_other_question_rejected() {
        let err = grade_submission(&keys(), &[answer(1, 21)]).unwrap_err();
        assert_matches!(err, CoreError::Validation(ref m) if m.contains("not an option"));
    }

    #[test]
    fn duplicate_answer_rejected() {
        let err = grade_submission(&keys(), &[answer(1, 11), answer(1, 12)]).unwrap_err();
        assert_matches!(err, CoreError::Validation(ref m) if m.contains("more than once"));
    }

    #[test]
    fn options_need_exactly_one_correct() {
        let opt = |text: &str, is_correct| OptionDraft {
            text: text.into(),
            is_correct,
            explanation: None,
        };
        assert!(validate_options(&[opt("a", true), opt("b", false)]).is_ok());
        assert!(validate_options(&[opt("a", true), opt("b", true)]).is_err());
        assert!(validate_options(&[opt("a", false), opt("b", false)]).is_err());
        assert!(validate_options(&[opt("a", true)]).is_err());
        assert!(validate_options(&[opt("a", true), opt(" ", false)]).is_err());
    }

    #[test]
    fn question_validation() {
        assert!(validate_question("What is 2+2?", 1).is_ok());
        assert!(validate_question("", 1).is_err());
        assert!(validate_question("Q", -1).is_err());
    }

    #[test]
    fn ordering_is_stable_per_attempt() {
        let ids: Vec<DbId> = (1..=20).collect();
        let a = presentation_order(&ids, 42, true);
        let b = presentation_order(&ids, 42, true);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }

    #[test]
    fn ordering_untouched_without_randomisation() {
        let ids = vec![5, 3, 9];
        assert_eq!(presentation_order(&ids, 7, false), ids);
    }

    #[test]
    fn elapsed_secs_never_negative() {
        let now = Utc::now();
        assert_eq!(elapsed_secs(now + Duration::seconds(5), now), 0);
        assert_eq!(elapsed_secs(now - Duration::seconds(90), now), 90);
    }
}
