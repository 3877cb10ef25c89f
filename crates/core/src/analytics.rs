//! Analytics arithmetic.
//!
//! The aggregator in the service crate fetches raw counts and rows; every
//! derived figure (rates, buckets, difficulty, averages) is computed here so
//! the rules live in one place. No database access.

use serde::{Deserialize, Serialize};

use crate::progress::round2;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Score at or above which report (e) counts an attempt as passed.
pub const REPORT_PASS_SCORE: i32 = 60;

/// Questions with a success rate below this are candidates for "most failed".
pub const MOST_FAILED_SUCCESS_CEILING: f64 = 50.0;

/// Minimum responses before a question can be ranked as most failed.
pub const MOST_FAILED_MIN_RESPONSES: i64 = 5;

pub const MOST_FAILED_LIMIT: usize = 10;

pub const RECENT_ACTIVITY_LIMIT: usize = 3;

pub const RECENT_ATTEMPTS_LIMIT: usize = 5;

/// Rows shown in "recent" dashboard lists.
pub const DASHBOARD_RECENT_LIMIT: usize = 5;

// ---------------------------------------------------------------------------
// Rates and averages
// ---------------------------------------------------------------------------

/// `part / whole · 100` rounded to two decimals; 0 when `whole` is 0.
pub fn rate(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    round2(part as f64 / whole as f64 * 100.0)
}

/// Mean of `values` rounded to two decimals, `None` when empty.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(round2(values.iter().sum::<f64>() / values.len() as f64))
}

pub fn mean_score(scores: &[i32]) -> Option<f64> {
    let values: Vec<f64> = scores.iter().map(|s| f64::from(*s)).collect();
    mean(&values)
}

/// Mean of `completion − start` in hours over rows where both are set.
pub fn average_completion_hours(spans: &[(Option<Timestamp>, Option<Timestamp>)]) -> Option<f64> {
    let hours: Vec<f64> = spans
        .iter()
        .filter_map(|(start, end)| match (start, end) {
            (Some(s), Some(e)) if e >= s => Some((*e - *s).num_seconds() as f64 / 3600.0),
            _ => None,
        })
        .collect();
    mean(&hours)
}

// ---------------------------------------------------------------------------
// Completion distribution
// ---------------------------------------------------------------------------

/// Per-student completion rates bucketed into quarter ranges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionBuckets {
    pub below_25: i64,
    pub from_25_to_50: i64,
    pub from_50_to_75: i64,
    pub from_75: i64,
}

impl CompletionBuckets {
    pub fn from_rates(rates: &[f64]) -> Self {
        let mut buckets = Self::default();
        for r in rates {
            buckets.add(*r);
        }
        buckets
    }

    pub fn add(&mut self, rate: f64) {
        if rate < 25.0 {
            self.below_25 += 1;
        } else if rate < 50.0 {
            self.from_25_to_50 += 1;
        } else if rate < 75.0 {
            self.from_50_to_75 += 1;
        } else {
            self.from_75 += 1;
        }
    }

    pub fn total(&self) -> i64 {
        self.below_25 + self.from_25_to_50 + self.from_50_to_75 + self.from_75
    }
}

// ---------------------------------------------------------------------------
// Difficulty
// ---------------------------------------------------------------------------

/// Estimated task difficulty derived from its completion rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    High,
    Medium,
    Low,
}

impl Difficulty {
    pub fn from_completion_rate(rate: f64) -> Self {
        if rate < 50.0 {
            Self::High
        } else if rate < 80.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

// ---------------------------------------------------------------------------
// Question success
// ---------------------------------------------------------------------------

/// Response tallies for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionSuccess {
    pub question_id: DbId,
    pub quiz_id: DbId,
    pub text: String,
    pub total_responses: i64,
    pub correct_responses: i64,
    pub success_rate: f64,
}

impl QuestionSuccess {
    pub fn new(
        question_id: DbId,
        quiz_id: DbId,
        text: String,
        total_responses: i64,
        correct_responses: i64,
    ) -> Self {
        Self {
            question_id,
            quiz_id,
            text,
            total_responses,
            correct_responses,
            success_rate: rate(correct_responses, total_responses),
        }
    }
}

/// Sort ascending by success rate; ties by question id.
pub fn sort_by_success(questions: &mut [QuestionSuccess]) {
    questions.sort_by(|a, b| {
        a.success_rate
            .total_cmp(&b.success_rate)
            .then(a.question_id.cmp(&b.question_id))
    });
}

/// The hardest questions: success below 50% with enough responses, lowest first.
pub fn most_failed(questions: Vec<QuestionSuccess>) -> Vec<QuestionSuccess> {
    let mut failing: Vec<QuestionSuccess> = questions
        .into_iter()
        .filter(|q| {
            q.total_responses >= MOST_FAILED_MIN_RESPONSES
                && q.success_rate < MOST_FAILED_SUCCESS_CEILING
        })
        .collect();
    sort_by_success(&mut failing);
    failing.truncate(MOST_FAILED_LIMIT);
    failing
}

// ---------------------------------------------------------------------------
// Score summaries
// ---------------------------------------------------------------------------

/// Aggregate over a set of completed attempt scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSummary {
    pub attempts: i64,
    pub average_score: Option<f64>,
    pub highest_score: Option<i32>,
    pub lowest_score: Option<i32>,
    pub passed: i64,
    pub failed: i64,
    pub pass_rate: f64,
}

impl ScoreSummary {
    /// Summarise `scores` using `pass_score` as the inclusive pass mark.
    pub fn from_scores(scores: &[i32], pass_score: i32) -> Self {
        let attempts = scores.len() as i64;
        let passed = scores.iter().filter(|s| **s >= pass_score).count() as i64;
        Self {
            attempts,
            average_score: mean_score(scores),
            highest_score: scores.iter().copied().max(),
            lowest_score: scores.iter().copied().min(),
            passed,
            failed: attempts - passed,
            pass_rate: rate(passed, attempts),
        }
    }
}

/// Mean number of attempts each user needed to pass a quiz.
///
/// `per_user` holds, for each user, their attempts in start order: `Some(score)`
/// for completed attempts and `None` for attempts that never scored. Users
/// who never passed are excluded.
pub fn average_attempts_to_pass(per_user: &[Vec<Option<i32>>], pass_threshold: i32) -> Option<f64> {
    let counts: Vec<f64> = per_user
        .iter()
        .filter_map(|attempts| {
            attempts
                .iter()
                .position(|s| matches!(s, Some(score) if *score >= pass_threshold))
                .map(|idx| (idx + 1) as f64)
        })
        .collect();
    mean(&counts)
}

/// Order `(key, average)` pairs by average descending, missing averages last.
pub fn sort_by_average_desc<T>(items: &mut [T], average: impl Fn(&T) -> Option<f64>) {
    items.sort_by(|a, b| {
        let (a, b) = (average(a), average(b));
        match (a, b) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        }
    });
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;

    #[test]
    fn rate_handles_zero_denominator() {
        assert_eq!(rate(3, 0), 0.0);
        assert_eq!(rate(1, 3), 33.33);
        assert_eq!(rate(2, 2), 100.0);
    }

    #[test]
    fn buckets_use_half_open_ranges() {
        let b = CompletionBuckets::from_rates(&[0.0, 24.99, 25.0, 50.0, 74.9, 75.0, 100.0]);
        assert_eq!(b.below_25, 2);
        assert_eq!(b.from_25_to_50, 1);
        assert_eq!(b.from_50_to_75, 2);
        assert_eq!(b.from_75, 2);
        assert_eq!(b.total(), 7);
    }

    #[test]
    fn difficulty_labels() {
        assert_eq!(Difficulty::from_completion_rate(49.9), Difficulty::High);
        assert_eq!(Difficulty::from_completion_rate(50.0), Difficulty::Medium);
        assert_eq!(Difficulty::from_completion_rate(79.99), Difficulty::Medium);
        assert_eq!(Difficulty::from_completion_rate(80.0), Difficulty::Low);
    }

    fn question(id: DbId, total: i64, correct: i64) -> QuestionSuccess {
        QuestionSuccess::new(id, 1, format!("Q{id}"), total, correct)
    }

    #[test]
    fn most_failed_filters_and_sorts() {
        let result = most_failed(vec![
            question(1, 10, 4), // 40%
            question(2, 4, 0),  // too few responses
            question(3, 10, 1), // 10%
            question(4, 10, 5), // exactly 50%, excluded
            question(5, 6, 2),  // 33.33%
        ]);
        let ids: Vec<DbId> = result.iter().map(|q| q.question_id).collect();
        assert_eq!(ids, vec![3, 5, 1]);
    }

    #[test]
    fn most_failed_caps_at_ten() {
        let qs = (1..=15).map(|i| question(i, 10, 0)).collect();
        assert_eq!(most_failed(qs).len(), MOST_FAILED_LIMIT);
    }

    #[test]
    fn score_summary_uses_pass_mark() {
        let s = ScoreSummary::from_scores(&[80, 59, 60, 40], REPORT_PASS_SCORE);
        assert_eq!(s.attempts, 4);
        assert_eq!(s.passed, 2);
        assert_eq!(s.failed, 2);
        assert_eq!(s.pass_rate, 50.0);
        assert_eq!(s.average_score, Some(59.75));
        assert_eq!(s.highest_score, Some(80));
        assert_eq!(s.lowest_score, Some(40));
    }

    #[test]
    fn empty_score_summary() {
        let s = ScoreSummary::from_scores(&[], REPORT_PASS_SCORE);
        assert_eq!(s, ScoreSummary::default());
    }

    #[test]
    fn attempts_to_pass_counts_up_to_first_pass() {
        let per_user = vec![
            vec![Some(80)],             // 1
            vec![Some(20), None, Some(90)], // 3
            vec![Some(10), Some(20)],   // never passed
        ];
        assert_eq!(average_attempts_to_pass(&per_user, 70), Some(2.0));
        assert_eq!(average_attempts_to_pass(&[], 70), None);
    }

    #[test]
    fn completion_hours_skip_partial_rows() {
        let start = Utc::now();
        let spans = vec![
            (Some(start), Some(start + Duration::hours(2))),
            (Some(start), Some(start + Duration::hours(4))),
            (Some(start), None),
            (None, Some(start)),
        ];
        assert_eq!(average_completion_hours(&spans), Some(3.0));
    }

    #[test]
    fn average_sort_puts_missing_last() {
        let mut items = vec![(1, None), (2, Some(50.0)), (3, Some(90.0))];
        sort_by_average_desc(&mut items, |(_, avg)| *avg);
        let keys: Vec<i32> = items.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![3, 2, 1]);
    }
}
