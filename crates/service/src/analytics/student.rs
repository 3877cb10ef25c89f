//! Student-scoped reports.

use std::collections::{HashMap, HashSet};

use learnhub_core::access::{self, Principal};
use learnhub_core::analytics::{
    self, ScoreSummary, RECENT_ACTIVITY_LIMIT, RECENT_ATTEMPTS_LIMIT, REPORT_PASS_SCORE,
};
use learnhub_core::enrollment::EnrollmentStatus;
use learnhub_core::progress::{self, ProgressStats};
use learnhub_core::quiz::ATTEMPT_COMPLETED;
use learnhub_core::reports::{
    ActivityItem, CategoryBreakdown, CourseQuizBreakdown, EnrollmentCounts, RecentAttempt,
    StudentCourseBlock, StudentProgressReport, StudentQuizPerformance,
};
use learnhub_core::types::DbId;
use learnhub_db::models::analytics::UserAttemptRow;
use learnhub_db::repositories::{AnalyticsRepo, EnrollmentRepo, ProgressRepo};

use super::ensure_user_exists;
use crate::cache::ReportKind;
use crate::error::ServiceResult;
use crate::state::EngineState;

/// Scores of completed attempts; other attempts never carry a score.
pub(crate) fn completed_scores<'a>(rows: impl IntoIterator<Item = &'a UserAttemptRow>) -> Vec<i32> {
    rows.into_iter()
        .filter(|a| a.completion_status == ATTEMPT_COMPLETED)
        .map(|a| a.score)
        .collect()
}

// ---------------------------------------------------------------------------
// (d) Student progress
// ---------------------------------------------------------------------------

/// Progress across every enrolment of one student.
pub async fn student_progress(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
) -> ServiceResult<StudentProgressReport> {
    access::require_progress_reader(requester, user_id)?;
    ensure_user_exists(state, user_id).await?;
    state
        .cache
        .get_or_compute(ReportKind::StudentProgress, user_id, || {
            compute_student_progress(state, user_id)
        })
        .await
}

async fn compute_student_progress(
    state: &EngineState,
    user_id: DbId,
) -> ServiceResult<StudentProgressReport> {
    let pool = &state.pool;
    let enrollments: EnrollmentCounts = EnrollmentRepo::counts_for_user(pool, user_id).await?.into();
    let attempts = AnalyticsRepo::user_attempts(pool, user_id).await?;

    let mut activity_by_course: HashMap<DbId, Vec<ActivityItem>> = HashMap::new();
    for row in AnalyticsRepo::user_activity(pool, user_id).await? {
        activity_by_course
            .entry(row.course_id)
            .or_default()
            .push(row.into());
    }

    let mut courses = Vec::new();
    let (mut completed_sum, mut total_sum) = (0, 0);
    for enrolment in EnrollmentRepo::list_for_user(pool, user_id).await? {
        let counts = ProgressRepo::counts_for_course(pool, user_id, enrolment.course_id).await?;
        let stats = ProgressStats::compute(counts.total, counts.completed, counts.in_progress);
        if EnrollmentStatus::from_str_value(&enrolment.status)? != EnrollmentStatus::Dropped {
            completed_sum += stats.completed;
            total_sum += stats.total;
        }

        let course_attempts: Vec<&UserAttemptRow> = attempts
            .iter()
            .filter(|a| a.course_id == enrolment.course_id)
            .collect();
        let mut activity = activity_by_course.remove(&enrolment.course_id).unwrap_or_default();
        let last_access = activity.first().map(|a| a.updated_at);
        activity.truncate(RECENT_ACTIVITY_LIMIT);

        courses.push(StudentCourseBlock {
            course_id: enrolment.course_id,
            title: enrolment.course_title,
            enrollment_status: enrolment.status,
            enrollment_date: enrolment.enrollment_date,
            progress: stats,
            quiz_average: analytics::mean_score(&completed_scores(course_attempts.iter().copied())),
            quiz_attempts: course_attempts.len() as i64,
            recent_activity: activity,
            last_access,
        });
    }

    Ok(StudentProgressReport {
        user_id,
        enrollments,
        overall_completion_percentage: progress::completion_percentage(completed_sum, total_sum),
        courses,
        generated_at: chrono::Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// (e) Student quiz performance
// ---------------------------------------------------------------------------

/// Quiz results of one student: overall, per course, recent and per category.
pub async fn student_quiz_performance(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
) -> ServiceResult<StudentQuizPerformance> {
    access::require_progress_reader(requester, user_id)?;
    ensure_user_exists(state, user_id).await?;
    state
        .cache
        .get_or_compute(ReportKind::StudentQuizPerformance, user_id, || {
            compute_student_quiz_performance(state, user_id)
        })
        .await
}

async fn compute_student_quiz_performance(
    state: &EngineState,
    user_id: DbId,
) -> ServiceResult<StudentQuizPerformance> {
    let pool = &state.pool;
    let attempts = AnalyticsRepo::user_attempts(pool, user_id).await?;

    let categories = AnalyticsRepo::user_category_stats(pool, user_id)
        .await?
        .into_iter()
        .map(|row| CategoryBreakdown {
            success_rate: analytics::rate(row.correct, row.responses),
            category: row.category,
            responses: row.responses,
            correct: row.correct,
        })
        .collect();

    Ok(StudentQuizPerformance {
        user_id,
        overall: ScoreSummary::from_scores(&completed_scores(&attempts), REPORT_PASS_SCORE),
        courses: course_breakdown(&attempts),
        recent_attempts: recent_attempts(&attempts),
        categories,
        generated_at: chrono::Utc::now(),
    })
}

fn course_breakdown(attempts: &[UserAttemptRow]) -> Vec<CourseQuizBreakdown> {
    let mut order = Vec::new();
    let mut by_course: HashMap<DbId, Vec<&UserAttemptRow>> = HashMap::new();
    for attempt in attempts {
        by_course
            .entry(attempt.course_id)
            .or_insert_with(|| {
                order.push(attempt.course_id);
                Vec::new()
            })
            .push(attempt);
    }

    let mut rows: Vec<CourseQuizBreakdown> = order
        .into_iter()
        .filter_map(|course_id| by_course.remove(&course_id))
        .filter_map(|rows| {
            let first = rows.first()?;
            let summary = ScoreSummary::from_scores(
                &completed_scores(rows.iter().copied()),
                REPORT_PASS_SCORE,
            );
            let quizzes: HashSet<DbId> = rows.iter().map(|a| a.quiz_id).collect();
            Some(CourseQuizBreakdown {
                course_id: first.course_id,
                title: first.course_title.clone(),
                quizzes: quizzes.len() as i64,
                attempts: rows.len() as i64,
                average_score: summary.average_score,
                highest_score: summary.highest_score,
                lowest_score: summary.lowest_score,
            })
        })
        .collect();
    analytics::sort_by_average_desc(&mut rows, |r| r.average_score);
    rows
}

fn recent_attempts(attempts: &[UserAttemptRow]) -> Vec<RecentAttempt> {
    attempts
        .iter()
        .take(RECENT_ATTEMPTS_LIMIT)
        .map(|a| RecentAttempt {
            attempt_id: a.attempt_id,
            quiz_id: a.quiz_id,
            quiz_title: a.quiz_title.clone(),
            course_id: a.course_id,
            status: a.completion_status.clone(),
            score: a.score,
            correct: a.correct,
            total: a.total,
            time_spent_secs: a.time_taken_secs,
            started_at: a.started_at,
        })
        .collect()
}
