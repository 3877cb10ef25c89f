//! Course-scoped reports.

use std::collections::HashMap;

use learnhub_core::access::{self, Principal, TaskScope};
use learnhub_core::analytics::{self, CompletionBuckets, Difficulty, QuestionSuccess};
use learnhub_core::error::CoreError;
use learnhub_core::progress::{
    self, round2, PROGRESS_COMPLETED, PROGRESS_IN_PROGRESS, PROGRESS_NOT_STARTED,
};
use learnhub_core::quiz::{ATTEMPT_COMPLETED, DEFAULT_PASS_THRESHOLD};
use learnhub_core::reports::{
    self, CourseAnalytics, CourseStudentProgress, CourseTaskAnalytics, EnrollmentCounts,
    QuizTaskStats, StudentCourseProgress, TaskAnalytics, TaskStatusRow,
};
use learnhub_core::task::TaskType;
use learnhub_core::types::{DbId, Timestamp};
use learnhub_db::models::analytics::{AttemptRow, ProgressDetailRow};
use learnhub_db::models::task::Task;
use learnhub_db::repositories::{AnalyticsRepo, EnrollmentRepo, QuizRepo, TaskRepo};

use crate::cache::ReportKind;
use crate::courses::{find_course, is_enrolled};
use crate::error::ServiceResult;
use crate::state::EngineState;

// ---------------------------------------------------------------------------
// (a) Course analytics
// ---------------------------------------------------------------------------

/// Enrolment, completion and quiz aggregates for one course.
pub async fn course_analytics(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<CourseAnalytics> {
    access::require_instructor_or_admin(requester)?;
    state
        .cache
        .get_or_compute(ReportKind::CourseAnalytics, course_id, || {
            compute_course_analytics(state, course_id)
        })
        .await
}

async fn compute_course_analytics(
    state: &EngineState,
    course_id: DbId,
) -> ServiceResult<CourseAnalytics> {
    let pool = &state.pool;
    let course = find_course(pool, course_id).await?;

    let enrollments: EnrollmentCounts = EnrollmentRepo::counts(pool, Some(course_id)).await?.into();
    let total_tasks = visible_tasks(state, course_id).await?.len() as i64;

    let rates: Vec<f64> = AnalyticsRepo::student_completion(pool, course_id)
        .await?
        .iter()
        .map(|row| progress::completion_percentage(row.completed, total_tasks))
        .collect();

    let questions: Vec<QuestionSuccess> = AnalyticsRepo::question_stats(pool, course_id)
        .await?
        .into_iter()
        .map(QuestionSuccess::from)
        .collect();

    tracing::debug!(course_id, students = rates.len(), "Computed course analytics");
    Ok(CourseAnalytics {
        course_id,
        title: course.title,
        status: course.status,
        enrollment_completion_percentage: enrollments.completion_percentage(),
        enrollments,
        completion_distribution: CompletionBuckets::from_rates(&rates),
        average_quiz_score: AnalyticsRepo::average_score_for_course(pool, course_id)
            .await?
            .map(round2),
        task_types: AnalyticsRepo::task_type_counts(pool, course_id).await?.into(),
        most_failed_questions: analytics::most_failed(questions),
        generated_at: chrono::Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// (b) Course student progress
// ---------------------------------------------------------------------------

/// Per-student progress through a course, best first.
///
/// Instructors and admins get every enrolled student. A student gets the
/// same report cut down to their own row, provided they are enrolled.
pub async fn course_student_progress(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<CourseStudentProgress> {
    let full_view = access::is_instructor_or_admin(requester);
    if !full_view && !is_enrolled(&state.pool, requester.user_id, course_id).await? {
        return Err(CoreError::Forbidden(
            "Only enrolled students may view their course progress".into(),
        )
        .into());
    }

    let report = state
        .cache
        .get_or_compute(ReportKind::CourseStudentProgress, course_id, || {
            compute_course_student_progress(state, course_id)
        })
        .await?;

    Ok(if full_view {
        report
    } else {
        report.only_user(requester.user_id)
    })
}

async fn compute_course_student_progress(
    state: &EngineState,
    course_id: DbId,
) -> ServiceResult<CourseStudentProgress> {
    let pool = &state.pool;
    find_course(pool, course_id).await?;

    let tasks = visible_tasks(state, course_id).await?;
    let total_tasks = tasks.len() as i64;
    let details = group_by_user(AnalyticsRepo::progress_details(pool, course_id).await?);

    let mut students: Vec<StudentCourseProgress> = AnalyticsRepo::student_completion(pool, course_id)
        .await?
        .into_iter()
        .map(|row| {
            let own = details.get(&row.user_id);
            let task_rows = tasks
                .iter()
                .map(|task| {
                    let detail = own.and_then(|by_task| by_task.get(&task.id));
                    TaskStatusRow {
                        task_id: task.id,
                        title: task.title.clone(),
                        task_type: task.task_type.clone(),
                        status: detail
                            .map(|d| d.status.clone())
                            .unwrap_or_else(|| PROGRESS_NOT_STARTED.to_string()),
                        completion_date: detail.and_then(|d| d.completion_date),
                    }
                })
                .collect();

            StudentCourseProgress {
                user_id: row.user_id,
                username: row.username,
                enrollment_status: row.enrollment_status,
                completion_percentage: progress::completion_percentage(row.completed, total_tasks),
                completed_tasks: row.completed,
                total_tasks,
                tasks: task_rows,
            }
        })
        .collect();
    reports::sort_students_by_completion(&mut students);

    Ok(CourseStudentProgress {
        course_id,
        total_tasks,
        students,
        generated_at: chrono::Utc::now(),
    })
}

fn group_by_user(rows: Vec<ProgressDetailRow>) -> HashMap<DbId, HashMap<DbId, ProgressDetailRow>> {
    let mut grouped: HashMap<DbId, HashMap<DbId, ProgressDetailRow>> = HashMap::new();
    for row in rows {
        grouped.entry(row.user_id).or_default().insert(row.task_id, row);
    }
    grouped
}

// ---------------------------------------------------------------------------
// (c) Course task analytics
// ---------------------------------------------------------------------------

/// Per-task completion, timing and difficulty figures for a course.
pub async fn course_task_analytics(
    state: &EngineState,
    requester: &Principal,
    course_id: DbId,
) -> ServiceResult<CourseTaskAnalytics> {
    access::require_instructor_or_admin(requester)?;
    state
        .cache
        .get_or_compute(ReportKind::CourseTaskAnalytics, course_id, || {
            compute_course_task_analytics(state, course_id)
        })
        .await
}

#[derive(Default)]
struct TaskTally {
    in_progress: i64,
    completed: i64,
    spans: Vec<(Option<Timestamp>, Option<Timestamp>)>,
}

async fn compute_course_task_analytics(
    state: &EngineState,
    course_id: DbId,
) -> ServiceResult<CourseTaskAnalytics> {
    let pool = &state.pool;
    find_course(pool, course_id).await?;

    let counts = EnrollmentRepo::counts(pool, Some(course_id)).await?;
    let enrolled_students = counts.active + counts.completed;
    let tasks = visible_tasks(state, course_id).await?;

    let mut tallies: HashMap<DbId, TaskTally> = HashMap::new();
    for row in AnalyticsRepo::progress_details(pool, course_id).await? {
        let tally = tallies.entry(row.task_id).or_default();
        match row.status.as_str() {
            PROGRESS_COMPLETED => {
                tally.completed += 1;
                tally.spans.push((row.start_date, row.completion_date));
            }
            PROGRESS_IN_PROGRESS => tally.in_progress += 1,
            _ => {}
        }
    }

    let attempts = group_attempts(AnalyticsRepo::course_attempts(pool, course_id).await?);
    let mut questions: HashMap<DbId, Vec<QuestionSuccess>> = HashMap::new();
    for row in AnalyticsRepo::question_stats(pool, course_id).await? {
        questions.entry(row.quiz_id).or_default().push(row.into());
    }

    let mut rows = Vec::with_capacity(tasks.len());
    for task in tasks {
        let tally = tallies.remove(&task.id).unwrap_or_default();
        let completion_rate = analytics::rate(tally.completed, enrolled_students);
        let is_quiz = TaskType::from_str_value(&task.task_type)? == TaskType::Quiz;

        let (average_attempts_to_complete, quiz) = if is_quiz {
            let pass_threshold = QuizRepo::find_settings(pool, task.id)
                .await?
                .map(|q| q.pass_threshold)
                .unwrap_or(DEFAULT_PASS_THRESHOLD);
            let per_user = attempts.get(&task.id).cloned().unwrap_or_default();
            let stats = quiz_stats(&per_user, questions.remove(&task.id).unwrap_or_default());
            let sequences: Vec<Vec<Option<i32>>> = per_user.into_iter().map(|(_, s)| s).collect();
            (
                analytics::average_attempts_to_pass(&sequences, pass_threshold),
                Some(stats),
            )
        } else {
            ((tally.completed > 0).then_some(1.0), None)
        };

        rows.push(TaskAnalytics {
            task_id: task.id,
            title: task.title,
            task_type: task.task_type,
            sort_order: task.sort_order,
            not_started: (enrolled_students - tally.in_progress - tally.completed).max(0),
            in_progress: tally.in_progress,
            completed: tally.completed,
            completion_rate,
            average_completion_hours: analytics::average_completion_hours(&tally.spans),
            difficulty: Difficulty::from_completion_rate(completion_rate),
            average_attempts_to_complete,
            quiz,
        });
    }

    Ok(CourseTaskAnalytics {
        course_id,
        enrolled_students,
        tasks: rows,
        generated_at: chrono::Utc::now(),
    })
}

/// Attempts per quiz, per user, in start order: `Some(score)` when completed.
type AttemptSequences = HashMap<DbId, Vec<(DbId, Vec<Option<i32>>)>>;

fn group_attempts(rows: Vec<AttemptRow>) -> AttemptSequences {
    let mut grouped: AttemptSequences = HashMap::new();
    for row in rows {
        let per_quiz = grouped.entry(row.quiz_id).or_default();
        let score = (row.completion_status == ATTEMPT_COMPLETED).then_some(row.score);
        match per_quiz.last_mut() {
            Some((user_id, seq)) if *user_id == row.user_id => seq.push(score),
            _ => per_quiz.push((row.user_id, vec![score])),
        }
    }
    grouped
}

fn quiz_stats(per_user: &[(DbId, Vec<Option<i32>>)], mut questions: Vec<QuestionSuccess>) -> QuizTaskStats {
    let scores: Vec<i32> = per_user
        .iter()
        .flat_map(|(_, seq)| seq.iter().flatten().copied())
        .collect();
    analytics::sort_by_success(&mut questions);
    QuizTaskStats {
        average_score: analytics::mean_score(&scores),
        attempt_count: per_user.iter().map(|(_, seq)| seq.len() as i64).sum(),
        question_success: questions,
    }
}

async fn visible_tasks(state: &EngineState, course_id: DbId) -> ServiceResult<Vec<Task>> {
    Ok(TaskRepo::list_by_course(&state.pool, course_id, TaskScope::PublishedOnly).await?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn attempt(id: DbId, user_id: DbId, quiz_id: DbId, status: &str, score: i32) -> AttemptRow {
        AttemptRow {
            id,
            user_id,
            quiz_id,
            score,
            completion_status: status.into(),
            started_at: Utc::now(),
            time_taken_secs: None,
        }
    }

    #[test]
    fn attempts_grouped_by_quiz_then_user() {
        let grouped = group_attempts(vec![
            attempt(1, 10, 100, "completed", 40),
            attempt(2, 10, 100, "abandoned", 0),
            attempt(3, 10, 100, "completed", 90),
            attempt(4, 11, 100, "completed", 80),
            attempt(5, 10, 200, "in_progress", 0),
        ]);

        let quiz = &grouped[&100];
        assert_eq!(quiz.len(), 2);
        assert_eq!(quiz[0], (10, vec![Some(40), None, Some(90)]));
        assert_eq!(quiz[1], (11, vec![Some(80)]));
        assert_eq!(grouped[&200], vec![(10, vec![None])]);
    }

    #[test]
    fn quiz_stats_only_average_completed_scores() {
        let per_user = vec![(10, vec![Some(40), None, Some(90)]), (11, vec![Some(80)])];
        let questions = vec![
            QuestionSuccess::new(1, 100, "easy".into(), 4, 4),
            QuestionSuccess::new(2, 100, "hard".into(), 4, 1),
        ];
        let stats = quiz_stats(&per_user, questions);

        assert_eq!(stats.attempt_count, 4);
        assert_eq!(stats.average_score, Some(70.0));
        assert_eq!(stats.question_success[0].question_id, 2);
    }

    #[test]
    fn progress_details_group_by_user_and_task() {
        let row = |user_id, task_id| ProgressDetailRow {
            user_id,
            task_id,
            status: "completed".into(),
            start_date: None,
            completion_date: Some(Utc::now()),
            updated_at: Utc::now(),
        };
        let grouped = group_by_user(vec![row(1, 5), row(1, 6), row(2, 5)]);
        assert_eq!(grouped[&1].len(), 2);
        assert!(grouped[&2].contains_key(&5));
    }
}
