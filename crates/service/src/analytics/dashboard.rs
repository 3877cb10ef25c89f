//! Role dashboards. Each section is computed independently and falls back
//! to an empty value when its query fails.

use std::collections::HashMap;

use learnhub_core::access::{self, Principal};
use learnhub_core::analytics::{ScoreSummary, DASHBOARD_RECENT_LIMIT, REPORT_PASS_SCORE};
use learnhub_core::course::CourseStatus;
use learnhub_core::enrollment::EnrollmentStatus;
use learnhub_core::error::CoreError;
use learnhub_core::progress::{self, round2};
use learnhub_core::reports::{
    ActivityItem, AdminDashboard, AttemptTotals, CourseProgressSummary, CourseStatusCounts,
    EnrollmentCounts, InstructorCourseSummary, InstructorDashboard, InstructorTotals, NextTask,
    RecentCourse, RecentEnrollment, RoleCounts, StudentDashboard,
};
use learnhub_core::types::DbId;
use learnhub_db::models::course::{Course, CourseListParams};
use learnhub_db::repositories::{AnalyticsRepo, CourseRepo, EnrollmentRepo, ProgressRepo};

use super::student::completed_scores;
use super::{ensure_user_exists, section, PLATFORM_REPORT_ID};
use crate::cache::ReportKind;
use crate::error::ServiceResult;
use crate::state::EngineState;

// ---------------------------------------------------------------------------
// Student
// ---------------------------------------------------------------------------

pub async fn student_dashboard(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
) -> ServiceResult<StudentDashboard> {
    access::require_progress_reader(requester, user_id)?;
    ensure_user_exists(state, user_id).await?;
    state
        .cache
        .get_or_compute(ReportKind::StudentDashboard, user_id, || {
            compute_student_dashboard(state, user_id)
        })
        .await
}

async fn compute_student_dashboard(
    state: &EngineState,
    user_id: DbId,
) -> ServiceResult<StudentDashboard> {
    Ok(StudentDashboard {
        user_id,
        enrollment_summary: section("enrollment_summary", enrollment_summary(state, user_id)).await,
        in_progress_courses: section("in_progress_courses", in_progress_courses(state, user_id))
            .await,
        recent_activity: section("recent_activity", recent_activity(state, user_id)).await,
        quiz_overview: section("quiz_overview", quiz_overview(state, user_id)).await,
        next_tasks: section("next_tasks", next_tasks(state, user_id)).await,
        generated_at: chrono::Utc::now(),
    })
}

async fn enrollment_summary(state: &EngineState, user_id: DbId) -> ServiceResult<EnrollmentCounts> {
    Ok(EnrollmentRepo::counts_for_user(&state.pool, user_id).await?.into())
}

async fn in_progress_courses(
    state: &EngineState,
    user_id: DbId,
) -> ServiceResult<Vec<CourseProgressSummary>> {
    let mut courses = Vec::new();
    for enrolment in EnrollmentRepo::list_for_user(&state.pool, user_id).await? {
        if EnrollmentStatus::from_str_value(&enrolment.status)? != EnrollmentStatus::Active {
            continue;
        }
        let counts = ProgressRepo::counts_for_course(&state.pool, user_id, enrolment.course_id).await?;
        courses.push(CourseProgressSummary {
            course_id: enrolment.course_id,
            title: enrolment.course_title,
            completion_percentage: progress::completion_percentage(counts.completed, counts.total),
        });
    }
    Ok(courses)
}

async fn recent_activity(state: &EngineState, user_id: DbId) -> ServiceResult<Vec<ActivityItem>> {
    Ok(AnalyticsRepo::user_activity(&state.pool, user_id)
        .await?
        .into_iter()
        .take(DASHBOARD_RECENT_LIMIT)
        .map(ActivityItem::from)
        .collect())
}

async fn quiz_overview(state: &EngineState, user_id: DbId) -> ServiceResult<ScoreSummary> {
    let attempts = AnalyticsRepo::user_attempts(&state.pool, user_id).await?;
    Ok(ScoreSummary::from_scores(&completed_scores(&attempts), REPORT_PASS_SCORE))
}

async fn next_tasks(state: &EngineState, user_id: DbId) -> ServiceResult<Vec<NextTask>> {
    Ok(AnalyticsRepo::next_tasks(&state.pool, user_id)
        .await?
        .into_iter()
        .map(NextTask::from)
        .collect())
}

// ---------------------------------------------------------------------------
// Instructor
// ---------------------------------------------------------------------------

/// Dashboard over the courses the requester created or teaches.
pub async fn instructor_dashboard(
    state: &EngineState,
    requester: &Principal,
) -> ServiceResult<InstructorDashboard> {
    access::require_instructor_or_admin(requester)?;
    let user_id = requester.user_id;
    state
        .cache
        .get_or_compute(ReportKind::InstructorDashboard, user_id, || {
            compute_instructor_dashboard(state, user_id)
        })
        .await
}

async fn compute_instructor_dashboard(
    state: &EngineState,
    user_id: DbId,
) -> ServiceResult<InstructorDashboard> {
    let courses = section("courses", taught_courses(state, user_id)).await;
    let ids: Vec<DbId> = courses.iter().map(|c| c.id).collect();

    Ok(InstructorDashboard {
        user_id,
        courses: section("course_summaries", course_summaries(state, &courses)).await,
        totals: section("totals", instructor_totals(state, &courses, &ids)).await,
        recent_enrollments: section("recent_enrollments", recent_enrollments(state, &ids)).await,
        generated_at: chrono::Utc::now(),
    })
}

async fn taught_courses(state: &EngineState, user_id: DbId) -> ServiceResult<Vec<Course>> {
    Ok(CourseRepo::list_taught_by(&state.pool, user_id).await?)
}

async fn course_summaries(
    state: &EngineState,
    courses: &[Course],
) -> ServiceResult<Vec<InstructorCourseSummary>> {
    let ids: Vec<DbId> = courses.iter().map(|c| c.id).collect();
    let counts: HashMap<DbId, EnrollmentCounts> =
        AnalyticsRepo::enrollment_counts_by_course(&state.pool, &ids)
            .await?
            .into_iter()
            .map(|row| {
                (
                    row.course_id,
                    EnrollmentCounts {
                        total: row.total,
                        active: row.active,
                        completed: row.completed,
                        dropped: row.dropped,
                    },
                )
            })
            .collect();
    let scores: HashMap<DbId, Option<f64>> = AnalyticsRepo::average_scores_by_course(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|row| (row.course_id, row.average_score.map(round2)))
        .collect();

    Ok(courses
        .iter()
        .map(|course| InstructorCourseSummary {
            course_id: course.id,
            title: course.title.clone(),
            status: course.status.clone(),
            enrollments: counts.get(&course.id).copied().unwrap_or_default(),
            average_quiz_score: scores.get(&course.id).copied().flatten(),
        })
        .collect())
}

async fn instructor_totals(
    state: &EngineState,
    courses: &[Course],
    ids: &[DbId],
) -> ServiceResult<InstructorTotals> {
    let enrollments = AnalyticsRepo::enrollment_counts_by_course(&state.pool, ids)
        .await?
        .iter()
        .map(|row| row.total)
        .sum();
    let published_courses = courses
        .iter()
        .filter(|c| matches!(c.status(), Ok(CourseStatus::Published)))
        .count() as i64;

    Ok(InstructorTotals {
        courses: courses.len() as i64,
        published_courses,
        students: AnalyticsRepo::distinct_students(&state.pool, ids).await?,
        enrollments,
    })
}

async fn recent_enrollments(state: &EngineState, ids: &[DbId]) -> ServiceResult<Vec<RecentEnrollment>> {
    Ok(
        AnalyticsRepo::recent_enrollments(&state.pool, ids, DASHBOARD_RECENT_LIMIT as i64)
            .await?
            .into_iter()
            .map(RecentEnrollment::from)
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

/// Platform-wide counts for administrators.
pub async fn admin_dashboard(
    state: &EngineState,
    requester: &Principal,
) -> ServiceResult<AdminDashboard> {
    if !access::is_admin(requester) {
        return Err(CoreError::Forbidden("Admin dashboard requires the admin role".into()).into());
    }
    state
        .cache
        .get_or_compute(ReportKind::AdminDashboard, PLATFORM_REPORT_ID, || {
            compute_admin_dashboard(state)
        })
        .await
}

async fn compute_admin_dashboard(state: &EngineState) -> ServiceResult<AdminDashboard> {
    Ok(AdminDashboard {
        users_by_role: section("users_by_role", role_counts(state)).await,
        courses_by_status: section("courses_by_status", course_status_counts(state)).await,
        enrollments: section("enrollments", platform_enrollments(state)).await,
        attempts: section("attempts", attempt_totals(state)).await,
        recent_courses: section("recent_courses", recent_courses(state)).await,
        generated_at: chrono::Utc::now(),
    })
}

async fn role_counts(state: &EngineState) -> ServiceResult<RoleCounts> {
    Ok(AnalyticsRepo::role_counts(&state.pool).await?.into())
}

async fn course_status_counts(state: &EngineState) -> ServiceResult<CourseStatusCounts> {
    Ok(AnalyticsRepo::course_status_counts(&state.pool).await?.into())
}

async fn platform_enrollments(state: &EngineState) -> ServiceResult<EnrollmentCounts> {
    Ok(EnrollmentRepo::counts(&state.pool, None).await?.into())
}

async fn attempt_totals(state: &EngineState) -> ServiceResult<AttemptTotals> {
    Ok(AnalyticsRepo::attempt_totals(&state.pool).await?.into())
}

async fn recent_courses(state: &EngineState) -> ServiceResult<Vec<RecentCourse>> {
    let params = CourseListParams {
        limit: Some(DASHBOARD_RECENT_LIMIT as i64),
        ..CourseListParams::default()
    };
    Ok(
        CourseRepo::list(&state.pool, access::CourseScope::All, &params)
            .await?
            .into_iter()
            .map(|c| RecentCourse {
                course_id: c.id,
                title: c.title,
                status: c.status,
                creator_id: c.creator_id,
                created_at: c.created_at,
            })
            .collect(),
    )
}
