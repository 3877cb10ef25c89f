//! Report and dashboard shapes produced by the analytics aggregator.
//!
//! All types round-trip through JSON because the report cache stores them
//! as `serde_json::Value`. Dashboard sections derive `Default` so a failed
//! section can be replaced with an empty one.

use serde::{Deserialize, Serialize};

use crate::analytics::{CompletionBuckets, Difficulty, QuestionSuccess, ScoreSummary};
use crate::progress::ProgressStats;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Shared pieces
// ---------------------------------------------------------------------------

/// Enrolment counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentCounts {
    pub total: i64,
    pub active: i64,
    pub completed: i64,
    pub dropped: i64,
}

impl EnrollmentCounts {
    /// Share of enrolments that reached `completed`.
    pub fn completion_percentage(&self) -> f64 {
        crate::analytics::rate(self.completed, self.total)
    }
}

/// One line of recent task activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityItem {
    pub course_id: DbId,
    pub task_id: DbId,
    pub task_title: String,
    pub status: String,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// (a) Course analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTypeDistribution {
    pub learning: i64,
    pub quiz: i64,
    pub total: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseAnalytics {
    pub course_id: DbId,
    pub title: String,
    pub status: String,
    pub enrollments: EnrollmentCounts,
    pub enrollment_completion_percentage: f64,
    pub completion_distribution: CompletionBuckets,
    pub average_quiz_score: Option<f64>,
    pub task_types: TaskTypeDistribution,
    pub most_failed_questions: Vec<QuestionSuccess>,
    pub generated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// (b) Course student progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskStatusRow {
    pub task_id: DbId,
    pub title: String,
    pub task_type: String,
    pub status: String,
    pub completion_date: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentCourseProgress {
    pub user_id: DbId,
    pub username: String,
    pub enrollment_status: String,
    pub completion_percentage: f64,
    pub completed_tasks: i64,
    pub total_tasks: i64,
    pub tasks: Vec<TaskStatusRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseStudentProgress {
    pub course_id: DbId,
    pub total_tasks: i64,
    pub students: Vec<StudentCourseProgress>,
    pub generated_at: Timestamp,
}

impl CourseStudentProgress {
    /// Restrict the report to one student's row.
    pub fn only_user(mut self, user_id: DbId) -> Self {
        self.students.retain(|s| s.user_id == user_id);
        self
    }
}

/// Sort rows by completion percentage descending, then user id.
pub fn sort_students_by_completion(students: &mut [StudentCourseProgress]) {
    students.sort_by(|a, b| {
        b.completion_percentage
            .total_cmp(&a.completion_percentage)
            .then(a.user_id.cmp(&b.user_id))
    });
}

// ---------------------------------------------------------------------------
// (c) Course task analytics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizTaskStats {
    pub average_score: Option<f64>,
    pub attempt_count: i64,
    pub question_success: Vec<QuestionSuccess>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAnalytics {
    pub task_id: DbId,
    pub title: String,
    pub task_type: String,
    pub sort_order: i32,
    pub not_started: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub completion_rate: f64,
    pub average_completion_hours: Option<f64>,
    pub difficulty: Difficulty,
    pub average_attempts_to_complete: Option<f64>,
    pub quiz: Option<QuizTaskStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseTaskAnalytics {
    pub course_id: DbId,
    pub enrolled_students: i64,
    pub tasks: Vec<TaskAnalytics>,
    pub generated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// (d) Student progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentCourseBlock {
    pub course_id: DbId,
    pub title: String,
    pub enrollment_status: String,
    pub enrollment_date: Timestamp,
    pub progress: ProgressStats,
    pub quiz_average: Option<f64>,
    pub quiz_attempts: i64,
    pub recent_activity: Vec<ActivityItem>,
    pub last_access: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentProgressReport {
    pub user_id: DbId,
    pub enrollments: EnrollmentCounts,
    pub overall_completion_percentage: f64,
    pub courses: Vec<StudentCourseBlock>,
    pub generated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// (e) Student quiz performance
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseQuizBreakdown {
    pub course_id: DbId,
    pub title: String,
    pub quizzes: i64,
    pub attempts: i64,
    pub average_score: Option<f64>,
    pub highest_score: Option<i32>,
    pub lowest_score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentAttempt {
    pub attempt_id: DbId,
    pub quiz_id: DbId,
    pub quiz_title: String,
    pub course_id: DbId,
    pub status: String,
    pub score: i32,
    pub correct: i64,
    pub total: i64,
    pub time_spent_secs: Option<i32>,
    pub started_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub responses: i64,
    pub correct: i64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentQuizPerformance {
    pub user_id: DbId,
    pub overall: ScoreSummary,
    pub courses: Vec<CourseQuizBreakdown>,
    pub recent_attempts: Vec<RecentAttempt>,
    pub categories: Vec<CategoryBreakdown>,
    pub generated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Dashboards
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseProgressSummary {
    pub course_id: DbId,
    pub title: String,
    pub completion_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NextTask {
    pub course_id: DbId,
    pub task_id: DbId,
    pub title: String,
    pub task_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentDashboard {
    pub user_id: DbId,
    pub enrollment_summary: EnrollmentCounts,
    pub in_progress_courses: Vec<CourseProgressSummary>,
    pub recent_activity: Vec<ActivityItem>,
    pub quiz_overview: ScoreSummary,
    pub next_tasks: Vec<NextTask>,
    pub generated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorCourseSummary {
    pub course_id: DbId,
    pub title: String,
    pub status: String,
    pub enrollments: EnrollmentCounts,
    pub average_quiz_score: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructorTotals {
    pub courses: i64,
    pub published_courses: i64,
    pub students: i64,
    pub enrollments: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentEnrollment {
    pub course_id: DbId,
    pub course_title: String,
    pub user_id: DbId,
    pub username: String,
    pub enrollment_date: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructorDashboard {
    pub user_id: DbId,
    pub courses: Vec<InstructorCourseSummary>,
    pub totals: InstructorTotals,
    pub recent_enrollments: Vec<RecentEnrollment>,
    pub generated_at: Timestamp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCounts {
    pub student: i64,
    pub instructor: i64,
    pub admin: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseStatusCounts {
    pub draft: i64,
    pub published: i64,
    pub archived: i64,
    pub deprecated: i64,
    pub total: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttemptTotals {
    pub total: i64,
    pub completed: i64,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentCourse {
    pub course_id: DbId,
    pub title: String,
    pub status: String,
    pub creator_id: DbId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminDashboard {
    pub users_by_role: RoleCounts,
    pub courses_by_status: CourseStatusCounts,
    pub enrollments: EnrollmentCounts,
    pub attempts: AttemptTotals,
    pub recent_courses: Vec<RecentCourse>,
    pub generated_at: Timestamp,
}
