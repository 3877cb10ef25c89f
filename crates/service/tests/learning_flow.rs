//! Catalogue, enrolment and progress flows through the engine.

mod common;

use assert_matches::assert_matches;
use learnhub_core::course::CourseStatus;
use learnhub_core::error::CoreError;
use learnhub_core::progress::ProgressStatus;
use learnhub_db::models::course::CourseListParams;
use learnhub_db::models::task::CreateTask;
use learnhub_service::analytics;
use learnhub_service::error::ServiceError;
use learnhub_service::{courses, enrollments, progress, tasks};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// Enrol, complete, report
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_enrol_then_complete_course(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Rust Basics", &["T1", "T2"]).await;

    common::enroll(&state, &learner, course.id).await;
    for task in &course_tasks {
        progress::update_task_status(
            &state,
            &learner,
            learner.user_id,
            task.id,
            ProgressStatus::Completed,
            Some(120),
        )
        .await
        .unwrap();
    }

    let report = analytics::course_student_progress(&state, &teacher, course.id)
        .await
        .unwrap();
    assert_eq!(report.students.len(), 1);
    assert_eq!(report.students[0].user_id, learner.user_id);
    assert_eq!(report.students[0].completion_percentage, 100.0);
    assert_eq!(report.students[0].completed_tasks, 2);
    assert!(
        progress::is_course_completed(&state, &learner, learner.user_id, course.id)
            .await
            .unwrap()
    );

    let mine = enrollments::list_enrolments(&state, &learner).await.unwrap();
    assert_eq!(mine[0].status, "completed", "enrolment follows course completion");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_completion_requires_every_visible_task(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Partial", &["T1", "T2"]).await;
    common::enroll(&state, &learner, course.id).await;

    progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        course_tasks[0].id,
        ProgressStatus::Completed,
        None,
    )
    .await
    .unwrap();

    let view = progress::get_task_progress(&state, &learner, learner.user_id, course.id)
        .await
        .unwrap();
    assert_eq!(view.stats.total, 2);
    assert_eq!(view.stats.completed, 1);
    assert_eq!(view.stats.completion_percentage, 50.0);
    assert!(!view.is_completed);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_completion_date_survives_later_updates(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Sticky", &["T1"]).await;
    common::enroll(&state, &learner, course.id).await;
    let task_id = course_tasks[0].id;

    let done = progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        task_id,
        ProgressStatus::Completed,
        None,
    )
    .await
    .unwrap();
    let first_completion = done.completion_date.expect("completion date is set");

    let again = progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        task_id,
        ProgressStatus::Completed,
        Some(30),
    )
    .await
    .unwrap();
    assert_eq!(again.completion_date, Some(first_completion));

    let err = progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        task_id,
        ProgressStatus::NotStarted,
        None,
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), "conflict");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_requires_enrolment(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let outsider = common::student(&state, "outsider").await;
    let (_, course_tasks) = common::published_course(&state, &teacher, "Closed", &["T1"]).await;

    let err = progress::update_task_status(
        &state,
        &outsider,
        outsider.user_id,
        course_tasks[0].id,
        ProgressStatus::InProgress,
        None,
    )
    .await
    .unwrap_err();
    assert_matches!(err, ServiceError::Core(CoreError::Forbidden(_)));
}

// ---------------------------------------------------------------------------
// Enrolment lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unenrol_then_reenrol_reuses_row(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, _) = common::published_course(&state, &teacher, "Again", &["T1"]).await;

    let first = enrollments::enroll(&state, &learner, learner.user_id, course.id, None)
        .await
        .unwrap();
    enrollments::unenroll(&state, &learner, learner.user_id, course.id)
        .await
        .unwrap();
    let second = enrollments::enroll(&state, &learner, learner.user_id, course.id, None)
        .await
        .unwrap();

    assert_eq!(second.id, first.id, "no new enrolment row is created");
    assert_eq!(second.status, "active");

    let rows: (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM course_enrollments WHERE user_id = $1 AND course_id = $2",
    )
    .bind(learner.user_id)
    .bind(course.id)
    .fetch_one(&state.pool)
    .await
    .unwrap();
    assert_eq!(rows.0, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_double_enrol_is_conflict(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, _) = common::published_course(&state, &teacher, "Once", &["T1"]).await;

    common::enroll(&state, &learner, course.id).await;
    let err = enrollments::enroll(&state, &learner, learner.user_id, course.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.conflict_reason(), Some("already_enrolled"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unenrol_without_enrolment_is_noop(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, _) = common::published_course(&state, &teacher, "Noop", &["T1"]).await;

    enrollments::unenroll(&state, &learner, learner.user_id, course.id)
        .await
        .unwrap();
    assert!(enrollments::list_enrolments(&state, &learner).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_draft_course_rejects_enrolment(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, _) = common::draft_course(&state, &teacher, "Not yet", &["T1"]).await;

    let err = enrollments::enroll(&state, &learner, learner.user_id, course.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_task_with_progress_is_blocked(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Guarded", &["T1"]).await;
    common::enroll(&state, &learner, course.id).await;
    let task_id = course_tasks[0].id;

    progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        task_id,
        ProgressStatus::InProgress,
        None,
    )
    .await
    .unwrap();

    let err = tasks::delete_task(&state, &teacher, task_id).await.unwrap_err();
    let payload = err.payload();
    assert_eq!(payload.code, "conflict");
    let details = payload.details.expect("conflict carries details");
    assert_eq!(details["reason"], "task_has_progress");
    assert_eq!(details["students_affected"], 1);
    assert_eq!(details["in_progress"], 1);
    assert_eq!(details["completed"], 0);
    assert_eq!(details["can_delete"], false);

    let visible = tasks::list_tasks(&state, &learner, course.id).await.unwrap();
    assert_eq!(visible.len(), 1, "the task stays visible");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_and_restore_untouched_task(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Tidy", &["Keep", "Drop"]).await;
    let dropped = course_tasks[1].id;

    tasks::delete_task(&state, &teacher, dropped).await.unwrap();
    let learner = common::student(&state, "learner").await;
    common::enroll(&state, &learner, course.id).await;
    let visible = tasks::list_tasks(&state, &learner, course.id).await.unwrap();
    assert_eq!(visible.len(), 1);

    let all = tasks::list_tasks(&state, &teacher, course.id).await.unwrap();
    assert_eq!(all.len(), 2, "the creator still sees soft-deleted tasks");

    let restored = tasks::restore_task(&state, &teacher, dropped).await.unwrap();
    assert!(!restored.is_deleted);
    let err = tasks::restore_task(&state, &teacher, dropped).await.unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_progress_counts_report_started_students(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (course, course_tasks) =
        common::published_course(&state, &teacher, "Counted", &["T1", "T2"]).await;
    common::enroll(&state, &learner, course.id).await;
    progress::update_task_status(
        &state,
        &learner,
        learner.user_id,
        course_tasks[0].id,
        ProgressStatus::Completed,
        None,
    )
    .await
    .unwrap();

    let ids: Vec<i64> = course_tasks.iter().map(|t| t.id).collect();
    let counts = tasks::progress_counts(&state, &teacher, &ids).await.unwrap();
    let first = counts.iter().find(|c| c.task_id == ids[0]).unwrap();
    let second = counts.iter().find(|c| c.task_id == ids[1]).unwrap();
    assert_eq!(first.completed, 1);
    assert!(!first.can_delete());
    assert!(second.can_delete());

    let err = tasks::progress_counts(&state, &learner, &ids).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_tasks_append_in_order(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let (course, course_tasks) =
        common::draft_course(&state, &teacher, "Ordered", &["A", "B"]).await;
    assert!(course_tasks[0].sort_order < course_tasks[1].sort_order);

    let explicit = tasks::create_task(
        &state,
        &teacher,
        course.id,
        &CreateTask {
            title: "Negative".into(),
            description: None,
            task_type: None,
            sort_order: Some(-1),
            is_published: None,
        },
    )
    .await
    .unwrap_err();
    assert_eq!(explicit.code(), "validation_error");
}

// ---------------------------------------------------------------------------
// Catalogue visibility and lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_students_only_list_published_courses(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let learner = common::student(&state, "learner").await;
    let (draft, _) = common::draft_course(&state, &teacher, "Hidden", &["T1"]).await;
    let (open, _) = common::published_course(&state, &teacher, "Open", &["T1"]).await;

    let listed = courses::list_courses(&state, &learner, &CourseListParams::default())
        .await
        .unwrap();
    assert!(listed.iter().all(|c| c.status == "published"));
    assert!(listed.iter().any(|c| c.id == open.id));

    let err = courses::get_course(&state, &learner, draft.id).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let own = courses::list_courses(&state, &teacher, &CourseListParams::default())
        .await
        .unwrap();
    assert_eq!(own.len(), 2, "creators see their drafts");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_publish_requires_a_task(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let (course, _) = common::draft_course(&state, &teacher, "Empty", &[]).await;

    let err = courses::transition_status(&state, &teacher, course.id, CourseStatus::Published, "")
        .await
        .unwrap_err();
    assert_eq!(err.conflict_reason(), Some("publish_requirements_unmet"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_invalid_transition_is_conflict(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let (course, _) = common::published_course(&state, &teacher, "Lifecycle", &["T1"]).await;

    courses::transition_status(&state, &teacher, course.id, CourseStatus::Archived, "Done")
        .await
        .unwrap();
    let err = courses::transition_status(&state, &teacher, course.id, CourseStatus::Draft, "")
        .await
        .unwrap_err();
    assert_eq!(err.conflict_reason(), Some("invalid_status_transition"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_creator_edits_course(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;
    let other = common::instructor(&state, "other").await;
    let admin = common::admin(&state, "root").await;
    let (course, _) = common::draft_course(&state, &teacher, "Mine", &["T1"]).await;

    let edit = learnhub_db::models::course::UpdateCourse {
        description: Some("Changed".into()),
        ..Default::default()
    };
    let err = courses::update_course(&state, &other, course.id, &edit).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let updated = courses::update_course(&state, &admin, course.id, &edit).await.unwrap();
    assert_eq!(updated.description, "Changed");
    assert_eq!(updated.version, 1, "draft edits do not bump the version");
}
