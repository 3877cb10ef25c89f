//! Shared fixtures for engine integration tests.
//!
//! Each test gets a fresh database from `#[sqlx::test]`; these helpers build
//! the engine state around it and seed users, courses and tasks through the
//! same operations production code uses.

#![allow(dead_code)]

use std::time::Duration;

use learnhub_core::access::Principal;
use learnhub_core::course::CourseStatus;
use learnhub_core::roles::Role;
use learnhub_core::types::DbId;
use learnhub_db::models::course::{Course, CreateCourse};
use learnhub_db::models::task::{CreateTask, Task};
use learnhub_db::models::user::CreateUser;
use learnhub_db::repositories::UserRepo;
use learnhub_service::auth::jwt::JwtConfig;
use learnhub_service::auth::password::hash_password;
use learnhub_service::config::EngineConfig;
use learnhub_service::state::EngineState;
use learnhub_service::telemetry::LogFormat;
use learnhub_service::{courses, enrollments, tasks};
use sqlx::PgPool;

pub const TEST_PASSWORD: &str = "correct-horse-battery";

/// Engine configuration with safe defaults and no environment lookups.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        database_url: String::new(),
        db_max_connections: 5,
        jwt: JwtConfig {
            secret: "test-secret-for-integration-tests".to_string(),
            access_token_expiry_mins: 15,
        },
        password_min_length: 8,
        course_report_ttl: Duration::from_secs(3600),
        student_report_ttl: Duration::from_secs(900),
        log_format: LogFormat::Text,
    }
}

pub fn engine(pool: PgPool) -> EngineState {
    EngineState::new(pool, test_config())
}

/// Insert a user directly and return the principal acting as them.
pub async fn user(state: &EngineState, username: &str, role: Role) -> Principal {
    let hash = hash_password(TEST_PASSWORD).expect("hashing should succeed");
    let row = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password_hash: hash,
            first_name: None,
            last_name: None,
            role: role.as_str().to_string(),
            is_staff: false,
        },
    )
    .await
    .expect("user creation should succeed");
    Principal::new(row.id, role, false)
}

pub async fn student(state: &EngineState, username: &str) -> Principal {
    user(state, username, Role::Student).await
}

pub async fn instructor(state: &EngineState, username: &str) -> Principal {
    user(state, username, Role::Instructor).await
}

pub async fn admin(state: &EngineState, username: &str) -> Principal {
    user(state, username, Role::Admin).await
}

pub fn course_input(title: &str) -> CreateCourse {
    CreateCourse {
        title: title.to_string(),
        description: Some("A course used in tests".to_string()),
        learning_objectives: Some("Finish every task".to_string()),
        prerequisites: None,
        visibility: None,
    }
}

pub fn task_input(title: &str, task_type: &str) -> CreateTask {
    CreateTask {
        title: title.to_string(),
        description: None,
        task_type: Some(task_type.to_string()),
        sort_order: None,
        is_published: Some(true),
    }
}

/// A draft course with one published learning task per title.
pub async fn draft_course(
    state: &EngineState,
    creator: &Principal,
    title: &str,
    task_titles: &[&str],
) -> (Course, Vec<Task>) {
    let course = courses::create_course(state, creator, &course_input(title))
        .await
        .expect("course creation should succeed");
    let mut created = Vec::new();
    for task_title in task_titles {
        let task = tasks::create_task(state, creator, course.id, &task_input(task_title, "learning"))
            .await
            .expect("task creation should succeed");
        created.push(task);
    }
    (course, created)
}

/// Like [`draft_course`], then published.
pub async fn published_course(
    state: &EngineState,
    creator: &Principal,
    title: &str,
    task_titles: &[&str],
) -> (Course, Vec<Task>) {
    let (course, created) = draft_course(state, creator, title, task_titles).await;
    let course = publish(state, creator, course.id).await;
    (course, created)
}

pub async fn publish(state: &EngineState, creator: &Principal, course_id: DbId) -> Course {
    courses::transition_status(state, creator, course_id, CourseStatus::Published, "Ready")
        .await
        .expect("publishing should succeed")
}

pub async fn enroll(state: &EngineState, student: &Principal, course_id: DbId) {
    enrollments::enroll(state, student, student.user_id, course_id, None)
        .await
        .expect("enrolment should succeed");
}
