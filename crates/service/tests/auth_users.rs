mod common;

use assert_matches::assert_matches;
use learnhub_core::roles::Role;
use learnhub_service::auth::{self, jwt};
use learnhub_service::users::{self, RegisterUser};
use sqlx::PgPool;

fn registration(username: &str, email: &str, password: &str) -> RegisterUser {
    RegisterUser {
        username: username.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        first_name: Some("Ada".to_string()),
        last_name: None,
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_register_creates_student(pool: PgPool) {
    let state = common::engine(pool);

    let user = users::register(&state, &registration("ada", "ada@example.com", common::TEST_PASSWORD))
        .await
        .unwrap();
    assert_eq!(user.role, "student");
    assert!(user.is_active);
    assert_eq!(user.first_name, "Ada");
    assert_eq!(user.last_name, "");

    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password_hash").is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_register_rejects_bad_input(pool: PgPool) {
    let state = common::engine(pool);

    let short = users::register(&state, &registration("ada", "ada@example.com", "short"))
        .await
        .unwrap_err();
    assert_eq!(short.code(), "validation_error");

    let email = users::register(&state, &registration("ada", "not-an-email", common::TEST_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(email.code(), "validation_error");

    let name = users::register(&state, &registration("a d a", "ada@example.com", common::TEST_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(name.code(), "validation_error");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_accounts_are_rejected(pool: PgPool) {
    let state = common::engine(pool);
    users::register(&state, &registration("ada", "ada@example.com", common::TEST_PASSWORD))
        .await
        .unwrap();

    let same_email = users::register(&state, &registration("ada2", "ADA@example.com", common::TEST_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(same_email.code(), "validation_error");

    let same_name = users::register(&state, &registration("ada", "other@example.com", common::TEST_PASSWORD))
        .await
        .unwrap_err();
    assert_eq!(same_name.code(), "conflict");
    assert_eq!(same_name.conflict_reason(), Some("duplicate"));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_admin_creates_staff_accounts(pool: PgPool) {
    let state = common::engine(pool);
    let admin = common::admin(&state, "root").await;
    let teacher = common::instructor(&state, "teacher").await;

    let input = registration("newbie", "newbie@example.com", common::TEST_PASSWORD);
    let err = users::create_user(&state, &teacher, &input, Role::Instructor, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let created = users::create_user(&state, &admin, &input, Role::Instructor, true)
        .await
        .unwrap();
    assert_eq!(created.role, "instructor");
    assert!(created.is_staff);
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_authenticate_success(pool: PgPool) {
    let state = common::engine(pool);
    let teacher = common::instructor(&state, "teacher").await;

    let auth = auth::authenticate(&state, "teacher", common::TEST_PASSWORD)
        .await
        .unwrap();
    assert_eq!(auth.principal, teacher);
    assert_eq!(auth.user.username, "teacher");

    let stored = users::get_user(&state, &teacher, teacher.user_id).await.unwrap();
    assert!(stored.last_login_at.is_some());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_wrong_password_and_unknown_user_look_the_same(pool: PgPool) {
    let state = common::engine(pool);
    common::student(&state, "sam").await;

    let wrong = auth::authenticate(&state, "sam", "not-the-password")
        .await
        .unwrap_err();
    let unknown = auth::authenticate(&state, "nobody", common::TEST_PASSWORD)
        .await
        .unwrap_err();

    assert_eq!(wrong.code(), "unauthenticated");
    assert_eq!(wrong.payload(), unknown.payload());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_deactivated_user_is_rejected(pool: PgPool) {
    let state = common::engine(pool);
    let admin = common::admin(&state, "root").await;
    let sam = common::student(&state, "sam").await;

    let token = jwt::generate_access_token(sam.user_id, "student", &state.config.jwt).unwrap();
    users::set_user_active(&state, &admin, sam.user_id, false)
        .await
        .unwrap();

    let login = auth::authenticate(&state, "sam", common::TEST_PASSWORD)
        .await
        .unwrap_err();
    assert_eq!(login.code(), "unauthenticated");
    let bearer = auth::validate_token(&state, &token).await.unwrap_err();
    assert_eq!(bearer.code(), "unauthenticated");

    let err = users::set_user_active(&state, &admin, admin.user_id, false)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "validation_error");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_token_resolves_to_stored_role(pool: PgPool) {
    let state = common::engine(pool);
    let sam = common::student(&state, "sam").await;

    // The claim says admin; the stored role wins.
    let token = jwt::generate_access_token(sam.user_id, "admin", &state.config.jwt).unwrap();
    let auth = auth::validate_token(&state, &token).await.unwrap();
    assert_eq!(auth.principal.user_id, sam.user_id);
    assert_eq!(auth.principal.role, Role::Student);

    let garbage = auth::validate_token(&state, "not.a.token").await;
    assert_matches!(garbage, Err(e) if e.code() == "unauthenticated");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_students_only_see_themselves(pool: PgPool) {
    let state = common::engine(pool);
    let sam = common::student(&state, "sam").await;
    let kim = common::student(&state, "kim").await;
    let teacher = common::instructor(&state, "teacher").await;

    let err = users::get_user(&state, &sam, kim.user_id).await.unwrap_err();
    assert_eq!(err.code(), "forbidden");

    let own = users::get_user(&state, &sam, sam.user_id).await.unwrap();
    assert_eq!(own.username, "sam");
    let seen = users::get_user(&state, &teacher, kim.user_id).await.unwrap();
    assert_eq!(seen.username, "kim");
}
