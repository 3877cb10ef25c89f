//! Registration and account management.

use learnhub_core::access::{self, Principal};
use learnhub_core::error::CoreError;
use learnhub_core::roles::Role;
use learnhub_core::types::DbId;
use learnhub_db::models::user::{CreateUser, UpdateProfile, UserListParams, UserResponse};
use learnhub_db::repositories::UserRepo;
use serde::Deserialize;
use validator::{Validate, ValidateEmail, ValidationError};

use crate::auth::password::{hash_password, validate_password_strength};
use crate::error::ServiceResult;
use crate::state::EngineState;

/// Self-service registration input. Registered accounts are always students.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(
        length(min = 3, max = 150, message = "Username must be 3-150 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

/// Letters, digits and `@ . + - _` only.
fn validate_username(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset")
            .with_message("Username may contain only letters, digits and @/./+/-/_".into()))
    }
}

fn check_input<T: Validate>(input: &T) -> Result<(), CoreError> {
    input
        .validate()
        .map_err(|errors| CoreError::Validation(errors.to_string()))
}

async fn insert_user(
    state: &EngineState,
    input: &RegisterUser,
    role: Role,
    is_staff: bool,
) -> ServiceResult<UserResponse> {
    check_input(input)?;
    validate_password_strength(&input.password, state.config.password_min_length)
        .map_err(CoreError::Validation)?;

    if UserRepo::find_by_email(&state.pool, &input.email).await?.is_some() {
        return Err(CoreError::Validation("Email address is already registered".into()).into());
    }

    let password_hash = hash_password(&input.password).map_err(|e| {
        tracing::error!(error = %e, "Password hashing failed");
        CoreError::Internal("Password hashing failed".into())
    })?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: input.username.clone(),
            email: input.email.clone(),
            password_hash,
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            role: role.as_str().to_string(),
            is_staff,
        },
    )
    .await?;

    tracing::info!(user_id = user.id, role = %user.role, "User registered");
    Ok(user.into())
}

/// Create a student account.
pub async fn register(state: &EngineState, input: &RegisterUser) -> ServiceResult<UserResponse> {
    insert_user(state, input, Role::Student, false).await
}

/// Create an account with an explicit role. Admin only.
pub async fn create_user(
    state: &EngineState,
    requester: &Principal,
    input: &RegisterUser,
    role: Role,
    is_staff: bool,
) -> ServiceResult<UserResponse> {
    access::require_admin(requester)?;
    insert_user(state, input, role, is_staff).await
}

pub async fn list_users(
    state: &EngineState,
    requester: &Principal,
    params: &UserListParams,
) -> ServiceResult<Vec<UserResponse>> {
    access::require_admin(requester)?;
    let users = UserRepo::list(&state.pool, params).await?;
    tracing::debug!(count = users.len(), "Listed users");
    Ok(users.into_iter().map(UserResponse::from).collect())
}

/// Users may read themselves; instructors and admins may read anyone.
pub async fn get_user(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
) -> ServiceResult<UserResponse> {
    if requester.user_id != user_id && !requester.is_instructor_or_admin() {
        return Err(CoreError::Forbidden("Cannot view another user's account".into()).into());
    }
    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user_id,
        })?;
    Ok(user.into())
}

/// Users edit their own profile; admins may edit anyone's.
pub async fn update_profile(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    input: &UpdateProfile,
) -> ServiceResult<UserResponse> {
    if requester.user_id != user_id && !requester.is_admin() {
        return Err(CoreError::Forbidden("Cannot edit another user's profile".into()).into());
    }
    if let Some(email) = &input.email {
        if !email.validate_email() {
            return Err(CoreError::Validation("Invalid email address".into()).into());
        }
        if let Some(existing) = UserRepo::find_by_email(&state.pool, email).await? {
            if existing.id != user_id {
                return Err(
                    CoreError::Validation("Email address is already registered".into()).into(),
                );
            }
        }
    }

    let user = UserRepo::update_profile(&state.pool, user_id, input)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "User",
            id: user_id,
        })?;
    tracing::info!(user_id, "Profile updated");
    Ok(user.into())
}

/// Activate or deactivate an account. Admin only; admins cannot lock themselves out.
pub async fn set_user_active(
    state: &EngineState,
    requester: &Principal,
    user_id: DbId,
    is_active: bool,
) -> ServiceResult<()> {
    access::require_admin(requester)?;
    if requester.user_id == user_id && !is_active {
        return Err(CoreError::Validation("Cannot deactivate your own account".into()).into());
    }
    if !UserRepo::set_active(&state.pool, user_id, is_active).await? {
        return Err(CoreError::NotFound {
            entity: "User",
            id: user_id,
        }
        .into());
    }
    tracing::info!(user_id, is_active, "Account state changed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(username: &str, email: &str) -> RegisterUser {
        RegisterUser {
            username: username.into(),
            email: email.into(),
            password: "long-enough-password".into(),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn well_formed_registration_passes() {
        assert!(check_input(&input("ada.l", "ada@example.com")).is_ok());
    }

    #[test]
    fn short_username_is_rejected() {
        let err = check_input(&input("ab", "ab@example.com")).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn username_charset_is_enforced() {
        assert!(check_input(&input("has space", "x@example.com")).is_err());
        assert!(check_input(&input("semi;colon", "x@example.com")).is_err());
        assert!(check_input(&input("ok+tag_1", "x@example.com")).is_ok());
    }

    #[test]
    fn bad_email_is_rejected() {
        assert!(check_input(&input("grace", "not-an-email")).is_err());
    }
}
