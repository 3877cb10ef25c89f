//! Authentication hand-off.
//!
//! - [`password`] -- Argon2id password hashing and verification.
//! - [`jwt`] -- HS256 access-token encoding and validation.
//!
//! [`authenticate`] and [`validate_token`] resolve credentials to a stored,
//! active user and the [`Principal`] every other operation runs as.

pub mod jwt;
pub mod password;

use learnhub_core::access::Principal;
use learnhub_core::error::CoreError;
use learnhub_core::roles::Role;
use learnhub_db::models::user::{User, UserResponse};
use learnhub_db::repositories::UserRepo;

use crate::error::ServiceResult;
use crate::state::EngineState;

/// A user resolved from credentials.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user: UserResponse,
    pub principal: Principal,
}

/// Build the principal for a stored user.
pub fn principal_for(user: &User) -> Result<Principal, CoreError> {
    let role = Role::from_str_value(&user.role).map_err(CoreError::Internal)?;
    Ok(Principal::new(user.id, role, user.is_staff))
}

fn resolve(user: User) -> ServiceResult<AuthenticatedUser> {
    if !user.is_active {
        return Err(CoreError::Unauthorized("Account is deactivated".into()).into());
    }
    let principal = principal_for(&user)?;
    Ok(AuthenticatedUser {
        user: user.into(),
        principal,
    })
}

/// Verify a username/password pair.
///
/// Unknown usernames and wrong passwords produce the same error.
pub async fn authenticate(
    state: &EngineState,
    username: &str,
    password: &str,
) -> ServiceResult<AuthenticatedUser> {
    let invalid = || CoreError::Unauthorized("Invalid username or password".into());

    let user = UserRepo::find_by_username(&state.pool, username)
        .await?
        .ok_or_else(invalid)?;

    let verified = password::verify_password(password, &user.password_hash).map_err(|e| {
        tracing::error!(user_id = user.id, error = %e, "Stored password hash is unreadable");
        CoreError::Internal("Password verification failed".into())
    })?;
    if !verified {
        tracing::debug!(user_id = user.id, "Password mismatch");
        return Err(invalid().into());
    }

    let authenticated = resolve(user)?;
    UserRepo::record_login(&state.pool, authenticated.user.id).await?;
    tracing::info!(user_id = authenticated.user.id, "User authenticated");
    Ok(authenticated)
}

/// Resolve a bearer token to its user. The stored role wins over the claim.
pub async fn validate_token(state: &EngineState, token: &str) -> ServiceResult<AuthenticatedUser> {
    let claims = jwt::validate_token(token, &state.config.jwt)
        .map_err(|_| CoreError::Unauthorized("Invalid or expired token".into()))?;

    let user = UserRepo::find_by_id(&state.pool, claims.sub)
        .await?
        .ok_or_else(|| CoreError::Unauthorized("Token subject no longer exists".into()))?;

    resolve(user)
}
