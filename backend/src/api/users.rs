//! User and account API endpoints.

use axum::extract::{Path, State};
use chrono::SecondsFormat;

use super::{created, error, listing, success, ApiResult, JsonBody};
use crate::auth::{password, token, AdminUser, AuthUser};
use crate::errors::AppError;
use crate::models::{
    AuthPayload, ChangeRoleRequest, LoginRequest, RegisterRequest, Role, UpdateProfileRequest,
    User,
};
use crate::AppState;

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

fn normalize_username(username: &str) -> Result<String, AppError> {
    let username = username.trim();
    if username.chars().count() < MIN_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    Ok(username.to_string())
}

/// Lowercase an email and check it has the shape `local@domain.tld`.
fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && !email.contains(char::is_whitespace)
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
                && !domain.ends_with('.')
        }
        None => false,
    };
    if valid {
        Ok(email)
    } else {
        Err(AppError::Validation(
            "Please provide a valid email".to_string(),
        ))
    }
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn issue_payload(state: &AppState, user: User) -> Result<AuthPayload, AppError> {
    let issued = token::issue_token(
        &state.config.jwt_secret,
        &user.id,
        user.role,
        state.config.token_ttl_days,
    )?;
    Ok(AuthPayload {
        token: issued.token,
        expires_at: issued
            .expires_at
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        user,
    })
}

async fn register_user(state: &AppState, mut request: RegisterRequest) -> Result<AuthPayload, AppError> {
    request.username = normalize_username(&request.username)?;
    request.email = normalize_email(&request.email)?;
    check_password(&request.password)?;

    let hash = password::hash_password(request.password.clone()).await?;
    let user = state.repo.create_user(&request, &hash).await?;
    issue_payload(state, user)
}

async fn login_user(state: &AppState, request: LoginRequest) -> Result<AuthPayload, AppError> {
    let invalid = || AppError::Unauthorized("Invalid credentials".to_string());

    let email = request.email.trim().to_lowercase();
    let credentials = state
        .repo
        .find_credentials_by_email(&email)
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(request.password, credentials.password_hash).await? {
        tracing::debug!(user_id = %credentials.id, "Rejected login");
        return Err(invalid());
    }

    state.repo.record_login(&credentials.id).await?;
    let user = state
        .repo
        .get_user(&credentials.id)
        .await?
        .ok_or_else(invalid)?;
    issue_payload(state, user)
}

/// POST /api/users/register - Create an account and sign a credential.
pub async fn register(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<RegisterRequest>,
) -> ApiResult<AuthPayload> {
    let expose = state.config.is_development();

    match register_user(&state, request).await {
        Ok(payload) => created(payload),
        Err(e) => error(e, expose),
    }
}

/// POST /api/users/login - Exchange email and password for a credential.
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<AuthPayload> {
    let expose = state.config.is_development();

    match login_user(&state, request).await {
        Ok(payload) => success(payload),
        Err(e) => error(e, expose),
    }
}

/// GET /api/users/profile - The caller's own profile.
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<User> {
    let expose = state.config.is_development();

    match state.repo.get_user(&identity.id).await {
        Ok(Some(user)) => success(user),
        Ok(None) => error(AppError::NotFound("User not found".to_string()), expose),
        Err(e) => error(e, expose),
    }
}

async fn apply_profile_update(
    state: &AppState,
    user_id: &str,
    mut request: UpdateProfileRequest,
) -> Result<User, AppError> {
    if let Some(username) = &request.username {
        request.username = Some(normalize_username(username)?);
    }
    if let Some(email) = &request.email {
        request.email = Some(normalize_email(email)?);
    }

    let hash = match request.password.take() {
        Some(new_password) => {
            check_password(&new_password)?;
            Some(password::hash_password(new_password).await?)
        }
        None => None,
    };

    state
        .repo
        .update_profile(user_id, &request, hash.as_deref())
        .await
}

/// PUT /api/users/profile - Update the caller's own profile.
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    JsonBody(request): JsonBody<UpdateProfileRequest>,
) -> ApiResult<User> {
    let expose = state.config.is_development();

    match apply_profile_update(&state, &identity.id, request).await {
        Ok(user) => success(user),
        Err(e) => error(e, expose),
    }
}

/// GET /api/users - List every user (admin only).
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
) -> ApiResult<Vec<User>> {
    let expose = state.config.is_development();

    match state.repo.list_users().await {
        Ok(users) => listing(users),
        Err(e) => error(e, expose),
    }
}

/// GET /api/users/:id - Public profile of any user.
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<User> {
    let expose = state.config.is_development();

    match state.repo.get_user(&id).await {
        Ok(Some(user)) => success(user),
        Ok(None) => error(AppError::NotFound("User not found".to_string()), expose),
        Err(e) => error(e, expose),
    }
}

/// PUT /api/users/:id/role - Change a user's role (admin only).
pub async fn change_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    JsonBody(request): JsonBody<ChangeRoleRequest>,
) -> ApiResult<User> {
    let expose = state.config.is_development();

    let Some(role) = Role::from_str(request.role.trim()) else {
        return error(AppError::Validation("Invalid role".to_string()), expose);
    };

    match state.repo.set_role(&id, role).await {
        Ok(user) => {
            tracing::info!(admin_id = %admin.id, user_id = %id, role = role.as_str(), "Role changed via API");
            success(user)
        }
        Err(e) => error(e, expose),
    }
}
