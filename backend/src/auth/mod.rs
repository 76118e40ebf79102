//! Credential-based authentication.
//!
//! A signed credential travels in the `x-auth-token` header (or as an
//! `Authorization: Bearer` token). Every failure rejects the request before
//! handler logic runs.

pub mod password;
pub mod policy;
pub mod token;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use crate::errors::AppError;
use crate::models::Identity;
use crate::AppState;

/// Header name for the credential.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Identity);

/// A verified caller holding the administrator role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Identity);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = extract_token(parts) else {
            return Err(AppError::Unauthorized(
                "No token, authorization denied".to_string(),
            ));
        };

        let claims = token::verify_token(&state.config.jwt_secret, &token)?;

        // The stored role wins over the one in the claims.
        match state.repo.find_identity(&claims.sub).await? {
            Some(identity) => Ok(AuthUser(identity)),
            None => Err(AppError::Unauthorized(
                "User not found, authorization denied".to_string(),
            )),
        }
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        policy::admin_only(&identity).require("Admin access required")?;
        Ok(AdminUser(identity))
    }
}

/// Read the credential from the custom header, falling back to a bearer token.
fn extract_token(parts: &Parts) -> Option<String> {
    let custom = parts
        .headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    if let Some(token) = custom {
        return Some(token.to_string());
    }

    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}
