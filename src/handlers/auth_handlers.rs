//! Bearer-token authentication.
//!
//! - `CurrentUser` resolves `Authorization: Bearer <token>` to a live session.
//! - `AdminUser` additionally requires the admin role.
//! - `POST /auth/sign-out` ends the caller's session.

use crate::{errors::AppError, models::Session, services::role_service, state::AppState};
use axum::{
    extract::{FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    response::IntoResponse,
};

const BEARER_PREFIX: &str = "Bearer ";

/// The caller's session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

/// The caller's session, known to hold the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Session);

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            bearer_token(parts).ok_or_else(|| AppError::unauthorized("sign in required"))?;
        let session = state
            .backend
            .auth
            .current_session(token)
            .await?
            .ok_or_else(|| AppError::unauthorized("sign in required"))?;
        Ok(CurrentUser(session))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(session) = CurrentUser::from_request_parts(parts, state).await?;
        if !role_service::is_admin(state.backend.roles.as_ref(), session.user.id).await {
            return Err(AppError::forbidden("admin role required"));
        }
        Ok(AdminUser(session))
    }
}

/// `POST /auth/sign-out`
pub async fn sign_out(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    state.backend.auth.sign_out(&session.token).await?;
    tracing::info!(user_id = %session.user.id, "session ended over http");
    Ok(StatusCode::NO_CONTENT)
}
