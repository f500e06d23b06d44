//! Admin endpoints.
//!
//! - `GET  /admin/uploads?status=`: every upload with its submitter,
//!   `pending` tab unless another is requested.
//! - `POST /admin/uploads/{id}/accept`
//! - `POST /admin/uploads/{id}/reject`: deletes the stored file, then the
//!   record.

use super::{
    auth_handlers::AdminUser,
    upload_handlers::{ListQuery, list_for},
};
use crate::{
    dashboard::upload_list::ListVariant, errors::AppError, services::review_service::ReviewService,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

/// `GET /admin/uploads`
pub async fn list_all_uploads(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let response = list_for(&state, ListVariant::Review, query.status.as_deref()).await?;
    Ok(Json(response))
}

/// `POST /admin/uploads/{id}/accept`
pub async fn accept_upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = ReviewService::new(&state.backend).accept(id).await?;
    tracing::info!(upload_id = %id, admin_id = %admin.user.id, "accepted over http");
    Ok(Json(record))
}

/// `POST /admin/uploads/{id}/reject`
pub async fn reject_upload(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let record = state
        .backend
        .uploads
        .find(id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("upload `{}` not found", id)))?;

    ReviewService::new(&state.backend).reject(&record).await?;
    tracing::info!(upload_id = %id, admin_id = %admin.user.id, "rejected over http");
    Ok(StatusCode::NO_CONTENT)
}
