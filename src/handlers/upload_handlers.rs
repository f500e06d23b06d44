//! Submitter endpoints.
//!
//! - `POST /uploads`: multipart form with a `file` part and `title`,
//!   `description`, `category` text parts.
//! - `GET  /uploads?status=`: the caller's uploads under one status tab.

use super::auth_handlers::CurrentUser;
use crate::{
    dashboard::{
        notifications::TracingNotifier,
        upload_list::{ListVariant, UploadListView},
    },
    errors::AppError,
    models::SelectedFile,
    services::{
        listing_service::{ListedUpload, StatusCounts, StatusFilter},
        submission_service::SubmissionService,
        validation::UploadMetadata,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub filter: StatusFilter,
    pub counts: StatusCounts,
    pub uploads: Vec<ListedUpload>,
}

/// Read the multipart body into the selected file and its metadata. An
/// empty `file` part counts as no file.
async fn read_form(
    mut multipart: Multipart,
) -> Result<(Option<SelectedFile>, UploadMetadata), AppError> {
    let mut file = None;
    let mut metadata = UploadMetadata::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or(FALLBACK_CONTENT_TYPE)
                    .to_string();
                let data = field.bytes().await?;
                if !file_name.is_empty() || !data.is_empty() {
                    file = Some(SelectedFile::new(file_name, content_type, data));
                }
            }
            Some("title") => metadata.title = field.text().await?,
            Some("description") => metadata.description = Some(field.text().await?),
            Some("category") => metadata.category = Some(field.text().await?),
            other => tracing::debug!(field = ?other, "ignoring multipart field"),
        }
    }

    Ok((file, metadata))
}

/// `POST /uploads`
pub async fn create_upload(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let (file, metadata) = read_form(multipart).await?;
    let record = SubmissionService::new(&state.backend)
        .submit(session.user.id, file, &metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Fetch `variant` once and apply the requested tab.
pub(super) async fn list_for(
    state: &AppState,
    variant: ListVariant,
    status: Option<&str>,
) -> Result<ListResponse, AppError> {
    let view = UploadListView::new(state.backend.clone(), variant, Arc::new(TracingNotifier));
    if let Some(status) = status {
        let filter = status
            .parse::<StatusFilter>()
            .map_err(|err| AppError::bad_request(err.to_string()))?;
        view.set_filter(filter)
            .map_err(|err| AppError::bad_request(err.to_string()))?;
    }

    view.try_refresh()
        .await
        .map_err(|err| AppError::internal(format!("Error loading uploads: {err}")))?;

    Ok(ListResponse {
        filter: view.filter(),
        counts: view.counts(),
        uploads: view.visible(),
    })
}

/// `GET /uploads`
pub async fn list_own_uploads(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let response = list_for(
        &state,
        ListVariant::Own(session.user.id),
        query.status.as_deref(),
    )
    .await?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::LocalObjectStorage, db};

    #[tokio::test]
    async fn failed_listing_reports_the_cause() {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let files = LocalObjectStorage::new(dir.path(), "http://localhost", b"k".to_vec());
        let state = AppState::new(Arc::new(pool), files);
        state.db.close().await;

        let err = list_for(&state, ListVariant::Review, None).await.unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let cause = err.message.strip_prefix("Error loading uploads: ").unwrap();
        assert!(!cause.is_empty());
    }
}
