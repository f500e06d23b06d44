//! `GET /files/{*path}?expires=&signature=`: serves a stored file to
//! whoever holds a valid signed link. No session is needed.

use crate::{errors::AppError, state::AppState};
use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct SignedQuery {
    pub expires: i64,
    pub signature: String,
}

pub async fn get_file(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<SignedQuery>,
) -> Result<Response, AppError> {
    state
        .files
        .verify_signature(&path, query.expires, &query.signature)?;
    let (file, len) = state.files.open(&path).await?;
    let content_type = recorded_type(&state, &path)
        .await
        .unwrap_or_else(|| HeaderValue::from_static(content_type_for(&path)));

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("private, max-age=3600"),
    );
    Ok(response)
}

/// The MIME type recorded at submission. `None` once the record is gone or
/// when the lookup fails.
async fn recorded_type(state: &AppState, path: &str) -> Option<HeaderValue> {
    match state.backend.uploads.find_by_path(path).await {
        Ok(record) => record.and_then(|r| HeaderValue::from_str(&r.file_type).ok()),
        Err(err) => {
            warn!(path = %path, error = %err, "content type lookup failed");
            None
        }
    }
}

/// Content type from the stored file's extension, for objects without a
/// record. Only the types the service accepts are recognised.
fn content_type_for(path: &str) -> &'static str {
    let ext = path
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
