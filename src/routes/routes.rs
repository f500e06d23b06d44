//! Defines routes for the upload review service.
//!
//! ## Structure
//! - **Probes**
//!   - `GET  /healthz`, `GET /readyz`
//!
//! - **Submitter endpoints** (bearer session)
//!   - `POST /uploads`: multipart submission
//!   - `GET  /uploads?status=`: own uploads under a status tab
//!   - `GET  /uploads/events`: server-sent change notifications
//!   - `POST /auth/sign-out`
//!
//! - **Admin endpoints** (bearer session + admin role)
//!   - `GET  /admin/uploads?status=`
//!   - `POST /admin/uploads/{id}/accept`
//!   - `POST /admin/uploads/{id}/reject`
//!
//! - **Signed links**
//!   - `GET  /files/{*path}?expires=&signature=`

use crate::{
    handlers::{
        auth_handlers::sign_out,
        event_handlers::upload_events,
        file_handlers::get_file,
        health_handlers::{healthz, readyz},
        review_handlers::{accept_upload, list_all_uploads, reject_upload},
        upload_handlers::{create_upload, list_own_uploads},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. `max_upload_bytes` caps request bodies, which bounds
/// the size of a submitted file.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // submitter
        .route("/uploads", post(create_upload).get(list_own_uploads))
        .route("/uploads/events", get(upload_events))
        .route("/auth/sign-out", post(sign_out))
        // admin
        .route("/admin/uploads", get(list_all_uploads))
        .route("/admin/uploads/{id}/accept", post(accept_upload))
        .route("/admin/uploads/{id}/reject", post(reject_upload))
        // signed links
        .route("/files/{*path}", get(get_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}
