//! Shared state handed to every HTTP handler.

use crate::backend::{Backend, ChangeFeed, LocalObjectStorage, SqliteBackend};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Collaborators used by the review workflow.
    pub backend: Backend,

    /// The disk store behind `backend.storage`, for serving signed links.
    pub files: Arc<LocalObjectStorage>,

    /// Shared SQLite connection pool, used by readiness checks.
    pub db: Arc<SqlitePool>,
}

impl AppState {
    /// Wire the SQLite collaborators and the disk store into one state.
    pub fn new(db: Arc<SqlitePool>, files: LocalObjectStorage) -> Self {
        let files = Arc::new(files);
        let sqlite = SqliteBackend::new(db.clone(), ChangeFeed::default());
        Self {
            backend: Backend::new(sqlite, files.clone()),
            files,
            db,
        }
    }
}
