//! Collaborator boundary.
//!
//! The review workflow talks to four collaborators: auth, the uploads table,
//! the role table and object storage, plus an in-process change feed. Each
//! collaborator is a trait so the workflow never depends on a concrete
//! backend. `Backend` bundles them into one cloneable context that is
//! handed down from the root instead of living in globals.

pub mod local_storage;
pub mod realtime;
pub mod sqlite;

use crate::models::{
    AuthEvent, NewUpload, Role, RoleGrant, Session, SubmittedUpload, UploadRecord, UploadStatus,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{io, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

pub use local_storage::LocalObjectStorage;
pub use realtime::{ChangeEvent, ChangeFeed, ChangeFilter, ChangeKind, ChangeSignal};
pub use sqlite::SqliteBackend;

/// Any failure reported by a collaborator call.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("upload `{0}` not found")]
    UploadNotFound(Uuid),
    #[error("profile `{0}` not found")]
    ProfileNotFound(Uuid),
    #[error("object `{0}` already exists")]
    ObjectExists(String),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object path `{0}`")]
    InvalidPath(String),
    #[error("signed link signature does not match")]
    InvalidSignature,
    #[error("signed link has expired")]
    LinkExpired,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Resolve a bearer token. Unknown and expired tokens are `Ok(None)`.
    async fn current_session(&self, token: &str) -> BackendResult<Option<Session>>;

    /// Sign-in, sign-out and refresh events for every session.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    async fn sign_out(&self, token: &str) -> BackendResult<()>;
}

/// Row filter for `UploadTable::select`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadQuery {
    pub owner_id: Option<Uuid>,
}

impl UploadQuery {
    pub fn owned_by(owner_id: Uuid) -> Self {
        Self {
            owner_id: Some(owner_id),
        }
    }
}

/// The uploads table. Every read is ordered by `created_at` descending.
#[async_trait]
pub trait UploadTable: Send + Sync {
    async fn select(&self, query: UploadQuery) -> BackendResult<Vec<UploadRecord>>;

    /// All uploads joined with their submitter's username and email.
    async fn select_with_submitter(&self) -> BackendResult<Vec<SubmittedUpload>>;

    async fn find(&self, id: Uuid) -> BackendResult<Option<UploadRecord>>;

    /// The record whose stored object lives at `path`.
    async fn find_by_path(&self, path: &str) -> BackendResult<Option<UploadRecord>>;

    /// Insert with `status = pending`.
    async fn insert(&self, upload: NewUpload) -> BackendResult<UploadRecord>;

    async fn update_status(&self, id: Uuid, status: UploadStatus) -> BackendResult<UploadRecord>;

    /// Hard delete. Returns the removed row.
    async fn delete(&self, id: Uuid) -> BackendResult<UploadRecord>;
}

#[async_trait]
pub trait RoleTable: Send + Sync {
    /// Point lookup; an absent grant is `Ok(None)`, not an error.
    async fn find_grant(&self, user_id: Uuid, role: Role) -> BackendResult<Option<RoleGrant>>;
}

/// Result of a successful `ObjectStorage::upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub path: String,
    pub size_bytes: u64,
    pub etag: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` at `path`. Existing objects are never overwritten.
    async fn upload(&self, path: &str, content_type: &str, data: Bytes)
    -> BackendResult<StoredObject>;

    /// Remove the object at `path`. Removing a missing object succeeds.
    async fn remove(&self, path: &str) -> BackendResult<()>;

    /// Time-limited read link for `path`.
    async fn create_signed_url(&self, path: &str, ttl: Duration) -> BackendResult<String>;
}

/// Everything the workflow needs from the outside world.
#[derive(Clone)]
pub struct Backend {
    pub auth: Arc<dyn AuthBackend>,
    pub uploads: Arc<dyn UploadTable>,
    pub roles: Arc<dyn RoleTable>,
    pub storage: Arc<dyn ObjectStorage>,
    pub changes: ChangeFeed,
}

impl Backend {
    /// Wire a SQLite-backed auth/table layer to an object store. The change
    /// feed is the one the SQLite layer publishes on.
    pub fn new(db: SqliteBackend, storage: Arc<dyn ObjectStorage>) -> Self {
        let changes = db.changes().clone();
        let db = Arc::new(db);
        Self {
            auth: db.clone(),
            uploads: db.clone(),
            roles: db,
            storage,
            changes,
        }
    }
}
