//! Shared fixtures for unit tests: an in-memory database, a temp storage
//! root and wrappers that count calls or inject collaborator failures.

use crate::{
    backend::{
        Backend, BackendError, BackendResult, LocalObjectStorage, ObjectStorage, SqliteBackend,
        StoredObject, UploadQuery, UploadTable, realtime::ChangeFeed,
    },
    db,
    models::{
        Identity, NewUpload, Role, SubmittedUpload, UploadRecord, UploadStatus,
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    collections::HashSet,
    io,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};
use tempfile::TempDir;
use uuid::Uuid;

pub(crate) async fn sqlite_backend() -> SqliteBackend {
    let pool = db::connect("sqlite::memory:", 1).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    SqliteBackend::new(Arc::new(pool), ChangeFeed::default())
}

fn injected(what: &str) -> BackendError {
    BackendError::Io(io::Error::other(format!("injected {what} failure")))
}

/// Local storage with switchable failures.
pub(crate) struct FlakyStorage {
    inner: LocalObjectStorage,
    failing_links: Mutex<HashSet<String>>,
    fail_uploads: AtomicBool,
    fail_removals: AtomicBool,
}

impl FlakyStorage {
    pub(crate) fn fail_link_for(&self, path: &str) {
        self.failing_links.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_removals(&self, fail: bool) {
        self.fail_removals.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn local(&self) -> &LocalObjectStorage {
        &self.inner
    }
}

#[async_trait]
impl ObjectStorage for FlakyStorage {
    async fn upload(
        &self,
        path: &str,
        content_type: &str,
        data: Bytes,
    ) -> BackendResult<StoredObject> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(injected("upload"));
        }
        self.inner.upload(path, content_type, data).await
    }

    async fn remove(&self, path: &str) -> BackendResult<()> {
        if self.fail_removals.load(Ordering::SeqCst) {
            return Err(injected("remove"));
        }
        self.inner.remove(path).await
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> BackendResult<String> {
        if self.failing_links.lock().unwrap().contains(path) {
            return Err(injected("signed url"));
        }
        self.inner.create_signed_url(path, ttl).await
    }
}

/// Uploads table that counts full reads and can fail inserts.
pub(crate) struct CountingUploads {
    inner: SqliteBackend,
    fetches: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_selects: AtomicBool,
}

impl CountingUploads {
    pub(crate) fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, Ordering::SeqCst);
    }

    fn fetched(&self) -> BackendResult<()> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(injected("select"));
        }
        Ok(())
    }
}

#[async_trait]
impl UploadTable for CountingUploads {
    async fn select(&self, query: UploadQuery) -> BackendResult<Vec<UploadRecord>> {
        self.fetched()?;
        self.inner.select(query).await
    }

    async fn select_with_submitter(&self) -> BackendResult<Vec<SubmittedUpload>> {
        self.fetched()?;
        self.inner.select_with_submitter().await
    }

    async fn find(&self, id: Uuid) -> BackendResult<Option<UploadRecord>> {
        self.inner.find(id).await
    }

    async fn find_by_path(&self, path: &str) -> BackendResult<Option<UploadRecord>> {
        self.inner.find_by_path(path).await
    }

    async fn insert(&self, upload: NewUpload) -> BackendResult<UploadRecord> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }
        self.inner.insert(upload).await
    }

    async fn update_status(&self, id: Uuid, status: UploadStatus) -> BackendResult<UploadRecord> {
        self.inner.update_status(id, status).await
    }

    async fn delete(&self, id: Uuid) -> BackendResult<UploadRecord> {
        self.inner.delete(id).await
    }
}

pub(crate) struct TestEnv {
    pub backend: Backend,
    pub db: SqliteBackend,
    pub storage: Arc<FlakyStorage>,
    pub uploads: Arc<CountingUploads>,
    pub dir: TempDir,
}

impl TestEnv {
    pub(crate) async fn new() -> Self {
        let db = sqlite_backend().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(FlakyStorage {
            inner: LocalObjectStorage::new(dir.path(), "http://localhost:3000", b"k".to_vec()),
            failing_links: Mutex::new(HashSet::new()),
            fail_uploads: AtomicBool::new(false),
            fail_removals: AtomicBool::new(false),
        });
        let uploads = Arc::new(CountingUploads {
            inner: db.clone(),
            fetches: AtomicUsize::new(0),
            fail_inserts: AtomicBool::new(false),
            fail_selects: AtomicBool::new(false),
        });
        let backend = Backend {
            auth: Arc::new(db.clone()),
            uploads: uploads.clone(),
            roles: Arc::new(db.clone()),
            storage: storage.clone(),
            changes: db.changes().clone(),
        };
        Self {
            backend,
            db,
            storage,
            uploads,
            dir,
        }
    }

    pub(crate) async fn user(&self, name: &str) -> Identity {
        self.db
            .create_profile(name, &format!("{name}@example.com"))
            .await
            .unwrap()
            .into()
    }

    pub(crate) async fn admin(&self, name: &str) -> Identity {
        let identity = self.user(name).await;
        self.db.grant_role(identity.id, Role::Admin).await.unwrap();
        identity
    }

    /// Store a small object and insert its record, then force `status`.
    /// Bypasses the change feed only for the status write.
    pub(crate) async fn seed_upload(
        &self,
        owner: &Identity,
        title: &str,
        status: UploadStatus,
    ) -> UploadRecord {
        let path = format!("{}/{}.png", owner.id, Uuid::new_v4());
        self.storage
            .local()
            .upload(&path, "image/png", Bytes::from_static(b"png"))
            .await
            .unwrap();
        let record = self
            .db
            .insert(NewUpload {
                owner_id: owner.id,
                title: title.into(),
                description: None,
                category: None,
                storage_path: path,
                file_type: "image/png".into(),
                file_name: format!("{title}.png"),
            })
            .await
            .unwrap();
        if status == UploadStatus::Pending {
            return record;
        }
        sqlx::query("UPDATE uploads SET status = ? WHERE id = ?")
            .bind(status)
            .bind(record.id)
            .execute(&*self.db.db)
            .await
            .unwrap();
        UploadRecord { status, ..record }
    }
}
