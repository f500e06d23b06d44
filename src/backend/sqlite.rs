//! SQLite implementation of the auth, uploads and role collaborators.
//!
//! Every successful write on `uploads` is announced on the shared
//! `ChangeFeed`; every session change on the auth event channel.

use super::{
    AuthBackend, BackendError, BackendResult, RoleTable, UploadQuery, UploadTable,
    realtime::{ChangeEvent, ChangeFeed, ChangeKind},
};
use crate::models::{
    AuthEvent, AuthEventKind, Identity, NewUpload, Profile, Role, RoleGrant, Session,
    SubmittedUpload, UploadRecord, UploadStatus,
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use sqlx::{FromRow, QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

const AUTH_EVENT_CAPACITY: usize = 64;
const SESSION_TOKEN_BYTES: usize = 32;

const UPLOAD_COLUMNS: &str = "id, user_id, title, description, category, file_url, \
                              file_type, file_name, status, created_at";

#[derive(Clone)]
pub struct SqliteBackend {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
    changes: ChangeFeed,
    auth_events: broadcast::Sender<AuthEvent>,
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    expires_at: DateTime<Utc>,
    user_id: Uuid,
    username: String,
    email: String,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            token: row.token,
            expires_at: row.expires_at,
            user: Identity {
                id: row.user_id,
                username: row.username,
                email: row.email,
            },
        }
    }
}

impl SqliteBackend {
    pub fn new(db: Arc<SqlitePool>, changes: ChangeFeed) -> Self {
        let (auth_events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);
        Self {
            db,
            changes,
            auth_events,
        }
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    pub async fn create_profile(&self, username: &str, email: &str) -> BackendResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            "INSERT INTO profiles (id, username, email, created_at)
             VALUES (?, ?, ?, ?)
             RETURNING id, username, email, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(username)
        .bind(email)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        info!(user_id = %profile.id, email = %profile.email, "created profile");
        Ok(profile)
    }

    pub async fn find_profile_by_email(&self, email: &str) -> BackendResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, username, email, created_at FROM profiles WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&*self.db)
        .await?;
        Ok(profile)
    }

    /// Grant `role` to `user_id`. Granting twice is a no-op.
    pub async fn grant_role(&self, user_id: Uuid, role: Role) -> BackendResult<RoleGrant> {
        sqlx::query(
            "INSERT INTO user_roles (id, user_id, role, created_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(user_id, role) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(role)
        .bind(Utc::now())
        .execute(&*self.db)
        .await?;

        self.find_grant(user_id, role)
            .await?
            .ok_or(BackendError::ProfileNotFound(user_id))
    }

    /// Start a session for `user_id` and announce it.
    pub async fn issue_session(&self, user_id: Uuid, ttl: Duration) -> BackendResult<Session> {
        let token = new_session_token();
        let now = Utc::now();

        let inserted = sqlx::query(
            "INSERT INTO sessions (token, user_id, expires_at, created_at)
             SELECT ?, id, ?, ? FROM profiles WHERE id = ?",
        )
        .bind(&token)
        .bind(now + ttl)
        .bind(now)
        .bind(user_id)
        .execute(&*self.db)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(BackendError::ProfileNotFound(user_id));
        }

        let session = self
            .fetch_session(&token)
            .await?
            .ok_or(BackendError::ProfileNotFound(user_id))?;
        info!(user_id = %user_id, expires_at = %session.expires_at, "session issued");
        self.announce(AuthEventKind::SignedIn, user_id, &token, Some(session.clone()));
        Ok(session)
    }

    /// Extend a live session. Unknown or expired tokens yield `None`.
    pub async fn refresh_session(
        &self,
        token: &str,
        ttl: Duration,
    ) -> BackendResult<Option<Session>> {
        let Some(current) = self.current_session(token).await? else {
            return Ok(None);
        };

        sqlx::query("UPDATE sessions SET expires_at = ? WHERE token = ?")
            .bind(Utc::now() + ttl)
            .bind(token)
            .execute(&*self.db)
            .await?;

        let refreshed = self.fetch_session(token).await?;
        if let Some(session) = &refreshed {
            debug!(user_id = %current.user.id, "session refreshed");
            self.announce(
                AuthEventKind::TokenRefreshed,
                current.user.id,
                token,
                Some(session.clone()),
            );
        }
        Ok(refreshed)
    }

    async fn fetch_session(&self, token: &str) -> BackendResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT s.token, s.expires_at, p.id AS user_id, p.username, p.email
             FROM sessions s JOIN profiles p ON p.id = s.user_id
             WHERE s.token = ?",
        )
        .bind(token)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row.map(Session::from))
    }

    fn announce(&self, kind: AuthEventKind, user_id: Uuid, token: &str, session: Option<Session>) {
        let _ = self.auth_events.send(AuthEvent {
            kind,
            user_id,
            token: token.to_string(),
            session,
        });
    }
}

fn new_session_token() -> String {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

#[async_trait]
impl AuthBackend for SqliteBackend {
    async fn current_session(&self, token: &str) -> BackendResult<Option<Session>> {
        let session = self.fetch_session(token).await?;
        Ok(session.filter(|s| !s.is_expired_at(Utc::now())))
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.auth_events.subscribe()
    }

    async fn sign_out(&self, token: &str) -> BackendResult<()> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            "DELETE FROM sessions WHERE token = ? RETURNING user_id",
        )
        .bind(token)
        .fetch_optional(&*self.db)
        .await?;

        if let Some(user_id) = user_id {
            info!(user_id = %user_id, "signed out");
            self.announce(AuthEventKind::SignedOut, user_id, token, None);
        }
        Ok(())
    }
}

#[async_trait]
impl UploadTable for SqliteBackend {
    async fn select(&self, query: UploadQuery) -> BackendResult<Vec<UploadRecord>> {
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("SELECT {UPLOAD_COLUMNS} FROM uploads"));
        if let Some(owner_id) = query.owner_id {
            builder.push(" WHERE user_id = ");
            builder.push_bind(owner_id);
        }
        builder.push(" ORDER BY created_at DESC, rowid DESC");

        let rows: Vec<UploadRecord> = builder.build_query_as().fetch_all(&*self.db).await?;
        Ok(rows)
    }

    async fn select_with_submitter(&self) -> BackendResult<Vec<SubmittedUpload>> {
        let rows = sqlx::query_as::<_, SubmittedUpload>(
            "SELECT u.id, u.user_id, u.title, u.description, u.category, u.file_url,
                    u.file_type, u.file_name, u.status, u.created_at,
                    p.username, p.email
             FROM uploads u JOIN profiles p ON p.id = u.user_id
             ORDER BY u.created_at DESC, u.rowid DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    async fn find(&self, id: Uuid) -> BackendResult<Option<UploadRecord>> {
        let row = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn find_by_path(&self, path: &str) -> BackendResult<Option<UploadRecord>> {
        let row = sqlx::query_as::<_, UploadRecord>(&format!(
            "SELECT {UPLOAD_COLUMNS} FROM uploads WHERE file_url = ?"
        ))
        .bind(path)
        .fetch_optional(&*self.db)
        .await?;
        Ok(row)
    }

    async fn insert(&self, upload: NewUpload) -> BackendResult<UploadRecord> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "INSERT INTO uploads (
                id, user_id, title, description, category, file_url,
                file_type, file_name, status, created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {UPLOAD_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(upload.owner_id)
        .bind(&upload.title)
        .bind(&upload.description)
        .bind(&upload.category)
        .bind(&upload.storage_path)
        .bind(&upload.file_type)
        .bind(&upload.file_name)
        .bind(UploadStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await?;

        self.changes
            .publish(ChangeEvent::upload(ChangeKind::Insert, record.id, record.owner_id));
        Ok(record)
    }

    async fn update_status(&self, id: Uuid, status: UploadStatus) -> BackendResult<UploadRecord> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "UPDATE uploads SET status = ? WHERE id = ? RETURNING {UPLOAD_COLUMNS}"
        ))
        .bind(status)
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BackendError::UploadNotFound(id))?;

        self.changes
            .publish(ChangeEvent::upload(ChangeKind::Update, record.id, record.owner_id));
        Ok(record)
    }

    async fn delete(&self, id: Uuid) -> BackendResult<UploadRecord> {
        let record = sqlx::query_as::<_, UploadRecord>(&format!(
            "DELETE FROM uploads WHERE id = ? RETURNING {UPLOAD_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(BackendError::UploadNotFound(id))?;

        self.changes
            .publish(ChangeEvent::upload(ChangeKind::Delete, record.id, record.owner_id));
        Ok(record)
    }
}

#[async_trait]
impl RoleTable for SqliteBackend {
    async fn find_grant(&self, user_id: Uuid, role: Role) -> BackendResult<Option<RoleGrant>> {
        let grant = sqlx::query_as::<_, RoleGrant>(
            "SELECT id, user_id, role, created_at FROM user_roles
             WHERE user_id = ? AND role = ?",
        )
        .bind(user_id)
        .bind(role)
        .fetch_optional(&*self.db)
        .await?;
        Ok(grant)
    }
}
