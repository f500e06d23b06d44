//! Core data models for the upload review service.
//!
//! Rows map to SQLite tables via `sqlx::FromRow` and serialize as JSON via
//! `serde`.

pub mod profile;
pub mod role;
pub mod session;
pub mod upload;

pub use profile::{Identity, Profile};
pub use role::{Role, RoleGrant};
pub use session::{AuthEvent, AuthEventKind, Session};
pub use upload::{NewUpload, SelectedFile, SubmittedUpload, Submitter, UploadRecord, UploadStatus};
