//! Represents a submitted file and its review status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

/// Review state of an upload.
///
/// Every upload starts as `Pending`. An admin's accept moves it to `Accepted`;
/// there is no path back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Accepted,
    Rejected,
}

impl UploadStatus {
    pub const ALL: [UploadStatus; 3] = [Self::Pending, Self::Accepted, Self::Rejected];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown upload status `{0}`")]
pub struct UnknownStatus(pub String);

impl FromStr for UploadStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// One upload row.
///
/// `owner_id`, `storage_path` and `created_at` are fixed at creation. Only
/// `status` is ever updated.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct UploadRecord {
    pub id: Uuid,

    /// The submitting user.
    #[sqlx(rename = "user_id")]
    pub owner_id: Uuid,

    pub title: String,

    pub description: Option<String>,

    pub category: Option<String>,

    /// Object key in storage, `{owner_id}/{epoch_millis}.{extension}`.
    #[sqlx(rename = "file_url")]
    pub storage_path: String,

    /// MIME type reported at selection time.
    pub file_type: String,

    /// Original filename, display only.
    pub file_name: String,

    pub status: UploadStatus,

    pub created_at: DateTime<Utc>,
}

impl UploadRecord {
    /// Images get a picture icon; everything else is shown as a document.
    pub fn is_image(&self) -> bool {
        self.file_type.starts_with("image/")
    }
}

/// Fields written when a new upload is inserted. Status and timestamps are
/// assigned by the table.
#[derive(Debug, Clone)]
pub struct NewUpload {
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub storage_path: String,
    pub file_type: String,
    pub file_name: String,
}

/// Display identity of the user who submitted an upload.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
pub struct Submitter {
    pub username: String,
    pub email: String,
}

/// An upload joined with its submitter, as read by the review listing.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct SubmittedUpload {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub upload: UploadRecord,

    #[sqlx(flatten)]
    pub submitter: Submitter,
}

/// A file chosen for upload, as received from the client.
#[derive(Clone, Debug)]
pub struct SelectedFile {
    pub name: String,
    pub content_type: String,
    pub data: bytes::Bytes,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<bytes::Bytes>,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Pending".parse::<UploadStatus>(), Ok(UploadStatus::Pending));
        assert_eq!("accepted".parse::<UploadStatus>(), Ok(UploadStatus::Accepted));
        assert!("approved".parse::<UploadStatus>().is_err());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&UploadStatus::Rejected).unwrap();
        assert_eq!(json, "\"rejected\"");
    }
}
