//! Reading upload lists for the two dashboards.
//!
//! A listing is one table read plus one signed link per record. Links are
//! requested concurrently; a failed link leaves that entry without
//! `file_url` and never fails the listing.

use crate::{
    backend::{Backend, BackendResult, ObjectStorage, UploadQuery},
    models::{Submitter, UploadRecord, UploadStatus},
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, time::Duration};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Validity of links handed out with a listing.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Whose uploads a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// The caller's own uploads.
    Own(Uuid),
    /// Every upload, joined with its submitter. Admin only.
    All,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ListedUpload {
    #[serde(flatten)]
    pub record: UploadRecord,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub submitter: Option<Submitter>,

    /// Signed read link, absent when it could not be generated.
    pub file_url: Option<String>,
}

impl ListedUpload {
    pub fn can_view_file(&self) -> bool {
        self.file_url.is_some()
    }

    pub fn is_image(&self) -> bool {
        self.record.is_image()
    }
}

/// Read the uploads in `scope`, newest first, each with a signed link.
pub async fn fetch_listing(
    backend: &Backend,
    scope: ListScope,
) -> BackendResult<Vec<ListedUpload>> {
    let rows: Vec<(UploadRecord, Option<Submitter>)> = match scope {
        ListScope::Own(owner_id) => backend
            .uploads
            .select(UploadQuery::owned_by(owner_id))
            .await?
            .into_iter()
            .map(|record| (record, None))
            .collect(),
        ListScope::All => backend
            .uploads
            .select_with_submitter()
            .await?
            .into_iter()
            .map(|row| (row.upload, Some(row.submitter)))
            .collect(),
    };

    debug!(?scope, count = rows.len(), "fetched uploads");
    Ok(attach_signed_urls(backend.storage.as_ref(), rows).await)
}

async fn attach_signed_urls(
    storage: &dyn ObjectStorage,
    rows: Vec<(UploadRecord, Option<Submitter>)>,
) -> Vec<ListedUpload> {
    let links = join_all(
        rows.iter()
            .map(|(record, _)| storage.create_signed_url(&record.storage_path, SIGNED_URL_TTL)),
    )
    .await;

    rows.into_iter()
        .zip(links)
        .map(|((record, submitter), link)| {
            let file_url = match link {
                Ok(url) => Some(url),
                Err(err) => {
                    warn!(
                        upload_id = %record.id,
                        path = %record.storage_path,
                        error = %err,
                        "could not sign file link"
                    );
                    None
                }
            };
            ListedUpload {
                record,
                submitter,
                file_url,
            }
        })
        .collect()
}

/// A status tab. Filtering always happens on already-fetched entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Accepted,
    Rejected,
}

impl StatusFilter {
    pub fn matches(&self, status: UploadStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Pending => status == UploadStatus::Pending,
            StatusFilter::Accepted => status == UploadStatus::Accepted,
            StatusFilter::Rejected => status == UploadStatus::Rejected,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Pending => "pending",
            StatusFilter::Accepted => "accepted",
            StatusFilter::Rejected => "rejected",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown status filter `{0}`")]
pub struct UnknownFilter(pub String);

impl FromStr for StatusFilter {
    type Err = UnknownFilter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "pending" => Ok(StatusFilter::Pending),
            "accepted" => Ok(StatusFilter::Accepted),
            "rejected" => Ok(StatusFilter::Rejected),
            _ => Err(UnknownFilter(s.to_string())),
        }
    }
}

/// Per-tab counts shown next to each tab label.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub all: usize,
    pub pending: usize,
    pub accepted: usize,
    pub rejected: usize,
}

pub fn count_by_status(entries: &[ListedUpload]) -> StatusCounts {
    entries
        .iter()
        .fold(StatusCounts::default(), |mut counts, entry| {
            counts.all += 1;
            match entry.record.status {
                UploadStatus::Pending => counts.pending += 1,
                UploadStatus::Accepted => counts.accepted += 1,
                UploadStatus::Rejected => counts.rejected += 1,
            }
            counts
        })
}

pub fn filter_by_status(entries: &[ListedUpload], filter: StatusFilter) -> Vec<ListedUpload> {
    entries
        .iter()
        .filter(|entry| filter.matches(entry.record.status))
        .cloned()
        .collect()
}
