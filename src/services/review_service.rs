//! Admin review actions.
//!
//! Only pending uploads can be reviewed, and only once. Accept is a single
//! status update; accepting an upload that is already accepted returns it
//! unchanged. Reject is a hard delete in two steps: the stored object goes
//! first, then the record. A failed removal stops before the record is
//! touched; a failed record delete after a successful removal leaves a
//! record pointing at nothing, which is only logged.

use crate::{
    backend::{Backend, BackendError, ObjectStorage, UploadTable},
    models::{UploadRecord, UploadStatus},
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("{0}")]
    Storage(#[source] BackendError),
    #[error("{0}")]
    Record(#[source] BackendError),
    #[error("upload `{id}` was already reviewed ({status})")]
    NotPending { id: Uuid, status: UploadStatus },
}

#[derive(Clone)]
pub struct ReviewService {
    uploads: Arc<dyn UploadTable>,
    storage: Arc<dyn ObjectStorage>,
}

impl ReviewService {
    pub fn new(backend: &Backend) -> Self {
        Self {
            uploads: backend.uploads.clone(),
            storage: backend.storage.clone(),
        }
    }

    async fn current(&self, id: Uuid) -> Result<UploadRecord, ReviewError> {
        self.uploads
            .find(id)
            .await
            .map_err(ReviewError::Record)?
            .ok_or(ReviewError::Record(BackendError::UploadNotFound(id)))
    }

    /// Mark `id` as accepted. Only the status column changes.
    pub async fn accept(&self, id: Uuid) -> Result<UploadRecord, ReviewError> {
        let current = self.current(id).await?;
        match current.status {
            UploadStatus::Pending => {}
            UploadStatus::Accepted => {
                debug!(upload_id = %id, "upload already accepted");
                return Ok(current);
            }
            status => return Err(ReviewError::NotPending { id, status }),
        }

        let record = self
            .uploads
            .update_status(id, UploadStatus::Accepted)
            .await
            .map_err(ReviewError::Record)?;
        info!(upload_id = %id, "upload accepted");
        Ok(record)
    }

    /// Remove the stored object behind `upload`, then delete its record.
    /// The record is re-read first, so a stale copy cannot reject an upload
    /// that has since been accepted.
    pub async fn reject(&self, upload: &UploadRecord) -> Result<(), ReviewError> {
        let upload = self.current(upload.id).await?;
        if upload.status != UploadStatus::Pending {
            return Err(ReviewError::NotPending {
                id: upload.id,
                status: upload.status,
            });
        }
        let path = removal_path(&upload.storage_path);
        self.storage
            .remove(path)
            .await
            .map_err(ReviewError::Storage)?;

        if let Err(err) = self.uploads.delete(upload.id).await {
            warn!(
                upload_id = %upload.id,
                path = %path,
                error = %err,
                "stored object removed but record delete failed"
            );
            return Err(ReviewError::Record(err));
        }

        info!(upload_id = %upload.id, path = %path, "upload rejected and deleted");
        Ok(())
    }
}

/// The last two `/`-separated segments of a stored location, which is the
/// `{owner}/{file}` key in the storage namespace. Locations with fewer
/// segments are returned unchanged.
pub fn removal_path(stored: &str) -> &str {
    let mut separators = stored.rmatch_indices('/').map(|(i, _)| i);
    match (separators.next(), separators.next()) {
        (Some(_), Some(start)) => &stored[start + 1..],
        _ => stored,
    }
}
