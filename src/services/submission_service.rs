//! Submitting a file for review: validate, store the binary, then write the
//! record.
//!
//! The two writes are sequential with no compensation. If the record insert
//! fails after the binary was stored, the object stays orphaned in storage
//! and is only logged.

use crate::{
    backend::{Backend, BackendError, ObjectStorage, UploadTable},
    models::{NewUpload, SelectedFile, UploadRecord},
    services::validation::{UploadMetadata, ValidationError, ensure_accepted_file_type},
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

const FALLBACK_EXTENSION: &str = "bin";
const MAX_EXTENSION_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Storage(#[source] BackendError),
    #[error("{0}")]
    Record(#[source] BackendError),
}

#[derive(Clone)]
pub struct SubmissionService {
    uploads: Arc<dyn UploadTable>,
    storage: Arc<dyn ObjectStorage>,
}

impl SubmissionService {
    pub fn new(backend: &Backend) -> Self {
        Self {
            uploads: backend.uploads.clone(),
            storage: backend.storage.clone(),
        }
    }

    /// Store `file` and create one pending record owned by `owner_id`.
    ///
    /// Nothing is written unless a file is present, its type is accepted and
    /// the metadata validates. A storage failure aborts before the insert.
    pub async fn submit(
        &self,
        owner_id: Uuid,
        file: Option<SelectedFile>,
        metadata: &UploadMetadata,
    ) -> Result<UploadRecord, SubmitError> {
        let file = file.ok_or(ValidationError::MissingFile)?;
        ensure_accepted_file_type(&file.content_type)?;
        let metadata = metadata.validate()?;

        let storage_path = storage_path_for(owner_id, &file.name, Utc::now());
        let stored = self
            .storage
            .upload(&storage_path, &file.content_type, file.data)
            .await
            .map_err(SubmitError::Storage)?;

        let new_upload = NewUpload {
            owner_id,
            title: metadata.title,
            description: metadata.description,
            category: metadata.category,
            storage_path: stored.path,
            file_type: file.content_type,
            file_name: file.name,
        };

        match self.uploads.insert(new_upload).await {
            Ok(record) => {
                info!(
                    upload_id = %record.id,
                    owner_id = %owner_id,
                    path = %record.storage_path,
                    size_bytes = stored.size_bytes,
                    "upload submitted for review"
                );
                Ok(record)
            }
            Err(err) => {
                warn!(
                    owner_id = %owner_id,
                    path = %storage_path,
                    error = %err,
                    "record insert failed; stored object is orphaned"
                );
                Err(SubmitError::Record(err))
            }
        }
    }
}

/// `{owner_id}/{epoch_millis}.{extension}` for a file named `file_name`.
pub fn storage_path_for(owner_id: Uuid, file_name: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}/{}.{}",
        owner_id,
        at.timestamp_millis(),
        file_extension(file_name)
    )
}

/// Text after the last `.` of the name (the whole name when there is none),
/// or `bin` when that text cannot be used as a single path segment.
fn file_extension(file_name: &str) -> &str {
    let ext = file_name.rsplit('.').next().unwrap_or_default();
    let usable = !ext.is_empty()
        && ext.len() <= MAX_EXTENSION_LEN
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    if usable { ext } else { FALLBACK_EXTENSION }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::UploadQuery, models::UploadStatus, testing::TestEnv};
    use chrono::TimeZone;

    fn metadata(title: &str) -> UploadMetadata {
        UploadMetadata {
            title: title.into(),
            description: Some("Quarterly figures".into()),
            category: Some(String::new()),
        }
    }

    fn pdf() -> SelectedFile {
        SelectedFile::new("report.final.pdf", "application/pdf", b"%PDF-1.7".to_vec())
    }

    fn stored_files(env: &TestEnv) -> usize {
        fn walk(dir: &std::path::Path) -> usize {
            std::fs::read_dir(dir)
                .map(|entries| {
                    entries
                        .flatten()
                        .map(|e| if e.path().is_dir() { walk(&e.path()) } else { 1 })
                        .sum()
                })
                .unwrap_or(0)
        }
        walk(env.dir.path())
    }

    #[test]
    fn storage_path_uses_owner_millis_and_extension() {
        let owner = Uuid::nil();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(
            storage_path_for(owner, "scan.JPG", at),
            format!("{owner}/1700000000123.JPG")
        );
        assert_eq!(
            storage_path_for(owner, "archive.tar.gz", at),
            format!("{owner}/1700000000123.gz")
        );
        assert_eq!(
            storage_path_for(owner, "README", at),
            format!("{owner}/1700000000123.README")
        );
        assert_eq!(
            storage_path_for(owner, "trailing.", at),
            format!("{owner}/1700000000123.bin")
        );
    }

    #[tokio::test]
    async fn successful_submit_writes_one_object_and_one_pending_record() {
        let env = TestEnv::new().await;
        let user = env.user("ada").await;
        let service = SubmissionService::new(&env.backend);

        let record = service
            .submit(user.id, Some(pdf()), &metadata("Q3 report"))
            .await
            .unwrap();

        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(record.owner_id, user.id);
        assert_eq!(record.file_name, "report.final.pdf");
        assert_eq!(record.category, None);
        assert!(record.storage_path.starts_with(&format!("{}/", user.id)));
        assert!(record.storage_path.ends_with(".pdf"));
        assert_eq!(stored_files(&env), 1);

        let own = env.db.select(UploadQuery::owned_by(user.id)).await.unwrap();
        assert_eq!(own, vec![record]);
    }

    #[tokio::test]
    async fn validation_failures_make_no_calls() {
        let env = TestEnv::new().await;
        let user = env.user("ada").await;
        let service = SubmissionService::new(&env.backend);

        let missing = service.submit(user.id, None, &metadata("t")).await;
        assert!(matches!(
            missing,
            Err(SubmitError::Validation(ValidationError::MissingFile))
        ));

        let too_long = service
            .submit(user.id, Some(pdf()), &metadata(&"x".repeat(101)))
            .await;
        assert!(matches!(
            too_long,
            Err(SubmitError::Validation(ValidationError::TitleTooLong))
        ));

        let text = SelectedFile::new("notes.txt", "text/plain", b"hi".to_vec());
        let wrong_type = service.submit(user.id, Some(text), &metadata("t")).await;
        assert!(matches!(
            wrong_type,
            Err(SubmitError::Validation(ValidationError::UnsupportedFileType(_)))
        ));

        assert_eq!(stored_files(&env), 0);
        assert!(env.db.select(UploadQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_creates_no_record() {
        let env = TestEnv::new().await;
        let user = env.user("ada").await;
        env.storage.fail_uploads(true);

        let result = SubmissionService::new(&env.backend)
            .submit(user.id, Some(pdf()), &metadata("Q3 report"))
            .await;

        assert!(matches!(result, Err(SubmitError::Storage(_))));
        assert!(env.db.select(UploadQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_failure_leaves_orphaned_object() {
        let env = TestEnv::new().await;
        let user = env.user("ada").await;
        env.uploads.fail_inserts(true);

        let result = SubmissionService::new(&env.backend)
            .submit(user.id, Some(pdf()), &metadata("Q3 report"))
            .await;

        assert!(matches!(result, Err(SubmitError::Record(_))));
        assert_eq!(stored_files(&env), 1);
        assert!(env.db.select(UploadQuery::default()).await.unwrap().is_empty());
    }
}
