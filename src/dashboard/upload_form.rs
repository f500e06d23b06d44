//! The submission form.

use super::notifications::{Notification, Notifier};
use crate::{
    models::{SelectedFile, UploadRecord},
    services::{
        submission_service::SubmissionService,
        validation::{UploadMetadata, ensure_accepted_file_type},
    },
};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

pub struct UploadForm {
    owner_id: Uuid,
    service: SubmissionService,
    notifier: Arc<dyn Notifier>,
    pub metadata: UploadMetadata,
    file: Option<SelectedFile>,
    uploading: watch::Sender<bool>,
}

impl UploadForm {
    pub fn new(owner_id: Uuid, service: SubmissionService, notifier: Arc<dyn Notifier>) -> Self {
        let (uploading, _) = watch::channel(false);
        Self {
            owner_id,
            service,
            notifier,
            metadata: UploadMetadata::default(),
            file: None,
            uploading,
        }
    }

    /// Keep `file` if its type is accepted. Otherwise the selection is
    /// cleared and the user is told why.
    pub fn select_file(&mut self, file: SelectedFile) -> bool {
        match ensure_accepted_file_type(&file.content_type) {
            Ok(()) => {
                self.file = Some(file);
                true
            }
            Err(err) => {
                self.file = None;
                self.notifier.notify(
                    Notification::destructive("Invalid file type").description(err.to_string()),
                );
                false
            }
        }
    }

    pub fn selected_file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        *self.uploading.borrow()
    }

    /// Follows the in-flight flag, e.g. to disable the submit control.
    pub fn watch_uploading(&self) -> watch::Receiver<bool> {
        self.uploading.subscribe()
    }

    /// Submit the selected file with the current metadata. On success the
    /// form is cleared and the new record returned; every failure is
    /// reported as a notification and leaves the form as it was.
    pub async fn submit(&mut self) -> Option<UploadRecord> {
        let Some(file) = self.file.clone() else {
            self.notifier.notify(
                Notification::destructive("No file selected")
                    .description("Please select a file to upload."),
            );
            return None;
        };

        self.uploading.send_replace(true);
        let result = self
            .service
            .submit(self.owner_id, Some(file), &self.metadata)
            .await;
        self.uploading.send_replace(false);

        match result {
            Ok(record) => {
                self.notifier.notify(
                    Notification::success("Upload successful!")
                        .description("Your file has been submitted for review."),
                );
                self.file = None;
                self.metadata = UploadMetadata::default();
                Some(record)
            }
            Err(err) => {
                self.notifier.notify(
                    Notification::destructive("Upload failed").description(err.to_string()),
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{UploadQuery, UploadTable},
        dashboard::notifications::ChannelNotifier,
        models::UploadStatus,
        testing::TestEnv,
    };
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn form(env: &TestEnv) -> (UploadForm, UnboundedReceiver<Notification>, Uuid) {
        let user = env.user("ada").await;
        let (notifier, rx) = ChannelNotifier::new();
        let form = UploadForm::new(
            user.id,
            SubmissionService::new(&env.backend),
            Arc::new(notifier),
        );
        (form, rx, user.id)
    }

    fn png() -> SelectedFile {
        SelectedFile::new("scan.png", "image/png", b"png".to_vec())
    }

    #[tokio::test]
    async fn rejected_type_clears_selection() {
        let env = TestEnv::new().await;
        let (mut form, mut rx, _) = form(&env).await;

        assert!(form.select_file(png()));
        let zip = SelectedFile::new("a.zip", "application/zip", b"zip".to_vec());
        assert!(!form.select_file(zip));

        assert!(form.selected_file().is_none());
        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.title, "Invalid file type");
        assert_eq!(
            notification.description.as_deref(),
            Some("Please upload an image (PNG, JPG, etc.) or a PDF file.")
        );
    }

    #[tokio::test]
    async fn submit_without_file_only_notifies() {
        let env = TestEnv::new().await;
        let (mut form, mut rx, _) = form(&env).await;
        form.metadata.title = "Receipt".into();

        assert!(form.submit().await.is_none());

        assert_eq!(rx.try_recv().unwrap().title, "No file selected");
        assert!(env.db.select(UploadQuery::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_metadata_reports_first_violation() {
        let env = TestEnv::new().await;
        let (mut form, mut rx, _) = form(&env).await;
        form.select_file(png());

        assert!(form.submit().await.is_none());

        let notification = rx.try_recv().unwrap();
        assert_eq!(notification.title, "Upload failed");
        assert_eq!(notification.description.as_deref(), Some("Title is required"));
        assert!(form.selected_file().is_some());
    }

    #[tokio::test]
    async fn success_clears_form() {
        let env = TestEnv::new().await;
        let (mut form, mut rx, owner_id) = form(&env).await;
        let uploading = form.watch_uploading();
        form.select_file(png());
        form.metadata = UploadMetadata {
            title: "Receipt".into(),
            description: Some("March".into()),
            category: None,
        };

        let record = form.submit().await.unwrap();

        assert_eq!(record.owner_id, owner_id);
        assert_eq!(record.status, UploadStatus::Pending);
        assert_eq!(rx.try_recv().unwrap().title, "Upload successful!");
        assert!(form.selected_file().is_none());
        assert_eq!(form.metadata, UploadMetadata::default());
        assert!(!form.is_uploading());
        assert!(uploading.has_changed().unwrap());
    }
}
