//! The submitter's dashboard: the upload form next to their history.

use super::{
    notifications::Notifier,
    upload_form::UploadForm,
    upload_list::{ListVariant, MountedList, UploadListView},
};
use crate::{
    backend::Backend, models::UploadRecord, services::submission_service::SubmissionService,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct UserDashboard {
    form: UploadForm,
    history: MountedList,
}

impl UserDashboard {
    pub async fn mount(backend: &Backend, owner_id: Uuid, notifier: Arc<dyn Notifier>) -> Self {
        let form = UploadForm::new(owner_id, SubmissionService::new(backend), notifier.clone());
        let history = UploadListView::new(backend.clone(), ListVariant::Own(owner_id), notifier)
            .mount()
            .await;
        Self { form, history }
    }

    pub fn form(&self) -> &UploadForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut UploadForm {
        &mut self.form
    }

    pub fn history(&self) -> &UploadListView {
        self.history.view()
    }

    /// Submit the form. A successful submission re-fetches the history once
    /// on its own, whether or not a change signal also arrives.
    pub async fn submit(&mut self) -> Option<UploadRecord> {
        let record = self.form.submit().await?;
        self.history.refresh().await;
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::ChangeFeed, dashboard::notifications::ChannelNotifier, models::SelectedFile,
        testing::TestEnv,
    };

    #[tokio::test]
    async fn submission_shows_up_in_history_without_waiting() {
        let env = TestEnv::new().await;
        let ada = env.user("ada").await;
        let (notifier, _rx) = ChannelNotifier::new();
        // Nothing publishes on this feed, so every fetch comes from the
        // dashboard itself.
        let silent = Backend {
            changes: ChangeFeed::default(),
            ..env.backend.clone()
        };
        let mut dashboard = UserDashboard::mount(&silent, ada.id, Arc::new(notifier)).await;
        assert_eq!(env.uploads.fetches(), 1);
        assert!(dashboard.history().entries().is_empty());

        let form = dashboard.form_mut();
        form.select_file(SelectedFile::new("id.pdf", "application/pdf", b"%PDF".to_vec()));
        form.metadata.title = "ID card".into();
        let record = dashboard.submit().await.unwrap();

        assert_eq!(env.uploads.fetches(), 2);
        let entries = dashboard.history().entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.id, record.id);
        assert!(entries[0].can_view_file());
        assert!(!entries[0].is_image());
        assert!(!dashboard.history().can_review(&entries[0]));
    }

    #[tokio::test]
    async fn failed_submission_does_not_refetch() {
        let env = TestEnv::new().await;
        let ada = env.user("ada").await;
        let (notifier, _rx) = ChannelNotifier::new();
        let mut dashboard = UserDashboard::mount(&env.backend, ada.id, Arc::new(notifier)).await;

        assert!(dashboard.submit().await.is_none());
        assert_eq!(env.uploads.fetches(), 1);
    }
}
