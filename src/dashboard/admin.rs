//! The review queue with accept and reject actions.

use super::{
    notifications::{Notification, Notifier},
    upload_list::{ListVariant, MountedList, UploadListView},
};
use crate::{backend::Backend, models::UploadRecord, services::review_service::ReviewService};
use std::sync::Arc;
use uuid::Uuid;

pub struct AdminDashboard {
    queue: MountedList,
    reviews: ReviewService,
    notifier: Arc<dyn Notifier>,
}

impl AdminDashboard {
    pub async fn mount(backend: &Backend, notifier: Arc<dyn Notifier>) -> Self {
        let queue = UploadListView::new(backend.clone(), ListVariant::Review, notifier.clone())
            .mount()
            .await;
        Self {
            queue,
            reviews: ReviewService::new(backend),
            notifier,
        }
    }

    pub fn queue(&self) -> &UploadListView {
        self.queue.view()
    }

    pub async fn accept(&self, id: Uuid) -> bool {
        match self.reviews.accept(id).await {
            Ok(_) => {
                self.notifier.notify(
                    Notification::success("Upload accepted")
                        .description("The user will be notified."),
                );
                self.queue.refresh().await;
                true
            }
            Err(err) => {
                self.notifier.notify(
                    Notification::destructive("Action failed").description(err.to_string()),
                );
                false
            }
        }
    }

    pub async fn reject(&self, upload: &UploadRecord) -> bool {
        match self.reviews.reject(upload).await {
            Ok(()) => {
                self.notifier.notify(
                    Notification::success("Upload rejected")
                        .description("The file has been deleted."),
                );
                self.queue.refresh().await;
                true
            }
            Err(err) => {
                self.notifier.notify(
                    Notification::destructive("Action failed").description(err.to_string()),
                );
                false
            }
        }
    }
}
