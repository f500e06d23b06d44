//! Upload list views.
//!
//! Two variants share one implementation: the submitter's history (own
//! uploads, any status tab) and the admin review queue (every upload with
//! its submitter, `pending` tab by default). Both hold the last fetched
//! entries and filter them locally. A mounted view re-fetches in full on
//! every change signal; whichever fetch finishes last wins.

use super::notifications::{Notification, Notifier};
use crate::{
    backend::{Backend, BackendResult, ChangeFilter},
    models::UploadStatus,
    services::listing_service::{
        ListScope, ListedUpload, StatusCounts, StatusFilter, count_by_status, fetch_listing,
        filter_by_status,
    },
};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

const OWN_FILTERS: &[StatusFilter] = &[
    StatusFilter::All,
    StatusFilter::Pending,
    StatusFilter::Accepted,
    StatusFilter::Rejected,
];
const REVIEW_FILTERS: &[StatusFilter] = &[
    StatusFilter::Pending,
    StatusFilter::Accepted,
    StatusFilter::Rejected,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListVariant {
    /// Uploads owned by one user.
    Own(Uuid),
    /// Every upload, for admins.
    Review,
}

impl ListVariant {
    fn scope(self) -> ListScope {
        match self {
            ListVariant::Own(owner_id) => ListScope::Own(owner_id),
            ListVariant::Review => ListScope::All,
        }
    }

    fn change_filter(self) -> ChangeFilter {
        match self {
            ListVariant::Own(owner_id) => ChangeFilter::uploads().owned_by(owner_id),
            ListVariant::Review => ChangeFilter::uploads(),
        }
    }

    pub fn filters(self) -> &'static [StatusFilter] {
        match self {
            ListVariant::Own(_) => OWN_FILTERS,
            ListVariant::Review => REVIEW_FILTERS,
        }
    }

    pub fn default_filter(self) -> StatusFilter {
        match self {
            ListVariant::Own(_) => StatusFilter::All,
            ListVariant::Review => StatusFilter::Pending,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("the `{0}` tab is not offered in this view")]
pub struct FilterNotOffered(pub StatusFilter);

struct ListState {
    entries: Vec<ListedUpload>,
    filter: StatusFilter,
    loading: bool,
}

#[derive(Clone)]
pub struct UploadListView {
    backend: Backend,
    variant: ListVariant,
    notifier: Arc<dyn Notifier>,
    state: Arc<RwLock<ListState>>,
}

impl UploadListView {
    pub fn new(backend: Backend, variant: ListVariant, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            backend,
            variant,
            notifier,
            state: Arc::new(RwLock::new(ListState {
                entries: Vec::new(),
                filter: variant.default_filter(),
                loading: true,
            })),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ListState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ListState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn variant(&self) -> ListVariant {
        self.variant
    }

    /// Re-fetch every entry and hand a failure back to the caller. On
    /// failure the previous entries stay.
    pub async fn try_refresh(&self) -> BackendResult<()> {
        let fetched = fetch_listing(&self.backend, self.variant.scope()).await;
        let mut state = self.write();
        state.loading = false;
        state.entries = fetched?;
        Ok(())
    }

    /// Re-fetch every entry, reporting a failure the way this variant does.
    pub async fn refresh(&self) -> bool {
        match self.try_refresh().await {
            Ok(()) => true,
            Err(err) => {
                match self.variant {
                    ListVariant::Review => self.notifier.notify(
                        Notification::destructive("Error loading uploads")
                            .description(err.to_string()),
                    ),
                    ListVariant::Own(owner_id) => {
                        warn!(owner_id = %owner_id, error = %err, "could not load upload history")
                    }
                }
                false
            }
        }
    }

    /// True until the first fetch completes.
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    pub fn entries(&self) -> Vec<ListedUpload> {
        self.read().entries.clone()
    }

    /// Entries under the current tab.
    pub fn visible(&self) -> Vec<ListedUpload> {
        let state = self.read();
        filter_by_status(&state.entries, state.filter)
    }

    pub fn counts(&self) -> StatusCounts {
        count_by_status(&self.read().entries)
    }

    pub fn filter(&self) -> StatusFilter {
        self.read().filter
    }

    pub fn set_filter(&self, filter: StatusFilter) -> Result<(), FilterNotOffered> {
        if !self.variant.filters().contains(&filter) {
            return Err(FilterNotOffered(filter));
        }
        self.write().filter = filter;
        Ok(())
    }

    /// Review actions are offered on pending entries in the admin view only.
    pub fn can_review(&self, entry: &ListedUpload) -> bool {
        self.variant == ListVariant::Review && entry.record.status == UploadStatus::Pending
    }

    /// Fetch once, then keep re-fetching on change signals until the
    /// returned handle is dropped.
    pub async fn mount(self) -> MountedList {
        let mut changes = self.backend.changes.subscribe(self.variant.change_filter());
        self.refresh().await;

        let cancel = CancellationToken::new();
        let listener = self.clone();
        let stop = cancel.clone();
        tokio::spawn(async move {
            loop {
                let signal = tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    signal = changes.next() => signal,
                };
                match signal {
                    Some(signal) => {
                        debug!(?signal, "uploads changed, re-fetching");
                        listener.refresh().await;
                    }
                    None => break,
                }
            }
            debug!("upload list listener stopped");
        });

        MountedList { view: self, cancel }
    }
}

/// A list view with a live change listener. Dropping it stops the listener
/// and releases its subscription.
pub struct MountedList {
    view: UploadListView,
    cancel: CancellationToken,
}

impl MountedList {
    pub fn view(&self) -> &UploadListView {
        &self.view
    }
}

impl std::ops::Deref for MountedList {
    type Target = UploadListView;

    fn deref(&self) -> &Self::Target {
        &self.view
    }
}

impl Drop for MountedList {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
