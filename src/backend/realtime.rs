//! In-process change notifications for the uploads table.
//!
//! Subscribers get a signal per insert/update/delete. The payload is
//! informational only: consumers re-fetch on every signal.

use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use uuid::Uuid;

pub const UPLOADS_TABLE: &str = "uploads";

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: &'static str,
    pub record_id: Uuid,
    pub owner_id: Uuid,
}

impl ChangeEvent {
    pub fn upload(kind: ChangeKind, record_id: Uuid, owner_id: Uuid) -> Self {
        Self {
            kind,
            table: UPLOADS_TABLE,
            record_id,
            owner_id,
        }
    }
}

/// Which events a subscription receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeFilter {
    pub table: &'static str,
    pub owner_id: Option<Uuid>,
}

impl ChangeFilter {
    /// Every change on the uploads table.
    pub fn uploads() -> Self {
        Self {
            table: UPLOADS_TABLE,
            owner_id: None,
        }
    }

    /// Narrow to rows owned by `owner_id`.
    pub fn owned_by(mut self, owner_id: Uuid) -> Self {
        self.owner_id = Some(owner_id);
        self
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table && self.owner_id.is_none_or(|owner| owner == event.owner_id)
    }
}

/// What a subscriber observes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSignal {
    Changed(ChangeEvent),
    /// The subscriber fell behind and missed `n` events. Treated as a single
    /// invalidation.
    Lagged(u64),
}

#[derive(Clone, Debug)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ChangeEvent) {
        debug!(
            table = event.table,
            kind = ?event.kind,
            record_id = %event.record_id,
            "publishing change"
        );
        // No subscribers is not an error.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self, filter: ChangeFilter) -> ChangeSubscription {
        ChangeSubscription {
            receiver: self.sender.subscribe(),
            filter,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription. Dropping it releases the underlying receiver.
#[derive(Debug)]
pub struct ChangeSubscription {
    receiver: broadcast::Receiver<ChangeEvent>,
    filter: ChangeFilter,
}

impl ChangeSubscription {
    /// Next matching signal, or `None` once the feed is gone.
    pub async fn next(&mut self) -> Option<ChangeSignal> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => {
                    return Some(ChangeSignal::Changed(event));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(missed)) => {
                    warn!(missed, "change subscriber lagged");
                    return Some(ChangeSignal::Lagged(missed));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = ChangeSignal> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.next().await.map(|signal| (signal, sub))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn owner_filter_skips_foreign_rows() {
        let feed = ChangeFeed::default();
        let mine = Uuid::new_v4();
        let theirs = Uuid::new_v4();
        let mut sub = feed.subscribe(ChangeFilter::uploads().owned_by(mine));

        feed.publish(ChangeEvent::upload(ChangeKind::Insert, Uuid::new_v4(), theirs));
        let own = ChangeEvent::upload(ChangeKind::Update, Uuid::new_v4(), mine);
        feed.publish(own.clone());

        assert_eq!(sub.next().await, Some(ChangeSignal::Changed(own)));
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_one_invalidation() {
        let feed = ChangeFeed::new(2);
        let owner = Uuid::new_v4();
        let mut sub = feed.subscribe(ChangeFilter::uploads());

        for _ in 0..5 {
            feed.publish(ChangeEvent::upload(ChangeKind::Insert, Uuid::new_v4(), owner));
        }

        assert!(matches!(sub.next().await, Some(ChangeSignal::Lagged(3))));
    }

    #[tokio::test]
    async fn dropping_subscription_releases_receiver() {
        let feed = ChangeFeed::default();
        let sub = feed.subscribe(ChangeFilter::uploads());
        assert_eq!(feed.subscriber_count(), 1);
        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
