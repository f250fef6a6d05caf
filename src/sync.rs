//! Snapshot subscriptions over the appointment collection.

use crate::errors::SyncError;
use crate::models::{NewAppointment, Record};
use crate::storage::next_id;
use crate::store::{Clock, RecordStore, RenderSink};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotEvent {
    /// Every record of the subscribed owner, ascending by date.
    Snapshot(Vec<Record>),
    Error(String),
}

/// Receiving end of a subscription.
pub struct Subscription {
    pub id: SubscriptionId,
    pub owner_id: String,
    receiver: mpsc::UnboundedReceiver<SnapshotEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<SnapshotEvent> {
        self.receiver.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Option<SnapshotEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Persistence-side collaborator that streams full snapshots per owner.
pub trait RecordSource: Send + Sync {
    /// Starts a subscription. The current snapshot is delivered immediately.
    fn subscribe(&self, owner_id: &str) -> Subscription;
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Subscriber {
    owner_id: String,
    sender: mpsc::UnboundedSender<SnapshotEvent>,
}

/// In-process appointment collection for every owner.
///
/// Writes republish the affected owner's snapshot while the write lock is
/// still held, so subscribers never observe snapshots out of write order.
pub struct Collection {
    records: RwLock<Vec<Record>>,
    subscribers: RwLock<HashMap<SubscriptionId, Subscriber>>,
    next_subscription: AtomicU64,
}

impl Collection {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records: RwLock::new(records),
            subscribers: RwLock::new(HashMap::new()),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// All records of all owners, in storage order.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    pub fn snapshot(&self, owner_id: &str) -> Vec<Record> {
        owner_snapshot(&self.records.read(), owner_id)
    }

    /// The collection as it would look with `draft` added. Nothing changes
    /// until the result is passed to [`Collection::replace`].
    pub fn with_inserted(
        &self,
        owner_id: &str,
        draft: NewAppointment,
        created_at: String,
    ) -> (Record, Vec<Record>) {
        let mut records = self.records();
        let record = Record {
            id: next_id("apt", records.iter().map(|r| r.id.as_str())),
            owner_id: owner_id.to_string(),
            date: draft.date,
            time: draft.time,
            title: draft.title,
            location: draft.location,
            notes: draft.notes,
            reminder_enabled: draft.reminder_enabled,
            created_at: Some(created_at),
        };
        records.push(record.clone());
        (record, records)
    }

    /// The collection as it would look without `id`, or `None` when
    /// `owner_id` has no such record.
    pub fn without(&self, owner_id: &str, id: &str) -> Option<Vec<Record>> {
        let mut records = self.records();
        let index = records
            .iter()
            .position(|record| record.id == id && record.owner_id == owner_id)?;
        records.remove(index);
        Some(records)
    }

    /// Swaps in a prepared collection and republishes `owner_id`'s snapshot.
    ///
    /// Callers serialize prepare/replace pairs; the snapshot is sent under
    /// the write lock so subscribers see writes in order.
    pub fn replace(&self, owner_id: &str, next: Vec<Record>) {
        let mut records = self.records.write();
        *records = next;
        self.publish(&records, owner_id);
    }

    #[cfg(test)]
    pub(crate) fn insert(
        &self,
        owner_id: &str,
        draft: NewAppointment,
        created_at: String,
    ) -> Record {
        let (record, next) = self.with_inserted(owner_id, draft, created_at);
        self.replace(owner_id, next);
        record
    }

    #[cfg(test)]
    pub(crate) fn remove(&self, owner_id: &str, id: &str) -> Option<Record> {
        let removed = self.snapshot(owner_id).into_iter().find(|record| record.id == id)?;
        let next = self.without(owner_id, id)?;
        self.replace(owner_id, next);
        Some(removed)
    }

    /// Tells the owner's subscribers that a delivery failed.
    pub fn publish_error(&self, owner_id: &str, message: impl Into<String>) {
        let event = SnapshotEvent::Error(message.into());
        self.send(owner_id, || event.clone());
    }

    #[cfg(test)]
    pub(crate) fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    fn publish(&self, records: &[Record], owner_id: &str) {
        let snapshot = owner_snapshot(records, owner_id);
        self.send(owner_id, || SnapshotEvent::Snapshot(snapshot.clone()));
    }

    fn send<F>(&self, owner_id: &str, event: F)
    where
        F: Fn() -> SnapshotEvent,
    {
        let mut closed = Vec::new();
        {
            let subscribers = self.subscribers.read();
            for (id, subscriber) in subscribers.iter() {
                if subscriber.owner_id == owner_id && subscriber.sender.send(event()).is_err() {
                    closed.push(*id);
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in closed {
                subscribers.remove(&id);
                debug!(subscription = id.0, "pruned closed subscription");
            }
        }
    }
}

impl RecordSource for Collection {
    fn subscribe(&self, owner_id: &str) -> Subscription {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::unbounded_channel();

        // Register and send under the read lock so no write slips in between.
        let records = self.records.read();
        let _ = sender.send(SnapshotEvent::Snapshot(owner_snapshot(&records, owner_id)));
        self.subscribers.write().insert(
            id,
            Subscriber {
                owner_id: owner_id.to_string(),
                sender,
            },
        );
        drop(records);

        debug!(subscription = id.0, owner_id, "subscribed");
        Subscription {
            id,
            owner_id: owner_id.to_string(),
            receiver,
        }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.write().remove(&id).is_some() {
            debug!(subscription = id.0, "unsubscribed");
        }
    }
}

/// The owner's records sorted ascending by their raw date string.
fn owner_snapshot(records: &[Record], owner_id: &str) -> Vec<Record> {
    let mut snapshot: Vec<Record> = records
        .iter()
        .filter(|record| record.owner_id == owner_id)
        .cloned()
        .collect();
    snapshot.sort_by(|a, b| a.date.cmp(&b.date));
    snapshot
}

/// Feeds a subscription into a shared store until the subscription closes
/// or the store is handed to another owner.
pub async fn pump<R, C>(mut subscription: Subscription, store: Arc<Mutex<RecordStore<R, C>>>)
where
    R: RenderSink,
    C: Clock,
{
    while let Some(event) = subscription.recv().await {
        let mut store = store.lock().await;
        if store.owner_id() != Some(subscription.owner_id.as_str()) {
            debug!(subscription = subscription.id.0, "store no longer owned by subscriber");
            return;
        }
        match event {
            SnapshotEvent::Snapshot(records) => store.apply_snapshot(records),
            SnapshotEvent::Error(message) => store.report_error(&SyncError::Delivery(message)),
        }
    }
    debug!(subscription = subscription.id.0, "subscription closed");
}
