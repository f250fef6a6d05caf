//! Session lifecycle: who is signed in, and the subscription that goes with it.

use crate::store::{Clock, RecordStore, RenderSink};
use crate::sync::{RecordSource, SubscriptionId, pump};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::info;

struct ActiveSession {
    owner_id: String,
    subscription: SubscriptionId,
    pump: JoinHandle<()>,
}

/// Wires a signed-in owner to a [`RecordSource`] subscription feeding the
/// shared [`RecordStore`], and tears both down on sign-out.
pub struct SessionManager<R, C> {
    source: Arc<dyn RecordSource>,
    store: Arc<Mutex<RecordStore<R, C>>>,
    active: Mutex<Option<ActiveSession>>,
}

impl<R, C> SessionManager<R, C>
where
    R: RenderSink + Send + 'static,
    C: Clock + Send + 'static,
{
    pub fn new(source: Arc<dyn RecordSource>, store: Arc<Mutex<RecordStore<R, C>>>) -> Self {
        Self {
            source,
            store,
            active: Mutex::new(None),
        }
    }

    pub async fn current_owner_id(&self) -> Option<String> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|session| session.owner_id.clone())
    }

    /// Signs `owner_id` in, ending any previous session first.
    pub async fn sign_in(&self, owner_id: &str) {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            self.end(previous).await;
        }

        self.store.lock().await.begin_sync(owner_id);
        let subscription = self.source.subscribe(owner_id);
        let id = subscription.id;
        let pump = tokio::spawn(pump(subscription, Arc::clone(&self.store)));

        *active = Some(ActiveSession {
            owner_id: owner_id.to_string(),
            subscription: id,
            pump,
        });
        info!(owner_id, "signed in");
    }

    /// Returns false when nobody was signed in.
    pub async fn sign_out(&self) -> bool {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(session) => {
                let owner_id = session.owner_id.clone();
                self.end(session).await;
                info!(owner_id = %owner_id, "signed out");
                true
            }
            None => false,
        }
    }

    async fn end(&self, session: ActiveSession) {
        session.pump.abort();
        self.source.unsubscribe(session.subscription);
        self.store.lock().await.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewAppointment, Record};
    use crate::store::{FixedClock, SyncState};
    use crate::sync::Collection;
    use chrono::NaiveDate;
    use std::time::Duration;

    #[derive(Default)]
    struct LastList {
        ids: Vec<String>,
    }

    impl RenderSink for LastList {
        fn on_records_updated(&mut self, records: &[Record]) {
            self.ids = records.iter().map(|r| r.id.clone()).collect();
        }

        fn on_error(&mut self, _message: &str) {}
    }

    type Store = Arc<Mutex<RecordStore<LastList, FixedClock>>>;

    fn setup() -> (Arc<Collection>, Store, SessionManager<LastList, FixedClock>) {
        let collection = Arc::new(Collection::new(Vec::new()));
        let today = NaiveDate::from_ymd_opt(2024, 3, 10).unwrap();
        let store = Arc::new(Mutex::new(RecordStore::new(LastList::default(), FixedClock(today))));
        let source: Arc<dyn RecordSource> = collection.clone();
        let session = SessionManager::new(source, Arc::clone(&store));
        (collection, store, session)
    }

    fn draft(title: &str) -> NewAppointment {
        NewAppointment {
            title: title.to_string(),
            date: "2024-03-10".to_string(),
            time: String::new(),
            location: String::new(),
            notes: String::new(),
            reminder_enabled: false,
        }
    }

    async fn wait_for(store: &Store, expected: &[&str]) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            {
                let store = store.lock().await;
                if store.state() == SyncState::Ready && store.renderer().ids == expected {
                    return;
                }
            }
            assert!(tokio::time::Instant::now() < deadline, "store never showed {expected:?}");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn sign_in_syncs_the_owner() {
        let (collection, store, session) = setup();
        let first = collection.insert("alice", draft("a"), "t".to_string());

        session.sign_in("alice").await;
        assert_eq!(session.current_owner_id().await.as_deref(), Some("alice"));
        wait_for(&store, &[first.id.as_str()]).await;

        let second = collection.insert("alice", draft("b"), "t".to_string());
        wait_for(&store, &[first.id.as_str(), second.id.as_str()]).await;
    }

    #[tokio::test]
    async fn sign_out_resets_and_unsubscribes() {
        let (collection, store, session) = setup();
        let record = collection.insert("alice", draft("a"), "t".to_string());
        session.sign_in("alice").await;
        wait_for(&store, &[record.id.as_str()]).await;

        assert!(session.sign_out().await);
        assert!(!session.sign_out().await);
        assert_eq!(collection.subscription_count(), 0);
        assert_eq!(session.current_owner_id().await, None);

        let store = store.lock().await;
        assert_eq!(store.state(), SyncState::Uninitialized);
        assert!(store.visible().is_empty());
        assert!(store.renderer().ids.is_empty());
    }

    #[tokio::test]
    async fn switching_owner_never_shows_previous_records() {
        let (collection, store, session) = setup();
        let alice = collection.insert("alice", draft("a"), "t".to_string());
        let bob = collection.insert("bob", draft("b"), "t".to_string());

        session.sign_in("alice").await;
        wait_for(&store, &[alice.id.as_str()]).await;

        session.sign_in("bob").await;
        wait_for(&store, &[bob.id.as_str()]).await;
        assert_eq!(collection.subscription_count(), 1);

        collection.insert("alice", draft("c"), "t".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        let store = store.lock().await;
        assert!(store.held().iter().all(|r| r.owner_id == "bob"));
    }
}
