//! Live, filtered mirror of the signed-in user's appointments.

use crate::errors::SyncError;
use crate::filter;
use crate::models::{FilterWindow, Record};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Source of the reference day used by the time windows.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Receives every recomputed list and every surfaced error.
pub trait RenderSink {
    fn on_records_updated(&mut self, records: &[Record]);
    fn on_error(&mut self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncState {
    /// No owner and no data.
    Uninitialized,
    /// Subscribed, waiting for the first snapshot.
    Syncing,
    /// At least one snapshot applied.
    Ready,
}

/// Holds the last snapshot delivered for one owner plus the active filter,
/// and pushes the visible list to its [`RenderSink`] whenever either changes.
///
/// The held set is only ever replaced wholesale, so duplicate or reordered
/// deliveries converge on whichever snapshot arrived last.
pub struct RecordStore<R, C = LocalClock> {
    owner_id: Option<String>,
    held: Vec<Record>,
    visible: Vec<Record>,
    filter: FilterWindow,
    state: SyncState,
    last_error: Option<String>,
    renderer: R,
    clock: C,
}

impl<R: RenderSink, C: Clock> RecordStore<R, C> {
    pub fn new(renderer: R, clock: C) -> Self {
        Self {
            owner_id: None,
            held: Vec::new(),
            visible: Vec::new(),
            filter: FilterWindow::default(),
            state: SyncState::Uninitialized,
            last_error: None,
            renderer,
            clock,
        }
    }

    /// Marks a subscription for `owner_id` as active.
    ///
    /// Switching owners drops everything held for the previous one first.
    /// Re-subscribing for the current owner keeps the last good data.
    pub fn begin_sync(&mut self, owner_id: impl Into<String>) {
        let owner_id = owner_id.into();
        if self.owner_id.as_deref() == Some(owner_id.as_str()) && self.state == SyncState::Ready {
            return;
        }
        if self.owner_id.is_some() {
            self.reset();
        }
        debug!(owner_id = %owner_id, "record sync started");
        self.owner_id = Some(owner_id);
        self.state = SyncState::Syncing;
    }

    pub fn apply_snapshot(&mut self, records: Vec<Record>) {
        let received = records.len();
        let records = match self.owner_id.as_deref() {
            Some(owner_id) => {
                let (own, foreign): (Vec<Record>, Vec<Record>) = records
                    .into_iter()
                    .partition(|record| record.owner_id == owner_id);
                if !foreign.is_empty() {
                    warn!(
                        owner_id,
                        dropped = foreign.len(),
                        "snapshot contained records of another owner"
                    );
                }
                own
            }
            None => records,
        };

        let malformed: Vec<SyncError> = records
            .iter()
            .filter_map(|record| filter::record_date(record).err())
            .collect();
        if let Some(first) = malformed.first() {
            warn!(count = malformed.len(), "{first}; hidden outside the 'all' filter");
        }

        debug!(received, kept = records.len(), "snapshot applied");
        self.held = records;
        self.state = SyncState::Ready;
        self.last_error = None;
        self.recompute();
    }

    pub fn set_filter(&mut self, window: FilterWindow) {
        self.filter = window;
        self.recompute();
    }

    /// Forgets the owner and everything held for them. The filter is kept.
    pub fn reset(&mut self) {
        self.owner_id = None;
        self.held.clear();
        self.visible.clear();
        self.last_error = None;
        self.state = SyncState::Uninitialized;
        self.renderer.on_records_updated(&self.visible);
    }

    /// Surfaces a delivery problem without touching held or visible data.
    pub fn report_error(&mut self, err: &SyncError) {
        let message = err.to_string();
        warn!(error = %message, "record sync error");
        self.renderer.on_error(&message);
        self.last_error = Some(message);
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn filter(&self) -> FilterWindow {
        self.filter
    }

    pub fn owner_id(&self) -> Option<&str> {
        self.owner_id.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn held(&self) -> &[Record] {
        &self.held
    }

    pub fn visible(&self) -> &[Record] {
        &self.visible
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    fn recompute(&mut self) {
        let mut visible = filter::apply(self.clock.today(), self.filter, &self.held);
        // Stable: equal dates keep snapshot order, undated records go last.
        visible.sort_by_cached_key(|record| match filter::parse_date(&record.date) {
            Some(date) => (0u8, date),
            None => (1u8, NaiveDate::MIN),
        });
        self.visible = visible;
        self.renderer.on_records_updated(&self.visible);
    }
}
