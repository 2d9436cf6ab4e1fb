//! Per-subscriber fan-out of snapshots and events.
//!
//! Each subscriber owns a bounded mailbox. Publishing never blocks: when a
//! mailbox is full its oldest record is discarded and the subscriber's drop
//! counter goes up. A slow subscriber only ever loses its own records.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use subbrawl_core::events::EventEnvelope;
use subbrawl_core::state::WorldSnapshot;
use subbrawl_core::types::AccountId;
use subbrawl_sim::TickReport;

/// Who a subscription streams for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Audience {
    /// Snapshots scoped to the account and the events addressed to it.
    Account { account: AccountId },
    /// Full snapshots and every event.
    Observer,
}

impl Audience {
    pub fn sees(&self, event: &EventEnvelope) -> bool {
        match self {
            Audience::Account { account } => event.is_for(*account),
            Audience::Observer => true,
        }
    }
}

/// One record on a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamRecord {
    Snapshot(WorldSnapshot),
    Event(EventEnvelope),
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Mailbox {
    queue: Mutex<VecDeque<Arc<StreamRecord>>>,
    capacity: usize,
    dropped: AtomicU64,
    closed: AtomicBool,
    notify: Notify,
}

impl Mailbox {
    fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    fn push(&self, record: Arc<StreamRecord>) {
        {
            let mut queue = lock(&self.queue);
            if queue.len() >= self.capacity {
                queue.pop_front();
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
            queue.push_back(record);
        }
        self.notify.notify_one();
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_one();
    }
}

#[derive(Default)]
struct Registry {
    next_id: AtomicU64,
    /// Set once by `close`, under the subscribers lock.
    closed: AtomicBool,
    subscribers: Mutex<BTreeMap<u64, (Audience, Arc<Mailbox>)>>,
}

/// Registry of live subscriptions. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber with a mailbox of `capacity` records.
    ///
    /// After `close` the subscription comes back already ended.
    pub fn subscribe(&self, audience: Audience, capacity: usize) -> Subscription {
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let mailbox = Arc::new(Mailbox::new(capacity));
        {
            let mut subscribers = lock(&self.registry.subscribers);
            if self.registry.closed.load(Ordering::Acquire) {
                mailbox.close();
                debug!(subscriber = id, ?audience, "subscribed after close");
            } else {
                subscribers.insert(id, (audience, Arc::clone(&mailbox)));
                debug!(subscriber = id, ?audience, "subscriber registered");
            }
        }
        Subscription {
            id,
            audience,
            mailbox,
            registry: Arc::downgrade(&self.registry),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry.subscribers).len()
    }

    /// Fan one tick out to every subscriber: the snapshot first when the
    /// tick falls on `snapshot_interval`, then the events in emission order.
    pub fn publish(&self, report: &TickReport, snapshot_interval: u64) {
        let with_snapshot = report.snapshot.time.tick % snapshot_interval.max(1) == 0;
        let full = with_snapshot.then(|| Arc::new(StreamRecord::Snapshot(report.snapshot.clone())));
        let events: Vec<(&EventEnvelope, Arc<StreamRecord>)> = report
            .events
            .iter()
            .map(|e| (e, Arc::new(StreamRecord::Event(e.clone()))))
            .collect();

        let subscribers = lock(&self.registry.subscribers);
        for (audience, mailbox) in subscribers.values() {
            if let Some(full) = &full {
                let record = match audience {
                    Audience::Observer => Arc::clone(full),
                    Audience::Account { account } => Arc::new(StreamRecord::Snapshot(
                        report.snapshot.scoped_to(*account),
                    )),
                };
                mailbox.push(record);
            }
            for (envelope, record) in &events {
                if audience.sees(envelope) {
                    mailbox.push(Arc::clone(record));
                }
            }
        }
    }

    /// End every stream. Subscribers still receive what is already queued.
    pub fn close(&self) {
        let mut subscribers = lock(&self.registry.subscribers);
        self.registry.closed.store(true, Ordering::Release);
        for (_, mailbox) in subscribers.values() {
            mailbox.close();
        }
        subscribers.clear();
    }
}

/// Receiving end of one stream. Dropping it deregisters the subscriber.
pub struct Subscription {
    id: u64,
    audience: Audience,
    mailbox: Arc<Mailbox>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn audience(&self) -> Audience {
        self.audience
    }

    /// Next record, waiting if none is queued. `None` once the stream has
    /// ended and the mailbox is empty.
    pub async fn recv(&mut self) -> Option<Arc<StreamRecord>> {
        loop {
            if let Some(record) = self.try_recv() {
                return Some(record);
            }
            if self.mailbox.closed.load(Ordering::Acquire) {
                return None;
            }
            self.mailbox.notify.notified().await;
        }
    }

    pub fn try_recv(&mut self) -> Option<Arc<StreamRecord>> {
        lock(&self.mailbox.queue).pop_front()
    }

    /// Records discarded because this subscriber fell behind.
    pub fn dropped(&self) -> u64 {
        self.mailbox.dropped.load(Ordering::Relaxed)
    }

    pub fn pending(&self) -> usize {
        lock(&self.mailbox.queue).len()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry.subscribers).remove(&self.id);
            debug!(subscriber = self.id, "subscriber deregistered");
        }
    }
}
