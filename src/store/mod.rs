pub mod memory;

use async_trait::async_trait;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::broadcast;

use crate::shared::GameError;

/// One read-modify-write step against a keyed record.
///
/// The transform receives the record's current value (`None` when the key
/// is absent) and returns the value to commit: `Ok(Some(_))` writes,
/// `Ok(None)` deletes, `Err(_)` aborts without touching the record. A
/// backing store may invoke the transform more than once when it loses a
/// compare-and-set race, so transforms must not carry side effects.
pub type Transform<T> = Box<dyn Fn(Option<T>) -> Result<Option<T>, GameError> + Send + Sync>;

/// Keyed record store with atomic read-modify-write and change
/// subscriptions.
///
/// This is the only mutation path for shared game records: round and
/// participant state must never be written with an unconditional
/// overwrite, or concurrent bids lose updates.
#[async_trait]
pub trait AtomicStore<T>: Send + Sync
where
    T: Clone + Send + Sync + 'static,
{
    /// Reads the current value of a record, if any.
    async fn read(&self, key: &str) -> Result<Option<T>, GameError>;

    /// Atomically transforms a record, serialized against concurrent
    /// writers. Returns the committed value (`None` if the transform
    /// deleted the record).
    async fn update(&self, key: &str, transform: Transform<T>) -> Result<Option<T>, GameError>;

    /// Subscribes to a record. Every committed change delivers the full
    /// new value (`None` on deletion).
    async fn watch(&self, key: &str) -> broadcast::Receiver<Option<T>>;
}

/// Source of server-assigned timestamps.
///
/// Bid ordering and round deadlines only ever use this clock; values
/// supplied by clients are not trusted.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock implementation used by the server binary.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic tests.
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
