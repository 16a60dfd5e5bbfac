use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{AtomicStore, Transform};
use crate::shared::GameError;

const WATCH_CHANNEL_CAPACITY: usize = 100;

/// In-memory implementation of [`AtomicStore`] for development and
/// testing.
///
/// Transforms run under a single mutex, which gives the serialization
/// the trait demands; subscribers get the full committed value through a
/// per-key broadcast channel.
pub struct InMemoryStore<T> {
    records: Mutex<HashMap<String, T>>,
    watchers: RwLock<HashMap<String, broadcast::Sender<Option<T>>>>,
}

impl<T> Default for InMemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InMemoryStore<T> {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> InMemoryStore<T> {
    async fn notify(&self, key: &str, value: Option<T>) {
        let watchers = self.watchers.read().await;
        if let Some(sender) = watchers.get(key) {
            if sender.send(value).is_err() {
                debug!(key = %key, "Record changed with no watchers");
            }
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> AtomicStore<T> for InMemoryStore<T> {
    async fn read(&self, key: &str) -> Result<Option<T>, GameError> {
        let records = self.records.lock().unwrap();
        Ok(records.get(key).cloned())
    }

    async fn update(&self, key: &str, transform: Transform<T>) -> Result<Option<T>, GameError> {
        // The lock is held only for the synchronous transform body, never
        // across an await point.
        let committed = {
            let mut records = self.records.lock().unwrap();
            let current = records.get(key).cloned();
            let next = transform(current)?;
            match &next {
                Some(value) => {
                    records.insert(key.to_string(), value.clone());
                }
                None => {
                    records.remove(key);
                }
            }
            next
        };

        self.notify(key, committed.clone()).await;
        Ok(committed)
    }

    async fn watch(&self, key: &str) -> broadcast::Receiver<Option<T>> {
        let watchers = self.watchers.read().await;
        if let Some(sender) = watchers.get(key) {
            return sender.subscribe();
        }
        drop(watchers);

        let mut watchers = self.watchers.write().await;
        // Another subscriber may have created the channel in between.
        if let Some(sender) = watchers.get(key) {
            return sender.subscribe();
        }
        let (sender, receiver) = broadcast::channel(WATCH_CHANNEL_CAPACITY);
        watchers.insert(key.to_string(), sender);
        receiver
    }
}
