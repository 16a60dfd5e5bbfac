use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::events::RoomEvent;

const CHANNEL_CAPACITY: usize = 100;

/// Event bus for distributing events throughout the application
#[derive(Debug, Clone)]
pub struct EventBus {
    /// Per-channel event senders: room code (or party channel) -> sender
    channels: Arc<RwLock<HashMap<String, broadcast::Sender<RoomEvent>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    /// Creates a new event bus
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Emits an event to all subscribers of its channel
    pub async fn emit(&self, event: RoomEvent) {
        let channel = event.channel().to_string();
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(&channel) {
            match sender.send(event) {
                Ok(receiver_count) => {
                    debug!(
                        channel = %channel,
                        receivers = receiver_count,
                        "Event emitted"
                    );
                }
                Err(_) => {
                    debug!(channel = %channel, "Event emitted with no receivers");
                }
            }
        } else {
            debug!(channel = %channel, "No channel found - creating one");
            drop(channels);

            // Create the channel if it doesn't exist
            let mut channels = self.channels.write().await;
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            channels.insert(channel.clone(), sender.clone());

            // Try to send again
            if sender.send(event).is_err() {
                debug!(channel = %channel, "Event sent to new channel with no receivers");
            }
        }
    }

    /// Subscribe to events for a specific channel
    pub async fn subscribe(&self, channel: &str) -> broadcast::Receiver<RoomEvent> {
        let channels = self.channels.read().await;

        if let Some(sender) = channels.get(channel) {
            sender.subscribe()
        } else {
            debug!(channel = %channel, "Creating new channel for subscription");
            drop(channels);

            // Create the channel if it doesn't exist
            let mut channels = self.channels.write().await;
            let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
            let receiver = sender.subscribe();
            channels.insert(channel.to_string(), sender);
            receiver
        }
    }
}
