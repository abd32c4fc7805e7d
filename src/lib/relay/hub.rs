use tokio::sync::broadcast;
use tracing::trace;

use super::types::{HubMessage, NotificationSink};

/// In-process fan-out to every connected realtime client.
///
/// Each subscriber owns a receiver; a subscriber that falls more than the
/// channel capacity behind loses the oldest messages instead of slowing
/// publishers down.
#[derive(Debug, Clone)]
pub struct BroadcastHub {
    tx: broadcast::Sender<HubMessage>,
}

impl BroadcastHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        BroadcastHub { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl NotificationSink for BroadcastHub {
    fn broadcast(&self, message: HubMessage) {
        // Err only means nobody is listening right now.
        if self.tx.send(message).is_err() {
            trace!("hub message dropped, no subscribers");
        }
    }
}
