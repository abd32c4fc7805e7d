use std::sync::Arc;

use tracing::warn;

use super::types::{APP_SENDER, EventKind, HubMessage, Notification, NotificationSink};
use crate::lib::engine::engine::ProgressObserver;
use crate::lib::engine::types::ProgressEvent;

/// Turns [`ProgressEvent`]s into hub messages.
///
/// Cheap to clone; every component that reports progress holds its own copy
/// of the same relay.
#[derive(Clone)]
pub struct ProgressRelay {
    sink: Arc<dyn NotificationSink>,
}

impl ProgressRelay {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        ProgressRelay { sink }
    }

    /// Fire-and-forget `progress` notification.
    pub fn report(&self, event: ProgressEvent) {
        self.publish(EventKind::Progress, event);
    }

    pub fn status(&self, message: impl Into<String>) {
        self.report(ProgressEvent::status(message));
    }

    pub fn publish(&self, kind: EventKind, event: ProgressEvent) {
        match serde_json::to_string(&Notification::new(kind, event)) {
            Ok(body) => self.sink.broadcast(HubMessage::new(APP_SENDER, body)),
            Err(e) => warn!(error = %e, "dropping notification that failed to serialize"),
        }
    }
}

impl ProgressObserver for ProgressRelay {
    fn report(&self, event: ProgressEvent) {
        ProgressRelay::report(self, event);
    }
}
