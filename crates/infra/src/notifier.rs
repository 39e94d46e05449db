//! Notification delivery adapters.

use std::sync::{Arc, Mutex};

use tracing::warn;

use cargoflow_events::{EventBus, InMemoryEventBus, Notification};
use cargoflow_workflow::Notifier;

/// Publishes notifications onto a bus; delivery failures are logged and
/// swallowed, never surfaced to the workflow.
pub struct BusNotifier {
    bus: Arc<InMemoryEventBus<Notification>>,
}

impl BusNotifier {
    pub fn new(bus: Arc<InMemoryEventBus<Notification>>) -> Self {
        Self { bus }
    }
}

impl Notifier for BusNotifier {
    fn notify(&self, notification: Notification) {
        if let Err(error) = self.bus.publish(notification) {
            warn!(?error, "notification dropped");
        }
    }
}

/// Collects notifications in memory for assertions.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification);
        }
    }
}
