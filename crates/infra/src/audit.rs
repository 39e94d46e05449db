//! Audit trail adapter over the event bus.

use std::sync::Arc;

use tracing::warn;

use cargoflow_events::{EventBus, EventEnvelope, InMemoryEventBus};
use cargoflow_workflow::AuditTrail;

/// Fans committed event envelopes out onto a bus. Best-effort: a failed
/// publish is logged and dropped.
pub struct BusAuditTrail {
    bus: Arc<InMemoryEventBus<EventEnvelope>>,
}

impl BusAuditTrail {
    pub fn new(bus: Arc<InMemoryEventBus<EventEnvelope>>) -> Self {
        Self { bus }
    }
}

impl AuditTrail for BusAuditTrail {
    fn record(&self, envelope: EventEnvelope) {
        let event_type = envelope.event_type().to_string();
        if let Err(error) = self.bus.publish(envelope) {
            warn!(?error, event_type, "audit record dropped");
        }
    }
}
