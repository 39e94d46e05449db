//! `cargoflow-events` — domain event mechanics.
//!
//! Event contract, type-erased envelopes for the audit trail, and the pub/sub
//! bus abstraction used for notifications and audit fan-out.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod notification;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use notification::{Notification, NotificationKind};
