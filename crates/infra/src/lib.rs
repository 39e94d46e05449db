//! Infrastructure layer: storage, route planner adapters, notification and
//! audit fan-out.
//!
//! Everything here is in-memory; production deployments swap these for real
//! adapters behind the same traits.

pub mod audit;
pub mod integration_tests;
pub mod memory;
pub mod notifier;
pub mod planner;

pub use audit::BusAuditTrail;
pub use memory::InMemoryStore;
pub use notifier::{BusNotifier, RecordingNotifier};
pub use planner::{FailingRoutePlanner, StaticRoutePlanner};
