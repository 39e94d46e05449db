//! Outbound ports: route computation, notification delivery, audit trail.
//!
//! The engine talks to collaborators through these traits only. Route
//! computation is the one external call that can fail an operation; it always
//! happens before any persistence so a failure leaves no partial state.
//! Notifications and audit records are fire-and-forget.

use thiserror::Error;

use cargoflow_core::DomainError;
use cargoflow_events::{EventEnvelope, Notification};
use cargoflow_trips::GeoPoint;

/// Route geometry and metrics as returned by the route engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedRoute {
    pub distance_km: f64,
    pub duration_min: f64,
    pub polyline: String,
    pub start: GeoPoint,
    pub end: GeoPoint,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutePlanError {
    /// The route engine could not be reached or returned garbage.
    #[error("route engine unavailable: {0}")]
    Unavailable(String),

    /// The engine answered but found no path for this origin/destination.
    #[error("no route from {origin} to {destination}")]
    NoRoute { origin: String, destination: String },
}

impl From<RoutePlanError> for DomainError {
    fn from(error: RoutePlanError) -> Self {
        DomainError::external_service(error.to_string())
    }
}

/// Route computation collaborator.
pub trait RoutePlanner: Send + Sync {
    fn compute(&self, origin: &str, destination: &str) -> Result<ComputedRoute, RoutePlanError>;
}

/// Notification delivery. Implementations must not block the workflow and
/// must swallow their own delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Best-effort audit sink for committed domain events.
///
/// Records are published after persistence succeeds; a lost record never
/// fails or rolls back the operation that produced it.
pub trait AuditTrail: Send + Sync {
    fn record(&self, envelope: EventEnvelope);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_errors_map_to_external_service() {
        let err: DomainError = RoutePlanError::Unavailable("timeout".to_string()).into();
        assert!(matches!(err, DomainError::ExternalService(_)));
        assert!(err.is_retryable());

        let err: DomainError = RoutePlanError::NoRoute {
            origin: "Genoa".to_string(),
            destination: "Munich".to_string(),
        }
        .into();
        assert!(matches!(err, DomainError::ExternalService(_)));
    }
}
