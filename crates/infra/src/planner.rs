//! Route planner adapters.
//!
//! The real engine sits behind HTTP in production deployments; these two
//! implementations cover dev and test wiring.

use std::sync::atomic::{AtomicUsize, Ordering};

use cargoflow_trips::GeoPoint;
use cargoflow_workflow::{ComputedRoute, RoutePlanError, RoutePlanner};

/// Deterministic planner: always returns the configured metrics.
///
/// The polyline embeds a call counter so successive computations for the same
/// trip produce distinguishable routes.
#[derive(Debug)]
pub struct StaticRoutePlanner {
    distance_km: f64,
    duration_min: f64,
    calls: AtomicUsize,
}

impl StaticRoutePlanner {
    pub fn new(distance_km: f64, duration_min: f64) -> Self {
        Self {
            distance_km,
            duration_min,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for StaticRoutePlanner {
    fn default() -> Self {
        Self::new(620.0, 540.0)
    }
}

impl RoutePlanner for StaticRoutePlanner {
    fn compute(&self, origin: &str, destination: &str) -> Result<ComputedRoute, RoutePlanError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ComputedRoute {
            distance_km: self.distance_km,
            duration_min: self.duration_min,
            polyline: format!("sim:{origin}:{destination}:{call}"),
            start: GeoPoint { lat: 44.4, lon: 8.9 },
            end: GeoPoint {
                lat: 48.1,
                lon: 11.6,
            },
        })
    }
}

/// Planner that always fails, for exercising the no-partial-state paths.
#[derive(Debug, Default)]
pub struct FailingRoutePlanner;

impl RoutePlanner for FailingRoutePlanner {
    fn compute(&self, _origin: &str, _destination: &str) -> Result<ComputedRoute, RoutePlanError> {
        Err(RoutePlanError::Unavailable(
            "simulated outage".to_string(),
        ))
    }
}
