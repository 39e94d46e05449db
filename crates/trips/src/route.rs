//! Externally computed route geometry/metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{AggregateId, Entity, ValueObject};

use crate::trip::TripId;

/// Route identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteId(pub AggregateId);

impl RouteId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RouteId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl ValueObject for GeoPoint {}

/// A computed path between a trip's origin and destination.
///
/// Routes are write-once: the route engine computes one, the workflow persists
/// it, and a rejected route is marked `superseded` (kept for audit) while a
/// fresh row takes its place as the trip's current route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    id: RouteId,
    trip_id: TripId,
    distance_km: f64,
    duration_min: f64,
    polyline: String,
    start: GeoPoint,
    end: GeoPoint,
    computed_at: DateTime<Utc>,
    superseded: bool,
}

impl Route {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RouteId,
        trip_id: TripId,
        distance_km: f64,
        duration_min: f64,
        polyline: impl Into<String>,
        start: GeoPoint,
        end: GeoPoint,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            trip_id,
            distance_km,
            duration_min,
            polyline: polyline.into(),
            start,
            end,
            computed_at,
            superseded: false,
        }
    }

    pub fn id_typed(&self) -> RouteId {
        self.id
    }

    pub fn trip_id(&self) -> TripId {
        self.trip_id
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn duration_min(&self) -> f64 {
        self.duration_min
    }

    pub fn polyline(&self) -> &str {
        &self.polyline
    }

    pub fn start(&self) -> GeoPoint {
        self.start
    }

    pub fn end(&self) -> GeoPoint {
        self.end
    }

    pub fn computed_at(&self) -> DateTime<Utc> {
        self.computed_at
    }

    pub fn is_superseded(&self) -> bool {
        self.superseded
    }

    /// Retire this route after a rejection; the row stays for audit.
    pub fn mark_superseded(&mut self) {
        self.superseded = true;
    }
}

impl Entity for Route {
    type Id = RouteId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
