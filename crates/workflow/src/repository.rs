//! Repository traits (current-state storage).
//!
//! Repositories hold the latest snapshot of each aggregate. `save` takes the
//! version the caller loaded (wrapped in [`ExpectedVersion`]) and must reject
//! the write with `DomainError::Conflict` when the stored version differs; a
//! missing row counts as version 0.

use cargoflow_core::{DomainResult, ExpectedVersion, UserId};
use cargoflow_fleet::{Driver, DriverId, DriverStatus, Vehicle, VehicleId, VehicleStatus};
use cargoflow_requests::{RequestId, RequestStatus, TransportRequest};
use cargoflow_trips::{RoadEvent, RoadEventId, Route, RouteId, Trip, TripId, TripStatus};

pub trait RequestRepository: Send + Sync {
    fn find_by_id(&self, id: RequestId) -> DomainResult<Option<TransportRequest>>;

    fn save(&self, request: &TransportRequest, expected: ExpectedVersion) -> DomainResult<()>;

    fn find_by_status(&self, status: RequestStatus) -> DomainResult<Vec<TransportRequest>>;

    fn find_by_client(&self, client_id: UserId) -> DomainResult<Vec<TransportRequest>>;
}

pub trait TripRepository: Send + Sync {
    fn find_by_id(&self, id: TripId) -> DomainResult<Option<Trip>>;

    fn save(&self, trip: &Trip, expected: ExpectedVersion) -> DomainResult<()>;

    fn find_by_status(&self, status: TripStatus) -> DomainResult<Vec<Trip>>;

    /// Trips are one-to-one with requests.
    fn find_by_request(&self, request_id: RequestId) -> DomainResult<Option<Trip>>;
}

/// Routes are plain entities (write-once plus the `superseded` flag), so no
/// version check applies; `save` upserts.
pub trait RouteRepository: Send + Sync {
    fn find_by_id(&self, id: RouteId) -> DomainResult<Option<Route>>;

    fn save(&self, route: &Route) -> DomainResult<()>;

    fn find_by_trip(&self, trip_id: TripId) -> DomainResult<Vec<Route>>;
}

pub trait DriverRepository: Send + Sync {
    fn find_by_id(&self, id: DriverId) -> DomainResult<Option<Driver>>;

    fn save(&self, driver: &Driver, expected: ExpectedVersion) -> DomainResult<()>;

    fn find_by_status(&self, status: DriverStatus) -> DomainResult<Vec<Driver>>;
}

pub trait VehicleRepository: Send + Sync {
    fn find_by_id(&self, id: VehicleId) -> DomainResult<Option<Vehicle>>;

    fn save(&self, vehicle: &Vehicle, expected: ExpectedVersion) -> DomainResult<()>;

    fn find_by_status(&self, status: VehicleStatus) -> DomainResult<Vec<Vehicle>>;
}

/// Road events are advisory records; `save` upserts.
pub trait RoadEventRepository: Send + Sync {
    fn find_by_id(&self, id: RoadEventId) -> DomainResult<Option<RoadEvent>>;

    fn save(&self, event: &RoadEvent) -> DomainResult<()>;

    fn find_active(&self) -> DomainResult<Vec<RoadEvent>>;
}
