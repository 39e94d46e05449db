//! In-memory repositories.
//!
//! One store backs every repository trait; each map is guarded by its own
//! `RwLock`. Saves enforce the caller's [`ExpectedVersion`] against the
//! stored snapshot (a missing row counts as version 0), which is where stale
//! writes turn into `DomainError::Conflict`. The store is also the
//! `UnitOfWork`: a commit locks every map, checks every staged version, and
//! only then writes, so a conflicted operation stores nothing.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use cargoflow_core::{AggregateRoot, DomainError, DomainResult, ExpectedVersion, UserId};
use cargoflow_fleet::{Driver, DriverId, DriverStatus, Vehicle, VehicleId, VehicleStatus};
use cargoflow_requests::{RequestId, RequestStatus, TransportRequest};
use cargoflow_trips::{RoadEvent, RoadEventId, Route, RouteId, Trip, TripId, TripStatus};
use cargoflow_workflow::{
    Commit, DriverRepository, RequestRepository, RoadEventRepository, RouteRepository,
    TripRepository, UnitOfWork, VehicleRepository,
};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    requests: RwLock<HashMap<RequestId, TransportRequest>>,
    trips: RwLock<HashMap<TripId, Trip>>,
    routes: RwLock<HashMap<RouteId, Route>>,
    drivers: RwLock<HashMap<DriverId, Driver>>,
    vehicles: RwLock<HashMap<VehicleId, Vehicle>>,
    road_events: RwLock<HashMap<RoadEventId, RoadEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn read<T>(lock: &RwLock<T>) -> DomainResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|_| DomainError::external_service("storage lock poisoned"))
}

fn write<T>(lock: &RwLock<T>) -> DomainResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|_| DomainError::external_service("storage lock poisoned"))
}

fn check_version<A: AggregateRoot>(
    map: &HashMap<A::Id, A>,
    id: &A::Id,
    expected: ExpectedVersion,
) -> DomainResult<()> {
    let current = map.get(id).map_or(0, AggregateRoot::version);
    expected.check(current)
}

impl RequestRepository for InMemoryStore {
    fn find_by_id(&self, id: RequestId) -> DomainResult<Option<TransportRequest>> {
        Ok(read(&self.requests)?.get(&id).cloned())
    }

    fn save(&self, request: &TransportRequest, expected: ExpectedVersion) -> DomainResult<()> {
        let mut map = write(&self.requests)?;
        check_version(&map, &request.id_typed(), expected)?;
        map.insert(request.id_typed(), request.clone());
        Ok(())
    }

    fn find_by_status(&self, status: RequestStatus) -> DomainResult<Vec<TransportRequest>> {
        Ok(read(&self.requests)?
            .values()
            .filter(|r| r.status() == status)
            .cloned()
            .collect())
    }

    fn find_by_client(&self, client_id: UserId) -> DomainResult<Vec<TransportRequest>> {
        Ok(read(&self.requests)?
            .values()
            .filter(|r| r.client_id() == Some(client_id))
            .cloned()
            .collect())
    }
}

impl TripRepository for InMemoryStore {
    fn find_by_id(&self, id: TripId) -> DomainResult<Option<Trip>> {
        Ok(read(&self.trips)?.get(&id).cloned())
    }

    fn save(&self, trip: &Trip, expected: ExpectedVersion) -> DomainResult<()> {
        let mut map = write(&self.trips)?;
        check_version(&map, &trip.id_typed(), expected)?;
        map.insert(trip.id_typed(), trip.clone());
        Ok(())
    }

    fn find_by_status(&self, status: TripStatus) -> DomainResult<Vec<Trip>> {
        Ok(read(&self.trips)?
            .values()
            .filter(|t| t.status() == status)
            .cloned()
            .collect())
    }

    fn find_by_request(&self, request_id: RequestId) -> DomainResult<Option<Trip>> {
        Ok(read(&self.trips)?
            .values()
            .find(|t| t.request_id() == Some(request_id))
            .cloned())
    }
}

impl RouteRepository for InMemoryStore {
    fn find_by_id(&self, id: RouteId) -> DomainResult<Option<Route>> {
        Ok(read(&self.routes)?.get(&id).cloned())
    }

    fn save(&self, route: &Route) -> DomainResult<()> {
        write(&self.routes)?.insert(route.id_typed(), route.clone());
        Ok(())
    }

    fn find_by_trip(&self, trip_id: TripId) -> DomainResult<Vec<Route>> {
        let mut routes: Vec<Route> = read(&self.routes)?
            .values()
            .filter(|r| r.trip_id() == trip_id)
            .cloned()
            .collect();
        routes.sort_by_key(Route::computed_at);
        Ok(routes)
    }
}

impl DriverRepository for InMemoryStore {
    fn find_by_id(&self, id: DriverId) -> DomainResult<Option<Driver>> {
        Ok(read(&self.drivers)?.get(&id).cloned())
    }

    fn save(&self, driver: &Driver, expected: ExpectedVersion) -> DomainResult<()> {
        let mut map = write(&self.drivers)?;
        check_version(&map, &driver.id_typed(), expected)?;
        map.insert(driver.id_typed(), driver.clone());
        Ok(())
    }

    fn find_by_status(&self, status: DriverStatus) -> DomainResult<Vec<Driver>> {
        Ok(read(&self.drivers)?
            .values()
            .filter(|d| d.status() == status)
            .cloned()
            .collect())
    }
}

impl VehicleRepository for InMemoryStore {
    fn find_by_id(&self, id: VehicleId) -> DomainResult<Option<Vehicle>> {
        Ok(read(&self.vehicles)?.get(&id).cloned())
    }

    fn save(&self, vehicle: &Vehicle, expected: ExpectedVersion) -> DomainResult<()> {
        let mut map = write(&self.vehicles)?;
        check_version(&map, &vehicle.id_typed(), expected)?;
        map.insert(vehicle.id_typed(), vehicle.clone());
        Ok(())
    }

    fn find_by_status(&self, status: VehicleStatus) -> DomainResult<Vec<Vehicle>> {
        Ok(read(&self.vehicles)?
            .values()
            .filter(|v| v.status() == status)
            .cloned()
            .collect())
    }
}

impl UnitOfWork for InMemoryStore {
    /// Persist a whole commit or nothing.
    ///
    /// All maps are locked in field order for the duration of the commit and
    /// every version check runs before the first insert, so a conflict on any
    /// staged entity leaves the store exactly as it was.
    fn commit(&self, commit: Commit) -> DomainResult<()> {
        let mut requests = write(&self.requests)?;
        let mut trips = write(&self.trips)?;
        let mut routes = write(&self.routes)?;
        let mut drivers = write(&self.drivers)?;
        let mut vehicles = write(&self.vehicles)?;

        for (request, expected) in &commit.requests {
            check_version(&requests, &request.id_typed(), *expected)?;
        }
        for (trip, expected) in &commit.trips {
            check_version(&trips, &trip.id_typed(), *expected)?;
        }
        for (driver, expected) in &commit.drivers {
            check_version(&drivers, &driver.id_typed(), *expected)?;
        }
        for (vehicle, expected) in &commit.vehicles {
            check_version(&vehicles, &vehicle.id_typed(), *expected)?;
        }

        for (request, _) in commit.requests {
            requests.insert(request.id_typed(), request);
        }
        for (trip, _) in commit.trips {
            trips.insert(trip.id_typed(), trip);
        }
        for route in commit.routes {
            routes.insert(route.id_typed(), route);
        }
        for (driver, _) in commit.drivers {
            drivers.insert(driver.id_typed(), driver);
        }
        for (vehicle, _) in commit.vehicles {
            vehicles.insert(vehicle.id_typed(), vehicle);
        }

        Ok(())
    }
}

impl RoadEventRepository for InMemoryStore {
    fn find_by_id(&self, id: RoadEventId) -> DomainResult<Option<RoadEvent>> {
        Ok(read(&self.road_events)?.get(&id).cloned())
    }

    fn save(&self, event: &RoadEvent) -> DomainResult<()> {
        write(&self.road_events)?.insert(event.id_typed(), event.clone());
        Ok(())
    }

    fn find_active(&self) -> DomainResult<Vec<RoadEvent>> {
        let mut events: Vec<RoadEvent> = read(&self.road_events)?
            .values()
            .filter(|e| e.is_active())
            .cloned()
            .collect();
        events.sort_by_key(RoadEvent::reported_at);
        Ok(events)
    }
}
