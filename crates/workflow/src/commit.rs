//! Transactional write port.
//!
//! Every workflow operation stages the entities it changed into one
//! [`Commit`] and hands it to the [`UnitOfWork`]. The store validates every
//! expected version before writing anything, so a stale entity anywhere in
//! the batch aborts the whole commit with `Conflict` and leaves no partial
//! state behind.

use cargoflow_core::{DomainResult, ExpectedVersion};
use cargoflow_fleet::{Driver, Vehicle};
use cargoflow_requests::TransportRequest;
use cargoflow_trips::{Route, Trip};

/// One operation's worth of dirty entities, persisted together.
///
/// Versioned aggregates carry the version the caller loaded; routes are
/// plain upserts (write-once plus the superseded flag).
#[derive(Debug, Default)]
pub struct Commit {
    pub requests: Vec<(TransportRequest, ExpectedVersion)>,
    pub trips: Vec<(Trip, ExpectedVersion)>,
    pub routes: Vec<Route>,
    pub drivers: Vec<(Driver, ExpectedVersion)>,
    pub vehicles: Vec<(Vehicle, ExpectedVersion)>,
}

impl Commit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(mut self, request: TransportRequest, expected: ExpectedVersion) -> Self {
        self.requests.push((request, expected));
        self
    }

    pub fn trip(mut self, trip: Trip, expected: ExpectedVersion) -> Self {
        self.trips.push((trip, expected));
        self
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn driver(mut self, driver: Driver, expected: ExpectedVersion) -> Self {
        self.drivers.push((driver, expected));
        self
    }

    pub fn vehicle(mut self, vehicle: Vehicle, expected: ExpectedVersion) -> Self {
        self.vehicles.push((vehicle, expected));
        self
    }
}

/// Atomic persistence of a [`Commit`].
///
/// Implementations must check every expected version in the batch before
/// storing any entity; on a mismatch the commit returns
/// `DomainError::Conflict` and nothing is written.
pub trait UnitOfWork: Send + Sync {
    fn commit(&self, commit: Commit) -> DomainResult<()>;
}
