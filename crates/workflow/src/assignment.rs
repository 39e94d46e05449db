//! Resource assignment: binding a driver and a vehicle to a validated trip.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use cargoflow_core::{Aggregate, AggregateRoot, DomainError, DomainResult, ExpectedVersion};
use cargoflow_events::{Notification, NotificationKind};
use cargoflow_fleet::{
    AssignDriver, CommitVehicle, DriverCommand, DriverId, Vehicle, VehicleCommand, VehicleId,
    VehicleStatus, compatible_vehicles,
};
use cargoflow_requests::RequestId;
use cargoflow_trips::{AssignResources, Trip, TripCommand, TripId};

use crate::commit::{Commit, UnitOfWork};
use crate::engine::TripWorkflow;
use crate::ports::{AuditTrail, Notifier};
use crate::repository::{
    DriverRepository, RequestRepository, TripRepository, VehicleRepository,
};

#[derive(Clone)]
pub struct TripPlanner {
    requests: Arc<dyn RequestRepository>,
    trips: Arc<dyn TripRepository>,
    drivers: Arc<dyn DriverRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    uow: Arc<dyn UnitOfWork>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditTrail>,
}

impl TripPlanner {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        trips: Arc<dyn TripRepository>,
        drivers: Arc<dyn DriverRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        uow: Arc<dyn UnitOfWork>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            requests,
            trips,
            drivers,
            vehicles,
            uow,
            notifier,
            audit,
        }
    }

    /// Bind a driver and a vehicle to a validated trip.
    ///
    /// Fails without touching any stored state when the trip is not
    /// `Validated`, the driver is not free, the vehicle is not available, or
    /// the vehicle's envelope does not dominate the load. On success the trip
    /// is `Confirmed`, the driver `Assigned` and the vehicle `InUse`, in one
    /// atomic step.
    pub fn plan_trip(
        &self,
        trip_id: TripId,
        driver_id: DriverId,
        vehicle_id: VehicleId,
    ) -> DomainResult<Trip> {
        let mut trip = self
            .trips
            .find_by_id(trip_id)?
            .ok_or(DomainError::NotFound)?;
        let trip_version = trip.version();
        let now = Utc::now();

        let request_id = trip
            .request_id()
            .ok_or_else(|| DomainError::invalid_state("trip has no request"))?;
        let request = self
            .requests
            .find_by_id(request_id)?
            .ok_or(DomainError::NotFound)?;
        let load = request
            .load()
            .ok_or_else(|| DomainError::invalid_state("request has no load details"))?;

        let mut driver = self
            .drivers
            .find_by_id(driver_id)?
            .ok_or(DomainError::NotFound)?;
        let driver_version = driver.version();
        let mut vehicle = self
            .vehicles
            .find_by_id(vehicle_id)?
            .ok_or(DomainError::NotFound)?;
        let vehicle_version = vehicle.version();

        if !vehicle.envelope().dominates(load) {
            return Err(DomainError::business_rule(format!(
                "vehicle {} cannot carry this load",
                vehicle.plate()
            )));
        }

        // Decide all three transitions before persisting any of them.
        let trip_events = trip.handle(&TripCommand::AssignResources(AssignResources {
            trip_id,
            driver_id,
            vehicle_id,
            occurred_at: now,
        }))?;
        let driver_events = driver.handle(&DriverCommand::AssignDriver(AssignDriver {
            driver_id,
            trip: trip_id.0,
            occurred_at: now,
        }))?;
        let vehicle_events = vehicle.handle(&VehicleCommand::CommitVehicle(CommitVehicle {
            vehicle_id,
            trip: trip_id.0,
            occurred_at: now,
        }))?;

        for event in &trip_events {
            trip.apply(event);
        }
        for event in &driver_events {
            driver.apply(event);
        }
        for event in &vehicle_events {
            vehicle.apply(event);
        }

        // One commit for all three; a conflict on any of them (say, another
        // planner winning the driver) writes nothing.
        self.uow.commit(
            Commit::new()
                .trip(trip.clone(), ExpectedVersion::Exact(trip_version))
                .driver(driver.clone(), ExpectedVersion::Exact(driver_version))
                .vehicle(vehicle.clone(), ExpectedVersion::Exact(vehicle_version)),
        )?;

        TripWorkflow::record(&self.audit, trip_id.0, "Trip", &trip_events);
        TripWorkflow::record(&self.audit, driver_id.0, "Driver", &driver_events);
        TripWorkflow::record(&self.audit, vehicle_id.0, "Vehicle", &vehicle_events);

        self.notifier.notify(Notification::new(
            driver_id.user_id(),
            NotificationKind::TripAssigned,
            format!(
                "You were assigned trip {}",
                trip.code().map(|c| c.as_str()).unwrap_or_default()
            ),
            trip_id.0,
        ));
        info!(%trip_id, %driver_id, %vehicle_id, "trip planned");

        Ok(trip)
    }

    /// Available vehicles whose envelope dominates the request's load.
    pub fn candidate_vehicles(&self, request_id: RequestId) -> DomainResult<Vec<Vehicle>> {
        let request = self
            .requests
            .find_by_id(request_id)?
            .ok_or(DomainError::NotFound)?;
        let load = request
            .load()
            .ok_or_else(|| DomainError::invalid_state("request has no load details"))?;

        let available = self.vehicles.find_by_status(VehicleStatus::Available)?;
        Ok(compatible_vehicles(&available, load)
            .into_iter()
            .cloned()
            .collect())
    }
}
