//! Workflow engine: multi-aggregate operations over the request/trip
//! lifecycle.
//!
//! Every operation follows the same discipline: load current state, decide
//! every transition on local copies (aggregate `handle` calls plus the one
//! external route computation where needed), then persist everything in one
//! [`Commit`] through the unit of work. A failed decision or a version
//! conflict anywhere in the batch leaves all stored state untouched.
//! Notifications and audit records happen after persistence and are
//! fire-and-forget.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use cargoflow_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, UserId,
};
use cargoflow_events::{Event, EventEnvelope, Notification, NotificationKind};
use cargoflow_fleet::{DriverCommand, ReleaseDriver, ReleaseVehicle, StartDriving, VehicleCommand};
use cargoflow_requests::{
    CancelRequest, LoadDetails, MarkApproved, MarkCompleted, MarkInProgress, RejectRequest,
    RequestCommand, RequestId, RequestStatus, SubmitRequest, TransportRequest,
};
use cargoflow_trips::{
    AcceptAssignment, AttachRoute, CancelTrip, CompleteTrip, OpenTrip, PauseTransit, ResumeTransit,
    Route, RouteId, StartDelivery, StartTransit, Trip, TripCommand, TripId, TripStatus,
};

use crate::commit::{Commit, UnitOfWork};
use crate::ports::{AuditTrail, Notifier, RoutePlanner};
use crate::repository::{
    DriverRepository, RequestRepository, RouteRepository, TripRepository, VehicleRepository,
};

/// Client input for a new transport request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRequest {
    pub origin: String,
    pub destination: String,
    pub pickup_date: DateTime<Utc>,
    pub load: LoadDetails,
}

/// The workflow engine.
///
/// Owns no state of its own; repositories serve reads, every write goes
/// through the unit of work.
#[derive(Clone)]
pub struct TripWorkflow {
    requests: Arc<dyn RequestRepository>,
    trips: Arc<dyn TripRepository>,
    routes: Arc<dyn RouteRepository>,
    drivers: Arc<dyn DriverRepository>,
    vehicles: Arc<dyn VehicleRepository>,
    uow: Arc<dyn UnitOfWork>,
    planner: Arc<dyn RoutePlanner>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditTrail>,
}

impl TripWorkflow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        trips: Arc<dyn TripRepository>,
        routes: Arc<dyn RouteRepository>,
        drivers: Arc<dyn DriverRepository>,
        vehicles: Arc<dyn VehicleRepository>,
        uow: Arc<dyn UnitOfWork>,
        planner: Arc<dyn RoutePlanner>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            requests,
            trips,
            routes,
            drivers,
            vehicles,
            uow,
            planner,
            notifier,
            audit,
        }
    }

    /// Record committed events on the audit trail, best-effort.
    pub(crate) fn record<E>(
        audit: &Arc<dyn AuditTrail>,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        events: &[E],
    ) where
        E: Event + Serialize,
    {
        for event in events {
            match EventEnvelope::from_typed(aggregate_id, aggregate_type, event) {
                Ok(envelope) => audit.record(envelope),
                Err(error) => {
                    warn!(%aggregate_id, %error, "audit serialization failed, record dropped");
                }
            }
        }
    }

    fn load_request(&self, id: RequestId) -> DomainResult<TransportRequest> {
        self.requests.find_by_id(id)?.ok_or(DomainError::NotFound)
    }

    fn load_trip(&self, id: TripId) -> DomainResult<Trip> {
        self.trips.find_by_id(id)?.ok_or(DomainError::NotFound)
    }

    // ----- client operations ------------------------------------------------

    /// Create a new transport request (status `Pending`).
    pub fn submit_request(
        &self,
        client_id: UserId,
        input: NewRequest,
    ) -> DomainResult<TransportRequest> {
        let request_id = RequestId::new(AggregateId::new());
        let mut request = TransportRequest::empty(request_id);
        let now = Utc::now();

        let events = request.handle(&RequestCommand::SubmitRequest(SubmitRequest {
            request_id,
            client_id,
            origin: input.origin,
            destination: input.destination,
            pickup_date: input.pickup_date,
            load: input.load,
            occurred_at: now,
        }))?;
        for event in &events {
            request.apply(event);
        }

        self.uow
            .commit(Commit::new().request(request.clone(), ExpectedVersion::Exact(0)))?;
        Self::record(&self.audit, request_id.0, "TransportRequest", &events);
        info!(%request_id, origin = request.origin(), destination = request.destination(),
            "transport request submitted");

        Ok(request)
    }

    /// Cancel a request.
    ///
    /// When a live trip exists the cancellation goes through the trip (which
    /// enforces the pre-transit window and releases resources); otherwise the
    /// request is cancelled alone.
    pub fn cancel_request(&self, request_id: RequestId) -> DomainResult<()> {
        if let Some(trip) = self.trips.find_by_request(request_id)?
            && !trip.status().is_terminal()
        {
            return self.cancel_trip(trip.id_typed());
        }

        let mut request = self.load_request(request_id)?;
        let loaded_version = request.version();
        let events = request.handle(&RequestCommand::CancelRequest(CancelRequest {
            request_id,
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            request.apply(event);
        }

        self.uow.commit(
            Commit::new().request(request.clone(), ExpectedVersion::Exact(loaded_version)),
        )?;
        Self::record(&self.audit, request_id.0, "TransportRequest", &events);
        info!(%request_id, "transport request cancelled");

        Ok(())
    }

    // ----- planner operations -----------------------------------------------

    /// Approve a pending request: compute the initial route, open the trip,
    /// and attach the route in one atomic step.
    ///
    /// Route computation happens before anything is persisted; if the route
    /// engine fails, the request stays `Pending` and no trip exists.
    pub fn approve_request(&self, request_id: RequestId) -> DomainResult<Trip> {
        let mut request = self.load_request(request_id)?;
        let request_version = request.version();
        let now = Utc::now();

        // Decide the request transition first so a non-pending request fails
        // cheaply, before the external call.
        let request_events = request.handle(&RequestCommand::MarkApproved(MarkApproved {
            request_id,
            occurred_at: now,
        }))?;

        let computed = self
            .planner
            .compute(request.origin(), request.destination())?;

        let trip_id = TripId::new(AggregateId::new());
        let mut trip = Trip::empty(trip_id);
        let mut trip_events = trip.handle(&TripCommand::OpenTrip(OpenTrip {
            trip_id,
            request_id,
            code: None,
            occurred_at: now,
        }))?;
        for event in &trip_events {
            trip.apply(event);
        }

        let route_id = RouteId::new(AggregateId::new());
        let attach_events = trip.handle(&TripCommand::AttachRoute(AttachRoute {
            trip_id,
            route_id,
            occurred_at: now,
        }))?;
        for event in &attach_events {
            trip.apply(event);
        }
        trip_events.extend(attach_events);

        let route = Route::new(
            route_id,
            trip_id,
            computed.distance_km,
            computed.duration_min,
            computed.polyline,
            computed.start,
            computed.end,
            now,
        );

        for event in &request_events {
            request.apply(event);
        }

        // Every transition decided; persist the three entities together.
        self.uow.commit(
            Commit::new()
                .request(request.clone(), ExpectedVersion::Exact(request_version))
                .trip(trip.clone(), ExpectedVersion::Exact(0))
                .route(route),
        )?;

        Self::record(&self.audit, request_id.0, "TransportRequest", &request_events);
        Self::record(&self.audit, trip_id.0, "Trip", &trip_events);

        if let Some(client_id) = request.client_id() {
            let code = trip.code().map(|c| c.as_str()).unwrap_or_default();
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::RequestApproved,
                format!("Your transport request was approved; trip {code} is being planned"),
                request_id.0,
            ));
        }
        info!(%request_id, %trip_id, %route_id, "request approved, trip opened");

        Ok(trip)
    }

    /// Decline a pending request with a reason.
    pub fn reject_request(&self, request_id: RequestId, reason: String) -> DomainResult<()> {
        let mut request = self.load_request(request_id)?;
        let loaded_version = request.version();

        let events = request.handle(&RequestCommand::RejectRequest(RejectRequest {
            request_id,
            reason: reason.clone(),
            occurred_at: Utc::now(),
        }))?;
        for event in &events {
            request.apply(event);
        }

        self.uow.commit(
            Commit::new().request(request.clone(), ExpectedVersion::Exact(loaded_version)),
        )?;
        Self::record(&self.audit, request_id.0, "TransportRequest", &events);

        if let Some(client_id) = request.client_id() {
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::RequestRejected,
                format!("Your transport request was rejected: {reason}"),
                request_id.0,
            ));
        }
        info!(%request_id, reason, "transport request rejected");

        Ok(())
    }

    /// Compute a replacement route after a coordinator rejection.
    ///
    /// The rejected route stays stored, marked superseded; the fresh route
    /// becomes the trip's current one and the trip re-enters validation.
    pub fn recompute_route(&self, trip_id: TripId) -> DomainResult<Route> {
        let mut trip = self.load_trip(trip_id)?;
        let trip_version = trip.version();

        if trip.status() != TripStatus::ModificationRequested {
            return Err(DomainError::invalid_state(format!(
                "route recomputation only follows a rejection (status: {:?})",
                trip.status()
            )));
        }

        let request_id = trip
            .request_id()
            .ok_or_else(|| DomainError::invalid_state("trip has no request"))?;
        let request = self.load_request(request_id)?;

        let computed = self
            .planner
            .compute(request.origin(), request.destination())?;
        let now = Utc::now();

        let previous_route = match trip.route_id() {
            Some(route_id) => self.routes.find_by_id(route_id)?,
            None => None,
        };

        let route_id = RouteId::new(AggregateId::new());
        let events = trip.handle(&TripCommand::AttachRoute(AttachRoute {
            trip_id,
            route_id,
            occurred_at: now,
        }))?;
        for event in &events {
            trip.apply(event);
        }

        let route = Route::new(
            route_id,
            trip_id,
            computed.distance_km,
            computed.duration_min,
            computed.polyline,
            computed.start,
            computed.end,
            now,
        );

        let mut commit =
            Commit::new().trip(trip.clone(), ExpectedVersion::Exact(trip_version));
        if let Some(mut previous) = previous_route {
            previous.mark_superseded();
            commit = commit.route(previous);
        }
        self.uow.commit(commit.route(route.clone()))?;

        Self::record(&self.audit, trip_id.0, "Trip", &events);
        info!(%trip_id, %route_id, "route recomputed, trip back in validation");

        Ok(route)
    }

    /// Cancel a trip and its request, releasing any committed resources.
    ///
    /// Only allowed before transit starts.
    pub fn cancel_trip(&self, trip_id: TripId) -> DomainResult<()> {
        let mut trip = self.load_trip(trip_id)?;
        let trip_version = trip.version();
        let now = Utc::now();

        let trip_events = trip.handle(&TripCommand::CancelTrip(CancelTrip {
            trip_id,
            occurred_at: now,
        }))?;

        let request_id = trip
            .request_id()
            .ok_or_else(|| DomainError::invalid_state("trip has no request"))?;
        let mut request = self.load_request(request_id)?;
        let request_version = request.version();
        let request_events = request.handle(&RequestCommand::CancelRequest(CancelRequest {
            request_id,
            occurred_at: now,
        }))?;

        let mut driver_update = None;
        if let Some(driver_id) = trip.driver_id() {
            let mut driver = self
                .drivers
                .find_by_id(driver_id)?
                .ok_or(DomainError::NotFound)?;
            let loaded_version = driver.version();
            let events = driver.handle(&DriverCommand::ReleaseDriver(ReleaseDriver {
                driver_id,
                occurred_at: now,
            }))?;
            for event in &events {
                driver.apply(event);
            }
            driver_update = Some((driver, loaded_version, events));
        }

        let mut vehicle_update = None;
        if let Some(vehicle_id) = trip.vehicle_id() {
            let mut vehicle = self
                .vehicles
                .find_by_id(vehicle_id)?
                .ok_or(DomainError::NotFound)?;
            let loaded_version = vehicle.version();
            let events = vehicle.handle(&VehicleCommand::ReleaseVehicle(ReleaseVehicle {
                vehicle_id,
                occurred_at: now,
            }))?;
            for event in &events {
                vehicle.apply(event);
            }
            vehicle_update = Some((vehicle, loaded_version, events));
        }

        for event in &trip_events {
            trip.apply(event);
        }
        for event in &request_events {
            request.apply(event);
        }

        let mut commit = Commit::new()
            .trip(trip.clone(), ExpectedVersion::Exact(trip_version))
            .request(request.clone(), ExpectedVersion::Exact(request_version));
        if let Some((driver, loaded_version, _)) = &driver_update {
            commit = commit.driver(driver.clone(), ExpectedVersion::Exact(*loaded_version));
        }
        if let Some((vehicle, loaded_version, _)) = &vehicle_update {
            commit = commit.vehicle(vehicle.clone(), ExpectedVersion::Exact(*loaded_version));
        }
        self.uow.commit(commit)?;

        if let Some((driver, _, events)) = &driver_update {
            Self::record(&self.audit, driver.id_typed().0, "Driver", events);
        }
        if let Some((vehicle, _, events)) = &vehicle_update {
            Self::record(&self.audit, vehicle.id_typed().0, "Vehicle", events);
        }
        Self::record(&self.audit, trip_id.0, "Trip", &trip_events);
        Self::record(&self.audit, request_id.0, "TransportRequest", &request_events);

        if let Some(client_id) = request.client_id() {
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::TripCancelled,
                "Your transport was cancelled".to_string(),
                trip_id.0,
            ));
        }
        if let Some(driver_id) = trip.driver_id() {
            self.notifier.notify(Notification::new(
                driver_id.user_id(),
                NotificationKind::TripCancelled,
                "Your assigned trip was cancelled".to_string(),
                trip_id.0,
            ));
        }
        info!(%trip_id, %request_id, "trip cancelled");

        Ok(())
    }

    // ----- driver operations ------------------------------------------------

    /// Advance a trip through its execution states.
    ///
    /// Accepted targets are `Accepted`, `InTransit`, `Paused`, `Delivering`
    /// and `Completed`; the trip aggregate enforces adjacency. Entering
    /// transit marks the driver on the road and the request in progress;
    /// completion releases driver and vehicle and completes the request.
    pub fn update_trip_status(&self, trip_id: TripId, target: TripStatus) -> DomainResult<Trip> {
        let mut trip = self.load_trip(trip_id)?;
        let trip_version = trip.version();
        let now = Utc::now();

        let starting_transit =
            target == TripStatus::InTransit && trip.status() == TripStatus::Accepted;
        let command = match target {
            TripStatus::Accepted => TripCommand::AcceptAssignment(AcceptAssignment {
                trip_id,
                occurred_at: now,
            }),
            TripStatus::InTransit if starting_transit => {
                TripCommand::StartTransit(StartTransit {
                    trip_id,
                    occurred_at: now,
                })
            }
            TripStatus::InTransit => TripCommand::ResumeTransit(ResumeTransit {
                trip_id,
                occurred_at: now,
            }),
            TripStatus::Paused => TripCommand::PauseTransit(PauseTransit {
                trip_id,
                occurred_at: now,
            }),
            TripStatus::Delivering => TripCommand::StartDelivery(StartDelivery {
                trip_id,
                occurred_at: now,
            }),
            TripStatus::Completed => TripCommand::CompleteTrip(CompleteTrip {
                trip_id,
                occurred_at: now,
            }),
            other => {
                return Err(DomainError::validation(format!(
                    "{other:?} is not a reportable execution status"
                )));
            }
        };

        let trip_events = trip.handle(&command)?;

        let request_id = trip
            .request_id()
            .ok_or_else(|| DomainError::invalid_state("trip has no request"))?;

        let mut request_update = None;
        let mut driver_update = None;
        let mut vehicle_update = None;

        if starting_transit {
            let mut request = self.load_request(request_id)?;
            let loaded_version = request.version();
            let events = request.handle(&RequestCommand::MarkInProgress(MarkInProgress {
                request_id,
                occurred_at: now,
            }))?;
            for event in &events {
                request.apply(event);
            }
            request_update = Some((request, loaded_version, events));

            if let Some(driver_id) = trip.driver_id() {
                let mut driver = self
                    .drivers
                    .find_by_id(driver_id)?
                    .ok_or(DomainError::NotFound)?;
                let loaded_version = driver.version();
                let events = driver.handle(&DriverCommand::StartDriving(StartDriving {
                    driver_id,
                    occurred_at: now,
                }))?;
                for event in &events {
                    driver.apply(event);
                }
                driver_update = Some((driver, loaded_version, events));
            }
        }

        if target == TripStatus::Completed {
            let mut request = self.load_request(request_id)?;
            let loaded_version = request.version();
            let events = request.handle(&RequestCommand::MarkCompleted(MarkCompleted {
                request_id,
                occurred_at: now,
            }))?;
            for event in &events {
                request.apply(event);
            }
            request_update = Some((request, loaded_version, events));

            if let Some(driver_id) = trip.driver_id() {
                let mut driver = self
                    .drivers
                    .find_by_id(driver_id)?
                    .ok_or(DomainError::NotFound)?;
                let loaded_version = driver.version();
                let events = driver.handle(&DriverCommand::ReleaseDriver(ReleaseDriver {
                    driver_id,
                    occurred_at: now,
                }))?;
                for event in &events {
                    driver.apply(event);
                }
                driver_update = Some((driver, loaded_version, events));
            }

            if let Some(vehicle_id) = trip.vehicle_id() {
                let mut vehicle = self
                    .vehicles
                    .find_by_id(vehicle_id)?
                    .ok_or(DomainError::NotFound)?;
                let loaded_version = vehicle.version();
                let events = vehicle.handle(&VehicleCommand::ReleaseVehicle(ReleaseVehicle {
                    vehicle_id,
                    occurred_at: now,
                }))?;
                for event in &events {
                    vehicle.apply(event);
                }
                vehicle_update = Some((vehicle, loaded_version, events));
            }
        }

        for event in &trip_events {
            trip.apply(event);
        }

        let mut commit = Commit::new().trip(trip.clone(), ExpectedVersion::Exact(trip_version));
        if let Some((request, loaded_version, _)) = &request_update {
            commit = commit.request(request.clone(), ExpectedVersion::Exact(*loaded_version));
        }
        if let Some((driver, loaded_version, _)) = &driver_update {
            commit = commit.driver(driver.clone(), ExpectedVersion::Exact(*loaded_version));
        }
        if let Some((vehicle, loaded_version, _)) = &vehicle_update {
            commit = commit.vehicle(vehicle.clone(), ExpectedVersion::Exact(*loaded_version));
        }
        self.uow.commit(commit)?;

        if let Some((_, _, events)) = &request_update {
            Self::record(&self.audit, request_id.0, "TransportRequest", events);
        }
        if let Some((driver, _, events)) = &driver_update {
            Self::record(&self.audit, driver.id_typed().0, "Driver", events);
        }
        if let Some((vehicle, _, events)) = &vehicle_update {
            Self::record(&self.audit, vehicle.id_typed().0, "Vehicle", events);
        }
        Self::record(&self.audit, trip_id.0, "Trip", &trip_events);

        let client_id = request_update
            .as_ref()
            .and_then(|(request, _, _)| request.client_id());
        let client_id = match client_id {
            Some(id) => Some(id),
            None => self.load_request(request_id)?.client_id(),
        };
        if let Some(client_id) = client_id {
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::TripStatusChanged,
                format!("Your transport is now {:?}", trip.status()),
                trip_id.0,
            ));
        }
        info!(%trip_id, status = ?trip.status(), "trip status updated");

        Ok(trip)
    }

    // ----- queries ----------------------------------------------------------

    pub fn request(&self, id: RequestId) -> DomainResult<TransportRequest> {
        self.load_request(id)
    }

    pub fn trip(&self, id: TripId) -> DomainResult<Trip> {
        self.load_trip(id)
    }

    pub fn trip_for_request(&self, request_id: RequestId) -> DomainResult<Option<Trip>> {
        self.trips.find_by_request(request_id)
    }

    pub fn requests_by_status(
        &self,
        status: RequestStatus,
    ) -> DomainResult<Vec<TransportRequest>> {
        self.requests.find_by_status(status)
    }

    pub fn requests_for_client(&self, client_id: UserId) -> DomainResult<Vec<TransportRequest>> {
        self.requests.find_by_client(client_id)
    }

    pub fn trips_by_status(&self, status: TripStatus) -> DomainResult<Vec<Trip>> {
        self.trips.find_by_status(status)
    }

    pub fn routes_for_trip(&self, trip_id: TripId) -> DomainResult<Vec<Route>> {
        self.routes.find_by_trip(trip_id)
    }

    /// The trip's current (non-superseded) route, if any.
    pub fn current_route(&self, trip_id: TripId) -> DomainResult<Option<Route>> {
        let trip = self.load_trip(trip_id)?;
        match trip.route_id() {
            Some(route_id) => self.routes.find_by_id(route_id),
            None => Ok(None),
        }
    }
}
