//! Authorization boundary in front of the workflow.
//!
//! Every operation takes the acting [`Caller`] explicitly. Role checks live
//! here and only here; the engine and services below assume authorized input.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use cargoflow_core::{AggregateId, DomainError, DomainResult};
use cargoflow_fleet::{DriverId, Vehicle, VehicleId};
use cargoflow_requests::{RequestId, RequestStatus, TransportRequest};
use cargoflow_trips::{
    RoadEvent, RoadEventId, RoadEventKind, Route, Severity, Trip, TripId, TripStatus,
};

use crate::assignment::TripPlanner;
use crate::caller::{Caller, Role};
use crate::engine::{NewRequest, TripWorkflow};
use crate::repository::RoadEventRepository;
use crate::validation::{RouteReview, RouteValidationService};

#[derive(Clone)]
pub struct WorkflowGateway {
    workflow: TripWorkflow,
    planner: TripPlanner,
    validation: RouteValidationService,
    road_events: Arc<dyn RoadEventRepository>,
}

impl WorkflowGateway {
    pub fn new(
        workflow: TripWorkflow,
        planner: TripPlanner,
        validation: RouteValidationService,
        road_events: Arc<dyn RoadEventRepository>,
    ) -> Self {
        Self {
            workflow,
            planner,
            validation,
            road_events,
        }
    }

    // ----- client -----------------------------------------------------------

    pub fn submit_request(
        &self,
        caller: &Caller,
        input: NewRequest,
    ) -> DomainResult<TransportRequest> {
        caller.require(&[Role::Client])?;
        self.workflow.submit_request(caller.user_id, input)
    }

    /// Clients may cancel their own request while it is still pending; staff
    /// may cancel any request up to the start of transit.
    pub fn cancel_request(&self, caller: &Caller, request_id: RequestId) -> DomainResult<()> {
        caller.require(&[Role::Client, Role::Planner])?;
        if caller.role == Role::Client {
            let request = self.workflow.request(request_id)?;
            if request.client_id() != Some(caller.user_id) {
                return Err(DomainError::Unauthorized);
            }
            if !request.is_client_cancellable() {
                return Err(DomainError::invalid_state(format!(
                    "request can no longer be cancelled by its client (status: {:?})",
                    request.status()
                )));
            }
        }
        self.workflow.cancel_request(request_id)
    }

    pub fn my_requests(&self, caller: &Caller) -> DomainResult<Vec<TransportRequest>> {
        caller.require(&[Role::Client])?;
        self.workflow.requests_for_client(caller.user_id)
    }

    /// Clients see only their own requests; staff see any.
    pub fn request(&self, caller: &Caller, request_id: RequestId) -> DomainResult<TransportRequest> {
        let request = self.workflow.request(request_id)?;
        if caller.role == Role::Client && request.client_id() != Some(caller.user_id) {
            return Err(DomainError::Unauthorized);
        }
        Ok(request)
    }

    // ----- planner ----------------------------------------------------------

    pub fn pending_requests(&self, caller: &Caller) -> DomainResult<Vec<TransportRequest>> {
        caller.require(&[Role::Planner])?;
        self.workflow.requests_by_status(RequestStatus::Pending)
    }

    pub fn approve_request(&self, caller: &Caller, request_id: RequestId) -> DomainResult<Trip> {
        caller.require(&[Role::Planner])?;
        self.workflow.approve_request(request_id)
    }

    pub fn reject_request(
        &self,
        caller: &Caller,
        request_id: RequestId,
        reason: String,
    ) -> DomainResult<()> {
        caller.require(&[Role::Planner])?;
        self.workflow.reject_request(request_id, reason)
    }

    pub fn recompute_route(&self, caller: &Caller, trip_id: TripId) -> DomainResult<Route> {
        caller.require(&[Role::Planner])?;
        self.workflow.recompute_route(trip_id)
    }

    pub fn plan_trip(
        &self,
        caller: &Caller,
        trip_id: TripId,
        driver_id: DriverId,
        vehicle_id: VehicleId,
    ) -> DomainResult<Trip> {
        caller.require(&[Role::Planner])?;
        self.planner.plan_trip(trip_id, driver_id, vehicle_id)
    }

    pub fn candidate_vehicles(
        &self,
        caller: &Caller,
        request_id: RequestId,
    ) -> DomainResult<Vec<Vehicle>> {
        caller.require(&[Role::Planner])?;
        self.planner.candidate_vehicles(request_id)
    }

    pub fn cancel_trip(&self, caller: &Caller, trip_id: TripId) -> DomainResult<()> {
        caller.require(&[Role::Planner])?;
        self.workflow.cancel_trip(trip_id)
    }

    pub fn requests_by_status(
        &self,
        caller: &Caller,
        status: RequestStatus,
    ) -> DomainResult<Vec<TransportRequest>> {
        caller.require(&[Role::Planner])?;
        self.workflow.requests_by_status(status)
    }

    pub fn trips_by_status(&self, caller: &Caller, status: TripStatus) -> DomainResult<Vec<Trip>> {
        caller.require(&[Role::Planner, Role::Coordinator])?;
        self.workflow.trips_by_status(status)
    }

    /// Staff read of a single trip.
    pub fn trip(&self, caller: &Caller, trip_id: TripId) -> DomainResult<Trip> {
        caller.require(&[Role::Planner, Role::Coordinator])?;
        self.workflow.trip(trip_id)
    }

    // ----- coordinator ------------------------------------------------------

    pub fn pending_validations(&self, caller: &Caller) -> DomainResult<Vec<Trip>> {
        caller.require(&[Role::Coordinator])?;
        self.validation.pending_validations()
    }

    pub fn review_route(
        &self,
        caller: &Caller,
        trip_id: TripId,
        decision: RouteReview,
    ) -> DomainResult<Trip> {
        caller.require(&[Role::Coordinator])?;
        self.validation.review(trip_id, decision)
    }

    // ----- driver -----------------------------------------------------------

    /// Drivers may only advance the trip they are assigned to.
    pub fn update_trip_status(
        &self,
        caller: &Caller,
        trip_id: TripId,
        target: TripStatus,
    ) -> DomainResult<Trip> {
        caller.require(&[Role::Driver])?;
        if caller.role == Role::Driver {
            let trip = self.workflow.trip(trip_id)?;
            let assigned = trip
                .driver_id()
                .is_some_and(|driver_id| driver_id.user_id() == caller.user_id);
            if !assigned {
                return Err(DomainError::Unauthorized);
            }
        }
        self.workflow.update_trip_status(trip_id, target)
    }

    // ----- road events ------------------------------------------------------

    /// Staff and drivers report disturbances; clients cannot.
    pub fn report_road_event(
        &self,
        caller: &Caller,
        kind: RoadEventKind,
        severity: Severity,
        location: String,
    ) -> DomainResult<RoadEvent> {
        caller.require(&[Role::Driver, Role::Planner, Role::Coordinator])?;

        let event = RoadEvent::new(
            RoadEventId::new(AggregateId::new()),
            kind,
            severity,
            location,
            caller.user_id,
            Utc::now(),
        );
        self.road_events.save(&event)?;

        if event.is_blocking() {
            warn!(road_event_id = %event.id_typed(), ?kind, location = event.location(),
                "blocking road event reported");
        } else {
            info!(road_event_id = %event.id_typed(), ?kind, ?severity, "road event reported");
        }

        Ok(event)
    }

    pub fn resolve_road_event(&self, caller: &Caller, id: RoadEventId) -> DomainResult<()> {
        caller.require(&[Role::Planner, Role::Coordinator])?;

        let mut event = self
            .road_events
            .find_by_id(id)?
            .ok_or(DomainError::NotFound)?;
        event.resolve();
        self.road_events.save(&event)?;
        info!(road_event_id = %id, "road event resolved");

        Ok(())
    }

    pub fn active_road_events(&self, caller: &Caller) -> DomainResult<Vec<RoadEvent>> {
        caller.require(&[Role::Client, Role::Driver, Role::Planner, Role::Coordinator])?;
        self.road_events.find_active()
    }

    pub fn blocking_road_events(&self, caller: &Caller) -> DomainResult<Vec<RoadEvent>> {
        caller.require(&[Role::Client, Role::Driver, Role::Planner, Role::Coordinator])?;
        let mut events = self.road_events.find_active()?;
        events.retain(RoadEvent::is_blocking);
        Ok(events)
    }
}
