//! Coordinator-facing route validation.
//!
//! The coordinator reviews each computed route: approval moves the trip to
//! `Validated` and the request to `Planned`; rejection sends the trip back to
//! the planner with feedback and retires the route. Neither outcome touches
//! drivers or vehicles.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use cargoflow_core::{Aggregate, AggregateRoot, DomainError, DomainResult, ExpectedVersion};
use cargoflow_events::{Notification, NotificationKind};
use cargoflow_requests::{MarkPlanned, RequestCommand};
use cargoflow_trips::{ApproveRoute, RequestRouteChange, Trip, TripCommand, TripId, TripStatus};

use crate::commit::{Commit, UnitOfWork};
use crate::engine::TripWorkflow;
use crate::ports::{AuditTrail, Notifier};
use crate::repository::{RequestRepository, RouteRepository, TripRepository};

/// Outcome of a coordinator review.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteReview {
    Approve,
    Reject { feedback: Option<String> },
}

#[derive(Clone)]
pub struct RouteValidationService {
    requests: Arc<dyn RequestRepository>,
    trips: Arc<dyn TripRepository>,
    routes: Arc<dyn RouteRepository>,
    uow: Arc<dyn UnitOfWork>,
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditTrail>,
}

impl RouteValidationService {
    pub fn new(
        requests: Arc<dyn RequestRepository>,
        trips: Arc<dyn TripRepository>,
        routes: Arc<dyn RouteRepository>,
        uow: Arc<dyn UnitOfWork>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditTrail>,
    ) -> Self {
        Self {
            requests,
            trips,
            routes,
            uow,
            notifier,
            audit,
        }
    }

    /// Trips whose current route awaits a decision.
    pub fn pending_validations(&self) -> DomainResult<Vec<Trip>> {
        self.trips.find_by_status(TripStatus::WaitingValidation)
    }

    pub fn review(&self, trip_id: TripId, decision: RouteReview) -> DomainResult<Trip> {
        let trip = self
            .trips
            .find_by_id(trip_id)?
            .ok_or(DomainError::NotFound)?;

        match decision {
            RouteReview::Approve => self.approve(trip),
            RouteReview::Reject { feedback } => self.reject(trip, feedback),
        }
    }

    fn approve(&self, mut trip: Trip) -> DomainResult<Trip> {
        let trip_id = trip.id_typed();
        let trip_version = trip.version();
        let now = Utc::now();

        let trip_events = trip.handle(&TripCommand::ApproveRoute(ApproveRoute {
            trip_id,
            occurred_at: now,
        }))?;

        let request_id = trip
            .request_id()
            .ok_or_else(|| DomainError::invalid_state("trip has no request"))?;
        let mut request = self
            .requests
            .find_by_id(request_id)?
            .ok_or(DomainError::NotFound)?;
        let request_version = request.version();
        let request_events = request.handle(&RequestCommand::MarkPlanned(MarkPlanned {
            request_id,
            occurred_at: now,
        }))?;

        for event in &trip_events {
            trip.apply(event);
        }
        for event in &request_events {
            request.apply(event);
        }

        self.uow.commit(
            Commit::new()
                .trip(trip.clone(), ExpectedVersion::Exact(trip_version))
                .request(request.clone(), ExpectedVersion::Exact(request_version)),
        )?;

        TripWorkflow::record(&self.audit, trip_id.0, "Trip", &trip_events);
        TripWorkflow::record(&self.audit, request_id.0, "TransportRequest", &request_events);

        if let Some(client_id) = request.client_id() {
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::RouteValidated,
                "The route for your transport was validated".to_string(),
                trip_id.0,
            ));
        }
        info!(%trip_id, %request_id, "route validated");

        Ok(trip)
    }

    fn reject(&self, mut trip: Trip, feedback: Option<String>) -> DomainResult<Trip> {
        let trip_id = trip.id_typed();
        let trip_version = trip.version();
        let now = Utc::now();

        let trip_events = trip.handle(&TripCommand::RequestRouteChange(RequestRouteChange {
            trip_id,
            feedback: feedback.clone(),
            occurred_at: now,
        }))?;

        // The rejected route stays stored for audit, marked superseded.
        let rejected_route = match trip.route_id() {
            Some(route_id) => self.routes.find_by_id(route_id)?,
            None => None,
        };

        for event in &trip_events {
            trip.apply(event);
        }

        let mut commit =
            Commit::new().trip(trip.clone(), ExpectedVersion::Exact(trip_version));
        if let Some(mut route) = rejected_route {
            route.mark_superseded();
            commit = commit.route(route);
        }
        self.uow.commit(commit)?;

        TripWorkflow::record(&self.audit, trip_id.0, "Trip", &trip_events);

        if let Some(request_id) = trip.request_id()
            && let Some(request) = self.requests.find_by_id(request_id)?
            && let Some(client_id) = request.client_id()
        {
            self.notifier.notify(Notification::new(
                client_id,
                NotificationKind::RouteModificationRequested,
                "The route for your transport needs rework".to_string(),
                trip_id.0,
            ));
        }
        info!(%trip_id, ?feedback, "route rejected, modification requested");

        Ok(trip)
    }
}
