use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use cargoflow_events::Event;
use cargoflow_fleet::{DriverId, VehicleId};
use cargoflow_requests::RequestId;

use crate::route::RouteId;

/// Trip identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripId(pub AggregateId);

impl TripId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for TripId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Human-readable business code for a trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TripCode(String);

impl TripCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Derive a code deterministically from the trip id.
    ///
    /// Uniqueness follows from the id; the short form is what dispatchers
    /// read out over the phone.
    pub fn derive(trip_id: TripId) -> Self {
        let raw = trip_id.0.as_uuid().simple().to_string();
        Self(format!("TRP-{}", raw[..8].to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TripCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trip status lifecycle.
///
/// Planning side: `InPlanning -> WaitingValidation -> {Validated |
/// ModificationRequested} -> Confirmed`. Execution side (driver-facing):
/// `Confirmed -> Accepted -> InTransit -> {Paused | Delivering} -> Completed`.
/// `Cancelled` is reachable from every pre-transit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    InPlanning,
    WaitingValidation,
    Validated,
    ModificationRequested,
    Confirmed,
    Accepted,
    InTransit,
    Paused,
    Delivering,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Cancellation window closes the moment the truck moves.
    pub fn is_pre_transit(self) -> bool {
        matches!(
            self,
            Self::InPlanning
                | Self::WaitingValidation
                | Self::Validated
                | Self::ModificationRequested
                | Self::Confirmed
                | Self::Accepted
        )
    }
}

/// Aggregate root: Trip.
///
/// Created only as a side effect of approving a `TransportRequest`;
/// one-to-one with its request.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    id: TripId,
    code: Option<TripCode>,
    request_id: Option<RequestId>,
    status: TripStatus,
    route_id: Option<RouteId>,
    driver_id: Option<DriverId>,
    vehicle_id: Option<VehicleId>,
    last_feedback: Option<String>,
    version: u64,
    created: bool,
}

impl Trip {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: TripId) -> Self {
        Self {
            id,
            code: None,
            request_id: None,
            status: TripStatus::InPlanning,
            route_id: None,
            driver_id: None,
            vehicle_id: None,
            last_feedback: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> TripId {
        self.id
    }

    pub fn code(&self) -> Option<&TripCode> {
        self.code.as_ref()
    }

    pub fn request_id(&self) -> Option<RequestId> {
        self.request_id
    }

    pub fn status(&self) -> TripStatus {
        self.status
    }

    pub fn route_id(&self) -> Option<RouteId> {
        self.route_id
    }

    pub fn driver_id(&self) -> Option<DriverId> {
        self.driver_id
    }

    pub fn vehicle_id(&self) -> Option<VehicleId> {
        self.vehicle_id
    }

    pub fn last_feedback(&self) -> Option<&str> {
        self.last_feedback.as_deref()
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn has_resources(&self) -> bool {
        self.driver_id.is_some() && self.vehicle_id.is_some()
    }
}

impl AggregateRoot for Trip {
    type Id = TripId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: OpenTrip (workflow, on request approval).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrip {
    pub trip_id: TripId,
    pub request_id: RequestId,
    /// Explicit code wins; otherwise one is derived from the trip id.
    pub code: Option<TripCode>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AttachRoute (freshly computed route becomes current).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttachRoute {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ApproveRoute (coordinator validates the current route).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApproveRoute {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RequestRouteChange (coordinator rejects the current route).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRouteChange {
    pub trip_id: TripId,
    pub feedback: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignResources (planner binds driver + vehicle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignResources {
    pub trip_id: TripId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AcceptAssignment (driver acknowledges the trip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptAssignment {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartTransit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartTransit {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PauseTransit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PauseTransit {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ResumeTransit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResumeTransit {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartDelivery (final leg).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDelivery {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CompleteTrip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteTrip {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelTrip (pre-transit only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelTrip {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripCommand {
    OpenTrip(OpenTrip),
    AttachRoute(AttachRoute),
    ApproveRoute(ApproveRoute),
    RequestRouteChange(RequestRouteChange),
    AssignResources(AssignResources),
    AcceptAssignment(AcceptAssignment),
    StartTransit(StartTransit),
    PauseTransit(PauseTransit),
    ResumeTransit(ResumeTransit),
    StartDelivery(StartDelivery),
    CompleteTrip(CompleteTrip),
    CancelTrip(CancelTrip),
}

/// Event: TripOpened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripOpened {
    pub trip_id: TripId,
    pub request_id: RequestId,
    pub code: TripCode,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RouteAttached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteAttached {
    pub trip_id: TripId,
    pub route_id: RouteId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RouteApproved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteApproved {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RouteChangeRequested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteChangeRequested {
    pub trip_id: TripId,
    pub feedback: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ResourcesAssigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcesAssigned {
    pub trip_id: TripId,
    pub driver_id: DriverId,
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: AssignmentAccepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentAccepted {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransitStarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitStarted {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransitPaused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitPaused {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TransitResumed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitResumed {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DeliveryStarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryStarted {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TripCompleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCompleted {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: TripCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripCancelled {
    pub trip_id: TripId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TripEvent {
    TripOpened(TripOpened),
    RouteAttached(RouteAttached),
    RouteApproved(RouteApproved),
    RouteChangeRequested(RouteChangeRequested),
    ResourcesAssigned(ResourcesAssigned),
    AssignmentAccepted(AssignmentAccepted),
    TransitStarted(TransitStarted),
    TransitPaused(TransitPaused),
    TransitResumed(TransitResumed),
    DeliveryStarted(DeliveryStarted),
    TripCompleted(TripCompleted),
    TripCancelled(TripCancelled),
}

impl Event for TripEvent {
    fn event_type(&self) -> &'static str {
        match self {
            TripEvent::TripOpened(_) => "trips.trip.opened",
            TripEvent::RouteAttached(_) => "trips.trip.route_attached",
            TripEvent::RouteApproved(_) => "trips.trip.route_approved",
            TripEvent::RouteChangeRequested(_) => "trips.trip.route_change_requested",
            TripEvent::ResourcesAssigned(_) => "trips.trip.resources_assigned",
            TripEvent::AssignmentAccepted(_) => "trips.trip.assignment_accepted",
            TripEvent::TransitStarted(_) => "trips.trip.transit_started",
            TripEvent::TransitPaused(_) => "trips.trip.transit_paused",
            TripEvent::TransitResumed(_) => "trips.trip.transit_resumed",
            TripEvent::DeliveryStarted(_) => "trips.trip.delivery_started",
            TripEvent::TripCompleted(_) => "trips.trip.completed",
            TripEvent::TripCancelled(_) => "trips.trip.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            TripEvent::TripOpened(e) => e.occurred_at,
            TripEvent::RouteAttached(e) => e.occurred_at,
            TripEvent::RouteApproved(e) => e.occurred_at,
            TripEvent::RouteChangeRequested(e) => e.occurred_at,
            TripEvent::ResourcesAssigned(e) => e.occurred_at,
            TripEvent::AssignmentAccepted(e) => e.occurred_at,
            TripEvent::TransitStarted(e) => e.occurred_at,
            TripEvent::TransitPaused(e) => e.occurred_at,
            TripEvent::TransitResumed(e) => e.occurred_at,
            TripEvent::DeliveryStarted(e) => e.occurred_at,
            TripEvent::TripCompleted(e) => e.occurred_at,
            TripEvent::TripCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Trip {
    type Command = TripCommand;
    type Event = TripEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            TripEvent::TripOpened(e) => {
                self.id = e.trip_id;
                self.request_id = Some(e.request_id);
                self.code = Some(e.code.clone());
                self.status = TripStatus::InPlanning;
                self.created = true;
            }
            TripEvent::RouteAttached(e) => {
                self.route_id = Some(e.route_id);
                self.status = TripStatus::WaitingValidation;
            }
            TripEvent::RouteApproved(_) => {
                self.status = TripStatus::Validated;
            }
            TripEvent::RouteChangeRequested(e) => {
                self.last_feedback = e.feedback.clone();
                self.status = TripStatus::ModificationRequested;
            }
            TripEvent::ResourcesAssigned(e) => {
                self.driver_id = Some(e.driver_id);
                self.vehicle_id = Some(e.vehicle_id);
                self.status = TripStatus::Confirmed;
            }
            TripEvent::AssignmentAccepted(_) => {
                self.status = TripStatus::Accepted;
            }
            TripEvent::TransitStarted(_) => {
                self.status = TripStatus::InTransit;
            }
            TripEvent::TransitPaused(_) => {
                self.status = TripStatus::Paused;
            }
            TripEvent::TransitResumed(_) => {
                self.status = TripStatus::InTransit;
            }
            TripEvent::DeliveryStarted(_) => {
                self.status = TripStatus::Delivering;
            }
            TripEvent::TripCompleted(_) => {
                self.status = TripStatus::Completed;
            }
            TripEvent::TripCancelled(_) => {
                self.status = TripStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            TripCommand::OpenTrip(cmd) => self.handle_open(cmd),
            TripCommand::AttachRoute(cmd) => self.handle_attach_route(cmd),
            TripCommand::ApproveRoute(cmd) => self.handle_approve_route(cmd),
            TripCommand::RequestRouteChange(cmd) => self.handle_request_route_change(cmd),
            TripCommand::AssignResources(cmd) => self.handle_assign_resources(cmd),
            TripCommand::AcceptAssignment(cmd) => self.handle_accept_assignment(cmd),
            TripCommand::StartTransit(cmd) => self.handle_start_transit(cmd),
            TripCommand::PauseTransit(cmd) => self.handle_pause_transit(cmd),
            TripCommand::ResumeTransit(cmd) => self.handle_resume_transit(cmd),
            TripCommand::StartDelivery(cmd) => self.handle_start_delivery(cmd),
            TripCommand::CompleteTrip(cmd) => self.handle_complete(cmd),
            TripCommand::CancelTrip(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl Trip {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn ensure_trip_id(&self, trip_id: TripId) -> Result<(), DomainError> {
        if self.id != trip_id {
            return Err(DomainError::validation("trip_id mismatch"));
        }
        Ok(())
    }

    fn ensure_status(&self, expected: TripStatus, action: &str) -> Result<(), DomainError> {
        if self.status != expected {
            return Err(DomainError::invalid_state(format!(
                "{action} requires status {expected:?} (status: {:?})",
                self.status
            )));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenTrip) -> Result<Vec<TripEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("trip already exists"));
        }

        let code = cmd
            .code
            .clone()
            .unwrap_or_else(|| TripCode::derive(cmd.trip_id));

        Ok(vec![TripEvent::TripOpened(TripOpened {
            trip_id: cmd.trip_id,
            request_id: cmd.request_id,
            code,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_attach_route(&self, cmd: &AttachRoute) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;

        // A route can be attached on first planning and again after each
        // rejection; never once the route has been validated.
        if !matches!(
            self.status,
            TripStatus::InPlanning | TripStatus::ModificationRequested
        ) {
            return Err(DomainError::invalid_state(format!(
                "route can only be attached while planning (status: {:?})",
                self.status
            )));
        }

        Ok(vec![TripEvent::RouteAttached(RouteAttached {
            trip_id: cmd.trip_id,
            route_id: cmd.route_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve_route(&self, cmd: &ApproveRoute) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::WaitingValidation, "route approval")?;

        Ok(vec![TripEvent::RouteApproved(RouteApproved {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_request_route_change(
        &self,
        cmd: &RequestRouteChange,
    ) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::WaitingValidation, "route rejection")?;

        Ok(vec![TripEvent::RouteChangeRequested(RouteChangeRequested {
            trip_id: cmd.trip_id,
            feedback: cmd.feedback.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign_resources(
        &self,
        cmd: &AssignResources,
    ) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        // Assignment always follows route validation; there is no path that
        // binds resources to an unvalidated route.
        self.ensure_status(TripStatus::Validated, "resource assignment")?;

        Ok(vec![TripEvent::ResourcesAssigned(ResourcesAssigned {
            trip_id: cmd.trip_id,
            driver_id: cmd.driver_id,
            vehicle_id: cmd.vehicle_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_accept_assignment(
        &self,
        cmd: &AcceptAssignment,
    ) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::Confirmed, "assignment acceptance")?;

        Ok(vec![TripEvent::AssignmentAccepted(AssignmentAccepted {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_transit(&self, cmd: &StartTransit) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::Accepted, "transit start")?;

        Ok(vec![TripEvent::TransitStarted(TransitStarted {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_pause_transit(&self, cmd: &PauseTransit) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::InTransit, "pause")?;

        Ok(vec![TripEvent::TransitPaused(TransitPaused {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_resume_transit(&self, cmd: &ResumeTransit) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::Paused, "resume")?;

        Ok(vec![TripEvent::TransitResumed(TransitResumed {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_delivery(&self, cmd: &StartDelivery) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;

        if !matches!(self.status, TripStatus::InTransit | TripStatus::Paused) {
            return Err(DomainError::invalid_state(format!(
                "delivery starts from transit (status: {:?})",
                self.status
            )));
        }

        Ok(vec![TripEvent::DeliveryStarted(DeliveryStarted {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_complete(&self, cmd: &CompleteTrip) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;
        self.ensure_status(TripStatus::Delivering, "completion")?;

        Ok(vec![TripEvent::TripCompleted(TripCompleted {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelTrip) -> Result<Vec<TripEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_trip_id(cmd.trip_id)?;

        if !self.status.is_pre_transit() {
            return Err(DomainError::invalid_state(format!(
                "trip can only be cancelled before transit (status: {:?})",
                self.status
            )));
        }

        Ok(vec![TripEvent::TripCancelled(TripCancelled {
            trip_id: cmd.trip_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_trip_id() -> TripId {
        TripId::new(AggregateId::new())
    }

    fn test_request_id() -> RequestId {
        RequestId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn apply_all(trip: &mut Trip, events: Vec<TripEvent>) {
        for e in &events {
            trip.apply(e);
        }
    }

    fn opened_trip() -> Trip {
        let id = test_trip_id();
        let mut trip = Trip::empty(id);
        let events = trip
            .handle(&TripCommand::OpenTrip(OpenTrip {
                trip_id: id,
                request_id: test_request_id(),
                code: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        trip
    }

    fn trip_waiting_validation() -> Trip {
        let mut trip = opened_trip();
        let events = trip
            .handle(&TripCommand::AttachRoute(AttachRoute {
                trip_id: trip.id_typed(),
                route_id: RouteId::new(AggregateId::new()),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        trip
    }

    fn validated_trip() -> Trip {
        let mut trip = trip_waiting_validation();
        let events = trip
            .handle(&TripCommand::ApproveRoute(ApproveRoute {
                trip_id: trip.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        trip
    }

    fn confirmed_trip() -> Trip {
        let mut trip = validated_trip();
        let events = trip
            .handle(&TripCommand::AssignResources(AssignResources {
                trip_id: trip.id_typed(),
                driver_id: DriverId::new(AggregateId::new()),
                vehicle_id: VehicleId::new(AggregateId::new()),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        trip
    }

    #[test]
    fn open_derives_code_from_trip_id() {
        let id = test_trip_id();
        let trip = Trip::empty(id);
        let events = trip
            .handle(&TripCommand::OpenTrip(OpenTrip {
                trip_id: id,
                request_id: test_request_id(),
                code: None,
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            TripEvent::TripOpened(e) => {
                assert_eq!(e.code, TripCode::derive(id));
                assert!(e.code.as_str().starts_with("TRP-"));
            }
            _ => panic!("Expected TripOpened event"),
        }
    }

    #[test]
    fn explicit_code_wins_over_derivation() {
        let id = test_trip_id();
        let trip = Trip::empty(id);
        let events = trip
            .handle(&TripCommand::OpenTrip(OpenTrip {
                trip_id: id,
                request_id: test_request_id(),
                code: Some(TripCode::new("TRP-CUSTOM01")),
                occurred_at: test_time(),
            }))
            .unwrap();

        match &events[0] {
            TripEvent::TripOpened(e) => assert_eq!(e.code.as_str(), "TRP-CUSTOM01"),
            _ => panic!("Expected TripOpened event"),
        }
    }

    #[test]
    fn attach_route_enters_waiting_validation() {
        let trip = trip_waiting_validation();
        assert_eq!(trip.status(), TripStatus::WaitingValidation);
        assert!(trip.route_id().is_some());
    }

    #[test]
    fn approve_route_requires_waiting_validation() {
        let trip = opened_trip();
        let err = trip
            .handle(&TripCommand::ApproveRoute(ApproveRoute {
                trip_id: trip.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn rejection_records_feedback_and_allows_reattach() {
        let mut trip = trip_waiting_validation();
        let first_route = trip.route_id().unwrap();

        let events = trip
            .handle(&TripCommand::RequestRouteChange(RequestRouteChange {
                trip_id: trip.id_typed(),
                feedback: Some("avoid the A7 viaduct".to_string()),
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        assert_eq!(trip.status(), TripStatus::ModificationRequested);
        assert_eq!(trip.last_feedback(), Some("avoid the A7 viaduct"));

        let new_route = RouteId::new(AggregateId::new());
        let events = trip
            .handle(&TripCommand::AttachRoute(AttachRoute {
                trip_id: trip.id_typed(),
                route_id: new_route,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);

        assert_eq!(trip.status(), TripStatus::WaitingValidation);
        assert_ne!(trip.route_id().unwrap(), first_route);
    }

    #[test]
    fn assignment_requires_validated_route() {
        let trip = trip_waiting_validation();
        let err = trip
            .handle(&TripCommand::AssignResources(AssignResources {
                trip_id: trip.id_typed(),
                driver_id: DriverId::new(AggregateId::new()),
                vehicle_id: VehicleId::new(AggregateId::new()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn assignment_binds_both_resources() {
        let trip = confirmed_trip();
        assert_eq!(trip.status(), TripStatus::Confirmed);
        assert!(trip.has_resources());
    }

    #[test]
    fn driver_progression_to_completed() {
        let mut trip = confirmed_trip();
        let id = trip.id_typed();

        for (cmd, expected) in [
            (
                TripCommand::AcceptAssignment(AcceptAssignment {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::Accepted,
            ),
            (
                TripCommand::StartTransit(StartTransit {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::InTransit,
            ),
            (
                TripCommand::PauseTransit(PauseTransit {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::Paused,
            ),
            (
                TripCommand::ResumeTransit(ResumeTransit {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::InTransit,
            ),
            (
                TripCommand::StartDelivery(StartDelivery {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::Delivering,
            ),
            (
                TripCommand::CompleteTrip(CompleteTrip {
                    trip_id: id,
                    occurred_at: test_time(),
                }),
                TripStatus::Completed,
            ),
        ] {
            let events = trip.handle(&cmd).unwrap();
            apply_all(&mut trip, events);
            assert_eq!(trip.status(), expected);
        }
    }

    #[test]
    fn cannot_skip_acceptance_before_transit() {
        let trip = confirmed_trip();
        let err = trip
            .handle(&TripCommand::StartTransit(StartTransit {
                trip_id: trip.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn cancel_allowed_pre_transit() {
        for trip in [
            opened_trip(),
            trip_waiting_validation(),
            validated_trip(),
            confirmed_trip(),
        ] {
            let events = trip
                .handle(&TripCommand::CancelTrip(CancelTrip {
                    trip_id: trip.id_typed(),
                    occurred_at: test_time(),
                }))
                .unwrap();
            assert!(matches!(events[0], TripEvent::TripCancelled(_)));
        }
    }

    #[test]
    fn cancel_rejected_once_in_transit() {
        let mut trip = confirmed_trip();
        let id = trip.id_typed();
        for cmd in [
            TripCommand::AcceptAssignment(AcceptAssignment {
                trip_id: id,
                occurred_at: test_time(),
            }),
            TripCommand::StartTransit(StartTransit {
                trip_id: id,
                occurred_at: test_time(),
            }),
        ] {
            let events = trip.handle(&cmd).unwrap();
            apply_all(&mut trip, events);
        }

        let err = trip
            .handle(&TripCommand::CancelTrip(CancelTrip {
                trip_id: id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }

    #[test]
    fn no_transition_from_terminal_state() {
        let mut trip = opened_trip();
        let id = trip.id_typed();
        let events = trip
            .handle(&TripCommand::CancelTrip(CancelTrip {
                trip_id: id,
                occurred_at: test_time(),
            }))
            .unwrap();
        apply_all(&mut trip, events);
        assert!(trip.status().is_terminal());

        let err = trip
            .handle(&TripCommand::AttachRoute(AttachRoute {
                trip_id: id,
                route_id: RouteId::new(AggregateId::new()),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvalidState(_)));
    }
}
