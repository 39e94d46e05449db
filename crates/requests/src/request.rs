use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use cargoflow_events::Event;

use crate::load::LoadDetails;

/// Transport request identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub AggregateId);

impl RequestId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RequestId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Request status lifecycle.
///
/// `Pending -> Approved -> Planned -> InProgress -> Completed`, with
/// `Cancelled` and `Rejected` as alternate terminal branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Planned,
    InProgress,
    Completed,
    Cancelled,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Rejected)
    }
}

/// Aggregate root: TransportRequest.
///
/// Created by a client, then mutated only by the workflow. Immutable once
/// `InProgress` (only completion remains).
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    id: RequestId,
    client_id: Option<UserId>,
    origin: String,
    destination: String,
    pickup_date: Option<DateTime<Utc>>,
    load: Option<LoadDetails>,
    status: RequestStatus,
    version: u64,
    created: bool,
}

impl TransportRequest {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: RequestId) -> Self {
        Self {
            id,
            client_id: None,
            origin: String::new(),
            destination: String::new(),
            pickup_date: None,
            load: None,
            status: RequestStatus::Pending,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> RequestId {
        self.id
    }

    pub fn client_id(&self) -> Option<UserId> {
        self.client_id
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn pickup_date(&self) -> Option<DateTime<Utc>> {
        self.pickup_date
    }

    pub fn load(&self) -> Option<&LoadDetails> {
        self.load.as_ref()
    }

    pub fn status(&self) -> RequestStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Client-side cancellation window: only before approval.
    pub fn is_client_cancellable(&self) -> bool {
        matches!(self.status, RequestStatus::Pending)
    }
}

impl AggregateRoot for TransportRequest {
    type Id = RequestId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitRequest (client creates the order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub request_id: RequestId,
    pub client_id: UserId,
    pub origin: String,
    pub destination: String,
    pub pickup_date: DateTime<Utc>,
    pub load: LoadDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkApproved (workflow, after route computation succeeded).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkApproved {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPlanned (workflow, route validated by the coordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPlanned {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkInProgress (workflow, trip entered transit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkInProgress {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkCompleted (workflow, trip delivered).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkCompleted {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectRequest (planner declines a pending order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectRequest {
    pub request_id: RequestId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelRequest (client pre-approval, or workflow via trip cancellation).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelRequest {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestCommand {
    SubmitRequest(SubmitRequest),
    MarkApproved(MarkApproved),
    MarkPlanned(MarkPlanned),
    MarkInProgress(MarkInProgress),
    MarkCompleted(MarkCompleted),
    RejectRequest(RejectRequest),
    CancelRequest(CancelRequest),
}

/// Event: RequestSubmitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSubmitted {
    pub request_id: RequestId,
    pub client_id: UserId,
    pub origin: String,
    pub destination: String,
    pub pickup_date: DateTime<Utc>,
    pub load: LoadDetails,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestApproved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestApproved {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestPlanned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestPlanned {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestStarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestStarted {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCompleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCompleted {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestRejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRejected {
    pub request_id: RequestId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: RequestCancelled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCancelled {
    pub request_id: RequestId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestEvent {
    RequestSubmitted(RequestSubmitted),
    RequestApproved(RequestApproved),
    RequestPlanned(RequestPlanned),
    RequestStarted(RequestStarted),
    RequestCompleted(RequestCompleted),
    RequestRejected(RequestRejected),
    RequestCancelled(RequestCancelled),
}

impl Event for RequestEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RequestEvent::RequestSubmitted(_) => "requests.request.submitted",
            RequestEvent::RequestApproved(_) => "requests.request.approved",
            RequestEvent::RequestPlanned(_) => "requests.request.planned",
            RequestEvent::RequestStarted(_) => "requests.request.started",
            RequestEvent::RequestCompleted(_) => "requests.request.completed",
            RequestEvent::RequestRejected(_) => "requests.request.rejected",
            RequestEvent::RequestCancelled(_) => "requests.request.cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            RequestEvent::RequestSubmitted(e) => e.occurred_at,
            RequestEvent::RequestApproved(e) => e.occurred_at,
            RequestEvent::RequestPlanned(e) => e.occurred_at,
            RequestEvent::RequestStarted(e) => e.occurred_at,
            RequestEvent::RequestCompleted(e) => e.occurred_at,
            RequestEvent::RequestRejected(e) => e.occurred_at,
            RequestEvent::RequestCancelled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for TransportRequest {
    type Command = RequestCommand;
    type Event = RequestEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            RequestEvent::RequestSubmitted(e) => {
                self.id = e.request_id;
                self.client_id = Some(e.client_id);
                self.origin = e.origin.clone();
                self.destination = e.destination.clone();
                self.pickup_date = Some(e.pickup_date);
                self.load = Some(e.load);
                self.status = RequestStatus::Pending;
                self.created = true;
            }
            RequestEvent::RequestApproved(_) => {
                self.status = RequestStatus::Approved;
            }
            RequestEvent::RequestPlanned(_) => {
                self.status = RequestStatus::Planned;
            }
            RequestEvent::RequestStarted(_) => {
                self.status = RequestStatus::InProgress;
            }
            RequestEvent::RequestCompleted(_) => {
                self.status = RequestStatus::Completed;
            }
            RequestEvent::RequestRejected(_) => {
                self.status = RequestStatus::Rejected;
            }
            RequestEvent::RequestCancelled(_) => {
                self.status = RequestStatus::Cancelled;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            RequestCommand::SubmitRequest(cmd) => self.handle_submit(cmd),
            RequestCommand::MarkApproved(cmd) => self.handle_mark_approved(cmd),
            RequestCommand::MarkPlanned(cmd) => self.handle_mark_planned(cmd),
            RequestCommand::MarkInProgress(cmd) => self.handle_mark_in_progress(cmd),
            RequestCommand::MarkCompleted(cmd) => self.handle_mark_completed(cmd),
            RequestCommand::RejectRequest(cmd) => self.handle_reject(cmd),
            RequestCommand::CancelRequest(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl TransportRequest {
    fn ensure_request_id(&self, request_id: RequestId) -> Result<(), DomainError> {
        if self.id != request_id {
            return Err(DomainError::validation("request_id mismatch"));
        }
        Ok(())
    }

    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitRequest) -> Result<Vec<RequestEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("request already exists"));
        }

        cmd.load.validate()?;

        if cmd.origin.trim().is_empty() || cmd.destination.trim().is_empty() {
            return Err(DomainError::validation(
                "origin and destination must be non-empty",
            ));
        }
        if cmd.origin.trim() == cmd.destination.trim() {
            return Err(DomainError::validation(
                "origin and destination must differ",
            ));
        }

        Ok(vec![RequestEvent::RequestSubmitted(RequestSubmitted {
            request_id: cmd.request_id,
            client_id: cmd.client_id,
            origin: cmd.origin.clone(),
            destination: cmd.destination.clone(),
            pickup_date: cmd.pickup_date,
            load: cmd.load,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_approved(&self, cmd: &MarkApproved) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != RequestStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "only pending requests can be approved (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestApproved(RequestApproved {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_planned(&self, cmd: &MarkPlanned) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != RequestStatus::Approved {
            return Err(DomainError::invalid_state(format!(
                "only approved requests can be planned (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestPlanned(RequestPlanned {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_in_progress(
        &self,
        cmd: &MarkInProgress,
    ) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != RequestStatus::Planned {
            return Err(DomainError::invalid_state(format!(
                "only planned requests can start (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestStarted(RequestStarted {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_completed(
        &self,
        cmd: &MarkCompleted,
    ) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != RequestStatus::InProgress {
            return Err(DomainError::invalid_state(format!(
                "only in-progress requests can complete (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestCompleted(RequestCompleted {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        if self.status != RequestStatus::Pending {
            return Err(DomainError::invalid_state(format!(
                "only pending requests can be rejected (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestRejected(RequestRejected {
            request_id: cmd.request_id,
            reason: cmd.reason.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelRequest) -> Result<Vec<RequestEvent>, DomainError> {
        self.ensure_created()?;
        self.ensure_request_id(cmd.request_id)?;

        // Cancellable until real movement starts. InProgress and the terminal
        // states are out of reach; the trip machine enforces its own
        // pre-transit window independently.
        if !matches!(
            self.status,
            RequestStatus::Pending | RequestStatus::Approved | RequestStatus::Planned
        ) {
            return Err(DomainError::invalid_state(format!(
                "request can no longer be cancelled (status: {:?})",
                self.status
            )));
        }

        Ok(vec![RequestEvent::RequestCancelled(RequestCancelled {
            request_id: cmd.request_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
