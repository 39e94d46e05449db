use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use cargoflow_events::Event;

/// Driver identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DriverId(pub AggregateId);

impl DriverId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// Driver aggregates share their uuid with the driver's user account, so
    /// the workflow can authorize and notify without a lookup table.
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(*self.0.as_uuid())
    }
}

impl core::fmt::Display for DriverId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Driver operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverStatus {
    Free,
    Assigned,
    OnTheRoad,
    Suspended,
}

/// Aggregate root: Driver.
///
/// A driver carries at most one non-terminal trip at a time; the trip
/// reference is kept untyped (`AggregateId`) because the trips crate depends
/// on this one.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    id: DriverId,
    name: String,
    status: DriverStatus,
    active_trip: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl Driver {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: DriverId) -> Self {
        Self {
            id,
            name: String::new(),
            status: DriverStatus::Free,
            active_trip: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> DriverStatus {
        self.status
    }

    pub fn active_trip(&self) -> Option<AggregateId> {
        self.active_trip
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_free(&self) -> bool {
        matches!(self.status, DriverStatus::Free)
    }
}

impl AggregateRoot for Driver {
    type Id = DriverId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterDriver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterDriver {
    pub driver_id: DriverId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: AssignDriver (bind to a trip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignDriver {
    pub driver_id: DriverId,
    pub trip: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartDriving (trip entered transit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDriving {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseDriver (trip completed or cancelled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDriver {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SuspendDriver (taken out of the assignable pool).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspendDriver {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReinstateDriver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReinstateDriver {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriverCommand {
    RegisterDriver(RegisterDriver),
    AssignDriver(AssignDriver),
    StartDriving(StartDriving),
    ReleaseDriver(ReleaseDriver),
    SuspendDriver(SuspendDriver),
    ReinstateDriver(ReinstateDriver),
}

/// Event: DriverRegistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverRegistered {
    pub driver_id: DriverId,
    pub name: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DriverAssigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverAssigned {
    pub driver_id: DriverId,
    pub trip: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DriverDeparted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverDeparted {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DriverReleased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverReleased {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DriverSuspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverSuspended {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: DriverReinstated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverReinstated {
    pub driver_id: DriverId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DriverEvent {
    DriverRegistered(DriverRegistered),
    DriverAssigned(DriverAssigned),
    DriverDeparted(DriverDeparted),
    DriverReleased(DriverReleased),
    DriverSuspended(DriverSuspended),
    DriverReinstated(DriverReinstated),
}

impl Event for DriverEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DriverEvent::DriverRegistered(_) => "fleet.driver.registered",
            DriverEvent::DriverAssigned(_) => "fleet.driver.assigned",
            DriverEvent::DriverDeparted(_) => "fleet.driver.departed",
            DriverEvent::DriverReleased(_) => "fleet.driver.released",
            DriverEvent::DriverSuspended(_) => "fleet.driver.suspended",
            DriverEvent::DriverReinstated(_) => "fleet.driver.reinstated",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DriverEvent::DriverRegistered(e) => e.occurred_at,
            DriverEvent::DriverAssigned(e) => e.occurred_at,
            DriverEvent::DriverDeparted(e) => e.occurred_at,
            DriverEvent::DriverReleased(e) => e.occurred_at,
            DriverEvent::DriverSuspended(e) => e.occurred_at,
            DriverEvent::DriverReinstated(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Driver {
    type Command = DriverCommand;
    type Event = DriverEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            DriverEvent::DriverRegistered(e) => {
                self.id = e.driver_id;
                self.name = e.name.clone();
                self.status = DriverStatus::Free;
                self.active_trip = None;
                self.created = true;
            }
            DriverEvent::DriverAssigned(e) => {
                self.status = DriverStatus::Assigned;
                self.active_trip = Some(e.trip);
            }
            DriverEvent::DriverDeparted(_) => {
                self.status = DriverStatus::OnTheRoad;
            }
            DriverEvent::DriverReleased(_) => {
                self.status = DriverStatus::Free;
                self.active_trip = None;
            }
            DriverEvent::DriverSuspended(_) => {
                self.status = DriverStatus::Suspended;
            }
            DriverEvent::DriverReinstated(_) => {
                self.status = DriverStatus::Free;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DriverCommand::RegisterDriver(cmd) => self.handle_register(cmd),
            DriverCommand::AssignDriver(cmd) => self.handle_assign(cmd),
            DriverCommand::StartDriving(cmd) => self.handle_start_driving(cmd),
            DriverCommand::ReleaseDriver(cmd) => self.handle_release(cmd),
            DriverCommand::SuspendDriver(cmd) => self.handle_suspend(cmd),
            DriverCommand::ReinstateDriver(cmd) => self.handle_reinstate(cmd),
        }
    }
}

impl Driver {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterDriver) -> Result<Vec<DriverEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("driver already exists"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("driver name must be non-empty"));
        }

        Ok(vec![DriverEvent::DriverRegistered(DriverRegistered {
            driver_id: cmd.driver_id,
            name: cmd.name.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_assign(&self, cmd: &AssignDriver) -> Result<Vec<DriverEvent>, DomainError> {
        self.ensure_created()?;

        if !self.is_free() {
            return Err(DomainError::business_rule(format!(
                "driver is not free (status: {:?})",
                self.status
            )));
        }

        Ok(vec![DriverEvent::DriverAssigned(DriverAssigned {
            driver_id: cmd.driver_id,
            trip: cmd.trip,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_driving(&self, cmd: &StartDriving) -> Result<Vec<DriverEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != DriverStatus::Assigned {
            return Err(DomainError::invalid_state(format!(
                "driver can only depart once assigned (status: {:?})",
                self.status
            )));
        }

        Ok(vec![DriverEvent::DriverDeparted(DriverDeparted {
            driver_id: cmd.driver_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseDriver) -> Result<Vec<DriverEvent>, DomainError> {
        self.ensure_created()?;

        if !matches!(self.status, DriverStatus::Assigned | DriverStatus::OnTheRoad) {
            return Err(DomainError::invalid_state(format!(
                "driver has no assignment to release (status: {:?})",
                self.status
            )));
        }

        Ok(vec![DriverEvent::DriverReleased(DriverReleased {
            driver_id: cmd.driver_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_suspend(&self, cmd: &SuspendDriver) -> Result<Vec<DriverEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != DriverStatus::Free {
            return Err(DomainError::invalid_state(format!(
                "only free drivers can be suspended (status: {:?})",
                self.status
            )));
        }

        Ok(vec![DriverEvent::DriverSuspended(DriverSuspended {
            driver_id: cmd.driver_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reinstate(&self, cmd: &ReinstateDriver) -> Result<Vec<DriverEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != DriverStatus::Suspended {
            return Err(DomainError::invalid_state(format!(
                "only suspended drivers can be reinstated (status: {:?})",
                self.status
            )));
        }

        Ok(vec![DriverEvent::DriverReinstated(DriverReinstated {
            driver_id: cmd.driver_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
