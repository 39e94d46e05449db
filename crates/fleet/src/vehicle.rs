use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{Aggregate, AggregateId, AggregateRoot, DomainError, DomainResult, ValueObject};
use cargoflow_events::Event;
use cargoflow_requests::LoadDetails;

/// Vehicle identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub AggregateId);

impl VehicleId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Maximum load a vehicle can legally carry: weight plus three spatial
/// dimensions, in kilograms and metres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub max_load_kg: f64,
    pub max_height_m: f64,
    pub max_width_m: f64,
    pub max_length_m: f64,
}

impl Envelope {
    pub fn new(
        max_load_kg: f64,
        max_height_m: f64,
        max_width_m: f64,
        max_length_m: f64,
    ) -> DomainResult<Self> {
        let envelope = Self {
            max_load_kg,
            max_height_m,
            max_width_m,
            max_length_m,
        };
        envelope.validate()?;
        Ok(envelope)
    }

    pub fn validate(&self) -> DomainResult<()> {
        for (name, value) in [
            ("max_load_kg", self.max_load_kg),
            ("max_height_m", self.max_height_m),
            ("max_width_m", self.max_width_m),
            ("max_length_m", self.max_length_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DomainError::validation(format!(
                    "{name} must be strictly positive (got {value})"
                )));
            }
        }
        Ok(())
    }

    /// Component-wise dominance: every envelope limit must meet or exceed
    /// the corresponding load measurement. Equality is acceptable.
    pub fn dominates(&self, load: &LoadDetails) -> bool {
        self.max_load_kg >= load.weight_kg
            && self.max_height_m >= load.height_m
            && self.max_width_m >= load.width_m
            && self.max_length_m >= load.length_m
    }
}

impl ValueObject for Envelope {}

/// Vehicle operational status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleStatus {
    Available,
    InUse,
    Maintenance,
    Decommissioned,
}

/// Aggregate root: Vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    id: VehicleId,
    plate: String,
    model: String,
    envelope: Envelope,
    status: VehicleStatus,
    active_trip: Option<AggregateId>,
    version: u64,
    created: bool,
}

impl Vehicle {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: VehicleId) -> Self {
        Self {
            id,
            plate: String::new(),
            model: String::new(),
            envelope: Envelope {
                max_load_kg: 1.0,
                max_height_m: 1.0,
                max_width_m: 1.0,
                max_length_m: 1.0,
            },
            status: VehicleStatus::Available,
            active_trip: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> VehicleId {
        self.id
    }

    pub fn plate(&self) -> &str {
        &self.plate
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn status(&self) -> VehicleStatus {
        self.status
    }

    pub fn active_trip(&self) -> Option<AggregateId> {
        self.active_trip
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_available(&self) -> bool {
        matches!(self.status, VehicleStatus::Available)
    }

    /// An available vehicle whose envelope dominates the load.
    pub fn can_carry(&self, load: &LoadDetails) -> bool {
        self.is_available() && self.envelope.dominates(load)
    }
}

impl AggregateRoot for Vehicle {
    type Id = VehicleId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RegisterVehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterVehicle {
    pub vehicle_id: VehicleId,
    pub plate: String,
    pub model: String,
    pub envelope: Envelope,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CommitVehicle (bind to a trip).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitVehicle {
    pub vehicle_id: VehicleId,
    pub trip: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReleaseVehicle (trip completed or cancelled).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseVehicle {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: StartMaintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartMaintenance {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: FinishMaintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishMaintenance {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DecommissionVehicle (permanent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecommissionVehicle {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VehicleCommand {
    RegisterVehicle(RegisterVehicle),
    CommitVehicle(CommitVehicle),
    ReleaseVehicle(ReleaseVehicle),
    StartMaintenance(StartMaintenance),
    FinishMaintenance(FinishMaintenance),
    DecommissionVehicle(DecommissionVehicle),
}

/// Event: VehicleRegistered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRegistered {
    pub vehicle_id: VehicleId,
    pub plate: String,
    pub model: String,
    pub envelope: Envelope,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VehicleCommitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleCommitted {
    pub vehicle_id: VehicleId,
    pub trip: AggregateId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VehicleReleased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleReleased {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VehicleMaintenanceStarted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMaintenanceStarted {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VehicleMaintenanceFinished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleMaintenanceFinished {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: VehicleDecommissioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleDecommissioned {
    pub vehicle_id: VehicleId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VehicleEvent {
    VehicleRegistered(VehicleRegistered),
    VehicleCommitted(VehicleCommitted),
    VehicleReleased(VehicleReleased),
    VehicleMaintenanceStarted(VehicleMaintenanceStarted),
    VehicleMaintenanceFinished(VehicleMaintenanceFinished),
    VehicleDecommissioned(VehicleDecommissioned),
}

impl Event for VehicleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            VehicleEvent::VehicleRegistered(_) => "fleet.vehicle.registered",
            VehicleEvent::VehicleCommitted(_) => "fleet.vehicle.committed",
            VehicleEvent::VehicleReleased(_) => "fleet.vehicle.released",
            VehicleEvent::VehicleMaintenanceStarted(_) => "fleet.vehicle.maintenance_started",
            VehicleEvent::VehicleMaintenanceFinished(_) => "fleet.vehicle.maintenance_finished",
            VehicleEvent::VehicleDecommissioned(_) => "fleet.vehicle.decommissioned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            VehicleEvent::VehicleRegistered(e) => e.occurred_at,
            VehicleEvent::VehicleCommitted(e) => e.occurred_at,
            VehicleEvent::VehicleReleased(e) => e.occurred_at,
            VehicleEvent::VehicleMaintenanceStarted(e) => e.occurred_at,
            VehicleEvent::VehicleMaintenanceFinished(e) => e.occurred_at,
            VehicleEvent::VehicleDecommissioned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Vehicle {
    type Command = VehicleCommand;
    type Event = VehicleEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            VehicleEvent::VehicleRegistered(e) => {
                self.id = e.vehicle_id;
                self.plate = e.plate.clone();
                self.model = e.model.clone();
                self.envelope = e.envelope;
                self.status = VehicleStatus::Available;
                self.active_trip = None;
                self.created = true;
            }
            VehicleEvent::VehicleCommitted(e) => {
                self.status = VehicleStatus::InUse;
                self.active_trip = Some(e.trip);
            }
            VehicleEvent::VehicleReleased(_) => {
                self.status = VehicleStatus::Available;
                self.active_trip = None;
            }
            VehicleEvent::VehicleMaintenanceStarted(_) => {
                self.status = VehicleStatus::Maintenance;
            }
            VehicleEvent::VehicleMaintenanceFinished(_) => {
                self.status = VehicleStatus::Available;
            }
            VehicleEvent::VehicleDecommissioned(_) => {
                self.status = VehicleStatus::Decommissioned;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            VehicleCommand::RegisterVehicle(cmd) => self.handle_register(cmd),
            VehicleCommand::CommitVehicle(cmd) => self.handle_commit(cmd),
            VehicleCommand::ReleaseVehicle(cmd) => self.handle_release(cmd),
            VehicleCommand::StartMaintenance(cmd) => self.handle_start_maintenance(cmd),
            VehicleCommand::FinishMaintenance(cmd) => self.handle_finish_maintenance(cmd),
            VehicleCommand::DecommissionVehicle(cmd) => self.handle_decommission(cmd),
        }
    }
}

impl Vehicle {
    fn ensure_created(&self) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        Ok(())
    }

    fn handle_register(&self, cmd: &RegisterVehicle) -> Result<Vec<VehicleEvent>, DomainError> {
        if self.created {
            return Err(DomainError::invalid_state("vehicle already exists"));
        }
        if cmd.plate.trim().is_empty() {
            return Err(DomainError::validation("vehicle plate must be non-empty"));
        }
        cmd.envelope.validate()?;

        Ok(vec![VehicleEvent::VehicleRegistered(VehicleRegistered {
            vehicle_id: cmd.vehicle_id,
            plate: cmd.plate.clone(),
            model: cmd.model.clone(),
            envelope: cmd.envelope,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_commit(&self, cmd: &CommitVehicle) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_created()?;

        if !self.is_available() {
            return Err(DomainError::business_rule(format!(
                "vehicle is not available (status: {:?})",
                self.status
            )));
        }

        Ok(vec![VehicleEvent::VehicleCommitted(VehicleCommitted {
            vehicle_id: cmd.vehicle_id,
            trip: cmd.trip,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_release(&self, cmd: &ReleaseVehicle) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != VehicleStatus::InUse {
            return Err(DomainError::invalid_state(format!(
                "vehicle has no commitment to release (status: {:?})",
                self.status
            )));
        }

        Ok(vec![VehicleEvent::VehicleReleased(VehicleReleased {
            vehicle_id: cmd.vehicle_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_start_maintenance(
        &self,
        cmd: &StartMaintenance,
    ) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != VehicleStatus::Available {
            return Err(DomainError::invalid_state(format!(
                "only available vehicles can enter maintenance (status: {:?})",
                self.status
            )));
        }

        Ok(vec![VehicleEvent::VehicleMaintenanceStarted(
            VehicleMaintenanceStarted {
                vehicle_id: cmd.vehicle_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_finish_maintenance(
        &self,
        cmd: &FinishMaintenance,
    ) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_created()?;

        if self.status != VehicleStatus::Maintenance {
            return Err(DomainError::invalid_state(format!(
                "vehicle is not in maintenance (status: {:?})",
                self.status
            )));
        }

        Ok(vec![VehicleEvent::VehicleMaintenanceFinished(
            VehicleMaintenanceFinished {
                vehicle_id: cmd.vehicle_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_decommission(
        &self,
        cmd: &DecommissionVehicle,
    ) -> Result<Vec<VehicleEvent>, DomainError> {
        self.ensure_created()?;

        if !matches!(
            self.status,
            VehicleStatus::Available | VehicleStatus::Maintenance
        ) {
            return Err(DomainError::invalid_state(format!(
                "vehicle cannot be decommissioned (status: {:?})",
                self.status
            )));
        }

        Ok(vec![VehicleEvent::VehicleDecommissioned(
            VehicleDecommissioned {
                vehicle_id: cmd.vehicle_id,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cargoflow_requests::LoadKind;

    fn test_vehicle_id() -> VehicleId {
        VehicleId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn wide_envelope() -> Envelope {
        Envelope::new(40_000.0, 4.5, 3.5, 25.0).unwrap()
    }

    fn registered_vehicle(envelope: Envelope) -> Vehicle {
        let id = test_vehicle_id();
        let mut vehicle = Vehicle::empty(id);
        let events = vehicle
            .handle(&VehicleCommand::RegisterVehicle(RegisterVehicle {
                vehicle_id: id,
                plate: "TR 482 KX".to_string(),
                model: "Goldhofer THP".to_string(),
                envelope,
                occurred_at: test_time(),
            }))
            .unwrap();
        vehicle.apply(&events[0]);
        vehicle
    }

    #[test]
    fn registered_vehicle_is_available() {
        let vehicle = registered_vehicle(wide_envelope());
        assert_eq!(vehicle.status(), VehicleStatus::Available);
        assert!(vehicle.active_trip().is_none());
    }

    #[test]
    fn register_rejects_empty_plate() {
        let id = test_vehicle_id();
        let vehicle = Vehicle::empty(id);
        let err = vehicle
            .handle(&VehicleCommand::RegisterVehicle(RegisterVehicle {
                vehicle_id: id,
                plate: "  ".to_string(),
                model: "Goldhofer THP".to_string(),
                envelope: wide_envelope(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn commit_requires_available() {
        let mut vehicle = registered_vehicle(wide_envelope());
        let id = vehicle.id_typed();
        let trip = AggregateId::new();

        let events = vehicle
            .handle(&VehicleCommand::CommitVehicle(CommitVehicle {
                vehicle_id: id,
                trip,
                occurred_at: test_time(),
            }))
            .unwrap();
        vehicle.apply(&events[0]);
        assert_eq!(vehicle.status(), VehicleStatus::InUse);
        assert_eq!(vehicle.active_trip(), Some(trip));

        let err = vehicle
            .handle(&VehicleCommand::CommitVehicle(CommitVehicle {
                vehicle_id: id,
                trip: AggregateId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn release_returns_vehicle_to_pool() {
        let mut vehicle = registered_vehicle(wide_envelope());
        let id = vehicle.id_typed();

        for cmd in [
            VehicleCommand::CommitVehicle(CommitVehicle {
                vehicle_id: id,
                trip: AggregateId::new(),
                occurred_at: test_time(),
            }),
            VehicleCommand::ReleaseVehicle(ReleaseVehicle {
                vehicle_id: id,
                occurred_at: test_time(),
            }),
        ] {
            let events = vehicle.handle(&cmd).unwrap();
            vehicle.apply(&events[0]);
        }

        assert_eq!(vehicle.status(), VehicleStatus::Available);
        assert!(vehicle.active_trip().is_none());
    }

    #[test]
    fn decommissioned_vehicle_accepts_no_further_commands() {
        let mut vehicle = registered_vehicle(wide_envelope());
        let id = vehicle.id_typed();

        let events = vehicle
            .handle(&VehicleCommand::DecommissionVehicle(DecommissionVehicle {
                vehicle_id: id,
                occurred_at: test_time(),
            }))
            .unwrap();
        vehicle.apply(&events[0]);

        let err = vehicle
            .handle(&VehicleCommand::CommitVehicle(CommitVehicle {
                vehicle_id: id,
                trip: AggregateId::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::BusinessRule(_)));
    }

    #[test]
    fn envelope_dominates_on_equality() {
        let envelope = Envelope::new(1500.0, 3.2, 2.5, 12.0).unwrap();
        let load = LoadDetails::new(1500.0, 3.2, 2.5, 12.0, LoadKind::Machinery).unwrap();
        assert!(envelope.dominates(&load));
    }

    #[test]
    fn envelope_rejects_single_exceeded_dimension() {
        let envelope = Envelope::new(40_000.0, 4.5, 3.5, 25.0).unwrap();
        let load = LoadDetails::new(1500.0, 4.6, 2.5, 12.0, LoadKind::Machinery).unwrap();
        assert!(!envelope.dominates(&load));
    }
}
