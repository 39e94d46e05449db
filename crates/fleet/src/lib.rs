//! `cargoflow-fleet` — drivers, vehicles, and load compatibility.
//!
//! Drivers and vehicles are the scarce resources the planner commits to a
//! trip. Each holds at most one active trip at a time; the matcher decides
//! which vehicles can legally carry a given load.

pub mod driver;
pub mod matcher;
pub mod vehicle;

pub use driver::{
    AssignDriver, Driver, DriverCommand, DriverEvent, DriverId, DriverStatus, RegisterDriver,
    ReinstateDriver, ReleaseDriver, StartDriving, SuspendDriver,
};
pub use matcher::{compatible_vehicles, is_compatible};
pub use vehicle::{
    CommitVehicle, DecommissionVehicle, Envelope, FinishMaintenance, RegisterVehicle,
    ReleaseVehicle, StartMaintenance, Vehicle, VehicleCommand, VehicleEvent, VehicleId,
    VehicleStatus,
};
