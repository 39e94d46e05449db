//! `cargoflow-workflow` — the orchestration layer.
//!
//! Multi-aggregate operations (approval, validation, planning, execution
//! tracking, cancellation) with explicit caller authorization at the gateway,
//! repository and collaborator ports, and best-effort audit/notification
//! fan-out.

pub mod assignment;
pub mod caller;
pub mod commit;
pub mod engine;
pub mod gateway;
pub mod ports;
pub mod repository;
pub mod validation;

pub use assignment::TripPlanner;
pub use caller::{Caller, Role};
pub use commit::{Commit, UnitOfWork};
pub use engine::{NewRequest, TripWorkflow};
pub use gateway::WorkflowGateway;
pub use ports::{AuditTrail, ComputedRoute, Notifier, RoutePlanError, RoutePlanner};
pub use repository::{
    DriverRepository, RequestRepository, RoadEventRepository, RouteRepository, TripRepository,
    VehicleRepository,
};
pub use validation::{RouteReview, RouteValidationService};
