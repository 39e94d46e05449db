//! `cargoflow-trips` — the operational unit of a transport order.
//!
//! A `Trip` is created when a request is approved and carries the route
//! binding, the validation cycle, and the resource assignment through to
//! completion. `Route` rows are write-once; `RoadEvent`s are advisory.

pub mod road_event;
pub mod route;
pub mod trip;

pub use road_event::{RoadEvent, RoadEventId, RoadEventKind, Severity};
pub use route::{GeoPoint, Route, RouteId};
pub use trip::{
    AcceptAssignment, ApproveRoute, AssignResources, AttachRoute, CancelTrip, CompleteTrip,
    OpenTrip, PauseTransit, RequestRouteChange, ResumeTransit, StartDelivery, StartTransit,
    Trip, TripCode, TripCommand, TripEvent, TripId, TripStatus,
};
