//! `cargoflow-requests` — the client-facing transport order.
//!
//! A `TransportRequest` carries the cargo specification and the
//! origin/destination pair; once approved it is shadowed by a `Trip` and
//! mutated only by the workflow.

pub mod load;
pub mod request;

pub use load::{LoadDetails, LoadKind};
pub use request::{
    CancelRequest, MarkApproved, MarkCompleted, MarkInProgress, MarkPlanned, RejectRequest,
    RequestCommand, RequestEvent, RequestId, RequestStatus, SubmitRequest, TransportRequest,
};
