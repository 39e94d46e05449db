//! Load/vehicle compatibility.
//!
//! Matching is a pure predicate over the vehicle envelope and the cargo
//! measurements. No unit conversion happens here; both sides are already in
//! kilograms and metres.

use cargoflow_requests::LoadDetails;

use crate::vehicle::{Envelope, Vehicle};

/// True when the envelope dominates the load on every dimension.
pub fn is_compatible(envelope: &Envelope, load: &LoadDetails) -> bool {
    envelope.dominates(load)
}

/// Filter a fleet down to the vehicles that are available and whose envelope
/// dominates the load. Order of the input is preserved.
pub fn compatible_vehicles<'a, I>(vehicles: I, load: &LoadDetails) -> Vec<&'a Vehicle>
where
    I: IntoIterator<Item = &'a Vehicle>,
{
    vehicles
        .into_iter()
        .filter(|v| v.can_carry(load))
        .collect()
}
