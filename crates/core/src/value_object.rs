//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and compared by their attribute values; two
/// instances with the same values are the same value. `LoadDetails` and a
/// vehicle's `Envelope` are the canonical examples here: there is no "which
/// 12-tonne, 4-metre load", only the measurements matter.
///
/// To "modify" a value object, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
