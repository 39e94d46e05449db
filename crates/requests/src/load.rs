//! Cargo specification value object.

use serde::{Deserialize, Serialize};

use cargoflow_core::{DomainError, DomainResult, ValueObject};

/// Broad category of exceptional cargo; informational, not used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadKind {
    Machinery,
    Prefab,
    IndustrialTank,
    WindBlade,
    Other,
}

/// Physical description of the cargo: weight plus three spatial dimensions.
///
/// Canonical units are kilograms and metres. No implicit conversion happens
/// anywhere in the system; callers must submit canonical values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadDetails {
    pub weight_kg: f64,
    pub height_m: f64,
    pub width_m: f64,
    pub length_m: f64,
    pub kind: LoadKind,
}

impl LoadDetails {
    pub fn new(
        weight_kg: f64,
        height_m: f64,
        width_m: f64,
        length_m: f64,
        kind: LoadKind,
    ) -> DomainResult<Self> {
        let load = Self {
            weight_kg,
            height_m,
            width_m,
            length_m,
            kind,
        };
        load.validate()?;
        Ok(load)
    }

    /// All four measurements must be strictly positive and finite.
    pub fn validate(&self) -> DomainResult<()> {
        for (name, value) in [
            ("weight_kg", self.weight_kg),
            ("height_m", self.height_m),
            ("width_m", self.width_m),
            ("length_m", self.length_m),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(DomainError::validation(format!(
                    "{name} must be strictly positive (got {value})"
                )));
            }
        }
        Ok(())
    }
}

impl ValueObject for LoadDetails {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_positive_dimensions() {
        let load = LoadDetails::new(1500.0, 3.2, 2.5, 12.0, LoadKind::Machinery);
        assert!(load.is_ok());
    }

    #[test]
    fn rejects_zero_weight() {
        let err = LoadDetails::new(0.0, 3.2, 2.5, 12.0, LoadKind::Machinery).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("weight_kg")));
    }

    #[test]
    fn rejects_negative_length() {
        let err = LoadDetails::new(1500.0, 3.2, 2.5, -1.0, LoadKind::Prefab).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("length_m")));
    }

    #[test]
    fn rejects_non_finite_height() {
        let err =
            LoadDetails::new(1500.0, f64::NAN, 2.5, 12.0, LoadKind::IndustrialTank).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: a load with any non-positive dimension never validates.
            #[test]
            fn non_positive_dimension_never_validates(
                weight in -1000.0f64..=0.0,
                h in 0.1f64..10.0,
                w in 0.1f64..10.0,
                l in 0.1f64..50.0,
            ) {
                prop_assert!(LoadDetails::new(weight, h, w, l, LoadKind::Other).is_err());
            }

            /// Property: strictly positive finite dimensions always validate.
            #[test]
            fn positive_dimensions_always_validate(
                weight in 0.1f64..500_000.0,
                h in 0.01f64..20.0,
                w in 0.01f64..20.0,
                l in 0.01f64..100.0,
            ) {
                prop_assert!(LoadDetails::new(weight, h, w, l, LoadKind::Other).is_ok());
            }
        }
    }
}
