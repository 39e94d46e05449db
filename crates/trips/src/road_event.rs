//! Reported road events along the network.
//!
//! Road events are recorded and queryable (active / blocking) but the
//! approval flow does not consult them before route computation; planners
//! read them out-of-band when reviewing a route.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{AggregateId, Entity, UserId};

/// Road event identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadEventId(pub AggregateId);

impl RoadEventId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for RoadEventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadEventKind {
    Accident,
    Roadworks,
    Closure,
    Weather,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    /// Critical events are the ones a route review treats as blocking.
    pub fn is_blocking(self) -> bool {
        matches!(self, Self::Critical)
    }
}

/// A reported disturbance on the road network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadEvent {
    id: RoadEventId,
    kind: RoadEventKind,
    severity: Severity,
    location: String,
    reported_by: UserId,
    active: bool,
    reported_at: DateTime<Utc>,
}

impl RoadEvent {
    pub fn new(
        id: RoadEventId,
        kind: RoadEventKind,
        severity: Severity,
        location: impl Into<String>,
        reported_by: UserId,
        reported_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            kind,
            severity,
            location: location.into(),
            reported_by,
            active: true,
            reported_at,
        }
    }

    pub fn id_typed(&self) -> RoadEventId {
        self.id
    }

    pub fn kind(&self) -> RoadEventKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn reported_by(&self) -> UserId {
        self.reported_by
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_blocking(&self) -> bool {
        self.active && self.severity.is_blocking()
    }

    pub fn reported_at(&self) -> DateTime<Utc> {
        self.reported_at
    }

    pub fn resolve(&mut self) {
        self.active = false;
    }
}

impl Entity for RoadEvent {
    type Id = RoadEventId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
