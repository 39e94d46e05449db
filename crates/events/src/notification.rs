//! User-facing notification message.
//!
//! Notifications are fire-and-forget: the workflow emits them as a side
//! effect of committed transitions and never fails an operation because
//! delivery failed. No delivery guarantee is part of the core contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use cargoflow_core::{AggregateId, UserId};

/// What a notification is about; drives rendering/routing in the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    RequestApproved,
    RequestRejected,
    RouteValidated,
    RouteModificationRequested,
    TripAssigned,
    TripStatusChanged,
    TripCancelled,
}

/// A message addressed to one user, referencing the entity it is about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub message: String,
    pub ref_id: AggregateId,
    pub sent_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: UserId,
        kind: NotificationKind,
        message: impl Into<String>,
        ref_id: AggregateId,
    ) -> Self {
        Self {
            user_id,
            kind,
            message: message.into(),
            ref_id,
            sent_at: Utc::now(),
        }
    }
}
