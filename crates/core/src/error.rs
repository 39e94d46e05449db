//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures. Infrastructure
/// concerns (IO, serialization) belong elsewhere; the one exception is
/// `ExternalService`, which wraps a collaborator failure (route computation)
/// that callers may retry.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. non-positive load dimension).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An operation was attempted from a state that does not permit it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A domain constraint was violated (incompatible envelope, resource
    /// already committed, ...).
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity is absent (client-visible 404 equivalent).
    #[error("not found")]
    NotFound,

    /// A conflict occurred (stale version / optimistic concurrency).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An external collaborator failed; no local state was changed.
    #[error("external service failure: {0}")]
    ExternalService(String),

    /// Authorization failure at the workflow boundary.
    #[error("unauthorized")]
    Unauthorized,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn external_service(msg: impl Into<String>) -> Self {
        Self::ExternalService(msg.into())
    }

    pub fn not_found() -> Self {
        Self::NotFound
    }

    /// Whether retrying the same call (unchanged input) can ever succeed.
    ///
    /// Only external collaborator failures and concurrency conflicts are
    /// retryable; everything else is deterministic.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService(_) | Self::Conflict(_))
    }
}
