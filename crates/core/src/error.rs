//! Error model shared by the domain, repository and service layers.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type returned by application services.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business failures (validation,
/// preconditions, uniqueness). Persistence failures are `RepositoryError`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input or resulting state failed validation.
    #[error("invalid argument [{code}]: {message}")]
    InvalidArgument { code: &'static str, message: String },

    /// The operation is not allowed in the current state.
    #[error("failed precondition [{code}]: {message}")]
    FailedPrecondition { code: &'static str, message: String },

    /// A requested resource was not found.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// A resource with the same natural key already exists.
    #[error("{resource} already exists")]
    AlreadyExists { resource: &'static str },

    /// A stale version was detected. Callers should reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn invalid_argument(code: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidArgument {
            code,
            message: msg.into(),
        }
    }

    pub fn failed_precondition(code: &'static str, msg: impl Into<String>) -> Self {
        Self::FailedPrecondition {
            code,
            message: msg.into(),
        }
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn already_exists(resource: &'static str) -> Self {
        Self::AlreadyExists { resource }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Stable machine-readable code, when the variant carries one.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { code, .. } | Self::FailedPrecondition { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Persistence-boundary error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// Optimistic concurrency check failed (stored version moved on).
    #[error("concurrency conflict: {0}")]
    Conflict(String),

    /// A page token could not be opened, was forged, or does not match the request.
    #[error("malformed page token: {0}")]
    MalformedToken(String),

    /// The backing store failed (IO, driver, decoding).
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn malformed_token(msg: impl Into<String>) -> Self {
        Self::MalformedToken(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}

/// Error returned by application services.
///
/// Services never retry. A `Conflict` means the caller should reload and try
/// again; a `Publish` failure means the state change was persisted but its
/// events were not handed off.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("event publication failed: {0}")]
    Publish(String),
}

impl ServiceError {
    /// True when the failure is an optimistic concurrency conflict at any layer.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::Domain(DomainError::Conflict(_)) | Self::Repository(RepositoryError::Conflict(_))
        )
    }

    /// True when the failure is a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Domain(DomainError::NotFound { .. }))
    }
}
