//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into
//! [`VisionHubError`] via `#[from]`.

/// Top-level error returned by domain and application operations.
#[derive(Debug, thiserror::Error)]
pub enum VisionHubError {
    /// Input failed a domain invariant.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A status string did not name a known device status.
    #[error("invalid status")]
    InvalidStatus(#[from] InvalidStatusError),

    /// The targeted record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// The persistence layer failed. Opaque to the core, never retried.
    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Domain invariant violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,

    #[error("location must not be empty")]
    EmptyLocation,

    #[error("device type is required")]
    MissingDeviceType,

    #[error("invalid device type: {0}")]
    InvalidDeviceType(String),

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("invalid email address: {0}")]
    InvalidEmail(String),

    #[error("credential must not be empty")]
    EmptyCredential,

    #[error("invalid user role: {0}")]
    InvalidRole(String),

    #[error("username already taken: {0}")]
    DuplicateUsername(String),
}

/// A raw string that is not one of the device statuses.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid device status: {value}")]
pub struct InvalidStatusError {
    pub value: String,
}

/// An operation referenced an id that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}
