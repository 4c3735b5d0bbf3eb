//! Error types for HRDB operations

use crate::{EntityKind, ExternalId, TenantId};
use thiserror::Error;

/// Storage layer errors.
///
/// "Not found" is never a `StorageError`: backends report it as `Ok(None)` or
/// `Ok(false)`. Anything in here means the outcome of the call is unknown.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed for {entity:?}: {reason}")]
    Serialization { entity: EntityKind, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised when an operation would break an invariant.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("External id {value} is outside the per-tenant id space (max {max})")]
    ExternalIdOutOfRange { value: u64, max: u32 },

    #[error("No {entity:?} ids left in tenant {tenant_id}")]
    IdSpaceExhausted { entity: EntityKind, tenant_id: TenantId },

    #[error("Employee {employee_id} is not a member of department {department_id}")]
    HeadNotMember {
        department_id: ExternalId,
        employee_id: ExternalId,
    },

    #[error("Department {department_id} lists unknown employee {employee_id}")]
    UnknownMember {
        department_id: ExternalId,
        employee_id: ExternalId,
    },

    #[error("Employee {employee_id} and department {department_id} disagree on membership")]
    MembershipMismatch {
        department_id: ExternalId,
        employee_id: ExternalId,
    },

    #[error("{entity:?} id {id} is already taken")]
    IdConflict { entity: EntityKind, id: u64 },

    #[error("{field} must be a finite number, got {value}")]
    NonFiniteValue { field: &'static str, value: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all HRDB errors.
#[derive(Debug, Clone, Error)]
pub enum HrdbError {
    #[error("{entity:?} not found: {id}")]
    NotFound { entity: EntityKind, id: u64 },

    #[error("Invalid state: {0}")]
    InvalidState(#[from] ValidationError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl HrdbError {
    /// Tenant lookup miss, the one `NotFound` that is raised rather than
    /// returned as `None`.
    pub fn tenant_not_found(tenant_id: TenantId) -> Self {
        HrdbError::NotFound {
            entity: EntityKind::Organization,
            id: u64::from(tenant_id.get()),
        }
    }

    /// True if the error means the store outcome is unknown.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, HrdbError::StoreUnavailable(_))
    }
}

/// Result type alias for HRDB operations.
pub type HrdbResult<T> = Result<T, HrdbError>;

/// Result type alias for storage backend calls.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// TESTS
// =============================================================================
