//! HRDB Core - Entity Types
//!
//! Data structures shared by every HRDB crate: tenant-scoped identifiers,
//! organization entities, the error taxonomy, configuration, the
//! organization tree view and department statistics.

pub mod config;
pub mod entities;
pub mod error;
pub mod hierarchy;
pub mod identity;
pub mod stats;

pub use config::{HrdbConfig, StorageKind, DEFAULT_LMDB_MAX_SIZE_MB, MAX_LMDB_MAX_SIZE_MB};
pub use entities::{Department, DepartmentDraft, Employee, EmployeeDraft, Organization};
pub use error::{
    ConfigError, HrdbError, HrdbResult, StorageError, StorageResult, ValidationError,
};
pub use hierarchy::{
    DepartmentSummary, NodeKind, NodeRef, OrgNode, OrganizationSummary, TenantSnapshot,
};
pub use identity::{EntityKind, ExternalId, FlatId, TenantId, EXTERNAL_ID_SPACE};
pub use stats::{PerformanceStatistics, PositionHistogram, SalaryStatistics};
