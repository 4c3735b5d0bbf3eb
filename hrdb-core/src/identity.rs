//! Identity types for HRDB entities
//!
//! Every department and employee carries an [`ExternalId`] that is only
//! meaningful inside its tenant. The backing store addresses records by a
//! [`FlatId`] derived from the tenant id and the external id.

use crate::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of external ids available to each tenant per entity kind.
///
/// External ids live in `0..EXTERNAL_ID_SPACE`; the flat id of a record is
/// `tenant * EXTERNAL_ID_SPACE + external`.
pub const EXTERNAL_ID_SPACE: u32 = 10_000;

/// Tenant (organization) identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(u32);

impl TenantId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for TenantId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a department or employee within one tenant.
///
/// Always below [`EXTERNAL_ID_SPACE`]; the only way to build one from a raw
/// number is the fallible [`ExternalId::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct ExternalId(u32);

impl ExternalId {
    /// Largest valid external id.
    pub const MAX: ExternalId = ExternalId(EXTERNAL_ID_SPACE - 1);

    /// First id handed out in an empty tenant.
    pub const FIRST: ExternalId = ExternalId(1);

    /// Validate a raw external id.
    pub fn new(raw: u32) -> Result<Self, ValidationError> {
        if raw < EXTERNAL_ID_SPACE {
            Ok(Self(raw))
        } else {
            Err(ValidationError::ExternalIdOutOfRange {
                value: u64::from(raw),
                max: Self::MAX.0,
            })
        }
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Reduce any raw value into the id space (`raw % EXTERNAL_ID_SPACE`).
    pub fn from_remainder(raw: u64) -> Self {
        Self((raw % u64::from(EXTERNAL_ID_SPACE)) as u32)
    }

    /// The id after this one, if the id space has room for it.
    pub fn next(self) -> Option<Self> {
        Self::new(self.0 + 1).ok()
    }
}

impl TryFrom<u32> for ExternalId {
    type Error = ValidationError;

    fn try_from(raw: u32) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl From<ExternalId> for u32 {
    fn from(id: ExternalId) -> Self {
        id.0
    }
}

impl fmt::Display for ExternalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Store-wide identifier produced by the tenant key codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlatId(u64);

impl FlatId {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FlatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity kind discriminator, used in errors and storage keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Organization,
    Department,
    Employee,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Organization => "Organization",
            EntityKind::Department => "Department",
            EntityKind::Employee => "Employee",
        };
        f.write_str(name)
    }
}
