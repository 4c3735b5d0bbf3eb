//! Tenant-scoped identifier codec.
//!
//! The backing store addresses departments and employees by a single
//! [`FlatId`]: `tenant * EXTERNAL_ID_SPACE + external`. Because an
//! [`ExternalId`] is always below [`EXTERNAL_ID_SPACE`], two tenants can never
//! produce the same flat id, and every tenant owns one contiguous range.
//!
//! # Binary Format
//!
//! LMDB keys are fixed 10-byte arrays:
//! - Bytes 0-3: tenant id (big-endian)
//! - Byte 4: separator (0xFF)
//! - Byte 5: entity kind
//! - Bytes 6-9: external id (big-endian)
//!
//! Keys sort by tenant first, so one prefix scan reads a whole tenant.

use hrdb_core::{EntityKind, ExternalId, FlatId, TenantId, EXTERNAL_ID_SPACE};
use std::ops::RangeInclusive;

/// Separator byte between tenant id and the rest of the key.
const SEPARATOR: u8 = 0xFF;

/// Length of an encoded storage key.
pub const KEY_LEN: usize = 10;

/// Length of a tenant prefix.
pub const PREFIX_LEN: usize = 5;

const MULTIPLIER: u64 = EXTERNAL_ID_SPACE as u64;

/// Stateless codec between (tenant, external id) pairs and store ids.
#[derive(Debug, Clone, Copy, Default)]
pub struct TenantKeyCodec;

impl TenantKeyCodec {
    /// Combine a tenant and an external id into a flat id.
    pub fn encode(tenant_id: TenantId, external_id: ExternalId) -> FlatId {
        FlatId::from_raw(u64::from(tenant_id.get()) * MULTIPLIER + u64::from(external_id.get()))
    }

    /// Split a flat id produced by [`TenantKeyCodec::encode`].
    ///
    /// The flat id must come from `encode`; a raw value above the largest
    /// encodable id has no meaningful tenant.
    pub fn decode(flat: FlatId) -> (TenantId, ExternalId) {
        (Self::tenant_of(flat), ExternalId::from_remainder(flat.get()))
    }

    /// Tenant part of a flat id.
    pub fn tenant_of(flat: FlatId) -> TenantId {
        TenantId::new((flat.get() / MULTIPLIER) as u32)
    }

    /// Every flat id a tenant can own.
    pub fn tenant_range(tenant_id: TenantId) -> RangeInclusive<FlatId> {
        Self::encode(tenant_id, ExternalId::from_remainder(0))
            ..=Self::encode(tenant_id, ExternalId::MAX)
    }

    /// LMDB key of a record. Organizations use external id 0.
    pub fn storage_key(tenant_id: TenantId, kind: EntityKind, external_id: u32) -> [u8; KEY_LEN] {
        let mut bytes = [0u8; KEY_LEN];
        bytes[0..PREFIX_LEN].copy_from_slice(&Self::tenant_prefix(tenant_id));
        bytes[5] = kind_to_byte(kind);
        bytes[6..10].copy_from_slice(&external_id.to_be_bytes());
        bytes
    }

    /// Parse an LMDB key back into its parts.
    ///
    /// Returns `None` for keys of the wrong length, a missing separator or
    /// an unknown entity kind.
    pub fn parse_storage_key(bytes: &[u8]) -> Option<(TenantId, EntityKind, u32)> {
        if bytes.len() != KEY_LEN || bytes[4] != SEPARATOR {
            return None;
        }
        let tenant = u32::from_be_bytes(bytes[0..4].try_into().ok()?);
        let kind = byte_to_kind(bytes[5])?;
        let external = u32::from_be_bytes(bytes[6..10].try_into().ok()?);
        Some((TenantId::new(tenant), kind, external))
    }

    /// Prefix shared by every key of one tenant.
    pub fn tenant_prefix(tenant_id: TenantId) -> [u8; PREFIX_LEN] {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix[0..4].copy_from_slice(&tenant_id.get().to_be_bytes());
        prefix[4] = SEPARATOR;
        prefix
    }
}

fn kind_to_byte(kind: EntityKind) -> u8 {
    match kind {
        EntityKind::Organization => 0,
        EntityKind::Department => 1,
        EntityKind::Employee => 2,
    }
}

fn byte_to_kind(byte: u8) -> Option<EntityKind> {
    match byte {
        0 => Some(EntityKind::Organization),
        1 => Some(EntityKind::Department),
        2 => Some(EntityKind::Employee),
        _ => None,
    }
}
