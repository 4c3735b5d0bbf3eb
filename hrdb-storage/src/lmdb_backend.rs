//! LMDB-backed storage with tenant-prefixed keys.
//!
//! Uses the heed crate (Rust bindings for LMDB). Every record lives in the
//! unnamed database under a key built by [`TenantKeyCodec::storage_key`];
//! values are JSON. A small `meta` database holds the tenant id allocator.
//!
//! # Transactions
//!
//! - Point lookups use a read transaction and a single `get`
//! - Tenant-wide reads load every row under the tenant prefix
//! - Writes load the tenant inside a write transaction, apply the change
//!   through the shared row rules, write back only the rows that changed and
//!   commit. A rejected write drops the transaction, which aborts it.

use std::collections::BTreeMap;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use hrdb_core::{
    EntityKind, FlatId, Organization, StorageError, StorageResult, TenantId,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::TenantKeyCodec;
use crate::records::{DepartmentRecord, EmployeeRecord, TenantRows};
use crate::StorageBackend;

fn txn_failed(e: heed::Error) -> StorageError {
    StorageError::TransactionFailed {
        reason: e.to_string(),
    }
}

fn decode<T: DeserializeOwned>(kind: EntityKind, bytes: &[u8]) -> StorageResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StorageError::Serialization {
        entity: kind,
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(kind: EntityKind, value: &T) -> StorageResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| StorageError::Serialization {
        entity: kind,
        reason: e.to_string(),
    })
}

/// Meta key holding the largest tenant id ever allocated (u32, big-endian).
const LAST_TENANT_KEY: &[u8] = b"last_tenant";

const BYTES_PER_MB: usize = 1024 * 1024;

fn record_key(kind: EntityKind, id: FlatId) -> [u8; crate::cache::tenant_key::KEY_LEN] {
    let (tenant, external) = TenantKeyCodec::decode(id);
    TenantKeyCodec::storage_key(tenant, kind, external.get())
}

/// LMDB storage backend.
pub struct LmdbStorage {
    /// The LMDB environment.
    env: Env,
    /// The main database (unnamed).
    db: Database<Bytes, Bytes>,
    /// Allocator state, kept apart from the tenant-prefixed keys.
    meta: Database<Bytes, Bytes>,
}

impl LmdbStorage {
    /// Open (or create) an LMDB environment at `path`.
    ///
    /// `max_size_mb` bounds the memory map; writes fail once it is full. A
    /// size whose byte count overflows `usize` is refused.
    pub fn open<P: AsRef<Path>>(path: P, max_size_mb: usize) -> StorageResult<Self> {
        let map_size = max_size_mb
            .checked_mul(BYTES_PER_MB)
            .ok_or_else(|| StorageError::Unavailable {
                reason: format!("map size of {} MB overflows usize", max_size_mb),
            })?;

        std::fs::create_dir_all(&path).map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(2)
                .open(path.as_ref())
        }
        .map_err(|e| StorageError::Unavailable {
            reason: e.to_string(),
        })?;

        let mut wtxn = env.write_txn().map_err(txn_failed)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(txn_failed)?;
        let meta: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, Some("meta"))
            .map_err(txn_failed)?;
        wtxn.commit().map_err(txn_failed)?;

        Ok(Self { env, db, meta })
    }

    fn get_record<T: DeserializeOwned>(
        &self,
        kind: EntityKind,
        key: &[u8],
    ) -> StorageResult<Option<T>> {
        let rtxn = self.env.read_txn().map_err(txn_failed)?;
        match self.db.get(&rtxn, key).map_err(txn_failed)? {
            Some(bytes) => decode(kind, bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Load every row of a tenant, or `None` if the organization is missing.
    fn load_tenant(&self, txn: &RoTxn, tenant_id: TenantId) -> StorageResult<Option<TenantRows>> {
        let prefix = TenantKeyCodec::tenant_prefix(tenant_id);
        let iter = self.db.prefix_iter(txn, &prefix[..]).map_err(txn_failed)?;

        let mut organization = None;
        let mut departments = BTreeMap::new();
        let mut employees = BTreeMap::new();

        for entry in iter {
            let (key, value) = entry.map_err(txn_failed)?;
            match TenantKeyCodec::parse_storage_key(key) {
                Some((_, EntityKind::Organization, _)) => {
                    organization = Some(decode::<Organization>(EntityKind::Organization, value)?);
                }
                Some((_, EntityKind::Department, _)) => {
                    let record: DepartmentRecord = decode(EntityKind::Department, value)?;
                    departments.insert(record.id, record);
                }
                Some((_, EntityKind::Employee, _)) => {
                    let record: EmployeeRecord = decode(EntityKind::Employee, value)?;
                    employees.insert(record.id, record);
                }
                None => {
                    tracing::warn!(tenant_id = %tenant_id, key_len = key.len(), "Skipping malformed LMDB key");
                }
            }
        }

        Ok(organization.map(|organization| TenantRows {
            organization,
            departments,
            employees,
        }))
    }

    /// Delete every key under the tenant prefix. True if anything was deleted.
    fn clear_tenant(&self, wtxn: &mut RwTxn, tenant_id: TenantId) -> StorageResult<bool> {
        let prefix = TenantKeyCodec::tenant_prefix(tenant_id);
        let mut keys = Vec::new();
        {
            let iter = self
                .db
                .prefix_iter(&*wtxn, &prefix[..])
                .map_err(txn_failed)?;
            for entry in iter {
                let (key, _) = entry.map_err(txn_failed)?;
                keys.push(key.to_vec());
            }
        }

        for key in &keys {
            self.db.delete(wtxn, key.as_slice()).map_err(txn_failed)?;
        }
        Ok(!keys.is_empty())
    }

    fn put_organization(&self, wtxn: &mut RwTxn, organization: &Organization) -> StorageResult<()> {
        let key = TenantKeyCodec::storage_key(organization.id, EntityKind::Organization, 0);
        let bytes = encode(EntityKind::Organization, organization)?;
        self.db.put(wtxn, &key[..], bytes.as_slice()).map_err(txn_failed)
    }

    /// Write the difference between two versions of one table of rows:
    /// rows only in `before` are deleted, new or changed rows are put.
    fn write_changes<T: Serialize + PartialEq>(
        &self,
        wtxn: &mut RwTxn,
        kind: EntityKind,
        before: &BTreeMap<FlatId, T>,
        after: &BTreeMap<FlatId, T>,
    ) -> StorageResult<usize> {
        let mut written = 0;
        for id in before.keys().filter(|id| !after.contains_key(id)) {
            self.db
                .delete(wtxn, &record_key(kind, *id)[..])
                .map_err(txn_failed)?;
            written += 1;
        }
        for (id, record) in after {
            if before.get(id) == Some(record) {
                continue;
            }
            let bytes = encode(kind, record)?;
            self.db
                .put(wtxn, &record_key(kind, *id)[..], bytes.as_slice())
                .map_err(txn_failed)?;
            written += 1;
        }
        Ok(written)
    }

    /// Largest tenant id handed out so far. Environments written before the
    /// allocator existed fall back to the largest tenant still stored.
    fn last_allocated_tenant(&self, txn: &RoTxn) -> StorageResult<u32> {
        if let Some(bytes) = self.meta.get(txn, LAST_TENANT_KEY).map_err(txn_failed)? {
            let raw: [u8; 4] = bytes.try_into().map_err(|_| StorageError::TransactionFailed {
                reason: "malformed tenant allocator".to_string(),
            })?;
            return Ok(u32::from_be_bytes(raw));
        }
        match self.db.last(txn).map_err(txn_failed)? {
            Some((key, _)) => TenantKeyCodec::parse_storage_key(key)
                .map(|(tenant, _, _)| tenant.get())
                .ok_or_else(|| StorageError::TransactionFailed {
                    reason: "malformed key at end of database".to_string(),
                }),
            None => Ok(0),
        }
    }

    fn read_tenant<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(Option<&TenantRows>) -> R,
    ) -> StorageResult<R> {
        let rtxn = self.env.read_txn().map_err(txn_failed)?;
        let rows = self.load_tenant(&rtxn, tenant_id)?;
        Ok(f(rows.as_ref()))
    }

    /// Apply a write to one tenant inside a single write transaction.
    fn write_tenant(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut TenantRows) -> bool,
    ) -> StorageResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_failed)?;
        let Some(before) = self.load_tenant(&wtxn, tenant_id)? else {
            return Ok(false);
        };
        let mut rows = before.clone();
        if !f(&mut rows) {
            return Ok(false);
        }

        if rows.organization != before.organization {
            self.put_organization(&mut wtxn, &rows.organization)?;
        }
        let departments =
            self.write_changes(&mut wtxn, EntityKind::Department, &before.departments, &rows.departments)?;
        let employees =
            self.write_changes(&mut wtxn, EntityKind::Employee, &before.employees, &rows.employees)?;
        wtxn.commit().map_err(txn_failed)?;

        tracing::trace!(tenant_id = %tenant_id, departments, employees, "Committed tenant write");
        Ok(true)
    }
}

impl StorageBackend for LmdbStorage {
    fn get_organization(&self, tenant_id: TenantId) -> StorageResult<Option<Organization>> {
        let key = TenantKeyCodec::storage_key(tenant_id, EntityKind::Organization, 0);
        self.get_record(EntityKind::Organization, &key)
    }

    fn insert_organization(&self, name: &str) -> StorageResult<Organization> {
        let mut wtxn = self.env.write_txn().map_err(txn_failed)?;

        let next = self
            .last_allocated_tenant(&wtxn)?
            .checked_add(1)
            .ok_or_else(|| StorageError::TransactionFailed {
                reason: "tenant id space exhausted".to_string(),
            })?;
        self.meta
            .put(&mut wtxn, LAST_TENANT_KEY, &next.to_be_bytes()[..])
            .map_err(txn_failed)?;

        let organization = Organization::new(TenantId::new(next), name);
        self.put_organization(&mut wtxn, &organization)?;
        wtxn.commit().map_err(txn_failed)?;
        Ok(organization)
    }

    fn update_organization(&self, organization: &Organization) -> StorageResult<bool> {
        self.write_tenant(organization.id, |rows| {
            rows.organization.name = organization.name.clone();
            true
        })
    }

    fn remove_organization(&self, tenant_id: TenantId) -> StorageResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_failed)?;
        let removed = self.clear_tenant(&mut wtxn, tenant_id)?;
        wtxn.commit().map_err(txn_failed)?;
        Ok(removed)
    }

    fn get_departments(&self, tenant_id: TenantId) -> StorageResult<Vec<DepartmentRecord>> {
        self.read_tenant(tenant_id, |rows| {
            rows.map(|r| r.departments.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn get_department(&self, id: FlatId) -> StorageResult<Option<DepartmentRecord>> {
        self.get_record(EntityKind::Department, &record_key(EntityKind::Department, id))
    }

    fn get_department_members(&self, id: FlatId) -> StorageResult<Vec<FlatId>> {
        self.read_tenant(TenantKeyCodec::tenant_of(id), |rows| {
            rows.map(|r| r.department_members(id)).unwrap_or_default()
        })
    }

    fn insert_department(&self, record: &DepartmentRecord) -> StorageResult<bool> {
        self.write_tenant(record.organization_id, |rows| rows.insert_department(record))
    }

    fn update_department(
        &self,
        record: &DepartmentRecord,
        members: &[FlatId],
    ) -> StorageResult<bool> {
        self.write_tenant(record.organization_id, |rows| {
            rows.update_department(record, members)
        })
    }

    fn remove_department(&self, id: FlatId) -> StorageResult<bool> {
        self.write_tenant(TenantKeyCodec::tenant_of(id), |rows| rows.remove_department(id))
    }

    fn get_employees(&self, tenant_id: TenantId) -> StorageResult<Vec<EmployeeRecord>> {
        self.read_tenant(tenant_id, |rows| {
            rows.map(|r| r.employees.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn get_employee(&self, id: FlatId) -> StorageResult<Option<EmployeeRecord>> {
        self.get_record(EntityKind::Employee, &record_key(EntityKind::Employee, id))
    }

    fn insert_employee(&self, record: &EmployeeRecord) -> StorageResult<bool> {
        self.write_tenant(record.organization_id, |rows| rows.insert_employee(record))
    }

    fn update_employee(&self, record: &EmployeeRecord) -> StorageResult<bool> {
        self.write_tenant(record.organization_id, |rows| rows.update_employee(record))
    }

    fn remove_employee(&self, id: FlatId) -> StorageResult<bool> {
        self.write_tenant(TenantKeyCodec::tenant_of(id), |rows| rows.remove_employee(id))
    }

    fn next_employee_id(&self, tenant_id: TenantId) -> StorageResult<u32> {
        self.read_tenant(tenant_id, |rows| rows.map_or(1, TenantRows::next_employee_id))
    }

    fn next_department_id(&self, tenant_id: TenantId) -> StorageResult<u32> {
        self.read_tenant(tenant_id, |rows| rows.map_or(1, TenantRows::next_department_id))
    }
}
