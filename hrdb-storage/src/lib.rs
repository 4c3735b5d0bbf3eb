//! HRDB Storage - Storage Trait, Backends and Tenant Facades
//!
//! Defines the relational store contract the caching facades sit on, an
//! in-memory and an LMDB implementation of it, and the per-tenant caching
//! layer in [`cache`].

pub mod cache;
pub mod lmdb_backend;
mod records;

pub use cache::{ConsistencyEngine, FacadeRegistry, TenantFacade, TenantKeyCodec};
pub use lmdb_backend::LmdbStorage;
pub use records::{DepartmentRecord, EmployeeRecord};

use hrdb_core::{
    ConfigError, FlatId, HrdbConfig, HrdbResult, Organization, StorageError, StorageKind,
    StorageResult, TenantId,
};
use records::TenantRows;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Relational store behind the tenant facades.
///
/// Departments and employees are addressed by [`FlatId`]. Lookups that miss
/// return `Ok(None)`, rejected writes return `Ok(false)`; `Err` always means
/// the store could not be reached and the outcome is unknown.
///
/// Every method is a single atomic unit: a write either applies with all of
/// its foreign-key consequences or not at all.
pub trait StorageBackend: Send + Sync {
    // === Organization Operations ===

    /// Get an organization by tenant id.
    fn get_organization(&self, tenant_id: TenantId) -> StorageResult<Option<Organization>>;

    /// Create an organization under a freshly allocated tenant id.
    fn insert_organization(&self, name: &str) -> StorageResult<Organization>;

    /// Rename an organization.
    fn update_organization(&self, organization: &Organization) -> StorageResult<bool>;

    /// Remove an organization with every department and employee it owns.
    fn remove_organization(&self, tenant_id: TenantId) -> StorageResult<bool>;

    // === Department Operations ===

    /// All departments of a tenant, ordered by id.
    fn get_departments(&self, tenant_id: TenantId) -> StorageResult<Vec<DepartmentRecord>>;

    fn get_department(&self, id: FlatId) -> StorageResult<Option<DepartmentRecord>>;

    /// Ids of the employees assigned to a department.
    fn get_department_members(&self, id: FlatId) -> StorageResult<Vec<FlatId>>;

    /// Insert a department without members. False if the id is taken.
    fn insert_department(&self, record: &DepartmentRecord) -> StorageResult<bool>;

    /// Replace a department and make `members` its exact member set.
    ///
    /// Rejected if the department or a listed employee is unknown, or the
    /// head is not listed. Moving an employee clears the head of the
    /// department it left if it was heading it.
    fn update_department(&self, record: &DepartmentRecord, members: &[FlatId])
        -> StorageResult<bool>;

    /// Remove a department. Its employees stay, unassigned.
    fn remove_department(&self, id: FlatId) -> StorageResult<bool>;

    // === Employee Operations ===

    /// All employees of a tenant, ordered by id.
    fn get_employees(&self, tenant_id: TenantId) -> StorageResult<Vec<EmployeeRecord>>;

    fn get_employee(&self, id: FlatId) -> StorageResult<Option<EmployeeRecord>>;

    /// Insert an employee. False if the id is taken or its department is unknown.
    fn insert_employee(&self, record: &EmployeeRecord) -> StorageResult<bool>;

    fn update_employee(&self, record: &EmployeeRecord) -> StorageResult<bool>;

    /// Remove an employee and clear any department head pointing at it.
    fn remove_employee(&self, id: FlatId) -> StorageResult<bool>;

    // === Id Generation ===

    /// One past the largest employee external id in the tenant, or 1.
    ///
    /// Not range checked: a tenant at the top of the id space gets a value
    /// that does not fit an external id.
    fn next_employee_id(&self, tenant_id: TenantId) -> StorageResult<u32>;

    /// One past the largest department external id in the tenant, or 1.
    fn next_department_id(&self, tenant_id: TenantId) -> StorageResult<u32>;
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

/// Tenant rows plus the tenant id allocator.
#[derive(Debug, Default)]
struct TenantTable {
    rows: BTreeMap<TenantId, TenantRows>,
    /// Largest tenant id ever handed out. Removed ids are never reused.
    last_allocated: u32,
}

/// In-memory storage backend.
///
/// All tenants live behind one lock, so multi-row writes are atomic. The
/// store can be switched offline to exercise the unavailable path.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tenants: RwLock<TenantTable>,
    offline: AtomicBool,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`StorageError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable {
                reason: "in-memory store is offline".to_string(),
            });
        }
        Ok(())
    }

    fn read_tenant<R>(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(Option<&TenantRows>) -> R,
    ) -> StorageResult<R> {
        self.check_online()?;
        let tenants = self.tenants.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(f(tenants.rows.get(&tenant_id)))
    }

    /// Apply a write to one tenant. Unknown tenants reject the write.
    fn write_tenant(
        &self,
        tenant_id: TenantId,
        f: impl FnOnce(&mut TenantRows) -> bool,
    ) -> StorageResult<bool> {
        self.check_online()?;
        let mut tenants = self.tenants.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tenants.rows.get_mut(&tenant_id).is_some_and(f))
    }
}

impl StorageBackend for InMemoryStorage {
    fn get_organization(&self, tenant_id: TenantId) -> StorageResult<Option<Organization>> {
        self.read_tenant(tenant_id, |rows| rows.map(|r| r.organization.clone()))
    }

    fn insert_organization(&self, name: &str) -> StorageResult<Organization> {
        self.check_online()?;
        let mut tenants = self.tenants.write().map_err(|_| StorageError::LockPoisoned)?;
        let next = tenants.last_allocated.checked_add(1).ok_or_else(|| {
            StorageError::TransactionFailed {
                reason: "tenant id space exhausted".to_string(),
            }
        })?;
        tenants.last_allocated = next;
        let organization = Organization::new(TenantId::new(next), name);
        tenants.rows.insert(organization.id, TenantRows::new(organization.clone()));
        Ok(organization)
    }

    fn update_organization(&self, organization: &Organization) -> StorageResult<bool> {
        self.write_tenant(organization.id, |rows| {
            rows.organization.name = organization.name.clone();
            true
        })
    }

    fn remove_organization(&self, tenant_id: TenantId) -> StorageResult<bool> {
        self.check_online()?;
        let mut tenants = self.tenants.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tenants.rows.remove(&tenant_id).is_some())
    }

    fn get_departments(&self, tenant_id: TenantId) -> StorageResult<Vec<DepartmentRecord>> {
        self.read_tenant(tenant_id, |rows| {
            rows.map(|r| r.departments.values().cloned().collect())
                .unwrap_or_default()
        })
    }

    fn get_department(&self, id: FlatId) -> StorageResult<Option<DepartmentRecord>> {
        self.read_tenant(TenantKeyCodec::tenant_of(id), |rows| {
            rows.and_then(|r| r.departments.get(&id).cloned())
        })
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
        self.read_tenant(TenantKeyCodec::tenant_of(id), |rows| {
            rows.and_then(|r| r.employees.get(&id).cloned())
        })
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

// ============================================================================
// BACKEND SELECTION
// ============================================================================

/// Open the backend selected by `config`.
pub fn open_storage(config: &HrdbConfig) -> HrdbResult<Arc<dyn StorageBackend>> {
    config.validate()?;
    match config.storage {
        StorageKind::Memory => {
            tracing::info!("Using in-memory storage");
            Ok(Arc::new(InMemoryStorage::new()))
        }
        StorageKind::Lmdb => {
            let path = config
                .lmdb_path
                .as_ref()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "HRDB_LMDB_PATH".to_string(),
                })?;
            tracing::info!(path = %path.display(), max_size_mb = config.lmdb_max_size_mb, "Opening LMDB storage");
            Ok(Arc::new(LmdbStorage::open(path, config.lmdb_max_size_mb)?))
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hrdb_core::{ExternalId, HrdbError};

    fn flat(tenant: TenantId, raw: u32) -> FlatId {
        TenantKeyCodec::encode(tenant, ExternalId::new(raw).unwrap())
    }

    fn employee(tenant: TenantId, raw: u32, department: Option<FlatId>) -> EmployeeRecord {
        EmployeeRecord {
            id: flat(tenant, raw),
            organization_id: tenant,
            department_id: department,
            name: format!("Employee {}", raw),
            hire_date: NaiveDate::from_ymd_opt(2021, 9, 1).unwrap(),
            position: Some("Engineer".to_string()),
            salary: 1000.0,
            performance: Some(80.0),
        }
    }

    fn department(tenant: TenantId, raw: u32) -> DepartmentRecord {
        DepartmentRecord {
            id: flat(tenant, raw),
            organization_id: tenant,
            name: format!("Dept {}", raw),
            head: None,
        }
    }

    #[test]
    fn test_insert_organization_allocates_ids() {
        let storage = InMemoryStorage::new();
        let first = storage.insert_organization("First").unwrap();
        let second = storage.insert_organization("Second").unwrap();

        assert_eq!(first.id, TenantId::new(1));
        assert_eq!(second.id, TenantId::new(2));
        assert_eq!(storage.get_organization(second.id).unwrap(), Some(second));
        assert_eq!(storage.get_organization(TenantId::new(9)).unwrap(), None);
    }

    #[test]
    fn test_removed_tenant_id_is_not_reused() {
        let storage = InMemoryStorage::new();
        storage.insert_organization("First").unwrap();
        let second = storage.insert_organization("Second").unwrap();
        assert!(storage.remove_organization(second.id).unwrap());

        let third = storage.insert_organization("Third").unwrap();
        assert_eq!(third.id, TenantId::new(3));
        assert_eq!(storage.get_organization(second.id).unwrap(), None);
    }

    #[test]
    fn test_employee_crud() {
        let storage = InMemoryStorage::new();
        let tenant = storage.insert_organization("Acme").unwrap().id;
        let record = employee(tenant, 1, None);

        assert!(storage.insert_employee(&record).unwrap());
        assert!(!storage.insert_employee(&record).unwrap());
        assert_eq!(storage.get_employee(record.id).unwrap(), Some(record.clone()));

        let mut renamed = record.clone();
        renamed.name = "Renamed".to_string();
        assert!(storage.update_employee(&renamed).unwrap());
        assert_eq!(storage.get_employee(record.id).unwrap().unwrap().name, "Renamed");

        assert!(storage.remove_employee(record.id).unwrap());
        assert!(!storage.remove_employee(record.id).unwrap());
        assert_eq!(storage.get_employee(record.id).unwrap(), None);
    }

    #[test]
    fn test_writes_to_unknown_tenant_are_rejected() {
        let storage = InMemoryStorage::new();
        let ghost = TenantId::new(42);
        assert!(!storage.insert_department(&department(ghost, 1)).unwrap());
        assert!(!storage.insert_employee(&employee(ghost, 1, None)).unwrap());
        assert!(storage.get_employees(ghost).unwrap().is_empty());
        assert_eq!(storage.next_employee_id(ghost).unwrap(), 1);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let storage = InMemoryStorage::new();
        let a = storage.insert_organization("A").unwrap().id;
        let b = storage.insert_organization("B").unwrap().id;

        assert!(storage.insert_employee(&employee(a, 1, None)).unwrap());
        assert!(storage.insert_employee(&employee(b, 1, None)).unwrap());
        assert!(storage.insert_employee(&employee(b, 2, None)).unwrap());

        assert_eq!(storage.get_employees(a).unwrap().len(), 1);
        assert_eq!(storage.get_employees(b).unwrap().len(), 2);
        assert_eq!(storage.next_employee_id(a).unwrap(), 2);
        assert_eq!(storage.next_employee_id(b).unwrap(), 3);
    }

    #[test]
    fn test_department_membership_and_head() {
        let storage = InMemoryStorage::new();
        let tenant = storage.insert_organization("Acme").unwrap().id;
        let dept = department(tenant, 1);
        assert!(storage.insert_department(&dept).unwrap());
        assert!(storage.insert_employee(&employee(tenant, 1, Some(dept.id))).unwrap());
        assert!(storage.insert_employee(&employee(tenant, 2, None)).unwrap());

        let mut headed = dept.clone();
        headed.head = Some(flat(tenant, 2));
        let members = [flat(tenant, 1), flat(tenant, 2)];
        assert!(storage.update_department(&headed, &members).unwrap());
        assert_eq!(storage.get_department_members(dept.id).unwrap(), members.to_vec());

        assert!(storage.remove_employee(flat(tenant, 2)).unwrap());
        assert_eq!(storage.get_department(dept.id).unwrap().unwrap().head, None);
    }

    #[test]
    fn test_remove_organization_cascades() {
        let storage = InMemoryStorage::new();
        let tenant = storage.insert_organization("Acme").unwrap().id;
        assert!(storage.insert_department(&department(tenant, 1)).unwrap());
        assert!(storage.insert_employee(&employee(tenant, 1, None)).unwrap());

        assert!(storage.remove_organization(tenant).unwrap());
        assert!(storage.get_departments(tenant).unwrap().is_empty());
        assert_eq!(storage.get_employee(flat(tenant, 1)).unwrap(), None);
        assert!(!storage.remove_organization(tenant).unwrap());
    }

    #[test]
    fn test_offline_store_fails_every_call() {
        let storage = InMemoryStorage::new();
        let tenant = storage.insert_organization("Acme").unwrap().id;
        storage.set_offline(true);

        assert!(matches!(
            storage.get_organization(tenant),
            Err(StorageError::Unavailable { .. })
        ));
        assert!(storage.insert_employee(&employee(tenant, 1, None)).is_err());

        storage.set_offline(false);
        assert!(storage.get_organization(tenant).unwrap().is_some());
    }

    #[test]
    fn test_open_storage_memory() {
        let storage = open_storage(&HrdbConfig::in_memory()).unwrap();
        let org = storage.insert_organization("Acme").unwrap();
        assert_eq!(org.name, "Acme");
    }

    #[test]
    fn test_open_storage_rejects_invalid_config() {
        let mut config = HrdbConfig::in_memory();
        config.storage = StorageKind::Lmdb;
        assert!(matches!(open_storage(&config), Err(HrdbError::Config(_))));
    }
}
