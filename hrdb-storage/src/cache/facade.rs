//! Per-tenant caching facade.
//!
//! A [`TenantFacade`] owns the cached copy of one tenant's organization,
//! departments and employees. Reads are served from the cache and fall back
//! to the store on a miss (cache-aside). Writes go to the store first and
//! reach the cache only once the store has confirmed them.
//!
//! # Locking
//!
//! The whole cache sits behind one mutex. It is held across the store write
//! and the cache update, so no reader can see the store and the cache
//! disagree. Statistics copy the department under the lock and compute
//! outside it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use hrdb_core::stats;
use hrdb_core::{
    Department, DepartmentDraft, Employee, EmployeeDraft, EntityKind, ExternalId, FlatId,
    HrdbError, HrdbResult, Organization, OrganizationSummary, PerformanceStatistics,
    PositionHistogram, SalaryStatistics, StorageError, TenantId, TenantSnapshot,
    ValidationError,
};

use super::consistency::ConsistencyEngine;
use super::tenant_key::TenantKeyCodec;
use crate::{DepartmentRecord, EmployeeRecord, StorageBackend};

fn local(id: FlatId) -> ExternalId {
    TenantKeyCodec::decode(id).1
}

fn employee_from_record(record: &EmployeeRecord) -> Employee {
    Employee {
        id: local(record.id),
        name: record.name.clone(),
        hire_date: record.hire_date,
        position: record.position.clone(),
        salary: record.salary,
        performance: record.performance,
        department_id: record.department_id.map(local),
    }
}

/// Department without members; callers fill `employee_ids`.
fn department_from_record(record: &DepartmentRecord) -> Department {
    let mut department = Department::new(local(record.id), record.name.clone());
    department.head = record.head.map(local);
    department
}

/// Cached view of one tenant, backed by the shared store.
pub struct TenantFacade {
    tenant_id: TenantId,
    store: Arc<dyn StorageBackend>,
    cache: Mutex<TenantSnapshot>,
    /// Set once the organization is deleted; never cleared.
    removed: AtomicBool,
}

impl fmt::Debug for TenantFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantFacade")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

impl TenantFacade {
    /// Load a tenant's organization, departments and employees.
    ///
    /// Fails with [`HrdbError::NotFound`] if the organization does not exist.
    pub fn load(tenant_id: TenantId, store: Arc<dyn StorageBackend>) -> HrdbResult<Self> {
        let organization = store
            .get_organization(tenant_id)?
            .ok_or_else(|| HrdbError::tenant_not_found(tenant_id))?;
        let department_rows = store.get_departments(tenant_id)?;
        let employee_rows = store.get_employees(tenant_id)?;

        let mut cache = TenantSnapshot {
            organization,
            departments: BTreeMap::new(),
            employees: BTreeMap::new(),
        };
        for record in &department_rows {
            let department = department_from_record(record);
            cache.departments.insert(department.id, department);
        }
        for record in &employee_rows {
            ConsistencyEngine::apply_employee(&mut cache, employee_from_record(record));
        }

        tracing::info!(
            tenant_id = %tenant_id,
            departments = cache.departments.len(),
            employees = cache.employees.len(),
            "Loaded tenant facade"
        );

        Ok(Self {
            tenant_id,
            store,
            cache: Mutex::new(cache),
            removed: AtomicBool::new(false),
        })
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// True once the organization behind this facade has been deleted.
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    /// Detach the facade from its deleted organization. Departments and
    /// employees are dropped from the cache, cache misses no longer reach the
    /// store and every later mutation is refused.
    pub(crate) fn mark_removed(&self) -> HrdbResult<()> {
        let mut cache = self.lock()?;
        self.removed.store(true, Ordering::SeqCst);
        cache.departments.clear();
        cache.employees.clear();
        tracing::info!(tenant_id = %self.tenant_id, "Facade detached from removed organization");
        Ok(())
    }

    fn lock(&self) -> HrdbResult<MutexGuard<'_, TenantSnapshot>> {
        self.cache
            .lock()
            .map_err(|_| HrdbError::from(StorageError::LockPoisoned))
    }

    fn flat(&self, id: ExternalId) -> FlatId {
        TenantKeyCodec::encode(self.tenant_id, id)
    }

    fn employee_record(&self, employee: &Employee) -> EmployeeRecord {
        EmployeeRecord {
            id: self.flat(employee.id),
            organization_id: self.tenant_id,
            department_id: employee.department_id.map(|d| self.flat(d)),
            name: employee.name.clone(),
            hire_date: employee.hire_date,
            position: employee.position.clone(),
            salary: employee.salary,
            performance: employee.performance,
        }
    }

    fn department_record(&self, department: &Department) -> DepartmentRecord {
        DepartmentRecord {
            id: self.flat(department.id),
            organization_id: self.tenant_id,
            name: department.name.clone(),
            head: department.head.map(|h| self.flat(h)),
        }
    }

    fn next_id(&self, entity: EntityKind, raw: u32) -> HrdbResult<ExternalId> {
        ExternalId::new(raw).map_err(|_| {
            tracing::warn!(tenant_id = %self.tenant_id, entity = %entity, "Id space exhausted");
            HrdbError::from(ValidationError::IdSpaceExhausted {
                entity,
                tenant_id: self.tenant_id,
            })
        })
    }

    /// Make sure an employee is cached, loading it from the store on a miss.
    /// False if the store does not know it either.
    fn ensure_employee(&self, cache: &mut TenantSnapshot, id: ExternalId) -> HrdbResult<bool> {
        if cache.employees.contains_key(&id) {
            return Ok(true);
        }
        if self.is_removed() {
            return Ok(false);
        }
        tracing::debug!(tenant_id = %self.tenant_id, employee_id = %id, "Employee cache miss");
        match self.store.get_employee(self.flat(id))? {
            Some(record) => {
                ConsistencyEngine::apply_employee(cache, employee_from_record(&record));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Make sure a department and its members are cached.
    fn ensure_department(&self, cache: &mut TenantSnapshot, id: ExternalId) -> HrdbResult<bool> {
        if cache.departments.contains_key(&id) {
            return Ok(true);
        }
        if self.is_removed() {
            return Ok(false);
        }
        tracing::debug!(tenant_id = %self.tenant_id, department_id = %id, "Department cache miss");
        let flat = self.flat(id);
        let Some(record) = self.store.get_department(flat)? else {
            return Ok(false);
        };
        let members = self.store.get_department_members(flat)?;

        let mut department = department_from_record(&record);
        for member in members {
            let member_id = local(member);
            if self.ensure_employee(cache, member_id)? {
                department.employee_ids.insert(member_id);
            }
        }
        ConsistencyEngine::apply_department(cache, department);
        Ok(true)
    }

    // === Reads ===

    pub fn get_organization(&self) -> HrdbResult<Organization> {
        Ok(self.lock()?.organization.clone())
    }

    pub fn get_employee(&self, id: ExternalId) -> HrdbResult<Option<Employee>> {
        let mut cache = self.lock()?;
        if !self.ensure_employee(&mut cache, id)? {
            return Ok(None);
        }
        Ok(cache.employees.get(&id).cloned())
    }

    pub fn get_department(&self, id: ExternalId) -> HrdbResult<Option<Department>> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, id)? {
            return Ok(None);
        }
        Ok(cache.departments.get(&id).cloned())
    }

    /// Cached departments, ordered by id.
    pub fn get_departments(&self) -> HrdbResult<Vec<Department>> {
        Ok(self.lock()?.departments.values().cloned().collect())
    }

    /// Cached employees, ordered by id.
    pub fn get_employees(&self) -> HrdbResult<Vec<Employee>> {
        Ok(self.lock()?.employees.values().cloned().collect())
    }

    /// Copy of a department's members, or `None` for an unknown department.
    pub fn department_employees(&self, id: ExternalId) -> HrdbResult<Option<Vec<Employee>>> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, id)? {
            return Ok(None);
        }
        Ok(cache.department_employees(id))
    }

    /// Copy of the whole cache.
    pub fn snapshot(&self) -> HrdbResult<TenantSnapshot> {
        Ok(self.lock()?.clone())
    }

    pub fn display_structure(&self) -> HrdbResult<String> {
        Ok(self.snapshot()?.display_structure())
    }

    pub fn summary(&self) -> HrdbResult<OrganizationSummary> {
        Ok(self.snapshot()?.summary())
    }

    pub fn describe_department(&self, id: ExternalId) -> HrdbResult<Option<String>> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, id)? {
            return Ok(None);
        }
        Ok(cache.describe_department(id))
    }

    // === Employee mutations ===

    /// Create an employee in a department under the next free id.
    ///
    /// Returns `None` if the department is unknown. A NaN or infinite salary
    /// or score fails with `InvalidState` before the store is touched.
    pub fn add_employee_to_department(
        &self,
        department_id: ExternalId,
        draft: EmployeeDraft,
    ) -> HrdbResult<Option<Employee>> {
        draft.validate()?;
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, department_id)? {
            tracing::debug!(tenant_id = %self.tenant_id, department_id = %department_id, "Add rejected: unknown department");
            return Ok(None);
        }

        let raw = self.store.next_employee_id(self.tenant_id)?;
        let id = self.next_id(EntityKind::Employee, raw)?;
        let employee = Employee::from_draft(id, draft, Some(department_id));

        if !self.store.insert_employee(&self.employee_record(&employee))? {
            if self.store.get_department(self.flat(department_id))?.is_none() {
                tracing::warn!(tenant_id = %self.tenant_id, department_id = %department_id, "Department gone from store, evicting");
                ConsistencyEngine::remove_department(&mut cache, department_id);
                return Ok(None);
            }
            return Err(ValidationError::IdConflict {
                entity: EntityKind::Employee,
                id: self.flat(id).get(),
            }
            .into());
        }

        ConsistencyEngine::apply_employee(&mut cache, employee.clone());
        tracing::info!(tenant_id = %self.tenant_id, department_id = %department_id, employee_id = %id, "Added employee");
        Ok(Some(employee))
    }

    /// Delete an employee that belongs to the given department.
    ///
    /// False if the department is unknown or the employee is not one of its
    /// members. Clears the department head if it was this employee.
    pub fn remove_employee_from_department(
        &self,
        department_id: ExternalId,
        employee_id: ExternalId,
    ) -> HrdbResult<bool> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, department_id)? {
            tracing::debug!(tenant_id = %self.tenant_id, department_id = %department_id, "Remove rejected: unknown department");
            return Ok(false);
        }
        let is_member = cache
            .departments
            .get(&department_id)
            .is_some_and(|d| d.has_member(employee_id));
        if !is_member {
            tracing::debug!(tenant_id = %self.tenant_id, department_id = %department_id, employee_id = %employee_id, "Remove rejected: not a member");
            return Ok(false);
        }

        let removed = self.store.remove_employee(self.flat(employee_id))?;
        ConsistencyEngine::remove_employee(&mut cache, employee_id);
        if removed {
            tracing::info!(tenant_id = %self.tenant_id, department_id = %department_id, employee_id = %employee_id, "Removed employee");
        } else {
            tracing::warn!(tenant_id = %self.tenant_id, employee_id = %employee_id, "Employee gone from store, evicted");
        }
        Ok(removed)
    }

    /// Write an employee's own fields through to the store.
    ///
    /// The department assignment is owned by departments: `department_id` on
    /// the argument is ignored and the current assignment is kept. False if
    /// the store does not know the employee; non-finite salaries and scores
    /// fail with `InvalidState`.
    pub fn update_employee(&self, employee: &Employee) -> HrdbResult<bool> {
        employee.validate()?;
        let mut cache = self.lock()?;
        if !self.ensure_employee(&mut cache, employee.id)? {
            return Ok(false);
        }
        let updated = Employee {
            department_id: cache.employees.get(&employee.id).and_then(|e| e.department_id),
            ..employee.clone()
        };

        if !self.store.update_employee(&self.employee_record(&updated))? {
            tracing::warn!(tenant_id = %self.tenant_id, employee_id = %employee.id, "Employee gone from store, evicting");
            ConsistencyEngine::remove_employee(&mut cache, employee.id);
            return Ok(false);
        }
        ConsistencyEngine::apply_employee(&mut cache, updated);
        Ok(true)
    }

    // === Department mutations ===

    /// Set or clear a department's head.
    ///
    /// False if the department is unknown or the employee is not a member;
    /// the head is left unchanged in both cases.
    pub fn set_department_head(
        &self,
        department_id: ExternalId,
        head: Option<ExternalId>,
    ) -> HrdbResult<bool> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, department_id)? {
            return Ok(false);
        }
        let Some(mut department) = cache.departments.get(&department_id).cloned() else {
            return Ok(false);
        };
        if let Err(e) = ConsistencyEngine::check_head(&department, head) {
            tracing::debug!(tenant_id = %self.tenant_id, error = %e, "Head assignment rejected");
            return Ok(false);
        }
        department.head = head;
        self.write_department(&mut cache, department)
    }

    /// Replace a department's name, head and member list.
    ///
    /// Listed employees move into the department, employees no longer listed
    /// become unassigned. False if the department or a listed employee is
    /// unknown, or the head is not listed.
    pub fn update_department(&self, department: &Department) -> HrdbResult<bool> {
        let mut cache = self.lock()?;
        if !self.ensure_department(&mut cache, department.id)? {
            return Ok(false);
        }
        for member in &department.employee_ids {
            self.ensure_employee(&mut cache, *member)?;
        }

        let checked = ConsistencyEngine::check_members(department, |id| {
            cache.employees.contains_key(&id)
        })
        .and_then(|_| ConsistencyEngine::check_head(department, department.head));
        if let Err(e) = checked {
            tracing::debug!(tenant_id = %self.tenant_id, error = %e, "Department update rejected");
            return Ok(false);
        }
        self.write_department(&mut cache, department.clone())
    }

    /// Persist a validated department with its member list, then cache it.
    fn write_department(
        &self,
        cache: &mut TenantSnapshot,
        department: Department,
    ) -> HrdbResult<bool> {
        let members: Vec<FlatId> = department
            .employee_ids
            .iter()
            .map(|id| self.flat(*id))
            .collect();
        if !self
            .store
            .update_department(&self.department_record(&department), &members)?
        {
            tracing::warn!(tenant_id = %self.tenant_id, department_id = %department.id, "Store rejected department update");
            return Ok(false);
        }
        tracing::debug!(tenant_id = %self.tenant_id, department_id = %department.id, "Updated department");
        ConsistencyEngine::apply_department(cache, department);
        Ok(true)
    }

    /// Create an empty department under the next free id.
    ///
    /// Returns `None` if the store refuses it.
    pub fn insert_department(&self, draft: DepartmentDraft) -> HrdbResult<Option<Department>> {
        let mut cache = self.lock()?;
        if self.is_removed() {
            return Ok(None);
        }
        let raw = self.store.next_department_id(self.tenant_id)?;
        let id = self.next_id(EntityKind::Department, raw)?;
        let department = Department::new(id, draft.name);

        if !self
            .store
            .insert_department(&self.department_record(&department))?
        {
            tracing::warn!(tenant_id = %self.tenant_id, department_id = %id, "Store refused department");
            return Ok(None);
        }
        cache.departments.insert(id, department.clone());
        tracing::info!(tenant_id = %self.tenant_id, department_id = %id, "Inserted department");
        Ok(Some(department))
    }

    /// Remove a department. Its employees stay in the organization, unassigned.
    pub fn remove_department(&self, id: ExternalId) -> HrdbResult<bool> {
        let mut cache = self.lock()?;
        if self.is_removed() {
            return Ok(false);
        }
        let removed = self.store.remove_department(self.flat(id))?;
        let cached = ConsistencyEngine::remove_department(&mut cache, id).is_some();
        if removed {
            tracing::info!(tenant_id = %self.tenant_id, department_id = %id, "Removed department");
        } else if cached {
            tracing::warn!(tenant_id = %self.tenant_id, department_id = %id, "Department gone from store, evicted");
        }
        Ok(removed)
    }

    // === Organization ===

    /// Rename the organization. False for another tenant's organization or
    /// one the store no longer holds.
    pub fn update_organization(&self, organization: &Organization) -> HrdbResult<bool> {
        if organization.id != self.tenant_id {
            return Ok(false);
        }
        let mut cache = self.lock()?;
        if self.is_removed() || !self.store.update_organization(organization)? {
            return Ok(false);
        }
        cache.organization = organization.clone();
        Ok(true)
    }

    // === Statistics ===

    pub fn department_position_histogram(
        &self,
        id: ExternalId,
    ) -> HrdbResult<Option<PositionHistogram>> {
        Ok(self
            .department_employees(id)?
            .map(|employees| stats::position_histogram(&employees)))
    }

    pub fn department_salary_statistics(
        &self,
        id: ExternalId,
    ) -> HrdbResult<Option<SalaryStatistics>> {
        Ok(self
            .department_employees(id)?
            .map(|employees| stats::salary_statistics(&employees)))
    }

    pub fn department_performance_statistics(
        &self,
        id: ExternalId,
    ) -> HrdbResult<Option<PerformanceStatistics>> {
        Ok(self
            .department_employees(id)?
            .map(|employees| stats::performance_statistics(&employees)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InMemoryStorage;
    use chrono::NaiveDate;

    fn id(raw: u32) -> ExternalId {
        ExternalId::new(raw).unwrap()
    }

    fn draft(name: &str) -> EmployeeDraft {
        EmployeeDraft::new(name, NaiveDate::from_ymd_opt(2022, 6, 1).unwrap())
    }

    /// Store with one organization holding departments 1 ("Teaching") and
    /// 2 ("Research"), both empty.
    fn setup() -> (Arc<InMemoryStorage>, TenantFacade) {
        let store = Arc::new(InMemoryStorage::new());
        let tenant = store.insert_organization("Test Organization").unwrap().id;
        let facade = TenantFacade::load(tenant, store.clone()).unwrap();
        facade.insert_department(DepartmentDraft::new("Teaching")).unwrap().unwrap();
        facade.insert_department(DepartmentDraft::new("Research")).unwrap().unwrap();
        (store, facade)
    }

    #[test]
    fn test_load_unknown_tenant_is_not_found() {
        let store: Arc<dyn StorageBackend> = Arc::new(InMemoryStorage::new());
        let err = TenantFacade::load(TenantId::new(5), store).unwrap_err();
        assert!(matches!(
            err,
            HrdbError::NotFound {
                entity: EntityKind::Organization,
                id: 5
            }
        ));
    }

    #[test]
    fn test_add_employee_assigns_sequential_ids() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake").with_salary(50.0))
            .unwrap()
            .unwrap();
        let anna = facade
            .add_employee_to_department(id(2), draft("Anna"))
            .unwrap()
            .unwrap();

        assert_eq!(jake.id, id(1));
        assert_eq!(anna.id, id(2));
        assert_eq!(jake.department_id, Some(id(1)));
        assert!(facade.get_department(id(1)).unwrap().unwrap().has_member(jake.id));

        let stats = facade.department_salary_statistics(id(1)).unwrap().unwrap();
        assert_eq!(stats.total, 50.0);
        assert_eq!(stats.highest_employee, Some(jake.id));
    }

    #[test]
    fn test_add_to_unknown_department_returns_none() {
        let (_store, facade) = setup();
        assert!(facade
            .add_employee_to_department(id(9), draft("Nobody"))
            .unwrap()
            .is_none());
        assert!(facade.get_employees().unwrap().is_empty());
    }

    #[test]
    fn test_remove_twice_then_false() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();

        assert!(facade.remove_employee_from_department(id(1), jake.id).unwrap());
        assert!(!facade.remove_employee_from_department(id(1), jake.id).unwrap());
        assert!(!facade.remove_employee_from_department(id(9), jake.id).unwrap());
        assert!(facade.get_employee(jake.id).unwrap().is_none());
    }

    #[test]
    fn test_remove_from_wrong_department_is_rejected() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        assert!(!facade.remove_employee_from_department(id(2), jake.id).unwrap());
        assert!(facade.get_employee(jake.id).unwrap().is_some());
    }

    #[test]
    fn test_removing_head_clears_it() {
        let (store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        assert!(facade.set_department_head(id(1), Some(jake.id)).unwrap());

        assert!(facade.remove_employee_from_department(id(1), jake.id).unwrap());
        assert_eq!(facade.get_department(id(1)).unwrap().unwrap().head, None);

        let stored = store
            .get_department(TenantKeyCodec::encode(facade.tenant_id(), id(1)))
            .unwrap()
            .unwrap();
        assert_eq!(stored.head, None);
    }

    #[test]
    fn test_head_outside_department_is_rejected() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        let anna = facade
            .add_employee_to_department(id(2), draft("Anna"))
            .unwrap()
            .unwrap();
        assert!(facade.set_department_head(id(1), Some(jake.id)).unwrap());

        assert!(!facade.set_department_head(id(1), Some(anna.id)).unwrap());
        assert_eq!(facade.get_department(id(1)).unwrap().unwrap().head, Some(jake.id));

        assert!(facade.set_department_head(id(1), None).unwrap());
        assert_eq!(facade.get_department(id(1)).unwrap().unwrap().head, None);
    }

    #[test]
    fn test_update_department_moves_employees() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        let anna = facade
            .add_employee_to_department(id(1), draft("Anna"))
            .unwrap()
            .unwrap();
        assert!(facade.set_department_head(id(1), Some(jake.id)).unwrap());

        let mut research = facade.get_department(id(2)).unwrap().unwrap();
        research.name = "R&D".to_string();
        research.employee_ids.insert(jake.id);
        research.head = Some(jake.id);
        assert!(facade.update_department(&research).unwrap());

        let teaching = facade.get_department(id(1)).unwrap().unwrap();
        assert_eq!(teaching.head, None);
        assert!(!teaching.has_member(jake.id));
        assert!(teaching.has_member(anna.id));
        assert_eq!(
            facade.get_employee(jake.id).unwrap().unwrap().department_id,
            Some(id(2))
        );
        assert_eq!(ConsistencyEngine::verify(&facade.snapshot().unwrap()), Ok(()));
    }

    #[test]
    fn test_update_department_rejects_unknown_member() {
        let (_store, facade) = setup();
        let before = facade.snapshot().unwrap();
        let mut teaching = facade.get_department(id(1)).unwrap().unwrap();
        teaching.employee_ids.insert(id(42));
        assert!(!facade.update_department(&teaching).unwrap());
        assert_eq!(facade.snapshot().unwrap(), before);

        let ghost = Department::new(id(7), "Ghost");
        assert!(!facade.update_department(&ghost).unwrap());
    }

    #[test]
    fn test_update_employee_keeps_department() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();

        let mut changed = jake.clone();
        changed.salary = 75.0;
        changed.department_id = None;
        assert!(facade.update_employee(&changed).unwrap());

        let cached = facade.get_employee(jake.id).unwrap().unwrap();
        assert_eq!(cached.salary, 75.0);
        assert_eq!(cached.department_id, Some(id(1)));

        let unknown = Employee::from_draft(id(50), draft("Ghost"), None);
        assert!(!facade.update_employee(&unknown).unwrap());
    }

    #[test]
    fn test_cache_miss_falls_back_to_store() {
        let (store, facade) = setup();
        let tenant = facade.tenant_id();
        let record = EmployeeRecord {
            id: TenantKeyCodec::encode(tenant, id(8)),
            organization_id: tenant,
            department_id: Some(TenantKeyCodec::encode(tenant, id(2))),
            name: "Late Arrival".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            position: None,
            salary: 10.0,
            performance: None,
        };
        assert!(store.insert_employee(&record).unwrap());

        let fetched = facade.get_employee(id(8)).unwrap().unwrap();
        assert_eq!(fetched.name, "Late Arrival");
        assert!(facade.get_department(id(2)).unwrap().unwrap().has_member(id(8)));
    }

    #[test]
    fn test_store_outage_leaves_cache_unchanged() {
        let (store, facade) = setup();
        let before = facade.snapshot().unwrap();
        store.set_offline(true);

        let err = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap_err();
        assert!(err.is_store_unavailable());
        assert!(facade.remove_department(id(1)).unwrap_err().is_store_unavailable());

        store.set_offline(false);
        assert_eq!(facade.snapshot().unwrap(), before);
    }

    #[test]
    fn test_id_space_exhaustion_is_invalid_state() {
        let (store, facade) = setup();
        let tenant = facade.tenant_id();
        let record = EmployeeRecord {
            id: TenantKeyCodec::encode(tenant, ExternalId::MAX),
            organization_id: tenant,
            department_id: None,
            name: "Last".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
            position: None,
            salary: 0.0,
            performance: None,
        };
        assert!(store.insert_employee(&record).unwrap());

        let err = facade
            .add_employee_to_department(id(1), draft("One Too Many"))
            .unwrap_err();
        assert!(matches!(
            err,
            HrdbError::InvalidState(ValidationError::IdSpaceExhausted {
                entity: EntityKind::Employee,
                ..
            })
        ));
    }

    #[test]
    fn test_remove_department_unassigns_members() {
        let (_store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();

        assert!(facade.remove_department(id(1)).unwrap());
        assert!(!facade.remove_department(id(1)).unwrap());
        assert!(facade.get_department(id(1)).unwrap().is_none());
        assert_eq!(facade.get_employee(jake.id).unwrap().unwrap().department_id, None);
    }

    #[test]
    fn test_update_organization() {
        let (_store, facade) = setup();
        let mut org = facade.get_organization().unwrap();
        org.name = "Renamed".to_string();
        assert!(facade.update_organization(&org).unwrap());
        assert_eq!(facade.get_organization().unwrap().name, "Renamed");

        let foreign = Organization::new(TenantId::new(999), "Other");
        assert!(!facade.update_organization(&foreign).unwrap());
    }

    #[test]
    fn test_statistics_for_unknown_department_are_none() {
        let (_store, facade) = setup();
        assert!(facade.department_position_histogram(id(9)).unwrap().is_none());
        assert!(facade.department_salary_statistics(id(9)).unwrap().is_none());
        assert!(facade.department_performance_statistics(id(9)).unwrap().is_none());
    }

    #[test]
    fn test_display_structure_through_facade() {
        let (_store, facade) = setup();
        facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        let expected = "\
- Organization: Test Organization
  - Department: Teaching
    - Employee: Jake
  - Department: Research
";
        assert_eq!(facade.display_structure().unwrap(), expected);
    }

    #[test]
    fn test_non_finite_metrics_never_reach_store() {
        let (store, facade) = setup();
        let err = facade
            .add_employee_to_department(id(1), draft("Nan").with_salary(f64::NAN))
            .unwrap_err();
        assert!(matches!(
            err,
            HrdbError::InvalidState(ValidationError::NonFiniteValue { field: "salary", .. })
        ));
        assert!(store.get_employees(facade.tenant_id()).unwrap().is_empty());

        let jake = facade
            .add_employee_to_department(id(1), draft("Jake").with_performance(80.0))
            .unwrap()
            .unwrap();
        let mut infinite = jake.clone();
        infinite.performance = Some(f64::INFINITY);
        assert!(matches!(
            facade.update_employee(&infinite),
            Err(HrdbError::InvalidState(ValidationError::NonFiniteValue { .. }))
        ));
        assert_eq!(facade.get_employee(jake.id).unwrap(), Some(jake));
    }

    #[test]
    fn test_removed_facade_refuses_everything() {
        let (store, facade) = setup();
        let jake = facade
            .add_employee_to_department(id(1), draft("Jake"))
            .unwrap()
            .unwrap();
        assert!(store.remove_organization(facade.tenant_id()).unwrap());
        facade.mark_removed().unwrap();

        assert!(facade.is_removed());
        assert!(facade.get_employee(jake.id).unwrap().is_none());
        assert!(facade.get_department(id(1)).unwrap().is_none());
        assert!(facade
            .add_employee_to_department(id(1), draft("Late"))
            .unwrap()
            .is_none());
        assert!(!facade.update_employee(&jake).unwrap());
        assert!(!facade.set_department_head(id(1), Some(jake.id)).unwrap());
        assert!(facade.insert_department(DepartmentDraft::new("New")).unwrap().is_none());
        assert!(!facade.remove_department(id(2)).unwrap());
        let org = facade.get_organization().unwrap();
        assert!(!facade.update_organization(&org).unwrap());
    }
}
