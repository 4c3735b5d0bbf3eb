//! Invariant enforcement for one tenant's cached collections.
//!
//! Three invariants hold between a department and its employees:
//!
//! 1. A set head is one of the department's members.
//! 2. Removing the head from a department clears the head in the same step.
//! 3. An employee's `department_id` and the department's `employee_ids` agree.
//!
//! The facade validates requests with [`ConsistencyEngine::check_head`] and
//! [`ConsistencyEngine::check_members`] before touching the store, then
//! applies the store-confirmed change to its cache through the `apply_*`
//! functions, which re-establish all three invariants.

use hrdb_core::{Department, Employee, ExternalId, TenantSnapshot, ValidationError};

/// Stateless invariant checks and cache repairs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsistencyEngine;

impl ConsistencyEngine {
    /// Check that `head` may lead `department`. Clearing always passes.
    pub fn check_head(
        department: &Department,
        head: Option<ExternalId>,
    ) -> Result<(), ValidationError> {
        match head {
            Some(employee_id) if !department.has_member(employee_id) => {
                Err(ValidationError::HeadNotMember {
                    department_id: department.id,
                    employee_id,
                })
            }
            _ => Ok(()),
        }
    }

    /// Check that every listed member is a known employee.
    pub fn check_members(
        department: &Department,
        is_known: impl Fn(ExternalId) -> bool,
    ) -> Result<(), ValidationError> {
        match department.employee_ids.iter().find(|id| !is_known(**id)) {
            Some(&employee_id) => Err(ValidationError::UnknownMember {
                department_id: department.id,
                employee_id,
            }),
            None => Ok(()),
        }
    }

    /// Insert or replace an employee, keeping membership in step with its
    /// `department_id`.
    pub fn apply_employee(cache: &mut TenantSnapshot, employee: Employee) {
        let previous = cache
            .employees
            .get(&employee.id)
            .and_then(|e| e.department_id);
        if previous != employee.department_id {
            if let Some(old) = previous {
                Self::leave_department(cache, old, employee.id);
            }
        }
        if let Some(dept) = employee.department_id.and_then(|id| cache.departments.get_mut(&id)) {
            dept.employee_ids.insert(employee.id);
        }
        cache.employees.insert(employee.id, employee);
    }

    /// Drop an employee from the cache, its department and any headship.
    pub fn remove_employee(cache: &mut TenantSnapshot, employee_id: ExternalId) -> Option<Employee> {
        let employee = cache.employees.remove(&employee_id)?;
        if let Some(dept) = employee.department_id {
            Self::leave_department(cache, dept, employee_id);
        }
        Some(employee)
    }

    /// Insert or replace a department and make its member list authoritative.
    ///
    /// Listed employees point back at it and leave any other department
    /// (clearing that department's head if they led it). Employees that were
    /// members before and are no longer listed become unassigned. A head that
    /// is not listed is cleared.
    pub fn apply_department(cache: &mut TenantSnapshot, mut department: Department) {
        let id = department.id;

        if let Some(previous) = cache.departments.get(&id) {
            let dropped: Vec<ExternalId> = previous
                .employee_ids
                .difference(&department.employee_ids)
                .copied()
                .collect();
            for employee_id in dropped {
                if let Some(employee) = cache.employees.get_mut(&employee_id) {
                    if employee.department_id == Some(id) {
                        employee.department_id = None;
                    }
                }
            }
        }

        for member in &department.employee_ids {
            let Some(employee) = cache.employees.get_mut(member) else {
                continue;
            };
            if let Some(other) = employee.department_id.filter(|d| *d != id) {
                if let Some(other_dept) = cache.departments.get_mut(&other) {
                    other_dept.employee_ids.remove(member);
                    if other_dept.head == Some(*member) {
                        other_dept.head = None;
                    }
                }
            }
            employee.department_id = Some(id);
        }

        if Self::check_head(&department, department.head).is_err() {
            department.head = None;
        }
        cache.departments.insert(id, department);
    }

    /// Drop a department; its members stay in the cache, unassigned.
    pub fn remove_department(
        cache: &mut TenantSnapshot,
        department_id: ExternalId,
    ) -> Option<Department> {
        let department = cache.departments.remove(&department_id)?;
        for member in &department.employee_ids {
            if let Some(employee) = cache.employees.get_mut(member) {
                if employee.department_id == Some(department_id) {
                    employee.department_id = None;
                }
            }
        }
        Some(department)
    }

    /// Report the first broken invariant in a snapshot, if any.
    pub fn verify(snapshot: &TenantSnapshot) -> Result<(), ValidationError> {
        for department in snapshot.departments.values() {
            Self::check_head(department, department.head)?;
            for member in &department.employee_ids {
                match snapshot.employees.get(member) {
                    None => {
                        return Err(ValidationError::UnknownMember {
                            department_id: department.id,
                            employee_id: *member,
                        })
                    }
                    Some(e) if e.department_id != Some(department.id) => {
                        return Err(ValidationError::MembershipMismatch {
                            department_id: department.id,
                            employee_id: *member,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        for employee in snapshot.employees.values() {
            if let Some(dept) = employee.department_id.and_then(|d| snapshot.departments.get(&d)) {
                if !dept.has_member(employee.id) {
                    return Err(ValidationError::MembershipMismatch {
                        department_id: dept.id,
                        employee_id: employee.id,
                    });
                }
            }
        }
        Ok(())
    }

    fn leave_department(cache: &mut TenantSnapshot, department_id: ExternalId, employee_id: ExternalId) {
        if let Some(dept) = cache.departments.get_mut(&department_id) {
            dept.employee_ids.remove(&employee_id);
            if dept.head == Some(employee_id) {
                dept.head = None;
            }
        }
    }
}
