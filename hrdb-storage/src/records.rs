//! Relational rows held by the storage backends.
//!
//! Rows reference each other by [`FlatId`]. Both backends apply every write
//! through [`TenantRows`], so they agree on the foreign-key rules:
//!
//! - removing an employee clears any department head pointing at it
//! - removing a department leaves its employees unassigned
//! - a department head is always one of the department's employees
//! - salaries and performance scores are finite, so every row survives a
//!   JSON round trip

use crate::cache::TenantKeyCodec;
use chrono::NaiveDate;
use hrdb_core::entities::check_metrics;
use hrdb_core::{FlatId, Organization, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Stored department row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRecord {
    pub id: FlatId,
    pub organization_id: TenantId,
    pub name: String,
    pub head: Option<FlatId>,
}

/// Stored employee row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: FlatId,
    pub organization_id: TenantId,
    pub department_id: Option<FlatId>,
    pub name: String,
    pub hire_date: NaiveDate,
    pub position: Option<String>,
    pub salary: f64,
    pub performance: Option<f64>,
}

/// Every row owned by one tenant.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TenantRows {
    pub organization: Organization,
    pub departments: BTreeMap<FlatId, DepartmentRecord>,
    pub employees: BTreeMap<FlatId, EmployeeRecord>,
}

impl TenantRows {
    pub fn new(organization: Organization) -> Self {
        Self {
            organization,
            departments: BTreeMap::new(),
            employees: BTreeMap::new(),
        }
    }

    fn owns(&self, id: FlatId) -> bool {
        TenantKeyCodec::tenant_of(id) == self.organization.id
    }

    pub fn department_members(&self, department_id: FlatId) -> Vec<FlatId> {
        self.employees
            .values()
            .filter(|e| e.department_id == Some(department_id))
            .map(|e| e.id)
            .collect()
    }

    pub fn next_employee_id(&self) -> u32 {
        next_external_id(self.employees.keys())
    }

    pub fn next_department_id(&self) -> u32 {
        next_external_id(self.departments.keys())
    }

    pub fn insert_department(&mut self, record: &DepartmentRecord) -> bool {
        if !self.owns(record.id)
            || record.organization_id != self.organization.id
            || self.departments.contains_key(&record.id)
            || record.head.is_some()
        {
            return false;
        }
        self.departments.insert(record.id, record.clone());
        true
    }

    pub fn insert_employee(&mut self, record: &EmployeeRecord) -> bool {
        if !self.owns(record.id)
            || record.organization_id != self.organization.id
            || self.employees.contains_key(&record.id)
            || check_metrics(record.salary, record.performance).is_err()
        {
            return false;
        }
        if let Some(dept) = record.department_id {
            if !self.departments.contains_key(&dept) {
                return false;
            }
        }
        self.employees.insert(record.id, record.clone());
        true
    }

    pub fn update_employee(&mut self, record: &EmployeeRecord) -> bool {
        if record.organization_id != self.organization.id
            || !self.employees.contains_key(&record.id)
            || check_metrics(record.salary, record.performance).is_err()
        {
            return false;
        }
        if let Some(dept) = record.department_id {
            if !self.departments.contains_key(&dept) {
                return false;
            }
        }
        self.employees.insert(record.id, record.clone());
        self.clear_stale_heads();
        true
    }

    /// Replace a department row and make `members` its exact member set.
    ///
    /// Listed employees are moved into the department, former members that
    /// are not listed become unassigned. Rejected if the department or any
    /// listed employee is unknown, or if the head is not listed.
    pub fn update_department(&mut self, record: &DepartmentRecord, members: &[FlatId]) -> bool {
        if record.organization_id != self.organization.id
            || !self.departments.contains_key(&record.id)
        {
            return false;
        }
        if members.iter().any(|id| !self.employees.contains_key(id)) {
            return false;
        }
        if let Some(head) = record.head {
            if !members.contains(&head) {
                return false;
            }
        }

        let listed: BTreeSet<FlatId> = members.iter().copied().collect();
        for employee in self.employees.values_mut() {
            if listed.contains(&employee.id) {
                employee.department_id = Some(record.id);
            } else if employee.department_id == Some(record.id) {
                employee.department_id = None;
            }
        }
        self.departments.insert(record.id, record.clone());
        self.clear_stale_heads();
        true
    }

    pub fn remove_employee(&mut self, id: FlatId) -> bool {
        if self.employees.remove(&id).is_none() {
            return false;
        }
        self.clear_stale_heads();
        true
    }

    pub fn remove_department(&mut self, id: FlatId) -> bool {
        if self.departments.remove(&id).is_none() {
            return false;
        }
        for employee in self.employees.values_mut() {
            if employee.department_id == Some(id) {
                employee.department_id = None;
            }
        }
        true
    }

    /// Clear every head that is no longer a member of its department.
    fn clear_stale_heads(&mut self) {
        let employees = &self.employees;
        for department in self.departments.values_mut() {
            if let Some(head) = department.head {
                let still_member = employees
                    .get(&head)
                    .is_some_and(|e| e.department_id == Some(department.id));
                if !still_member {
                    department.head = None;
                }
            }
        }
    }
}

/// One past the largest external id in use, or 1 for an empty tenant.
///
/// The result is not range checked; callers validate it as an external id.
fn next_external_id<'a>(ids: impl Iterator<Item = &'a FlatId>) -> u32 {
    ids.map(|id| TenantKeyCodec::decode(*id).1.get())
        .max()
        .map_or(1, |max| max + 1)
}
