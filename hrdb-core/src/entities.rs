//! Core entity structures

use crate::{ExternalId, TenantId, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Organization - the tenant root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: TenantId,
    pub name: String,
}

impl Organization {
    pub fn new(id: TenantId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Organization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Organization: {} (ID: {})", self.name, self.id)
    }
}

/// Department - a named group of employees inside one organization.
///
/// `head` is a weak reference: it names an employee by id and must be one of
/// `employee_ids` whenever it is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Department {
    pub id: ExternalId,
    pub name: String,
    pub employee_ids: BTreeSet<ExternalId>,
    pub head: Option<ExternalId>,
}

impl Department {
    pub fn new(id: ExternalId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            employee_ids: BTreeSet::new(),
            head: None,
        }
    }

    pub fn has_member(&self, employee_id: ExternalId) -> bool {
        self.employee_ids.contains(&employee_id)
    }

    pub fn employee_count(&self) -> usize {
        self.employee_ids.len()
    }
}

/// Employee - a person in an organization, optionally assigned to a department.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub id: ExternalId,
    pub name: String,
    pub hire_date: NaiveDate,
    pub position: Option<String>,
    pub salary: f64,
    /// Unset scores are left out of performance statistics.
    pub performance: Option<f64>,
    pub department_id: Option<ExternalId>,
}

impl Employee {
    /// Materialize a draft under an assigned id.
    pub fn from_draft(
        id: ExternalId,
        draft: EmployeeDraft,
        department_id: Option<ExternalId>,
    ) -> Self {
        Self {
            id,
            name: draft.name,
            hire_date: draft.hire_date,
            position: draft.position,
            salary: draft.salary,
            performance: draft.performance,
            department_id,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_metrics(self.salary, self.performance)
    }
}

/// Reject salaries and scores that JSON cannot carry (NaN, ±inf).
pub fn check_metrics(salary: f64, performance: Option<f64>) -> Result<(), ValidationError> {
    if !salary.is_finite() {
        return Err(ValidationError::NonFiniteValue {
            field: "salary",
            value: salary.to_string(),
        });
    }
    match performance {
        Some(score) if !score.is_finite() => Err(ValidationError::NonFiniteValue {
            field: "performance",
            value: score.to_string(),
        }),
        _ => Ok(()),
    }
}

impl fmt::Display for Employee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Employee: {} (ID: {}) Hired at: {}",
            self.name, self.id, self.hire_date
        )
    }
}

/// Fields of an employee that does not have an id yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeDraft {
    pub name: String,
    pub hire_date: NaiveDate,
    pub position: Option<String>,
    pub salary: f64,
    pub performance: Option<f64>,
}

impl EmployeeDraft {
    pub fn new(name: impl Into<String>, hire_date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            hire_date,
            position: None,
            salary: 0.0,
            performance: None,
        }
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }

    pub fn with_salary(mut self, salary: f64) -> Self {
        self.salary = salary;
        self
    }

    pub fn with_performance(mut self, performance: f64) -> Self {
        self.performance = Some(performance);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_metrics(self.salary, self.performance)
    }
}

/// Fields of a department that does not have an id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentDraft {
    pub name: String,
}

impl DepartmentDraft {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
