//! Organization tree view
//!
//! Organizations, departments and employees share one capability,
//! [`OrgNode`]: they are named, identifiable nodes of a tree. The tree itself
//! is not stored anywhere. [`TenantSnapshot`] holds id-keyed maps and resolves
//! children on demand through [`NodeRef`].

use crate::{Department, Employee, ExternalId, Organization};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Kind of node in the organization tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Organization,
    Department,
    Employee,
}

impl NodeKind {
    pub fn type_name(self) -> &'static str {
        match self {
            NodeKind::Organization => "Organization",
            NodeKind::Department => "Department",
            NodeKind::Employee => "Employee",
        }
    }
}

/// A named, identifiable node of the organization tree.
pub trait OrgNode {
    /// Id within the node's own namespace (tenant id for organizations).
    fn node_id(&self) -> u64;

    fn node_name(&self) -> &str;

    fn kind(&self) -> NodeKind;
}

impl OrgNode for Organization {
    fn node_id(&self) -> u64 {
        u64::from(self.id.get())
    }

    fn node_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Organization
    }
}

impl OrgNode for Department {
    fn node_id(&self) -> u64 {
        u64::from(self.id.get())
    }

    fn node_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Department
    }
}

impl OrgNode for Employee {
    fn node_id(&self) -> u64 {
        u64::from(self.id.get())
    }

    fn node_name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Employee
    }
}

/// Borrowed handle to any node of a snapshot.
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Organization(&'a Organization),
    Department(&'a Department),
    Employee(&'a Employee),
}

impl<'a> NodeRef<'a> {
    fn as_node(&self) -> &'a dyn OrgNode {
        match *self {
            NodeRef::Organization(org) => org,
            NodeRef::Department(dept) => dept,
            NodeRef::Employee(emp) => emp,
        }
    }
}

impl OrgNode for NodeRef<'_> {
    fn node_id(&self) -> u64 {
        self.as_node().node_id()
    }

    fn node_name(&self) -> &str {
        self.as_node().node_name()
    }

    fn kind(&self) -> NodeKind {
        self.as_node().kind()
    }
}

/// Point-in-time copy of one tenant's cached data.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantSnapshot {
    pub organization: Organization,
    pub departments: BTreeMap<ExternalId, Department>,
    pub employees: BTreeMap<ExternalId, Employee>,
}

impl TenantSnapshot {
    pub fn root(&self) -> NodeRef<'_> {
        NodeRef::Organization(&self.organization)
    }

    /// Members of a department ordered by id, or `None` for an unknown
    /// department. Member ids without an employee record are skipped.
    pub fn department_employees(&self, department_id: ExternalId) -> Option<Vec<Employee>> {
        let department = self.departments.get(&department_id)?;
        Some(
            department
                .employee_ids
                .iter()
                .filter_map(|id| self.employees.get(id))
                .cloned()
                .collect(),
        )
    }

    /// Children of a node: departments then unassigned employees for the
    /// organization, members for a department, nothing for an employee.
    pub fn children<'a>(&'a self, node: NodeRef<'a>) -> Vec<NodeRef<'a>> {
        match node {
            NodeRef::Organization(_) => self
                .departments
                .values()
                .map(NodeRef::Department)
                .chain(
                    self.employees
                        .values()
                        .filter(|e| e.department_id.is_none())
                        .map(NodeRef::Employee),
                )
                .collect(),
            NodeRef::Department(dept) => dept
                .employee_ids
                .iter()
                .filter_map(|id| self.employees.get(id))
                .map(NodeRef::Employee)
                .collect(),
            NodeRef::Employee(_) => Vec::new(),
        }
    }

    /// Render the tree, one `- Kind: Name` line per node, indented two spaces
    /// per level.
    pub fn display_structure(&self) -> String {
        let mut out = String::new();
        self.render(self.root(), 0, &mut out);
        out
    }

    fn render(&self, node: NodeRef<'_>, depth: usize, out: &mut String) {
        let _ = writeln!(
            out,
            "{}- {}: {}",
            " ".repeat(depth * 2),
            node.kind().type_name(),
            node.node_name()
        );
        for child in self.children(node) {
            self.render(child, depth + 1, out);
        }
    }

    /// Human-readable description of one department and its members.
    pub fn describe_department(&self, department_id: ExternalId) -> Option<String> {
        let department = self.departments.get(&department_id)?;
        let mut out = format!("Department: {} (ID: {})", department.name, department.id);

        if let Some(head) = department.head.and_then(|id| self.employees.get(&id)) {
            let _ = write!(out, " Head: {}", head.name);
        }

        let members = self.department_employees(department_id).unwrap_or_default();
        if members.is_empty() {
            out.push_str("\n  No employees in this department.");
        } else {
            out.push_str("\n  Employees:");
            for member in &members {
                let _ = write!(out, "\n    - {} (ID: {})", member.name, member.id);
            }
        }
        Some(out)
    }

    /// Serializable overview of the organization.
    pub fn summary(&self) -> OrganizationSummary {
        OrganizationSummary {
            id: self.organization.id.get(),
            name: self.organization.name.clone(),
            employee_count: self.employees.len(),
            departments: self
                .departments
                .values()
                .map(|dept| DepartmentSummary {
                    id: dept.id,
                    name: dept.name.trim().to_string(),
                    employee_count: dept.employee_count(),
                    head: dept.head,
                })
                .collect(),
        }
    }
}

/// Overview of one organization, as handed to the routing layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrganizationSummary {
    pub id: u32,
    pub name: String,
    pub employee_count: usize,
    pub departments: Vec<DepartmentSummary>,
}

/// Per-department entry of an [`OrganizationSummary`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepartmentSummary {
    pub id: ExternalId,
    pub name: String,
    pub employee_count: usize,
    pub head: Option<ExternalId>,
}
