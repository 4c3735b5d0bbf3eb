//! Per-tenant cache layer over a [`StorageBackend`](crate::StorageBackend).
//!
//! # Tenant Isolation
//!
//! Departments and employees are addressed in the store by the flat id built
//! by [`TenantKeyCodec`]; a facade only ever encodes ids with its own tenant,
//! so one tenant's facade cannot reach another tenant's rows.
//!
//! # Example
//!
//! ```ignore
//! let registry = FacadeRegistry::from_config(&HrdbConfig::from_env()?)?;
//! let org = registry.insert_organization("Acme")?;
//! let facade = registry.facade_for(org.id)?;
//!
//! let dept = facade.insert_department(DepartmentDraft::new("Sales"))?.unwrap();
//! let hire = EmployeeDraft::new("Jake", today).with_salary(50.0);
//! let jake = facade.add_employee_to_department(dept.id, hire)?.unwrap();
//! facade.set_department_head(dept.id, Some(jake.id))?;
//! ```

pub mod consistency;
pub mod facade;
pub mod registry;
pub mod tenant_key;

pub use consistency::ConsistencyEngine;
pub use facade::TenantFacade;
pub use registry::FacadeRegistry;
pub use tenant_key::TenantKeyCodec;
