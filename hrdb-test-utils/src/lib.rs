//! HRDB Test Utilities
//!
//! Shared test infrastructure for the HRDB workspace:
//! - Proptest generators for ids, drafts and facade operation sequences
//! - Fixtures for seeded stores and registries
//! - Custom assertions for HRDB error kinds and cache invariants

pub use hrdb_core::{
    Department, DepartmentDraft, Employee, EmployeeDraft, EntityKind, ExternalId, HrdbConfig,
    HrdbError, HrdbResult, Organization, StorageError, TenantId, TenantSnapshot,
    ValidationError, EXTERNAL_ID_SPACE,
};
pub use hrdb_storage::{
    ConsistencyEngine, FacadeRegistry, InMemoryStorage, StorageBackend, TenantFacade,
    TenantKeyCodec,
};

use chrono::NaiveDate;

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for HRDB types.

    use super::*;
    use proptest::prelude::*;

    // === Identity Generators ===

    /// Any tenant id, including the extremes of `u32`.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        any::<u32>().prop_map(TenantId::new)
    }

    /// A valid external id (`0..EXTERNAL_ID_SPACE`).
    pub fn arb_external_id() -> impl Strategy<Value = ExternalId> {
        (0..EXTERNAL_ID_SPACE).prop_map(|raw| ExternalId::from_remainder(u64::from(raw)))
    }

    // === Entity Generators ===

    /// A hire date between 2000 and 2030.
    pub fn arb_hire_date() -> impl Strategy<Value = NaiveDate> {
        (2000i32..2030, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
            NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
        })
    }

    /// Position labels with stray whitespace and mixed case.
    pub fn arb_position() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("Engineer".to_string())),
            Just(Some("  engineer ".to_string())),
            Just(Some("Manager".to_string())),
            Just(Some("   ".to_string())),
        ]
    }

    pub fn arb_employee_draft() -> impl Strategy<Value = EmployeeDraft> {
        (
            "[A-Z][a-z]{2,8}",
            arb_hire_date(),
            arb_position(),
            0.0f64..500_000.0,
            prop::option::of(0.0f64..100.0),
        )
            .prop_map(|(name, hire_date, position, salary, performance)| EmployeeDraft {
                name,
                hire_date,
                position,
                salary,
                performance,
            })
    }

    // === Operation Sequences ===

    /// One structural operation against a facade. Ids are small so that
    /// sequences hit existing departments and employees often.
    #[derive(Debug, Clone)]
    pub enum FacadeOp {
        Add { department: u32 },
        Remove { department: u32, employee: u32 },
        SetHead { department: u32, employee: Option<u32> },
        Move { department: u32, employee: u32 },
        RemoveDepartment { department: u32 },
    }

    pub fn arb_facade_op() -> impl Strategy<Value = FacadeOp> {
        prop_oneof![
            4 => (1u32..4).prop_map(|department| FacadeOp::Add { department }),
            2 => (1u32..4, 1u32..12)
                .prop_map(|(department, employee)| FacadeOp::Remove { department, employee }),
            3 => (1u32..4, prop::option::of(1u32..12))
                .prop_map(|(department, employee)| FacadeOp::SetHead { department, employee }),
            2 => (1u32..4, 1u32..12)
                .prop_map(|(department, employee)| FacadeOp::Move { department, employee }),
            1 => (1u32..4).prop_map(|department| FacadeOp::RemoveDepartment { department }),
        ]
    }

    pub fn arb_facade_ops(max_len: usize) -> impl Strategy<Value = Vec<FacadeOp>> {
        prop::collection::vec(arb_facade_op(), 1..max_len)
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// Fixed hire date used by fixture employees.
    pub fn hire_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 10).unwrap_or(NaiveDate::MIN)
    }

    pub fn employee_draft(name: &str) -> EmployeeDraft {
        EmployeeDraft::new(name, hire_date())
    }

    /// Build an external id, panicking if it is out of range.
    pub fn ext(raw: u32) -> ExternalId {
        ExternalId::new(raw).unwrap_or_else(|e| panic!("fixture id {}: {}", raw, e))
    }

    /// A registry over a fresh in-memory store holding one organization,
    /// "Test Organization", with no departments yet.
    pub fn empty_registry() -> (Arc<InMemoryStorage>, FacadeRegistry, TenantId) {
        let store = Arc::new(InMemoryStorage::new());
        let registry = FacadeRegistry::new(store.clone());
        let tenant = registry
            .insert_organization("Test Organization")
            .map(|org| org.id)
            .unwrap_or_else(|e| panic!("fixture organization: {}", e));
        (store, registry, tenant)
    }

    /// Like [`empty_registry`], with departments named in `names` created in
    /// order (ids 1, 2, ...).
    pub fn registry_with_departments(
        names: &[&str],
    ) -> (Arc<InMemoryStorage>, FacadeRegistry, TenantId) {
        let (store, registry, tenant) = empty_registry();
        let facade = registry
            .facade_for(tenant)
            .unwrap_or_else(|e| panic!("fixture facade: {}", e));
        for name in names {
            match facade.insert_department(DepartmentDraft::new(*name)) {
                Ok(Some(_)) => {}
                other => panic!("fixture department {}: {:?}", name, other),
            }
        }
        (store, registry, tenant)
    }

    /// Drafts for the performance scenario: scores 100, 90, 80, 70 and one
    /// employee without a score.
    pub fn scored_drafts() -> Vec<EmployeeDraft> {
        let mut drafts: Vec<EmployeeDraft> = [
            ("Ann", 100.0),
            ("Ben", 90.0),
            ("Cid", 80.0),
            ("Dee", 70.0),
        ]
        .into_iter()
        .map(|(name, score)| employee_draft(name).with_performance(score))
        .collect();
        drafts.push(employee_draft("Eve"));
        drafts
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for HRDB-specific validation.

    use super::*;
    use std::sync::Arc;

    /// Assert that a result is a store failure.
    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &HrdbResult<T>) {
        match result {
            Err(HrdbError::StoreUnavailable(_)) => {}
            other => panic!("Expected StoreUnavailable, got: {:?}", other),
        }
    }

    /// Assert that a result is a tenant NotFound.
    #[track_caller]
    pub fn assert_tenant_not_found<T: std::fmt::Debug>(result: &HrdbResult<T>, tenant: TenantId) {
        match result {
            Err(HrdbError::NotFound {
                entity: EntityKind::Organization,
                id,
            }) => {
                assert_eq!(*id, u64::from(tenant.get()), "Wrong tenant in NotFound");
            }
            other => panic!("Expected NotFound for tenant {}, got: {:?}", tenant, other),
        }
    }

    /// Assert that a result is an InvalidState error.
    #[track_caller]
    pub fn assert_invalid_state<T: std::fmt::Debug>(result: &HrdbResult<T>) {
        match result {
            Err(HrdbError::InvalidState(_)) => {}
            other => panic!("Expected InvalidState, got: {:?}", other),
        }
    }

    /// Assert that a snapshot satisfies every head and membership invariant.
    #[track_caller]
    pub fn assert_consistent(snapshot: &TenantSnapshot) {
        if let Err(e) = ConsistencyEngine::verify(snapshot) {
            panic!("Snapshot violates invariants: {}\n{:#?}", e, snapshot);
        }
    }

    /// Assert that a facade's cache equals what a freshly loaded facade over
    /// the same store sees.
    #[track_caller]
    pub fn assert_cache_matches_store(facade: &TenantFacade, store: Arc<dyn StorageBackend>) {
        let cached = facade
            .snapshot()
            .unwrap_or_else(|e| panic!("snapshot failed: {}", e));
        let reloaded = TenantFacade::load(facade.tenant_id(), store)
            .and_then(|fresh| fresh.snapshot())
            .unwrap_or_else(|e| panic!("reload failed: {}", e));
        assert_eq!(cached, reloaded, "Cache and store disagree");
    }
}
