//! Registry of live tenant facades.
//!
//! At most one [`TenantFacade`] is published per tenant id. Each tenant gets
//! its own slot in a [`DashMap`]; first access locks only that slot while the
//! facade loads, so unrelated tenants never wait on each other. A load that
//! fails drops the slot again, which means a missing tenant is never cached.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use hrdb_core::{HrdbConfig, HrdbResult, Organization, StorageError, TenantId};

use super::facade::TenantFacade;
use crate::{open_storage, StorageBackend};

type Slot = Arc<Mutex<Option<Arc<TenantFacade>>>>;

/// Lazily populated map from tenant id to its facade.
pub struct FacadeRegistry {
    store: Arc<dyn StorageBackend>,
    slots: DashMap<TenantId, Slot>,
}

impl FacadeRegistry {
    pub fn new(store: Arc<dyn StorageBackend>) -> Self {
        Self {
            store,
            slots: DashMap::new(),
        }
    }

    /// Build a registry over the backend selected by `config`.
    pub fn from_config(config: &HrdbConfig) -> HrdbResult<Self> {
        Ok(Self::new(open_storage(config)?))
    }

    pub fn store(&self) -> &Arc<dyn StorageBackend> {
        &self.store
    }

    /// The facade for a tenant, loading it on first access.
    ///
    /// Fails with `NotFound` if the store has no such organization; nothing is
    /// registered in that case and the next call asks the store again.
    pub fn facade_for(&self, tenant_id: TenantId) -> HrdbResult<Arc<TenantFacade>> {
        loop {
            let slot = {
                let entry = self.slots.entry(tenant_id).or_default();
                Arc::clone(entry.value())
            };

            let mut guard = slot.lock().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(facade) = guard.as_ref() {
                return Ok(Arc::clone(facade));
            }

            // A failed load may have dropped this slot while we waited on it.
            let current = self
                .slots
                .get(&tenant_id)
                .is_some_and(|s| Arc::ptr_eq(s.value(), &slot));
            if !current {
                continue;
            }

            return match TenantFacade::load(tenant_id, Arc::clone(&self.store)) {
                Ok(facade) => {
                    let facade = Arc::new(facade);
                    *guard = Some(Arc::clone(&facade));
                    Ok(facade)
                }
                Err(e) => {
                    self.slots
                        .remove_if(&tenant_id, |_, s| Arc::ptr_eq(s, &slot));
                    tracing::debug!(tenant_id = %tenant_id, error = %e, "Tenant load failed");
                    Err(e)
                }
            };
        }
    }

    /// True if a facade for the tenant has been published.
    pub fn is_loaded(&self, tenant_id: TenantId) -> bool {
        let Some(slot) = self.slots.get(&tenant_id).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let loaded = slot.lock().map(|g| g.is_some()).unwrap_or(false);
        loaded
    }

    /// Number of tenants with a published facade.
    pub fn loaded_tenants(&self) -> usize {
        let slots: Vec<Slot> = self.slots.iter().map(|s| Arc::clone(s.value())).collect();
        slots
            .iter()
            .filter(|slot| slot.lock().map(|g| g.is_some()).unwrap_or(false))
            .count()
    }

    /// Create an organization under a new tenant id.
    pub fn insert_organization(&self, name: &str) -> HrdbResult<Organization> {
        let organization = self.store.insert_organization(name)?;
        tracing::info!(tenant_id = %organization.id, "Inserted organization");
        Ok(organization)
    }

    /// Remove an organization with all of its data and drop its facade.
    ///
    /// A caller still holding the old facade finds it detached: its cache is
    /// emptied and every later mutation is refused.
    pub fn remove_organization(&self, tenant_id: TenantId) -> HrdbResult<bool> {
        let removed = self.store.remove_organization(tenant_id)?;
        if let Some((_, slot)) = self.slots.remove(&tenant_id) {
            let guard = slot.lock().map_err(|_| StorageError::LockPoisoned)?;
            if let Some(facade) = guard.as_ref() {
                facade.mark_removed()?;
            }
        }
        if removed {
            tracing::info!(tenant_id = %tenant_id, "Removed organization");
        }
        Ok(removed)
    }
}
