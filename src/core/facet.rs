//! Facets and the host that holds their code.
//!
//! A facet is stateless logic bound to a set of selectors. When the entry
//! point dispatches a call it hands the facet a `CallContext` holding the
//! entry point's own storage, so facet code always reads and writes the
//! caller's namespaced state and never its own.

use crate::core::error::{DiamondError, FacetError};
use crate::core::registry::SelectorRegistry;
use crate::core::selector::{Address, Selector};
use crate::core::storage::Storage;
use rustc_hash::FxHashMap;
use std::fmt;
use std::sync::Arc;

pub trait Facet: Send + Sync {
    /// Human-readable name used in deploy output and the audit log.
    fn name(&self) -> &str;

    /// Selectors this module implements.
    fn selectors(&self) -> Vec<Selector>;

    fn call(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        payload: &[u8],
    ) -> Result<Vec<u8>, FacetError>;
}

/// Execution context for one dispatched call.
pub struct CallContext<'a> {
    caller: Address,
    entry_point: Address,
    registry: &'a SelectorRegistry,
    storage: &'a mut Storage,
}

impl<'a> CallContext<'a> {
    pub fn new(
        caller: Address,
        entry_point: Address,
        registry: &'a SelectorRegistry,
        storage: &'a mut Storage,
    ) -> Self {
        Self {
            caller,
            entry_point,
            registry,
            storage,
        }
    }

    pub fn caller(&self) -> Address {
        self.caller
    }

    pub fn entry_point(&self) -> Address {
        self.entry_point
    }

    /// Read-only view of the routes visible to this call.
    pub fn registry(&self) -> &SelectorRegistry {
        self.registry
    }

    pub fn storage(&self) -> &Storage {
        self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        self.storage
    }
}

/// Deployed module code, keyed by address.
///
/// Deployment is append-only: code at an address is never swapped or
/// removed, which is what lets the cut engine treat "has code" as stable
/// between validation and commit.
#[derive(Clone, Default)]
pub struct ModuleHost {
    modules: FxHashMap<Address, Arc<dyn Facet>>,
}

impl ModuleHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deploy(&mut self, address: Address, facet: Arc<dyn Facet>) -> Result<(), DiamondError> {
        if address.is_zero() {
            return Err(DiamondError::ZeroAddressModule);
        }
        if self.modules.contains_key(&address) {
            return Err(DiamondError::ModuleAlreadyDeployed(address));
        }
        self.modules.insert(address, facet);
        Ok(())
    }

    pub fn has_code(&self, address: &Address) -> bool {
        self.modules.contains_key(address)
    }

    pub fn get(&self, address: &Address) -> Option<Arc<dyn Facet>> {
        self.modules.get(address).cloned()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<(Address, &str)> = self
            .modules
            .iter()
            .map(|(addr, facet)| (*addr, facet.name()))
            .collect();
        names.sort();
        f.debug_struct("ModuleHost").field("modules", &names).finish()
    }
}
