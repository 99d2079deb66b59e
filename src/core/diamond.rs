//! The entry point: one owner, one registry, one storage.
//!
//! All mutation goes through `&mut Diamond`, so within a process the borrow
//! checker already serializes cuts. Cross-process serialization is the
//! broker's job.

use crate::core::abi::word_from_address;
use crate::core::access::AccessGate;
use crate::core::cut::{CutEngine, FacetCut, InitCall};
use crate::core::error::DiamondError;
use crate::core::facet::{CallContext, Facet, ModuleHost};
use crate::core::init::{InitReceipt, SafeInit, SafeInitGuard};
use crate::core::registry::SelectorRegistry;
use crate::core::selector::{Address, Selector};
use crate::core::storage::Storage;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Namespace holding entry-point bookkeeping readable by facets.
pub const OWNERSHIP_NAMESPACE: &str = "diamond.ownership";

#[derive(Debug)]
pub struct Diamond {
    address: Address,
    gate: AccessGate,
    registry: SelectorRegistry,
    storage: Storage,
    host: ModuleHost,
    consumed_inits: BTreeSet<(Address, Selector)>,
}

impl Diamond {
    pub fn new(address: Address, owner: Address, host: ModuleHost) -> Self {
        let mut storage = Storage::new();
        storage
            .namespace(OWNERSHIP_NAMESPACE)
            .set(0, word_from_address(&owner));
        Self {
            address,
            gate: AccessGate::new(owner),
            registry: SelectorRegistry::new(),
            storage,
            host,
            consumed_inits: BTreeSet::new(),
        }
    }

    /// Reassembles a diamond from persisted parts.
    pub fn restore(
        address: Address,
        owner: Address,
        host: ModuleHost,
        registry: SelectorRegistry,
        storage: Storage,
        consumed_inits: BTreeSet<(Address, Selector)>,
    ) -> Self {
        Self {
            address,
            gate: AccessGate::new(owner),
            registry,
            storage,
            host,
            consumed_inits,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn owner(&self) -> Address {
        self.gate.owner()
    }

    pub fn registry(&self) -> &SelectorRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn host(&self) -> &ModuleHost {
        &self.host
    }

    pub fn consumed_inits(&self) -> &BTreeSet<(Address, Selector)> {
        &self.consumed_inits
    }

    /// Deploys module code. Ungated: code alone is unreachable until a cut
    /// routes selectors to it.
    pub fn deploy_module(
        &mut self,
        address: Address,
        facet: Arc<dyn Facet>,
    ) -> Result<(), DiamondError> {
        self.host.deploy(address, facet)
    }

    pub fn lookup(&self, selector: &Selector) -> Option<Address> {
        self.registry.lookup(selector)
    }

    /// Applies a batch of route changes and an optional init call as one unit.
    ///
    /// Returns the selectors registered by add and replace entries.
    pub fn diamond_cut(
        &mut self,
        caller: Address,
        cuts: &[FacetCut],
        init: Option<&InitCall>,
    ) -> Result<Vec<Selector>, DiamondError> {
        self.gate.ensure_owner(&caller)?;

        let engine = CutEngine::new(&self.registry, &self.host);
        let plan = engine.validate(cuts)?;
        if let Some(init) = init {
            engine.validate_init(init)?;
        }

        let mut registry = self.registry.clone();
        let mut storage = self.storage.clone();
        plan.apply(&mut registry);

        if let Some(init) = init {
            let facet = self
                .host
                .get(&init.target)
                .ok_or(DiamondError::ModuleCodeMissing(init.target))?;
            let mut ctx = CallContext::new(caller, self.address, &registry, &mut storage);
            facet
                .call(&mut ctx, init.selector, &init.payload)
                .map_err(|source| DiamondError::InitPayloadFailed {
                    module: init.target,
                    source,
                })?;
        }

        self.registry = registry;
        self.storage = storage;
        Ok(plan.into_registered())
    }

    /// Bootstraps a module's storage through a route that exists only for
    /// the duration of the call.
    pub fn safe_init(
        &mut self,
        caller: Address,
        request: &SafeInit,
    ) -> Result<InitReceipt, DiamondError> {
        self.gate.ensure_owner(&caller)?;

        let key = (request.target, request.selector);
        if self.consumed_inits.contains(&key) {
            return Err(DiamondError::InitAlreadyConsumed {
                module: request.target,
                selector: request.selector,
            });
        }

        let mut registry = self.registry.clone();
        let mut storage = self.storage.clone();
        let receipt = SafeInitGuard::new(&self.host, self.address).run(
            caller,
            &mut registry,
            &mut storage,
            request,
        )?;

        self.registry = registry;
        self.storage = storage;
        self.consumed_inits.insert(key);
        Ok(receipt)
    }

    /// Routes a call to whichever module currently owns `selector`.
    ///
    /// Open to any caller. Storage writes made by a failing call are
    /// discarded.
    pub fn dispatch(
        &mut self,
        caller: Address,
        selector: Selector,
        payload: &[u8],
    ) -> Result<Vec<u8>, DiamondError> {
        let module = self
            .registry
            .lookup(&selector)
            .ok_or(DiamondError::FunctionNotFound(selector))?;
        let facet = self
            .host
            .get(&module)
            .ok_or(DiamondError::ModuleCodeMissing(module))?;

        let mut storage = self.storage.clone();
        let output = {
            let mut ctx = CallContext::new(caller, self.address, &self.registry, &mut storage);
            facet
                .call(&mut ctx, selector, payload)
                .map_err(|source| DiamondError::Facet { module, source })?
        };
        self.storage = storage;
        Ok(output)
    }
}
