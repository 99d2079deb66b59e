//! Safe init guard: add an init route, invoke it once, remove it.
//!
//! The three steps run against staged copies of the registry and storage
//! owned by the caller. If the invocation fails the caller drops the
//! staged copies and the record never leaves `Unregistered`; on success the
//! route is gone before anything is committed.

use crate::core::abi::hex_payload;
use crate::core::cut::{CutEngine, FacetCut};
use crate::core::error::DiamondError;
use crate::core::facet::{CallContext, ModuleHost};
use crate::core::registry::SelectorRegistry;
use crate::core::selector::{Address, Selector};
use crate::core::storage::Storage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    Unregistered,
    Registered,
    Consumed,
}

/// Tracks one init route through its single allowed lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitRecord {
    pub target: Address,
    pub selector: Selector,
    state: InitState,
}

impl InitRecord {
    pub fn new(target: Address, selector: Selector) -> Self {
        Self {
            target,
            selector,
            state: InitState::Unregistered,
        }
    }

    pub fn state(&self) -> InitState {
        self.state
    }

    fn advance(&mut self, from: InitState, to: InitState) -> Result<(), DiamondError> {
        if self.state != from {
            return Err(DiamondError::ValidationError(format!(
                "init {} on {} cannot move from {:?} to {:?}",
                self.selector, self.target, self.state, to
            )));
        }
        self.state = to;
        Ok(())
    }

    pub fn register(&mut self) -> Result<(), DiamondError> {
        self.advance(InitState::Unregistered, InitState::Registered)
    }

    pub fn consume(&mut self) -> Result<(), DiamondError> {
        self.advance(InitState::Registered, InitState::Consumed)
    }
}

/// Input to the guard: which module, which selector, and its opaque payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeInit {
    pub target: Address,
    pub selector: Selector,
    #[serde(with = "hex_payload", default)]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReceipt {
    pub target: Address,
    pub selector: Selector,
    pub state: InitState,
    pub output: Vec<u8>,
}

pub struct SafeInitGuard<'a> {
    host: &'a ModuleHost,
    entry_point: Address,
}

impl<'a> SafeInitGuard<'a> {
    pub fn new(host: &'a ModuleHost, entry_point: Address) -> Self {
        Self { host, entry_point }
    }

    /// Runs add -> invoke -> remove on `registry` and `storage`.
    ///
    /// Both must be staged copies: on error they hold partial changes and
    /// have to be discarded by the caller.
    pub fn run(
        &self,
        caller: Address,
        registry: &mut SelectorRegistry,
        storage: &mut Storage,
        request: &SafeInit,
    ) -> Result<InitReceipt, DiamondError> {
        let mut record = InitRecord::new(request.target, request.selector);

        let add = CutEngine::new(registry, self.host)
            .validate(&[FacetCut::add(request.target, vec![request.selector])])?;
        add.apply(registry);
        record.register()?;

        // Resolve through the registry so the call takes the same path as
        // any dispatched call.
        let module = registry
            .lookup(&request.selector)
            .ok_or(DiamondError::SelectorNotFound(request.selector))?;
        let facet = self
            .host
            .get(&module)
            .ok_or(DiamondError::ModuleCodeMissing(module))?;
        let output = {
            let mut ctx = CallContext::new(caller, self.entry_point, registry, storage);
            facet
                .call(&mut ctx, request.selector, &request.payload)
                .map_err(|source| DiamondError::InitPayloadFailed { module, source })?
        };

        let remove = CutEngine::new(registry, self.host)
            .validate(&[FacetCut::remove(vec![request.selector])])?;
        remove.apply(registry);
        record.consume()?;

        Ok(InitReceipt {
            target: record.target,
            selector: record.selector,
            state: record.state(),
            output,
        })
    }
}
