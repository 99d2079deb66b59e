//! Cut engine: validate a batch of route changes, then apply it as a unit.
//!
//! Validation reads the live registry and the module host and produces a
//! `CutPlan`. The plan holds only pre-checked mutations, so applying it
//! cannot fail part-way. Callers apply plans to a staged copy of the
//! registry and swap it in once everything else in the same unit has
//! succeeded.

use crate::core::abi::hex_payload;
use crate::core::error::DiamondError;
use crate::core::facet::ModuleHost;
use crate::core::registry::SelectorRegistry;
use crate::core::selector::{Address, Selector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacetCutAction {
    Add,
    Replace,
    Remove,
}

impl std::fmt::Display for FacetCutAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Replace => write!(f, "replace"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// One entry of a cut request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetCut {
    pub target: Address,
    pub action: FacetCutAction,
    pub selectors: Vec<Selector>,
}

impl FacetCut {
    pub fn add(target: Address, selectors: Vec<Selector>) -> Self {
        Self {
            target,
            action: FacetCutAction::Add,
            selectors,
        }
    }

    pub fn replace(target: Address, selectors: Vec<Selector>) -> Self {
        Self {
            target,
            action: FacetCutAction::Replace,
            selectors,
        }
    }

    pub fn remove(selectors: Vec<Selector>) -> Self {
        Self {
            target: Address::ZERO,
            action: FacetCutAction::Remove,
            selectors,
        }
    }
}

/// A call executed in the entry point's storage context as part of a cut.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitCall {
    pub target: Address,
    pub selector: Selector,
    #[serde(with = "hex_payload", default)]
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mutation {
    Insert(Selector, Address),
    Replace(Selector, Address),
    Remove(Selector),
}

/// Validated mutations, ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CutPlan {
    mutations: Vec<Mutation>,
    registered: Vec<Selector>,
}

impl CutPlan {
    pub fn apply(&self, registry: &mut SelectorRegistry) {
        for mutation in &self.mutations {
            match *mutation {
                Mutation::Insert(selector, module) => registry.insert(selector, module),
                Mutation::Replace(selector, module) => registry.replace(selector, module),
                Mutation::Remove(selector) => registry.remove(&selector),
            }
        }
    }

    /// Selectors bound by add and replace entries, in request order.
    pub fn registered(&self) -> &[Selector] {
        &self.registered
    }

    pub fn into_registered(self) -> Vec<Selector> {
        self.registered
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

pub struct CutEngine<'a> {
    registry: &'a SelectorRegistry,
    host: &'a ModuleHost,
}

impl<'a> CutEngine<'a> {
    pub fn new(registry: &'a SelectorRegistry, host: &'a ModuleHost) -> Self {
        Self { registry, host }
    }

    /// Checks every entry against the registry. Nothing is mutated; the
    /// first violation aborts the whole batch.
    pub fn validate(&self, cuts: &[FacetCut]) -> Result<CutPlan, DiamondError> {
        let mut seen = BTreeSet::new();
        for cut in cuts {
            if cut.selectors.is_empty() {
                return Err(DiamondError::EmptySelectorSet(cut.target));
            }
            for selector in &cut.selectors {
                if !seen.insert(*selector) {
                    return Err(DiamondError::ConflictingCut(*selector));
                }
            }
        }

        let mut mutations = Vec::new();
        let mut registered = Vec::new();
        for cut in cuts {
            match cut.action {
                FacetCutAction::Add => {
                    self.ensure_code(&cut.target)?;
                    for selector in &cut.selectors {
                        if self.registry.contains(selector) {
                            return Err(DiamondError::DuplicateSelector(*selector));
                        }
                        mutations.push(Mutation::Insert(*selector, cut.target));
                        registered.push(*selector);
                    }
                }
                FacetCutAction::Replace => {
                    self.ensure_code(&cut.target)?;
                    for selector in &cut.selectors {
                        match self.registry.lookup(selector) {
                            None => return Err(DiamondError::SelectorNotFound(*selector)),
                            Some(current) if current == cut.target => {
                                return Err(DiamondError::AmbiguousReplace {
                                    selector: *selector,
                                    module: current,
                                });
                            }
                            Some(_) => {}
                        }
                        mutations.push(Mutation::Replace(*selector, cut.target));
                        registered.push(*selector);
                    }
                }
                FacetCutAction::Remove => {
                    if !cut.target.is_zero() {
                        return Err(DiamondError::RemoveTargetNotZero(cut.target));
                    }
                    for selector in &cut.selectors {
                        if !self.registry.contains(selector) {
                            return Err(DiamondError::SelectorNotFound(*selector));
                        }
                        mutations.push(Mutation::Remove(*selector));
                    }
                }
            }
        }

        Ok(CutPlan {
            mutations,
            registered,
        })
    }

    pub fn validate_init(&self, init: &InitCall) -> Result<(), DiamondError> {
        self.ensure_code(&init.target)
    }

    fn ensure_code(&self, target: &Address) -> Result<(), DiamondError> {
        if target.is_zero() {
            return Err(DiamondError::ZeroAddressModule);
        }
        if !self.host.has_code(target) {
            return Err(DiamondError::ModuleCodeMissing(*target));
        }
        Ok(())
    }
}
