//! Selector registry: which module answers which selector.
//!
//! Pure data. The registry performs no validation of its own; every
//! invariant (unique selectors, presence before replace/remove) is checked by
//! the cut engine before any of these mutators run.

use crate::core::selector::{Address, Selector};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Loupe view of one module and the selectors routed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRoutes {
    pub address: Address,
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorRegistry {
    routes: BTreeMap<Selector, Address>,
    // Modules in first-registration order, each with its selectors in
    // registration order.
    facets: Vec<FacetRoutes>,
}

impl SelectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, selector: &Selector) -> Option<Address> {
        self.routes.get(selector).copied()
    }

    pub fn contains(&self, selector: &Selector) -> bool {
        self.routes.contains_key(selector)
    }

    pub fn insert(&mut self, selector: Selector, module: Address) {
        debug_assert!(!self.routes.contains_key(&selector));
        self.routes.insert(selector, module);
        self.attach(selector, module);
    }

    pub fn replace(&mut self, selector: Selector, module: Address) {
        if let Some(previous) = self.routes.insert(selector, module) {
            self.detach(&selector, &previous);
        }
        self.attach(selector, module);
    }

    pub fn remove(&mut self, selector: &Selector) {
        if let Some(previous) = self.routes.remove(selector) {
            self.detach(selector, &previous);
        }
    }

    fn attach(&mut self, selector: Selector, module: Address) {
        match self.facets.iter_mut().find(|f| f.address == module) {
            Some(facet) => facet.selectors.push(selector),
            None => self.facets.push(FacetRoutes {
                address: module,
                selectors: vec![selector],
            }),
        }
    }

    fn detach(&mut self, selector: &Selector, module: &Address) {
        if let Some(pos) = self.facets.iter().position(|f| f.address == *module) {
            let facet = &mut self.facets[pos];
            facet.selectors.retain(|s| s != selector);
            if facet.selectors.is_empty() {
                self.facets.remove(pos);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Every selector with its module, ordered by selector.
    pub fn entries(&self) -> impl Iterator<Item = (&Selector, &Address)> {
        self.routes.iter()
    }

    pub fn facets(&self) -> &[FacetRoutes] {
        &self.facets
    }

    pub fn facet_addresses(&self) -> Vec<Address> {
        self.facets.iter().map(|f| f.address).collect()
    }

    pub fn facet_selectors(&self, module: &Address) -> Vec<Selector> {
        self.facets
            .iter()
            .find(|f| f.address == *module)
            .map(|f| f.selectors.clone())
            .unwrap_or_default()
    }

    /// SHA-256 over the sorted `(selector, module)` pairs.
    ///
    /// Two registries with the same routes have the same fingerprint
    /// regardless of the order in which routes were added.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for (selector, module) in &self.routes {
            hasher.update(selector.as_bytes());
            hasher.update(module.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// Rebuilds a registry from loupe order, as persisted by the store.
    pub fn from_facets(facets: Vec<FacetRoutes>) -> Self {
        let mut registry = Self::new();
        for facet in facets {
            for selector in facet.selectors {
                registry.insert(selector, facet.address);
            }
        }
        registry
    }
}
