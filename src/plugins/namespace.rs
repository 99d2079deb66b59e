//! Facets generated from a registered namespace layout.
//!
//! `NamespaceFacet` exposes one zero-argument getter per field.
//! `NamespaceInitializer` exposes a single `initialize<Name>(bytes)` whose
//! payload is one word per field, in layout order. It is meant to be run
//! through the safe init guard so it can never be reached again.

use crate::core::abi::decode_words;
use crate::core::diamond::OWNERSHIP_NAMESPACE;
use crate::core::error::{DiamondError, FacetError};
use crate::core::facet::{CallContext, Facet};
use crate::core::selector::Selector;
use crate::core::slot::NamespaceLayout;

pub struct NamespaceFacet {
    name: String,
    layout: NamespaceLayout,
    getters: Vec<(Selector, u64)>,
}

impl NamespaceFacet {
    pub fn new<S: Into<String>>(name: S, layout: NamespaceLayout) -> Result<Self, DiamondError> {
        let mut getters = Vec::with_capacity(layout.fields.len());
        for (i, field) in layout.fields.iter().enumerate() {
            let selector = Selector::from_signature(&format!("{}()", field))?;
            getters.push((selector, i as u64));
        }
        Ok(Self {
            name: name.into(),
            layout,
            getters,
        })
    }

    pub fn layout(&self) -> &NamespaceLayout {
        &self.layout
    }
}

impl Facet for NamespaceFacet {
    fn name(&self) -> &str {
        &self.name
    }

    fn selectors(&self) -> Vec<Selector> {
        self.getters.iter().map(|(s, _)| *s).collect()
    }

    fn call(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        _payload: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        let index = self
            .getters
            .iter()
            .find(|(s, _)| *s == selector)
            .map(|(_, i)| *i)
            .ok_or(FacetError::Unsupported(selector))?;
        Ok(ctx
            .storage()
            .read_field(&self.layout.name, index)
            .to_vec())
    }
}

/// Signature of the initializer for `namespace`: non-alphanumeric
/// characters are dropped, so `lending.Account` becomes
/// `initializeLendingAccount(bytes)`.
pub fn initializer_signature(namespace: &str) -> String {
    let mut name = String::from("initialize");
    let mut upper = true;
    for c in namespace.chars() {
        if c.is_ascii_alphanumeric() {
            if upper {
                name.extend(c.to_uppercase());
            } else {
                name.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    format!("{}(bytes)", name)
}

pub struct NamespaceInitializer {
    name: String,
    layout: NamespaceLayout,
    selector: Selector,
}

impl NamespaceInitializer {
    pub fn new<S: Into<String>>(name: S, layout: NamespaceLayout) -> Result<Self, DiamondError> {
        if layout.name == OWNERSHIP_NAMESPACE {
            return Err(DiamondError::NamespaceConflict(layout.name));
        }
        let selector = Selector::from_signature(&initializer_signature(&layout.name))?;
        Ok(Self {
            name: name.into(),
            layout,
            selector,
        })
    }

    pub fn selector(&self) -> Selector {
        self.selector
    }
}

impl Facet for NamespaceInitializer {
    fn name(&self) -> &str {
        &self.name
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![self.selector]
    }

    fn call(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        payload: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        if selector != self.selector {
            return Err(FacetError::Unsupported(selector));
        }
        let words = decode_words(payload)?;
        if words.len() != self.layout.fields.len() {
            return Err(FacetError::MalformedPayload(format!(
                "{} expects {} words, got {}",
                self.layout.name,
                self.layout.fields.len(),
                words.len()
            )));
        }
        let mut ns = ctx.storage_mut().namespace(&self.layout.name);
        for (i, word) in words.into_iter().enumerate() {
            ns.set(i as u64, word);
        }
        Ok(Vec::new())
    }
}
