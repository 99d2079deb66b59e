//! Built-in facets and the factory that instantiates them.
//!
//! Facet code cannot be persisted, so the store records a `ModuleSpec` for
//! every deployed module and rebuilds the module host from those specs on
//! load.

pub mod loupe;
pub mod namespace;
pub mod ownership;

use crate::core::error::DiamondError;
use crate::core::facet::Facet;
use crate::core::selector::Address;
use crate::core::slot::NamespaceLayout;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModuleSpec {
    Loupe {
        name: String,
    },
    Ownership {
        name: String,
    },
    Namespace {
        name: String,
        layout: NamespaceLayout,
    },
    Initializer {
        name: String,
        layout: NamespaceLayout,
    },
}

impl ModuleSpec {
    pub fn name(&self) -> &str {
        match self {
            Self::Loupe { name }
            | Self::Ownership { name }
            | Self::Namespace { name, .. }
            | Self::Initializer { name, .. } => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Loupe { .. } => "loupe",
            Self::Ownership { .. } => "ownership",
            Self::Namespace { .. } => "namespace",
            Self::Initializer { .. } => "initializer",
        }
    }

    /// Deployment address, derived from the module name.
    pub fn address(&self) -> Address {
        Address::from_label(self.name())
    }

    pub fn instantiate(&self) -> Result<Arc<dyn Facet>, DiamondError> {
        let facet: Arc<dyn Facet> = match self {
            Self::Loupe { name } => Arc::new(loupe::LoupeFacet::new(name.clone())),
            Self::Ownership { name } => Arc::new(ownership::OwnershipFacet::new(name.clone())),
            Self::Namespace { name, layout } => Arc::new(namespace::NamespaceFacet::new(
                name.clone(),
                layout.clone(),
            )?),
            Self::Initializer { name, layout } => Arc::new(
                namespace::NamespaceInitializer::new(name.clone(), layout.clone())?,
            ),
        };
        Ok(facet)
    }
}
