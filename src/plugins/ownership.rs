use crate::core::diamond::OWNERSHIP_NAMESPACE;
use crate::core::error::FacetError;
use crate::core::facet::{CallContext, Facet};
use crate::core::selector::Selector;
use std::sync::LazyLock;

pub const OWNER: &str = "owner()";

static OWNER_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::from_signature(OWNER).unwrap());

/// Exposes the entry point's owner as `owner()`.
pub struct OwnershipFacet {
    name: String,
}

impl OwnershipFacet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

impl Facet for OwnershipFacet {
    fn name(&self) -> &str {
        &self.name
    }

    fn selectors(&self) -> Vec<Selector> {
        vec![*OWNER_SELECTOR]
    }

    fn call(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        _payload: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        if selector != *OWNER_SELECTOR {
            return Err(FacetError::Unsupported(selector));
        }
        Ok(ctx.storage().read_field(OWNERSHIP_NAMESPACE, 0).to_vec())
    }
}
