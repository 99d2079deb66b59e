//! Loupe facet: introspection of the registry through the dispatch path.
//!
//! Return data is a flat word list. Arrays are length-prefixed:
//! - `facets()`: `n, (address, m, selector * m) * n`
//! - `facetAddresses()`: `n, address * n`
//! - `facetFunctionSelectors(address)`: `m, selector * m`
//! - `facetAddress(bytes4)`: `address` (zero when unrouted)

use crate::core::abi::{
    Word, decode_words, encode_words, word_from_address, word_from_selector, word_from_u128,
    word_to_address, word_to_selector,
};
use crate::core::error::FacetError;
use crate::core::facet::{CallContext, Facet};
use crate::core::selector::Selector;
use std::sync::LazyLock;

pub const FACETS: &str = "facets()";
pub const FACET_ADDRESSES: &str = "facetAddresses()";
pub const FACET_FUNCTION_SELECTORS: &str = "facetFunctionSelectors(address)";
pub const FACET_ADDRESS: &str = "facetAddress(bytes4)";

pub struct LoupeFacet {
    name: String,
}

impl LoupeFacet {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into() }
    }
}

static SELECTORS: LazyLock<[Selector; 4]> = LazyLock::new(|| {
    [FACETS, FACET_ADDRESSES, FACET_FUNCTION_SELECTORS, FACET_ADDRESS]
        .map(|sig| Selector::from_signature(sig).unwrap())
});

fn single_word(payload: &[u8]) -> Result<Word, FacetError> {
    let words = decode_words(payload)?;
    match words.as_slice() {
        [word] => Ok(*word),
        _ => Err(FacetError::MalformedPayload(format!(
            "expected 1 word, got {}",
            words.len()
        ))),
    }
}

impl Facet for LoupeFacet {
    fn name(&self) -> &str {
        &self.name
    }

    fn selectors(&self) -> Vec<Selector> {
        SELECTORS.to_vec()
    }

    fn call(
        &self,
        ctx: &mut CallContext<'_>,
        selector: Selector,
        payload: &[u8],
    ) -> Result<Vec<u8>, FacetError> {
        let registry = ctx.registry();
        let [facets, facet_addresses, facet_function_selectors, facet_address] = *SELECTORS;
        let mut out: Vec<Word> = Vec::new();

        if selector == facets {
            out.push(word_from_u128(registry.facets().len() as u128));
            for facet in registry.facets() {
                out.push(word_from_address(&facet.address));
                out.push(word_from_u128(facet.selectors.len() as u128));
                out.extend(facet.selectors.iter().map(word_from_selector));
            }
        } else if selector == facet_addresses {
            let addresses = registry.facet_addresses();
            out.push(word_from_u128(addresses.len() as u128));
            out.extend(addresses.iter().map(word_from_address));
        } else if selector == facet_function_selectors {
            let module = word_to_address(&single_word(payload)?);
            let selectors = registry.facet_selectors(&module);
            out.push(word_from_u128(selectors.len() as u128));
            out.extend(selectors.iter().map(word_from_selector));
        } else if selector == facet_address {
            let queried = word_to_selector(&single_word(payload)?);
            let module = registry.lookup(&queried).unwrap_or_default();
            out.push(word_from_address(&module));
        } else {
            return Err(FacetError::Unsupported(selector));
        }

        Ok(encode_words(&out))
    }
}
