use diamond::core::abi::{
    decode_words, encode_words, word_from_address, word_from_selector, word_to_address,
    word_to_selector, word_to_u128,
};
use diamond::core::cut::FacetCut;
use diamond::core::diamond::Diamond;
use diamond::core::error::{DiamondError, FacetError};
use diamond::core::facet::{Facet, ModuleHost};
use diamond::core::selector::{Address, Selector};
use diamond::core::slot::NamespaceLayout;
use diamond::plugins::ModuleSpec;
use diamond::plugins::loupe::{FACET_ADDRESS, FACET_ADDRESSES, FACET_FUNCTION_SELECTORS, FACETS};
use diamond::plugins::ownership::OwnershipFacet;

fn sel(sig: &str) -> Selector {
    Selector::from_signature(sig).expect("valid signature")
}

struct Setup {
    diamond: Diamond,
    loupe: Address,
    account: Address,
    ownership: Address,
}

fn setup() -> Setup {
    let owner = Address::from_label("owner");
    let mut diamond = Diamond::new(Address::from_label("diamond"), owner, ModuleHost::new());

    let loupe_spec = ModuleSpec::Loupe {
        name: "DiamondLoupeFacet".to_string(),
    };
    let account_spec = ModuleSpec::Namespace {
        name: "AccountFacet".to_string(),
        layout: NamespaceLayout::new("Account", &["holder", "balance"]),
    };
    let loupe = loupe_spec.address();
    let account = account_spec.address();
    let ownership = Address::from_label("OwnershipFacet");

    let loupe_facet = loupe_spec.instantiate().unwrap();
    let loupe_selectors = loupe_facet.selectors();
    diamond.deploy_module(loupe, loupe_facet).unwrap();
    diamond
        .deploy_module(account, account_spec.instantiate().unwrap())
        .unwrap();
    let ownership_facet = OwnershipFacet::new("OwnershipFacet");
    let ownership_selectors = ownership_facet.selectors();
    diamond
        .deploy_module(ownership, std::sync::Arc::new(ownership_facet))
        .unwrap();

    diamond
        .diamond_cut(
            owner,
            &[
                FacetCut::add(loupe, loupe_selectors),
                FacetCut::add(account, vec![sel("holder()"), sel("balance()")]),
                FacetCut::add(ownership, ownership_selectors),
            ],
            None,
        )
        .unwrap();

    Setup {
        diamond,
        loupe,
        account,
        ownership,
    }
}

fn call(diamond: &mut Diamond, signature: &str, payload: &[u8]) -> Vec<[u8; 32]> {
    let out = diamond
        .dispatch(Address::from_label("anyone"), sel(signature), payload)
        .expect("dispatch");
    decode_words(&out).expect("words")
}

#[test]
fn test_facets_lists_modules_in_first_registration_order() {
    let Setup {
        mut diamond,
        loupe,
        account,
        ownership,
    } = setup();

    let words = call(&mut diamond, FACETS, &[]);
    assert_eq!(word_to_u128(&words[0]), Some(3));

    assert_eq!(word_to_address(&words[1]), loupe);
    assert_eq!(word_to_u128(&words[2]), Some(4));
    assert_eq!(word_to_selector(&words[3]), sel(FACETS));

    let account_at = 3 + 4;
    assert_eq!(word_to_address(&words[account_at]), account);
    assert_eq!(word_to_u128(&words[account_at + 1]), Some(2));
    assert_eq!(word_to_selector(&words[account_at + 2]), sel("holder()"));
    assert_eq!(word_to_selector(&words[account_at + 3]), sel("balance()"));

    let ownership_at = account_at + 4;
    assert_eq!(word_to_address(&words[ownership_at]), ownership);
    assert_eq!(word_to_selector(&words[ownership_at + 2]), sel("owner()"));
    assert_eq!(words.len(), ownership_at + 3);
}

#[test]
fn test_facet_addresses_and_selectors_follow_cuts() {
    let Setup {
        mut diamond,
        loupe,
        account,
        ownership,
    } = setup();
    let owner = Address::from_label("owner");

    diamond
        .diamond_cut(owner, &[FacetCut::remove(vec![sel("owner()")])], None)
        .unwrap();

    let words = call(&mut diamond, FACET_ADDRESSES, &[]);
    assert_eq!(word_to_u128(&words[0]), Some(2));
    let addresses: Vec<Address> = words[1..].iter().map(word_to_address).collect();
    assert_eq!(addresses, vec![loupe, account]);
    assert!(!addresses.contains(&ownership));

    let words = call(
        &mut diamond,
        FACET_FUNCTION_SELECTORS,
        &encode_words(&[word_from_address(&account)]),
    );
    assert_eq!(word_to_u128(&words[0]), Some(2));
    assert_eq!(word_to_selector(&words[1]), sel("holder()"));
    assert_eq!(word_to_selector(&words[2]), sel("balance()"));

    // Unknown module: empty list rather than an error.
    let words = call(
        &mut diamond,
        FACET_FUNCTION_SELECTORS,
        &encode_words(&[word_from_address(&ownership)]),
    );
    assert_eq!(words.len(), 1);
    assert_eq!(word_to_u128(&words[0]), Some(0));
}

#[test]
fn test_facet_address_resolves_or_returns_zero() {
    let Setup {
        mut diamond,
        account,
        ..
    } = setup();

    let words = call(
        &mut diamond,
        FACET_ADDRESS,
        &encode_words(&[word_from_selector(&sel("balance()"))]),
    );
    assert_eq!(word_to_address(&words[0]), account);

    let words = call(
        &mut diamond,
        FACET_ADDRESS,
        &encode_words(&[word_from_selector(&sel("nope()"))]),
    );
    assert!(word_to_address(&words[0]).is_zero());
}

#[test]
fn test_malformed_loupe_payload_surfaces_as_facet_error() {
    let Setup {
        mut diamond, loupe, ..
    } = setup();
    let err = diamond
        .dispatch(Address::from_label("anyone"), sel(FACET_ADDRESS), &[1, 2, 3])
        .unwrap_err();
    match err {
        DiamondError::Facet { module, source } => {
            assert_eq!(module, loupe);
            assert!(matches!(source, FacetError::MalformedPayload(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_owner_is_readable_through_dispatch() {
    let Setup { mut diamond, .. } = setup();
    let words = call(&mut diamond, "owner()", &[]);
    assert_eq!(word_to_address(&words[0]), Address::from_label("owner"));
}
