use diamond::core::abi::{encode_words, word_from_address, word_from_u128};
use diamond::core::cut::FacetCut;
use diamond::core::diamond::{Diamond, OWNERSHIP_NAMESPACE};
use diamond::core::error::{DiamondError, FacetError};
use diamond::core::facet::{Facet, ModuleHost};
use diamond::core::init::SafeInit;
use diamond::core::selector::{Address, Selector};
use diamond::core::slot::{NamespaceLayout, NamespaceRegistry, namespace_slot};
use diamond::plugins::ModuleSpec;
use diamond::plugins::namespace::{NamespaceFacet, NamespaceInitializer, initializer_signature};
use std::sync::Arc;

fn sel(sig: &str) -> Selector {
    Selector::from_signature(sig).expect("valid signature")
}

fn token_layout() -> NamespaceLayout {
    NamespaceLayout::new("Token", &["supply", "decimals"])
}

fn setup() -> (Diamond, Address, Address, Address) {
    let owner = Address::from_label("owner");
    let mut diamond = Diamond::new(Address::from_label("diamond"), owner, ModuleHost::new());
    let facet = Address::from_label("TokenFacet");
    let init = Address::from_label("TokenInit");
    diamond
        .deploy_module(
            facet,
            Arc::new(NamespaceFacet::new("TokenFacet", token_layout()).unwrap()),
        )
        .unwrap();
    diamond
        .deploy_module(
            init,
            Arc::new(NamespaceInitializer::new("TokenInit", token_layout()).unwrap()),
        )
        .unwrap();
    diamond
        .diamond_cut(
            owner,
            &[FacetCut::add(facet, vec![sel("supply()"), sel("decimals()")])],
            None,
        )
        .unwrap();
    (diamond, owner, facet, init)
}

#[test]
fn test_getters_read_zero_before_init() {
    let (mut diamond, _, _, _) = setup();
    let out = diamond
        .dispatch(Address::from_label("anyone"), sel("supply()"), &[])
        .unwrap();
    assert_eq!(out, vec![0u8; 32]);
}

#[test]
fn test_initializer_populates_fields_read_by_getters() {
    let (mut diamond, owner, _, init) = setup();
    diamond
        .safe_init(
            owner,
            &SafeInit {
                target: init,
                selector: sel(&initializer_signature("Token")),
                payload: encode_words(&[word_from_u128(21_000_000), word_from_u128(8)]),
            },
        )
        .unwrap();

    let supply = diamond
        .dispatch(Address::from_label("anyone"), sel("supply()"), &[])
        .unwrap();
    let decimals = diamond
        .dispatch(Address::from_label("anyone"), sel("decimals()"), &[])
        .unwrap();
    assert_eq!(supply, word_from_u128(21_000_000).to_vec());
    assert_eq!(decimals, word_from_u128(8).to_vec());

    // Fields live at base + index of the namespace slot.
    let base = namespace_slot("Token");
    assert_eq!(diamond.storage().read(&base), word_from_u128(21_000_000));
    assert_eq!(
        diamond.storage().read(&base.wrapping_add_u64(1)),
        word_from_u128(8)
    );
}

#[test]
fn test_malformed_init_payload_rolls_back() {
    let (mut diamond, owner, _, init) = setup();
    let registry_before = diamond.registry().clone();
    let storage_before = diamond.storage().clone();

    let err = diamond
        .safe_init(
            owner,
            &SafeInit {
                target: init,
                selector: sel(&initializer_signature("Token")),
                payload: vec![0u8; 40],
            },
        )
        .unwrap_err();
    match err {
        DiamondError::InitPayloadFailed { module, source } => {
            assert_eq!(module, init);
            assert!(matches!(source, FacetError::MalformedPayload(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(diamond.registry(), &registry_before);
    assert_eq!(diamond.storage(), &storage_before);
    assert!(diamond.consumed_inits().is_empty());
}

#[test]
fn test_initializer_is_unreachable_by_dispatch_after_init() {
    let (mut diamond, owner, _, init) = setup();
    let selector = sel(&initializer_signature("Token"));
    diamond
        .safe_init(
            owner,
            &SafeInit {
                target: init,
                selector,
                payload: encode_words(&[word_from_u128(1), word_from_u128(2)]),
            },
        )
        .unwrap();

    let payload = encode_words(&[word_from_u128(999), word_from_u128(999)]);
    let err = diamond
        .dispatch(Address::from_label("attacker"), selector, &payload)
        .unwrap_err();
    assert!(matches!(err, DiamondError::FunctionNotFound(s) if s == selector));
    assert_eq!(diamond.storage().read_field("Token", 0), word_from_u128(1));
}

#[test]
fn test_module_specs_round_trip_through_json() {
    let spec = ModuleSpec::Initializer {
        name: "TokenInit".to_string(),
        layout: token_layout(),
    };
    let json = serde_json::to_string(&spec).unwrap();
    assert!(json.contains("\"kind\":\"initializer\""));
    let back: ModuleSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);

    let facet = back.instantiate().unwrap();
    assert_eq!(facet.name(), "TokenInit");
    assert_eq!(facet.selectors(), vec![sel("initializeToken(bytes)")]);
}

#[test]
fn test_registry_rejects_colliding_layouts() {
    let mut registry = NamespaceRegistry::new();
    let base = registry.register(token_layout()).unwrap();
    assert_eq!(base, namespace_slot("Token"));

    let err = registry
        .register(NamespaceLayout::new("Token", &["other"]))
        .unwrap_err();
    assert!(matches!(err, DiamondError::NamespaceConflict(name) if name == "Token"));

    assert_eq!(
        registry.field_slot("Token", "decimals").unwrap(),
        namespace_slot("Token").wrapping_add_u64(1)
    );
    assert!(matches!(
        registry.field_slot("Vault", "cap"),
        Err(DiamondError::UnknownNamespace(_))
    ));
}

#[test]
fn test_initializer_cannot_target_ownership_namespace() {
    let spec = ModuleSpec::Initializer {
        name: "OwnerInit".to_string(),
        layout: NamespaceLayout::new(OWNERSHIP_NAMESPACE, &["owner"]),
    };
    let err = spec.instantiate().err().expect("reserved namespace");
    assert!(matches!(err, DiamondError::NamespaceConflict(name) if name == OWNERSHIP_NAMESPACE));

    // The entry point's owner word is untouched by any namespace initializer.
    let (diamond, owner, _, _) = setup();
    assert_eq!(
        diamond.storage().read_field(OWNERSHIP_NAMESPACE, 0),
        word_from_address(&owner)
    );
}
