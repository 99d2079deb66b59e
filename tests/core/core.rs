use diamond::core::abi::{decode_words, encode_words, word_from_u128, word_to_address};
use diamond::core::broker::DiamondBroker;
use diamond::core::config::{self, CutPlanFile};
use diamond::core::cut::FacetCut;
use diamond::core::db;
use diamond::core::deploy;
use diamond::core::error::DiamondError;
use diamond::core::init::{InitState, SafeInit};
use diamond::core::schemas;
use diamond::core::selector::{Address, Selector};
use diamond::core::slot::{NamespaceLayout, namespace_slot};
use diamond::core::store::Store;
use diamond::plugins::ModuleSpec;
use diamond::plugins::namespace::initializer_signature;
use tempfile::tempdir;

const MANIFEST: &str = r#"
    [diamond]
    label = "lending-pool"
    owner_label = "deployer"

    [[namespace]]
    name = "Account"
    fields = ["holder", "balance"]

    [[facet]]
    name = "DiamondLoupeFacet"
    kind = "loupe"

    [[facet]]
    name = "OwnershipFacet"
    kind = "ownership"

    [[facet]]
    name = "AccountFacet"
    kind = "namespace"
    namespace = "Account"

    [[init]]
    name = "AccountInit"
    namespace = "Account"
    values = { holder = "0x00000000000000000000000000000000000000aa", balance = "1000" }
"#;

fn sel(sig: &str) -> Selector {
    Selector::from_signature(sig).expect("valid signature")
}

fn deployed_broker() -> (tempfile::TempDir, DiamondBroker, deploy::DeploymentReport) {
    let tmp = tempdir().expect("tempdir");
    let broker = DiamondBroker::new(Store::new(tmp.path().join(".diamond")));
    let manifest = config::parse_deploy_config(MANIFEST).expect("manifest");
    let report = deploy::deploy(&broker, &manifest, "deployer").expect("deploy");
    (tmp, broker, report)
}

#[test]
fn schema_initializes_with_foreign_keys() {
    let tmp = tempdir().expect("tempdir");
    let conn = db::db_connect(&tmp.path().join(schemas::DIAMOND_DB_NAME)).expect("connect");
    db::initialize_diamond_db(&conn).expect("schema");
    db::initialize_diamond_db(&conn).expect("schema is idempotent");

    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);

    for table in [
        "diamond_meta",
        "modules",
        "routes",
        "storage_words",
        "consumed_inits",
    ] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .expect("sqlite_master");
        assert_eq!(count, 1, "missing table {}", table);
    }
    assert!(db::load_diamond(&conn).expect("load").is_none());
}

#[test]
fn deploy_from_manifest_routes_and_initializes() {
    let (_tmp, broker, report) = deployed_broker();

    assert_eq!(report.entry_point, Address::from_label("lending-pool"));
    assert_eq!(report.owner, Address::from_label("deployer"));
    assert_eq!(report.modules.len(), 3);
    // 4 loupe + owner() + holder() + balance()
    assert_eq!(report.registered.len(), 7);
    assert_eq!(report.inits.len(), 1);
    assert_eq!(report.inits[0].state, InitState::Consumed);
    assert_eq!(report.inits[0].base_slot, namespace_slot("Account"));

    let init_selector = sel(&initializer_signature("Account"));
    let holder = broker
        .with_diamond("reader", "diamond.call", |session| {
            assert_eq!(session.diamond.lookup(&init_selector), None);
            assert_eq!(
                session.diamond.registry().fingerprint(),
                report.registry_fingerprint
            );
            let balance =
                session
                    .diamond
                    .dispatch(Address::from_label("reader"), sel("balance()"), &[])?;
            assert_eq!(balance, word_from_u128(1000).to_vec());
            session
                .diamond
                .dispatch(Address::from_label("reader"), sel("holder()"), &[])
        })
        .expect("call");
    assert_eq!(holder[31], 0xaa);
}

#[test]
fn second_deploy_into_same_store_is_rejected() {
    let (_tmp, broker, report) = deployed_broker();
    let manifest = config::parse_deploy_config(MANIFEST).expect("manifest");
    let err = deploy::deploy(&broker, &manifest, "deployer").unwrap_err();
    assert!(matches!(err, DiamondError::ValidationError(_)));

    let fingerprint = broker
        .with_diamond("reader", "diamond.loupe", |session| {
            Ok(session.diamond.registry().fingerprint())
        })
        .expect("load");
    assert_eq!(fingerprint, report.registry_fingerprint);
}

#[test]
fn failed_operation_leaves_store_unchanged_and_is_audited() {
    let (_tmp, broker, report) = deployed_broker();
    let owner = Address::from_label("deployer");

    let err = broker
        .with_diamond(&owner.to_string(), "diamond.cut", |session| {
            session
                .diamond
                .diamond_cut(owner, &[FacetCut::remove(vec![sel("missing()")])], None)
        })
        .unwrap_err();
    assert!(matches!(err, DiamondError::SelectorNotFound(_)));

    // A closure that mutates and then fails must not be persisted either.
    let err = broker
        .with_diamond(&owner.to_string(), "diamond.cut", |session| {
            session
                .diamond
                .diamond_cut(owner, &[FacetCut::remove(vec![sel("holder()")])], None)?;
            Err::<(), _>(DiamondError::ValidationError("abort".to_string()))
        })
        .unwrap_err();
    assert!(matches!(err, DiamondError::ValidationError(_)));

    broker
        .with_diamond("reader", "diamond.loupe", |session| {
            assert_eq!(
                session.diamond.registry().fingerprint(),
                report.registry_fingerprint
            );
            assert!(session.diamond.lookup(&sel("holder()")).is_some());
            Ok(())
        })
        .expect("load");

    let events = broker.recent_events(3).expect("events");
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].op, "diamond.create");
    assert_eq!(events[0].status, "success");
    assert_eq!(
        events[0].registry_fingerprint.as_deref(),
        Some(report.registry_fingerprint.as_str())
    );
    assert_eq!(events[1].status, "error");
    assert_eq!(events[2].status, "error");
    assert!(events[2].registry_fingerprint.is_none());
    let detail = events[2].detail["error"].as_str().expect("error detail");
    assert!(detail.contains("abort"));
}

#[test]
fn cut_plan_swaps_facet_and_survives_reload() {
    let (tmp, broker, _) = deployed_broker();
    let owner = Address::from_label("deployer");

    let v2 = Address::from_label("AccountFacetV2");
    let plan_path = tmp.path().join("upgrade.json");
    let plan_json = format!(
        r#"{{
            "modules": [
                {{ "kind": "namespace", "name": "AccountFacetV2",
                   "layout": {{ "name": "Account", "fields": ["holder", "balance"] }} }}
            ],
            "cuts": [
                {{ "target": "{}", "action": "remove", "selectors": ["holder()"] }},
                {{ "target": "{}", "action": "replace", "selectors": ["balance()"] }}
            ]
        }}"#,
        Address::ZERO,
        v2
    );
    std::fs::write(&plan_path, plan_json).expect("write plan");
    let plan: CutPlanFile = config::load_cut_plan(&plan_path).expect("plan");
    assert_eq!(plan.modules[0].address(), v2);

    let registered = broker
        .with_diamond(&owner.to_string(), "diamond.cut", |session| {
            for spec in plan.modules.clone() {
                session.ensure_deployed(spec)?;
            }
            session
                .diamond
                .diamond_cut(owner, &plan.cuts, plan.init.as_ref())
        })
        .expect("cut");
    assert_eq!(registered, vec![sel("balance()")]);

    // A fresh broker on the same directory sees the committed state.
    let reopened = DiamondBroker::new(Store::new(&broker.store().root));
    reopened
        .with_diamond("reader", "diamond.loupe", |session| {
            assert_eq!(session.diamond.lookup(&sel("balance()")), Some(v2));
            assert_eq!(session.diamond.lookup(&sel("holder()")), None);
            assert!(session.specs().iter().any(|s| s.name() == "AccountFacetV2"));
            // Storage is the entry point's, so the new code reads the old value.
            let out = session
                .diamond
                .dispatch(Address::from_label("reader"), sel("balance()"), &[])?;
            assert_eq!(out, word_from_u128(1000).to_vec());
            Ok(())
        })
        .expect("reload");
}

#[test]
fn safe_init_through_broker_is_single_use() {
    let (_tmp, broker, _) = deployed_broker();
    let owner = Address::from_label("deployer");
    let spec = ModuleSpec::Initializer {
        name: "VaultInit".to_string(),
        layout: NamespaceLayout::new("Vault", &["cap"]),
    };
    let target = spec.address();
    let request = SafeInit {
        target,
        selector: sel(&initializer_signature("Vault")),
        payload: encode_words(&[word_from_u128(42)]),
    };

    let receipt = broker
        .with_diamond(&owner.to_string(), "diamond.safe_init", |session| {
            session.ensure_deployed(spec.clone())?;
            session.diamond.safe_init(owner, &request)
        })
        .expect("safe init");
    assert_eq!(receipt.state, InitState::Consumed);

    let err = broker
        .with_diamond(&owner.to_string(), "diamond.safe_init", |session| {
            session.diamond.safe_init(owner, &request)
        })
        .unwrap_err();
    assert!(matches!(err, DiamondError::InitAlreadyConsumed { module, .. } if module == target));

    broker
        .with_diamond("reader", "diamond.loupe", |session| {
            assert_eq!(
                session.diamond.storage().read_field("Vault", 0),
                word_from_u128(42)
            );
            assert_eq!(session.diamond.lookup(&request.selector), None);
            Ok(())
        })
        .expect("load");
}

#[test]
fn non_owner_is_rejected_through_broker() {
    let (_tmp, broker, _) = deployed_broker();
    let intruder = Address::from_label("intruder");
    let err = broker
        .with_diamond(&intruder.to_string(), "diamond.cut", |session| {
            session
                .diamond
                .diamond_cut(intruder, &[FacetCut::remove(vec![sel("holder()")])], None)
        })
        .unwrap_err();
    assert!(matches!(err, DiamondError::NotOwner { caller } if caller == intruder));
}

#[test]
fn ownership_facet_reports_owner() {
    let (_tmp, broker, report) = deployed_broker();
    let out = broker
        .with_diamond("reader", "diamond.call", |session| {
            session
                .diamond
                .dispatch(Address::from_label("reader"), sel("owner()"), &[])
        })
        .expect("call");
    let words = decode_words(&out).expect("words");
    assert_eq!(word_to_address(&words[0]), report.owner);
}

#[test]
fn missing_store_reports_not_found() {
    let tmp = tempdir().expect("tempdir");
    let broker = DiamondBroker::new(Store::new(tmp.path()));
    let err = broker
        .with_diamond("reader", "diamond.loupe", |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, DiamondError::NotFound(_)));
}

#[test]
fn duplicate_namespace_fails_deploy_before_anything_is_created() {
    let tmp = tempdir().expect("tempdir");
    let broker = DiamondBroker::new(Store::new(tmp.path()));
    let manifest = config::parse_deploy_config(
        r#"
        [diamond]
        label = "x"
        owner_label = "deployer"

        [[namespace]]
        name = "Account"
        fields = ["a"]

        [[namespace]]
        name = "Account"
        fields = ["b"]
    "#,
    )
    .expect("manifest");
    let err = deploy::deploy(&broker, &manifest, "deployer").unwrap_err();
    assert!(matches!(err, DiamondError::NamespaceConflict(_)));
    assert!(!broker.store().db_path().exists());
}

#[test]
fn manifest_cannot_initialize_the_ownership_namespace() {
    let tmp = tempdir().expect("tempdir");
    let broker = DiamondBroker::new(Store::new(tmp.path()));
    let manifest = config::parse_deploy_config(
        r#"
        [diamond]
        label = "x"
        owner_label = "deployer"

        [[namespace]]
        name = "diamond.ownership"
        fields = ["owner"]

        [[facet]]
        name = "OwnershipFacet"
        kind = "ownership"

        [[init]]
        name = "OwnerInit"
        namespace = "diamond.ownership"
        values = { owner = "0x00000000000000000000000000000000000000aa" }
    "#,
    )
    .expect("manifest");
    let err = deploy::deploy(&broker, &manifest, "deployer").unwrap_err();
    assert!(matches!(err, DiamondError::NamespaceConflict(name) if name == "diamond.ownership"));
    assert!(!broker.store().db_path().exists());
}

#[test]
fn inspect_reads_without_writing_or_auditing() {
    let (_tmp, broker, report) = deployed_broker();
    let events_before = broker.recent_events(100).expect("events").len();

    let (fingerprint, owner_route) = broker
        .inspect(|diamond| {
            Ok((
                diamond.registry().fingerprint(),
                diamond.lookup(&sel("owner()")),
            ))
        })
        .expect("inspect");
    assert_eq!(fingerprint, report.registry_fingerprint);
    assert_eq!(owner_route, Some(Address::from_label("OwnershipFacet")));

    let err = broker
        .inspect(|_| Err::<(), _>(DiamondError::ValidationError("stop".to_string())))
        .unwrap_err();
    assert!(matches!(err, DiamondError::ValidationError(_)));

    assert_eq!(broker.recent_events(100).expect("events").len(), events_before);
}

#[test]
fn inspect_on_missing_store_does_not_create_it() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path().join("absent");
    let broker = DiamondBroker::new(Store::new(&root));
    let err = broker.inspect(|_| Ok(())).unwrap_err();
    assert!(matches!(err, DiamondError::NotFound(_)));
    assert!(!root.exists());
}

#[test]
fn committed_operation_survives_unwritable_audit_log() {
    let (_tmp, broker, _) = deployed_broker();
    let owner = Address::from_label("deployer");
    let events = broker.store().events_path();
    std::fs::remove_file(&events).expect("remove events");
    std::fs::create_dir(&events).expect("block events path");

    broker
        .with_diamond(&owner.to_string(), "diamond.cut", |session| {
            session
                .diamond
                .diamond_cut(owner, &[FacetCut::remove(vec![sel("holder()")])], None)
        })
        .expect("cut commits despite the audit write failing");

    // Failures keep their own error rather than the audit one.
    let err = broker
        .with_diamond(&owner.to_string(), "diamond.cut", |session| {
            session
                .diamond
                .diamond_cut(owner, &[FacetCut::remove(vec![sel("missing()")])], None)
        })
        .unwrap_err();
    assert!(matches!(err, DiamondError::SelectorNotFound(_)));

    let reopened = DiamondBroker::new(Store::new(&broker.store().root));
    let route = reopened
        .inspect(|diamond| Ok(diamond.lookup(&sel("holder()"))))
        .expect("reload");
    assert_eq!(route, None);
}
