//! Diamond: one entry point, many facets.
//!
//! **A single long-lived entry point routes every call by selector to an
//! independently deployed facet.** Routes are changed only through atomic
//! cuts authorized by a single owner, and a facet's storage is bootstrapped
//! exactly once through a route that disappears as soon as it has run.
//!
//! # Core Principles
//!
//! - **Atomic cuts**: a batch is validated in full before anything changes;
//!   it commits completely or not at all
//! - **Single-use init**: add -> invoke -> remove in one unit; the init
//!   selector is never reachable again
//! - **Caller-owned storage**: facets read and write the entry point's
//!   storage through an injected handle, each under its own namespace slot
//! - **Explicit layouts**: namespaces are registered with their fields, and
//!   overlapping slot ranges are rejected up front
//!
//! # Architecture
//!
//! ## Registry Engine
//!
//! - `selector`: Keccak-derived selectors and addresses
//! - `registry`: selector -> module map with loupe ordering
//! - `cut`: validation and staged application of cut batches
//! - `init`: the safe init guard and its `Unregistered -> Registered -> Consumed` record
//! - `access`: single-owner gate
//! - `slot` / `storage`: namespace slots and word storage
//! - `diamond`: the entry point tying them together
//!
//! ## Host Layer
//!
//! All persisted mutations route through `DiamondBroker`, which serializes
//! access, commits each operation in one SQLite transaction and appends
//! it to `diamond.events.jsonl`. Loupe queries take the broker's read path
//! and leave both the database and the log untouched.
//!
//! # Examples
//!
//! ```bash
//! # Deploy from a manifest
//! diamond deploy --config diamond.toml --out deployment.json
//!
//! # Swap a facet
//! diamond cut --caller deployer --plan upgrade.json
//!
//! # Inspect routes
//! diamond loupe facets
//! ```

mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command, LoupeCommand, OutputFormat};
use crate::core::abi::{decode_words, parse_hex_bytes};
use crate::core::broker::DiamondBroker;
use crate::core::config;
use crate::core::deploy;
use crate::core::error::DiamondError;
use crate::core::init::SafeInit;
use crate::core::selector::{Address, Selector};
use crate::core::slot::{NamespaceLayout, namespace_slot};
use crate::core::store::Store;
use crate::core::time::response_envelope;
use crate::plugins::ModuleSpec;
use clap::Parser;
use colored::Colorize;
use serde_json::json;

/// Parses a principal: a `0x` address, or any other string hashed into one
/// with `Address::from_label`.
pub fn parse_principal(input: &str) -> Result<Address, DiamondError> {
    if input.starts_with("0x") {
        input.parse()
    } else {
        Ok(Address::from_label(input))
    }
}

fn emit(format: OutputFormat, cmd: &str, extra: serde_json::Value, text: &[String]) {
    match format {
        OutputFormat::Json => {
            println!("{}", response_envelope(cmd, Ok(extra)));
        }
        OutputFormat::Text => {
            for line in text {
                println!("{}", line);
            }
        }
    }
}

fn hex_words(bytes: &[u8]) -> Vec<String> {
    match decode_words(bytes) {
        Ok(words) => words
            .iter()
            .map(|w| format!("0x{}", hex::encode(w)))
            .collect(),
        Err(_) => vec![format!("0x{}", hex::encode(bytes))],
    }
}

pub fn run() -> Result<(), DiamondError> {
    let cli = Cli::parse();
    let format = cli.format;
    let cmd = cli.command.name();
    let result = execute(cli);
    if let (Err(err), OutputFormat::Json) = (&result, format) {
        println!("{}", response_envelope(cmd, Err(err)));
    }
    result
}

fn execute(cli: Cli) -> Result<(), DiamondError> {
    let format = cli.format;
    let broker = DiamondBroker::new(Store::new(&cli.root));

    match cli.command {
        Command::Deploy {
            config: config_path,
            out,
            actor,
        } => {
            let manifest = config::load_deploy_config(&config_path)?;
            let report = deploy::deploy(&broker, &manifest, &actor)?;
            if let Some(out) = &out {
                deploy::write_report(out, &report)?;
            }
            let mut text = vec![format!(
                "{} diamond {} (owner {})",
                "deployed".green().bold(),
                report.entry_point,
                report.owner
            )];
            for module in &report.modules {
                text.push(format!(
                    "  {} {} [{}] {} selectors",
                    module.name.cyan(),
                    module.address,
                    module.kind,
                    module.selectors.len()
                ));
            }
            for init in &report.inits {
                text.push(format!(
                    "  init {} -> {} at {} ({:?})",
                    init.name.cyan(),
                    init.namespace,
                    init.base_slot,
                    init.state
                ));
            }
            emit(format, "deploy", json!({ "report": report }), &text);
        }
        Command::Cut { caller, plan } => {
            let caller = parse_principal(&caller)?;
            let plan = config::load_cut_plan(&plan)?;
            let registered = broker.with_diamond(&caller.to_string(), "diamond.cut", |session| {
                for spec in plan.modules {
                    session.ensure_deployed(spec)?;
                }
                session
                    .diamond
                    .diamond_cut(caller, &plan.cuts, plan.init.as_ref())
            })?;
            let text = vec![format!(
                "{} {} selectors registered",
                "cut applied:".green().bold(),
                registered.len()
            )];
            emit(format, "cut", json!({ "registered": registered }), &text);
        }
        Command::SafeInit {
            caller,
            spec,
            target,
            selector,
            payload,
        } => {
            let caller = parse_principal(&caller)?;
            let spec: Option<ModuleSpec> = match spec {
                Some(path) => Some(serde_json::from_str(&std::fs::read_to_string(path)?)?),
                None => None,
            };
            let target = match (target, &spec) {
                (Some(t), _) => parse_principal(&t)?,
                (None, Some(spec)) => spec.address(),
                (None, None) => {
                    return Err(DiamondError::ValidationError(
                        "safe-init needs --target or --spec".to_string(),
                    ));
                }
            };
            let selector = selector.map(|s| Selector::parse(&s)).transpose()?;
            let payload = parse_hex_bytes(&payload)?;

            let receipt = broker.with_diamond(&caller.to_string(), "diamond.safe_init", |session| {
                if let Some(spec) = spec {
                    session.ensure_deployed(spec)?;
                }
                let selector = match selector {
                    Some(s) => s,
                    None => {
                        let facet = session
                            .diamond
                            .host()
                            .get(&target)
                            .ok_or(DiamondError::ModuleCodeMissing(target))?;
                        match facet.selectors().as_slice() {
                            [only] => *only,
                            _ => {
                                return Err(DiamondError::ValidationError(format!(
                                    "{} has more than one selector; pass --selector",
                                    facet.name()
                                )));
                            }
                        }
                    }
                };
                session.diamond.safe_init(
                    caller,
                    &SafeInit {
                        target,
                        selector,
                        payload,
                    },
                )
            })?;
            let text = vec![format!(
                "{} {} on {} ({:?})",
                "init consumed:".green().bold(),
                receipt.selector,
                receipt.target,
                receipt.state
            )];
            emit(
                format,
                "safe-init",
                json!({
                    "target": receipt.target,
                    "selector": receipt.selector,
                    "state": receipt.state,
                    "output": hex_words(&receipt.output),
                }),
                &text,
            );
        }
        Command::Call {
            caller,
            selector,
            payload,
        } => {
            let caller = parse_principal(&caller)?;
            let selector = Selector::parse(&selector)?;
            let payload = parse_hex_bytes(&payload)?;
            let output = broker.with_diamond(&caller.to_string(), "diamond.call", |session| {
                session.diamond.dispatch(caller, selector, &payload)
            })?;
            let words = hex_words(&output);
            emit(format, "call", json!({ "selector": selector, "output": words }), &words);
        }
        Command::Loupe(loupe) => {
            let (extra, text) = broker.inspect(|diamond| {
                let registry = diamond.registry();
                Ok(match loupe.command {
                    LoupeCommand::Facets => {
                        let facets = registry.facets().to_vec();
                        let text: Vec<String> = facets
                            .iter()
                            .map(|f| {
                                let sels: Vec<String> =
                                    f.selectors.iter().map(|s| s.to_string()).collect();
                                format!("{} {}", f.address, sels.join(" "))
                            })
                            .collect();
                        (json!({ "facets": facets }), text)
                    }
                    LoupeCommand::Selectors { facet } => {
                        let facet = parse_principal(&facet)?;
                        let selectors = registry.facet_selectors(&facet);
                        let text: Vec<String> = selectors.iter().map(|s| s.to_string()).collect();
                        (json!({ "facet": facet, "selectors": selectors }), text)
                    }
                    LoupeCommand::Lookup { selector } => {
                        let selector = Selector::parse(&selector)?;
                        let module = registry.lookup(&selector);
                        let text = vec![match module {
                            Some(m) => m.to_string(),
                            None => "not found".to_string(),
                        }];
                        (json!({ "selector": selector, "module": module }), text)
                    }
                })
            })?;
            emit(format, "loupe", extra, &text);
        }
        Command::Slot { name, fields } => {
            let base = namespace_slot(&name);
            if fields.is_empty() {
                emit(
                    format,
                    "slot",
                    json!({ "namespace": name, "base_slot": base }),
                    &[base.to_string()],
                );
            } else {
                let field_refs: Vec<&str> = fields.iter().map(String::as_str).collect();
                let layout = NamespaceLayout::new(name.clone(), &field_refs);
                let mut slots = serde_json::Map::new();
                let mut text = Vec::new();
                for field in &fields {
                    if let Some(slot) = layout.field_slot(field) {
                        slots.insert(field.clone(), json!(slot));
                        text.push(format!("{} {}", field, slot));
                    }
                }
                emit(
                    format,
                    "slot",
                    json!({ "namespace": name, "base_slot": base, "fields": slots }),
                    &text,
                );
            }
        }
        Command::Selector { signatures } => {
            let mut selectors = serde_json::Map::new();
            let mut text = Vec::new();
            for signature in &signatures {
                let selector = Selector::from_signature(signature)?;
                selectors.insert(signature.clone(), json!(selector));
                text.push(format!("{} {}", selector, signature));
            }
            emit(format, "selector", json!({ "selectors": selectors }), &text);
        }
        Command::Audit { last } => {
            let events = broker.recent_events(last)?;
            let text = events
                .iter()
                .map(|ev| {
                    let status = if ev.status == "success" {
                        ev.status.green()
                    } else {
                        ev.status.red()
                    };
                    format!("{} {} {} {}", ev.ts, status, ev.op, ev.actor)
                })
                .collect::<Vec<_>>();
            emit(format, "audit", json!({ "events": events }), &text);
        }
    }
    Ok(())
}
