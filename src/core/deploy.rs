//! Deploy orchestration: manifest in, persisted diamond and report out.
//!
//! A deploy creates the entry point, deploys every declared facet, routes
//! all of their selectors in one cut and then runs each `[[init]]` entry
//! through the safe init guard. All of it is one broker operation, so a
//! failing init leaves no diamond behind.

use crate::core::broker::DiamondBroker;
use crate::core::config::DeployConfig;
use crate::core::cut::FacetCut;
use crate::core::error::DiamondError;
use crate::core::init::{InitState, SafeInit};
use crate::core::selector::{Address, Selector};
use crate::core::slot::{Slot, namespace_slot};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedModule {
    pub name: String,
    pub kind: String,
    pub address: Address,
    pub selectors: Vec<Selector>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedInit {
    pub name: String,
    pub namespace: String,
    pub module: Address,
    pub selector: Selector,
    pub base_slot: Slot,
    pub state: InitState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReport {
    pub entry_point: Address,
    pub owner: Address,
    pub modules: Vec<DeployedModule>,
    pub registered: Vec<Selector>,
    pub inits: Vec<CompletedInit>,
    pub registry_fingerprint: String,
}

pub fn deploy(
    broker: &DiamondBroker,
    config: &DeployConfig,
    actor: &str,
) -> Result<DeploymentReport, DiamondError> {
    let owner = config.owner()?;
    let entry_point = config.entry_point();
    let namespaces = config.namespace_registry()?;
    let facet_specs = config.facet_specs(&namespaces)?;
    let init_plans = config.init_plans(&namespaces)?;

    broker.create(entry_point, owner, actor, |session| {
        let mut modules = Vec::new();
        let mut cuts = Vec::new();
        for spec in facet_specs {
            let name = spec.name().to_string();
            let kind = spec.kind().to_string();
            let address = session.deploy(spec)?;
            let selectors = session
                .diamond
                .host()
                .get(&address)
                .map(|facet| facet.selectors())
                .unwrap_or_default();
            cuts.push(FacetCut::add(address, selectors.clone()));
            modules.push(DeployedModule {
                name,
                kind,
                address,
                selectors,
            });
        }

        let registered = if cuts.is_empty() {
            Vec::new()
        } else {
            session.diamond.diamond_cut(owner, &cuts, None)?
        };

        let mut inits = Vec::new();
        for plan in init_plans {
            let target = session.deploy(plan.spec())?;
            let selector = session
                .diamond
                .host()
                .get(&target)
                .and_then(|facet| facet.selectors().first().copied())
                .ok_or(DiamondError::ModuleCodeMissing(target))?;
            let receipt = session.diamond.safe_init(
                owner,
                &SafeInit {
                    target,
                    selector,
                    payload: plan.payload,
                },
            )?;
            inits.push(CompletedInit {
                name: plan.name,
                base_slot: namespace_slot(&plan.layout.name),
                namespace: plan.layout.name,
                module: target,
                selector,
                state: receipt.state,
            });
        }

        Ok(DeploymentReport {
            entry_point,
            owner,
            modules,
            registered,
            inits,
            registry_fingerprint: session.diamond.registry().fingerprint(),
        })
    })
}

pub fn write_report(path: &Path, report: &DeploymentReport) -> Result<(), DiamondError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
