//! Deploy manifest (`diamond.toml`) and cut plan (`*.json`) loading.

use crate::core::abi::{Word, ZERO_WORD, encode_words, parse_word};
use crate::core::cut::{FacetCut, InitCall};
use crate::core::error::DiamondError;
use crate::core::selector::Address;
use crate::core::slot::{NamespaceLayout, NamespaceRegistry};
use crate::plugins::ModuleSpec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub diamond: DiamondSection,
    #[serde(default, rename = "namespace")]
    pub namespaces: Vec<NamespaceLayout>,
    #[serde(default, rename = "facet")]
    pub facets: Vec<FacetSection>,
    #[serde(default, rename = "init")]
    pub inits: Vec<InitSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiamondSection {
    /// Entry-point address is derived from this label.
    pub label: String,
    pub owner: Option<Address>,
    pub owner_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetKind {
    Loupe,
    Ownership,
    Namespace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacetSection {
    pub name: String,
    pub kind: FacetKind,
    pub namespace: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InitSection {
    pub name: String,
    pub namespace: String,
    /// Field name -> value (decimal or `0x` hex). Unlisted fields start at zero.
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

pub fn load_deploy_config(path: &Path) -> Result<DeployConfig, DiamondError> {
    let content = fs::read_to_string(path)?;
    parse_deploy_config(&content)
}

pub fn parse_deploy_config(content: &str) -> Result<DeployConfig, DiamondError> {
    toml::from_str(content).map_err(|e| DiamondError::ConfigError(e.to_string()))
}

impl DeployConfig {
    pub fn entry_point(&self) -> Address {
        Address::from_label(&self.diamond.label)
    }

    pub fn owner(&self) -> Result<Address, DiamondError> {
        match (&self.diamond.owner, &self.diamond.owner_label) {
            (Some(owner), None) => Ok(*owner),
            (None, Some(label)) => Ok(Address::from_label(label)),
            _ => Err(DiamondError::ConfigError(
                "[diamond] needs exactly one of `owner` or `owner_label`".to_string(),
            )),
        }
    }

    /// Registers every declared layout, rejecting clashes and overlaps.
    pub fn namespace_registry(&self) -> Result<NamespaceRegistry, DiamondError> {
        let mut registry = NamespaceRegistry::new();
        for layout in &self.namespaces {
            registry.register(layout.clone())?;
        }
        Ok(registry)
    }

    pub fn facet_specs(&self, namespaces: &NamespaceRegistry) -> Result<Vec<ModuleSpec>, DiamondError> {
        self.facets
            .iter()
            .map(|facet| {
                let name = facet.name.clone();
                match (facet.kind, &facet.namespace) {
                    (FacetKind::Loupe, None) => Ok(ModuleSpec::Loupe { name }),
                    (FacetKind::Ownership, None) => Ok(ModuleSpec::Ownership { name }),
                    (FacetKind::Namespace, Some(ns)) => {
                        let layout = namespaces.get(ns)?.clone();
                        if layout.fields.is_empty() {
                            return Err(DiamondError::ConfigError(format!(
                                "facet {} exposes namespace {} which declares no fields",
                                facet.name, ns
                            )));
                        }
                        Ok(ModuleSpec::Namespace { name, layout })
                    }
                    (FacetKind::Namespace, None) => Err(DiamondError::ConfigError(format!(
                        "facet {} has kind 'namespace' but no namespace",
                        facet.name
                    ))),
                    (_, Some(_)) => Err(DiamondError::ConfigError(format!(
                        "facet {} does not take a namespace",
                        facet.name
                    ))),
                }
            })
            .collect()
    }

    /// Resolved layout and encoded payload for every `[[init]]` entry.
    pub fn init_plans(&self, namespaces: &NamespaceRegistry) -> Result<Vec<InitPlan>, DiamondError> {
        self.inits
            .iter()
            .map(|init| {
                let layout = namespaces.get(&init.namespace)?.clone();
                let payload = encode_init_payload(&layout, &init.values)?;
                Ok(InitPlan {
                    name: init.name.clone(),
                    layout,
                    payload,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPlan {
    pub name: String,
    pub layout: NamespaceLayout,
    pub payload: Vec<u8>,
}

impl InitPlan {
    pub fn spec(&self) -> ModuleSpec {
        ModuleSpec::Initializer {
            name: self.name.clone(),
            layout: self.layout.clone(),
        }
    }
}

/// One word per layout field, in layout order.
pub fn encode_init_payload(
    layout: &NamespaceLayout,
    values: &BTreeMap<String, String>,
) -> Result<Vec<u8>, DiamondError> {
    if let Some(unknown) = values.keys().find(|k| layout.field_index(k).is_none()) {
        return Err(DiamondError::ConfigError(format!(
            "namespace {} has no field '{}'",
            layout.name, unknown
        )));
    }
    let words = layout
        .fields
        .iter()
        .map(|field| match values.get(field) {
            Some(raw) => parse_word(raw),
            None => Ok(ZERO_WORD),
        })
        .collect::<Result<Vec<Word>, _>>()?;
    Ok(encode_words(&words))
}

/// JSON cut request accepted by `diamond cut`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CutPlanFile {
    /// Built-in modules to deploy before the cut is validated.
    #[serde(default)]
    pub modules: Vec<ModuleSpec>,
    pub cuts: Vec<FacetCut>,
    #[serde(default)]
    pub init: Option<InitCall>,
}

pub fn load_cut_plan(path: &Path) -> Result<CutPlanFile, DiamondError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
