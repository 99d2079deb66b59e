//! Storage slot allocation.
//!
//! A facet's private state lives in the entry point's storage under a base
//! slot derived from a human-readable namespace name:
//! `keccak256(name) - 1`. Fields occupy consecutive slots from the base in
//! declaration order.
//!
//! `NamespaceRegistry` makes the layout explicit: every namespace is
//! registered with its field list up front, and a name clash or an
//! overlapping slot range is rejected at registration rather than
//! discovered as corrupted storage later.

use crate::core::diamond::OWNERSHIP_NAMESPACE;
use crate::core::error::DiamondError;
use crate::core::selector::keccak256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 256-bit big-endian storage key.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Slot(pub [u8; 32]);

impl Slot {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn from_u64(value: u64) -> Self {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&value.to_be_bytes());
        Self(out)
    }

    pub fn wrapping_add_u64(&self, value: u64) -> Self {
        self.wrapping_add(&Slot::from_u64(value))
    }

    pub fn wrapping_add(&self, other: &Slot) -> Self {
        let mut out = [0u8; 32];
        let mut carry = 0u16;
        for i in (0..32).rev() {
            let sum = self.0[i] as u16 + other.0[i] as u16 + carry;
            out[i] = sum as u8;
            carry = sum >> 8;
        }
        Self(out)
    }

    pub fn wrapping_sub(&self, other: &Slot) -> Self {
        let mut out = [0u8; 32];
        let mut borrow = 0i16;
        for i in (0..32).rev() {
            let mut diff = self.0[i] as i16 - other.0[i] as i16 - borrow;
            if diff < 0 {
                diff += 256;
                borrow = 1;
            } else {
                borrow = 0;
            }
            out[i] = diff as u8;
        }
        Self(out)
    }

    /// Returns the value as `u64` when it fits.
    fn as_small(&self) -> Option<u64> {
        if self.0[..24].iter().any(|b| *b != 0) {
            return None;
        }
        let mut low = [0u8; 8];
        low.copy_from_slice(&self.0[24..]);
        Some(u64::from_be_bytes(low))
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({})", self)
    }
}

impl FromStr for Slot {
    type Err = DiamondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut out = [0u8; 32];
        hex::decode_to_slice(digits, &mut out)
            .map_err(|e| DiamondError::InvalidIdentifier(format!("slot '{}': {}", s, e)))?;
        Ok(Self(out))
    }
}

impl Serialize for Slot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Slot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Base slot of the namespace `name`: `keccak256(utf8(name)) - 1`.
pub fn namespace_slot(name: &str) -> Slot {
    Slot(keccak256(name.as_bytes())).wrapping_sub(&Slot::from_u64(1))
}

/// A registered storage layout: a namespace and its ordered fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceLayout {
    pub name: String,
    pub fields: Vec<String>,
}

impl NamespaceLayout {
    pub fn new<S: Into<String>>(name: S, fields: &[&str]) -> Self {
        Self {
            name: name.into(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn base(&self) -> Slot {
        namespace_slot(&self.name)
    }

    /// Number of slots the layout reserves; an empty layout still claims its base.
    pub fn span(&self) -> u64 {
        self.fields.len().max(1) as u64
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    pub fn field_slot(&self, field: &str) -> Option<Slot> {
        self.field_index(field)
            .map(|i| self.base().wrapping_add_u64(i as u64))
    }

    fn overlaps(&self, other: &NamespaceLayout) -> bool {
        let (a, b) = (self.base(), other.base());
        let within = |from: &Slot, to: &Slot, span: u64| {
            to.wrapping_sub(from).as_small().is_some_and(|d| d < span)
        };
        within(&a, &b, self.span()) || within(&b, &a, other.span())
    }
}

/// Layouts the entry point writes itself. They are never registrable, so no
/// initializer can be pointed at them.
fn reserved_layouts() -> [NamespaceLayout; 1] {
    [NamespaceLayout::new(OWNERSHIP_NAMESPACE, &["owner"])]
}

/// Construction-time registry of storage layouts.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    layouts: BTreeMap<String, NamespaceLayout>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, layout: NamespaceLayout) -> Result<Slot, DiamondError> {
        if layout.name.is_empty() {
            return Err(DiamondError::ConfigError(
                "namespace name must not be empty".to_string(),
            ));
        }
        let reserved = reserved_layouts();
        if self.layouts.contains_key(&layout.name)
            || reserved.iter().any(|r| r.name == layout.name)
        {
            return Err(DiamondError::NamespaceConflict(layout.name));
        }
        for (i, field) in layout.fields.iter().enumerate() {
            if layout.fields[..i].contains(field) {
                return Err(DiamondError::ConfigError(format!(
                    "namespace {} declares field '{}' twice",
                    layout.name, field
                )));
            }
        }
        if let Some(other) = self
            .layouts
            .values()
            .chain(reserved.iter())
            .find(|l| l.overlaps(&layout))
        {
            return Err(DiamondError::NamespaceOverlap {
                name: layout.name,
                other: other.name.clone(),
            });
        }
        let base = layout.base();
        self.layouts.insert(layout.name.clone(), layout);
        Ok(base)
    }

    pub fn get(&self, name: &str) -> Result<&NamespaceLayout, DiamondError> {
        self.layouts
            .get(name)
            .ok_or_else(|| DiamondError::UnknownNamespace(name.to_string()))
    }

    pub fn field_slot(&self, namespace: &str, field: &str) -> Result<Slot, DiamondError> {
        let layout = self.get(namespace)?;
        layout.field_slot(field).ok_or_else(|| {
            DiamondError::ValidationError(format!(
                "namespace {} has no field '{}'",
                namespace, field
            ))
        })
    }

    pub fn layouts(&self) -> impl Iterator<Item = &NamespaceLayout> {
        self.layouts.values()
    }
}
