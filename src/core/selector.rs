//! Fixed-width identifiers: function selectors and module addresses.
//!
//! Both are derived from Keccak-256 so that the same signature or label
//! always produces the same identifier, in any process.

use crate::core::error::DiamondError;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest, Keccak256};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// `name(type,type,...)` with no whitespace; nested tuples are allowed.
static SIGNATURE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*\([A-Za-z0-9_\[\](),]*\)$").unwrap()
});

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(bytes);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], DiamondError> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    if digits.len() != N * 2 {
        return Err(DiamondError::InvalidIdentifier(format!(
            "expected {} hex digits, got '{}'",
            N * 2,
            input
        )));
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| DiamondError::InvalidIdentifier(format!("'{}': {}", input, e)))?;
    Ok(out)
}

/// First four bytes of the Keccak-256 hash of a function signature.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub fn from_signature(signature: &str) -> Result<Self, DiamondError> {
        if !SIGNATURE_PATTERN.is_match(signature) {
            return Err(DiamondError::InvalidSignature(signature.to_string()));
        }
        let hash = keccak256(signature.as_bytes());
        Ok(Self([hash[0], hash[1], hash[2], hash[3]]))
    }

    /// Accepts either a `0x`-prefixed 4-byte hex selector or a function signature.
    pub fn parse(input: &str) -> Result<Self, DiamondError> {
        if input.contains('(') {
            Self::from_signature(input)
        } else {
            input.parse()
        }
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({})", self)
    }
}

impl FromStr for Selector {
    type Err = DiamondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<4>(s).map(Self)
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Selector::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Handle to a deployed unit of logic (or to the entry point itself).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The null address; only valid as the target of a remove entry.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Deterministic address for a named deployment: the low 20 bytes of
    /// `keccak256(label)`.
    pub fn from_label(label: &str) -> Self {
        let hash = keccak256(label.as_bytes());
        let mut out = [0u8; 20];
        out.copy_from_slice(&hash[12..]);
        Self(out)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = DiamondError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<20>(s).map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
