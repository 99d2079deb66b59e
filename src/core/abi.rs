//! Minimal 32-byte word codec for payloads and return data.
//!
//! Values are big-endian and left-padded, addresses occupy the low 20
//! bytes, selectors the high 4 bytes. Nothing here is self-describing; the
//! module being called owns the meaning of each word.

use crate::core::error::{DiamondError, FacetError};
use crate::core::selector::{Address, Selector};

pub type Word = [u8; 32];

pub const ZERO_WORD: Word = [0u8; 32];

pub fn word_from_u128(value: u128) -> Word {
    let mut out = ZERO_WORD;
    out[16..].copy_from_slice(&value.to_be_bytes());
    out
}

pub fn word_to_u128(word: &Word) -> Option<u128> {
    if word[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Some(u128::from_be_bytes(low))
}

pub fn word_from_address(address: &Address) -> Word {
    let mut out = ZERO_WORD;
    out[12..].copy_from_slice(address.as_bytes());
    out
}

pub fn word_to_address(word: &Word) -> Address {
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    Address(out)
}

pub fn word_from_selector(selector: &Selector) -> Word {
    let mut out = ZERO_WORD;
    out[..4].copy_from_slice(selector.as_bytes());
    out
}

pub fn word_to_selector(word: &Word) -> Selector {
    Selector([word[0], word[1], word[2], word[3]])
}

pub fn encode_words(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.iter().copied()).collect()
}

pub fn decode_words(bytes: &[u8]) -> Result<Vec<Word>, FacetError> {
    if bytes.len() % 32 != 0 {
        return Err(FacetError::MalformedPayload(format!(
            "length {} is not a multiple of 32",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut w = ZERO_WORD;
            w.copy_from_slice(chunk);
            w
        })
        .collect())
}

/// Parses a word from text: `0x`-prefixed hex (left-padded, at most 32 bytes)
/// or an unsigned decimal that fits in 128 bits.
pub fn parse_word(input: &str) -> Result<Word, DiamondError> {
    let trimmed = input.trim();
    if let Some(digits) = trimmed.strip_prefix("0x") {
        let padded = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let bytes = hex::decode(&padded)
            .map_err(|e| DiamondError::InvalidIdentifier(format!("word '{}': {}", input, e)))?;
        if bytes.len() > 32 {
            return Err(DiamondError::InvalidIdentifier(format!(
                "word '{}' is wider than 32 bytes",
                input
            )));
        }
        let mut out = ZERO_WORD;
        out[32 - bytes.len()..].copy_from_slice(&bytes);
        return Ok(out);
    }
    trimmed
        .parse::<u128>()
        .map(word_from_u128)
        .map_err(|e| DiamondError::InvalidIdentifier(format!("word '{}': {}", input, e)))
}

pub fn parse_hex_bytes(input: &str) -> Result<Vec<u8>, DiamondError> {
    let digits = input.trim().strip_prefix("0x").unwrap_or(input.trim());
    hex::decode(digits).map_err(|e| DiamondError::InvalidIdentifier(format!("bytes: {}", e)))
}

/// Serde adapter rendering opaque payloads as `0x`-prefixed hex strings.
pub mod hex_payload {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_hex_bytes(&raw).map_err(serde::de::Error::custom)
    }
}
