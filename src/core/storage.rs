//! Word-addressed storage owned by the entry point.
//!
//! Facets never own storage. Every call receives a mutable handle to the
//! entry point's `Storage` and addresses its own state through a
//! namespace base slot.

use crate::core::abi::{Word, ZERO_WORD};
use crate::core::slot::{Slot, namespace_slot};
use std::collections::BTreeMap;

/// Unset slots read as zero; writing zero clears the slot so that two
/// storages with the same observable contents compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Storage {
    words: BTreeMap<Slot, Word>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, slot: &Slot) -> Word {
        self.words.get(slot).copied().unwrap_or(ZERO_WORD)
    }

    pub fn write(&mut self, slot: Slot, word: Word) {
        if word == ZERO_WORD {
            self.words.remove(&slot);
        } else {
            self.words.insert(slot, word);
        }
    }

    pub fn namespace(&mut self, name: &str) -> Namespace<'_> {
        Namespace {
            base: namespace_slot(name),
            storage: self,
        }
    }

    pub fn read_field(&self, namespace: &str, index: u64) -> Word {
        self.read(&namespace_slot(namespace).wrapping_add_u64(index))
    }

    /// Non-zero slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Slot, &Word)> {
        self.words.iter()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Mutable view of one namespace: field `i` lives at `base + i`.
pub struct Namespace<'a> {
    base: Slot,
    storage: &'a mut Storage,
}

impl Namespace<'_> {
    pub fn base(&self) -> Slot {
        self.base
    }

    pub fn get(&self, index: u64) -> Word {
        self.storage.read(&self.base.wrapping_add_u64(index))
    }

    pub fn set(&mut self, index: u64, word: Word) {
        self.storage.write(self.base.wrapping_add_u64(index), word);
    }
}
