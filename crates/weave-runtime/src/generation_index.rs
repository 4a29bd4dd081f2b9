#![forbid(unsafe_code)]

//! Generation index: the last flush version that applied each class name.
//!
//! A class observer stamps every name it adds with the current version. On
//! the next flush, names still carrying the previous version were not
//! re-asserted and are removed from the element.
//!
//! # Invariants
//!
//! 1. `generation(name) <= current version` for every recorded name.
//! 2. Recording a name overwrites its previous generation.
//! 3. Names are never forgotten unless [`GenerationIndex::forget`] is called.

use std::collections::HashMap;

/// Map from class name to the version of the flush that last applied it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationIndex {
    generations: HashMap<String, u64>,
}

impl GenerationIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `name` with `version`.
    pub fn record(&mut self, name: &str, version: u64) {
        match self.generations.get_mut(name) {
            Some(generation) => *generation = version,
            None => {
                self.generations.insert(name.to_owned(), version);
            }
        }
    }

    /// Generation of `name`, if it was ever recorded.
    #[must_use]
    pub fn generation(&self, name: &str) -> Option<u64> {
        self.generations.get(name).copied()
    }

    /// Names stamped exactly with `version`, sorted for deterministic
    /// application order.
    #[must_use]
    pub fn names_at(&self, version: u64) -> Vec<String> {
        let mut names: Vec<String> = self
            .generations
            .iter()
            .filter(|(_, generation)| **generation == version)
            .map(|(name, _)| name.clone())
            .collect();
        names.sort_unstable();
        names
    }

    /// Drop `name` from the index.
    pub fn forget(&mut self, name: &str) -> bool {
        self.generations.remove(name).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.generations.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generations.is_empty()
    }
}
