//! Named surface/region sets.
//!
//! `ClassSets` maps a human-readable name to the `(dimension, id)` pairs that
//! make up a geometric surface or region. A pair belongs to at most one name:
//! registering it under a new name moves it there, so the last registration
//! wins. Callers register in a fixed order, which keeps the result
//! deterministic.

use crate::topology::ids::ClassId;
use std::collections::{BTreeMap, HashMap};

/// A classification: the dimension of the model entity and its numeric id.
#[derive(
    Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize,
)]
pub struct ClassPair {
    pub dim: u8,
    pub id: ClassId,
}

impl ClassPair {
    pub fn new(dim: usize, id: ClassId) -> Self {
        Self { dim: dim as u8, id }
    }
}

/// Name → classification pairs, with unique ownership of each pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassSets {
    sets: BTreeMap<String, Vec<ClassPair>>,
    owner: HashMap<ClassPair, String>,
}

impl ClassSets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `pair` under `name`.
    ///
    /// Returns the name that previously owned the pair, if it was different.
    /// A name left without pairs is dropped.
    pub fn register(&mut self, name: &str, pair: ClassPair) -> Option<String> {
        let previous = match self.owner.get(&pair) {
            Some(owner) if owner == name => return None,
            Some(owner) => Some(owner.clone()),
            None => None,
        };
        if let Some(old) = &previous {
            if let Some(pairs) = self.sets.get_mut(old) {
                pairs.retain(|p| *p != pair);
                if pairs.is_empty() {
                    self.sets.remove(old);
                }
            }
            log::warn!(
                "classification ({}, {}) moved from \"{old}\" to \"{name}\"",
                pair.dim,
                pair.id
            );
        }
        self.sets.entry(name.to_string()).or_default().push(pair);
        self.owner.insert(pair, name.to_string());
        previous
    }

    /// Pairs recorded under `name` (empty when unknown).
    pub fn get(&self, name: &str) -> &[ClassPair] {
        self.sets.get(name).map_or(&[], Vec::as_slice)
    }

    /// Returns true when `name` has been registered.
    pub fn contains_name(&self, name: &str) -> bool {
        self.sets.contains_key(name)
    }

    /// Name owning `pair`, if any.
    pub fn name_of(&self, pair: ClassPair) -> Option<&str> {
        self.owner.get(&pair).map(String::as_str)
    }

    /// Iterate `(name, pairs)` in lexicographic name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[ClassPair])> + '_ {
        self.sets
            .iter()
            .map(|(name, pairs)| (name.as_str(), pairs.as_slice()))
    }

    /// Names that own at least one pair of dimension `dim`.
    pub fn names_at_dim(&self, dim: usize) -> Vec<&str> {
        self.iter()
            .filter(|(_, pairs)| pairs.iter().any(|p| usize::from(p.dim) == dim))
            .map(|(name, _)| name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}
