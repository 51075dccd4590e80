//! Primary key -> position index.

use crate::value::Key;
use std::collections::HashMap;

/// Maps each member's primary key to its position in the collection.
#[derive(Debug, Default)]
pub(crate) struct KeyIndex {
    positions: HashMap<Key, usize>,
}

impl KeyIndex {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get(&self, key: &Key) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub(crate) fn contains(&self, key: &Key) -> bool {
        self.positions.contains_key(key)
    }

    pub(crate) fn len(&self) -> usize {
        self.positions.len()
    }

    pub(crate) fn insert(&mut self, key: Key, position: usize) {
        self.positions.insert(key, position);
    }

    /// Replace the index with `entries`, given in position order.
    ///
    /// If two entries share a key the first position is kept; the
    /// duplicates are returned.
    pub(crate) fn rebuild(&mut self, entries: impl IntoIterator<Item = Key>) -> Vec<Key> {
        self.positions.clear();

        let mut duplicates = Vec::new();
        for (position, key) in entries.into_iter().enumerate() {
            if self.positions.contains_key(&key) {
                duplicates.push(key);
            } else {
                self.positions.insert(key, position);
            }
        }
        duplicates
    }
}
