use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Serialize, Serializer};

use crate::value::Value;

/// An insertion-ordered string-keyed map that auto-renames colliding keys.
///
/// The k-th insertion of a colliding key `K` (k >= 1) is stored under `K_k`,
/// so repeated element names in the source XML never clobber each other.
#[derive(Debug, Default, Clone)]
pub struct KeyValueCollection {
    map: IndexMap<String, Value>,
    collisions: HashMap<String, u32>,
}

impl Serialize for KeyValueCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.map.serialize(serializer)
    }
}

impl KeyValueCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value` under `key`, renaming to `key_N` on collision.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if !self.map.contains_key(&key) {
            self.map.insert(key, value);
            return;
        }
        let count = self.collisions.entry(key.clone()).or_insert(0);
        *count += 1;
        let renamed = format!("{}_{}", key, count);
        self.map.insert(renamed, value);
    }

    /// Merge `other` into `self`, re-inserting each pair through `insert` so the
    /// collision-renaming invariant holds across the merge too.
    pub fn extend(&mut self, other: KeyValueCollection) {
        for (k, v) in other.map {
            self.insert(k, v);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.map.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.map.iter()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl IntoIterator for KeyValueCollection {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}
