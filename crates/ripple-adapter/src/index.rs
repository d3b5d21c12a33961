//! Secondary array index.
//!
//! Per array (keyed by its concrete path), a two-level map from param key to
//! value token to the last-seen element index. Built on first parameterised
//! lookup, per the configured strategy; kept current incrementally where a
//! mutation is local, invalidated wholesale where it is not.

use crate::IndexStrategy;
use ripple_path::Literal;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct ArrayIndex {
    /// param key → value token → last-seen index.
    buckets: HashMap<String, HashMap<String, usize>>,
    all_keys_built: bool,
    built_keys: HashSet<String>,
}

impl ArrayIndex {
    fn has_key(&self, key: &str) -> bool {
        self.all_keys_built || self.built_keys.contains(key)
    }
}

#[derive(Debug)]
pub(crate) struct IndexStore {
    arrays: HashMap<String, ArrayIndex>,
    strategy: IndexStrategy,
    enabled: bool,
}

impl IndexStore {
    pub fn new(enabled: bool, strategy: IndexStrategy) -> Self {
        Self { arrays: HashMap::new(), strategy, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn clear(&mut self) {
        self.arrays.clear();
    }

    /// Look up the element whose `key` field equals `value`, building the
    /// bucket on demand. Returns `None` both when the store is disabled and
    /// when no element matches; the caller distinguishes via [`enabled`].
    pub fn lookup(
        &mut self,
        array_path: &str,
        arr: &[Value],
        key: &str,
        value: &Literal,
    ) -> Option<usize> {
        if !self.enabled {
            return None;
        }
        let entry = self.arrays.entry(array_path.to_string()).or_default();
        if !entry.has_key(key) {
            match self.strategy {
                IndexStrategy::EagerAllKeys => {
                    for (i, element) in arr.iter().enumerate() {
                        let Value::Object(map) = element else { continue };
                        for (field, field_value) in map {
                            if let Some(lit) = Literal::from_value(field_value) {
                                entry
                                    .buckets
                                    .entry(field.clone())
                                    .or_default()
                                    .insert(lit.token(), i);
                            }
                        }
                    }
                    entry.all_keys_built = true;
                }
                IndexStrategy::LazyKey => {
                    let bucket = entry.buckets.entry(key.to_string()).or_default();
                    for (i, element) in arr.iter().enumerate() {
                        if let Some(field_value) = element.get(key) {
                            if let Some(lit) = Literal::from_value(field_value) {
                                bucket.insert(lit.token(), i);
                            }
                        }
                    }
                    entry.built_keys.insert(key.to_string());
                }
            }
        }
        entry.buckets.get(key).and_then(|bucket| bucket.get(&value.token())).copied()
    }

    /// Record `(key, value) → index` after a param-addressed assignment.
    /// Only buckets that exist are touched.
    pub fn upsert(&mut self, array_path: &str, key: &str, value: &Literal, index: usize) {
        let Some(entry) = self.arrays.get_mut(array_path) else { return };
        if entry.has_key(key) {
            entry.buckets.entry(key.to_string()).or_default().insert(value.token(), index);
        }
    }

    /// Insert a freshly pushed element into every built bucket.
    pub fn insert_element(&mut self, array_path: &str, element: &Value, index: usize) {
        let Some(entry) = self.arrays.get_mut(array_path) else { return };
        let Value::Object(map) = element else { return };
        for (field, field_value) in map {
            if !entry.has_key(field) {
                continue;
            }
            if let Some(lit) = Literal::from_value(field_value) {
                entry.buckets.entry(field.clone()).or_default().insert(lit.token(), index);
            }
        }
    }

    /// Drop the entry for one `(key, value)` pair (unset-style deletion).
    pub fn unset_value(&mut self, array_path: &str, key: &str, value: &Literal) {
        if let Some(entry) = self.arrays.get_mut(array_path) {
            if let Some(bucket) = entry.buckets.get_mut(key) {
                bucket.remove(&value.token());
            }
        }
    }

    /// Wholesale invalidation of the array at `path` and every array nested
    /// below it (splice and positional replacement move or replace whole
    /// subtrees).
    pub fn invalidate(&mut self, path: &str) {
        if path.is_empty() {
            self.arrays.clear();
            return;
        }
        self.arrays.retain(|key, _| {
            !(key == path
                || key.strip_prefix(path).is_some_and(|rest| {
                    rest.starts_with('.') || rest.starts_with('[')
                }))
        });
    }

    #[cfg(test)]
    pub fn tracked_arrays(&self) -> usize {
        self.arrays.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "a"}),
            json!({"id": 2, "name": "b"}),
            json!({"id": 2, "name": "c"}),
        ]
    }

    #[test]
    fn eager_build_indexes_all_simple_fields() {
        let mut store = IndexStore::new(true, IndexStrategy::EagerAllKeys);
        let arr = rows();
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(1)), Some(0));
        // Built as a side effect of the first lookup.
        assert_eq!(store.lookup("rows", &arr, "name", &Literal::Str("b".into())), Some(1));
    }

    #[test]
    fn last_seen_wins_on_duplicates() {
        let mut store = IndexStore::new(true, IndexStrategy::EagerAllKeys);
        let arr = rows();
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(2)), Some(2));
    }

    #[test]
    fn lazy_build_indexes_only_the_queried_key() {
        let mut store = IndexStore::new(true, IndexStrategy::LazyKey);
        let arr = rows();
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(1)), Some(0));
        let entry = store.arrays.get("rows").unwrap();
        assert!(entry.built_keys.contains("id"));
        assert!(!entry.buckets.contains_key("name"));
    }

    #[test]
    fn disabled_store_returns_none() {
        let mut store = IndexStore::new(false, IndexStrategy::EagerAllKeys);
        let arr = rows();
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(1)), None);
        assert_eq!(store.tracked_arrays(), 0);
    }

    #[test]
    fn invalidate_covers_nested_arrays() {
        let mut store = IndexStore::new(true, IndexStrategy::EagerAllKeys);
        let arr = rows();
        store.lookup("rows", &arr, "id", &Literal::Int(1));
        store.lookup("rows[0].items", &arr, "id", &Literal::Int(1));
        store.lookup("rowset", &arr, "id", &Literal::Int(1));
        store.invalidate("rows");
        assert_eq!(store.tracked_arrays(), 1);
    }

    #[test]
    fn upsert_and_unset_touch_built_buckets_only() {
        let mut store = IndexStore::new(true, IndexStrategy::LazyKey);
        let arr = rows();
        store.lookup("rows", &arr, "id", &Literal::Int(1));
        store.upsert("rows", "id", &Literal::Int(9), 3);
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(9)), Some(3));
        // "name" bucket was never built; upsert must not create it.
        store.upsert("rows", "name", &Literal::Str("z".into()), 0);
        assert!(!store.arrays.get("rows").unwrap().buckets.contains_key("name"));
        store.unset_value("rows", "id", &Literal::Int(9));
        assert_eq!(store.lookup("rows", &arr, "id", &Literal::Int(9)), None);
    }
}
