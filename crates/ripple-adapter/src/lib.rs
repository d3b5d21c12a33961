//! Hierarchical in-memory document with path-addressed CRUD.
//!
//! The document is a `serde_json::Value` tree. Operations address it with
//! path expressions; intermediate containers are created on demand, and
//! parameterised array steps (`rows[id=7]`) resolve through a lazily built
//! secondary index:
//!
//! ```
//! use ripple_adapter::{AdapterOptions, DataAdapter, TreeAdapter};
//! use serde_json::json;
//!
//! let mut adapter = TreeAdapter::new(AdapterOptions::default());
//! adapter.set("rows[id=7].x", json!(1), None).unwrap();
//! assert_eq!(adapter.root(), &json!({"rows": [{"id": 7, "x": 1}]}));
//! assert_eq!(adapter.index_of("rows[id=7]", None), 0);
//! ```

mod adapter;
mod error;
mod index;

pub use adapter::{DataAdapter, TreeAdapter};
pub use error::AdapterError;

use serde::{Deserialize, Serialize};

/// Array deletion policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArrayDelete {
    /// Compact the sequence; positions shift.
    Splice,
    /// Leave a null hole; positions are stable.
    #[default]
    Unset,
}

/// Secondary-index build strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexStrategy {
    /// Build only the queried key's bucket, on demand.
    LazyKey,
    /// First access to an array indexes every simple-typed field of every
    /// element.
    #[default]
    EagerAllKeys,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AdapterOptions {
    pub array_delete: ArrayDelete,
    pub auto_create: bool,
    pub index_enabled: bool,
    pub index_strategy: IndexStrategy,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            array_delete: ArrayDelete::default(),
            auto_create: true,
            index_enabled: true,
            index_strategy: IndexStrategy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn adapter() -> TreeAdapter {
        TreeAdapter::new(AdapterOptions::default())
    }

    fn get(a: &mut TreeAdapter, path: &str) -> Option<Value> {
        a.get(path, None).unwrap()
    }

    #[test]
    fn set_then_get_roundtrips() {
        let mut a = adapter();
        a.set("a.b.c", json!(42), None).unwrap();
        assert_eq!(get(&mut a, "a.b.c"), Some(json!(42)));
        assert_eq!(get(&mut a, "a.b"), Some(json!({"c": 42})));
        a.set("a.b.c", json!("x"), None).unwrap();
        assert_eq!(get(&mut a, "a.b.c"), Some(json!("x")));
    }

    #[test]
    fn get_missing_is_absent_not_an_error() {
        let mut a = adapter();
        assert_eq!(get(&mut a, "no.such.path"), None);
        a.set("a", json!(1), None).unwrap();
        // Index into a non-sequence is absent.
        assert_eq!(get(&mut a, "a[0]"), None);
    }

    #[test]
    fn empty_path_reads_and_replaces_the_document() {
        let mut a = adapter();
        a.set("", json!({"whole": true}), None).unwrap();
        assert_eq!(get(&mut a, ""), Some(json!({"whole": true})));
    }

    #[test]
    fn auto_create_builds_intermediate_containers() {
        let mut a = adapter();
        a.set("a.list[1].x", json!(5), None).unwrap();
        assert_eq!(a.root(), &json!({"a": {"list": [null, {"x": 5}]}}));
    }

    #[test]
    fn param_set_on_empty_document_creates_the_element() {
        let mut a = adapter();
        a.set("rows[id=7].x", json!(1), None).unwrap();
        assert_eq!(a.root(), &json!({"rows": [{"id": 7, "x": 1}]}));
        assert_eq!(a.index_of("rows[id=7]", None), 0);
    }

    #[test]
    fn param_leaf_set_replaces_element_and_restores_key() {
        let mut a = adapter();
        a.set("rows[id=7]", json!({"x": 1, "stale": true}), None).unwrap();
        a.set("rows[id=7]", json!({"y": 2}), None).unwrap();
        assert_eq!(a.root(), &json!({"rows": [{"id": 7, "y": 2}]}));
    }

    #[test]
    fn param_leaf_value_must_be_a_mapping() {
        let mut a = adapter();
        assert_eq!(
            a.set("rows[id=7]", json!(5), None),
            Err(AdapterError::ParamValueNotMapping)
        );
    }

    #[test]
    fn param_on_non_sequence_is_a_hard_error() {
        let mut a = adapter();
        a.set("rows", json!({"not": "an array"}), None).unwrap();
        assert!(matches!(
            a.get("rows[id=7]", None),
            Err(AdapterError::ParamOnNonArray { .. })
        ));
        assert!(matches!(
            a.set("rows[id=7].x", json!(1), None),
            Err(AdapterError::ParamOnNonArray { .. })
        ));
    }

    #[test]
    fn wildcards_are_rejected_in_crud_paths() {
        let mut a = adapter();
        assert!(matches!(a.get("a.*", None), Err(AdapterError::WildcardInPath(_))));
        assert!(matches!(
            a.set("a[*]", json!(1), None),
            Err(AdapterError::WildcardInPath(_))
        ));
        assert!(matches!(a.delete("a.*.b", None), Err(AdapterError::WildcardInPath(_))));
    }

    #[test]
    fn auto_create_disabled_surfaces_missing_containers() {
        let mut a = TreeAdapter::new(AdapterOptions {
            auto_create: false,
            ..AdapterOptions::default()
        });
        assert!(matches!(
            a.set("a.b", json!(1), None),
            Err(AdapterError::MissingContainer(_))
        ));
        assert!(matches!(
            a.set("rows[id=7].x", json!(1), None),
            Err(AdapterError::MissingContainer(_))
        ));
    }

    #[test]
    fn param_not_found_without_auto_create() {
        let mut a = TreeAdapter::new(AdapterOptions {
            auto_create: false,
            ..AdapterOptions::default()
        });
        a.set("", json!({"rows": []}), None).unwrap();
        assert!(matches!(
            a.set("rows[id=7]", json!({"x": 1}), None),
            Err(AdapterError::ParamNotFound { .. })
        ));
    }

    #[test]
    fn positional_replacement_invalidates_the_index() {
        let mut a = adapter();
        a.set("", json!({"rows": [{"id": 1, "x": 1}, {"id": 9, "x": 2}]}), None).unwrap();
        // Prime the index.
        assert_eq!(get(&mut a, "rows[id=9].x"), Some(json!(2)));
        a.set("rows[1]", json!({"id": 2, "x": 999}), None).unwrap();
        assert_eq!(get(&mut a, "rows[id=2].x"), Some(json!(999)));
        assert_eq!(get(&mut a, "rows[id=9].x"), None);
    }

    #[test]
    fn splice_delete_compacts_the_array() {
        let mut a = TreeAdapter::new(AdapterOptions {
            array_delete: ArrayDelete::Splice,
            ..AdapterOptions::default()
        });
        a.set("", json!({"rows": [{"id": 1}, {"id": 2}, {"id": 3}]}), None).unwrap();
        a.delete("rows[id=2]", None).unwrap();
        assert_eq!(get(&mut a, "rows"), Some(json!([{"id": 1}, {"id": 3}])));
        // The index survives the splice through wholesale invalidation.
        assert_eq!(a.index_of("rows[id=3]", None), 1);
    }

    #[test]
    fn unset_delete_leaves_a_hole() {
        let mut a = adapter();
        a.set("", json!({"rows": [{"id": 1}, {"id": 2}, {"id": 3}]}), None).unwrap();
        a.delete("rows[id=2]", None).unwrap();
        assert_eq!(get(&mut a, "rows"), Some(json!([{"id": 1}, null, {"id": 3}])));
        assert_eq!(a.index_of("rows[id=2]", None), -1);
        assert_eq!(a.index_of("rows[id=3]", None), 2);
    }

    #[test]
    fn delete_by_index_honours_policy() {
        let mut a = adapter();
        a.set("", json!({"rows": [10, 20, 30]}), None).unwrap();
        a.delete("rows[1]", None).unwrap();
        assert_eq!(get(&mut a, "rows"), Some(json!([10, null, 30])));

        let mut a = TreeAdapter::new(AdapterOptions {
            array_delete: ArrayDelete::Splice,
            ..AdapterOptions::default()
        });
        a.set("", json!({"rows": [10, 20, 30]}), None).unwrap();
        a.delete("rows[1]", None).unwrap();
        assert_eq!(get(&mut a, "rows"), Some(json!([10, 30])));
    }

    #[test]
    fn delete_missing_is_a_noop() {
        let mut a = adapter();
        a.delete("no.such.thing", None).unwrap();
        a.set("a", json!({"b": 1}), None).unwrap();
        a.delete("a.zzz", None).unwrap();
        assert_eq!(get(&mut a, "a"), Some(json!({"b": 1})));
    }

    #[test]
    fn merge_is_shallow_and_falls_back_to_set() {
        let mut a = adapter();
        a.set("cfg", json!({"a": 1, "b": {"deep": true}}), None).unwrap();
        a.merge("cfg", json!({"b": {"other": 1}, "c": 3}), None).unwrap();
        assert_eq!(
            get(&mut a, "cfg"),
            Some(json!({"a": 1, "b": {"other": 1}, "c": 3}))
        );
        // Non-mapping current value: plain set.
        a.merge("cfg.a", json!({"now": "map"}), None).unwrap();
        assert_eq!(get(&mut a, "cfg.a"), Some(json!({"now": "map"})));
        // Non-mapping incoming value: plain set.
        a.merge("cfg", json!(7), None).unwrap();
        assert_eq!(get(&mut a, "cfg"), Some(json!(7)));
    }

    #[test]
    fn index_of_trivially_returns_trailing_index() {
        let mut a = adapter();
        a.set("", json!({"rows": [1, 2, 3]}), None).unwrap();
        assert_eq!(a.index_of("rows[2]", None), 2);
        assert_eq!(a.index_of("rows", None), -1);
        assert_eq!(a.index_of("missing[id=1]", None), -1);
        assert_eq!(a.index_of("rows[*]", None), -1);
    }

    #[test]
    fn vars_rebase_reads_and_writes() {
        let mut a = adapter();
        let vars: ripple_path::Vars = [
            ("store".to_string(), json!("FLT_ARR")),
            ("i".to_string(), json!(0)),
        ]
        .into();
        a.set("FLT_ARR.legs[0].id", json!("L1"), None).unwrap();
        assert_eq!(
            a.get("$store.legs[$i].id", Some(&vars)).unwrap(),
            Some(json!("L1"))
        );
        a.set("$store.legs[$i].id", json!("L2"), Some(&vars)).unwrap();
        assert_eq!(get(&mut a, "FLT_ARR.legs[0].id"), Some(json!("L2")));
    }

    #[test]
    fn placeholder_param_values_resolve_through_vars() {
        let mut a = adapter();
        let vars: ripple_path::Vars = [("id".to_string(), json!(7))].into();
        a.set("rows[id=$id].x", json!(1), Some(&vars)).unwrap();
        assert_eq!(a.root(), &json!({"rows": [{"id": 7, "x": 1}]}));
        // Unresolved placeholders cannot address data.
        assert!(matches!(
            a.set("rows[id=$nope].x", json!(1), None),
            Err(AdapterError::UnresolvedPlaceholder(_))
        ));
    }

    #[test]
    fn results_are_identical_with_and_without_the_index() {
        let rows: Vec<Value> =
            (0..1000).map(|i| json!({"id": i, "x": 0})).collect();
        let doc = json!({"com": rows});
        for (enabled, strategy) in [
            (true, IndexStrategy::EagerAllKeys),
            (true, IndexStrategy::LazyKey),
            (false, IndexStrategy::EagerAllKeys),
        ] {
            let mut a = TreeAdapter::with_document(
                AdapterOptions {
                    index_enabled: enabled,
                    index_strategy: strategy,
                    ..AdapterOptions::default()
                },
                doc.clone(),
            );
            assert_eq!(get(&mut a, "com[id=500].x"), Some(json!(0)), "{enabled} {strategy:?}");
            a.set("com[id=500].x", json!(7), None).unwrap();
            assert_eq!(get(&mut a, "com[id=500].x"), Some(json!(7)), "{enabled} {strategy:?}");
            assert_eq!(a.index_of("com[id=500]", None), 500);
        }
    }

    #[test]
    fn string_and_numeric_param_values_stay_distinct() {
        let mut a = adapter();
        a.set("", json!({"rows": [{"id": "42", "x": "s"}, {"id": 42, "x": "n"}]}), None)
            .unwrap();
        assert_eq!(get(&mut a, "rows[id=\"42\"].x"), Some(json!("s")));
        assert_eq!(get(&mut a, "rows[id=42].x"), Some(json!("n")));
    }

    #[test]
    fn pushed_elements_enter_built_buckets() {
        let mut a = adapter();
        a.set("", json!({"rows": [{"id": 1}]}), None).unwrap();
        // Build the index, then push a new element via param auto-create.
        assert_eq!(a.index_of("rows[id=1]", None), 0);
        a.set("rows[id=2].x", json!(9), None).unwrap();
        assert_eq!(a.index_of("rows[id=2]", None), 1);
        assert_eq!(get(&mut a, "rows[id=2].x"), Some(json!(9)));
    }
}
