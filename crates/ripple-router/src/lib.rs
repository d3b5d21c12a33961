//! Parameterised path-pattern trie router.
//!
//! Registers path masks with payloads and resolves a concrete target path to
//! every matching payload, optionally binding placeholder parameters:
//!
//! ```
//! use ripple_router::Router;
//! use ripple_path::Literal;
//!
//! let mut router = Router::new();
//! router.add("orders[id=$oid].items[id=$iid].price", "watch").unwrap();
//!
//! let hits = router.match_with_params("orders[id=42].items[id=7].price");
//! assert_eq!(hits.len(), 1);
//! assert_eq!(hits[0].payload, "watch");
//! assert_eq!(hits[0].params["oid"], Literal::Int(42));
//! assert_eq!(hits[0].params["iid"], Literal::Int(7));
//! ```

mod matching;
mod node;
mod router;

pub use router::{Router, DEFAULT_CACHE_CAP};

use ripple_path::Literal;
use std::collections::BTreeMap;

/// Captured placeholder bindings, ordered by variable name.
pub type Params = BTreeMap<String, Literal>;

/// One match result: the payload plus the parameters captured on the way to
/// it.
#[derive(Debug, Clone, PartialEq)]
pub struct Match<P> {
    pub payload: P,
    pub params: Params,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn router(masks: &[(&str, u32)]) -> Router<u32> {
        let mut r = Router::new();
        for (mask, payload) in masks {
            r.add(mask, *payload).unwrap();
        }
        r
    }

    #[test]
    fn literal_masks_match_like_the_pair_matcher() {
        let r = router(&[("a.b.c", 1), ("a.*.c", 2), ("a.b", 3)]);
        assert_eq!(r.match_path("a.b.c"), [1, 2].into());
        assert_eq!(r.match_path("a.x.c"), [2].into());
        assert_eq!(r.match_path("a.b"), [3].into());
        assert!(r.match_path("a.b.c.d").is_empty());
    }

    #[test]
    fn deep_mask_matches_every_descendant_and_itself() {
        let r = router(&[("com.*", 9)]);
        for target in ["com", "com.x", "com.x.y", "com[0].z"] {
            assert_eq!(r.match_path(target), [9].into(), "target {target}");
        }
        assert!(r.match_path("org").is_empty());
    }

    #[test]
    fn root_deep_mask_matches_everything() {
        let r = router(&[("*", 1)]);
        assert_eq!(r.match_path(""), [1].into());
        assert_eq!(r.match_path("anything[3].at.all"), [1].into());
    }

    #[test]
    fn index_wildcard_and_index_steps() {
        let r = router(&[("rows[*].name", 1), ("rows[2].name", 2)]);
        assert_eq!(r.match_path("rows[2].name"), [1, 2].into());
        assert_eq!(r.match_path("rows[10].name"), [1].into());
        assert!(r.match_path("rows.name").is_empty());
    }

    #[test]
    fn key_and_index_tokens_do_not_collide() {
        let r = router(&[("m.1.x", 1), ("m[1].x", 2)]);
        assert_eq!(r.match_path("m.1.x"), [1].into());
        assert_eq!(r.match_path("m[1].x"), [2].into());
    }

    #[test]
    fn string_and_numeric_params_do_not_collide() {
        let r = router(&[("n[id=42].m", 1), ("n[id=\"42\"].m", 2)]);
        assert_eq!(r.match_path("n[id=42].m"), [1].into());
        assert_eq!(r.match_path("n[id=\"42\"].m"), [2].into());
    }

    #[test]
    fn placeholder_params_capture_values() {
        let r = router(&[("orders[id=$oid].items[id=$iid].price", 7)]);
        let hits = r.match_with_params("orders[id=42].items[id=7].price");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].payload, 7);
        assert_eq!(hits[0].params["oid"], Literal::Int(42));
        assert_eq!(hits[0].params["iid"], Literal::Int(7));
        // String-valued params capture strings.
        let hits = r.match_with_params("orders[id=\"a\"].items[id=7].price");
        assert_eq!(hits[0].params["oid"], Literal::Str("a".into()));
    }

    #[test]
    fn index_placeholder_captures_position() {
        let r = router(&[("rows[$i].name", 1)]);
        let hits = r.match_with_params("rows[5].name");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].params["i"], Literal::Int(5));
        // A param step is not an index step.
        assert!(r.match_with_params("rows[id=5].name").is_empty());
    }

    #[test]
    fn remove_with_payload_only_removes_that_payload() {
        let mut r = router(&[("a.b", 1), ("a.b", 2)]);
        assert!(r.remove("a.b", Some(&1)).unwrap());
        assert_eq!(r.match_path("a.b"), [2].into());
        assert!(!r.remove("a.b", Some(&1)).unwrap());
    }

    #[test]
    fn remove_without_payload_clears_the_set() {
        let mut r = router(&[("a.b", 1), ("a.b", 2), ("a.*", 3)]);
        assert!(r.remove("a.b", None).unwrap());
        assert_eq!(r.match_path("a.b"), [3].into());
    }

    #[test]
    fn remove_payload_removes_everywhere() {
        let mut r = router(&[("a.b", 1), ("c.*", 1), ("d[id=$x]", 1), ("a.b", 2)]);
        assert!(r.remove_payload(&1));
        assert!(r.match_path("c.anything").is_empty());
        assert!(r.match_with_params("d[id=3]").is_empty());
        assert_eq!(r.match_path("a.b"), [2].into());
        assert!(!r.remove_payload(&1));
    }

    #[test]
    fn structural_changes_invalidate_cached_matches() {
        let mut r = router(&[("a.b", 1)]);
        assert_eq!(r.match_path("a.b"), [1].into());
        r.add("a.b", 2).unwrap();
        assert_eq!(r.match_path("a.b"), [1, 2].into());
        r.remove_payload(&1);
        assert_eq!(r.match_path("a.b"), [2].into());
    }

    #[test]
    fn duplicate_add_is_idempotent() {
        let mut r = router(&[("a.b", 1)]);
        r.add("a.b", 1).unwrap();
        assert_eq!(r.match_path("a.b").len(), 1);
        r.remove("a.b", Some(&1)).unwrap();
        assert!(r.match_path("a.b").is_empty());
    }

    #[test]
    fn match_including_prefix_collects_below() {
        let r = router(&[("a.b.c", 1), ("a.b", 2), ("a", 3), ("a.*", 4), ("z", 9)]);
        assert_eq!(r.match_including_prefix("a"), [1, 2, 3, 4].into());
        assert_eq!(r.match_including_prefix("a.b"), [1, 2, 4].into());
        assert_eq!(r.match_path("a"), [3, 4].into());
    }

    #[test]
    fn prefix_match_inherits_captured_params() {
        let r = router(&[
            ("orders[id=$oid].items", 1),
            ("orders[id=$oid].items[id=$iid]", 2),
        ]);
        let hits = r.match_including_prefix_with_params("orders[id=42]");
        assert_eq!(hits.len(), 2);
        for hit in &hits {
            assert_eq!(hit.params["oid"], Literal::Int(42), "payload {}", hit.payload);
        }
        let deeper = hits.iter().find(|h| h.payload == 2).unwrap();
        // The iid capture sits below the prefix and stays unbound.
        assert!(!deeper.params.contains_key("iid"));
    }

    #[test]
    fn collect_by_prefix_walks_exact_and_param_literal_steps() {
        let r = router(&[
            ("orders[id=42].x", 1),
            ("orders[id=42].y.*", 2),
            ("orders[id=7].x", 3),
            ("orders", 4),
        ]);
        assert_eq!(r.collect_by_prefix("orders[id=42]"), [1, 2].into());
        assert_eq!(r.collect_by_prefix("orders"), [1, 2, 3, 4].into());
        assert!(r.collect_by_prefix("orders[*]").is_empty());
        assert!(r.collect_by_prefix("orders[id=$x]").is_empty());
        assert!(r.collect_by_prefix("nowhere").is_empty());
    }

    #[test]
    fn version_bumps_on_every_mutation() {
        let mut r: Router<u32> = Router::new();
        let v0 = r.version();
        r.add("a", 1).unwrap();
        let v1 = r.version();
        assert!(v1 > v0);
        r.remove("a", None).unwrap();
        assert!(r.version() > v1);
    }

    #[test]
    fn unparseable_target_matches_nothing() {
        let r = router(&[("a.*", 1)]);
        assert!(r.match_path("a[unclosed").is_empty());
        assert!(r.match_with_params("a[unclosed").is_empty());
    }
}
