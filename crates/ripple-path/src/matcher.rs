//! Pairwise mask/target matching.

use crate::segment::{ParamValue, Segment};
use crate::Path;

/// Stepwise comparison of a mask against a concrete target path.
///
/// A non-deep key wildcard matches any one segment of any kind, as does an
/// index wildcard. A deep (trailing) key wildcard matches any remaining
/// tail, including the empty one. Literal params match only a param segment
/// with the same key and value.
///
/// A mask containing placeholder params is outside this matcher's contract
/// (only the router binds placeholders); placeholders here degrade to
/// single-step wildcards.
pub(crate) fn matches(mask: &Path, target: &Path) -> bool {
    step(&mask.segments, &target.segments)
}

fn step(mask: &[Segment], target: &[Segment]) -> bool {
    let mut m = 0;
    let mut t = 0;
    loop {
        match (mask.get(m), target.get(t)) {
            (Some(Segment::Wildcard { deep: true, .. }), _) => return true,
            (None, None) => return true,
            (None, Some(_)) | (Some(_), None) => return false,
            (Some(ms), Some(ts)) => {
                if !segment_matches(ms, ts) {
                    return false;
                }
                m += 1;
                t += 1;
            }
        }
    }
}

fn segment_matches(mask: &Segment, target: &Segment) -> bool {
    match mask {
        Segment::Wildcard { .. } => true,
        Segment::Key(name) => matches!(target, Segment::Key(t) if t == name),
        Segment::Index(i) => matches!(target, Segment::Index(t) if t == i),
        Segment::Param { key, value: ParamValue::Literal(lit) } => matches!(
            target,
            Segment::Param { key: tk, value: ParamValue::Literal(tv) } if tk == key && tv == lit
        ),
        // Placeholder in a mask: undefined for the pair matcher, treated as
        // a single wildcard step.
        Segment::Param { value: ParamValue::Placeholder(_), .. } => true,
    }
}

#[cfg(test)]
mod tests {
    use crate::Path;

    fn m(mask: &str, target: &str) -> bool {
        Path::parse(mask).unwrap().matches(&Path::parse(target).unwrap())
    }

    #[test]
    fn deep_wildcard_matches_prefix_and_self() {
        assert!(m("com.*", "com"));
        assert!(m("com.*", "com.x"));
        assert!(m("com.*", "com.x.y.z"));
        assert!(!m("com.*", "org"));
        assert!(!m("com.*", "co"));
    }

    #[test]
    fn bare_star_matches_everything() {
        assert!(m("*", ""));
        assert!(m("*", "a"));
        assert!(m("*", "a.b[3]"));
    }

    #[test]
    fn single_wildcard_matches_exactly_one_segment() {
        assert!(m("a.*.c", "a.b.c"));
        assert!(!m("a.*.c", "a.b.d.c"));
        assert!(!m("a.*.c", "a.c"));
    }

    #[test]
    fn index_wildcard_is_single_step() {
        assert!(m("rows[*].name", "rows[10].name"));
        assert!(!m("rows[*].name", "rows.name"));
        assert!(!m("rows[*]", "rows[0].name"));
    }

    #[test]
    fn params_compare_key_and_typed_value() {
        assert!(m("n[id=42].m", "n[id=42].m"));
        assert!(!m("n[id=42].m", "n[id=\"42\"].m"));
        assert!(!m("n[id=42].m", "n[id=43].m"));
        assert!(!m("n[id=42].m", "n[other=42].m"));
        assert!(!m("n[id=42].m", "n[0].m"));
    }

    #[test]
    fn wildcard_matches_param_step() {
        assert!(m("n.*.m", "n[id=42].m"));
        assert!(m("n[*].m", "n[id=42].m"));
    }

    #[test]
    fn exact_paths_must_be_equal() {
        assert!(m("a.b[2]", "a.b[2]"));
        assert!(!m("a.b[2]", "a.b[3]"));
        assert!(!m("a.b", "a.b.c"));
        assert!(!m("a.b.c", "a.b"));
    }
}
