//! Path segment types.

use serde_json::Value;
use std::fmt;

/// Synthetic parameter key used for index placeholders (`[$name]`).
pub const INDEX_PARAM_KEY: &str = "$index";

/// A simple literal carried by a parameter segment.
///
/// Numbers, strings and booleans are the only value kinds a parameter can
/// compare against. String and numeric literals are distinct: `[id=42]` and
/// `[id="42"]` never match each other.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Literal {
    /// Encoded token for this literal, prefixed by kind so that string and
    /// numeric literals can never collide in a keyed map.
    pub fn token(&self) -> String {
        match self {
            Literal::Str(s) => format!("s:{s}"),
            Literal::Int(n) => format!("n:{n}"),
            Literal::Float(n) => format!("n:{n}"),
            Literal::Bool(b) => format!("b:{b}"),
        }
    }

    /// Convert into a dynamic document value.
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Str(s) => Value::String(s.clone()),
            Literal::Int(n) => Value::Number((*n).into()),
            Literal::Float(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Bool(b) => Value::Bool(*b),
        }
    }

    /// Build a literal from a simple-typed document value. Containers and
    /// nulls have no literal form.
    pub fn from_value(value: &Value) -> Option<Literal> {
        match value {
            Value::String(s) => Some(Literal::Str(s.clone())),
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Literal::Int(i))
                } else {
                    n.as_f64().map(Literal::Float)
                }
            }
            _ => None,
        }
    }

    /// Equality against a document value. Integer and float literals compare
    /// numerically, so `42` matches a field holding `42.0`.
    pub fn matches_value(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Str(a), Value::String(b)) => a == b,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Int(a), Value::Number(n)) => {
                n.as_i64() == Some(*a) || n.as_f64() == Some(*a as f64)
            }
            (Literal::Float(a), Value::Number(n)) => n.as_f64() == Some(*a),
            _ => false,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => write!(f, "\"{s}\""),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Value position of a parameter segment: either a literal to compare
/// against, or a `$name` placeholder that matches any value and captures it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Literal(Literal),
    /// Placeholder name without the `$` sigil.
    Placeholder(String),
}

impl ParamValue {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ParamValue::Placeholder(_))
    }
}

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Named field step: `.name`.
    Key(String),
    /// Integer index step into a sequence: `[3]`.
    Index(usize),
    /// Matches exactly one segment. A key wildcard (`*`) in final position is
    /// *deep*: it matches any remaining tail, including the empty one. An
    /// index wildcard (`[*]`) is never deep.
    Wildcard { as_index: bool, deep: bool },
    /// Element-of-array step: `[key=value]`, `[key=$name]`, or `[$name]`
    /// (index placeholder, carried under the synthetic key [`INDEX_PARAM_KEY`]).
    Param { key: String, value: ParamValue },
}

impl Segment {
    pub fn key(name: impl Into<String>) -> Segment {
        Segment::Key(name.into())
    }

    pub fn index(i: usize) -> Segment {
        Segment::Index(i)
    }

    pub fn key_wildcard() -> Segment {
        Segment::Wildcard { as_index: false, deep: false }
    }

    pub fn index_wildcard() -> Segment {
        Segment::Wildcard { as_index: true, deep: false }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Segment::Wildcard { .. })
    }

    pub fn is_deep(&self) -> bool {
        matches!(self, Segment::Wildcard { deep: true, .. })
    }

    /// Encoded token for exact-map storage. `Key` and `Index` segments share
    /// one keyed map, so the token carries a kind prefix.
    pub fn token(&self) -> Option<String> {
        match self {
            Segment::Key(name) => Some(format!("s:{name}")),
            Segment::Index(i) => Some(format!("i:{i}")),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn literal_tokens_distinguish_kinds() {
        assert_eq!(Literal::Int(42).token(), "n:42");
        assert_eq!(Literal::Str("42".into()).token(), "s:42");
        assert_ne!(Literal::Int(42).token(), Literal::Str("42".into()).token());
        assert_eq!(Literal::Bool(true).token(), "b:true");
    }

    #[test]
    fn segment_tokens_distinguish_key_and_index() {
        assert_eq!(Segment::key("1").token().unwrap(), "s:1");
        assert_eq!(Segment::index(1).token().unwrap(), "i:1");
        assert!(Segment::key_wildcard().token().is_none());
    }

    #[test]
    fn literal_matches_numeric_value() {
        assert!(Literal::Int(42).matches_value(&json!(42)));
        assert!(Literal::Int(42).matches_value(&json!(42.0)));
        assert!(!Literal::Int(42).matches_value(&json!("42")));
        assert!(Literal::Str("42".into()).matches_value(&json!("42")));
        assert!(!Literal::Str("42".into()).matches_value(&json!(42)));
    }

    #[test]
    fn literal_roundtrips_through_value() {
        for lit in [
            Literal::Str("a".into()),
            Literal::Int(-3),
            Literal::Bool(false),
        ] {
            assert_eq!(Literal::from_value(&lit.to_value()), Some(lit));
        }
        assert_eq!(Literal::from_value(&json!(null)), None);
        assert_eq!(Literal::from_value(&json!([1])), None);
    }
}
