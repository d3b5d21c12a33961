//! Path expression model.
//!
//! A path is an ordered sequence of [`Segment`]s addressing a location in a
//! hierarchical document, with wildcard and parameterised-array forms for use
//! as subscription masks:
//!
//! ```
//! use ripple_path::Path;
//!
//! let mask = Path::parse("orders[id=$oid].items[*].price").unwrap();
//! let target = Path::parse("orders[id=42].items[3].price").unwrap();
//! assert!(mask.matches(&target));
//! assert_eq!(target.to_string(), "orders[id=42].items[3].price");
//! ```

mod cache;
mod interpolate;
mod matcher;
mod parser;
mod segment;

pub use cache::{PathCache, DEFAULT_CACHE_CAP};
pub use interpolate::interpolate;
pub use parser::{ParseError, ParseOptions};
pub use segment::{Literal, ParamValue, Segment, INDEX_PARAM_KEY};

use std::collections::HashMap;
use std::fmt;

/// Variable bindings for parsing and interpolation.
pub type Vars = HashMap<String, serde_json::Value>;

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Path {
    pub segments: Vec<Segment>,
}

impl Path {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// Parse a path expression with default options.
    pub fn parse(input: &str) -> Result<Path, ParseError> {
        parser::PathParser::parse(input, ParseOptions::default())
    }

    /// Parse with variable resolution and/or dynamic widening.
    pub fn parse_with(input: &str, opts: ParseOptions<'_>) -> Result<Path, ParseError> {
        parser::PathParser::parse(input, opts)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// `true` when this path, used as a mask, matches the concrete `target`.
    /// See the module notes on placeholder masks.
    pub fn matches(&self, target: &Path) -> bool {
        matcher::matches(self, target)
    }

    /// `true` when any segment is a wildcard (such paths are masks, never
    /// data addresses).
    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(Segment::is_wildcard)
    }

    /// `true` when any param segment carries a placeholder value.
    pub fn has_placeholder(&self) -> bool {
        self.segments.iter().any(|s| {
            matches!(s, Segment::Param { value: ParamValue::Placeholder(_), .. })
        })
    }
}

impl fmt::Display for Path {
    /// Deterministic inverse of parsing: `serialize(parse(s))` reparses to
    /// the same segments.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.segments.iter().enumerate() {
            match seg {
                Segment::Key(name) => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "{name}")?;
                }
                Segment::Wildcard { as_index: false, .. } => {
                    if i > 0 {
                        write!(f, ".")?;
                    }
                    write!(f, "*")?;
                }
                Segment::Wildcard { as_index: true, .. } => write!(f, "[*]")?,
                Segment::Index(n) => write!(f, "[{n}]")?,
                Segment::Param { key, value } => match value {
                    ParamValue::Literal(lit) => write!(f, "[{key}={lit}]")?,
                    ParamValue::Placeholder(name) if key == INDEX_PARAM_KEY => {
                        write!(f, "[${name}]")?
                    }
                    ParamValue::Placeholder(name) => write!(f, "[{key}=${name}]")?,
                },
            }
        }
        Ok(())
    }
}
