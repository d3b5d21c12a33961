//! Dependency DAG.
//!
//! Nodes are numeric ids; edges point parent → child. The graph maintains
//! `depth` (0 for roots, else one more than the deepest parent) incrementally
//! on every edge change, caches the root set, and rejects edges that would
//! create a cycle.

mod graph;
mod traversal;

pub use graph::DepGraph;
pub use traversal::Traversal;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable numeric node identifier, unique within one app.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
