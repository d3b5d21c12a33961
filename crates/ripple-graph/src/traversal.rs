//! Traversal policies for expanding a base node set.

use serde::{Deserialize, Serialize};

/// How a phase expands the set of route-matched nodes before queueing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Traversal {
    /// Only the matched nodes themselves.
    #[default]
    DirtyOnly,
    /// Matched nodes plus their transitive children.
    DirtyAndDown,
    /// Matched nodes plus their transitive parents.
    DirtyAndUp,
    /// Every node in the graph.
    All,
}
