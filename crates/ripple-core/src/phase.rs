//! Phase model and executor contract.

use crate::app::App;
use crate::node::Node;
use ripple_graph::{NodeId, Traversal};
use ripple_path::Path;
use ripple_router::Params;
use std::fmt;
use std::rc::Rc;

/// Per-node executor: runs once per dirty node per drain.
pub type EachFn = Rc<dyn Fn(&App, PhaseCtx)>;
/// Batched executor: runs once per drain with all contexts in priority
/// order.
pub type AllFn = Rc<dyn Fn(&App, Vec<PhaseCtx>)>;

#[derive(Clone)]
pub enum Executor {
    Each(EachFn),
    All(AllFn),
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Executor::Each(_) => f.write_str("Executor::Each"),
            Executor::All(_) => f.write_str("Executor::All"),
        }
    }
}

/// Phase-level node admission: a predicate, or a list of admissible node
/// type tags.
#[derive(Clone)]
pub enum NodeFilter {
    Predicate(Rc<dyn Fn(&Node) -> bool>),
    Kinds(Vec<String>),
}

impl NodeFilter {
    pub(crate) fn admits(&self, node: &Node) -> bool {
        match self {
            NodeFilter::Predicate(f) => f(node),
            NodeFilter::Kinds(kinds) => {
                node.kind.as_ref().is_some_and(|kind| kinds.iter().any(|k| k == kind))
            }
        }
    }
}

impl fmt::Debug for NodeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFilter::Predicate(_) => f.write_str("NodeFilter::Predicate"),
            NodeFilter::Kinds(kinds) => f.debug_tuple("NodeFilter::Kinds").field(kinds).finish(),
        }
    }
}

/// Declarative phase definition.
#[derive(Debug, Clone)]
pub struct PhaseDef {
    /// App-unique phase name; declaration order is execution order.
    pub name: String,
    pub traversal: Traversal,
    /// Path masks this phase listens on.
    pub routes: Vec<String>,
    pub filter: Option<NodeFilter>,
    pub executor: Executor,
}

impl PhaseDef {
    pub fn each(
        name: impl Into<String>,
        routes: impl IntoIterator<Item = impl Into<String>>,
        f: impl Fn(&App, PhaseCtx) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            traversal: Traversal::default(),
            routes: routes.into_iter().map(Into::into).collect(),
            filter: None,
            executor: Executor::Each(Rc::new(f)),
        }
    }

    pub fn all(
        name: impl Into<String>,
        routes: impl IntoIterator<Item = impl Into<String>>,
        f: impl Fn(&App, Vec<PhaseCtx>) + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            traversal: Traversal::default(),
            routes: routes.into_iter().map(Into::into).collect(),
            filter: None,
            executor: Executor::All(Rc::new(f)),
        }
    }

    pub fn with_traversal(mut self, traversal: Traversal) -> Self {
        self.traversal = traversal;
        self
    }

    pub fn with_filter(mut self, filter: NodeFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_kinds(self, kinds: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.with_filter(NodeFilter::Kinds(kinds.into_iter().map(Into::into).collect()))
    }
}

/// An installed phase: the definition plus its dedup bit (its position in
/// the phase table).
#[derive(Debug, Clone)]
pub(crate) struct Phase {
    pub def: PhaseDef,
    pub bit: usize,
}

/// One resolved param entry of a mutation path: the array field it stepped
/// through, the param key/value, and the element index it resolved to
/// (`-1` when not found).
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParam {
    pub container: String,
    pub key: String,
    pub value: ripple_path::Literal,
    pub index: i64,
}

/// What a phase executor learns about one mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseEvent {
    /// Path string as passed to the mutation.
    pub path: String,
    /// Canonical form: variables resolved, dynamic components widened.
    pub canonical: String,
    /// Parsed canonical path.
    pub parsed: Path,
    /// Resolved entries for each param segment of the original path.
    pub resolved: Vec<ResolvedParam>,
    /// Placeholder bindings captured by the mask that routed this event to
    /// this node (empty for traversal-expanded nodes).
    pub params: Params,
}

/// Executor context for one dirty node.
#[derive(Debug, Clone)]
pub struct PhaseCtx {
    pub phase: String,
    pub node: NodeId,
    /// The node's app-unique key.
    pub key: String,
    /// Events observed for this node this tick, in occurrence order.
    pub events: Vec<Rc<PhaseEvent>>,
}
