//! ripple-core — reactive computation engine.
//!
//! Schedules work over a user-defined DAG of nodes in response to document
//! mutations. Mutations route through a path-pattern trie to the phases and
//! nodes listening on matching masks; affected nodes land in per-phase
//! priority buckets; a pluggable scheduler drains the buckets in
//! depth-then-weight order.
//!
//! ```
//! use ripple_core::{App, AppOptions, PhaseDef, Scheduling};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let app = App::with_options(AppOptions {
//!     scheduler: Scheduling::Sync,
//!     ..AppOptions::default()
//! });
//!
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! app.define_phases(vec![PhaseDef::each("render", ["com.*"], move |_, ctx| {
//!     sink.borrow_mut().push(ctx.key.clone());
//! })]);
//!
//! app.track("widget", &["com.*"]);
//! app.set("com.x", json!(1)).unwrap();
//! assert_eq!(log.borrow().as_slice(), &["widget".to_string()]);
//! ```

mod app;
mod events;
mod heap;
mod node;
mod phase;
mod queue;
mod reactive;
mod scheduler;

pub use app::{App, AppOptions, TrackOptions};
pub use events::{AppEvent, MetricsSnapshot};
pub use heap::IntMinHeap;
pub use node::{Node, NodeArena};
pub use phase::{
    AllFn, EachFn, Executor, NodeFilter, PhaseCtx, PhaseDef, PhaseEvent, ResolvedParam,
};
pub use queue::PRIORITY_SCALE;
pub use reactive::{
    Computed, Effect, Signal, Watch, COMPUTED_PHASE, EFFECTS_PHASE, SIGNALS_PHASE,
    WATCHES_PHASE,
};
pub use scheduler::Scheduling;

pub use ripple_adapter::{
    AdapterError, AdapterOptions, ArrayDelete, DataAdapter, IndexStrategy, TreeAdapter,
};
pub use ripple_graph::{DepGraph, NodeId, Traversal};
pub use ripple_path::{
    interpolate, Literal, ParamValue, ParseError, ParseOptions, Path, Segment, Vars,
};
pub use ripple_router::{Match, Params, Router};
