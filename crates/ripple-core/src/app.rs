//! App façade: the notify pipeline and drain loop.

use crate::events::{AppEvent, Emitter, Metrics, MetricsSnapshot};
use crate::node::NodeArena;
use crate::phase::{Executor, Phase, PhaseCtx, PhaseDef, PhaseEvent, ResolvedParam};
use crate::queue::{priority_index, DirtyQueue};
use crate::reactive::ReactiveRegistry;
use crate::scheduler::{Scheduler, Scheduling};
use ripple_adapter::{AdapterError, AdapterOptions, DataAdapter, TreeAdapter};
use ripple_graph::{DepGraph, NodeId, Traversal};
use ripple_path::{interpolate, ParamValue, ParseOptions, Path, Segment, Vars};
use ripple_router::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;
use tracing::{debug, warn};

/// Engine configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppOptions {
    /// Cap on drains per second under the frame pump.
    pub max_ups: u32,
    pub scheduler: Scheduling,
    /// Emit per-node telemetry events and drain diagnostics.
    pub debug: bool,
    /// Drain on every tick, mutations or not.
    pub run_loop: bool,
    pub adapter: AdapterOptions,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            max_ups: 120,
            scheduler: Scheduling::default(),
            debug: false,
            run_loop: false,
            adapter: AdapterOptions::default(),
        }
    }
}

/// Node registration options.
#[derive(Debug, Clone, Default)]
pub struct TrackOptions {
    pub weight: i64,
    pub kind: Option<String>,
    pub meta: Value,
}

pub(crate) struct AppInner {
    opts: AppOptions,
    adapter: RefCell<Box<dyn DataAdapter>>,
    graph: RefCell<DepGraph>,
    arena: RefCell<NodeArena>,
    node_router: RefCell<Router<NodeId>>,
    phase_router: RefCell<Router<String>>,
    phases: RefCell<Vec<Phase>>,
    user_phases: RefCell<Vec<PhaseDef>>,
    builtin_phases: RefCell<Vec<PhaseDef>>,
    queues: RefCell<HashMap<String, DirtyQueue>>,
    scheduler: RefCell<Scheduler>,
    emitter: Emitter,
    metrics: Metrics,
    batch_depth: Cell<u32>,
    pub(crate) reactive: RefCell<ReactiveRegistry>,
}

/// The reactive computation engine.
///
/// Owns the document, both routers, the dependency graph, the phase table
/// and the per-phase dirty queues. Cheap to clone (a handle); all state is
/// interior so executors may call back into the app mid-drain.
#[derive(Clone)]
pub struct App {
    pub(crate) inner: Rc<AppInner>,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> App {
        Self::with_options(AppOptions::default())
    }

    pub fn with_options(opts: AppOptions) -> App {
        let adapter = Box::new(TreeAdapter::new(opts.adapter));
        Self::with_adapter(opts, adapter)
    }

    /// Construct with a custom data adapter.
    pub fn with_adapter(opts: AppOptions, adapter: Box<dyn DataAdapter>) -> App {
        App {
            inner: Rc::new(AppInner {
                adapter: RefCell::new(adapter),
                graph: RefCell::new(DepGraph::new()),
                arena: RefCell::new(NodeArena::new()),
                node_router: RefCell::new(Router::new()),
                phase_router: RefCell::new(Router::new()),
                phases: RefCell::new(Vec::new()),
                user_phases: RefCell::new(Vec::new()),
                builtin_phases: RefCell::new(Vec::new()),
                queues: RefCell::new(HashMap::new()),
                scheduler: RefCell::new(Scheduler::new(
                    opts.scheduler,
                    opts.max_ups,
                    opts.run_loop,
                )),
                emitter: Emitter::default(),
                metrics: Metrics::default(),
                batch_depth: Cell::new(0),
                reactive: RefCell::new(ReactiveRegistry::default()),
                opts,
            }),
        }
    }

    pub fn options(&self) -> AppOptions {
        self.inner.opts
    }

    /// Subscribe to engine events by name, or `"*"` for all.
    pub fn on(&self, event: &str, listener: impl Fn(&AppEvent) + 'static) {
        self.inner.emitter.on(event, listener);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    // ── Phases ────────────────────────────────────────────────────────────

    /// Replace the phase table. Declaration order is execution order; each
    /// phase's position is its dedup bit.
    pub fn define_phases(&self, defs: Vec<PhaseDef>) {
        *self.inner.user_phases.borrow_mut() = defs;
        self.rebuild_phases();
    }

    pub(crate) fn install_builtin_phases(&self, defs: Vec<PhaseDef>) {
        *self.inner.builtin_phases.borrow_mut() = defs;
        self.rebuild_phases();
    }

    fn rebuild_phases(&self) {
        let defs: Vec<PhaseDef> = {
            let user = self.inner.user_phases.borrow();
            let builtin = self.inner.builtin_phases.borrow();
            user.iter().chain(builtin.iter()).cloned().collect()
        };
        let mut router = Router::new();
        let mut queues = HashMap::new();
        let mut phases = Vec::with_capacity(defs.len());
        for (bit, def) in defs.into_iter().enumerate() {
            for mask in &def.routes {
                if let Err(err) = router.add(mask, def.name.clone()) {
                    warn!(%mask, phase = %def.name, %err, "skipping unparseable phase route");
                }
            }
            queues.insert(def.name.clone(), DirtyQueue::new());
            phases.push(Phase { def, bit });
        }
        *self.inner.phase_router.borrow_mut() = router;
        *self.inner.queues.borrow_mut() = queues;
        *self.inner.phases.borrow_mut() = phases;
        self.inner.arena.borrow_mut().clear_all_dirty();
        self.inner.emitter.emit(&AppEvent::PhasesReinit);
    }

    // ── Nodes ─────────────────────────────────────────────────────────────

    /// Register a node listening on `masks`.
    pub fn track(&self, key: &str, masks: &[&str]) -> NodeId {
        self.track_with(key, masks, TrackOptions::default())
    }

    pub fn track_with(&self, key: &str, masks: &[&str], opts: TrackOptions) -> NodeId {
        let id = self
            .inner
            .arena
            .borrow_mut()
            .insert(key, opts.weight, opts.kind, opts.meta);
        self.inner.graph.borrow_mut().add_node(id);
        {
            let mut router = self.inner.node_router.borrow_mut();
            for mask in masks {
                if let Err(err) = router.add(mask, id) {
                    warn!(%mask, %key, %err, "skipping unparseable track mask");
                }
            }
        }
        self.inner.emitter.emit(&AppEvent::NodeTracked { node: id, key: key.to_string() });
        id
    }

    /// Remove a node by key: router registrations, graph membership and any
    /// queued dirty state all go with it.
    pub fn untrack(&self, key: &str) -> bool {
        let id = self.inner.arena.borrow().id_of(key);
        match id {
            Some(id) => self.untrack_node(id),
            None => false,
        }
    }

    pub fn untrack_node(&self, id: NodeId) -> bool {
        self.inner.node_router.borrow_mut().remove_payload(&id);
        self.inner.graph.borrow_mut().remove_node(id);
        self.inner.reactive.borrow_mut().remove(id);
        self.inner.arena.borrow_mut().remove(id).is_some()
    }

    pub fn node_id(&self, key: &str) -> Option<NodeId> {
        self.inner.arena.borrow().id_of(key)
    }

    pub fn node_key(&self, id: NodeId) -> Option<String> {
        self.inner.arena.borrow().get(id).map(|n| n.key.clone())
    }

    /// Read access to a tracked node.
    pub fn with_node<R>(&self, id: NodeId, f: impl FnOnce(&crate::Node) -> R) -> Option<R> {
        self.inner.arena.borrow().get(id).map(f)
    }

    pub fn node_count(&self) -> usize {
        self.inner.arena.borrow().len()
    }

    /// Add a dependency edge between tracked nodes, by key. Cycles are
    /// rejected with a `false` return.
    pub fn link(&self, parent: &str, child: &str) -> bool {
        let (Some(p), Some(c)) = (self.node_id(parent), self.node_id(child)) else {
            warn!(%parent, %child, "link endpoints must be tracked first");
            return false;
        };
        self.link_nodes(p, c)
    }

    pub fn link_nodes(&self, parent: NodeId, child: NodeId) -> bool {
        self.inner.graph.borrow_mut().add_edge(parent, child)
    }

    pub fn unlink(&self, parent: &str, child: &str) -> bool {
        let (Some(p), Some(c)) = (self.node_id(parent), self.node_id(child)) else {
            return false;
        };
        self.inner.graph.borrow_mut().remove_edge(p, c)
    }

    pub fn depth(&self, id: NodeId) -> u32 {
        self.inner.graph.borrow().depth(id)
    }

    // ── Data operations ───────────────────────────────────────────────────

    pub fn get(&self, path: &str) -> Result<Option<Value>, AdapterError> {
        self.get_with(path, None)
    }

    pub fn get_with(
        &self,
        path: &str,
        vars: Option<&Vars>,
    ) -> Result<Option<Value>, AdapterError> {
        self.inner.adapter.borrow_mut().get(path, vars)
    }

    pub fn set(&self, path: &str, value: Value) -> Result<(), AdapterError> {
        self.set_with(path, value, None)
    }

    pub fn set_with(
        &self,
        path: &str,
        value: Value,
        vars: Option<&Vars>,
    ) -> Result<(), AdapterError> {
        self.inner.adapter.borrow_mut().set(path, value, vars)?;
        self.inner.emitter.emit(&AppEvent::NodesChanged { path: path.to_string() });
        self.notify_with(path, vars);
        Ok(())
    }

    pub fn merge(&self, path: &str, value: Value) -> Result<(), AdapterError> {
        self.merge_with(path, value, None)
    }

    pub fn merge_with(
        &self,
        path: &str,
        value: Value,
        vars: Option<&Vars>,
    ) -> Result<(), AdapterError> {
        self.inner.adapter.borrow_mut().merge(path, value, vars)?;
        self.inner.emitter.emit(&AppEvent::NodesChanged { path: path.to_string() });
        self.notify_with(path, vars);
        Ok(())
    }

    pub fn delete(&self, path: &str) -> Result<(), AdapterError> {
        self.delete_with(path, None)
    }

    pub fn delete_with(&self, path: &str, vars: Option<&Vars>) -> Result<(), AdapterError> {
        self.inner.adapter.borrow_mut().delete(path, vars)?;
        self.inner.emitter.emit(&AppEvent::NodesChanged { path: path.to_string() });
        self.notify_with(path, vars);
        Ok(())
    }

    pub fn index_of(&self, path: &str) -> i64 {
        self.inner.adapter.borrow_mut().index_of(path, None)
    }

    pub fn index_of_with(&self, path: &str, vars: Option<&Vars>) -> i64 {
        self.inner.adapter.borrow_mut().index_of(path, vars)
    }

    /// Clone of the whole document.
    pub fn document(&self) -> Value {
        self.inner.adapter.borrow().root().clone()
    }

    // ── Notify pipeline ───────────────────────────────────────────────────

    /// Route a mutation at `path` to interested phases and nodes without
    /// touching the document.
    pub fn notify(&self, path: &str) {
        self.notify_with(path, None)
    }

    pub fn notify_with(&self, path: &str, vars: Option<&Vars>) {
        let canonical = interpolate(path, vars, true);
        let interested: HashSet<String> =
            self.inner.phase_router.borrow().match_including_prefix(&canonical);
        if interested.is_empty() {
            return;
        }

        let matches = self.inner.node_router.borrow().match_including_prefix_with_params(&canonical);
        self.inner.metrics.record_events(matches.len() as u64);
        self.inner.emitter.emit(&AppEvent::NodesNotified {
            path: path.to_string(),
            count: matches.len(),
        });

        let base_event = Rc::new(self.build_event(path, &canonical, vars));
        let events: Vec<(NodeId, Rc<PhaseEvent>)> = matches
            .into_iter()
            .map(|m| {
                let event = if m.params.is_empty() {
                    Rc::clone(&base_event)
                } else {
                    Rc::new(PhaseEvent { params: m.params, ..(*base_event).clone() })
                };
                (m.payload, event)
            })
            .collect();
        let base_ids: HashSet<NodeId> = events.iter().map(|(id, _)| *id).collect();

        let phase_plan: Vec<(String, Traversal)> = {
            let phases = self.inner.phases.borrow();
            phases
                .iter()
                .filter(|p| interested.contains(&p.def.name))
                .map(|p| (p.def.name.clone(), p.def.traversal))
                .collect()
        };
        for (phase, traversal) in phase_plan {
            let expanded = self
                .inner
                .graph
                .borrow()
                .expand_by_traversal(base_ids.iter().copied(), traversal);
            for (id, event) in &events {
                if expanded.contains(id) {
                    self.dirty_internal(&phase, *id, Some(Rc::clone(event)), false);
                }
            }
            for id in expanded {
                if !base_ids.contains(&id) {
                    self.dirty_internal(&phase, id, Some(Rc::clone(&base_event)), false);
                }
            }
        }
        self.invalidate();
    }

    fn build_event(&self, path: &str, canonical: &str, vars: Option<&Vars>) -> PhaseEvent {
        let parsed_canonical = Path::parse(canonical).unwrap_or_default();
        let resolved = Path::parse_with(
            path,
            ParseOptions { vars, wildcard_dynamic: false },
        )
        .map(|original| self.resolve_params(&original))
        .unwrap_or_default();
        PhaseEvent {
            path: path.to_string(),
            canonical: canonical.to_string(),
            parsed: parsed_canonical,
            resolved,
            params: Default::default(),
        }
    }

    /// For each param segment of the original path: the array field stepped
    /// through, the param pair, and the element index it resolves to.
    fn resolve_params(&self, original: &Path) -> Vec<ResolvedParam> {
        let mut out = Vec::new();
        let mut container = String::new();
        for (i, seg) in original.segments.iter().enumerate() {
            match seg {
                Segment::Key(name) => container = name.clone(),
                Segment::Param { key, value: ParamValue::Literal(lit) } => {
                    let sub = Path::new(original.segments[..=i].to_vec()).to_string();
                    let index = self.inner.adapter.borrow_mut().index_of(&sub, None);
                    out.push(ResolvedParam {
                        container: container.clone(),
                        key: key.clone(),
                        value: lit.clone(),
                        index,
                    });
                }
                _ => {}
            }
        }
        out
    }

    // ── Dirty queueing ────────────────────────────────────────────────────

    /// Mark `node` dirty for `phase` and schedule a drain.
    pub fn dirty(&self, phase: &str, node: NodeId) {
        self.dirty_internal(phase, node, None, true);
    }

    /// As [`dirty`](Self::dirty), with an explicit event and control over
    /// drain scheduling. The event is recorded even when the node was
    /// already dirty for the phase.
    pub fn dirty_with(
        &self,
        phase: &str,
        node: NodeId,
        invalidate: bool,
        event: Option<PhaseEvent>,
    ) {
        self.dirty_internal(phase, node, event.map(Rc::new), invalidate);
    }

    fn dirty_internal(
        &self,
        phase: &str,
        node: NodeId,
        event: Option<Rc<PhaseEvent>>,
        invalidate: bool,
    ) {
        let Some((bit, filter, traversal)) = ({
            let phases = self.inner.phases.borrow();
            phases
                .iter()
                .find(|p| p.def.name == phase)
                .map(|p| (p.bit, p.def.filter.clone(), p.def.traversal))
        }) else {
            warn!(%phase, "dirty for unknown phase ignored");
            return;
        };

        let already = {
            let arena = self.inner.arena.borrow();
            let Some(n) = arena.get(node) else { return };
            if let Some(filter) = &filter {
                if !filter.admits(n) {
                    return;
                }
            }
            n.is_dirty(bit)
        };

        {
            let mut queues = self.inner.queues.borrow_mut();
            let Some(queue) = queues.get_mut(phase) else { return };
            if let Some(event) = &event {
                queue.record_event(node, Rc::clone(event));
            }
            if !already {
                let depth = self.inner.graph.borrow().depth(node);
                // Upward phases process the deepest dirty node first, so the
                // depth term flips sign for them.
                let depth_term = match traversal {
                    Traversal::DirtyAndUp => -(depth as i64),
                    _ => depth as i64,
                };
                let mut arena = self.inner.arena.borrow_mut();
                let Some(n) = arena.get_mut(node) else { return };
                queue.push(priority_index(depth_term, n.weight), node);
                n.set_dirty(bit);
            }
        }

        if self.inner.opts.debug {
            let path = event.as_ref().map(|e| e.path.clone()).unwrap_or_default();
            self.inner.emitter.emit(&AppEvent::NodeNotified {
                node,
                phase: phase.to_string(),
                path,
            });
        }
        if invalidate {
            self.invalidate();
        }
    }

    // ── Scheduling ────────────────────────────────────────────────────────

    /// Request a drain per the configured policy.
    pub fn invalidate(&self) {
        let drain_now = {
            let mut scheduler = self.inner.scheduler.borrow_mut();
            scheduler.invalidate() && self.inner.batch_depth.get() == 0
        };
        if drain_now {
            self.run();
        }
    }

    /// Microtask pump: drain now when anything is pending.
    pub fn flush(&self) -> bool {
        let should = self.inner.scheduler.borrow().should_flush();
        if should {
            self.run();
        }
        should
    }

    /// Frame pump: drain when pending (or looping) and the `max_ups` slot is
    /// open.
    pub fn tick(&self) -> bool {
        let should = self.inner.scheduler.borrow().should_tick(Instant::now());
        if should {
            self.run();
        }
        should
    }

    /// Run `f` with drains suppressed; one drain is scheduled afterwards.
    pub fn batch<R>(&self, f: impl FnOnce(&App) -> R) -> R {
        self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
        let out = f(self);
        self.inner.batch_depth.set(self.inner.batch_depth.get() - 1);
        if self.inner.batch_depth.get() == 0 {
            let drain_now = {
                let scheduler = self.inner.scheduler.borrow();
                scheduler.pending() && scheduler.policy() == Scheduling::Sync
            };
            if drain_now {
                self.run();
            }
        }
        out
    }

    // ── Drain ─────────────────────────────────────────────────────────────

    /// Drain every phase in declared order, now. Tolerates re-entry: a
    /// mutation made by an executor marks nodes for the next drain.
    pub fn run(&self) {
        self.inner.scheduler.borrow_mut().begin_drain();
        let phase_count = self.inner.phases.borrow().len();
        let mut processed: u64 = 0;
        for i in 0..phase_count {
            // Executors may redefine phases mid-drain; re-read each round.
            let Some((name, executor, bit)) = ({
                let phases = self.inner.phases.borrow();
                phases
                    .get(i)
                    .map(|p| (p.def.name.clone(), p.def.executor.clone(), p.bit))
            }) else {
                break;
            };

            let batch: Vec<(NodeId, Vec<Rc<PhaseEvent>>)> = {
                let mut queues = self.inner.queues.borrow_mut();
                match queues.get_mut(&name) {
                    Some(queue) if !queue.is_empty() => queue.take_all(),
                    _ => continue,
                }
            };
            if self.inner.opts.debug {
                debug!(phase = %name, nodes = batch.len(), "draining phase");
            }

            match executor {
                Executor::All(all) => {
                    let mut ctxs = Vec::with_capacity(batch.len());
                    {
                        let mut arena = self.inner.arena.borrow_mut();
                        for (id, events) in batch {
                            let Some(node) = arena.get_mut(id) else { continue };
                            node.clear_dirty(bit);
                            ctxs.push(PhaseCtx {
                                phase: name.clone(),
                                node: id,
                                key: node.key.clone(),
                                events,
                            });
                        }
                    }
                    processed += ctxs.len() as u64;
                    all(self, ctxs);
                }
                Executor::Each(each) => {
                    for (id, events) in batch {
                        // Clear the phase bit before the call so a
                        // re-entrant mutation can re-mark the node.
                        let key = {
                            let mut arena = self.inner.arena.borrow_mut();
                            match arena.get_mut(id) {
                                Some(node) => {
                                    node.clear_dirty(bit);
                                    node.key.clone()
                                }
                                None => continue,
                            }
                        };
                        processed += 1;
                        each(
                            self,
                            PhaseCtx { phase: name.clone(), node: id, key, events },
                        );
                    }
                }
            }
        }
        let now = Instant::now();
        self.inner.scheduler.borrow_mut().end_drain(now);
        self.inner.metrics.record_drain(processed, now);
    }
}
