//! Reactivity glue: signals, computed values, effects and watches.
//!
//! Thin adapters over `track`, `set` and `get`. Each primitive is a graph
//! node in one of four reserved phases, appended after any user-defined
//! phases and filtered by node kind:
//!
//! | phase | traversal | kind |
//! |---|---|---|
//! | `__signals` | dirty-only | `signal` |
//! | `__computed` | dirty-and-down | `computed` |
//! | `__effects` | dirty-only | `effect` |
//! | `__watches` | dirty-only | `watch` |

use crate::app::{App, TrackOptions};
use crate::phase::{PhaseCtx, PhaseDef};
use ripple_adapter::AdapterError;
use ripple_graph::{NodeId, Traversal};
use serde_json::Value;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::warn;

pub const SIGNALS_PHASE: &str = "__signals";
pub const COMPUTED_PHASE: &str = "__computed";
pub const EFFECTS_PHASE: &str = "__effects";
pub const WATCHES_PHASE: &str = "__watches";

#[derive(Clone)]
pub(crate) struct ComputeEntry {
    target: String,
    f: Rc<dyn Fn(&App) -> Value>,
}

/// Per-node callbacks behind the reserved phases.
#[derive(Default)]
pub(crate) struct ReactiveRegistry {
    installed: bool,
    computes: HashMap<NodeId, ComputeEntry>,
    effects: HashMap<NodeId, Rc<dyn Fn(&App)>>,
    watches: HashMap<NodeId, Rc<dyn Fn(&App, &PhaseCtx)>>,
}

impl ReactiveRegistry {
    pub fn remove(&mut self, id: NodeId) {
        self.computes.remove(&id);
        self.effects.remove(&id);
        self.watches.remove(&id);
    }
}

/// Install the reserved phases on first use.
fn ensure_installed(app: &App) {
    if app.inner.reactive.borrow().installed {
        return;
    }
    app.inner.reactive.borrow_mut().installed = true;
    app.install_builtin_phases(vec![
        PhaseDef::each(SIGNALS_PHASE, ["*"], |_app, _ctx| {}).with_kinds(["signal"]),
        PhaseDef::each(COMPUTED_PHASE, ["*"], |app: &App, ctx: PhaseCtx| {
            let entry = app.inner.reactive.borrow().computes.get(&ctx.node).cloned();
            if let Some(entry) = entry {
                let value = (entry.f)(app);
                if let Err(err) = app.set(&entry.target, value) {
                    warn!(node = %ctx.key, %err, "computed target write failed");
                }
            }
        })
        .with_traversal(Traversal::DirtyAndDown)
        .with_kinds(["computed"]),
        PhaseDef::each(EFFECTS_PHASE, ["*"], |app: &App, ctx: PhaseCtx| {
            let f = app.inner.reactive.borrow().effects.get(&ctx.node).cloned();
            if let Some(f) = f {
                f(app);
            }
        })
        .with_kinds(["effect"]),
        PhaseDef::each(WATCHES_PHASE, ["*"], |app: &App, ctx: PhaseCtx| {
            let f = app.inner.reactive.borrow().watches.get(&ctx.node).cloned();
            if let Some(f) = f {
                f(app, &ctx);
            }
        })
        .with_kinds(["watch"]),
    ]);
}

/// Deep mask covering a path and everything under it.
fn deep_mask(path: &str) -> String {
    if path.is_empty() {
        "*".to_string()
    } else {
        format!("{path}.*")
    }
}

/// A value cell backed by a document path.
pub struct Signal {
    app: App,
    key: String,
    path: String,
    node: NodeId,
}

impl Signal {
    pub fn new(app: &App, key: &str, path: &str, initial: Value) -> Result<Signal, AdapterError> {
        ensure_installed(app);
        app.set(path, initial)?;
        let node = app.track_with(
            key,
            &[deep_mask(path).as_str()],
            TrackOptions { weight: 0, kind: Some("signal".into()), meta: Value::Null },
        );
        Ok(Signal { app: app.clone(), key: key.to_string(), path: path.to_string(), node })
    }

    pub fn get(&self) -> Value {
        self.app.get(&self.path).ok().flatten().unwrap_or(Value::Null)
    }

    pub fn set(&self, value: Value) -> Result<(), AdapterError> {
        self.app.set(&self.path, value)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

/// A signal whose value is recomputed from its dependencies, once per
/// drain, and written to its target path.
pub struct Computed {
    app: App,
    target: String,
    node: NodeId,
}

impl Computed {
    pub fn new(
        app: &App,
        key: &str,
        target: &str,
        deps: &[&Signal],
        f: impl Fn(&App) -> Value + 'static,
    ) -> Result<Computed, AdapterError> {
        ensure_installed(app);
        let masks: Vec<String> = deps.iter().map(|dep| deep_mask(dep.path())).collect();
        let mask_refs: Vec<&str> = masks.iter().map(String::as_str).collect();
        let node = app.track_with(
            key,
            &mask_refs,
            TrackOptions { weight: 0, kind: Some("computed".into()), meta: Value::Null },
        );
        for dep in deps {
            app.link_nodes(dep.node(), node);
        }
        let entry = ComputeEntry { target: target.to_string(), f: Rc::new(f) };
        app.inner.reactive.borrow_mut().computes.insert(node, entry.clone());
        let initial = (entry.f)(app);
        app.set(target, initial)?;
        Ok(Computed { app: app.clone(), target: target.to_string(), node })
    }

    pub fn get(&self) -> Value {
        self.app.get(&self.target).ok().flatten().unwrap_or(Value::Null)
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn stop(&self) {
        self.app.untrack_node(self.node);
    }
}

/// A callback node re-run whenever one of its masks is hit.
pub struct Effect {
    app: App,
    node: NodeId,
}

impl Effect {
    pub fn new(app: &App, key: &str, masks: &[&str], f: impl Fn(&App) + 'static) -> Effect {
        ensure_installed(app);
        let node = app.track_with(
            key,
            masks,
            TrackOptions { weight: 0, kind: Some("effect".into()), meta: Value::Null },
        );
        let f: Rc<dyn Fn(&App)> = Rc::new(f);
        app.inner.reactive.borrow_mut().effects.insert(node, Rc::clone(&f));
        // First run happens at creation, like any reactive effect.
        f(app);
        Effect { app: app.clone(), node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn stop(&self) {
        self.app.untrack_node(self.node);
    }
}

/// A mask subscription delivering events (with captured params) to a
/// callback.
pub struct Watch {
    app: App,
    node: NodeId,
}

impl Watch {
    pub fn new(
        app: &App,
        key: &str,
        mask: &str,
        f: impl Fn(&App, &PhaseCtx) + 'static,
    ) -> Watch {
        ensure_installed(app);
        let node = app.track_with(
            key,
            &[mask],
            TrackOptions { weight: 0, kind: Some("watch".into()), meta: Value::Null },
        );
        app.inner.reactive.borrow_mut().watches.insert(node, Rc::new(f));
        Watch { app: app.clone(), node }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn stop(&self) {
        self.app.untrack_node(self.node);
    }
}
