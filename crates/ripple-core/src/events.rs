//! Consumer-facing events and the metric surface.

use ripple_graph::NodeId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Observable engine events.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    NodeTracked { node: NodeId, key: String },
    NodeNotified { node: NodeId, phase: String, path: String },
    NodesChanged { path: String },
    NodesNotified { path: String, count: usize },
    PhasesReinit,
}

impl AppEvent {
    /// Wire name, used for listener filtering.
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::NodeTracked { .. } => "node:tracked",
            AppEvent::NodeNotified { .. } => "node:notified",
            AppEvent::NodesChanged { .. } => "nodes:changed",
            AppEvent::NodesNotified { .. } => "nodes:notified",
            AppEvent::PhasesReinit => "phases:reinit",
        }
    }
}

type Listener = Rc<dyn Fn(&AppEvent)>;

/// Callback registry. Listeners subscribe by event name or to `"*"`.
#[derive(Default)]
pub(crate) struct Emitter {
    listeners: RefCell<Vec<(String, Listener)>>,
}

impl Emitter {
    pub fn on(&self, name: &str, listener: impl Fn(&AppEvent) + 'static) {
        self.listeners.borrow_mut().push((name.to_string(), Rc::new(listener)));
    }

    pub fn emit(&self, event: &AppEvent) {
        if self.listeners.borrow().is_empty() {
            return;
        }
        // Snapshot so a listener may subscribe re-entrantly.
        let snapshot: Vec<(String, Listener)> = self.listeners.borrow().clone();
        let name = event.name();
        for (filter, listener) in snapshot {
            if filter == "*" || filter == name {
                listener(event);
            }
        }
    }
}

/// Per-second rates sampled over ~1s windows.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsSnapshot {
    /// Drains per second.
    pub updates_per_second: f64,
    /// Events routed per second.
    pub events_per_second: f64,
    /// Node executions per second.
    pub nodes_processed_per_second: f64,
}

/// Rolling counters behind the metric surface.
pub(crate) struct Metrics {
    window_start: Cell<Option<Instant>>,
    updates: Cell<u64>,
    events: Cell<u64>,
    nodes: Cell<u64>,
    last: Cell<MetricsSnapshot>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            window_start: Cell::new(None),
            updates: Cell::new(0),
            events: Cell::new(0),
            nodes: Cell::new(0),
            last: Cell::new(MetricsSnapshot::default()),
        }
    }
}

impl Metrics {
    pub fn record_events(&self, count: u64) {
        self.events.set(self.events.get() + count);
    }

    pub fn record_drain(&self, nodes_processed: u64, now: Instant) {
        self.updates.set(self.updates.get() + 1);
        self.nodes.set(self.nodes.get() + nodes_processed);
        let start = match self.window_start.get() {
            None => {
                self.window_start.set(Some(now));
                return;
            }
            Some(start) => start,
        };
        let elapsed = now.duration_since(start);
        if elapsed >= Duration::from_secs(1) {
            let secs = elapsed.as_secs_f64();
            self.last.set(MetricsSnapshot {
                updates_per_second: self.updates.get() as f64 / secs,
                events_per_second: self.events.get() as f64 / secs,
                nodes_processed_per_second: self.nodes.get() as f64 / secs,
            });
            self.window_start.set(Some(now));
            self.updates.set(0);
            self.events.set(0);
            self.nodes.set(0);
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.last.get()
    }
}
