//! Per-phase dirty queue: priority buckets over an integer min-heap.

use crate::heap::IntMinHeap;
use crate::phase::PhaseEvent;
use ripple_graph::NodeId;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

/// Scale factor separating depth from weight in the priority index:
/// `priority = depth * SCALE - weight`. Nodes order by depth ascending,
/// then weight descending. Weights must stay below the scale.
pub const PRIORITY_SCALE: i64 = 1 << 20;

/// `depth` is signed: upward-traversal phases pass a negated depth so the
/// deepest node drains first.
pub(crate) fn priority_index(depth: i64, weight: i64) -> i64 {
    depth * PRIORITY_SCALE - weight
}

/// Dirty state of one phase for the current tick.
#[derive(Debug, Default)]
pub(crate) struct DirtyQueue {
    buckets: HashMap<i64, VecDeque<NodeId>>,
    heap: IntMinHeap,
    in_heap: HashSet<i64>,
    events: HashMap<NodeId, Vec<Rc<PhaseEvent>>>,
}

impl DirtyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Append `node` to the bucket for `priority`, registering the priority
    /// in the heap once.
    pub fn push(&mut self, priority: i64, node: NodeId) {
        self.buckets.entry(priority).or_default().push_back(node);
        if self.in_heap.insert(priority) {
            self.heap.push(priority);
        }
    }

    /// Record an event for `node`, kept in occurrence order for the tick.
    pub fn record_event(&mut self, node: NodeId, event: Rc<PhaseEvent>) {
        self.events.entry(node).or_default().push(event);
    }

    /// Next node in ascending-priority, insertion order; with its events.
    /// Exhausted buckets leave the heap as they empty.
    pub fn pop_next(&mut self) -> Option<(NodeId, Vec<Rc<PhaseEvent>>)> {
        loop {
            let priority = self.heap.peek()?;
            let Some(bucket) = self.buckets.get_mut(&priority) else {
                self.heap.pop();
                self.in_heap.remove(&priority);
                continue;
            };
            match bucket.pop_front() {
                Some(node) => {
                    if bucket.is_empty() {
                        self.buckets.remove(&priority);
                        self.heap.pop();
                        self.in_heap.remove(&priority);
                    }
                    let events = self.events.remove(&node).unwrap_or_default();
                    return Some((node, events));
                }
                None => {
                    self.buckets.remove(&priority);
                    self.heap.pop();
                    self.in_heap.remove(&priority);
                }
            }
        }
    }

    /// Snapshot every node in drain order and reset the queue (batched
    /// executors get one call over the whole tick).
    pub fn take_all(&mut self) -> Vec<(NodeId, Vec<Rc<PhaseEvent>>)> {
        let mut out = Vec::new();
        while let Some(entry) = self.pop_next() {
            out.push(entry);
        }
        self.clear();
        out
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.heap.clear();
        self.in_heap.clear();
        self.events.clear();
    }
}
