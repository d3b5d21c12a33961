//! Trie match engine.

use crate::node::TrieNode;
use crate::{Match, Params};
use ripple_path::{Literal, ParamValue, Segment, INDEX_PARAM_KEY};
use std::collections::HashSet;
use std::hash::Hash;

pub(crate) struct MatchRun<'t, P> {
    target: &'t [Segment],
    /// Collect payloads registered strictly below the target's destination
    /// node as well.
    include_below: bool,
    results: Vec<Match<P>>,
    seen: HashSet<(P, String)>,
}

impl<'t, P: Clone + Eq + Hash> MatchRun<'t, P> {
    pub fn new(target: &'t [Segment], include_below: bool) -> Self {
        Self { target, include_below, results: Vec::new(), seen: HashSet::new() }
    }

    pub fn run(mut self, root: &TrieNode<P>) -> Vec<Match<P>> {
        self.visit(root, 0, &Params::new());
        self.results
    }

    fn visit(&mut self, node: &TrieNode<P>, cursor: usize, params: &Params) {
        // Deep registrations match any suffix of the cursor position,
        // including the empty one.
        for payload in &node.deep {
            self.push(payload, params);
        }
        if cursor == self.target.len() {
            for payload in &node.end {
                self.push(payload, params);
            }
            if self.include_below {
                self.collect_below(node, params);
            }
            return;
        }

        let seg = &self.target[cursor];
        if let Some(token) = seg.token() {
            if let Some(child) = node.exact.get(&token) {
                self.visit(child, cursor + 1, params);
            }
        }
        if let Some(child) = &node.wc {
            self.visit(child, cursor + 1, params);
        }
        match seg {
            Segment::Param { key, value: ParamValue::Literal(lit) } => {
                if let Some(child) =
                    node.param.get(key).and_then(|by_value| by_value.get(&lit.token()))
                {
                    self.visit(child, cursor + 1, params);
                }
                if let Some(entry) = node.param_any.get(key) {
                    let params = with_param(params, &entry.var, lit.clone());
                    self.visit(&entry.child, cursor + 1, &params);
                }
            }
            Segment::Index(i) => {
                if let Some(entry) = node.param_any.get(INDEX_PARAM_KEY) {
                    let params = with_param(params, &entry.var, Literal::Int(*i as i64));
                    self.visit(&entry.child, cursor + 1, &params);
                }
            }
            _ => {}
        }
    }

    /// Everything registered in the subtree under `node`, excluding the
    /// node's own sets (those belong to the exact match). Variables captured
    /// while descending the prefix are inherited; captures that would bind
    /// deeper stay unbound.
    fn collect_below(&mut self, node: &TrieNode<P>, params: &Params) {
        let mut below = HashSet::new();
        for child in node.exact.values() {
            child.collect_subtree(&mut below);
        }
        if let Some(child) = &node.wc {
            child.collect_subtree(&mut below);
        }
        for by_value in node.param.values() {
            for child in by_value.values() {
                child.collect_subtree(&mut below);
            }
        }
        for entry in node.param_any.values() {
            entry.child.collect_subtree(&mut below);
        }
        for payload in below {
            self.push(&payload, params);
        }
    }

    fn push(&mut self, payload: &P, params: &Params) {
        let key = (payload.clone(), params_key(params));
        if self.seen.insert(key) {
            self.results.push(Match { payload: payload.clone(), params: params.clone() });
        }
    }
}

fn with_param(params: &Params, var: &str, value: Literal) -> Params {
    let mut next = params.clone();
    next.insert(var.to_string(), value);
    next
}

/// Deterministic dedup key for a parameter map.
pub(crate) fn params_key(params: &Params) -> String {
    let mut key = String::new();
    for (name, value) in params {
        key.push_str(name);
        key.push('=');
        key.push_str(&value.token());
        key.push(';');
    }
    key
}
