//! Trie node storage and structural mutation.

use ripple_path::{ParamValue, Segment};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Placeholder child: the subtree plus the variable name the actual value is
/// captured under.
#[derive(Debug, Clone)]
pub(crate) struct ParamAnyChild<P> {
    pub child: Box<TrieNode<P>>,
    pub var: String,
}

/// One node of the pattern trie.
///
/// `Key` and `Index` steps share the `exact` map through their type-prefixed
/// tokens. Literal params live under `param` keyed by param key then value
/// token; placeholder params under `param_any` (index placeholders under the
/// synthetic `$index` key). Payloads terminate at `end`, or at `deep` for
/// masks whose final segment is a deep wildcard.
#[derive(Debug, Clone)]
pub(crate) struct TrieNode<P> {
    pub exact: HashMap<String, TrieNode<P>>,
    pub wc: Option<Box<TrieNode<P>>>,
    pub param: HashMap<String, HashMap<String, TrieNode<P>>>,
    pub param_any: HashMap<String, ParamAnyChild<P>>,
    pub end: HashSet<P>,
    pub deep: HashSet<P>,
}

impl<P> Default for TrieNode<P> {
    fn default() -> Self {
        Self {
            exact: HashMap::new(),
            wc: None,
            param: HashMap::new(),
            param_any: HashMap::new(),
            end: HashSet::new(),
            deep: HashSet::new(),
        }
    }
}

impl<P: Clone + Eq + Hash> TrieNode<P> {
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
            && self.wc.is_none()
            && self.param.is_empty()
            && self.param_any.is_empty()
            && self.end.is_empty()
            && self.deep.is_empty()
    }

    /// Walk the mask creating nodes, and attach `payload` at the terminal
    /// position. A trailing deep wildcard attaches to `deep` at the node
    /// *before* it.
    pub fn add(&mut self, mask: &[Segment], payload: P) {
        let (steps, deep) = split_deep(mask);
        let mut node = self;
        for seg in steps {
            node = node.child_mut(seg);
        }
        if deep {
            node.deep.insert(payload);
        } else {
            node.end.insert(payload);
        }
    }

    /// Remove `payload` (or the whole set when `None`) at the mask's
    /// terminal position. Returns `true` when anything was removed. Empty
    /// nodes are pruned on unwind.
    pub fn remove(&mut self, mask: &[Segment], payload: Option<&P>) -> bool {
        let (steps, deep) = split_deep(mask);
        self.remove_at(steps, deep, payload)
    }

    fn remove_at(&mut self, steps: &[Segment], deep: bool, payload: Option<&P>) -> bool {
        let Some((seg, rest)) = steps.split_first() else {
            let set = if deep { &mut self.deep } else { &mut self.end };
            return match payload {
                Some(p) => set.remove(p),
                None => {
                    let had = !set.is_empty();
                    set.clear();
                    had
                }
            };
        };
        let mut removed = false;
        match seg {
            Segment::Key(_) | Segment::Index(_) => {
                let token = seg.token().expect("key/index segments have tokens");
                if let Some(child) = self.exact.get_mut(&token) {
                    removed = child.remove_at(rest, deep, payload);
                    if child.is_empty() {
                        self.exact.remove(&token);
                    }
                }
            }
            Segment::Wildcard { .. } => {
                if let Some(child) = self.wc.as_mut() {
                    removed = child.remove_at(rest, deep, payload);
                    if child.is_empty() {
                        self.wc = None;
                    }
                }
            }
            Segment::Param { key, value: ParamValue::Literal(lit) } => {
                let token = lit.token();
                if let Some(by_value) = self.param.get_mut(key) {
                    if let Some(child) = by_value.get_mut(&token) {
                        removed = child.remove_at(rest, deep, payload);
                        if child.is_empty() {
                            by_value.remove(&token);
                        }
                    }
                    if by_value.is_empty() {
                        self.param.remove(key);
                    }
                }
            }
            Segment::Param { key, value: ParamValue::Placeholder(_) } => {
                if let Some(entry) = self.param_any.get_mut(key) {
                    removed = entry.child.remove_at(rest, deep, payload);
                    if entry.child.is_empty() {
                        self.param_any.remove(key);
                    }
                }
            }
        }
        removed
    }

    /// DFS removal of `payload` from every `end` and `deep` set. Returns
    /// `true` when at least one occurrence was removed.
    pub fn remove_payload_everywhere(&mut self, payload: &P) -> bool {
        let mut removed = self.end.remove(payload);
        removed |= self.deep.remove(payload);
        self.exact.retain(|_, child| {
            removed |= child.remove_payload_everywhere(payload);
            !child.is_empty()
        });
        if let Some(child) = self.wc.as_mut() {
            removed |= child.remove_payload_everywhere(payload);
            if child.is_empty() {
                self.wc = None;
            }
        }
        self.param.retain(|_, by_value| {
            by_value.retain(|_, child| {
                removed |= child.remove_payload_everywhere(payload);
                !child.is_empty()
            });
            !by_value.is_empty()
        });
        self.param_any.retain(|_, entry| {
            removed |= entry.child.remove_payload_everywhere(payload);
            !entry.child.is_empty()
        });
        removed
    }

    /// All payloads in this subtree, `end` and `deep` alike, the node's own
    /// included.
    pub fn collect_subtree(&self, out: &mut HashSet<P>) {
        out.extend(self.end.iter().cloned());
        out.extend(self.deep.iter().cloned());
        for child in self.exact.values() {
            child.collect_subtree(out);
        }
        if let Some(child) = &self.wc {
            child.collect_subtree(out);
        }
        for by_value in self.param.values() {
            for child in by_value.values() {
                child.collect_subtree(out);
            }
        }
        for entry in self.param_any.values() {
            entry.child.collect_subtree(out);
        }
    }

    fn child_mut(&mut self, seg: &Segment) -> &mut TrieNode<P> {
        match seg {
            Segment::Key(_) | Segment::Index(_) => {
                let token = seg.token().expect("key/index segments have tokens");
                self.exact.entry(token).or_default()
            }
            Segment::Wildcard { .. } => self.wc.get_or_insert_with(Default::default),
            Segment::Param { key, value: ParamValue::Literal(lit) } => self
                .param
                .entry(key.clone())
                .or_default()
                .entry(lit.token())
                .or_default(),
            Segment::Param { key, value: ParamValue::Placeholder(var) } => {
                let entry = self.param_any.entry(key.clone()).or_insert_with(|| ParamAnyChild {
                    child: Box::default(),
                    var: var.clone(),
                });
                // Last registration wins for the capture name.
                entry.var = var.clone();
                &mut entry.child
            }
        }
    }
}

/// Split off a trailing deep wildcard; it is a property of the node the
/// preceding steps arrive at, not a step of its own.
fn split_deep(mask: &[Segment]) -> (&[Segment], bool) {
    match mask.last() {
        Some(seg) if seg.is_deep() => (&mask[..mask.len() - 1], true),
        _ => (mask, false),
    }
}
