//! Router: the trie plus versioned result caches.

use crate::matching::MatchRun;
use crate::node::TrieNode;
use crate::Match;
use ripple_path::{ParamValue, ParseError, Path, Segment};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;

pub const DEFAULT_CACHE_CAP: usize = 4096;

/// Stale-version residue in the match/prefix caches is cleared wholesale on
/// every Nth structural bump.
const RESIDUE_CLEAR_PERIOD: u64 = 1024;

struct CacheEntry<T> {
    version: u64,
    value: T,
}

type CacheMap<T> = RefCell<HashMap<String, CacheEntry<T>>>;

/// Pattern-matching trie mapping path masks to payloads.
///
/// Masks may contain wildcards, literal params and placeholder params;
/// targets are concrete paths. Matching never fails: an unparseable target
/// simply matches nothing. Result ordering is undefined; the `match_*`
/// methods return sets or dedup-filtered lists.
pub struct Router<P> {
    root: TrieNode<P>,
    version: u64,
    seg_cache: CacheMap<Rc<Path>>,
    match_cache: CacheMap<HashSet<P>>,
    prefix_cache: CacheMap<HashSet<P>>,
    cap: usize,
}

impl<P: Clone + Eq + Hash> Default for Router<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + Eq + Hash> Router<P> {
    pub fn new() -> Self {
        Self::with_cache_cap(DEFAULT_CACHE_CAP)
    }

    pub fn with_cache_cap(cap: usize) -> Self {
        Self {
            root: TrieNode::default(),
            version: 0,
            seg_cache: RefCell::new(HashMap::new()),
            match_cache: RefCell::new(HashMap::new()),
            prefix_cache: RefCell::new(HashMap::new()),
            cap: cap.max(1),
        }
    }

    /// Current structural version. Bumped by every `add`/`remove`/
    /// `remove_payload`; cache entries from older versions are ignored.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Register `payload` under `mask`. Duplicate registration of the same
    /// `(mask, payload)` is idempotent.
    pub fn add(&mut self, mask: &str, payload: P) -> Result<(), ParseError> {
        let parsed = self.parse_shared(mask)?;
        self.add_path(&parsed, payload);
        Ok(())
    }

    pub fn add_path(&mut self, mask: &Path, payload: P) {
        self.root.add(&mask.segments, payload);
        self.bump();
    }

    /// Remove `payload` at the mask's terminal position, or every payload
    /// registered there when `payload` is `None`.
    pub fn remove(&mut self, mask: &str, payload: Option<&P>) -> Result<bool, ParseError> {
        let parsed = self.parse_shared(mask)?;
        let removed = self.root.remove(&parsed.segments, payload);
        self.bump();
        Ok(removed)
    }

    /// Remove `payload` everywhere it is registered.
    pub fn remove_payload(&mut self, payload: &P) -> bool {
        let removed = self.root.remove_payload_everywhere(payload);
        self.bump();
        removed
    }

    /// All payloads whose masks match `target`.
    pub fn match_path(&self, target: &str) -> HashSet<P> {
        if let Some(hit) = cache_get(&self.match_cache, target, self.version) {
            return hit;
        }
        let Ok(parsed) = self.parse_shared(target) else {
            return HashSet::new();
        };
        let set: HashSet<P> = MatchRun::new(&parsed.segments, false)
            .run(&self.root)
            .into_iter()
            .map(|m| m.payload)
            .collect();
        cache_put(&self.match_cache, target, self.version, set.clone(), self.cap);
        set
    }

    /// As [`match_path`](Self::match_path), with captured placeholder
    /// parameters per payload.
    pub fn match_with_params(&self, target: &str) -> Vec<Match<P>> {
        let Ok(parsed) = self.parse_shared(target) else {
            return Vec::new();
        };
        MatchRun::new(&parsed.segments, false).run(&self.root)
    }

    /// Union of [`match_path`](Self::match_path) with every payload
    /// registered strictly below `target` in the trie.
    pub fn match_including_prefix(&self, target: &str) -> HashSet<P> {
        if let Some(hit) = cache_get(&self.prefix_cache, target, self.version) {
            return hit;
        }
        let Ok(parsed) = self.parse_shared(target) else {
            return HashSet::new();
        };
        let set: HashSet<P> = MatchRun::new(&parsed.segments, true)
            .run(&self.root)
            .into_iter()
            .map(|m| m.payload)
            .collect();
        cache_put(&self.prefix_cache, target, self.version, set.clone(), self.cap);
        set
    }

    /// As [`match_including_prefix`](Self::match_including_prefix), with
    /// captured parameters. Variables captured while descending the prefix
    /// are inherited by below-prefix payloads; deeper captures stay unbound.
    /// Results are deduplicated by `(payload, params)`.
    pub fn match_including_prefix_with_params(&self, target: &str) -> Vec<Match<P>> {
        let Ok(parsed) = self.parse_shared(target) else {
            return Vec::new();
        };
        MatchRun::new(&parsed.segments, true).run(&self.root)
    }

    /// Payloads of the subtree reached by walking `prefix` through exact and
    /// param-literal steps only. A wildcard or placeholder anywhere in the
    /// prefix yields the empty set.
    pub fn collect_by_prefix(&self, prefix: &str) -> HashSet<P> {
        let Ok(parsed) = self.parse_shared(prefix) else {
            return HashSet::new();
        };
        let mut node = &self.root;
        for seg in &parsed.segments {
            let next = match seg {
                Segment::Key(_) | Segment::Index(_) => {
                    let token = seg.token().expect("key/index segments have tokens");
                    node.exact.get(&token)
                }
                Segment::Param { key, value: ParamValue::Literal(lit) } => {
                    node.param.get(key).and_then(|by_value| by_value.get(&lit.token()))
                }
                _ => None,
            };
            match next {
                Some(child) => node = child,
                None => return HashSet::new(),
            }
        }
        let mut out = HashSet::new();
        node.collect_subtree(&mut out);
        out
    }

    fn bump(&mut self) {
        self.version += 1;
        if self.version % RESIDUE_CLEAR_PERIOD == 0 {
            self.match_cache.borrow_mut().clear();
            self.prefix_cache.borrow_mut().clear();
        }
    }

    fn parse_shared(&self, path: &str) -> Result<Rc<Path>, ParseError> {
        if let Some(hit) = self.seg_cache.borrow().get(path) {
            // Parses never go stale; the tag only bounds residue age.
            return Ok(Rc::clone(&hit.value));
        }
        let parsed = Rc::new(Path::parse(path)?);
        cache_put(&self.seg_cache, path, self.version, Rc::clone(&parsed), self.cap);
        Ok(parsed)
    }
}

fn cache_get<T: Clone>(cache: &CacheMap<T>, key: &str, version: u64) -> Option<T> {
    let map = cache.borrow();
    let entry = map.get(key)?;
    (entry.version == version).then(|| entry.value.clone())
}

fn cache_put<T>(cache: &CacheMap<T>, key: &str, version: u64, value: T, cap: usize) {
    let mut map = cache.borrow_mut();
    if map.len() >= cap {
        map.clear();
    }
    map.insert(key.to_string(), CacheEntry { version, value });
}
