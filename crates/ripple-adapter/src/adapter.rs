//! Tree adapter: path-addressed CRUD over a dynamic document.

use crate::error::AdapterError;
use crate::index::IndexStore;
use crate::{AdapterOptions, ArrayDelete};
use ripple_path::{
    Literal, ParamValue, ParseOptions, Path, PathCache, Segment, Vars,
};
use serde_json::{Map, Value};
use std::rc::Rc;

/// Data-adapter contract consumed by the app façade.
///
/// Paths arrive as strings; `vars` resolves `$name` placeholders in key,
/// index and param-value positions. `get` clones the addressed value; the
/// mutating operations report structural misuse via [`AdapterError`].
pub trait DataAdapter {
    fn get(&mut self, path: &str, vars: Option<&Vars>) -> Result<Option<Value>, AdapterError>;
    fn set(&mut self, path: &str, value: Value, vars: Option<&Vars>)
        -> Result<(), AdapterError>;
    fn merge(&mut self, path: &str, value: Value, vars: Option<&Vars>)
        -> Result<(), AdapterError>;
    fn delete(&mut self, path: &str, vars: Option<&Vars>) -> Result<(), AdapterError>;
    /// Element index addressed by a trailing `Index` or `Param` segment;
    /// `-1` when any step cannot be resolved or the question does not apply.
    fn index_of(&mut self, path: &str, vars: Option<&Vars>) -> i64;
    fn root(&self) -> &Value;
}

/// Default adapter: a `serde_json::Value` tree plus the secondary array
/// index.
pub struct TreeAdapter {
    doc: Value,
    index: IndexStore,
    opts: AdapterOptions,
    cache: PathCache,
}

impl Default for TreeAdapter {
    fn default() -> Self {
        Self::new(AdapterOptions::default())
    }
}

impl TreeAdapter {
    pub fn new(opts: AdapterOptions) -> Self {
        Self {
            doc: Value::Object(Map::new()),
            index: IndexStore::new(opts.index_enabled, opts.index_strategy),
            opts,
            cache: PathCache::default(),
        }
    }

    pub fn with_document(opts: AdapterOptions, doc: Value) -> Self {
        let mut adapter = Self::new(opts);
        adapter.doc = doc;
        adapter
    }

    fn parse(&self, path: &str, vars: Option<&Vars>) -> Result<Rc<Path>, AdapterError> {
        match vars {
            None => Ok(self.cache.parse(path)?),
            Some(vars) => Ok(Rc::new(Path::parse_with(
                path,
                ParseOptions { vars: Some(vars), wildcard_dynamic: false },
            )?)),
        }
    }
}

impl DataAdapter for TreeAdapter {
    fn get(&mut self, path: &str, vars: Option<&Vars>) -> Result<Option<Value>, AdapterError> {
        let parsed = self.parse(path, vars)?;
        let Self { doc, index, .. } = self;
        Ok(read(doc, index, &parsed.segments)?.cloned())
    }

    fn set(&mut self, path: &str, value: Value, vars: Option<&Vars>)
        -> Result<(), AdapterError>
    {
        let parsed = self.parse(path, vars)?;
        if parsed.segments.is_empty() {
            self.doc = value;
            self.index.clear();
            return Ok(());
        }
        let Self { doc, index, opts, .. } = self;
        write(doc, index, opts, &parsed.segments, value)
    }

    fn merge(&mut self, path: &str, value: Value, vars: Option<&Vars>)
        -> Result<(), AdapterError>
    {
        let parsed = self.parse(path, vars)?;
        {
            let Self { doc, index, .. } = self;
            if let Some(target) = resolve_mut(doc, index, &parsed.segments)? {
                if let (Value::Object(current), Value::Object(incoming)) = (target, &value) {
                    for (key, val) in incoming {
                        current.insert(key.clone(), val.clone());
                    }
                    return Ok(());
                }
            }
        }
        self.set(path, value, vars)
    }

    fn delete(&mut self, path: &str, vars: Option<&Vars>) -> Result<(), AdapterError> {
        let parsed = self.parse(path, vars)?;
        if parsed.segments.is_empty() {
            self.doc = Value::Null;
            self.index.clear();
            return Ok(());
        }
        let Self { doc, index, opts, .. } = self;
        remove(doc, index, opts, &parsed.segments)
    }

    fn index_of(&mut self, path: &str, vars: Option<&Vars>) -> i64 {
        let Ok(parsed) = self.parse(path, vars) else { return -1 };
        let Self { doc, index, .. } = self;
        element_index(doc, index, &parsed.segments)
    }

    fn root(&self) -> &Value {
        &self.doc
    }
}

// ── Shared walk helpers ───────────────────────────────────────────────────

/// Container to create for the step that follows.
fn container_for(next: Option<&Segment>) -> Value {
    match next {
        Some(Segment::Index(_))
        | Some(Segment::Param { .. })
        | Some(Segment::Wildcard { as_index: true, .. }) => Value::Array(Vec::new()),
        _ => Value::Object(Map::new()),
    }
}

fn literal_of(value: &ParamValue) -> Result<Literal, AdapterError> {
    match value {
        ParamValue::Literal(lit) => Ok(lit.clone()),
        ParamValue::Placeholder(name) => {
            Err(AdapterError::UnresolvedPlaceholder(name.clone()))
        }
    }
}

/// Element lookup by `(key, value)`: through the secondary index when
/// enabled, by scanning otherwise. Both find the last matching element.
fn find_element(
    index: &mut IndexStore,
    array_path: &str,
    arr: &[Value],
    key: &str,
    lit: &Literal,
) -> Option<usize> {
    if index.enabled() {
        index.lookup(array_path, arr, key, lit)
    } else {
        arr.iter()
            .rposition(|el| el.get(key).is_some_and(|v| lit.matches_value(v)))
    }
}

fn push_step(path: &mut String, seg: &str) {
    path.push_str(seg);
}

// ── Read path ─────────────────────────────────────────────────────────────

fn read<'a>(
    doc: &'a Value,
    index: &mut IndexStore,
    segments: &[Segment],
) -> Result<Option<&'a Value>, AdapterError> {
    let mut cur = doc;
    let mut path = String::new();
    for (i, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Wildcard { .. } => {
                return Err(AdapterError::WildcardInPath(Path::new(segments.to_vec()).to_string()))
            }
            Segment::Key(name) => {
                let Value::Object(map) = cur else { return Ok(None) };
                let Some(child) = map.get(name) else { return Ok(None) };
                if i > 0 {
                    push_step(&mut path, ".");
                }
                push_step(&mut path, name);
                cur = child;
            }
            Segment::Index(n) => {
                let Value::Array(arr) = cur else { return Ok(None) };
                let Some(child) = arr.get(*n) else { return Ok(None) };
                push_step(&mut path, &format!("[{n}]"));
                cur = child;
            }
            Segment::Param { key, value } => {
                let Value::Array(arr) = cur else {
                    return Err(AdapterError::ParamOnNonArray { key: key.clone() });
                };
                let lit = literal_of(value)?;
                let Some(idx) = find_element(index, &path, arr, key, &lit) else {
                    return Ok(None);
                };
                let Some(child) = arr.get(idx) else { return Ok(None) };
                push_step(&mut path, &format!("[{idx}]"));
                cur = child;
            }
        }
    }
    Ok(Some(cur))
}

/// Mutable navigation to an existing value; `None` when any step is absent.
/// Never creates.
fn resolve_mut<'a>(
    doc: &'a mut Value,
    index: &mut IndexStore,
    segments: &[Segment],
) -> Result<Option<&'a mut Value>, AdapterError> {
    let mut cur = doc;
    let mut path = String::new();
    for (i, seg) in segments.iter().enumerate() {
        match seg {
            Segment::Wildcard { .. } => {
                return Err(AdapterError::WildcardInPath(Path::new(segments.to_vec()).to_string()))
            }
            Segment::Key(name) => {
                let Value::Object(map) = cur else { return Ok(None) };
                let Some(child) = map.get_mut(name) else { return Ok(None) };
                if i > 0 {
                    push_step(&mut path, ".");
                }
                push_step(&mut path, name);
                cur = child;
            }
            Segment::Index(n) => {
                let Value::Array(arr) = cur else { return Ok(None) };
                let Some(child) = arr.get_mut(*n) else { return Ok(None) };
                push_step(&mut path, &format!("[{n}]"));
                cur = child;
            }
            Segment::Param { key, value } => {
                let Value::Array(arr) = cur else {
                    return Err(AdapterError::ParamOnNonArray { key: key.clone() });
                };
                let lit = literal_of(value)?;
                let Some(idx) = find_element(index, &path, arr, key, &lit) else {
                    return Ok(None);
                };
                let Some(child) = arr.get_mut(idx) else { return Ok(None) };
                push_step(&mut path, &format!("[{idx}]"));
                cur = child;
            }
        }
    }
    Ok(Some(cur))
}

// ── Write path ────────────────────────────────────────────────────────────

fn write(
    doc: &mut Value,
    index: &mut IndexStore,
    opts: &AdapterOptions,
    segments: &[Segment],
    value: Value,
) -> Result<(), AdapterError> {
    let (leaf, parents) = segments.split_last().expect("empty path handled by caller");
    let mut cur = doc;
    let mut path = String::new();
    for (i, seg) in parents.iter().enumerate() {
        let next = segments.get(i + 1);
        cur = descend_create(cur, seg, next, index, &mut path, opts, i == 0)?;
    }
    apply_leaf(cur, leaf, value, index, &path, opts)
}

/// One creating step of the write walk. `Null` is treated as absent and is
/// replaced by the container the next step needs.
fn descend_create<'a>(
    cur: &'a mut Value,
    seg: &Segment,
    next: Option<&Segment>,
    index: &mut IndexStore,
    path: &mut String,
    opts: &AdapterOptions,
    first: bool,
) -> Result<&'a mut Value, AdapterError> {
    match seg {
        Segment::Wildcard { .. } => Err(AdapterError::WildcardInPath(path.clone())),
        Segment::Key(name) => {
            if cur.is_null() && opts.auto_create {
                *cur = Value::Object(Map::new());
            }
            let Value::Object(map) = cur else {
                return Err(AdapterError::MissingContainer(path.clone()));
            };
            if !map.contains_key(name) {
                if !opts.auto_create {
                    return Err(AdapterError::MissingContainer(format!("{path}.{name}")));
                }
                map.insert(name.clone(), container_for(next));
            }
            if !first {
                push_step(path, ".");
            }
            push_step(path, name);
            Ok(map.get_mut(name).expect("inserted above"))
        }
        Segment::Index(n) => {
            if cur.is_null() && opts.auto_create {
                *cur = Value::Array(Vec::new());
            }
            let Value::Array(arr) = cur else {
                return Err(AdapterError::MissingContainer(path.clone()));
            };
            if *n >= arr.len() || arr[*n].is_null() {
                if !opts.auto_create {
                    return Err(AdapterError::MissingContainer(format!("{path}[{n}]")));
                }
                while arr.len() <= *n {
                    arr.push(Value::Null);
                }
                arr[*n] = container_for(next);
                // Creating an element positionally can shadow many
                // (key, value) → index tuples.
                index.invalidate(path);
            }
            push_step(path, &format!("[{n}]"));
            Ok(&mut arr[*n])
        }
        Segment::Param { key, value } => {
            if cur.is_null() && opts.auto_create {
                *cur = Value::Array(Vec::new());
            }
            let Value::Array(arr) = cur else {
                return Err(AdapterError::ParamOnNonArray { key: key.clone() });
            };
            let lit = literal_of(value)?;
            let idx = match find_element(index, path, arr, key, &lit) {
                Some(idx) => idx,
                None => {
                    if !opts.auto_create {
                        return Err(AdapterError::ParamNotFound {
                            key: key.clone(),
                            value: lit.to_string(),
                        });
                    }
                    let mut element = Map::new();
                    element.insert(key.clone(), lit.to_value());
                    arr.push(Value::Object(element));
                    let idx = arr.len() - 1;
                    index.insert_element(path, &arr[idx], idx);
                    idx
                }
            };
            push_step(path, &format!("[{idx}]"));
            Ok(&mut arr[idx])
        }
    }
}

fn apply_leaf(
    parent: &mut Value,
    leaf: &Segment,
    value: Value,
    index: &mut IndexStore,
    path: &str,
    opts: &AdapterOptions,
) -> Result<(), AdapterError> {
    match leaf {
        Segment::Wildcard { .. } => Err(AdapterError::WildcardInPath(path.to_string())),
        Segment::Key(name) => {
            if parent.is_null() && opts.auto_create {
                *parent = Value::Object(Map::new());
            }
            let Value::Object(map) = parent else {
                return Err(AdapterError::MissingContainer(path.to_string()));
            };
            map.insert(name.clone(), value);
            Ok(())
        }
        Segment::Index(n) => {
            if parent.is_null() && opts.auto_create {
                *parent = Value::Array(Vec::new());
            }
            let Value::Array(arr) = parent else {
                return Err(AdapterError::MissingContainer(path.to_string()));
            };
            if *n >= arr.len() {
                if !opts.auto_create {
                    return Err(AdapterError::MissingContainer(format!("{path}[{n}]")));
                }
                while arr.len() <= *n {
                    arr.push(Value::Null);
                }
            }
            arr[*n] = value;
            // Positional replacement can change many (key, value) → index
            // tuples at once.
            index.invalidate(path);
            Ok(())
        }
        Segment::Param { key, value: pv } => {
            if parent.is_null() && opts.auto_create {
                *parent = Value::Array(Vec::new());
            }
            let Value::Array(arr) = parent else {
                return Err(AdapterError::ParamOnNonArray { key: key.clone() });
            };
            let Value::Object(incoming) = value else {
                return Err(AdapterError::ParamValueNotMapping);
            };
            let lit = literal_of(pv)?;
            match find_element(index, path, arr, key, &lit) {
                Some(idx) => {
                    let Value::Object(element) = &mut arr[idx] else {
                        return Err(AdapterError::ParamTargetNotMapping);
                    };
                    element.clear();
                    for (k, v) in incoming {
                        element.insert(k, v);
                    }
                    element.insert(key.clone(), lit.to_value());
                    index.invalidate(&format!("{path}[{idx}]"));
                    index.upsert(path, key, &lit, idx);
                    Ok(())
                }
                None => {
                    if !opts.auto_create {
                        return Err(AdapterError::ParamNotFound {
                            key: key.clone(),
                            value: lit.to_string(),
                        });
                    }
                    let mut element = incoming;
                    element.insert(key.clone(), lit.to_value());
                    arr.push(Value::Object(element));
                    let idx = arr.len() - 1;
                    index.insert_element(path, &arr[idx], idx);
                    index.upsert(path, key, &lit, idx);
                    Ok(())
                }
            }
        }
    }
}

// ── Delete path ───────────────────────────────────────────────────────────

fn remove(
    doc: &mut Value,
    index: &mut IndexStore,
    opts: &AdapterOptions,
    segments: &[Segment],
) -> Result<(), AdapterError> {
    let (leaf, parents) = segments.split_last().expect("empty path handled by caller");
    let mut cur = doc;
    let mut path = String::new();
    for (i, seg) in parents.iter().enumerate() {
        match step_existing(cur, seg, index, &mut path, i == 0)? {
            Some(child) => cur = child,
            None if opts.auto_create => return Ok(()),
            // Without auto-create the caller addressed a container that
            // should have existed.
            None => return Err(AdapterError::MissingContainer(path)),
        }
    }
    delete_leaf(cur, leaf, index, &path, opts)
}

/// One non-creating step. `Ok(None)` means the step is absent.
fn step_existing<'a>(
    cur: &'a mut Value,
    seg: &Segment,
    index: &mut IndexStore,
    path: &mut String,
    first: bool,
) -> Result<Option<&'a mut Value>, AdapterError> {
    match seg {
        Segment::Wildcard { .. } => Err(AdapterError::WildcardInPath(path.clone())),
        Segment::Key(name) => {
            let Value::Object(map) = cur else { return Ok(None) };
            let Some(child) = map.get_mut(name) else { return Ok(None) };
            if !first {
                push_step(path, ".");
            }
            push_step(path, name);
            Ok(Some(child))
        }
        Segment::Index(n) => {
            let Value::Array(arr) = cur else { return Ok(None) };
            let Some(child) = arr.get_mut(*n) else { return Ok(None) };
            push_step(path, &format!("[{n}]"));
            Ok(Some(child))
        }
        Segment::Param { key, value } => {
            let Value::Array(arr) = cur else {
                return Err(AdapterError::ParamOnNonArray { key: key.clone() });
            };
            let lit = literal_of(value)?;
            let Some(idx) = find_element(index, path, arr, key, &lit) else {
                return Ok(None);
            };
            let Some(child) = arr.get_mut(idx) else { return Ok(None) };
            push_step(path, &format!("[{idx}]"));
            Ok(Some(child))
        }
    }
}

fn delete_leaf(
    parent: &mut Value,
    leaf: &Segment,
    index: &mut IndexStore,
    path: &str,
    opts: &AdapterOptions,
) -> Result<(), AdapterError> {
    match leaf {
        Segment::Wildcard { .. } => Err(AdapterError::WildcardInPath(path.to_string())),
        Segment::Key(name) => {
            if let Value::Object(map) = parent {
                map.remove(name);
            }
            Ok(())
        }
        Segment::Index(n) => {
            let Value::Array(arr) = parent else { return Ok(()) };
            if *n >= arr.len() {
                return Ok(());
            }
            match opts.array_delete {
                ArrayDelete::Splice => {
                    arr.remove(*n);
                }
                ArrayDelete::Unset => arr[*n] = Value::Null,
            }
            index.invalidate(path);
            Ok(())
        }
        Segment::Param { key, value } => {
            let Value::Array(arr) = parent else {
                return Err(AdapterError::ParamOnNonArray { key: key.clone() });
            };
            let lit = literal_of(value)?;
            let Some(idx) = find_element(index, path, arr, key, &lit) else {
                return Ok(());
            };
            match opts.array_delete {
                ArrayDelete::Splice => {
                    arr.remove(idx);
                    index.invalidate(path);
                }
                ArrayDelete::Unset => {
                    arr[idx] = Value::Null;
                    index.unset_value(path, key, &lit);
                    index.invalidate(&format!("{path}[{idx}]"));
                }
            }
            Ok(())
        }
    }
}

// ── index_of ──────────────────────────────────────────────────────────────

fn element_index(doc: &Value, index: &mut IndexStore, segments: &[Segment]) -> i64 {
    let Some((leaf, parents)) = segments.split_last() else { return -1 };
    let mut cur = doc;
    let mut path = String::new();
    for (i, seg) in parents.iter().enumerate() {
        let stepped = match seg {
            Segment::Key(name) => {
                let child = cur.get(name.as_str());
                if child.is_some() {
                    if i > 0 {
                        push_step(&mut path, ".");
                    }
                    push_step(&mut path, name);
                }
                child
            }
            Segment::Index(n) => {
                let child = cur.get(*n);
                if child.is_some() {
                    push_step(&mut path, &format!("[{n}]"));
                }
                child
            }
            Segment::Param { key, value } => {
                let Value::Array(arr) = cur else { return -1 };
                let Ok(lit) = literal_of(value) else { return -1 };
                match find_element(index, &path, arr, key, &lit) {
                    Some(idx) => {
                        let child = arr.get(idx);
                        if child.is_some() {
                            push_step(&mut path, &format!("[{idx}]"));
                        }
                        child
                    }
                    None => return -1,
                }
            }
            Segment::Wildcard { .. } => return -1,
        };
        match stepped {
            Some(child) => cur = child,
            None => return -1,
        }
    }
    match leaf {
        Segment::Index(n) => *n as i64,
        Segment::Param { key, value } => {
            let Value::Array(arr) = cur else { return -1 };
            let Ok(lit) = literal_of(value) else { return -1 };
            find_element(index, &path, arr, key, &lit).map_or(-1, |idx| idx as i64)
        }
        _ => -1,
    }
}
