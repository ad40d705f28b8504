//! Path-addressed configuration tree.
//!
//! A `Configuration` owns a nested map of raw values (`serde_json::Value`)
//! addressed by dotted paths. Every stored node is exactly one of a scalar,
//! an ordered sequence or a nested section; nulls are never stored, setting a
//! path to null removes it.
//!
//! ## Invariants
//! - Keys keep insertion order at every level (re-saving a file keeps the
//!   author's layout).
//! - Removing a leaf prunes every ancestor section that becomes empty, so no
//!   orphan empty sections survive a deletion.
//! - `set` creates intermediate sections on demand and replaces any scalar or
//!   sequence standing in the way.
//!
//! Reads and writes go through the [`ConfigSection`] / [`ConfigSectionMut`]
//! traits, implemented by the root tree and by [`Section`] / [`SectionMut`]
//! views anchored at a sub-path.

mod defaults;
mod merge;
mod section;
mod shared;

pub use merge::{deep_merge, merge_maps};
pub use section::{Section, SectionMut};
pub use shared::SharedConfiguration;

use crate::error::{ConfigError, ConfigResult};
use crate::path::{DEFAULT_SEPARATOR, PathKey};
use crate::serialize::{FieldType, SerializerRegistry};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::trace;

static ROOT_KEY: PathKey = PathKey::root();

/// Tree-wide options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigOptions {
    /// Character separating path segments (default `.`).
    pub path_separator: char,
    /// When set, reads fall back to the defaults tree and key/value listings
    /// include defaults underneath primary entries.
    pub copy_defaults: bool,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            path_separator: DEFAULT_SEPARATOR,
            copy_defaults: false,
        }
    }
}

impl ConfigOptions {
    pub fn with_separator(mut self, separator: char) -> Self {
        self.path_separator = separator;
        self
    }

    pub fn with_copy_defaults(mut self, copy_defaults: bool) -> Self {
        self.copy_defaults = copy_defaults;
        self
    }
}

/// The shape of a stored node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// String, number or boolean.
    Scalar,
    /// Ordered sequence of values.
    Sequence,
    /// Nested map of segment to node.
    Section,
}

impl NodeKind {
    /// Classify a raw value. Null is not a storable node.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(_) => Some(NodeKind::Sequence),
            Value::Object(_) => Some(NodeKind::Section),
            Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(NodeKind::Scalar),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Scalar => "scalar",
            NodeKind::Sequence => "sequence",
            NodeKind::Section => "section",
        }
    }
}

/// Root of a configuration tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Configuration {
    root: Map<String, Value>,
    options: ConfigOptions,
    defaults: Option<Box<Configuration>>,
    comments: BTreeMap<PathKey, String>,
    header: Option<String>,
}

impl Configuration {
    /// Create an empty tree with default options.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Build a tree from a raw object. `Null` yields an empty tree.
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            Value::Null => Ok(Self::new()),
            other => Err(ConfigError::not_a_section(
                NodeKind::of(&other).map_or("null", |k| k.as_str()),
            )),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            root: strip_nulls(map),
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ConfigOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ConfigOptions {
        &mut self.options
    }

    /// Primary-tree values only, without defaults.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Drop every primary value and comment. Defaults and options are kept.
    pub fn clear(&mut self) {
        self.root.clear();
        self.comments.clear();
    }

    /// Replace the primary values with those of `other`, keeping this tree's
    /// options and defaults.
    pub fn replace_values(&mut self, other: Configuration) {
        self.root = other.root;
        self.comments = other.comments;
        if other.header.is_some() {
            self.header = other.header;
        }
    }

    /// The full read view: defaults first (when `copy_defaults` is set) with
    /// primary entries layered on top.
    pub fn to_value(&self) -> Value {
        Value::Object(self.merged_section(&ROOT_KEY).unwrap_or_default())
    }

    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    pub fn set_header(&mut self, header: Option<String>) {
        self.header = header;
    }

    /// All comments, keyed by absolute path.
    pub fn comments(&self) -> impl Iterator<Item = (&PathKey, &str)> {
        self.comments.iter().map(|(k, v)| (k, v.as_str()))
    }

    /// Comment attached to `key`, falling back to the defaults tree when
    /// `copy_defaults` is set.
    pub fn comment_at(&self, key: &PathKey) -> Option<&str> {
        self.comments.get(key).map(String::as_str).or_else(|| {
            if self.options.copy_defaults {
                self.defaults.as_ref()?.comment_at(key)
            } else {
                None
            }
        })
    }

    pub(crate) fn lookup_local(&self, key: &PathKey) -> Option<&Value> {
        lookup_in(&self.root, key.segments())
    }

    /// Default-aware lookup.
    pub(crate) fn lookup(&self, key: &PathKey) -> Option<&Value> {
        self.lookup_local(key).or_else(|| {
            if self.options.copy_defaults && !self.shadowed_local(key) {
                self.defaults.as_ref()?.lookup(key)
            } else {
                None
            }
        })
    }

    /// Whether a primary scalar sits at `key` or above it, hiding any
    /// defaults section there.
    fn shadowed_local(&self, key: &PathKey) -> bool {
        let mut current = &self.root;
        for segment in key.segments() {
            match current.get(segment) {
                Some(Value::Object(map)) => current = map,
                Some(_) => return true,
                None => return false,
            }
        }
        false
    }

    pub(crate) fn section_map_local(&self, key: &PathKey) -> Option<&Map<String, Value>> {
        if key.is_root() {
            return Some(&self.root);
        }
        self.lookup_local(key)?.as_object()
    }

    /// Section contents at `key` with defaults merged underneath when
    /// `copy_defaults` is set.
    pub(crate) fn merged_section(&self, key: &PathKey) -> Option<Map<String, Value>> {
        let local = self.section_map_local(key).cloned();
        if !self.options.copy_defaults || self.shadowed_local(key) {
            return local;
        }
        let defaults = self.defaults.as_ref().and_then(|d| d.merged_section(key));
        match (defaults, local) {
            (Some(mut base), Some(overlay)) => {
                merge_maps(&mut base, overlay);
                Some(base)
            }
            (base, overlay) => overlay.or(base),
        }
    }

    pub(crate) fn keys_at(&self, key: &PathKey, deep: bool) -> Vec<String> {
        let mut keys = Vec::new();
        if let Some(map) = self.merged_section(key) {
            collect_keys(&map, "", self.options.path_separator, deep, &mut keys);
        }
        keys
    }

    pub(crate) fn values_at(&self, key: &PathKey, deep: bool) -> Map<String, Value> {
        let mut values = Map::new();
        if let Some(map) = self.merged_section(key) {
            collect_values(&map, "", self.options.path_separator, deep, &mut values);
        }
        values
    }

    pub(crate) fn insert_at(&mut self, key: &PathKey, value: Value) -> ConfigResult<()> {
        if value.is_null() {
            self.remove_at(key);
            return Ok(());
        }
        let Some((last, parents)) = key.segments().split_last() else {
            return Err(ConfigError::empty_path());
        };
        let mut current = &mut self.root;
        for segment in parents {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = ensure_object(entry);
        }
        let value = match value {
            Value::Object(map) => Value::Object(strip_nulls(map)),
            other => other,
        };
        trace!(path = %key, "set");
        current.insert(last.clone(), value);
        Ok(())
    }

    pub(crate) fn remove_at(&mut self, key: &PathKey) -> Option<Value> {
        let removed = remove_pruning(&mut self.root, key.segments())?;
        trace!(path = %key, "removed");
        let root = &self.root;
        // Drop comments under the removed key and on ancestors pruned with it.
        self.comments.retain(|path, _| {
            if path.starts_with(key) {
                return false;
            }
            path.is_root()
                || !key.starts_with(path)
                || lookup_in(root, path.segments()).is_some()
        });
        Some(removed)
    }

    pub(crate) fn ensure_section(&mut self, key: &PathKey) {
        let mut current = &mut self.root;
        for segment in key.segments() {
            let entry = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            current = ensure_object(entry);
        }
    }

    pub(crate) fn set_comment_at(&mut self, key: PathKey, comment: Option<String>) {
        match comment {
            Some(text) => {
                self.comments.insert(key, text);
            }
            None => {
                self.comments.remove(&key);
            }
        }
    }
}

/// Read access shared by the root tree and section views.
///
/// All paths are relative to the section and split on the tree's separator.
/// Malformed paths read as absent.
pub trait ConfigSection {
    /// The tree this section belongs to.
    fn config(&self) -> &Configuration;

    /// Absolute key of this section within its tree.
    fn anchor(&self) -> &PathKey;

    /// Resolve a relative path to an absolute key.
    fn resolve(&self, path: &str) -> ConfigResult<PathKey> {
        let relative = PathKey::parse(path, self.config().options.path_separator)?;
        Ok(self.anchor().join(&relative))
    }

    /// Absolute path of this section rendered with the tree's separator.
    fn current_path(&self) -> String {
        self.anchor()
            .to_string_with(self.config().options.path_separator)
    }

    /// Default-aware read: the primary value, or the default when
    /// `copy_defaults` is enabled.
    fn get(&self, path: &str) -> Option<&Value> {
        let key = self.resolve(path).ok()?;
        self.config().lookup(&key)
    }

    /// Primary-tree read, ignoring defaults.
    fn get_local(&self, path: &str) -> Option<&Value> {
        let key = self.resolve(path).ok()?;
        self.config().lookup_local(&key)
    }

    fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    fn kind(&self, path: &str) -> Option<NodeKind> {
        self.get(path).and_then(NodeKind::of)
    }

    fn is_section(&self, path: &str) -> bool {
        self.kind(path) == Some(NodeKind::Section)
    }

    fn is_list(&self, path: &str) -> bool {
        self.kind(path) == Some(NodeKind::Sequence)
    }

    fn get_string(&self, path: &str) -> Option<String> {
        self.get(path)?.as_str().map(str::to_string)
    }

    fn get_string_or(&self, path: &str, fallback: &str) -> String {
        self.get_string(path)
            .unwrap_or_else(|| fallback.to_string())
    }

    fn get_bool(&self, path: &str) -> Option<bool> {
        self.get(path)?.as_bool()
    }

    fn get_bool_or(&self, path: &str, fallback: bool) -> bool {
        self.get_bool(path).unwrap_or(fallback)
    }

    fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path)?.as_i64()
    }

    fn get_i64_or(&self, path: &str, fallback: i64) -> i64 {
        self.get_i64(path).unwrap_or(fallback)
    }

    fn get_f64(&self, path: &str) -> Option<f64> {
        self.get(path)?.as_f64()
    }

    fn get_f64_or(&self, path: &str, fallback: f64) -> f64 {
        self.get_f64(path).unwrap_or(fallback)
    }

    fn get_list(&self, path: &str) -> Option<Vec<Value>> {
        self.get(path)?.as_array().cloned()
    }

    /// String elements of the sequence at `path`; non-string elements are
    /// skipped.
    fn get_string_list(&self, path: &str) -> Vec<String> {
        self.get(path)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Decode the value at `path` into any bindable type.
    fn get_as<T: FieldType>(&self, path: &str, registry: &SerializerRegistry) -> Option<T> {
        T::decode(self.get(path)?, registry)
    }

    /// Child keys. Shallow lists direct children; deep lists every section
    /// and leaf as a path relative to this section. Insertion order.
    fn keys(&self, deep: bool) -> Vec<String> {
        self.config().keys_at(self.anchor(), deep)
    }

    /// Like [`ConfigSection::keys`] but paired with values. Deep listings
    /// include intermediate sections as values too.
    fn values(&self, deep: bool) -> Map<String, Value> {
        self.config().values_at(self.anchor(), deep)
    }

    /// Read-only view of the section at `path`, if one exists.
    fn section(&self, path: &str) -> Option<Section<'_>> {
        let key = self.resolve(path).ok()?;
        if self.config().lookup(&key)?.is_object() {
            Some(Section::new(self.config(), key))
        } else {
            None
        }
    }

    fn comment(&self, path: &str) -> Option<&str> {
        let key = self.resolve(path).ok()?;
        self.config().comment_at(&key)
    }
}

/// Write access shared by the root tree and mutable section views.
pub trait ConfigSectionMut: ConfigSection {
    fn config_mut(&mut self) -> &mut Configuration;

    /// Store `value` at `path`, creating intermediate sections. A null value
    /// removes the path.
    fn set(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let key = self.resolve(path)?;
        self.config_mut().insert_at(&key, value.into())
    }

    /// Remove the value at `path` and prune ancestors left empty.
    fn remove(&mut self, path: &str) -> ConfigResult<Option<Value>> {
        let key = self.resolve(path)?;
        Ok(self.config_mut().remove_at(&key))
    }

    /// Ensure a section exists at `path` and return a live view of it. Any
    /// scalar or sequence at `path` is replaced.
    fn create_section(&mut self, path: &str) -> ConfigResult<SectionMut<'_>> {
        let key = self.resolve(path)?;
        let config = self.config_mut();
        config.ensure_section(&key);
        Ok(SectionMut::new(config, key))
    }

    /// Create a section at `path` filled from `values`.
    fn create_section_with(
        &mut self,
        path: &str,
        values: Map<String, Value>,
    ) -> ConfigResult<SectionMut<'_>> {
        let mut section = self.create_section(path)?;
        for (key, value) in values {
            section.set(&key, value)?;
        }
        Ok(section)
    }

    fn set_comment(&mut self, path: &str, comment: impl Into<String>) -> ConfigResult<()> {
        let key = self.resolve(path)?;
        self.config_mut().set_comment_at(key, Some(comment.into()));
        Ok(())
    }

    fn clear_comment(&mut self, path: &str) -> ConfigResult<()> {
        let key = self.resolve(path)?;
        self.config_mut().set_comment_at(key, None);
        Ok(())
    }
}

impl ConfigSection for Configuration {
    fn config(&self) -> &Configuration {
        self
    }

    fn anchor(&self) -> &PathKey {
        &ROOT_KEY
    }
}

impl ConfigSectionMut for Configuration {
    fn config_mut(&mut self) -> &mut Configuration {
        self
    }
}

fn lookup_in<'a>(map: &'a Map<String, Value>, segments: &[String]) -> Option<&'a Value> {
    let (last, parents) = segments.split_last()?;
    let mut current = map;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Remove the leaf at `segments`, then drop each ancestor section emptied by
/// the removal.
fn remove_pruning(map: &mut Map<String, Value>, segments: &[String]) -> Option<Value> {
    match segments {
        [] => None,
        [last] => map.shift_remove(last),
        [head, rest @ ..] => {
            let child = map.get_mut(head)?.as_object_mut()?;
            let removed = remove_pruning(child, rest)?;
            if child.is_empty() {
                map.shift_remove(head);
            }
            Some(removed)
        }
    }
}

fn strip_nulls(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| match v {
            Value::Object(inner) => (k, Value::Object(strip_nulls(inner))),
            other => (k, other),
        })
        .collect()
}

fn join_key(prefix: &str, key: &str, separator: char) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}{}{}", prefix, separator, key)
    }
}

fn collect_keys(
    map: &Map<String, Value>,
    prefix: &str,
    separator: char,
    deep: bool,
    out: &mut Vec<String>,
) {
    for (key, value) in map {
        let full = join_key(prefix, key, separator);
        out.push(full.clone());
        if deep && let Value::Object(child) = value {
            collect_keys(child, &full, separator, deep, out);
        }
    }
}

fn collect_values(
    map: &Map<String, Value>,
    prefix: &str,
    separator: char,
    deep: bool,
    out: &mut Map<String, Value>,
) {
    for (key, value) in map {
        let full = join_key(prefix, key, separator);
        out.insert(full.clone(), value.clone());
        if deep && let Value::Object(child) = value {
            collect_values(child, &full, separator, deep, out);
        }
    }
}
