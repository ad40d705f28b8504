//! Defaults overlay.
//!
//! A tree may reference a second tree holding compiled-in defaults. Defaults
//! are only written through `add_default` / `add_defaults` and never leak
//! into the primary tree unless `apply_defaults` is called. With
//! `copy_defaults` enabled, reads fall back to defaults and listings show
//! defaults first with primary entries layered on top.

use super::{ConfigOptions, Configuration};
use crate::error::ConfigResult;
use crate::path::PathKey;
use serde_json::{Map, Value};
use tracing::debug;

impl Configuration {
    pub fn defaults(&self) -> Option<&Configuration> {
        self.defaults.as_deref()
    }

    pub fn defaults_mut(&mut self) -> Option<&mut Configuration> {
        self.defaults.as_deref_mut()
    }

    /// Attach a defaults tree, replacing any previous one.
    pub fn set_defaults(&mut self, defaults: Configuration) {
        self.defaults = Some(Box::new(defaults));
    }

    /// Detach and return the defaults tree.
    pub fn take_defaults(&mut self) -> Option<Configuration> {
        self.defaults.take().map(|d| *d)
    }

    /// Write `value` at `path` in the defaults tree, creating the defaults
    /// tree if there is none. The primary tree is never touched.
    pub fn add_default(&mut self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        let separator = self.options.path_separator;
        let key = PathKey::parse(path, separator)?;
        let defaults = self.defaults.get_or_insert_with(|| {
            Box::new(Configuration::with_options(
                ConfigOptions::default().with_separator(separator),
            ))
        });
        defaults.insert_at(&key, value.into())
    }

    /// Add every entry of `values` as a default. Keys are parsed as paths.
    pub fn add_defaults(&mut self, values: Map<String, Value>) -> ConfigResult<()> {
        for (path, value) in values {
            self.add_default(&path, value)?;
        }
        Ok(())
    }

    /// Copy every default leaf missing from the primary tree into it, along
    /// with its comment. Primary values are never overwritten, including
    /// scalars sitting where the defaults have a section.
    ///
    /// Returns the number of values copied.
    pub fn apply_defaults(&mut self) -> usize {
        let Some(defaults) = self.defaults.as_deref() else {
            return 0;
        };

        let mut leaves = Vec::new();
        collect_leaves(defaults.as_map(), &PathKey::root(), &mut leaves);
        let comments: Vec<(PathKey, String)> = defaults
            .comments()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();

        let mut copied = 0;
        for (key, value) in leaves {
            if self.lookup_local(&key).is_some() || self.is_shadowed(&key) {
                continue;
            }
            // Leaves come from a parsed tree, so the key is never empty.
            if self.insert_at(&key, value).is_ok() {
                copied += 1;
            }
        }
        for (key, comment) in comments {
            if !self.comments.contains_key(&key) && self.lookup_local(&key).is_some() {
                self.comments.insert(key, comment);
            }
        }
        debug!(copied, "applied defaults to primary tree");
        copied
    }

    /// True when a proper ancestor of `key` holds a non-section value.
    fn is_shadowed(&self, key: &PathKey) -> bool {
        let mut current = self.as_map();
        let segments = key.segments();
        for segment in &segments[..segments.len().saturating_sub(1)] {
            match current.get(segment) {
                Some(Value::Object(child)) => current = child,
                Some(_) => return true,
                None => return false,
            }
        }
        false
    }
}

/// Collect leaf values, treating empty sections as leaves.
fn collect_leaves(map: &Map<String, Value>, prefix: &PathKey, out: &mut Vec<(PathKey, Value)>) {
    for (segment, value) in map {
        let Ok(key) = prefix.child(segment) else {
            continue;
        };
        match value {
            Value::Object(child) if !child.is_empty() => collect_leaves(child, &key, out),
            other => out.push((key, other.clone())),
        }
    }
}
