//! Field loaders and the reconciliation table.
//!
//! Every loader reconciles a field's in-code value against the stored value
//! with the same outcome table:
//!
//! | field present | stored present | stored converts | outcome |
//! |---|---|---|---|
//! | no  | no  | -   | `Unchanged` |
//! | no  | yes | yes | `Assigned` (field takes the stored value) |
//! | no  | yes | no  | `Skipped` (field and tree untouched) |
//! | yes | no  | -   | `Seeded` (field value written to the tree) |
//! | yes | yes | yes | `Assigned` (stored value wins) |
//! | yes | yes | no  | `Healed` (field value overwrites the stored value) |
//!
//! Loaders differ in which descriptors they accept. The chain is ordered and
//! the first match handles the field.

use super::{BoundField, ConfigBinder, Configurable};
use crate::error::ConfigResult;
use crate::path::PathKey;
use crate::serialize::{SerializerRegistry, TypeDescriptor, TypeKind};
use crate::tree::Configuration;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of reconciling one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Neither side had a value, or nothing needed to change.
    Unchanged,
    /// The stored value was converted and assigned to the field.
    Assigned,
    /// The stored value did not convert and the field had no value.
    Skipped,
    /// The field value was written where nothing was stored.
    Seeded,
    /// A malformed stored value was replaced by the field value.
    Healed,
    /// A nested holder was walked.
    Nested,
    /// The field value was written by a store pass.
    Written,
}

impl Outcome {
    /// Whether the tree was modified.
    pub fn mutates_tree(&self) -> bool {
        matches!(self, Outcome::Seeded | Outcome::Healed | Outcome::Written)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Unchanged => "unchanged",
            Outcome::Assigned => "assigned",
            Outcome::Skipped => "skipped",
            Outcome::Seeded => "seeded",
            Outcome::Healed => "healed",
            Outcome::Nested => "nested",
            Outcome::Written => "written",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a field is being reconciled: the tree, the field's absolute key and
/// the binder driving the pass.
pub struct FieldSite<'s> {
    pub(crate) config: &'s mut Configuration,
    pub(crate) key: &'s PathKey,
    pub(crate) binder: &'s ConfigBinder,
    pub(crate) depth: usize,
    pub(crate) report: &'s mut super::LoadReport,
}

impl<'s> FieldSite<'s> {
    pub fn key(&self) -> &PathKey {
        self.key
    }

    /// The key rendered with the tree's separator.
    pub fn path(&self) -> String {
        self.key
            .to_string_with(self.config.options().path_separator)
    }

    pub fn registry(&self) -> &'s SerializerRegistry {
        self.binder.registry()
    }

    pub fn config(&self) -> &Configuration {
        &*self.config
    }

    /// Default-aware stored value.
    pub fn stored(&self) -> Option<&Value> {
        self.config.lookup(self.key)
    }

    pub fn write(&mut self, raw: Value) -> ConfigResult<()> {
        self.config.insert_at(self.key, raw)
    }

    /// Replace whatever is stored with an empty section, keeping the key's
    /// slot in its parent and its comment.
    pub fn reset_section(&mut self) -> ConfigResult<()> {
        self.config.insert_at(self.key, Value::Object(Map::new()))
    }

    /// Run the whole per-field pass for `holder` against the section at this
    /// site.
    pub fn descend(&mut self, holder: &mut dyn Configurable) -> ConfigResult<()> {
        self.binder.load_section(
            holder,
            &mut *self.config,
            self.key,
            self.depth + 1,
            &mut *self.report,
        )
    }
}

/// Apply the reconciliation table to `field`.
pub fn reconcile_value(
    field: &mut dyn BoundField,
    site: &mut FieldSite<'_>,
) -> ConfigResult<Outcome> {
    let registry = site.registry();
    let present = field.is_present();

    let Some(stored) = site.stored().cloned() else {
        if !present {
            return Ok(Outcome::Unchanged);
        }
        return match field.encode(registry) {
            Some(raw) => {
                site.write(raw)?;
                Ok(Outcome::Seeded)
            }
            None => Ok(Outcome::Unchanged),
        };
    };

    if field.assign(&stored, registry) {
        return Ok(Outcome::Assigned);
    }

    let type_name = field.descriptor().type_name;
    if !present {
        info!(
            path = %site.path(),
            type_name,
            "Stored value does not convert; leaving field unset"
        );
        return Ok(Outcome::Skipped);
    }

    match field.encode(registry) {
        Some(raw) => {
            warn!(
                path = %site.path(),
                type_name,
                stored = %stored,
                "Stored value does not convert; replacing it with the in-code default"
            );
            site.write(raw)?;
            Ok(Outcome::Healed)
        }
        None => {
            info!(
                path = %site.path(),
                type_name,
                "Stored value does not convert and the in-code value has no raw form"
            );
            Ok(Outcome::Skipped)
        }
    }
}

/// A reconciliation strategy for a family of field types.
pub trait FieldLoader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this loader handles fields described by `descriptor`.
    fn matches(&self, descriptor: &TypeDescriptor, registry: &SerializerRegistry) -> bool;

    fn reconcile(
        &self,
        field: &mut dyn BoundField,
        site: &mut FieldSite<'_>,
    ) -> ConfigResult<Outcome> {
        reconcile_value(field, site)
    }
}

/// Scalars and raw values.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarLoader;

impl FieldLoader for ScalarLoader {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn matches(&self, descriptor: &TypeDescriptor, _registry: &SerializerRegistry) -> bool {
        matches!(descriptor.kind, TypeKind::Scalar(_) | TypeKind::Raw)
    }
}

/// Homogeneous sequences whose element type resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceLoader;

impl FieldLoader for SequenceLoader {
    fn name(&self) -> &'static str {
        "sequence"
    }

    fn matches(&self, descriptor: &TypeDescriptor, registry: &SerializerRegistry) -> bool {
        match &descriptor.kind {
            TypeKind::Sequence(element) => element.is_resolvable(registry),
            _ => false,
        }
    }
}

/// Maps whose value type resolves.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapLoader;

impl FieldLoader for MapLoader {
    fn name(&self) -> &'static str {
        "map"
    }

    fn matches(&self, descriptor: &TypeDescriptor, registry: &SerializerRegistry) -> bool {
        match &descriptor.kind {
            TypeKind::Map { value, .. } => value.is_resolvable(registry),
            _ => false,
        }
    }
}

/// Nested holders. A non-section value stored where the holder binds is
/// replaced by a section before the holder's own fields are walked.
#[derive(Debug, Clone, Copy, Default)]
pub struct SectionLoader;

impl FieldLoader for SectionLoader {
    fn name(&self) -> &'static str {
        "section"
    }

    fn matches(&self, descriptor: &TypeDescriptor, _registry: &SerializerRegistry) -> bool {
        descriptor.kind == TypeKind::Section
    }

    fn reconcile(
        &self,
        field: &mut dyn BoundField,
        site: &mut FieldSite<'_>,
    ) -> ConfigResult<Outcome> {
        let type_name = field.descriptor().type_name;
        let Some(holder) = field.as_holder() else {
            return reconcile_value(field, site);
        };

        let healed = match site.stored() {
            Some(stored) if !stored.is_object() => {
                warn!(
                    path = %site.path(),
                    type_name,
                    stored = %stored,
                    "Expected a section; replacing the stored value"
                );
                true
            }
            _ => false,
        };
        if healed {
            site.reset_section()?;
        }

        site.descend(holder)?;
        Ok(if healed { Outcome::Healed } else { Outcome::Nested })
    }
}

/// Types converted by a registered serializer, and every field bound with a
/// serializer override.
#[derive(Debug, Clone, Copy, Default)]
pub struct SerializerLoader;

impl FieldLoader for SerializerLoader {
    fn name(&self) -> &'static str {
        "serializer"
    }

    fn matches(&self, descriptor: &TypeDescriptor, registry: &SerializerRegistry) -> bool {
        descriptor.kind == TypeKind::Custom && registry.contains_type(descriptor.type_id)
    }
}

/// Ordered list of loaders. The first loader whose `matches` accepts a
/// field's descriptor handles it.
#[derive(Clone)]
pub struct LoaderChain {
    loaders: Vec<Arc<dyn FieldLoader>>,
}

impl LoaderChain {
    pub fn empty() -> Self {
        Self {
            loaders: Vec::new(),
        }
    }

    /// Scalar, sequence, map, section, serializer.
    pub fn standard() -> Self {
        Self::empty()
            .push(ScalarLoader)
            .push(SequenceLoader)
            .push(MapLoader)
            .push(SectionLoader)
            .push(SerializerLoader)
    }

    /// Add `loader` ahead of every loader already in the chain.
    pub fn prepend(mut self, loader: impl FieldLoader + 'static) -> Self {
        self.loaders.insert(0, Arc::new(loader));
        self
    }

    pub fn push(mut self, loader: impl FieldLoader + 'static) -> Self {
        self.loaders.push(Arc::new(loader));
        self
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.loaders.iter().map(|l| l.name()).collect()
    }

    /// Loader for `field`. Fields with a serializer override always go to
    /// the serializer loader.
    pub fn find(
        &self,
        field: &dyn BoundField,
        registry: &SerializerRegistry,
    ) -> Option<&dyn FieldLoader> {
        if field.has_serializer_override() {
            let loader: &dyn FieldLoader = &SerializerLoader;
            return Some(loader);
        }
        let descriptor = field.descriptor();
        self.loaders
            .iter()
            .map(|loader| loader.as_ref())
            .find(|loader| loader.matches(&descriptor, registry))
    }
}

impl Default for LoaderChain {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for LoaderChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
