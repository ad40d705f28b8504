//! The load/store dispatcher.
//!
//! A pass asks the target for its declared fields, resolves each field's
//! absolute key (path override, or the styled field name, under the current
//! section) and hands the field to the first matching loader. Nested holders
//! recurse into child sections up to `max_depth` levels.
//!
//! Keys, duplicate paths, loader lookup and depth are checked for the whole
//! holder graph before the first field is reconciled, so a rejected pass
//! leaves the tree and the target as they were.

use super::loader::{FieldSite, LoaderChain, Outcome};
use super::{Binding, BoundField, Configurable, Fields, KeyStyle};
use crate::error::{ConfigError, ConfigResult};
use crate::path::PathKey;
use crate::serialize::SerializerRegistry;
use crate::tree::Configuration;
use std::collections::HashSet;
use tracing::{debug, trace};

/// Default limit on holder nesting.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Per-outcome counts for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub unchanged: usize,
    pub assigned: usize,
    pub skipped: usize,
    pub seeded: usize,
    pub healed: usize,
    pub sections: usize,
    pub written: usize,
}

impl LoadReport {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Unchanged => self.unchanged += 1,
            Outcome::Assigned => self.assigned += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Seeded => self.seeded += 1,
            Outcome::Healed => self.healed += 1,
            Outcome::Nested => self.sections += 1,
            Outcome::Written => self.written += 1,
        }
    }

    /// The pass changed the tree; the caller should save it.
    pub fn is_dirty(&self) -> bool {
        self.seeded + self.healed + self.written > 0
    }

    /// Number of fields visited, holders included.
    pub fn total(&self) -> usize {
        self.unchanged
            + self.assigned
            + self.skipped
            + self.seeded
            + self.healed
            + self.sections
            + self.written
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Load,
    Store,
}

/// Drives reconciliation between [`Configurable`] values and a tree.
#[derive(Debug, Clone)]
pub struct ConfigBinder {
    registry: SerializerRegistry,
    loaders: LoaderChain,
    key_style: KeyStyle,
    max_depth: usize,
}

impl Default for ConfigBinder {
    fn default() -> Self {
        Self::new(SerializerRegistry::new())
    }
}

impl ConfigBinder {
    pub fn new(registry: SerializerRegistry) -> Self {
        Self {
            registry,
            loaders: LoaderChain::standard(),
            key_style: KeyStyle::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_loaders(mut self, loaders: LoaderChain) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_key_style(mut self, key_style: KeyStyle) -> Self {
        self.key_style = key_style;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn registry(&self) -> &SerializerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SerializerRegistry {
        &mut self.registry
    }

    pub fn loaders(&self) -> &LoaderChain {
        &self.loaders
    }

    pub fn key_style(&self) -> KeyStyle {
        self.key_style
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Reconcile `target` against the root of `config`.
    pub fn load(
        &self,
        target: &mut dyn Configurable,
        config: &mut Configuration,
    ) -> ConfigResult<LoadReport> {
        self.run(target, config, &PathKey::root(), Direction::Load)
    }

    /// Reconcile `target` against the section at `base`.
    pub fn load_at(
        &self,
        target: &mut dyn Configurable,
        config: &mut Configuration,
        base: &str,
    ) -> ConfigResult<LoadReport> {
        let base = PathKey::parse(base, config.options().path_separator)?;
        self.run(target, config, &base, Direction::Load)
    }

    /// Write every present field of `target` into `config`, overwriting what
    /// is stored.
    pub fn store(
        &self,
        target: &mut dyn Configurable,
        config: &mut Configuration,
    ) -> ConfigResult<LoadReport> {
        self.run(target, config, &PathKey::root(), Direction::Store)
    }

    pub fn store_at(
        &self,
        target: &mut dyn Configurable,
        config: &mut Configuration,
        base: &str,
    ) -> ConfigResult<LoadReport> {
        let base = PathKey::parse(base, config.options().path_separator)?;
        self.run(target, config, &base, Direction::Store)
    }

    fn run(
        &self,
        target: &mut dyn Configurable,
        config: &mut Configuration,
        base: &PathKey,
        direction: Direction,
    ) -> ConfigResult<LoadReport> {
        let separator = config.options().path_separator;
        self.validate(target, base, separator, 0)?;
        let mut report = LoadReport::default();
        self.walk(target, config, base, 0, direction, &mut report)?;
        debug!(
            base = %base,
            direction = ?direction,
            assigned = report.assigned,
            seeded = report.seeded,
            healed = report.healed,
            skipped = report.skipped,
            written = report.written,
            "Binding pass complete"
        );
        Ok(report)
    }

    pub(crate) fn load_section(
        &self,
        holder: &mut dyn Configurable,
        config: &mut Configuration,
        base: &PathKey,
        depth: usize,
        report: &mut LoadReport,
    ) -> ConfigResult<()> {
        self.walk(holder, config, base, depth, Direction::Load, report)
    }

    fn walk(
        &self,
        holder: &mut dyn Configurable,
        config: &mut Configuration,
        base: &PathKey,
        depth: usize,
        direction: Direction,
        report: &mut LoadReport,
    ) -> ConfigResult<()> {
        let separator = config.options().path_separator;
        if depth > self.max_depth {
            return Err(ConfigError::depth_exceeded(
                &base.to_string_with(separator),
                self.max_depth,
            ));
        }

        let mut fields = Fields::new();
        holder.bind_fields(&mut fields);
        trace!(base = %base, depth, fields = fields.len(), "Walking section");

        for binding in fields.into_bindings() {
            if binding.exclude {
                trace!(field = %binding.name, "Field excluded");
                continue;
            }
            let key = self.resolve_key(&binding, base, separator)?;
            let path = key.to_string_with(separator);

            let Binding {
                comment, mut field, ..
            } = binding;
            if let Some(comment) = comment {
                config.set_comment_at(key.clone(), Some(comment));
            }

            let loader = self
                .loaders
                .find(field.as_ref(), &self.registry)
                .ok_or_else(|| ConfigError::no_loader(&path, field.descriptor().type_name))?;

            let outcome = match direction {
                Direction::Load => {
                    let mut site = FieldSite {
                        config: &mut *config,
                        key: &key,
                        binder: self,
                        depth,
                        report: &mut *report,
                    };
                    loader.reconcile(field.as_mut(), &mut site)?
                }
                Direction::Store => {
                    self.store_field(field.as_mut(), config, &key, depth, report)?
                }
            };
            report.record(outcome);
            debug!(
                path = %path,
                loader = loader.name(),
                outcome = outcome.as_str(),
                "Field reconciled"
            );
        }
        Ok(())
    }

    /// Check every binding reachable from `holder` without touching the
    /// tree or any field, so a failing pass leaves both as they were.
    fn validate(
        &self,
        holder: &mut dyn Configurable,
        base: &PathKey,
        separator: char,
        depth: usize,
    ) -> ConfigResult<()> {
        if depth > self.max_depth {
            return Err(ConfigError::depth_exceeded(
                &base.to_string_with(separator),
                self.max_depth,
            ));
        }

        let mut fields = Fields::new();
        holder.bind_fields(&mut fields);

        let mut seen = HashSet::new();
        for binding in fields.into_bindings() {
            if binding.exclude {
                continue;
            }
            let key = self.resolve_key(&binding, base, separator)?;
            let path = key.to_string_with(separator);
            if !seen.insert(key.clone()) {
                return Err(ConfigError::duplicate_path(&path));
            }

            let mut field = binding.field;
            if self.loaders.find(field.as_ref(), &self.registry).is_none() {
                return Err(ConfigError::no_loader(&path, field.descriptor().type_name));
            }
            if let Some(nested) = field.as_holder() {
                self.validate(nested, &key, separator, depth + 1)?;
            }
        }
        Ok(())
    }

    fn store_field(
        &self,
        field: &mut dyn BoundField,
        config: &mut Configuration,
        key: &PathKey,
        depth: usize,
        report: &mut LoadReport,
    ) -> ConfigResult<Outcome> {
        if let Some(holder) = field.as_holder() {
            self.walk(holder, config, key, depth + 1, Direction::Store, report)?;
            return Ok(Outcome::Nested);
        }
        if !field.is_present() {
            return Ok(Outcome::Unchanged);
        }
        match field.encode(&self.registry) {
            Some(raw) if config.lookup_local(key) != Some(&raw) => {
                config.insert_at(key, raw)?;
                Ok(Outcome::Written)
            }
            _ => Ok(Outcome::Unchanged),
        }
    }

    fn resolve_key(
        &self,
        binding: &Binding<'_>,
        base: &PathKey,
        separator: char,
    ) -> ConfigResult<PathKey> {
        let relative = match &binding.path {
            Some(path) => PathKey::parse(path, separator)?,
            None => PathKey::parse(&self.key_style.apply(&binding.name), separator)?,
        };
        Ok(base.join(&relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::tree::{ConfigSection, ConfigSectionMut};
    use serde_json::json;

    struct Retry {
        retries: i32,
        backoff_ms: Option<u64>,
    }

    impl Configurable for Retry {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("retries", &mut self.retries);
            fields.field("backoff_ms", &mut self.backoff_ms);
        }
    }

    fn retry() -> Retry {
        Retry {
            retries: 3,
            backoff_ms: None,
        }
    }

    #[test]
    fn test_seed_into_empty_tree() {
        let mut target = retry();
        let mut config = Configuration::new();
        let report = ConfigBinder::default().load(&mut target, &mut config).unwrap();

        assert_eq!(config.get("retries"), Some(&json!(3)));
        assert!(!config.contains("backoff_ms"));
        assert_eq!(report.seeded, 1);
        assert_eq!(report.unchanged, 1);
        assert!(report.is_dirty());
    }

    #[test]
    fn test_stored_value_wins_and_fills_absent_field() {
        let mut target = retry();
        let mut config = Configuration::new();
        config.set("retries", 5).unwrap();
        config.set("backoff_ms", 250).unwrap();

        let report = ConfigBinder::default().load(&mut target, &mut config).unwrap();
        assert_eq!(target.retries, 5);
        assert_eq!(target.backoff_ms, Some(250));
        assert_eq!(report.assigned, 2);
        assert!(!report.is_dirty());
    }

    #[test]
    fn test_absent_field_with_malformed_value_is_skipped() {
        let mut target = retry();
        let mut config = Configuration::new();
        config.set("retries", 3).unwrap();
        config.set("backoff_ms", "soon").unwrap();

        let report = ConfigBinder::default().load(&mut target, &mut config).unwrap();
        assert_eq!(target.backoff_ms, None);
        assert_eq!(config.get("backoff_ms"), Some(&json!("soon")));
        assert_eq!(report.skipped, 1);
        assert!(!report.is_dirty());
    }

    #[test]
    fn test_load_at_subsection() {
        let mut target = retry();
        let mut config = Configuration::new();
        config.set("http.client.retries", 9).unwrap();

        ConfigBinder::default()
            .load_at(&mut target, &mut config, "http.client")
            .unwrap();
        assert_eq!(target.retries, 9);
        assert!(!config.contains("retries"));
    }

    #[test]
    fn test_key_style_applies_to_field_names() {
        let mut target = Retry {
            retries: 1,
            backoff_ms: Some(10),
        };
        let mut config = Configuration::new();
        ConfigBinder::default()
            .with_key_style(KeyStyle::KebabCase)
            .load(&mut target, &mut config)
            .unwrap();
        assert_eq!(config.keys(false), vec!["retries", "backoff-ms"]);
    }

    #[test]
    fn test_store_overwrites_tree() {
        let mut target = retry();
        let mut config = Configuration::new();
        config.set("retries", 8).unwrap();

        let report = ConfigBinder::default().store(&mut target, &mut config).unwrap();
        assert_eq!(config.get_i64("retries"), Some(3));
        assert_eq!(report.written, 1);

        let again = ConfigBinder::default().store(&mut target, &mut config).unwrap();
        assert!(!again.is_dirty());
    }

    struct Doubled {
        a: i32,
        b: i32,
    }

    impl Configurable for Doubled {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("a", &mut self.a).path("same");
            fields.field("b", &mut self.b).path("same");
        }
    }

    #[test]
    fn test_duplicate_paths_are_rejected() {
        let mut target = Doubled { a: 1, b: 2 };
        let mut config = Configuration::new();
        let err = ConfigBinder::default()
            .load(&mut target, &mut config)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicatePath);
        assert_eq!(err.path.as_deref(), Some("same"));
    }

    struct Clash {
        a: i32,
        b: i32,
    }

    impl Configurable for Clash {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("a", &mut self.a).comment("first");
            fields.field("b", &mut self.b).path("a");
        }
    }

    #[test]
    fn test_rejected_pass_leaves_tree_untouched() {
        let mut target = Clash { a: 1, b: 2 };
        let mut config = Configuration::new();
        config.set("b", 7).unwrap();

        let err = ConfigBinder::default()
            .load(&mut target, &mut config)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicatePath);
        assert_eq!(config.keys(true), vec!["b"]);
        assert!(config.comment("a").is_none());
        assert_eq!(target.a, 1);
    }

    struct Chain {
        next: Option<Box<Chain>>,
        value: u8,
    }

    impl Chain {
        fn with_depth(depth: usize) -> Self {
            let mut chain = Chain {
                next: None,
                value: 0,
            };
            for _ in 0..depth {
                chain = Chain {
                    next: Some(Box::new(chain)),
                    value: 0,
                };
            }
            chain
        }
    }

    impl Configurable for Chain {
        fn bind_fields<'a>(&'a mut self, fields: &mut Fields<'a>) {
            fields.field("value", &mut self.value);
            if let Some(next) = self.next.as_deref_mut() {
                fields.section("next", next);
            }
        }
    }

    #[test]
    fn test_depth_guard() {
        let binder = ConfigBinder::default().with_max_depth(4);

        let mut shallow = Chain::with_depth(4);
        let mut config = Configuration::new();
        let report = binder.load(&mut shallow, &mut config).unwrap();
        assert_eq!(report.sections, 4);
        assert!(config.contains("next.next.next.next.value"));

        let mut deep = Chain::with_depth(5);
        let mut config = Configuration::new();
        config.set("value", 9).unwrap();
        let err = binder.load(&mut deep, &mut config).unwrap_err();
        assert_eq!(err.code, ErrorCode::DepthExceeded);
        // Outer levels were not reconciled before the guard tripped.
        assert_eq!(deep.value, 0);
        assert_eq!(config.keys(true), vec!["value"]);
    }
}
