//! Section views anchored at a sub-path of a tree.
//!
//! A view holds a borrow of the root tree plus the absolute key it is
//! anchored at; every operation re-resolves through the root, so writes made
//! through a `SectionMut` land in the root's backing map. When the anchor is
//! pruned (its last leaf removed) the view stays usable and the next `set`
//! recreates it.

use super::{ConfigSection, ConfigSectionMut, Configuration};
use crate::path::PathKey;

/// Read-only view of a section.
#[derive(Debug, Clone)]
pub struct Section<'a> {
    config: &'a Configuration,
    anchor: PathKey,
}

impl<'a> Section<'a> {
    pub fn new(config: &'a Configuration, anchor: PathKey) -> Self {
        Self { config, anchor }
    }

    /// The defaults tree's section at the same path, if any.
    pub fn default_section(&self) -> Option<Section<'a>> {
        let defaults = self.config.defaults()?;
        defaults.section_map_local(&self.anchor)?;
        Some(Section::new(defaults, self.anchor.clone()))
    }
}

impl ConfigSection for Section<'_> {
    fn config(&self) -> &Configuration {
        self.config
    }

    fn anchor(&self) -> &PathKey {
        &self.anchor
    }
}

/// Live mutable view of a section.
#[derive(Debug)]
pub struct SectionMut<'a> {
    config: &'a mut Configuration,
    anchor: PathKey,
}

impl<'a> SectionMut<'a> {
    /// Anchor a view at `anchor`. The section is not created until something
    /// is written through the view.
    pub fn new(config: &'a mut Configuration, anchor: PathKey) -> Self {
        Self { config, anchor }
    }

    /// View of the whole tree.
    pub fn root(config: &'a mut Configuration) -> Self {
        Self::new(config, PathKey::root())
    }

    /// Borrow as a read-only view.
    pub fn as_section(&self) -> Section<'_> {
        Section::new(&*self.config, self.anchor.clone())
    }

    /// Reborrow as a view anchored deeper, without creating anything.
    pub fn child(&mut self, relative: &PathKey) -> SectionMut<'_> {
        SectionMut::new(&mut *self.config, self.anchor.join(relative))
    }
}

impl ConfigSection for SectionMut<'_> {
    fn config(&self) -> &Configuration {
        &*self.config
    }

    fn anchor(&self) -> &PathKey {
        &self.anchor
    }
}

impl ConfigSectionMut for SectionMut<'_> {
    fn config_mut(&mut self) -> &mut Configuration {
        &mut *self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ConfigOptions;
    use serde_json::json;

    #[test]
    fn test_section_writes_land_in_root() {
        let mut config = Configuration::new();
        {
            let mut db = config.create_section("database").unwrap();
            db.set("host", "localhost").unwrap();
            db.set("pool.size", 4).unwrap();
            assert_eq!(db.current_path(), "database");
            assert_eq!(db.get_i64("pool.size"), Some(4));
        }
        assert_eq!(config.get_string("database.host").as_deref(), Some("localhost"));
        assert_eq!(config.get_i64("database.pool.size"), Some(4));
    }

    #[test]
    fn test_create_section_is_idempotent() {
        let mut config = Configuration::new();
        config.set("a.b", 1).unwrap();
        config.create_section("a").unwrap();
        assert_eq!(config.get("a"), Some(&json!({"b": 1})));
    }

    #[test]
    fn test_create_section_overwrites_scalar() {
        let mut config = Configuration::new();
        config.set("a", "scalar").unwrap();
        config.create_section("a").unwrap();
        assert_eq!(config.get("a"), Some(&json!({})));
    }

    #[test]
    fn test_nested_create_section() {
        let mut config = Configuration::new();
        {
            let mut outer = config.create_section("outer").unwrap();
            let mut inner = outer.create_section("inner").unwrap();
            inner.set("leaf", true).unwrap();
            assert_eq!(inner.current_path(), "outer.inner");
        }
        assert_eq!(config.get_bool("outer.inner.leaf"), Some(true));
        assert_eq!(config.keys(true), vec!["outer", "outer.inner", "outer.inner.leaf"]);
    }

    #[test]
    fn test_pruned_anchor_is_recreated() {
        let mut config = Configuration::new();
        let mut section = config.create_section("s").unwrap();
        section.set("x", 1).unwrap();
        section.remove("x").unwrap();
        assert!(section.keys(false).is_empty());
        section.set("y", 2).unwrap();
        assert_eq!(config.get("s"), Some(&json!({"y": 2})));
    }

    #[test]
    fn test_read_only_section_view() {
        let mut config = Configuration::new();
        config.set("server.port", 25565).unwrap();
        config.set("server.motd", "hi").unwrap();

        let server = config.section("server").unwrap();
        assert_eq!(server.keys(false), vec!["port", "motd"]);
        assert_eq!(server.get_i64("port"), Some(25565));
        assert!(config.section("server.port").is_none());
        assert!(config.section("missing").is_none());
    }

    #[test]
    fn test_default_section_view() {
        let mut defaults = Configuration::new();
        defaults.set("server.port", 80).unwrap();
        let mut config = Configuration::with_options(ConfigOptions::default().with_copy_defaults(true));
        config.set_defaults(defaults);
        config.set("server.host", "h").unwrap();

        let server = config.section("server").unwrap();
        let default_server = server.default_section().unwrap();
        assert_eq!(default_server.get_i64("port"), Some(80));
        assert_eq!(server.keys(false), vec!["port", "host"]);
    }
}
