//! Thread-shared configuration tree.
//!
//! Reads take the lock shared, `set` / `remove` / `replace` take it
//! exclusively, so a reload swapping in a new tree never interleaves with a
//! reader walking the old one.

use super::{ConfigSection, ConfigSectionMut, Configuration};
use crate::error::ConfigResult;
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Cloneable handle to a tree guarded by a per-tree `RwLock`.
#[derive(Debug, Clone, Default)]
pub struct SharedConfiguration {
    inner: Arc<RwLock<Configuration>>,
}

impl SharedConfiguration {
    pub fn new(config: Configuration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Shared read guard. A poisoned lock is recovered.
    pub fn read(&self) -> RwLockReadGuard<'_, Configuration> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Exclusive write guard.
    pub fn write(&self) -> RwLockWriteGuard<'_, Configuration> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cloned default-aware read.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.read().get(path).cloned()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.read().contains(path)
    }

    pub fn set(&self, path: &str, value: impl Into<Value>) -> ConfigResult<()> {
        self.write().set(path, value)
    }

    pub fn remove(&self, path: &str) -> ConfigResult<Option<Value>> {
        self.write().remove(path)
    }

    /// Swap in new primary values, keeping options and defaults.
    pub fn replace(&self, config: Configuration) {
        self.write().replace_values(config);
    }

    /// Clone of the current tree.
    pub fn snapshot(&self) -> Configuration {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::thread;

    #[test]
    fn test_shared_set_and_get() {
        let shared = SharedConfiguration::new(Configuration::new());
        shared.set("a.b", 1).unwrap();
        assert_eq!(shared.get("a.b"), Some(json!(1)));
        assert!(shared.contains("a"));
        assert_eq!(shared.remove("a.b").unwrap(), Some(json!(1)));
        assert!(!shared.contains("a"));
    }

    #[test]
    fn test_replace_keeps_defaults() {
        let mut config = Configuration::new();
        config.options_mut().copy_defaults = true;
        config.add_default("d", 1).unwrap();
        let shared = SharedConfiguration::new(config);

        let mut fresh = Configuration::new();
        fresh.set("p", 2).unwrap();
        shared.replace(fresh);

        assert_eq!(shared.get("p"), Some(json!(2)));
        assert_eq!(shared.get("d"), Some(json!(1)));
    }

    #[test]
    fn test_concurrent_writers_are_serialized() {
        let shared = SharedConfiguration::default();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for j in 0..50 {
                        shared.set(&format!("t{}.k{}", i, j), j).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = shared.snapshot();
        assert_eq!(snapshot.keys(false).len(), 8);
        assert_eq!(snapshot.keys(true).len(), 8 + 8 * 50);
    }
}
