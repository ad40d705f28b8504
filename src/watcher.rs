//! File watcher that keeps a shared tree in sync with its file.
//!
//! Watches the file's parent directory with a debounced notifier. When the
//! file changes it is re-parsed and swapped into the [`SharedConfiguration`]
//! under its write lock, keeping the tree's options and defaults. A file that
//! fails to parse is logged and the previous values stay in place.

use crate::error::{ConfigError, ConfigResult};
use crate::file::read_config;
use crate::tree::SharedConfiguration;
use notify::RecommendedWatcher;
use notify_debouncer_mini::{DebouncedEvent, DebouncedEventKind, Debouncer, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Events emitted after the watched file changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigChangeEvent {
    /// The file was re-read and its values swapped in.
    Reloaded(PathBuf),
    /// The file changed but could not be read or parsed.
    ReloadFailed { path: PathBuf, error: String },
    /// The file disappeared; the current values are kept.
    Removed(PathBuf),
    /// The watcher itself failed.
    Error(String),
}

impl ConfigChangeEvent {
    /// Whether the shared tree now holds the file's contents.
    pub fn is_reload(&self) -> bool {
        matches!(self, ConfigChangeEvent::Reloaded(_))
    }
}

/// Configuration for the file watcher.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Debounce duration for coalescing rapid changes.
    pub debounce_duration: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_duration: Duration::from_millis(500),
        }
    }
}

/// Handle to a running watcher. Dropping it stops watching.
pub struct WatcherHandle {
    events: mpsc::Receiver<ConfigChangeEvent>,
    path: PathBuf,
    // Field order matters: the debouncer drops first, closing the channel the
    // worker thread blocks on.
    _debouncer: Debouncer<RecommendedWatcher>,
    _worker: JoinHandle<()>,
}

impl WatcherHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Next event, waiting at most `timeout`.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ConfigChangeEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Next event if one is pending.
    pub fn try_recv(&self) -> Option<ConfigChangeEvent> {
        self.events.try_recv().ok()
    }
}

/// Start watching `path` and reload `shared` whenever it changes.
pub fn watch_config_file(
    path: impl AsRef<Path>,
    shared: SharedConfiguration,
    config: WatcherConfig,
) -> ConfigResult<WatcherHandle> {
    let path = path.as_ref().to_path_buf();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    if !dir.exists() {
        return Err(ConfigError::io("Directory of the watched file does not exist")
            .with_path(dir.display().to_string()));
    }

    let (notify_tx, notify_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    let mut debouncer =
        new_debouncer(config.debounce_duration, notify_tx).map_err(ConfigError::io)?;
    debouncer
        .watcher()
        .watch(&dir, notify::RecursiveMode::NonRecursive)
        .map_err(ConfigError::io)?;
    info!("Watching config file: {}", path.display());

    let target = path.clone();
    let worker = thread::spawn(move || {
        process_notify_events(notify_rx, event_tx, &target, &shared);
    });

    Ok(WatcherHandle {
        events: event_rx,
        path,
        _debouncer: debouncer,
        _worker: worker,
    })
}

fn process_notify_events(
    rx: mpsc::Receiver<Result<Vec<DebouncedEvent>, notify::Error>>,
    tx: mpsc::Sender<ConfigChangeEvent>,
    target: &Path,
    shared: &SharedConfiguration,
) {
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let touched = events
                    .iter()
                    .any(|event| classify_event(&event.path, event.kind, target));
                if touched {
                    let event = reload_into(target, shared);
                    debug!("Config change handled: {:?}", event);
                    // The handle may already be gone; keep serving reloads.
                    let _ = tx.send(event);
                }
            }
            Ok(Err(e)) => {
                error!("File watcher error: {}", e);
                let _ = tx.send(ConfigChangeEvent::Error(e.to_string()));
            }
            Err(_) => {
                info!("Config watcher channel closed, stopping");
                return;
            }
        }
    }
}

/// Whether a debounced event at `path` concerns the watched `target`. Only
/// the parent directory is watched, so matching the file name is enough.
pub fn classify_event(path: &Path, kind: DebouncedEventKind, target: &Path) -> bool {
    if !matches!(
        kind,
        DebouncedEventKind::Any | DebouncedEventKind::AnyContinuous
    ) {
        return false;
    }
    path.file_name().is_some() && path.file_name() == target.file_name()
}

/// Re-read `target` into `shared`, keeping the shared tree's options and
/// defaults.
pub fn reload_into(target: &Path, shared: &SharedConfiguration) -> ConfigChangeEvent {
    if !target.exists() {
        warn!("Watched config file was removed: {}", target.display());
        return ConfigChangeEvent::Removed(target.to_path_buf());
    }
    let options = *shared.read().options();
    match read_config(target, options) {
        Ok(fresh) => {
            shared.replace(fresh);
            info!("Reloaded config file: {}", target.display());
            ConfigChangeEvent::Reloaded(target.to_path_buf())
        }
        Err(e) => {
            warn!(
                "Failed to reload {}, keeping previous values: {}",
                target.display(),
                e
            );
            ConfigChangeEvent::ReloadFailed {
                path: target.to_path_buf(),
                error: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ConfigOptions, ConfigSection, Configuration};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_classify_matches_file_name() {
        let target = PathBuf::from("/etc/app/config.yaml");
        assert!(classify_event(
            Path::new("/private/etc/app/config.yaml"),
            DebouncedEventKind::Any,
            &target
        ));
        assert!(classify_event(
            Path::new("/etc/app/config.yaml"),
            DebouncedEventKind::AnyContinuous,
            &target
        ));
        assert!(!classify_event(
            Path::new("/etc/app/other.yaml"),
            DebouncedEventKind::Any,
            &target
        ));
    }

    #[test]
    fn test_reload_swaps_values_and_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.yaml");
        std::fs::write(&path, "port: 80\n").unwrap();

        let mut config = Configuration::with_options(ConfigOptions::default().with_copy_defaults(true));
        config.add_default("host", "localhost").unwrap();
        let shared = SharedConfiguration::new(config);

        let event = reload_into(&path, &shared);
        assert!(event.is_reload());
        assert_eq!(shared.get("port"), Some(json!(80)));
        assert_eq!(shared.get("host"), Some(json!("localhost")));
    }

    #[test]
    fn test_reload_failure_keeps_previous_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.json");
        std::fs::write(&path, r#"{"port": 80}"#).unwrap();
        let shared = SharedConfiguration::default();
        reload_into(&path, &shared);

        std::fs::write(&path, "{broken").unwrap();
        let event = reload_into(&path, &shared);
        assert!(matches!(event, ConfigChangeEvent::ReloadFailed { .. }));
        assert_eq!(shared.read().get_i64("port"), Some(80));
    }

    #[test]
    fn test_removed_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("gone.yaml");
        let shared = SharedConfiguration::default();
        assert_eq!(reload_into(&path, &shared), ConfigChangeEvent::Removed(path));
    }

    #[test]
    fn test_watch_requires_existing_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing/app.yaml");
        let result = watch_config_file(&path, SharedConfiguration::default(), WatcherConfig::default());
        assert!(result.is_err());
    }
}
