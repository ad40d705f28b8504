//! File-backed configuration.
//!
//! `ConfigFile` pairs a tree with the path and format it was read from. It
//! is the persistence side of a bind pass: load the file, reconcile bound
//! fields against it, and save when the pass changed the tree.

use crate::bind::{ConfigBinder, Configurable, LoadReport};
use crate::error::{ConfigError, ConfigResult};
use crate::format::Format;
use crate::tree::{ConfigOptions, Configuration};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Read and parse `path`, picking the format from its extension.
pub fn read_config(path: &Path, options: ConfigOptions) -> ConfigResult<Configuration> {
    let format = Format::from_path(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::io(e).with_path(path.display().to_string()))?;
    format
        .parse_with(&content, options)
        .map_err(|e| e.with_path(path.display().to_string()))
}

/// A tree loaded from (and saved to) a single file.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    format: Format,
    config: Configuration,
}

impl ConfigFile {
    /// Load an existing file. A missing file is an `Io` error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_with(path, ConfigOptions::default())
    }

    pub fn load_with(path: impl AsRef<Path>, options: ConfigOptions) -> ConfigResult<Self> {
        let path = path.as_ref().to_path_buf();
        let format = Format::from_path(&path)?;
        let config = read_config(&path, options)?;
        debug!(path = %path.display(), format = %format, "Loaded config file");
        Ok(Self {
            path,
            format,
            config,
        })
    }

    /// Load `path`, or start from an empty tree when the file does not exist.
    /// Nothing is written until [`ConfigFile::save`].
    pub fn load_or_create(path: impl AsRef<Path>) -> ConfigResult<Self> {
        Self::load_or_create_with(path, ConfigOptions::default())
    }

    pub fn load_or_create_with(
        path: impl AsRef<Path>,
        options: ConfigOptions,
    ) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load_with(path, options);
        }
        Ok(Self {
            path: path.to_path_buf(),
            format: Format::from_path(path)?,
            config: Configuration::with_options(options),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Configuration {
        &mut self.config
    }

    pub fn into_config(self) -> Configuration {
        self.config
    }

    /// Write the tree, creating parent directories as needed.
    pub fn save(&self) -> ConfigResult<()> {
        let text = self.format.serialize(&self.config)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::io(e).with_path(parent.display().to_string()))?;
        }
        std::fs::write(&self.path, text)
            .map_err(|e| ConfigError::io(e).with_path(self.path.display().to_string()))?;
        info!(path = %self.path.display(), "Saved config file");
        Ok(())
    }

    /// Re-read the file, keeping this tree's options and defaults.
    pub fn reload(&mut self) -> ConfigResult<()> {
        let fresh = read_config(&self.path, *self.config.options())?;
        self.config.replace_values(fresh);
        debug!(path = %self.path.display(), "Reloaded config file");
        Ok(())
    }

    /// Reconcile `target` against the file and save when the pass changed
    /// the tree.
    pub fn bind(
        &mut self,
        binder: &ConfigBinder,
        target: &mut dyn Configurable,
    ) -> ConfigResult<LoadReport> {
        let report = binder.load(target, &mut self.config)?;
        if report.is_dirty() || !self.path.exists() {
            self.save()?;
        }
        Ok(report)
    }
}
