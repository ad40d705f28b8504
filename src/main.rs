//! config-tree command-line tool
//!
//! Reads, edits, merges and converts hierarchical YAML/JSON configuration
//! files through the `config_tree` library.

use anyhow::{Result, bail};
use clap::Parser;
use config_tree::cli::{Cli, Command, FormatArg};
use config_tree::file::{ConfigFile, read_config};
use config_tree::format::{Format, parse_value};
use config_tree::logging::{LogTarget, init_logging};
use config_tree::tree::{ConfigOptions, ConfigSection, ConfigSectionMut};
use config_tree::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&LogTarget::parse(&cli.log), cli.verbose)?;

    let options = ConfigOptions::default().with_separator(cli.separator);
    debug!(file = %cli.file.display(), separator = %cli.separator, "Starting");

    match cli.command {
        Command::Get { path } => run_get(&cli.file, options, &path)?,
        Command::Set { path, value } => run_set(&cli.file, options, &path, &value)?,
        Command::Remove { path } => run_remove(&cli.file, options, &path)?,
        Command::Keys { path, deep } => run_keys(&cli.file, options, path.as_deref(), deep)?,
        Command::Merge {
            defaults,
            write,
            to,
        } => run_merge(&cli.file, options, &defaults, write, to)?,
        Command::Convert { to, output } => run_convert(&cli.file, options, to, output)?,
    }

    Ok(())
}

fn run_get(file: &Path, options: ConfigOptions, path: &str) -> Result<()> {
    let file = ConfigFile::load_with(file, options)?;
    let Some(value) = file.config().get(path) else {
        bail!("No value at '{}'", path);
    };
    println!("{}", render_value(value)?);
    Ok(())
}

fn run_set(file: &Path, options: ConfigOptions, path: &str, raw: &str) -> Result<()> {
    let mut file = ConfigFile::load_or_create_with(file, options)?;
    let value = parse_value(raw)?;
    file.config_mut().set(path, value)?;
    file.save()?;
    info!("Set '{}' in {}", path, file.path().display());
    Ok(())
}

fn run_remove(file: &Path, options: ConfigOptions, path: &str) -> Result<()> {
    let mut file = ConfigFile::load_with(file, options)?;
    match file.config_mut().remove(path)? {
        Some(_) => {
            file.save()?;
            info!("Removed '{}' from {}", path, file.path().display());
        }
        None => warn!("Nothing stored at '{}'", path),
    }
    Ok(())
}

fn run_keys(file: &Path, options: ConfigOptions, path: Option<&str>, deep: bool) -> Result<()> {
    let file = ConfigFile::load_with(file, options)?;
    let keys = match path {
        Some(path) => match file.config().section(path) {
            Some(section) => section.keys(deep),
            None => bail!("'{}' is not a section", path),
        },
        None => file.config().keys(deep),
    };
    for key in keys {
        println!("{}", key);
    }
    Ok(())
}

fn run_merge(
    file: &Path,
    options: ConfigOptions,
    defaults: &Path,
    write: bool,
    to: Option<FormatArg>,
) -> Result<()> {
    let mut file = ConfigFile::load_or_create_with(file, options)?;
    let defaults = read_config(defaults, options)?;
    file.config_mut().set_defaults(defaults);

    if write {
        let copied = file.config_mut().apply_defaults();
        file.save()?;
        info!(
            "Copied {} default value(s) into {}",
            copied,
            file.path().display()
        );
    } else {
        let format = to.map(Format::from).unwrap_or(file.format());
        // Printing shows the merged view.
        file.config_mut().options_mut().copy_defaults = true;
        print!("{}", format.serialize(file.config())?);
    }
    Ok(())
}

fn run_convert(
    file: &Path,
    options: ConfigOptions,
    to: FormatArg,
    output: Option<PathBuf>,
) -> Result<()> {
    let file = ConfigFile::load_with(file, options)?;
    let text = Format::from(to).serialize(file.config())?;
    match output {
        Some(path) => {
            std::fs::write(&path, text)?;
            info!("Wrote {}", path.display());
        }
        None => print!("{}", text),
    }
    Ok(())
}

/// Scalars print bare, sections and sequences as YAML.
fn render_value(value: &Value) -> Result<String> {
    Ok(match value {
        Value::String(s) => s.clone(),
        Value::Object(_) | Value::Array(_) => serde_yaml::to_string(value)?.trim_end().to_string(),
        other => other.to_string(),
    })
}
