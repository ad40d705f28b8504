//! CLI command definitions for config-tree
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands.

use crate::format::Format;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Output format for `convert` and `merge`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    #[default]
    Yaml,
    Json,
}

impl From<FormatArg> for Format {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Yaml => Format::Yaml,
            FormatArg::Json => Format::Json,
        }
    }
}

/// Inspect and edit hierarchical YAML/JSON configuration files
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to operate on (.yaml, .yml or .json)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub file: PathBuf,

    /// Path separator used in PATH arguments
    #[arg(short, long, global = true, default_value_t = '.')]
    pub separator: char,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the value stored at a path
    Get {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Store a value at a path, creating intermediate sections
    Set {
        #[arg(value_name = "PATH")]
        path: String,

        /// Value parsed as a YAML fragment (`42`, `true`, `[a, b]`, `{x: 1}`)
        #[arg(value_name = "VALUE")]
        value: String,
    },

    /// Remove the value at a path, pruning emptied sections
    Remove {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// List the keys of a section (the root when no path is given)
    Keys {
        #[arg(value_name = "PATH")]
        path: Option<String>,

        /// Include nested keys as full paths
        #[arg(long)]
        deep: bool,
    },

    /// Overlay a defaults file under the configuration
    Merge {
        /// Defaults file read as the fallback layer
        #[arg(long, value_name = "FILE")]
        defaults: PathBuf,

        /// Copy missing defaults into the file instead of printing the result
        #[arg(long)]
        write: bool,

        /// Output format when printing
        #[arg(long, value_enum)]
        to: Option<FormatArg>,
    },

    /// Re-serialize the configuration in another format
    Convert {
        /// Target format
        #[arg(long, value_enum, default_value_t = FormatArg::Yaml)]
        to: FormatArg,

        /// Write to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}
