//! Structured error types for tree and binding operations.
//!
//! A value whose persisted shape does not match the requested type is not an
//! error anywhere in this crate: conversions return `Option` and the binder
//! turns a miss into a self-healing write. The errors below are programming
//! or I/O failures and are always surfaced to the caller.

use std::fmt;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    EmptyPath,
    InvalidPath,
    NotASection,

    // Bind errors
    NoLoader,
    ConstructorMismatch,
    DuplicatePath,
    DepthExceeded,

    // Persistence errors
    Io,
    Parse,
    UnsupportedFormat,
}

/// Coarse grouping of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Malformed paths or misuse of the tree API.
    Validation,
    /// Static binding mistakes detected while walking declared fields.
    Bind,
    /// Reading, writing or parsing a persisted document.
    Io,
}

impl ErrorCode {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::EmptyPath | ErrorCode::InvalidPath | ErrorCode::NotASection => {
                ErrorCategory::Validation
            }
            ErrorCode::NoLoader
            | ErrorCode::ConstructorMismatch
            | ErrorCode::DuplicatePath
            | ErrorCode::DepthExceeded => ErrorCategory::Bind,
            ErrorCode::Io | ErrorCode::Parse | ErrorCode::UnsupportedFormat => ErrorCategory::Io,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::EmptyPath => "EMPTY_PATH",
            ErrorCode::InvalidPath => "INVALID_PATH",
            ErrorCode::NotASection => "NOT_A_SECTION",
            ErrorCode::NoLoader => "NO_LOADER",
            ErrorCode::ConstructorMismatch => "CONSTRUCTOR_MISMATCH",
            ErrorCode::DuplicatePath => "DUPLICATE_PATH",
            ErrorCode::DepthExceeded => "DEPTH_EXCEEDED",
            ErrorCode::Io => "IO",
            ErrorCode::Parse => "PARSE",
            ErrorCode::UnsupportedFormat => "UNSUPPORTED_FORMAT",
        };
        f.write_str(name)
    }
}

/// Structured error for configuration operations.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ConfigError {
    pub code: ErrorCode,
    pub message: String,
    pub path: Option<String>,
    pub details: Option<String>,
}

impl ConfigError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: None,
            details: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    pub fn is_bind(&self) -> bool {
        self.category() == ErrorCategory::Bind
    }

    // Convenience constructors

    pub fn empty_path() -> Self {
        Self::new(ErrorCode::EmptyPath, "Path must not be empty")
    }

    pub fn invalid_path(path: &str, reason: &str) -> Self {
        Self::new(
            ErrorCode::InvalidPath,
            format!("Invalid path '{}': {}", path, reason),
        )
        .with_path(path)
    }

    pub fn not_a_section(what: &str) -> Self {
        Self::new(
            ErrorCode::NotASection,
            format!("Expected a section (mapping) but found {}", what),
        )
    }

    pub fn no_loader(path: &str, type_name: &str) -> Self {
        Self::new(
            ErrorCode::NoLoader,
            format!("No field loader can handle '{}' of type {}", path, type_name),
        )
        .with_path(path)
    }

    pub fn constructor_mismatch(type_name: &str, properties: usize, arity: Option<usize>) -> Self {
        let message = match arity {
            Some(arity) => format!(
                "Constructor for {} takes {} argument(s) but {} properties are declared",
                type_name, arity, properties
            ),
            None => format!("No constructor declared for {}", type_name),
        };
        Self::new(ErrorCode::ConstructorMismatch, message)
    }

    pub fn duplicate_path(path: &str) -> Self {
        Self::new(
            ErrorCode::DuplicatePath,
            format!("Path '{}' is bound more than once", path),
        )
        .with_path(path)
    }

    pub fn depth_exceeded(path: &str, max_depth: usize) -> Self {
        Self::new(
            ErrorCode::DepthExceeded,
            format!("Nested sections at '{}' exceed the maximum depth of {}", path, max_depth),
        )
        .with_path(path)
    }

    pub fn io(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Io, err.to_string())
    }

    pub fn parse(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::Parse, err.to_string())
    }

    pub fn unsupported_format(name: &str) -> Self {
        Self::new(
            ErrorCode::UnsupportedFormat,
            format!("Unsupported config format: {}", name),
        )
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::parse(err)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::parse(err)
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
