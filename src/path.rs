//! Dotted path keys.
//!
//! A `PathKey` is the parsed form of a string such as `database.pool.size`.
//! Segments are split on a literal separator character; there is no escaping,
//! so segment names must not contain the separator.

use crate::error::{ConfigError, ConfigResult};
use std::fmt;

/// Default separator between path segments.
pub const DEFAULT_SEPARATOR: char = '.';

/// An immutable, ordered sequence of non-empty path segments.
///
/// The empty key (`PathKey::root()`) addresses the root of a tree and is only
/// used as an anchor for section views; parsing never produces it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    segments: Vec<String>,
}

impl PathKey {
    /// The key addressing the root section.
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Parse `path` by splitting on `separator`.
    ///
    /// Fails with `EmptyPath` for an empty string and `InvalidPath` when any
    /// segment is empty (leading, trailing or doubled separators).
    pub fn parse(path: &str, separator: char) -> ConfigResult<Self> {
        if path.is_empty() {
            return Err(ConfigError::empty_path());
        }
        let segments: Vec<String> = path.split(separator).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ConfigError::invalid_path(path, "path contains an empty segment"));
        }
        Ok(Self { segments })
    }

    /// Build a key from already-split segments.
    pub fn from_segments<I, S>(segments: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if let Some(pos) = segments.iter().position(String::is_empty) {
            let shown = segments.join(&DEFAULT_SEPARATOR.to_string());
            return Err(ConfigError::invalid_path(
                &shown,
                &format!("segment {} is empty", pos),
            ));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, i.e. the key name inside the parent section.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Key of the parent section; `None` for the root.
    pub fn parent(&self) -> Option<PathKey> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Concatenate two keys.
    pub fn join(&self, other: &PathKey) -> PathKey {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    /// Append a single segment.
    pub fn child(&self, segment: &str) -> ConfigResult<PathKey> {
        if segment.is_empty() {
            return Err(ConfigError::invalid_path(
                &self.to_string(),
                "child segment is empty",
            ));
        }
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Ok(Self { segments })
    }

    pub fn starts_with(&self, prefix: &PathKey) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Strip `prefix`, returning the remainder when this key lies under it.
    pub fn strip_prefix(&self, prefix: &PathKey) -> Option<PathKey> {
        self.segments
            .strip_prefix(prefix.segments.as_slice())
            .map(|rest| Self {
                segments: rest.to_vec(),
            })
    }

    /// Render with an explicit separator.
    pub fn to_string_with(&self, separator: char) -> String {
        self.segments.join(&separator.to_string())
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_with(DEFAULT_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_parse_dotted() {
        let key = PathKey::parse("database.pool.size", '.').unwrap();
        assert_eq!(key.segments(), ["database", "pool", "size"]);
        assert_eq!(key.name(), Some("size"));
        assert_eq!(key.len(), 3);
    }

    #[test]
    fn test_parse_custom_separator() {
        let key = PathKey::parse("a/b.c", '/').unwrap();
        assert_eq!(key.segments(), ["a", "b.c"]);
        assert_eq!(key.to_string_with('/'), "a/b.c");
    }

    #[test]
    fn test_empty_path_is_rejected() {
        let err = PathKey::parse("", '.').unwrap_err();
        assert_eq!(err.code, ErrorCode::EmptyPath);
    }

    #[test]
    fn test_empty_segments_are_rejected() {
        for bad in ["a..b", ".a", "a.", "."] {
            let err = PathKey::parse(bad, '.').unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidPath, "{bad}");
        }
    }

    #[test]
    fn test_equality_is_segment_equality() {
        let dotted = PathKey::parse("a.b", '.').unwrap();
        let slashed = PathKey::parse("a/b", '/').unwrap();
        assert_eq!(dotted, slashed);
    }

    #[test]
    fn test_parent_join_and_strip() {
        let key = PathKey::parse("a.b.c", '.').unwrap();
        let parent = key.parent().unwrap();
        assert_eq!(parent.to_string(), "a.b");
        assert_eq!(PathKey::root().parent(), None);

        let tail = PathKey::parse("c", '.').unwrap();
        assert_eq!(parent.join(&tail), key);
        assert!(key.starts_with(&parent));
        assert_eq!(key.strip_prefix(&parent), Some(tail));
        assert_eq!(parent.strip_prefix(&key), None);
    }

    #[test]
    fn test_child_and_from_segments() {
        let key = PathKey::root().child("server").unwrap();
        assert_eq!(key.to_string(), "server");
        assert!(key.child("").is_err());
        assert!(PathKey::from_segments(["a", "", "c"]).is_err());
        assert_eq!(
            PathKey::from_segments(["a", "b"]).unwrap(),
            PathKey::parse("a.b", '.').unwrap()
        );
    }
}
