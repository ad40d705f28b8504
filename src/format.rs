//! Text formats for persisted trees.
//!
//! YAML and JSON documents parse into a [`Configuration`] and serialize back
//! with key order preserved. YAML output carries the tree's header and
//! per-path comments as `#` lines; JSON has no comment syntax and drops them.

use crate::error::{ConfigError, ConfigResult};
use crate::path::PathKey;
use crate::tree::{ConfigOptions, Configuration};
use serde_json::{Map, Number, Value};
use std::path::Path;
use tracing::warn;

/// Supported document formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

impl Format {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(Format::Yaml),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_str(extension).ok_or_else(|| {
            let shown = if extension.is_empty() {
                path.display().to_string()
            } else {
                extension.to_string()
            };
            ConfigError::unsupported_format(&shown)
        })
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Yaml => "yaml",
            Format::Json => "json",
        }
    }

    /// Parse a document with default tree options.
    pub fn parse(&self, text: &str) -> ConfigResult<Configuration> {
        self.parse_with(text, ConfigOptions::default())
    }

    /// Parse a document into a tree using `options`. An empty document is an
    /// empty tree; a document whose root is not a mapping is an error.
    pub fn parse_with(&self, text: &str, options: ConfigOptions) -> ConfigResult<Configuration> {
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            match self {
                Format::Yaml => yaml_to_json(serde_yaml::from_str::<serde_yaml::Value>(text)?),
                Format::Json => serde_json::from_str::<Value>(text)?,
            }
        };

        let mut config = Configuration::from_value(value)?;
        *config.options_mut() = options;
        if *self == Format::Yaml {
            config.set_header(parse_header(text));
        }
        Ok(config)
    }

    /// Render the tree's read view. With `copy_defaults` enabled, defaults
    /// missing from the primary tree are written too.
    pub fn serialize(&self, config: &Configuration) -> ConfigResult<String> {
        match self {
            Format::Json => {
                let mut text = serde_json::to_string_pretty(&config.to_value())?;
                text.push('\n');
                Ok(text)
            }
            Format::Yaml => {
                let mut out = String::new();
                if let Some(header) = config.header() {
                    push_comment(&mut out, header, 0);
                    out.push('\n');
                }
                if let Value::Object(root) = config.to_value() {
                    emit_section(&mut out, config, &root, &PathKey::root(), 0)?;
                }
                Ok(out)
            }
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Parse a YAML fragment (scalar, flow sequence or flow mapping) into a raw
/// value. Blank text is the empty string rather than null.
pub fn parse_value(text: &str) -> ConfigResult<Value> {
    if text.trim().is_empty() {
        return Ok(Value::String(text.to_string()));
    }
    Ok(yaml_to_json(serde_yaml::from_str::<serde_yaml::Value>(text)?))
}

/// Leading `#` lines of a YAML document, with the marker stripped. The block
/// only counts as a header when a blank line (or the end of the document)
/// follows it; otherwise it belongs to the first key.
fn parse_header(text: &str) -> Option<String> {
    let mut lines = text.lines().peekable();
    let mut header = Vec::new();
    while let Some(line) = lines.next_if(|line| line.trim_start().starts_with('#')) {
        let line = line.trim_start().trim_start_matches('#');
        header.push(line.strip_prefix(' ').unwrap_or(line));
    }
    let terminated = lines.peek().is_none_or(|line| line.trim().is_empty());
    if header.is_empty() || !terminated {
        None
    } else {
        Some(header.join("\n"))
    }
}

/// Convert a YAML value to the tree's raw form. Mapping keys become strings;
/// tags are dropped; non-finite floats and complex keys are skipped.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (key, value) in mapping {
                match yaml_key(key) {
                    Some(key) => {
                        map.insert(key, yaml_to_json(value));
                    }
                    None => warn!("Skipping mapping entry with a non-scalar key"),
                }
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> Option<String> {
    match key {
        serde_yaml::Value::String(s) => Some(s),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        serde_yaml::Value::Tagged(tagged) => yaml_key(tagged.value),
        _ => None,
    }
}

fn push_comment(out: &mut String, comment: &str, indent: usize) {
    for line in comment.lines() {
        out.push_str(&" ".repeat(indent));
        if line.is_empty() {
            out.push_str("#\n");
        } else {
            out.push_str("# ");
            out.push_str(line);
            out.push('\n');
        }
    }
}

fn emit_section(
    out: &mut String,
    config: &Configuration,
    map: &Map<String, Value>,
    prefix: &PathKey,
    indent: usize,
) -> ConfigResult<()> {
    let pad = " ".repeat(indent);
    for (key, value) in map {
        let path = prefix.child(key).ok();
        if let Some(comment) = path.as_ref().and_then(|p| config.comment_at(p)) {
            push_comment(out, comment, indent);
        }

        let rendered_key = serde_yaml::to_string(key)?;
        let rendered_key = rendered_key.trim_end();

        match value {
            Value::Object(child) if !child.is_empty() => {
                out.push_str(&format!("{}{}:\n", pad, rendered_key));
                let child_prefix = path.unwrap_or_else(|| prefix.clone());
                emit_section(out, config, child, &child_prefix, indent + 2)?;
            }
            Value::Array(items) if !items.is_empty() => {
                out.push_str(&format!("{}{}:\n", pad, rendered_key));
                let block = serde_yaml::to_string(value)?;
                for line in block.lines() {
                    out.push_str(&format!("{}  {}\n", pad, line));
                }
            }
            _ => {
                let block = serde_yaml::to_string(value)?;
                let mut lines = block.lines();
                let first = lines.next().unwrap_or_default();
                out.push_str(&format!("{}{}: {}\n", pad, rendered_key, first));
                for line in lines {
                    out.push_str(&format!("{}{}\n", pad, line));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{ConfigSection, ConfigSectionMut};
    use serde_json::json;

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a/config.yml")).unwrap(), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("config.JSON")).unwrap(), Format::Json);
        let err = Format::from_path(Path::new("config.toml")).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::UnsupportedFormat);
        assert!(Format::from_path(Path::new("config")).is_err());
    }

    #[test]
    fn test_parse_yaml_keeps_order() {
        let yaml = "zeta: 1\nalpha:\n  b: true\n  a: [1, 2]\nmid: text\n";
        let config = Format::Yaml.parse(yaml).unwrap();
        assert_eq!(config.keys(true), vec!["zeta", "alpha", "alpha.b", "alpha.a", "mid"]);
        assert_eq!(config.get("alpha.a"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_parse_yaml_stringifies_keys() {
        let config = Format::Yaml.parse("levels:\n  1: low\n  2: high\n").unwrap();
        assert_eq!(config.get_string("levels.2").as_deref(), Some("high"));
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert!(Format::Yaml.parse("").unwrap().is_empty());
        assert!(Format::Json.parse("  \n").unwrap().is_empty());
        assert!(Format::Yaml.parse("- a\n- b\n").unwrap_err().is_validation());
        assert_eq!(
            Format::Json.parse("{").unwrap_err().code,
            crate::error::ErrorCode::Parse
        );
    }

    #[test]
    fn test_yaml_round_trip_with_comments() {
        let mut config = Configuration::new();
        config.set_header(Some("Server settings".to_string()));
        config.set("server.port", 8080).unwrap();
        config.set("server.hosts", json!(["a", "b"])).unwrap();
        config.set("motd", "line one\nline two").unwrap();
        config.set("empty", json!([])).unwrap();
        config.set_comment("server.port", "Listen port").unwrap();
        config.set_comment("server", "Network").unwrap();

        let text = Format::Yaml.serialize(&config).unwrap();
        assert!(text.starts_with("# Server settings\n\n"));
        assert!(text.contains("# Network\nserver:\n  # Listen port\n  port: 8080\n"));

        let parsed = Format::Yaml.parse(&text).unwrap();
        assert_eq!(parsed.to_value(), config.to_value());
        assert_eq!(parsed.header(), Some("Server settings"));
        assert_eq!(parsed.get_string("motd").as_deref(), Some("line one\nline two"));
    }

    #[test]
    fn test_header_needs_blank_line() {
        let config = Format::Yaml.parse("# About\n#\n# more\n\na: 1\n").unwrap();
        assert_eq!(config.header(), Some("About\n\nmore"));
        let config = Format::Yaml.parse("# key comment\na: 1\n").unwrap();
        assert_eq!(config.header(), None);
    }

    #[test]
    fn test_yaml_quotes_ambiguous_strings() {
        let mut config = Configuration::new();
        config.set("answer", "yes").unwrap();
        config.set("version", "1.0").unwrap();
        let text = Format::Yaml.serialize(&config).unwrap();
        let parsed = Format::Yaml.parse(&text).unwrap();
        assert_eq!(parsed.get("answer"), Some(&json!("yes")));
        assert_eq!(parsed.get("version"), Some(&json!("1.0")));
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = Configuration::new();
        config.set("b.x", 1.5).unwrap();
        config.set("a", json!({"k": [true, false]})).unwrap();
        let text = Format::Json.serialize(&config).unwrap();
        assert!(text.find("\"b\"").unwrap() < text.find("\"a\"").unwrap());
        let parsed = Format::Json.parse(&text).unwrap();
        assert_eq!(parsed.to_value(), config.to_value());
    }

    #[test]
    fn test_serialize_includes_copied_defaults() {
        let mut config = Configuration::with_options(ConfigOptions::default().with_copy_defaults(true));
        config.add_default("retries", 3).unwrap();
        config.set("name", "svc").unwrap();
        let text = Format::Json.serialize(&config).unwrap();
        let parsed = Format::Json.parse(&text).unwrap();
        assert_eq!(parsed.to_value(), json!({"retries": 3, "name": "svc"}));
    }

    #[test]
    fn test_parse_value_fragments() {
        assert_eq!(parse_value("42").unwrap(), json!(42));
        assert_eq!(parse_value("true").unwrap(), json!(true));
        assert_eq!(parse_value("hello world").unwrap(), json!("hello world"));
        assert_eq!(parse_value("[a, 1]").unwrap(), json!(["a", 1]));
        assert_eq!(parse_value("{x: 1}").unwrap(), json!({"x": 1}));
        assert_eq!(parse_value("").unwrap(), json!(""));
    }

    #[test]
    fn test_parse_with_options() {
        let options = ConfigOptions::default().with_separator('/');
        let config = Format::Yaml.parse_with("a:\n  b: 1\n", options).unwrap();
        assert_eq!(config.get_i64("a/b"), Some(1));
    }
}
