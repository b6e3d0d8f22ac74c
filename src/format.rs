//! Serialization formats for configuration files.

use crate::error::{ConfigError, Result};
use crate::value::{Node, Value};
use std::path::Path;

/// On-disk format of a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

impl Format {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            _ => None,
        }
    }

    /// File extension used for the standard `config.<ext>` locations.
    pub fn extension(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yml",
        }
    }

    /// Whether this build can read and write the format.
    pub fn is_available(self) -> bool {
        match self {
            Format::Json => true,
            Format::Yaml => cfg!(feature = "yaml"),
        }
    }

    /// Fail with [`ConfigError::YamlUnsupported`] if the codec is missing.
    pub fn ensure_available(self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ConfigError::YamlUnsupported)
        }
    }

    /// Parse a document whose top level must be a mapping.
    ///
    /// `path` is only used for error messages. An empty YAML document is an
    /// empty mapping.
    pub fn decode(self, text: &str, path: &Path) -> Result<Node> {
        let value: Value = match self {
            Format::Json => serde_json::from_str(text).map_err(|e| ConfigError::parse(path, e))?,
            Format::Yaml => decode_yaml(text, path)?,
        };

        match value {
            Value::Node(node) => Ok(node),
            Value::Null if self == Format::Yaml => Ok(Node::new()),
            other => Err(ConfigError::parse(
                path,
                format!("top level must be a mapping, found a {}", other.kind()),
            )),
        }
    }

    /// Serialize a tree. JSON is pretty-printed; YAML uses block style.
    /// Both end with a newline.
    pub fn encode(self, node: &Node) -> Result<String> {
        match self {
            Format::Json => {
                let mut text = serde_json::to_string_pretty(node)
                    .map_err(|e| ConfigError::Encode(e.to_string()))?;
                text.push('\n');
                Ok(text)
            }
            Format::Yaml => encode_yaml(node),
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}

/// Decode YAML, folding `<<` merge keys into their mappings first.
#[cfg(feature = "yaml")]
fn decode_yaml(text: &str, path: &Path) -> Result<Value> {
    use serde::Deserialize;

    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let mut document: serde_yaml::Value =
        serde_yaml::from_str(text).map_err(|e| ConfigError::parse(path, e))?;
    document
        .apply_merge()
        .map_err(|e| ConfigError::parse(path, e))?;
    Value::deserialize(document).map_err(|e| ConfigError::parse(path, e))
}

#[cfg(not(feature = "yaml"))]
fn decode_yaml(_text: &str, _path: &Path) -> Result<Value> {
    Err(ConfigError::YamlUnsupported)
}

#[cfg(feature = "yaml")]
fn encode_yaml(node: &Node) -> Result<String> {
    serde_yaml::to_string(node).map_err(|e| ConfigError::Encode(e.to_string()))
}

#[cfg(not(feature = "yaml"))]
fn encode_yaml(_node: &Node) -> Result<String> {
    Err(ConfigError::YamlUnsupported)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_str() {
        assert_eq!(Format::from_str("JSON"), Some(Format::Json));
        assert_eq!(Format::from_str("yml"), Some(Format::Yaml));
        assert_eq!(Format::from_str("toml"), None);
    }

    #[test]
    fn test_extensions() {
        assert_eq!(Format::Json.extension(), "json");
        assert_eq!(Format::Yaml.extension(), "yml");
    }

    #[test]
    fn test_decode_json() {
        let node = Format::Json
            .decode(r#"{"host": "example.com", "nested": {"port": 9000}}"#, Path::new("c.json"))
            .unwrap();
        assert_eq!(node, json!({"host": "example.com", "nested": {"port": 9000}}));
        assert!(node.node("nested").is_some());
    }

    #[test]
    fn test_decode_rejects_non_mapping() {
        let err = Format::Json.decode("[1, 2]", Path::new("c.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("top level must be a mapping"));
    }

    #[test]
    fn test_decode_malformed_json() {
        let err = Format::Json.decode("{not json", Path::new("bad.json")).unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_encode_json_pretty() {
        let node = Node::try_from(json!({"a": 1, "b": {"c": [true, null]}})).unwrap();
        let text = Format::Json.encode(&node).unwrap();
        assert!(text.ends_with("}\n"));
        assert!(text.contains("\n  \"a\": 1"));
        let back = Format::Json.decode(&text, Path::new("c.json")).unwrap();
        assert_eq!(back, node);
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_decode_yaml_with_integer_keys() {
        let text = "plugins:\n  $insert:\n    0: first\n";
        let node = Format::Yaml.decode(text, Path::new("c.yml")).unwrap();
        assert_eq!(node, json!({"plugins": {"$insert": {"0": "first"}}}));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_decode_yaml_merge_keys() {
        let text = "base: &b\n  host: h\n  port: 1\nsvc:\n  <<: *b\n  port: 2\n";
        let node = Format::Yaml.decode(text, Path::new("c.yml")).unwrap();
        assert_eq!(
            node,
            json!({"base": {"host": "h", "port": 1}, "svc": {"host": "h", "port": 2}})
        );
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_decode_yaml_non_finite_float_is_null() {
        let node = Format::Yaml.decode("limit: .inf\nratio: 0.5\n", Path::new("c.yml")).unwrap();
        assert_eq!(node, json!({"limit": null, "ratio": 0.5}));
    }

    #[cfg(not(feature = "yaml"))]
    #[test]
    fn test_yaml_unavailable_without_feature() {
        assert!(!Format::Yaml.is_available());
        let err = Format::Yaml.decode("a: 1\n", Path::new("c.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::YamlUnsupported));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_decode_empty_yaml() {
        let node = Format::Yaml.decode("", Path::new("c.yml")).unwrap();
        assert!(node.is_empty());
        let node = Format::Yaml.decode("\n  \n", Path::new("c.yml")).unwrap();
        assert!(node.is_empty());
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_encode_yaml_block_style() {
        let node = Node::try_from(json!({"server": {"host": "h", "ports": [1, 2]}})).unwrap();
        let text = Format::Yaml.encode(&node).unwrap();
        assert!(text.contains("server:\n  host: h\n"));
        assert!(!text.contains('{'));
        let back = Format::Yaml.decode(&text, Path::new("c.yml")).unwrap();
        assert_eq!(back, node);
    }
}
