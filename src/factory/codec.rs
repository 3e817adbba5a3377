use anyhow::Context as _;
use std::sync::Arc;

/// Decodes a configuration file into a JSON tree.
///
/// Serialization components implement this and are registered with
/// [`TypeBindingBuilder::codec`](crate::di::TypeBindingBuilder::codec). The
/// decoded tree is handed to the configuration type's deserializable
/// binding.
pub trait Codec: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        serde_json::from_slice(bytes).context("invalid JSON document")
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

impl Codec for YamlCodec {
    fn decode(&self, bytes: &[u8]) -> anyhow::Result<serde_json::Value> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(serde_json::Value::Object(Default::default()));
        }
        serde_yaml::from_slice(bytes).context("invalid YAML document")
    }
}

/// Codec used for `extension` when no serialization component claims it.
pub(crate) fn builtin_codec(extension: &str) -> Option<Arc<dyn Codec>> {
    match extension {
        "json" => Some(Arc::new(JsonCodec)),
        "yml" | "yaml" => Some(Arc::new(YamlCodec)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec() {
        let value = JsonCodec.decode(br#"{"port": 8080, "hosts": ["a", "b"]}"#).unwrap();
        assert_eq!(value, json!({ "port": 8080, "hosts": ["a", "b"] }));
        assert!(JsonCodec.decode(b"{ nope").is_err());
    }

    #[test]
    fn test_yaml_codec() {
        let value = YamlCodec.decode(b"port: 8080\nhosts:\n  - a\n  - b\n").unwrap();
        assert_eq!(value, json!({ "port": 8080, "hosts": ["a", "b"] }));
        assert_eq!(YamlCodec.decode(b"\n").unwrap(), json!({}));
    }

    #[test]
    fn test_builtin_codecs() {
        assert!(builtin_codec("json").is_some());
        assert!(builtin_codec("yml").is_some());
        assert!(builtin_codec("yaml").is_some());
        assert!(builtin_codec("toml").is_none());
    }
}
