//! YAML manifest format
//!
//! One document per file. Anchors and aliases are resolved by serde_yaml;
//! keys must be strings.

use super::ManifestFormat;
use crate::error::{ManifestError, ManifestResult};
use serde::Deserialize;
use serde_json::Value;

/// YAML format
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormat;

impl ManifestFormat for YamlFormat {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn load(&self, text: &str) -> ManifestResult<Value> {
        let mut documents = Vec::new();
        for doc in serde_yaml::Deserializer::from_str(text) {
            let value = Value::deserialize(doc).map_err(|e| ManifestError::Syntax {
                format: "yaml",
                message: e.to_string(),
            })?;
            documents.push(value);
        }

        match documents.len() {
            0 => Ok(Value::Null),
            1 => Ok(documents.remove(0)),
            n => Err(ManifestError::Syntax {
                format: "yaml",
                message: format!("expected a single document, found {n}"),
            }),
        }
    }

    fn extensions(&self) -> &[&str] {
        &["yaml", "yml"]
    }
}
