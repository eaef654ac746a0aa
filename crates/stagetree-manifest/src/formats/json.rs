//! JSON manifest format

use super::ManifestFormat;
use crate::error::{ManifestError, ManifestResult};
use serde_json::Value;

/// JSON format
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl ManifestFormat for JsonFormat {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self, text: &str) -> ManifestResult<Value> {
        serde_json::from_str(text).map_err(|e| ManifestError::Syntax {
            format: "json",
            message: e.to_string(),
        })
    }

    fn extensions(&self) -> &[&str] {
        &["json"]
    }

    fn priority(&self) -> i32 {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::parse_str;

    #[test]
    fn parses_json_manifest() {
        let text = r#"{
            "name": "Demo", "persona": "demo", "locked": true,
            "stages": [
                {"id": "a", "previous": null, "produces": ["x"]},
                {"id": "b", "previous": ["a"], "produces": ["y"], "handler": "fed-b"}
            ]
        }"#;
        let def = parse_str(text, &JsonFormat).unwrap();
        assert!(def.header().locked);
        assert_eq!(def.node("b").unwrap().handler.as_deref(), Some("fed-b"));
        assert_eq!(def.terminal_ids(), ["b"]);
    }

    #[test]
    fn malformed_json_is_syntax_error() {
        assert!(matches!(
            JsonFormat.load("{\"name\": "),
            Err(ManifestError::Syntax { format: "json", .. })
        ));
    }
}
