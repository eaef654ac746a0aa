//! Manifest document formats
//!
//! Decodes manifest text into the raw document consumed by [`crate::parse`]:
//! - YAML via serde_yaml
//! - JSON via serde_json

use crate::definition::DagDefinition;
use crate::error::{ManifestError, ManifestResult};
use serde_json::Value;
use std::path::Path;

mod json;
mod yaml;

pub use json::JsonFormat;
pub use yaml::YamlFormat;

/// Decoder from manifest text to a raw document
///
/// Implement this trait to add support for new file formats.
pub trait ManifestFormat: Send + Sync + 'static {
    /// Short format name used in error messages
    fn name(&self) -> &'static str;

    /// Decode text into a raw document
    ///
    /// # Errors
    /// Returns [`ManifestError::Syntax`] if the text is malformed
    fn load(&self, text: &str) -> ManifestResult<Value>;

    /// Supported file extensions (without dot)
    fn extensions(&self) -> &[&str];

    /// Check if this format can handle the given path
    fn can_load(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| self.extensions().contains(&ext))
    }

    /// Priority (higher = tried first when multiple formats match)
    fn priority(&self) -> i32 {
        0
    }
}

/// Formats resolved by file extension
pub struct FormatRegistry {
    formats: Vec<Box<dyn ManifestFormat>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        default_formats()
    }
}

impl std::fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("format_count", &self.formats.len())
            .field("extensions", &self.all_extensions())
            .finish()
    }
}

impl FormatRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            formats: Vec::new(),
        }
    }

    /// Register a format
    pub fn register<F: ManifestFormat>(&mut self, format: F) {
        self.formats.push(Box::new(format));
        self.formats
            .sort_by_key(|f| std::cmp::Reverse(f.priority()));
    }

    /// Find format for path
    #[must_use]
    pub fn find_for_path(&self, path: &Path) -> Option<&dyn ManifestFormat> {
        self.formats.iter().find(|f| f.can_load(path)).map(|f| &**f)
    }

    /// Get all registered extensions
    #[must_use]
    pub fn all_extensions(&self) -> Vec<&str> {
        self.formats
            .iter()
            .flat_map(|f| f.extensions())
            .copied()
            .collect()
    }

    /// Read, decode and validate a manifest file
    ///
    /// # Errors
    /// - [`ManifestError::UnsupportedFormat`] if no format matches the extension
    /// - [`ManifestError::Io`] if the file cannot be read
    /// - any validation error from [`crate::parse`]
    pub fn load_file(&self, path: impl AsRef<Path>) -> ManifestResult<DagDefinition> {
        let path = path.as_ref();
        let format = self.find_for_path(path).ok_or_else(|| {
            ManifestError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("")
                    .to_string(),
            )
        })?;
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::io_error(path, e))?;
        tracing::debug!(path = %path.display(), format = format.name(), "loading manifest");
        parse_str(&text, format)
    }
}

/// Create default registry with the built-in formats
#[inline]
#[must_use]
pub fn default_formats() -> FormatRegistry {
    let mut registry = FormatRegistry::new();
    registry.register(YamlFormat);
    registry.register(JsonFormat);
    registry
}

/// Decode `text` with `format` and validate it
///
/// # Errors
/// Returns the decoding or validation error
pub fn parse_str(text: &str, format: &dyn ManifestFormat) -> ManifestResult<DagDefinition> {
    let document = format.load(text)?;
    crate::parse(&document)
}

/// Read and validate a manifest file using the default formats
///
/// # Errors
/// See [`FormatRegistry::load_file`]
pub fn load_file(path: impl AsRef<Path>) -> ManifestResult<DagDefinition> {
    default_formats().load_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_finds_by_extension() {
        let registry = default_formats();
        assert_eq!(registry.find_for_path(Path::new("p.yaml")).unwrap().name(), "yaml");
        assert_eq!(registry.find_for_path(Path::new("p.yml")).unwrap().name(), "yaml");
        assert_eq!(registry.find_for_path(Path::new("dir/p.json")).unwrap().name(), "json");
        assert!(registry.find_for_path(Path::new("p.toml")).is_none());
        assert!(registry.find_for_path(Path::new("p")).is_none());
    }

    #[test]
    fn json_takes_priority() {
        let registry = default_formats();
        assert_eq!(registry.all_extensions().first(), Some(&"json"));
    }

    #[test]
    fn unsupported_extension_is_reported() {
        let result = load_file("persona.toml");
        assert!(matches!(result, Err(ManifestError::UnsupportedFormat(ext)) if ext == "toml"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = load_file("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ManifestError::Io { .. })));
    }

    #[test]
    fn load_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("persona.yaml");
        std::fs::write(
            &path,
            "name: Demo\npersona: demo\nstages:\n  - id: only\n    produces: [x]\n",
        )
        .unwrap();
        let def = load_file(&path).unwrap();
        assert_eq!(def.persona(), "demo");
        assert_eq!(def.root_ids(), ["only"]);
    }

    #[test]
    fn registry_debug() {
        let debug_str = format!("{:?}", default_formats());
        assert!(debug_str.contains("FormatRegistry"));
    }
}
