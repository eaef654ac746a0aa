//! Persona registry
//!
//! Personas are compiled once (manifest parsed, default topology resolved)
//! and shared as `Arc<CompiledPersona>` by every session that uses them.
//! The registry is an explicit value built at startup and passed to
//! callers; there is no process-wide instance.

use crate::error::{RegistryError, TopologyError};
use crate::topology::Topology;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use stagetree_manifest::{DagDefinition, FormatRegistry};
use std::path::Path;
use std::sync::Arc;

/// A parsed definition together with its default topology
#[derive(Debug, Clone)]
pub struct CompiledPersona {
    definition: DagDefinition,
    topology: Topology,
}

impl CompiledPersona {
    /// Resolve the default topology of `definition`
    ///
    /// # Errors
    /// Returns error if a stage path cannot be built
    pub fn compile(definition: DagDefinition) -> Result<Self, TopologyError> {
        let topology = Topology::resolve(&definition)?;
        Ok(Self {
            definition,
            topology,
        })
    }

    /// Persona id
    #[inline]
    #[must_use]
    pub fn persona(&self) -> &str {
        self.definition.persona()
    }

    /// Validated stage graph
    #[inline]
    #[must_use]
    pub fn definition(&self) -> &DagDefinition {
        &self.definition
    }

    /// Default stage paths
    #[inline]
    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }
}

/// Compiled personas keyed by persona id
#[derive(Debug, Default)]
pub struct PersonaRegistry {
    personas: DashMap<String, Arc<CompiledPersona>>,
}

impl PersonaRegistry {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register `definition`
    ///
    /// # Errors
    /// - [`RegistryError::DuplicatePersona`] if the persona id is taken
    /// - [`RegistryError::Topology`] if compilation fails
    pub fn register(&self, definition: DagDefinition) -> Result<Arc<CompiledPersona>, RegistryError> {
        let persona = definition.persona().to_string();
        match self.personas.entry(persona) {
            Entry::Occupied(entry) => Err(RegistryError::DuplicatePersona {
                persona: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                let compiled = Arc::new(CompiledPersona::compile(definition)?);
                tracing::info!(
                    persona = compiled.persona(),
                    stages = compiled.definition().len(),
                    "registered persona"
                );
                entry.insert(Arc::clone(&compiled));
                Ok(compiled)
            }
        }
    }

    /// Look up a persona
    #[must_use]
    pub fn get(&self, persona: &str) -> Option<Arc<CompiledPersona>> {
        self.personas.get(persona).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a persona is registered
    #[inline]
    #[must_use]
    pub fn contains(&self, persona: &str) -> bool {
        self.personas.contains_key(persona)
    }

    /// Registered persona ids, sorted
    #[must_use]
    pub fn personas(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.personas.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Number of registered personas
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.personas.len()
    }

    /// Check if no persona is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }

    /// Register every manifest file in `dir` (not recursive)
    ///
    /// Files are visited in name order; files without a known manifest
    /// extension are ignored. Returns the number of personas registered.
    ///
    /// # Errors
    /// Stops at the first unreadable directory, invalid manifest or
    /// duplicate persona
    pub fn load_dir(&self, dir: impl AsRef<Path>, formats: &FormatRegistry) -> Result<usize, RegistryError> {
        let dir = dir.as_ref();
        let io_error = |source| RegistryError::Io {
            path: dir.to_path_buf(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io_error)? {
            let path = entry.map_err(io_error)?.path();
            if path.is_file() && formats.find_for_path(&path).is_some() {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            let definition = formats
                .load_file(path)
                .map_err(|source| RegistryError::Manifest {
                    path: path.clone(),
                    source,
                })?;
            self.register(definition)?;
        }

        tracing::debug!(dir = %dir.display(), count = files.len(), "loaded manifest directory");
        Ok(files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use stagetree_manifest::{default_formats, parse};

    fn definition(persona: &str) -> DagDefinition {
        parse(&json!({
            "name": persona, "persona": persona,
            "stages": [{"id": "only", "previous": null, "produces": ["x"]}]
        }))
        .unwrap()
    }

    #[test]
    fn register_and_get() {
        let registry = PersonaRegistry::new();
        let compiled = registry.register(definition("fed")).unwrap();
        assert_eq!(compiled.persona(), "fed");
        assert!(registry.contains("fed"));

        let fetched = registry.get("fed").unwrap();
        assert!(Arc::ptr_eq(&compiled, &fetched));
        assert!(registry.get("other").is_none());
    }

    #[test]
    fn duplicate_persona_is_rejected() {
        let registry = PersonaRegistry::new();
        registry.register(definition("fed")).unwrap();
        let result = registry.register(definition("fed"));
        assert!(matches!(
            result,
            Err(RegistryError::DuplicatePersona { persona }) if persona == "fed"
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn personas_are_sorted() {
        let registry = PersonaRegistry::new();
        for p in ["zeta", "alpha", "mid"] {
            registry.register(definition(p)).unwrap();
        }
        assert_eq!(registry.personas(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn load_dir_registers_known_formats() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.yaml"),
            "name: A\npersona: a\nstages:\n  - id: s\n    produces: [x]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.json"),
            r#"{"name": "B", "persona": "b", "stages": [{"id": "s", "produces": ["x"]}]}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let registry = PersonaRegistry::new();
        let count = registry.load_dir(dir.path(), &default_formats()).unwrap();
        assert_eq!(count, 2);
        assert_eq!(registry.personas(), vec!["a", "b"]);
    }

    #[test]
    fn load_dir_reports_bad_manifest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.yaml"), "name: X\npersona: x\nstages: []\n").unwrap();

        let registry = PersonaRegistry::new();
        let result = registry.load_dir(dir.path(), &default_formats());
        assert!(matches!(result, Err(RegistryError::Manifest { .. })));
    }

    #[test]
    fn load_dir_missing_directory() {
        let registry = PersonaRegistry::new();
        let result = registry.load_dir("/definitely/not/here", &default_formats());
        assert!(matches!(result, Err(RegistryError::Io { .. })));
    }
}
