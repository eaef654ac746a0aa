//! Testing utilities for the stagetree workspace
//!
//! Shared fixtures and helpers. The federation fixture is the persona the
//! integration tests are written against:
//!
//! ```text
//! search -> gather -> review (optional, completes with gather)
//!                  -> rename (optional) --+
//!                  -----------------------+-> harmonize -> code -> publish (never completes)
//! ```

#![allow(missing_docs)]

use serde_json::{json, Value};
use stagetree_core::{CompiledPersona, Materialization, MaterializationEngine, MemoryStore, SessionStore};
use stagetree_manifest::{parse_str, DagDefinition, JsonFormat, YamlFormat};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Federation persona manifest (YAML)
pub const FEDERATION_YAML: &str = include_str!("fixtures/federation.yaml");

/// Two-stage persona ending in an action stage (JSON)
pub const MINIMAL_JSON: &str = include_str!("fixtures/minimal.json");

/// Session root used by in-memory tests
pub const SESSION: &str = "/sessions/fedsearch/s1";

pub fn federation_definition() -> DagDefinition {
    parse_str(FEDERATION_YAML, &YamlFormat).unwrap()
}

pub fn minimal_definition() -> DagDefinition {
    parse_str(MINIMAL_JSON, &JsonFormat).unwrap()
}

pub fn federation_persona() -> Arc<CompiledPersona> {
    Arc::new(CompiledPersona::compile(federation_definition()).unwrap())
}

pub fn memory_engine() -> MaterializationEngine<MemoryStore> {
    MaterializationEngine::new(federation_persona(), MemoryStore::new())
}

pub fn session() -> &'static Path {
    Path::new(SESSION)
}

/// Payload tagged with the stage id and a revision number
pub fn payload(stage: &str, revision: u32) -> Value {
    json!({"stage": stage, "revision": revision})
}

/// Materialize `stages` in order with revision 1 payloads
pub fn run_stages<S: SessionStore>(
    engine: &MaterializationEngine<S>,
    session: &Path,
    stages: &[&str],
) -> Vec<Materialization> {
    stages
        .iter()
        .map(|stage| engine.materialize(session, stage, payload(stage, 1)).unwrap())
        .collect()
}

/// Write the federation manifest into `dir` and return its path
pub fn write_federation_manifest(dir: &Path) -> PathBuf {
    let path = dir.join("federation.yaml");
    std::fs::write(&path, FEDERATION_YAML).unwrap();
    path
}

/// Relative paths of every stored file below `session`, as strings
pub fn stored_files(store: &MemoryStore, session: &Path) -> Vec<String> {
    store
        .files_under(session)
        .into_iter()
        .filter_map(|p| p.strip_prefix(session).ok().map(|r| r.display().to_string()))
        .collect()
}
