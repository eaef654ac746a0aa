//! Materialization engine
//!
//! Writes stage artifacts into a session tree:
//!
//! 1. scan the session to realize stage paths (join-collapse applied)
//! 2. collect the fingerprints of present parents; a missing mandatory
//!    parent is a precondition error
//! 3. fingerprint the payload chained to those parents
//! 4. ensure `<path>/meta` and write `<path>/meta/<stage>.json`
//!
//! Re-materializing a stage whose realized path is unchanged overwrites
//! its envelope in place. Root stages therefore never branch.
//!
//! # Concurrency
//!
//! The engine holds no locks. Callers must serialize operations within one
//! session; concurrent calls against the same session can interleave the
//! read-parents / write-envelope sequence and leave an inconsistent
//! lineage. Distinct sessions are independent.

use crate::completion::{self, Position};
use crate::config::StagetreeConfig;
use crate::error::{EngineError, EngineResult};
use crate::registry::CompiledPersona;
use crate::store::SessionStore;
use crate::topology::SessionLineage;
use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;
use stagetree_artifact::{
    ArtifactEnvelope, Fingerprint, ParentFingerprints, StagePath, StagePayload,
    DEFAULT_MAX_PAYLOAD_BYTES,
};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Engine knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Upper bound on a payload's canonical size
    pub max_payload_bytes: usize,
    /// Write envelopes with indentation
    pub pretty_envelopes: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            pretty_envelopes: true,
        }
    }
}

impl From<&StagetreeConfig> for EngineOptions {
    fn from(config: &StagetreeConfig) -> Self {
        Self {
            max_payload_bytes: config.max_payload_bytes,
            pretty_envelopes: config.pretty_envelopes,
        }
    }
}

/// Outcome of one materialization
#[derive(Debug, Clone, PartialEq)]
pub struct Materialization {
    pub stage_id: String,
    /// Realized path, relative to the session root
    pub path: StagePath,
    /// Absolute envelope location
    pub artifact_path: PathBuf,
    pub envelope: ArtifactEnvelope,
    /// An envelope already existed at this path
    pub replaced: bool,
    /// Optional parents without an artifact
    pub skipped_parents: Vec<String>,
}

/// Why a present stage no longer matches its lineage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StaleReason {
    /// Stored fingerprint does not match the stored content
    Tampered,
    /// Recorded parent fingerprint differs from the parent's current one
    ParentChanged { parent: String },
    /// A parent is itself stale
    ParentStale { parent: String },
}

/// A present stage flagged by [`MaterializationEngine::stale_stages`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleStage {
    pub stage_id: String,
    pub reason: StaleReason,
}

/// Materializes stages of one persona into session trees
#[derive(Debug)]
pub struct MaterializationEngine<S> {
    persona: Arc<CompiledPersona>,
    store: S,
    options: EngineOptions,
}

impl<S: SessionStore> MaterializationEngine<S> {
    /// Create engine over `store`
    #[inline]
    #[must_use]
    pub fn new(persona: Arc<CompiledPersona>, store: S) -> Self {
        Self {
            persona,
            store,
            options: EngineOptions::default(),
        }
    }

    /// With options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Compiled persona
    #[inline]
    #[must_use]
    pub fn persona(&self) -> &CompiledPersona {
        &self.persona
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Realize stage paths and presence for `session`
    ///
    /// # Errors
    /// Returns error if a join segment cannot be built
    pub fn lineage(&self, session: &Path) -> EngineResult<SessionLineage> {
        Ok(self.persona.topology().scan(&self.store, session)?)
    }

    /// Materialize `stage` with `content` in `session`
    ///
    /// # Errors
    /// - [`EngineError::UnknownStage`] if the persona has no such stage
    /// - [`EngineError::Payload`] if `content` is null or too large
    /// - [`EngineError::MissingParent`] if a mandatory parent has no artifact
    /// - [`EngineError::CorruptEnvelope`] if a parent envelope is unreadable
    /// - [`EngineError::Store`] on backend failure
    pub fn materialize(&self, session: &Path, stage: &str, content: Value) -> EngineResult<Materialization> {
        let definition = self.persona.definition();
        let node = definition.node(stage).ok_or_else(|| EngineError::UnknownStage {
            stage: stage.to_string(),
        })?;
        let payload = StagePayload::with_limit(content, self.options.max_payload_bytes).map_err(
            |source| EngineError::Payload {
                stage: stage.to_string(),
                source,
            },
        )?;

        let lineage = self.lineage(session)?;
        let mut parents = ParentFingerprints::new();
        let mut skipped_parents = Vec::new();
        for parent in node.parents().iter().collect::<IndexSet<_>>() {
            if lineage.is_present(parent) {
                let envelope = self.read_from(&lineage, parent)?.ok_or_else(|| {
                    EngineError::MissingParent {
                        stage: stage.to_string(),
                        parent: parent.clone(),
                    }
                })?;
                parents.insert(parent.clone(), envelope.fingerprint);
            } else if definition.node(parent).is_some_and(|p| p.optional) {
                tracing::warn!(stage, parent = %parent, "optional parent skipped");
                skipped_parents.push(parent.clone());
            } else {
                return Err(EngineError::MissingParent {
                    stage: stage.to_string(),
                    parent: parent.clone(),
                });
            }
        }

        let path = lineage
            .path(stage)
            .cloned()
            .ok_or_else(|| EngineError::UnknownStage {
                stage: stage.to_string(),
            })?;
        let meta_dir = session.join(path.meta_dir());
        let artifact_path = session.join(path.artifact_path());
        let replaced = self.store.exists(&artifact_path);

        let envelope = ArtifactEnvelope::seal(payload, parents);
        let bytes = envelope
            .to_json_vec(self.options.pretty_envelopes)
            .map_err(|source| EngineError::Encode {
                stage: stage.to_string(),
                source,
            })?;
        self.store.ensure_dir(&meta_dir)?;
        self.store.write(&artifact_path, &bytes)?;

        tracing::info!(
            stage,
            path = %path,
            fingerprint = %envelope.fingerprint.short(),
            replaced,
            "materialized stage"
        );

        Ok(Materialization {
            stage_id: stage.to_string(),
            path,
            artifact_path,
            envelope,
            replaced,
            skipped_parents,
        })
    }

    /// Stored envelope of `stage` at its realized path
    ///
    /// # Errors
    /// - [`EngineError::UnknownStage`] if the persona has no such stage
    /// - [`EngineError::CorruptEnvelope`] if the file is not an envelope
    pub fn read_envelope(&self, session: &Path, stage: &str) -> EngineResult<Option<ArtifactEnvelope>> {
        if !self.persona.definition().contains(stage) {
            return Err(EngineError::UnknownStage {
                stage: stage.to_string(),
            });
        }
        let lineage = self.lineage(session)?;
        self.read_from(&lineage, stage)
    }

    fn read_from(&self, lineage: &SessionLineage, stage: &str) -> EngineResult<Option<ArtifactEnvelope>> {
        let Some(path) = lineage.artifact_path(stage) else {
            return Ok(None);
        };
        let Some(bytes) = self.store.read(&path)? else {
            return Ok(None);
        };
        ArtifactEnvelope::from_json_slice(&bytes)
            .map(Some)
            .map_err(|source| EngineError::CorruptEnvelope {
                stage: stage.to_string(),
                path,
                source,
            })
    }

    /// Complete stages of `session`, declaration order
    ///
    /// # Errors
    /// Returns error if the session cannot be scanned
    pub fn completed_ids(&self, session: &Path) -> EngineResult<IndexSet<String>> {
        let lineage = self.lineage(session)?;
        Ok(completion::completed_ids(self.persona.definition(), &lineage))
    }

    /// Workflow position of `session`
    ///
    /// # Errors
    /// Returns error if the session cannot be scanned
    pub fn position(&self, session: &Path) -> EngineResult<Position> {
        let lineage = self.lineage(session)?;
        Ok(completion::position(self.persona.definition(), &lineage))
    }

    /// Present stages that no longer match their lineage
    ///
    /// A stage is stale when its envelope fails verification, when a
    /// recorded parent fingerprint differs from that parent's current
    /// envelope, or when any parent is stale. Topological order.
    ///
    /// # Errors
    /// Returns error if the session cannot be scanned or an envelope is
    /// corrupt
    pub fn stale_stages(&self, session: &Path) -> EngineResult<Vec<StaleStage>> {
        let definition = self.persona.definition();
        let lineage = self.lineage(session)?;
        let mut current: HashMap<&str, Fingerprint> = HashMap::new();
        let mut stale_ids: HashSet<&str> = HashSet::new();
        let mut stale = Vec::new();

        for id in lineage.present_ids() {
            let Some(envelope) = self.read_from(&lineage, id)? else {
                continue;
            };
            let reason = if envelope.verify() {
                definition
                    .parents(id)
                    .iter()
                    .collect::<IndexSet<_>>()
                    .into_iter()
                    .find_map(|parent| {
                        if stale_ids.contains(parent.as_str()) {
                            Some(StaleReason::ParentStale {
                                parent: parent.clone(),
                            })
                        } else if envelope.parent_fingerprints.get(parent)
                            != current.get(parent.as_str())
                        {
                            Some(StaleReason::ParentChanged {
                                parent: parent.clone(),
                            })
                        } else {
                            None
                        }
                    })
            } else {
                Some(StaleReason::Tampered)
            };

            if let Some(reason) = reason {
                tracing::warn!(stage = id, ?reason, "stale envelope");
                stale_ids.insert(id);
                stale.push(StaleStage {
                    stage_id: id.to_string(),
                    reason,
                });
            }
            current.insert(id, envelope.fingerprint);
        }

        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use serde_json::json;
    use stagetree_manifest::parse;

    fn persona() -> Arc<CompiledPersona> {
        let def = parse(&json!({
            "name": "Fed", "persona": "fed",
            "stages": [
                {"id": "search", "previous": null, "produces": ["results"]},
                {"id": "gather", "previous": ["search"], "produces": ["gathered"]},
                {"id": "rename", "previous": ["gather"], "produces": ["renamed"], "optional": true},
                {"id": "harmonize", "previous": ["gather", "rename"], "produces": ["harmonized"]}
            ]
        }))
        .unwrap();
        Arc::new(CompiledPersona::compile(def).unwrap())
    }

    fn engine() -> MaterializationEngine<MemoryStore> {
        MaterializationEngine::new(persona(), MemoryStore::new())
    }

    const SESSION: &str = "/sessions/fed/s1";

    #[test]
    fn root_is_written_under_its_own_dir() {
        let engine = engine();
        let m = engine
            .materialize(Path::new(SESSION), "search", json!({"terms": ["t"]}))
            .unwrap();
        assert_eq!(
            m.artifact_path,
            PathBuf::from("/sessions/fed/s1/search/meta/search.json")
        );
        assert!(!m.replaced);
        assert!(m.envelope.parent_fingerprints.is_empty());
        assert!(m.envelope.verify());
    }

    #[test]
    fn missing_mandatory_parent_is_precondition_error() {
        let engine = engine();
        let err = engine
            .materialize(Path::new(SESSION), "gather", json!({"n": 1}))
            .unwrap_err();
        assert!(err.is_precondition());
        assert!(matches!(
            err,
            EngineError::MissingParent { ref stage, ref parent } if stage == "gather" && parent == "search"
        ));
        assert!(engine.store().is_empty());
    }

    #[test]
    fn unknown_stage_and_null_payload_are_validation_errors() {
        let engine = engine();
        let session = Path::new(SESSION);
        assert!(engine.materialize(session, "nope", json!(1)).unwrap_err().is_validation());
        assert!(engine.materialize(session, "search", Value::Null).unwrap_err().is_validation());
        assert!(matches!(
            engine.read_envelope(session, "nope"),
            Err(EngineError::UnknownStage { .. })
        ));
    }

    #[test]
    fn payload_limit_comes_from_options() {
        let engine = engine().with_options(EngineOptions {
            max_payload_bytes: 8,
            pretty_envelopes: false,
        });
        let err = engine
            .materialize(Path::new(SESSION), "search", json!({"long": "xxxxxxxxxx"}))
            .unwrap_err();
        assert!(matches!(err, EngineError::Payload { .. }));
    }

    #[test]
    fn child_chains_parent_fingerprint() {
        let engine = engine();
        let session = Path::new(SESSION);
        let search = engine.materialize(session, "search", json!({"q": 1})).unwrap();
        let gather = engine.materialize(session, "gather", json!({"g": 2})).unwrap();
        assert_eq!(
            gather.envelope.parent_fingerprints.get("search"),
            Some(&search.envelope.fingerprint)
        );
        assert_eq!(gather.path.dir().to_string(), "search/gather");
    }

    #[test]
    fn skipped_optional_parent_is_reported() {
        let engine = engine();
        let session = Path::new(SESSION);
        engine.materialize(session, "search", json!({"q": 1})).unwrap();
        engine.materialize(session, "gather", json!({"g": 2})).unwrap();
        let m = engine.materialize(session, "harmonize", json!({"h": 3})).unwrap();
        assert_eq!(m.skipped_parents, vec!["rename"]);
        assert_eq!(
            m.envelope.parent_fingerprints.keys().collect::<Vec<_>>(),
            vec!["gather"]
        );
    }

    #[test]
    fn read_envelope_roundtrip() {
        let engine = engine();
        let session = Path::new(SESSION);
        let m = engine.materialize(session, "search", json!({"b": 2, "a": [1, 2]})).unwrap();
        let read = engine.read_envelope(session, "search").unwrap().unwrap();
        assert_eq!(read, m.envelope);
        assert_eq!(engine.read_envelope(session, "gather").unwrap(), None);
    }

    #[test]
    fn corrupt_envelope_is_reported() {
        let engine = engine();
        let session = Path::new(SESSION);
        engine.materialize(session, "search", json!({"q": 1})).unwrap();
        engine
            .store()
            .write(Path::new("/sessions/fed/s1/search/meta/search.json"), b"not json")
            .unwrap();
        assert!(matches!(
            engine.read_envelope(session, "search"),
            Err(EngineError::CorruptEnvelope { .. })
        ));
        assert!(matches!(
            engine.materialize(session, "gather", json!({"g": 1})),
            Err(EngineError::CorruptEnvelope { .. })
        ));
    }

    #[test]
    fn rerunning_root_marks_children_stale() {
        let engine = engine();
        let session = Path::new(SESSION);
        engine.materialize(session, "search", json!({"q": 1})).unwrap();
        engine.materialize(session, "gather", json!({"g": 1})).unwrap();
        engine.materialize(session, "harmonize", json!({"h": 1})).unwrap();
        assert!(engine.stale_stages(session).unwrap().is_empty());

        engine.materialize(session, "search", json!({"q": 2})).unwrap();
        let stale = engine.stale_stages(session).unwrap();
        assert_eq!(
            stale,
            vec![
                StaleStage {
                    stage_id: "gather".into(),
                    reason: StaleReason::ParentChanged {
                        parent: "search".into()
                    },
                },
                StaleStage {
                    stage_id: "harmonize".into(),
                    reason: StaleReason::ParentStale {
                        parent: "gather".into()
                    },
                },
            ]
        );
    }

    #[test]
    fn tampered_envelope_is_stale() {
        let engine = engine();
        let session = Path::new(SESSION);
        let m = engine.materialize(session, "search", json!({"q": 1})).unwrap();
        let mut forged = m.envelope.clone();
        forged.content = json!({"q": 99});
        engine
            .store()
            .write(&m.artifact_path, &forged.to_json_vec(false).unwrap())
            .unwrap();

        let stale = engine.stale_stages(session).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].reason, StaleReason::Tampered);
    }

    #[test]
    fn failing_store_surfaces_as_store_error() {
        struct ReadOnly;
        impl SessionStore for ReadOnly {
            fn exists(&self, _: &Path) -> bool {
                false
            }
            fn read(&self, _: &Path) -> Result<Option<Vec<u8>>, StoreError> {
                Ok(None)
            }
            fn write(&self, path: &Path, _: &[u8]) -> Result<(), StoreError> {
                Err(StoreError::io_error(
                    path,
                    std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
                ))
            }
            fn ensure_dir(&self, _: &Path) -> Result<(), StoreError> {
                Ok(())
            }
        }

        let engine = MaterializationEngine::new(persona(), ReadOnly);
        let err = engine
            .materialize(Path::new(SESSION), "search", json!({"q": 1}))
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Io { .. })));
    }
}
