//! Topology path resolver
//!
//! Maps every stage of a [`DagDefinition`] to a [`StagePath`].
//!
//! # Layout
//!
//! ```text
//! <session>/search/meta/search.json
//! <session>/search/gather/meta/gather.json
//! <session>/search/gather/_join_gather_rename/harmonize/meta/harmonize.json
//! ```
//!
//! A stage nests under its parent. A stage with two or more parents nests
//! under a synthetic join segment named from the sorted parent ids, placed
//! under the longest common prefix of the parents' paths.
//!
//! The default layout ([`Topology::resolve`]) always joins. A session's
//! realized layout ([`Topology::scan`]) collapses a join when an optional
//! parent has no artifact: only the *effective* parents (non-optional or
//! present) take part, and a single effective parent means plain nesting.

use crate::error::TopologyError;
use crate::store::SessionStore;
use indexmap::{IndexMap, IndexSet};
use stagetree_artifact::{LineagePath, PathSegment, StagePath};
use stagetree_manifest::DagDefinition;
use std::path::{Path, PathBuf};

/// Per-stage facts the resolver needs from the definition
#[derive(Debug, Clone)]
struct StageLayout {
    segment: PathSegment,
    /// Declared parents, deduplicated, declaration order
    parents: Vec<String>,
    optional: bool,
    default_path: StagePath,
}

/// Stage paths of one definition
///
/// Built once per definition and shared by every session of the persona.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Topological order
    stages: IndexMap<String, StageLayout>,
}

impl Topology {
    /// Compute the default layout of `definition`
    ///
    /// # Errors
    /// Returns error if a stage or join segment cannot be built
    pub fn resolve(definition: &DagDefinition) -> Result<Self, TopologyError> {
        let mut stages: IndexMap<String, StageLayout> = IndexMap::with_capacity(definition.len());

        for id in definition.topological_order() {
            let node = definition
                .node(id)
                .ok_or_else(|| TopologyError::UnknownStage { stage: id.clone() })?;
            let segment = PathSegment::stage(id.as_str()).map_err(|source| {
                TopologyError::InvalidPath {
                    stage: id.clone(),
                    source,
                }
            })?;
            let parents: Vec<String> = node
                .parents()
                .iter()
                .collect::<IndexSet<_>>()
                .into_iter()
                .cloned()
                .collect();

            let parent_dirs = parents
                .iter()
                .map(|p| {
                    stages
                        .get(p)
                        .map(|s| (p.as_str(), s.default_path.dir()))
                        .ok_or_else(|| TopologyError::UnknownStage { stage: p.clone() })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let dir = place(id, &segment, &parent_dirs)?;

            stages.insert(
                id.clone(),
                StageLayout {
                    segment,
                    parents,
                    optional: node.optional,
                    default_path: StagePath::new(id, dir),
                },
            );
        }

        tracing::debug!(
            persona = definition.persona(),
            stages = stages.len(),
            "resolved default topology"
        );
        Ok(Self { stages })
    }

    /// Default path of `id`
    #[inline]
    #[must_use]
    pub fn stage_path(&self, id: &str) -> Option<&StagePath> {
        self.stages.get(id).map(|s| &s.default_path)
    }

    /// Every default path, topological order
    pub fn paths(&self) -> impl Iterator<Item = (&str, &StagePath)> {
        self.stages
            .iter()
            .map(|(id, s)| (id.as_str(), &s.default_path))
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if the topology has no stages
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Realize every stage path for the session at `session_root`
    ///
    /// Walks stages in topological order, so each parent's realized path
    /// and presence are known before its children are placed.
    ///
    /// # Errors
    /// Returns error if a join segment cannot be built
    pub fn scan<S: SessionStore + ?Sized>(
        &self,
        store: &S,
        session_root: &Path,
    ) -> Result<SessionLineage, TopologyError> {
        let mut realized: IndexMap<String, RealizedStage> = IndexMap::with_capacity(self.len());

        for (id, layout) in &self.stages {
            let effective: Vec<(&str, &LineagePath)> = layout
                .parents
                .iter()
                .filter_map(|p| {
                    let parent = realized.get(p)?;
                    let keep = !self.stages.get(p).is_some_and(|s| s.optional) || parent.present;
                    keep.then_some((p.as_str(), parent.path.dir()))
                })
                .collect();

            let dir = if effective.is_empty() && !layout.parents.is_empty() {
                // every parent optional and absent
                let all: Vec<(&str, &LineagePath)> = layout
                    .parents
                    .iter()
                    .filter_map(|p| realized.get(p).map(|r| (p.as_str(), r.path.dir())))
                    .collect();
                place(id, &layout.segment, &all)?
            } else {
                if effective.len() < layout.parents.len() {
                    tracing::debug!(
                        stage = %id,
                        effective = ?effective.iter().map(|(p, _)| *p).collect::<Vec<_>>(),
                        "collapsing join over absent optional parents"
                    );
                }
                place(id, &layout.segment, &effective)?
            };

            let path = StagePath::new(id, dir);
            let present = store.exists(&session_root.join(path.artifact_path()));
            realized.insert(id.clone(), RealizedStage { path, present });
        }

        let lineage = SessionLineage {
            root: session_root.to_path_buf(),
            stages: realized,
        };
        tracing::debug!(
            session = %session_root.display(),
            present = ?lineage.present_ids().collect::<Vec<_>>(),
            "scanned session lineage"
        );
        Ok(lineage)
    }
}

/// Directory of `id` given its parents' directories
fn place(
    id: &str,
    segment: &PathSegment,
    parents: &[(&str, &LineagePath)],
) -> Result<LineagePath, TopologyError> {
    match parents {
        [] => Ok(LineagePath::root().child(segment.clone())),
        [(_, dir)] => Ok(dir.child(segment.clone())),
        [(_, first), rest @ ..] => {
            let base = rest
                .iter()
                .fold((*first).clone(), |acc, (_, dir)| acc.common_prefix(dir));
            let join = PathSegment::join(parents.iter().map(|(p, _)| *p)).map_err(|source| {
                TopologyError::InvalidPath {
                    stage: id.to_string(),
                    source,
                }
            })?;
            Ok(base.child(join).child(segment.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RealizedStage {
    path: StagePath,
    present: bool,
}

/// Realized stage paths and artifact presence of one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLineage {
    root: PathBuf,
    /// Topological order
    stages: IndexMap<String, RealizedStage>,
}

impl SessionLineage {
    /// Session root the lineage was scanned from
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Realized path of `id`
    #[inline]
    #[must_use]
    pub fn path(&self, id: &str) -> Option<&StagePath> {
        self.stages.get(id).map(|s| &s.path)
    }

    /// Absolute envelope location of `id`
    #[must_use]
    pub fn artifact_path(&self, id: &str) -> Option<PathBuf> {
        self.path(id).map(|p| self.root.join(p.artifact_path()))
    }

    /// Absolute `meta` directory of `id`
    #[must_use]
    pub fn meta_dir(&self, id: &str) -> Option<PathBuf> {
        self.path(id).map(|p| self.root.join(p.meta_dir()))
    }

    /// Check if `id` has an envelope at its realized path
    #[inline]
    #[must_use]
    pub fn is_present(&self, id: &str) -> bool {
        self.stages.get(id).is_some_and(|s| s.present)
    }

    /// Stages with an envelope, topological order
    pub fn present_ids(&self) -> impl Iterator<Item = &str> {
        self.stages
            .iter()
            .filter(|(_, s)| s.present)
            .map(|(id, _)| id.as_str())
    }

    /// Every realized path, topological order
    pub fn paths(&self) -> impl Iterator<Item = (&str, &StagePath)> {
        self.stages.iter().map(|(id, s)| (id.as_str(), &s.path))
    }
}
