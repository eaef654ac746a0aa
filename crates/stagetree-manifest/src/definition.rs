//! Typed stage DAG
//!
//! [`DagDefinition`] is the validated, immutable form of a persona manifest.
//! It can only be built by [`crate::parse`], so every instance has passed
//! referential-integrity and acyclicity checks.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

/// Default manifest version when the header omits one
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Manifest header metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManifestHeader {
    pub name: String,
    pub persona: String,
    pub description: String,
    pub category: Option<String>,
    pub version: String,
    pub locked: bool,
    pub authors: Vec<String>,
}

/// How a stage's completion is decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", content = "target", rename_all = "snake_case")]
pub enum CompletionRule {
    /// `completes_with` omitted: the stage's own artifact
    OwnArtifact,
    /// `completes_with: null`: never auto-completes (operator action)
    Never,
    /// `completes_with: <id>`: another stage's artifact
    Alias(String),
}

impl CompletionRule {
    /// Stage whose artifact decides completion, if any
    #[must_use]
    pub fn target<'a>(&'a self, own_id: &'a str) -> Option<&'a str> {
        match self {
            Self::OwnArtifact => Some(own_id),
            Self::Never => None,
            Self::Alias(target) => Some(target),
        }
    }
}

/// Warning shown to an operator skipping an optional stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipWarning {
    pub text: String,
    pub reason: Option<String>,
    pub max_warnings: Option<u32>,
}

/// One stage of the DAG
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DagNode {
    pub id: String,
    /// Display name (defaults to the id)
    pub name: String,
    pub phase: Option<String>,
    /// `None` marks a structural root; `Some(vec![])` does not
    pub previous: Option<Vec<String>>,
    /// May be skipped without blocking descendants
    pub optional: bool,
    pub produces: Vec<String>,
    pub parameters: Value,
    pub instruction: String,
    pub commands: Vec<String>,
    /// Plugin dispatcher key; validated, never invoked here
    pub handler: Option<String>,
    pub skip_warning: Option<SkipWarning>,
    pub narrative: Option<String>,
    pub blueprint: Vec<Value>,
    pub completes_with: CompletionRule,
}

impl DagNode {
    /// Declared parent ids (empty for roots)
    #[inline]
    #[must_use]
    pub fn parents(&self) -> &[String] {
        self.previous.as_deref().unwrap_or(&[])
    }

    /// Check if `previous` is exactly null
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.previous.is_none()
    }

    /// Check if this stage converges two or more parents
    #[inline]
    #[must_use]
    pub fn is_join(&self) -> bool {
        self.parents().len() > 1
    }
}

/// Derived parent -> child edge
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
}

/// Validated stage graph of one persona manifest
#[derive(Debug, Clone, Serialize)]
pub struct DagDefinition {
    header: ManifestHeader,
    nodes: IndexMap<String, DagNode>,
    edges: Vec<Edge>,
    root_ids: Vec<String>,
    terminal_ids: Vec<String>,
    topological_order: Vec<String>,
}

impl DagDefinition {
    /// Assemble a definition from already-validated parts
    pub(crate) fn from_parts(
        header: ManifestHeader,
        nodes: IndexMap<String, DagNode>,
        edges: Vec<Edge>,
        topological_order: Vec<String>,
    ) -> Self {
        let root_ids = nodes
            .values()
            .filter(|n| n.is_root())
            .map(|n| n.id.clone())
            .collect();
        let terminal_ids = nodes
            .keys()
            .filter(|id| !edges.iter().any(|e| &e.from == *id))
            .cloned()
            .collect();
        Self {
            header,
            nodes,
            edges,
            root_ids,
            terminal_ids,
            topological_order,
        }
    }

    /// Header metadata
    #[inline]
    #[must_use]
    pub fn header(&self) -> &ManifestHeader {
        &self.header
    }

    /// Persona id
    #[inline]
    #[must_use]
    pub fn persona(&self) -> &str {
        &self.header.persona
    }

    /// Look up a stage
    #[inline]
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DagNode> {
        self.nodes.get(id)
    }

    /// Check if a stage exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Stages in declaration order
    pub fn nodes(&self) -> impl Iterator<Item = &DagNode> {
        self.nodes.values()
    }

    /// Stage ids in declaration order
    pub fn ordered_node_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    /// Number of stages
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false for a parsed definition
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Derived edges (one per declared parent reference)
    #[inline]
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Stages whose `previous` is null
    #[inline]
    #[must_use]
    pub fn root_ids(&self) -> &[String] {
        &self.root_ids
    }

    /// Stages that are nobody's parent
    #[inline]
    #[must_use]
    pub fn terminal_ids(&self) -> &[String] {
        &self.terminal_ids
    }

    /// Parents before children; ties follow declaration order
    #[inline]
    #[must_use]
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Declared parents of `id` (empty if unknown or root)
    #[must_use]
    pub fn parents(&self, id: &str) -> &[String] {
        self.nodes.get(id).map_or(&[][..], DagNode::parents)
    }

    /// Direct children of `id`, declaration order, no duplicates
    #[must_use]
    pub fn children(&self, id: &str) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| n.parents().iter().any(|p| p == id))
            .map(|n| n.id.as_str())
            .collect()
    }

    /// Check if `id` converges two or more parents
    #[must_use]
    pub fn is_join(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(DagNode::is_join)
    }

    /// Every transitive parent of `id`
    #[must_use]
    pub fn ancestors(&self, id: &str) -> IndexSet<&str> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<&str> = self.parents(id).iter().map(String::as_str).collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(self.parents(next).iter().map(String::as_str));
            }
        }
        seen
    }

    /// Every transitive child of `id`
    #[must_use]
    pub fn descendants(&self, id: &str) -> IndexSet<&str> {
        let mut seen = IndexSet::new();
        let mut queue: VecDeque<&str> = self.children(id).into_iter().collect();
        while let Some(next) = queue.pop_front() {
            if seen.insert(next) {
                queue.extend(self.children(next));
            }
        }
        seen
    }

    /// Roots and everything below them, in declaration order
    #[must_use]
    pub fn reachable_from_roots(&self) -> IndexSet<&str> {
        let mut reachable: IndexSet<&str> = IndexSet::new();
        for root in &self.root_ids {
            reachable.insert(root.as_str());
            reachable.extend(self.descendants(root));
        }
        self.ordered_node_ids()
            .filter(|id| reachable.contains(id))
            .collect()
    }
}
