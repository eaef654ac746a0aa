//! Completion and position
//!
//! Decides which stages count as complete in a scanned session, and which
//! stage the workflow is currently waiting on.

use crate::topology::SessionLineage;
use indexmap::IndexSet;
use serde::Serialize;
use stagetree_manifest::{CompletionRule, DagDefinition, DagNode, SkipWarning};

/// Check `node` against its completion rule
///
/// - own artifact: the stage's envelope exists
/// - alias: the target stage's envelope exists
/// - never: always false
#[must_use]
pub fn is_complete(node: &DagNode, lineage: &SessionLineage) -> bool {
    node.completes_with
        .target(&node.id)
        .is_some_and(|target| lineage.is_present(target))
}

/// Complete stages, declaration order
#[must_use]
pub fn completed_ids(definition: &DagDefinition, lineage: &SessionLineage) -> IndexSet<String> {
    definition
        .nodes()
        .filter(|node| is_complete(node, lineage))
        .map(|node| node.id.clone())
        .collect()
}

/// The stage a session is waiting on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentStage {
    pub id: String,
    pub name: String,
    pub instruction: String,
    pub handler: Option<String>,
    pub optional: bool,
    pub completes_with: CompletionRule,
    pub skip_warning: Option<SkipWarning>,
}

impl CurrentStage {
    fn from_node(node: &DagNode) -> Self {
        Self {
            id: node.id.clone(),
            name: node.name.clone(),
            instruction: node.instruction.clone(),
            handler: node.handler.clone(),
            optional: node.optional,
            completes_with: node.completes_with.clone(),
            skip_warning: node.skip_warning.clone(),
        }
    }

    /// Check if this stage can only be finished by an operator action
    #[inline]
    #[must_use]
    pub fn is_action(&self) -> bool {
        self.completes_with == CompletionRule::Never
    }
}

/// Workflow status of one session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    /// Declaration order
    pub completed_stages: Vec<String>,
    /// First available stage, if any
    pub current_stage: Option<CurrentStage>,
    /// Reachable, incomplete, prerequisites satisfied; declaration order
    pub available_stages: Vec<String>,
    /// Example commands of the current stage
    pub available_commands: Vec<String>,
}

impl Position {
    /// Check if no stage is left to run
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.current_stage.is_none()
    }
}

/// Resolve the position of a scanned session
///
/// A stage is available when it is reachable from the roots, not complete,
/// and each of its parents has its own artifact or is optional. A parent
/// that is complete only through its alias does not unblock its children,
/// since materialization chains against the parent's own envelope.
#[must_use]
pub fn position(definition: &DagDefinition, lineage: &SessionLineage) -> Position {
    let completed = completed_ids(definition, lineage);
    let satisfied = |parent: &String| {
        lineage.is_present(parent) || definition.node(parent).is_some_and(|p| p.optional)
    };

    let available: Vec<&DagNode> = definition
        .reachable_from_roots()
        .into_iter()
        .filter_map(|id| definition.node(id))
        .filter(|node| !completed.contains(&node.id))
        .filter(|node| node.parents().iter().all(&satisfied))
        .collect();

    let current = available.first().copied();
    Position {
        available_commands: current.map(|n| n.commands.clone()).unwrap_or_default(),
        current_stage: current.map(CurrentStage::from_node),
        available_stages: available.iter().map(|n| n.id.clone()).collect(),
        completed_stages: completed.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, SessionStore};
    use crate::topology::Topology;
    use serde_json::json;
    use stagetree_manifest::parse;
    use std::path::Path;

    fn definition() -> DagDefinition {
        parse(&json!({
            "name": "Fed", "persona": "fed",
            "stages": [
                {"id": "search", "previous": null, "produces": ["results"], "commands": ["search x"]},
                {"id": "gather", "previous": ["search"], "produces": ["gathered"], "commands": ["gather"]},
                {"id": "review", "previous": ["gather"], "produces": ["reviewed"], "optional": true, "completes_with": "gather"},
                {"id": "rename", "previous": ["gather"], "produces": ["renamed"], "optional": true},
                {"id": "harmonize", "previous": ["gather", "rename"], "produces": ["harmonized"]},
                {"id": "publish", "previous": ["harmonize"], "produces": ["publication"], "completes_with": null}
            ]
        }))
        .unwrap()
    }

    fn scan_with(def: &DagDefinition, present: &[&str]) -> SessionLineage {
        let topology = Topology::resolve(def).unwrap();
        let store = MemoryStore::new();
        let root = Path::new("s");
        for id in present {
            let lineage = topology.scan(&store, root).unwrap();
            store.ensure_dir(&lineage.meta_dir(id).unwrap()).unwrap();
            store.write(&lineage.artifact_path(id).unwrap(), b"{}").unwrap();
        }
        topology.scan(&store, root).unwrap()
    }

    #[test]
    fn fresh_session_waits_on_root() {
        let def = definition();
        let pos = position(&def, &scan_with(&def, &[]));
        assert!(pos.completed_stages.is_empty());
        assert_eq!(pos.current_stage.as_ref().unwrap().id, "search");
        assert_eq!(pos.available_stages, vec!["search"]);
        assert_eq!(pos.available_commands, vec!["search x"]);
    }

    #[test]
    fn alias_completes_with_target() {
        let def = definition();
        let lineage = scan_with(&def, &["search", "gather"]);
        let done = completed_ids(&def, &lineage);
        assert!(done.contains("review"));
        assert_eq!(
            done.into_iter().collect::<Vec<_>>(),
            vec!["search", "gather", "review"]
        );
    }

    #[test]
    fn optional_parent_does_not_block() {
        let def = definition();
        let pos = position(&def, &scan_with(&def, &["search", "gather"]));
        assert_eq!(pos.available_stages, vec!["rename", "harmonize"]);
        assert_eq!(pos.current_stage.unwrap().id, "rename");
    }

    #[test]
    fn never_stage_stays_incomplete() {
        let def = definition();
        let pos = position(&def, &scan_with(&def, &["search", "gather", "harmonize", "publish"]));
        assert!(!pos.completed_stages.contains(&"publish".to_string()));
        let current = pos.current_stage.unwrap();
        assert_eq!(current.id, "rename");
        assert!(pos.available_stages.contains(&"publish".to_string()));
    }

    #[test]
    fn action_stage_is_current_at_the_end() {
        let def = definition();
        let pos = position(
            &def,
            &scan_with(&def, &["search", "gather", "rename", "harmonize"]),
        );
        let current = pos.current_stage.unwrap();
        assert_eq!(current.id, "publish");
        assert!(current.is_action());
        assert_eq!(pos.available_stages, vec!["publish"]);
    }

    #[test]
    fn mandatory_alias_parent_needs_its_own_artifact() {
        let def = parse(&json!({
            "name": "n", "persona": "p",
            "stages": [
                {"id": "search", "previous": null, "produces": ["r"]},
                {"id": "gather", "previous": ["search"], "produces": ["g"]},
                {"id": "review", "previous": ["gather"], "produces": ["v"], "completes_with": "gather"},
                {"id": "report", "previous": ["review"], "produces": ["p"]}
            ]
        }))
        .unwrap();

        let pos = position(&def, &scan_with(&def, &["search", "gather"]));
        assert_eq!(pos.completed_stages, vec!["search", "gather", "review"]);
        assert!(pos.available_stages.is_empty());
        assert!(pos.is_finished());

        let pos = position(&def, &scan_with(&def, &["search", "gather", "review"]));
        assert_eq!(pos.current_stage.unwrap().id, "report");
    }

    #[test]
    fn unreachable_stages_are_never_available() {
        let def = parse(&json!({
            "name": "n", "persona": "p",
            "stages": [
                {"id": "a", "previous": null, "produces": ["x"]},
                {"id": "floating", "previous": [], "produces": ["y"]}
            ]
        }))
        .unwrap();
        let pos = position(&def, &scan_with(&def, &["a"]));
        assert!(pos.is_finished());
        assert!(pos.available_stages.is_empty());
        assert!(pos.available_commands.is_empty());
    }
}
