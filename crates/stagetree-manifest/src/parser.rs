//! Manifest document -> [`DagDefinition`]
//!
//! Works on the raw document as a `serde_json::Value` so that an explicit
//! `null` and an absent key stay distinguishable (`previous`,
//! `completes_with`).

use crate::definition::{
    CompletionRule, DagDefinition, DagNode, Edge, ManifestHeader, SkipWarning, DEFAULT_VERSION,
};
use crate::error::{ManifestError, ManifestResult};
use crate::graph;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use stagetree_artifact::validate_segment;

/// Pattern every `handler` value must match
pub const HANDLER_PATTERN: &str = r"^[a-z][a-z0-9_-]*$";

static HANDLER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(HANDLER_PATTERN).expect("handler pattern is a valid regex"));

/// Check a handler identifier against [`HANDLER_PATTERN`]
#[must_use]
pub fn is_valid_handler(handler: &str) -> bool {
    HANDLER_RE.is_match(handler)
}

/// Validate a raw manifest document and build its DAG
///
/// # Errors
/// Fails with a [`ManifestError`] naming the offending stage or field on
/// any structural problem: non-object root, missing/non-string `name` or
/// `persona`, missing/empty `stages`, a stage without `id` or with empty
/// `produces`, a duplicate id, an invalid handler, a dangling parent or
/// alias, or a cycle.
pub fn parse(document: &Value) -> ManifestResult<DagDefinition> {
    let root = document.as_object().ok_or(ManifestError::NotAnObject)?;
    let header = parse_header(root)?;

    let stages = match root.get("stages") {
        None | Some(Value::Null) => return Err(ManifestError::MissingStages),
        Some(Value::Array(stages)) => stages,
        Some(_) => return Err(ManifestError::StagesNotList),
    };
    if stages.is_empty() {
        return Err(ManifestError::EmptyStages);
    }

    let mut nodes: IndexMap<String, DagNode> = IndexMap::with_capacity(stages.len());
    for (index, raw) in stages.iter().enumerate() {
        let node = parse_stage(index, raw)?;
        if let Some(first_index) = nodes.get_index_of(&node.id) {
            return Err(ManifestError::DuplicateStageId {
                stage: node.id,
                first_index,
                index,
            });
        }
        nodes.insert(node.id.clone(), node);
    }

    let mut edges = Vec::new();
    for node in nodes.values() {
        for parent in node.parents() {
            if !nodes.contains_key(parent) {
                return Err(ManifestError::UnknownParent {
                    stage: node.id.clone(),
                    parent: parent.clone(),
                });
            }
            edges.push(Edge {
                from: parent.clone(),
                to: node.id.clone(),
            });
        }
        if let CompletionRule::Alias(target) = &node.completes_with {
            if !nodes.contains_key(target) {
                return Err(ManifestError::UnknownAlias {
                    stage: node.id.clone(),
                    target: target.clone(),
                });
            }
        }
    }

    let order = graph::topological_order(&nodes, &edges)?;
    let definition = DagDefinition::from_parts(header, nodes, edges, order);

    tracing::debug!(
        persona = definition.persona(),
        stages = definition.len(),
        roots = ?definition.root_ids(),
        terminals = ?definition.terminal_ids(),
        "parsed manifest"
    );
    Ok(definition)
}

fn parse_header(root: &Map<String, Value>) -> ManifestResult<ManifestHeader> {
    let name = required_header_string(root, "name")?;
    let persona = required_header_string(root, "persona")?;
    let description = optional_string(root, "description", None)?.unwrap_or_default();
    let category = optional_string(root, "category", None)?;
    let version = match root.get("version") {
        None | Some(Value::Null) => DEFAULT_VERSION.to_string(),
        Some(Value::String(s)) => s.clone(),
        // Integers survive the number round-trip; `1.10` would read back as `1.1`
        Some(Value::Number(n)) if !n.is_f64() => n.to_string(),
        Some(Value::Number(_)) => {
            return Err(ManifestError::invalid_header(
                "version",
                "a string or an integer (quote dotted versions)",
            ))
        }
        Some(_) => return Err(ManifestError::invalid_header("version", "a string")),
    };
    let locked = optional_bool(root, "locked", None)?.unwrap_or(false);
    let authors = string_list(root, "authors", None)?.unwrap_or_default();

    Ok(ManifestHeader {
        name,
        persona,
        description,
        category,
        version,
        locked,
        authors,
    })
}

fn required_header_string(root: &Map<String, Value>, field: &'static str) -> ManifestResult<String> {
    match root.get(field) {
        None | Some(Value::Null) => Err(ManifestError::MissingField { field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(ManifestError::invalid_header(field, "a string")),
    }
}

fn parse_stage(index: usize, raw: &Value) -> ManifestResult<DagNode> {
    let stage = raw
        .as_object()
        .ok_or(ManifestError::StageNotAnObject { index })?;

    let id = match stage.get("id") {
        None | Some(Value::Null) => return Err(ManifestError::MissingStageId { index }),
        Some(Value::String(id)) => id.clone(),
        Some(_) => {
            return Err(ManifestError::InvalidField {
                stage: None,
                field: "id",
                expected: "a string",
            })
        }
    };
    validate_segment(&id).map_err(|source| ManifestError::InvalidStageId {
        stage: id.clone(),
        source,
    })?;
    let ctx = Some(id.as_str());

    let produces = match stage.get("produces") {
        None | Some(Value::Null) => return Err(ManifestError::MissingProduces { stage: id }),
        Some(Value::Array(items)) => strings_of(items, "produces", ctx)?,
        Some(_) => return Err(ManifestError::ProducesNotList { stage: id }),
    };
    if produces.is_empty() {
        return Err(ManifestError::EmptyProduces { stage: id });
    }

    let handler = optional_string(stage, "handler", ctx)?;
    if let Some(handler) = &handler {
        if !is_valid_handler(handler) {
            return Err(ManifestError::InvalidHandler {
                stage: id,
                handler: handler.clone(),
            });
        }
    }

    let previous = string_list(stage, "previous", ctx)?;
    let completes_with = match stage.get("completes_with") {
        None => CompletionRule::OwnArtifact,
        Some(Value::Null) => CompletionRule::Never,
        Some(Value::String(target)) => CompletionRule::Alias(target.clone()),
        Some(_) => {
            return Err(ManifestError::invalid_stage_field(
                &id,
                "completes_with",
                "a stage id or null",
            ))
        }
    };

    Ok(DagNode {
        name: optional_string(stage, "name", ctx)?.unwrap_or_else(|| id.clone()),
        phase: optional_string(stage, "phase", ctx)?,
        previous,
        optional: optional_bool(stage, "optional", ctx)?.unwrap_or(false),
        produces,
        parameters: stage
            .get("parameters")
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())),
        instruction: optional_string(stage, "instruction", ctx)?.unwrap_or_default(),
        commands: string_list(stage, "commands", ctx)?.unwrap_or_default(),
        handler,
        skip_warning: parse_skip_warning(stage, ctx)?,
        narrative: optional_string(stage, "narrative", ctx)?,
        blueprint: match stage.get("blueprint") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(ManifestError::invalid_stage_field(&id, "blueprint", "a list")),
        },
        completes_with,
        id,
    })
}

fn parse_skip_warning(
    stage: &Map<String, Value>,
    ctx: Option<&str>,
) -> ManifestResult<Option<SkipWarning>> {
    let bad = |expected| invalid(ctx, "skip_warning", expected);
    let warning = match stage.get("skip_warning") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) => SkipWarning {
            text: text.clone(),
            reason: None,
            max_warnings: None,
        },
        Some(Value::Object(map)) => {
            let text = match map.get("text").or_else(|| map.get("message")) {
                Some(Value::String(text)) => text.clone(),
                _ => return Err(bad("an object with a 'text' string")),
            };
            let reason = match map.get("reason") {
                None | Some(Value::Null) => None,
                Some(Value::String(reason)) => Some(reason.clone()),
                Some(_) => return Err(bad("an object whose 'reason' is a string")),
            };
            let max_warnings = match map.get("max_warnings") {
                None | Some(Value::Null) => None,
                Some(n) => Some(
                    n.as_u64()
                        .and_then(|n| u32::try_from(n).ok())
                        .ok_or_else(|| bad("an object whose 'max_warnings' is a non-negative integer"))?,
                ),
            };
            SkipWarning {
                text,
                reason,
                max_warnings,
            }
        }
        Some(_) => return Err(bad("a string or an object")),
    };
    Ok(Some(warning))
}

fn invalid(ctx: Option<&str>, field: &'static str, expected: &'static str) -> ManifestError {
    ManifestError::InvalidField {
        stage: ctx.map(str::to_string),
        field,
        expected,
    }
}

fn optional_string(
    map: &Map<String, Value>,
    field: &'static str,
    ctx: Option<&str>,
) -> ManifestResult<Option<String>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(ctx, field, "a string")),
    }
}

fn optional_bool(
    map: &Map<String, Value>,
    field: &'static str,
    ctx: Option<&str>,
) -> ManifestResult<Option<bool>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(invalid(ctx, field, "a boolean")),
    }
}

/// `None` when the key is absent or null; an empty list stays `Some`
fn string_list(
    map: &Map<String, Value>,
    field: &'static str,
    ctx: Option<&str>,
) -> ManifestResult<Option<Vec<String>>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => strings_of(items, field, ctx).map(Some),
        Some(_) => Err(invalid(ctx, field, "a list of strings")),
    }
}

fn strings_of(items: &[Value], field: &'static str, ctx: Option<&str>) -> ManifestResult<Vec<String>> {
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(ctx, field, "a list of strings"))
        })
        .collect()
}
