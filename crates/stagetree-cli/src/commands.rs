//! Subcommand implementations
//!
//! Every command writes its report to the given writer so it can be
//! exercised without a terminal.

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use stagetree_core::{
    CompiledPersona, EngineOptions, FsStore, MaterializationEngine, PersonaRegistry, Position,
    StaleStage, StagetreeConfig,
};
use stagetree_manifest::{default_formats, load_file, CompletionRule, DagNode};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Resolved configuration for one invocation
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub config: StagetreeConfig,
}

impl Context {
    /// Load `config_path` (if any) and apply flag overrides
    ///
    /// # Errors
    /// Returns error if the config file cannot be loaded
    pub fn load(
        config_path: Option<&Path>,
        sessions_root: Option<&Path>,
        manifests_dir: Option<&Path>,
    ) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => StagetreeConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => StagetreeConfig::default(),
        };
        if let Some(root) = sessions_root {
            config = config.with_sessions_root(root);
        }
        if let Some(dir) = manifests_dir {
            config = config.with_manifests_dir(dir);
        }
        Ok(Self { config })
    }

    fn engine(&self, persona: Arc<CompiledPersona>) -> MaterializationEngine<FsStore> {
        MaterializationEngine::new(persona, FsStore::new())
            .with_options(EngineOptions::from(&self.config))
    }

    fn session_root(&self, persona: &str, session: &str) -> Result<PathBuf> {
        Ok(self.config.locator().session_root(persona, session)?)
    }

    fn persona(&self, persona: &str) -> Result<Arc<CompiledPersona>> {
        let registry = PersonaRegistry::new();
        let dir = &self.config.manifests_dir;
        registry
            .load_dir(dir, &default_formats())
            .with_context(|| format!("loading manifests from {}", dir.display()))?;
        registry.get(persona).with_context(|| {
            format!(
                "persona '{persona}' not found in {} (known: {})",
                dir.display(),
                registry.personas().join(", ")
            )
        })
    }
}

/// `validate`: parse a manifest and summarize it
///
/// # Errors
/// Returns error if the manifest is invalid
pub fn validate(manifest: &Path, out: &mut impl Write) -> Result<()> {
    let def = load_file(manifest).with_context(|| format!("validating {}", manifest.display()))?;
    let header = def.header();
    writeln!(out, "{} ({}) v{}", header.name, header.persona, header.version)?;
    writeln!(out, "stages:     {}", def.len())?;
    writeln!(out, "edges:      {}", def.edges().len())?;
    writeln!(out, "roots:      {}", def.root_ids().join(", "))?;
    writeln!(out, "terminals:  {}", def.terminal_ids().join(", "))?;
    writeln!(out, "order:      {}", def.topological_order().join(" -> "))?;
    Ok(())
}

/// `paths`: print the default stage paths
///
/// # Errors
/// Returns error if the manifest is invalid
pub fn paths(manifest: &Path, out: &mut impl Write) -> Result<()> {
    let def = load_file(manifest).with_context(|| format!("loading {}", manifest.display()))?;
    let compiled = CompiledPersona::compile(def)?;
    let width = compiled
        .topology()
        .paths()
        .map(|(id, _)| id.len())
        .max()
        .unwrap_or(0);
    for (id, path) in compiled.topology().paths() {
        writeln!(out, "{id:<width$}  {path}")?;
    }
    Ok(())
}

/// Payload source for `materialize`
#[derive(Debug, Clone)]
pub enum Content {
    Inline(String),
    File(PathBuf),
}

impl Content {
    fn read(&self) -> Result<Value> {
        let text = match self {
            Self::Inline(text) => text.clone(),
            Self::File(path) => std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?,
        };
        serde_json::from_str(&text).context("stage content must be JSON")
    }
}

/// `materialize`: write one stage into a session
///
/// # Errors
/// Returns error if the persona is unknown, the content is not JSON, or
/// the engine rejects the stage
pub fn materialize(
    ctx: &Context,
    persona: &str,
    session: &str,
    stage: &str,
    content: &Content,
    out: &mut impl Write,
) -> Result<()> {
    let engine = ctx.engine(ctx.persona(persona)?);
    let root = ctx.session_root(persona, session)?;
    let value = content.read()?;

    let m = engine
        .materialize(&root, stage, value)
        .with_context(|| format!("materializing '{stage}' in {}", root.display()))?;
    writeln!(
        out,
        "{} {} -> {}",
        if m.replaced { "replaced" } else { "created" },
        m.stage_id,
        m.artifact_path.display()
    )?;
    writeln!(out, "fingerprint {}", m.envelope.fingerprint)?;
    for parent in &m.skipped_parents {
        writeln!(out, "skipped optional parent {parent}")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    persona: &'a str,
    session: &'a str,
    position: &'a Position,
    stale: &'a [StaleStage],
}

/// `status`: show the position of a session
///
/// # Errors
/// Returns error if the persona is unknown or the session is unreadable
pub fn status(ctx: &Context, persona: &str, session: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let engine = ctx.engine(ctx.persona(persona)?);
    let root = ctx.session_root(persona, session)?;
    let position = engine.position(&root)?;
    let stale = engine.stale_stages(&root)?;

    if json {
        let report = StatusReport {
            persona,
            session,
            position: &position,
            stale: &stale,
        };
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    write_position(&position, out)?;
    for s in &stale {
        writeln!(out, "stale:      {} ({:?})", s.stage_id, s.reason)?;
    }
    Ok(())
}

fn write_position(position: &Position, out: &mut impl Write) -> Result<()> {
    writeln!(out, "completed:  {}", position.completed_stages.join(", "))?;
    match &position.current_stage {
        Some(current) => {
            writeln!(out, "current:    {} ({})", current.id, current.name)?;
            if !current.instruction.is_empty() {
                writeln!(out, "            {}", current.instruction)?;
            }
            if let Some(warning) = &current.skip_warning {
                writeln!(out, "            skip warning: {}", warning.text)?;
            }
        }
        None => writeln!(out, "current:    (none)")?,
    }
    writeln!(out, "available:  {}", position.available_stages.join(", "))?;
    for command in &position.available_commands {
        writeln!(out, "  $ {command}")?;
    }
    Ok(())
}

/// Why a scenario run stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioEnd {
    /// Next stage completes only by operator action
    ActionStage(String),
    /// Nothing left to run
    Exhausted,
}

/// Summary of a scenario run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub session_root: PathBuf,
    pub materialized: Vec<String>,
    pub end: ScenarioEnd,
}

/// Payload keyed by the stage's `produces` names
#[must_use]
pub fn synthetic_payload(node: &DagNode, step: usize) -> Value {
    let outputs: Map<String, Value> = node
        .produces
        .iter()
        .map(|key| {
            (
                key.clone(),
                serde_json::json!({"stage": node.id, "step": step}),
            )
        })
        .collect();
    Value::Object(outputs)
}

/// `scenario`: drive a session from its current position to the end
///
/// Repeatedly materializes the first available stage that is not skipped,
/// stopping at an action stage (`completes_with: null`) or when nothing is
/// left.
///
/// # Errors
/// Returns error if the manifest is invalid, a skip names a stage that is
/// not optional, or a materialization fails
pub fn scenario(
    ctx: &Context,
    manifest: &Path,
    session: &str,
    skips: &[String],
    out: &mut impl Write,
) -> Result<ScenarioReport> {
    let def = load_file(manifest).with_context(|| format!("loading {}", manifest.display()))?;
    for id in skips {
        match def.node(id) {
            Some(node) if node.optional => {}
            Some(_) => bail!("cannot skip '{id}': stage is not optional"),
            None => bail!("cannot skip '{id}': no such stage"),
        }
    }

    let persona = Arc::new(CompiledPersona::compile(def)?);
    let root = ctx.session_root(persona.persona(), session)?;
    let engine = ctx.engine(Arc::clone(&persona));
    let skipped: HashSet<&str> = skips.iter().map(String::as_str).collect();
    let mut done: HashSet<String> = HashSet::new();
    let mut materialized = Vec::new();

    let end = loop {
        let position = engine.position(&root)?;
        let next = position
            .available_stages
            .iter()
            .find(|id| !skipped.contains(id.as_str()) && !done.contains(*id));
        let Some(id) = next else {
            break ScenarioEnd::Exhausted;
        };
        let Some(node) = persona.definition().node(id) else {
            bail!("stage '{id}' vanished from the definition");
        };
        if node.completes_with == CompletionRule::Never {
            break ScenarioEnd::ActionStage(id.clone());
        }

        let m = engine
            .materialize(&root, id, synthetic_payload(node, materialized.len() + 1))
            .with_context(|| format!("materializing '{id}'"))?;
        writeln!(out, "{:>3}. {:<16} {}", materialized.len() + 1, m.stage_id, m.path)?;
        done.insert(m.stage_id.clone());
        materialized.push(m.stage_id);
    };

    match &end {
        ScenarioEnd::ActionStage(id) => writeln!(out, "stopped at action stage '{id}'")?,
        ScenarioEnd::Exhausted => writeln!(out, "no stages left")?,
    }
    tracing::info!(
        session = %root.display(),
        stages = materialized.len(),
        "scenario finished"
    );

    Ok(ScenarioReport {
        session_root: root,
        materialized,
        end,
    })
}
