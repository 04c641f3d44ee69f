//! The pipeline step engine.
//!
//! Baking walks the manifest steps of a definition in declared order and
//! threads a chain head through them:
//!
//! - pre-adapters of a step run on the chain head; if one of them produces a
//!   task, that task replaces the step's `{input}`
//! - the step's own task is built by its [`StepBuilder`](super::StepBuilder)
//! - post-adapters run on the step's task; the last produced handle is what
//!   the step name maps to
//!
//! Afterwards the definition's raw and sources placeholders are redirected at
//! the raw step and at the final chain head.

use anyhow::{Context, Result};
use indexmap::IndexMap;

use super::adapter::{AdapterContext, AdapterRef};
use super::definition::{BakedPipeline, RuntimeDefinition};
use super::steps::{StepContext, StepRegistry};
use crate::core::DistributionType;
use crate::game::GameArtifact;
use crate::task::{TaskGraph, TaskId};

/// The artifact a pipeline of `side` starts from.
pub fn entry_artifact(side: DistributionType) -> GameArtifact {
    match side {
        DistributionType::Server => GameArtifact::ServerJar,
        DistributionType::Client | DistributionType::Joined => GameArtifact::ClientJar,
    }
}

/// Mapping version data recorded while baking.
pub fn mapping_version_data(definition: &RuntimeDefinition) -> IndexMap<String, String> {
    let specification = definition.specification();
    let mut data = IndexMap::new();
    data.insert("version".to_string(), specification.game_version().to_string());
    data.insert("minecraft_version".to_string(), definition.config().version.clone());
    data.insert("side".to_string(), specification.side().name().to_string());
    data.insert("runtime".to_string(), specification.identifier().to_string());
    data
}

/// Bake `definition` into `graph`. Running it again returns the first result.
pub fn bake(graph: &mut TaskGraph, definition: &RuntimeDefinition, registry: &StepRegistry) -> Result<BakedPipeline> {
    if let Some(baked) = definition.baked() {
        tracing::trace!("Runtime '{}' is already baked", definition.identifier());
        return Ok(baked.clone());
    }

    let specification = definition.specification();
    let side = specification.side();
    let mapping_version = definition.record_mapping_version(mapping_version_data(definition));
    let entry = entry_artifact(side);
    let mut current = definition
        .game_artifacts()
        .get(&entry)
        .copied()
        .with_context(|| format!("Runtime '{}' has no {entry} task", definition.identifier()))?;

    let mut steps: IndexMap<String, TaskId> = IndexMap::new();
    let mut additional_tasks = Vec::new();

    for step in definition.config().steps_for(side)? {
        let name = step.name();
        tracing::debug!("Baking step '{name}' ({}) of runtime '{}'", step.step_type, definition.identifier());

        let before = current;
        current = run_adapters(
            graph,
            definition,
            name,
            current,
            specification.pre_adapters(name),
            mapping_version,
            &mut additional_tasks,
        )?;
        let adapted_input = (current != before).then_some(current);

        let task = {
            let mut context = StepContext {
                graph: &mut *graph,
                definition,
                step,
                steps: &steps,
                current,
                adapted_input,
            };
            let task = registry
                .build(&mut context)
                .with_context(|| format!("Failed to build step '{name}' of runtime '{}'", definition.identifier()))?;
            let dependencies = context.declared_dependencies()?;
            if !definition.game_artifacts().values().any(|&artifact| artifact == task) {
                for dependency in dependencies {
                    if dependency != task {
                        graph.depends_on(task, dependency)?;
                    }
                }
            }
            task
        };
        current = task;

        current = run_adapters(
            graph,
            definition,
            name,
            current,
            specification.post_adapters(name),
            mapping_version,
            &mut additional_tasks,
        )?;
        steps.insert(name.to_string(), current);
    }

    let sources = current;
    let raw = match steps.get(specification.raw_step()) {
        Some(&raw) => raw,
        None => {
            tracing::warn!(
                "Runtime '{}' has no step named '{}', exposing the final output as raw jar",
                definition.identifier(),
                specification.raw_step()
            );
            sources
        }
    };

    graph.redirect(definition.sources_jar(), sources)?;
    graph.redirect(definition.raw_jar(), raw)?;
    for &task in &additional_tasks {
        graph.depends_on(definition.sources_jar(), task)?;
    }

    tracing::info!(
        "Baked runtime '{}' with {} steps (raw: {}, sources: {})",
        definition.identifier(),
        steps.len(),
        graph.name(raw),
        graph.name(sources)
    );

    Ok(definition
        .record_baked(BakedPipeline {
            steps,
            additional_tasks,
            raw,
            sources,
        })
        .clone())
}

fn run_adapters(
    graph: &mut TaskGraph,
    definition: &RuntimeDefinition,
    step: &str,
    mut current: TaskId,
    adapters: &[AdapterRef],
    mapping_version: &IndexMap<String, String>,
    additional_tasks: &mut Vec<TaskId>,
) -> Result<TaskId> {
    for adapter in adapters {
        let mut context = AdapterContext {
            graph: &mut *graph,
            definition,
            step,
            input: current,
            working_dir: definition.working_dir(),
            game_artifacts: definition.game_artifacts(),
            mapping_version,
            additional_tasks: &mut *additional_tasks,
        };
        if let Some(produced) = adapter
            .adapt(&mut context)
            .with_context(|| format!("Adapter on step '{step}' of runtime '{}' failed", definition.identifier()))?
        {
            tracing::debug!("Adapter on step '{step}' replaced the chain head with '{}'", graph.name(produced));
            current = produced;
        }
    }
    Ok(current)
}
