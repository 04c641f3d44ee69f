//! Step builders and placeholder resolution.
//!
//! Every step of a manifest is turned into a task by the builder registered
//! for its type tag in a [`StepRegistry`]. Builders are stateless: everything
//! they need arrives in the [`StepContext`], so one registry serves every
//! runtime of a build.
//!
//! Types without a built-in builder are looked up in the manifest's
//! `functions` table and run as external tools. A type found in neither is a
//! fatal configuration error.
//!
//! # Placeholders
//!
//! A step value `{X}` is resolved, in order, to:
//!
//! 1. the adapted chain head, when `X` is `input` and a pre-adapter replaced it
//! 2. the output of step `S`, when `X` is `SOutput`
//! 3. the output of step `X`
//! 4. the game artifact named `X` (also reachable as `download…Output`)
//! 5. the data file `X` from the unpacked runtime archive
//! 6. the runtime values `libraries`, `version` and `side`
//!
//! Anything else fails with [`ForgeGraphError::UnresolvablePlaceholder`].

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::path::PathBuf;
use std::sync::Arc;

use super::config::{FunctionConfig, StepConfig};
use super::definition::RuntimeDefinition;
use crate::artifact::ArtifactRef;
use crate::core::ForgeGraphError;
use crate::game::{GameArtifact, capitalize};
use crate::task::template::{expand, whole_placeholder};
use crate::task::{Provider, TaskAction, TaskGraph, TaskId, TaskSpec, ToolTemplate};

/// A resolved step value.
#[derive(Debug, Clone)]
pub enum StepValue {
    /// A file, possibly produced by a task
    File(Provider<PathBuf>),
    /// Text, possibly embedding file paths
    Text(Provider<String>),
}

impl StepValue {
    /// A constant text value.
    pub fn literal(value: impl Into<String>) -> Self {
        Self::Text(Provider::value(value.into()))
    }

    /// Render the value as a tool argument.
    pub fn into_argument(self) -> Provider<String> {
        match self {
            Self::File(file) => file.into_argument(),
            Self::Text(text) => text,
        }
    }

    /// Tasks the value is produced by.
    pub fn dependencies(&self) -> &[TaskId] {
        match self {
            Self::File(file) => file.dependencies(),
            Self::Text(text) => text.dependencies(),
        }
    }
}

/// Everything a step builder may read or extend.
pub struct StepContext<'a> {
    /// Graph the pipeline is built into
    pub graph: &'a mut TaskGraph,
    /// The definition being baked
    pub definition: &'a RuntimeDefinition,
    /// The step being built
    pub step: &'a StepConfig,
    /// Steps built so far
    pub steps: &'a IndexMap<String, TaskId>,
    /// Chain head before the step
    pub current: TaskId,
    /// Replacement for the step's `{input}`, set when a pre-adapter changed the chain
    pub adapted_input: Option<TaskId>,
}

impl StepContext<'_> {
    /// `<runtime identifier><Step name>`
    pub fn task_name(&self) -> String {
        format!("{}{}", self.definition.identifier(), capitalize(self.step.name()))
    }

    /// Directory owned by this step.
    pub fn output_dir(&self) -> PathBuf {
        self.definition.working_dir().join("steps").join(self.step.name())
    }

    /// Output file of this step with the given extension.
    pub fn output_file(&self, extension: &str) -> PathBuf {
        self.output_dir().join(format!("output.{extension}"))
    }

    /// Resolve the placeholder `placeholder` found in argument `argument`.
    pub fn lookup(&self, argument: &str, placeholder: &str) -> Result<StepValue> {
        if placeholder == "input" {
            if let Some(adapted) = self.adapted_input {
                return Ok(StepValue::File(Provider::output_of(adapted)));
            }
        }

        let step_name = placeholder.strip_suffix("Output");
        if let Some(&task) = step_name.and_then(|name| self.steps.get(name)) {
            return Ok(StepValue::File(Provider::output_of(task)));
        }
        if let Some(&task) = self.steps.get(placeholder) {
            return Ok(StepValue::File(Provider::output_of(task)));
        }

        let artifact = GameArtifact::from_name(placeholder)
            .or_else(|| step_name.and_then(GameArtifact::from_step_type));
        if let Some(&task) = artifact.and_then(|artifact| self.definition.game_artifacts().get(&artifact)) {
            return Ok(StepValue::File(Provider::output_of(task)));
        }

        let side = self.definition.specification().side();
        if let Some(path) = self.definition.config().data_path(placeholder, side) {
            return Ok(StepValue::File(Provider::value(self.definition.unpacked_dir().join(path))));
        }

        match placeholder {
            "libraries" => {
                if let Some(&task) = self.steps.get("listLibraries") {
                    return Ok(StepValue::File(Provider::output_of(task)));
                }
            }
            "version" => {
                return Ok(StepValue::literal(self.definition.specification().game_version()));
            }
            "side" => return Ok(StepValue::literal(side.name())),
            _ => {}
        }

        Err(ForgeGraphError::UnresolvablePlaceholder {
            step: self.step.name().to_string(),
            argument: argument.to_string(),
            placeholder: placeholder.to_string(),
        }
        .into())
    }

    /// Resolve the step value `key`.
    ///
    /// Undeclared keys are looked up as placeholders of the same name, so a
    /// function argument `{mappings}` finds the `mappings` data file even when
    /// the step does not redeclare it. An undeclared `input` is the chain head.
    pub fn value(&self, key: &str) -> Result<StepValue> {
        if key == "input" {
            if let Some(adapted) = self.adapted_input {
                return Ok(StepValue::File(Provider::output_of(adapted)));
            }
        }

        let Some(template) = self.step.values.get(key) else {
            if key == "input" {
                return Ok(StepValue::File(Provider::output_of(self.current)));
            }
            return self.lookup(key, key);
        };

        if let Some(placeholder) = whole_placeholder(template) {
            return self.lookup(key, placeholder);
        }
        let mut resolve = |placeholder: &str| self.lookup(key, placeholder).map(StepValue::into_argument);
        Ok(StepValue::Text(expand(template, &mut resolve)?))
    }

    /// The file the step reads its main input from.
    pub fn input_file(&self) -> Result<Provider<PathBuf>> {
        match self.value("input")? {
            StepValue::File(file) => Ok(file),
            StepValue::Text(path) => Ok(path.map(PathBuf::from)),
        }
    }

    /// Tasks referenced by any declared value of the step, plus the adapted input.
    pub fn declared_dependencies(&self) -> Result<Vec<TaskId>> {
        let mut dependencies = Vec::new();
        for key in self.step.values.keys() {
            for &task in self.value(key)?.dependencies() {
                if !dependencies.contains(&task) {
                    dependencies.push(task);
                }
            }
        }
        if let Some(adapted) = self.adapted_input {
            if !dependencies.contains(&adapted) {
                dependencies.push(adapted);
            }
        }
        Ok(dependencies)
    }
}

/// Builds the task of one step type.
pub trait StepBuilder: Send + Sync {
    /// Register the step's task and return its handle.
    fn build(&self, context: &mut StepContext<'_>) -> Result<TaskId>;
}

impl<F> StepBuilder for F
where
    F: Fn(&mut StepContext<'_>) -> Result<TaskId> + Send + Sync,
{
    fn build(&self, context: &mut StepContext<'_>) -> Result<TaskId> {
        self(context)
    }
}

/// Lookup table from step type tag to builder.
#[derive(Clone)]
pub struct StepRegistry {
    builders: IndexMap<String, Arc<dyn StepBuilder>>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRegistry").field("types", &self.builders.keys().collect::<Vec<_>>()).finish()
    }
}

impl StepRegistry {
    /// A registry without any builder.
    pub fn empty() -> Self {
        Self {
            builders: IndexMap::new(),
        }
    }

    /// A registry with every built-in step type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for artifact in GameArtifact::ALL {
            registry.register(artifact.step_type(), move |context: &mut StepContext<'_>| {
                game_artifact_step(context, artifact)
            });
        }
        registry.register("strip", strip_step);
        registry.register("listLibraries", list_libraries_step);
        registry.register("inject", inject_step);
        registry.register("patch", PatchStep::new(default_patcher()));
        registry
    }

    /// Register or replace the builder for `step_type`.
    pub fn register(&mut self, step_type: impl Into<String>, builder: impl StepBuilder + 'static) {
        self.builders.insert(step_type.into(), Arc::new(builder));
    }

    /// Whether `step_type` has a built-in builder.
    pub fn contains(&self, step_type: &str) -> bool {
        self.builders.contains_key(step_type)
    }

    /// Build the task for the context's step.
    ///
    /// Built-in types win over manifest functions of the same name.
    pub fn build(&self, context: &mut StepContext<'_>) -> Result<TaskId> {
        let step_type = context.step.step_type.as_str();
        if let Some(builder) = self.builders.get(step_type) {
            return builder.build(context);
        }
        if let Some(function) = context.definition.config().functions.get(step_type) {
            return function_step(context, function);
        }
        Err(ForgeGraphError::UnknownStepType {
            step: context.step.name().to_string(),
            step_type: step_type.to_string(),
        }
        .into())
    }
}

fn game_artifact_step(context: &mut StepContext<'_>, artifact: GameArtifact) -> Result<TaskId> {
    context.definition.game_artifacts().get(&artifact).copied().with_context(|| {
        format!("Runtime '{}' has no task for game artifact {artifact}", context.definition.identifier())
    })
}

fn strip_step(context: &mut StepContext<'_>) -> Result<TaskId> {
    let input = context.input_file()?;
    let keep_classes = context.step.values.get("mode").is_none_or(|mode| mode != "blacklist");
    let spec = TaskSpec::new(
        context.task_name(),
        TaskAction::Strip {
            input,
            keep_classes,
        },
    )
    .with_output(context.output_file("jar"));
    context.graph.register(spec)
}

fn list_libraries_step(context: &mut StepContext<'_>) -> Result<TaskId> {
    let spec = TaskSpec::new(
        context.task_name(),
        TaskAction::ListLibraries {
            libraries: context.definition.minecraft_dependencies().to_vec(),
            files: context.definition.specification().additional_dependencies().to_vec(),
        },
    )
    .with_output(context.output_file("txt"));
    context.graph.register(spec)
}

fn inject_step(context: &mut StepContext<'_>) -> Result<TaskId> {
    let input = context.input_file()?;
    let side = context.definition.specification().side();
    let inject_dir = context.definition.config().data_path("inject", side).ok_or_else(|| {
        ForgeGraphError::MissingDataEntry {
            name: "inject".to_string(),
            side: side.name().to_string(),
        }
    })?;
    let spec = TaskSpec::new(
        context.task_name(),
        TaskAction::Inject {
            input,
            inject_dir: context.definition.unpacked_dir().join(inject_dir),
        },
    )
    .with_output(context.output_file("jar"));
    context.graph.register(spec)
}

/// The default binary patcher invocation.
pub fn default_patcher() -> ToolTemplate {
    ToolTemplate::new(
        ArtifactRef::new("codechicken", "DiffPatch", "1.5.0.30").with_classifier("all"),
        ["{input}", "{patches}", "--output", "{output}", "--mode", "OFFSET", "--archive", "ZIP"],
    )
}

/// Applies the runtime's source patches with an external patcher.
#[derive(Debug, Clone)]
pub struct PatchStep {
    patcher: ToolTemplate,
}

impl PatchStep {
    /// A patch step running `patcher`.
    pub fn new(patcher: ToolTemplate) -> Self {
        Self {
            patcher,
        }
    }
}

impl StepBuilder for PatchStep {
    fn build(&self, context: &mut StepContext<'_>) -> Result<TaskId> {
        let side = context.definition.specification().side();
        if context.definition.config().data_path("patches", side).is_none() {
            return Err(ForgeGraphError::MissingDataEntry {
                name: "patches".to_string(),
                side: side.name().to_string(),
            }
            .into());
        }
        tool_step(context, &self.patcher)
    }
}

fn function_step(context: &mut StepContext<'_>, function: &FunctionConfig) -> Result<TaskId> {
    let template = ToolTemplate {
        tool: function.version.clone(),
        args: function.args.clone(),
        jvm_args: function.jvmargs.clone(),
    };
    tool_step(context, &template)
}

fn tool_step(context: &mut StepContext<'_>, template: &ToolTemplate) -> Result<TaskId> {
    let extension = if context.step.step_type.to_ascii_lowercase().contains("mappings") {
        "tsrg"
    } else {
        "jar"
    };
    let output = context.output_file(extension);
    let log = context.output_dir().join("log.txt");

    let invocation = {
        let context = &*context;
        let mut resolve = |name: &str| -> Result<Provider<String>> {
            match name {
                "output" => Ok(Provider::value(output.display().to_string())),
                "log" => Ok(Provider::value(log.display().to_string())),
                key => context.value(key).map(StepValue::into_argument),
            }
        };
        template.invocation(&mut resolve)?
    };

    let spec = TaskSpec::new(context.task_name(), TaskAction::Tool(invocation))
        .with_output(&output)
        .with_description(format!("Runs {} for step {}", template.tool, context.step.name()));
    context.graph.register(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table() {
        let registry = StepRegistry::with_builtins();
        for step_type in ["downloadClient", "downloadJson", "strip", "listLibraries", "inject", "patch"] {
            assert!(registry.contains(step_type), "{step_type}");
        }
        assert!(!registry.contains("decompile"));
    }

    #[test]
    fn test_step_value_literal() {
        let value = StepValue::literal("joined");
        assert!(value.dependencies().is_empty());
        assert_eq!(value.into_argument().get(&TaskGraph::new()).unwrap(), "joined");
    }
}
