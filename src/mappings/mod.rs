//! Mapping channels.
//!
//! A mapping channel knows how to rename identifiers between the obfuscated
//! names shipped by the game and human readable ones. It does so by
//! registering tasks: one remapping a compiled jar, one remapping a sources
//! jar and one writing mappings for debuggers. Every builder receives the same
//! [`TaskBuildingContext`].
//!
//! [`ToolMappingChannel`] is the stock channel: each builder runs a configured
//! tool with templated arguments. Supported placeholders are `{input}`,
//! `{output}`, `{mappings}`, `{libraries}`, any mapping version key such as
//! `{version}` and any game artifact name such as `{clientMappings}`.

use anyhow::{Result, bail};
use indexmap::IndexMap;
use std::fmt;
use std::path::PathBuf;

use crate::artifact::ArtifactRef;
use crate::core::DistributionType;
use crate::game::{GameArtifact, GameArtifactTasks, capitalize};
use crate::task::{Provider, TaskAction, TaskGraph, TaskId, TaskSpec, ToolTemplate};

/// Shared input of every mapping task builder.
pub struct TaskBuildingContext<'a> {
    /// Graph the tasks are registered in
    pub graph: &'a mut TaskGraph,
    /// Prefix of every registered task name
    pub prefix: String,
    /// Task whose output is remapped
    pub input: TaskId,
    /// Directory the tasks write into
    pub working_dir: PathBuf,
    /// Game artifacts of the runtime providing the mappings
    pub game_artifacts: &'a GameArtifactTasks,
    /// Mapping version data of that runtime
    pub mapping_version: &'a IndexMap<String, String>,
    /// Task listing the libraries, when the runtime has one
    pub libraries: Option<TaskId>,
}

impl TaskBuildingContext<'_> {
    /// `<prefix><Suffix>`
    pub fn task_name(&self, suffix: &str) -> String {
        format!("{}{}", self.prefix, capitalize(suffix))
    }

    /// Output file for the task registered under `suffix`.
    pub fn output_file(&self, suffix: &str, extension: &str) -> PathBuf {
        self.working_dir.join(suffix).join(format!("output.{extension}"))
    }

    /// The official mappings matching the runtime's side.
    pub fn mappings_task(&self) -> Option<TaskId> {
        let side = self.mapping_version.get("side").and_then(|side| side.parse::<DistributionType>().ok());
        let artifact = match side {
            Some(DistributionType::Server) => GameArtifact::ServerMappings,
            _ => GameArtifact::ClientMappings,
        };
        self.game_artifacts.get(&artifact).copied()
    }

    /// Register a tool task from `template` under `suffix`.
    pub fn register_tool(&mut self, suffix: &str, template: &ToolTemplate, extension: &str) -> Result<TaskId> {
        let name = self.task_name(suffix);
        let output = self.output_file(suffix, extension);

        let invocation = {
            let context = &*self;
            let mut resolve = |placeholder: &str| -> Result<Provider<String>> {
                match placeholder {
                    "input" => Ok(Provider::output_of(context.input).into_argument()),
                    "output" => Ok(Provider::value(output.display().to_string())),
                    "mappings" => match context.mappings_task() {
                        Some(task) => Ok(Provider::output_of(task).into_argument()),
                        None => bail!("Task '{name}' needs {{mappings}} but no mappings artifact is available"),
                    },
                    "libraries" => match context.libraries {
                        Some(task) => Ok(Provider::output_of(task).into_argument()),
                        None => bail!("Task '{name}' needs {{libraries}} but no library list is available"),
                    },
                    other => {
                        if let Some(value) = context.mapping_version.get(other) {
                            return Ok(Provider::value(value.clone()));
                        }
                        match GameArtifact::from_name(other).and_then(|artifact| context.game_artifacts.get(&artifact))
                        {
                            Some(&task) => Ok(Provider::output_of(task).into_argument()),
                            None => bail!("Task '{name}' uses unknown placeholder '{{{other}}}'"),
                        }
                    }
                }
            };
            template.invocation(&mut resolve)?
        };

        self.graph.register(
            TaskSpec::new(name, TaskAction::Tool(invocation))
                .with_output(output)
                .depends_on(self.input)
                .with_description(format!("Runs {}", template.tool)),
        )
    }
}

/// A naming scheme able to remap jars.
pub trait MappingChannel {
    /// Channel name, e.g. `official`.
    fn name(&self) -> &str;

    /// Register a task renaming the classes of the context's input jar.
    fn apply_compiled_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId>;

    /// Register a task renaming identifiers in the context's sources jar.
    fn apply_source_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId>;

    /// Register a task writing mappings for debuggers.
    fn generate_debugging_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId>;
}

/// A channel whose builders run configured tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMappingChannel {
    name: String,
    compiled: ToolTemplate,
    sources: ToolTemplate,
    debugging: ToolTemplate,
}

impl ToolMappingChannel {
    /// A channel named `name` running the given tools.
    pub fn new(name: impl Into<String>, compiled: ToolTemplate, sources: ToolTemplate, debugging: ToolTemplate) -> Self {
        Self {
            name: name.into(),
            compiled,
            sources,
            debugging,
        }
    }

    /// The channel applying the game's official mappings.
    pub fn official() -> Self {
        let installer_tools =
            ArtifactRef::new("net.neoforged.installertools", "installertools", "2.1.2").with_classifier("fatjar");
        Self::new(
            "official",
            ToolTemplate::new(
                ArtifactRef::new("net.neoforged", "AutoRenamingTool", "2.0.3").with_classifier("all"),
                [
                    "--input", "{input}", "--output", "{output}", "--names", "{mappings}", "--ann-fix", "--ids-fix",
                    "--src-fix", "--record-fix",
                ],
            ),
            ToolTemplate::new(
                installer_tools.clone(),
                ["--task", "SRG_TO_MCP", "--input", "{input}", "--output", "{output}", "--mcp", "{mappings}"],
            ),
            ToolTemplate::new(
                installer_tools,
                ["--task", "MERGE_MAPPING", "--left", "{mappings}", "--reverse-left", "--output", "{output}"],
            ),
        )
    }

    /// Tool renaming compiled jars.
    pub fn compiled(&self) -> &ToolTemplate {
        &self.compiled
    }

    /// Tool renaming sources jars.
    pub fn sources(&self) -> &ToolTemplate {
        &self.sources
    }

    /// Tool writing debugging mappings.
    pub fn debugging(&self) -> &ToolTemplate {
        &self.debugging
    }

    /// Replace the compiled remapping tool.
    #[must_use]
    pub fn with_compiled(mut self, template: ToolTemplate) -> Self {
        self.compiled = template;
        self
    }

    /// Replace the source remapping tool.
    #[must_use]
    pub fn with_sources(mut self, template: ToolTemplate) -> Self {
        self.sources = template;
        self
    }

    /// Replace the debugging mappings tool.
    #[must_use]
    pub fn with_debugging(mut self, template: ToolTemplate) -> Self {
        self.debugging = template;
        self
    }
}

impl MappingChannel for ToolMappingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply_compiled_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        context.register_tool("remapCompiled", &self.compiled, "jar")
    }

    fn apply_source_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        context.register_tool("remapSources", &self.sources, "jar")
    }

    fn generate_debugging_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        context.register_tool("debuggingMappings", &self.debugging, "tsrg")
    }
}

impl fmt::Display for ToolMappingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.compiled.tool)
    }
}
