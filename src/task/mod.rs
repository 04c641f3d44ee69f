//! The lazy task graph.
//!
//! Pipelines are built as tasks in a [`TaskGraph`]: each task produces at most
//! one output file and depends on an ordered set of upstream tasks. Building
//! the graph never performs work; the [`executor`] runs a schedule derived from
//! it later.
//!
//! Two kinds of indirection keep construction order flexible:
//!
//! - **Placeholders** ([`TaskGraph::register_placeholder`]) are tasks whose
//!   output is forwarded to another task chosen later with
//!   [`TaskGraph::redirect`]. Consumers can hold a stable handle to "the
//!   sources jar" long before the pipeline producing it is baked.
//! - **Providers** ([`Provider`]) are values computed from the wired graph,
//!   such as the output path of a placeholder.
//!
//! ```
//! use forgegraph::task::{Provider, TaskAction, TaskGraph, TaskSpec};
//!
//! let mut graph = TaskGraph::new();
//! let sources = graph.register_placeholder("sourcesJar").unwrap();
//! let decompile = graph
//!     .register(TaskSpec::new("decompile", TaskAction::Lifecycle).with_output("/tmp/out.jar"))
//!     .unwrap();
//! graph.redirect(sources, decompile).unwrap();
//! assert_eq!(graph.output(sources).unwrap(), std::path::PathBuf::from("/tmp/out.jar"));
//! ```

pub mod executor;
pub mod provider;
pub mod template;

pub use executor::{ExecutionReport, ExecutionServices, TaskExecutor};
pub use provider::Provider;
pub use template::ToolTemplate;

use anyhow::{Result, bail};
use indexmap::IndexSet;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactRef;
use crate::core::ForgeGraphError;
use crate::game::GameArtifact;

/// Handle to a task in a [`TaskGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(usize);

impl TaskId {
    /// Position of the task in registration order.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An invocation of an external jar tool.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Coordinate of the executable jar
    pub tool: ArtifactRef,
    /// Program arguments, evaluated when the task runs
    pub args: Vec<Provider<String>>,
    /// Arguments passed to the JVM before `-jar`
    pub jvm_args: Vec<String>,
}

/// What a task does when executed.
#[derive(Debug, Clone)]
pub enum TaskAction {
    /// Aggregates dependencies, no work of its own
    Lifecycle,
    /// Placeholder whose output is another task's output
    Forward,
    /// Copies an existing file into the task output
    ProvideFile(PathBuf),
    /// Materialises a game artifact through the game cache
    GameArtifact {
        /// Game version
        version: String,
        /// Which artifact
        artifact: GameArtifact,
    },
    /// Writes the resolved library files, one `-e=<path>` line each
    ListLibraries {
        /// Library coordinates
        libraries: Vec<ArtifactRef>,
        /// Library files listed as they are
        files: Vec<PathBuf>,
    },
    /// Copies a jar keeping only class entries (or only non-class entries)
    Strip {
        /// Jar to filter
        input: Provider<PathBuf>,
        /// Keep `.class` entries when true, everything else when false
        keep_classes: bool,
    },
    /// Copies a jar and adds the files of a directory to it
    Inject {
        /// Jar to extend
        input: Provider<PathBuf>,
        /// Directory whose files are added
        inject_dir: PathBuf,
    },
    /// Runs an external tool
    Tool(ToolInvocation),
    /// Copies raw and sources outputs over synthetic repository placeholders
    Combine {
        /// Raw jar
        raw: Provider<PathBuf>,
        /// Sources jar
        sources: Provider<PathBuf>,
        /// Placeholder file for the raw jar
        raw_target: PathBuf,
        /// Placeholder file for the sources jar
        sources_target: PathBuf,
    },
}

impl TaskAction {
    /// Short name of the action, used in descriptions and fingerprints.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Lifecycle => "lifecycle",
            Self::Forward => "forward",
            Self::ProvideFile(_) => "provideFile",
            Self::GameArtifact {
                ..
            } => "gameArtifact",
            Self::ListLibraries {
                ..
            } => "listLibraries",
            Self::Strip {
                ..
            } => "strip",
            Self::Inject {
                ..
            } => "inject",
            Self::Tool(_) => "tool",
            Self::Combine {
                ..
            } => "combine",
        }
    }

    /// Tasks the action reads from through its providers.
    pub fn input_dependencies(&self) -> Vec<TaskId> {
        match self {
            Self::Strip {
                input, ..
            }
            | Self::Inject {
                input, ..
            } => input.dependencies().to_vec(),
            Self::Tool(invocation) => {
                invocation.args.iter().flat_map(|arg| arg.dependencies().iter().copied()).collect()
            }
            Self::Combine {
                raw,
                sources,
                ..
            } => raw.dependencies().iter().chain(sources.dependencies()).copied().collect(),
            _ => Vec::new(),
        }
    }
}

/// Everything needed to register a task.
#[derive(Debug, Clone)]
pub struct TaskSpec {
    name: String,
    action: TaskAction,
    output: Option<PathBuf>,
    dependencies: Vec<TaskId>,
    description: Option<String>,
}

impl TaskSpec {
    /// A task named `name` performing `action`.
    pub fn new(name: impl Into<String>, action: TaskAction) -> Self {
        Self {
            name: name.into(),
            action,
            output: None,
            dependencies: Vec::new(),
            description: None,
        }
    }

    /// Set the output file.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    /// Add an explicit dependency.
    #[must_use]
    pub fn depends_on(mut self, task: TaskId) -> Self {
        self.dependencies.push(task);
        self
    }

    /// Add several explicit dependencies.
    #[must_use]
    pub fn depends_on_all(mut self, tasks: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(tasks);
        self
    }

    /// Attach a human readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A registered task.
#[derive(Debug, Clone)]
pub struct TaskNode {
    name: String,
    action: TaskAction,
    output: Option<PathBuf>,
    forward: Option<TaskId>,
    dependencies: IndexSet<TaskId>,
    description: Option<String>,
}

impl TaskNode {
    /// Unique task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The action run by the executor.
    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    /// Declared output, `None` for lifecycle tasks and placeholders.
    pub fn declared_output(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    /// Forwarding target of a placeholder.
    pub fn forward(&self) -> Option<TaskId> {
        self.forward
    }

    /// Direct upstream tasks in insertion order.
    pub fn dependencies(&self) -> &IndexSet<TaskId> {
        &self.dependencies
    }

    /// Optional description.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Whether the task is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        matches!(self.action, TaskAction::Forward)
    }
}

/// Arena of tasks addressed by [`TaskId`].
#[derive(Debug, Default, Clone)]
pub struct TaskGraph {
    nodes: Vec<TaskNode>,
    by_name: HashMap<String, TaskId>,
}

impl TaskGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no task is registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Register a task. Provider inputs of the action become dependencies.
    pub fn register(&mut self, spec: TaskSpec) -> Result<TaskId> {
        if self.by_name.contains_key(&spec.name) {
            return Err(ForgeGraphError::DuplicateTask {
                name: spec.name,
            }
            .into());
        }

        let id = TaskId(self.nodes.len());
        let mut dependencies = IndexSet::new();
        for dependency in spec.action.input_dependencies().into_iter().chain(spec.dependencies) {
            self.check(dependency)?;
            dependencies.insert(dependency);
        }

        tracing::trace!("Registered task '{}' ({})", spec.name, spec.action.kind());
        self.by_name.insert(spec.name.clone(), id);
        self.nodes.push(TaskNode {
            name: spec.name,
            action: spec.action,
            output: spec.output,
            forward: None,
            dependencies,
            description: spec.description,
        });
        Ok(id)
    }

    /// Register a placeholder to be pointed at a real task later.
    pub fn register_placeholder(&mut self, name: impl Into<String>) -> Result<TaskId> {
        self.register(TaskSpec::new(name, TaskAction::Forward))
    }

    /// Point `placeholder` at `target`.
    ///
    /// Redirecting again to the same target is a no-op; redirecting to a
    /// different target is an error.
    pub fn redirect(&mut self, placeholder: TaskId, target: TaskId) -> Result<()> {
        self.check(placeholder)?;
        self.check(target)?;
        if placeholder == target {
            bail!("Placeholder task '{}' cannot forward to itself", self.name(placeholder));
        }

        let node = &self.nodes[placeholder.0];
        if !node.is_placeholder() {
            bail!("Task '{}' is not a placeholder and cannot be redirected", node.name);
        }
        match node.forward {
            Some(existing) if existing == target => return Ok(()),
            Some(existing) => {
                return Err(ForgeGraphError::PlaceholderAlreadyRedirected {
                    name: node.name.clone(),
                    target: self.nodes[existing.0].name.clone(),
                }
                .into());
            }
            None => {}
        }

        tracing::debug!("Redirecting '{}' to '{}'", node.name, self.nodes[target.0].name);
        let node = &mut self.nodes[placeholder.0];
        node.forward = Some(target);
        node.dependencies.insert(target);
        Ok(())
    }

    /// Add `dependency` as an upstream task of `task`.
    pub fn depends_on(&mut self, task: TaskId, dependency: TaskId) -> Result<()> {
        self.check(task)?;
        self.check(dependency)?;
        if task == dependency {
            bail!("Task '{}' cannot depend on itself", self.name(task));
        }
        self.nodes[task.0].dependencies.insert(dependency);
        Ok(())
    }

    /// The registered node for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    pub fn node(&self, id: TaskId) -> &TaskNode {
        &self.nodes[id.0]
    }

    /// Name of the task behind `id`.
    pub fn name(&self, id: TaskId) -> &str {
        &self.node(id).name
    }

    /// Look a task up by name.
    pub fn find(&self, name: &str) -> Option<TaskId> {
        self.by_name.get(name).copied()
    }

    /// Look a task up by name, failing when it is absent.
    pub fn get(&self, name: &str) -> Result<TaskId> {
        self.find(name).ok_or_else(|| {
            ForgeGraphError::TaskNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    /// Direct upstream tasks of `id`.
    pub fn dependencies(&self, id: TaskId) -> impl Iterator<Item = TaskId> + '_ {
        self.node(id).dependencies.iter().copied()
    }

    /// Iterate over all tasks in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &TaskNode)> {
        self.nodes.iter().enumerate().map(|(index, node)| (TaskId(index), node))
    }

    /// Follow placeholders from `id` to the task that really produces the output.
    pub fn resolve(&self, id: TaskId) -> Result<TaskId> {
        let mut current = id;
        for _ in 0..=self.nodes.len() {
            let node = self.node(current);
            match (node.is_placeholder(), node.forward) {
                (true, Some(target)) => current = target,
                (true, None) => {
                    return Err(ForgeGraphError::UnresolvedOutput {
                        name: node.name.clone(),
                    }
                    .into());
                }
                (false, _) => return Ok(current),
            }
        }
        Err(ForgeGraphError::CircularDependency {
            chain: format!("placeholder chain starting at '{}'", self.name(id)),
        }
        .into())
    }

    /// Output file of `id`, following placeholders.
    pub fn output(&self, id: TaskId) -> Result<PathBuf> {
        let resolved = self.resolve(id)?;
        match &self.node(resolved).output {
            Some(output) => Ok(output.clone()),
            None => bail!("Task '{}' does not produce a file", self.name(resolved)),
        }
    }

    /// Whether `task` depends on `on`, directly or transitively.
    pub fn depends_transitively(&self, task: TaskId, on: TaskId) -> bool {
        let mut stack: Vec<TaskId> = self.dependencies(task).collect();
        let mut seen = IndexSet::new();
        while let Some(current) = stack.pop() {
            if current == on {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.dependencies(current));
            }
        }
        false
    }

    /// Every task needed to build `targets`, in dependency order.
    pub fn schedule(&self, targets: &[TaskId]) -> Result<Vec<TaskId>> {
        for &target in targets {
            self.check(target)?;
        }

        let mut reachable = IndexSet::new();
        let mut stack: Vec<TaskId> = targets.to_vec();
        while let Some(current) = stack.pop() {
            if reachable.insert(current) {
                stack.extend(self.dependencies(current));
            }
        }

        let mut graph: DiGraph<TaskId, ()> = DiGraph::new();
        let mut indices: HashMap<TaskId, NodeIndex> = HashMap::new();
        let mut ordered: Vec<TaskId> = reachable.into_iter().collect();
        ordered.sort();
        for &task in &ordered {
            indices.insert(task, graph.add_node(task));
        }
        for &task in &ordered {
            for dependency in self.dependencies(task) {
                graph.add_edge(indices[&dependency], indices[&task], ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(|index| graph[index]).collect()),
            Err(cycle) => {
                let start = graph[cycle.node_id()];
                Err(ForgeGraphError::CircularDependency {
                    chain: self.describe_cycle(start),
                }
                .into())
            }
        }
    }

    /// The schedule for `targets` grouped into levels; tasks in one level only
    /// depend on tasks in earlier levels.
    pub fn schedule_levels(&self, targets: &[TaskId]) -> Result<Vec<Vec<TaskId>>> {
        let order = self.schedule(targets)?;
        let mut level_of: HashMap<TaskId, usize> = HashMap::new();
        let mut levels: Vec<Vec<TaskId>> = Vec::new();
        for task in order {
            let level = self
                .dependencies(task)
                .filter_map(|dependency| level_of.get(&dependency))
                .map(|level| level + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(task, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(task);
        }
        for level in &mut levels {
            level.sort();
        }
        Ok(levels)
    }

    /// Multi-line description of `id` and its direct dependencies.
    pub fn describe(&self, id: TaskId) -> String {
        let node = self.node(id);
        let dependencies =
            node.dependencies.iter().map(|&dependency| self.name(dependency)).collect::<Vec<_>>();
        let mut description = format!("{} [{}]", node.name, node.action.kind());
        if let Some(output) = &node.output {
            description.push_str(&format!(" -> {}", output.display()));
        }
        if let Some(target) = node.forward {
            description.push_str(&format!(" => {}", self.name(target)));
        }
        if !dependencies.is_empty() {
            description.push_str(&format!("\n    depends on: {}", dependencies.join(", ")));
        }
        description
    }

    fn describe_cycle(&self, start: TaskId) -> String {
        // Depth-first search for a path leading back to `start`.
        let mut stack: Vec<(TaskId, Vec<TaskId>)> = vec![(start, vec![start])];
        let mut seen = IndexSet::new();
        while let Some((current, path)) = stack.pop() {
            for dependency in self.dependencies(current) {
                if dependency == start {
                    let mut names = path.iter().map(|&task| self.name(task)).collect::<Vec<_>>();
                    names.push(self.name(start));
                    return names.join(" → ");
                }
                if seen.insert(dependency) {
                    let mut next = path.clone();
                    next.push(dependency);
                    stack.push((dependency, next));
                }
            }
        }
        self.name(start).to_string()
    }

    fn check(&self, id: TaskId) -> Result<()> {
        if id.0 >= self.nodes.len() {
            bail!("Task handle {id} does not belong to this graph");
        }
        Ok(())
    }
}
