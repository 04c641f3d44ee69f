//! Tree adapters: optional processing spliced around pipeline steps.
//!
//! An adapter registered for a step runs either right before the step (and may
//! replace the step's `{input}`) or right after it (and may replace the step's
//! output). Returning `None` leaves the chain untouched, so a step without
//! adapters behaves exactly like one whose adapters all decline.
//!
//! Adapters compose with [`TreeAdapterExt::and_then`]; closures taking an
//! [`AdapterContext`] are adapters too:
//!
//! ```
//! use forgegraph::runtime::{AdapterContext, AdapterRef, TreeAdapterExt};
//! use forgegraph::task::TaskId;
//!
//! let decline = |_: &mut AdapterContext<'_>| -> anyhow::Result<Option<TaskId>> { Ok(None) };
//! let chained = AdapterRef::new(decline.and_then(decline));
//! assert_eq!(chained, chained.clone());
//! ```

use anyhow::Result;
use indexmap::IndexMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::Arc;

use super::definition::RuntimeDefinition;
use crate::game::GameArtifactTasks;
use crate::task::{Provider, TaskAction, TaskGraph, TaskId, TaskSpec, ToolTemplate};

/// Everything an adapter may read or extend while a pipeline is baked.
pub struct AdapterContext<'a> {
    /// Graph the pipeline is built into
    pub graph: &'a mut TaskGraph,
    /// The definition being baked
    pub definition: &'a RuntimeDefinition,
    /// Name of the step the adapter is attached to
    pub step: &'a str,
    /// Latest handle of the chain
    pub input: TaskId,
    /// Working directory of the definition
    pub working_dir: &'a Path,
    /// Game artifact tasks of the definition
    pub game_artifacts: &'a GameArtifactTasks,
    /// Mapping version data recorded for the definition
    pub mapping_version: &'a IndexMap<String, String>,
    /// Handles wired into the graph without joining the chain
    pub additional_tasks: &'a mut Vec<TaskId>,
}

impl AdapterContext<'_> {
    /// Task name for an adapter task: `<definition><Step><suffix>`.
    pub fn task_name(&self, suffix: &str) -> String {
        format!(
            "{}{}{}",
            self.definition.identifier(),
            crate::game::capitalize(self.step),
            crate::game::capitalize(suffix)
        )
    }
}

/// A function that may splice a task into a pipeline chain.
pub trait TreeAdapter {
    /// Return the new chain head, or `None` to leave the chain unchanged.
    fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>>;
}

impl<F> TreeAdapter for F
where
    F: Fn(&mut AdapterContext<'_>) -> Result<Option<TaskId>>,
{
    fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>> {
        self(context)
    }
}

/// Runs `first`, then `second` on whatever `first` produced.
pub struct AndThen<A, B> {
    first: A,
    second: B,
}

impl<A: TreeAdapter, B: TreeAdapter> TreeAdapter for AndThen<A, B> {
    fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>> {
        let Some(produced) = self.first.adapt(context)? else {
            return self.second.adapt(context);
        };

        let original = context.input;
        context.input = produced;
        let result = self.second.adapt(context);
        context.input = original;
        Ok(result?.or(Some(produced)))
    }
}

/// Composition helpers for every [`TreeAdapter`].
pub trait TreeAdapterExt: TreeAdapter + Sized {
    /// Chain `next` after `self`.
    fn and_then<B: TreeAdapter>(self, next: B) -> AndThen<Self, B> {
        AndThen {
            first: self,
            second: next,
        }
    }
}

impl<T: TreeAdapter> TreeAdapterExt for T {}

/// A shared adapter with identity semantics.
///
/// Two references are equal when they point at the same adapter instance,
/// which is what makes specifications carrying adapters comparable.
#[derive(Clone)]
pub struct AdapterRef(Arc<dyn TreeAdapter>);

impl AdapterRef {
    /// Wrap an adapter.
    pub fn new(adapter: impl TreeAdapter + 'static) -> Self {
        Self(Arc::new(adapter))
    }

    /// Run the adapter.
    pub fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>> {
        self.0.adapt(context)
    }

    fn address(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl TreeAdapter for AdapterRef {
    fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>> {
        self.0.adapt(context)
    }
}

impl PartialEq for AdapterRef {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for AdapterRef {}

impl Hash for AdapterRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.address().hash(state);
    }
}

impl fmt::Debug for AdapterRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdapterRef({:#x})", self.address())
    }
}

/// An adapter running an external tool on the chain head.
///
/// Arguments may use `{input}` (the chain head), `{output}` (this task's
/// output), `{version}` and any game artifact name such as `{clientMappings}`.
#[derive(Debug, Clone)]
pub struct ToolAdapter {
    suffix: String,
    template: ToolTemplate,
    extension: String,
}

impl ToolAdapter {
    /// Register a tool task named after the step and `suffix`.
    pub fn new(suffix: impl Into<String>, template: ToolTemplate) -> Self {
        Self {
            suffix: suffix.into(),
            template,
            extension: "jar".to_string(),
        }
    }

    /// Change the extension of the produced file.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl TreeAdapter for ToolAdapter {
    fn adapt(&self, context: &mut AdapterContext<'_>) -> Result<Option<TaskId>> {
        let name = context.task_name(&self.suffix);
        let output = context
            .working_dir
            .join("adapters")
            .join(&name)
            .join(format!("output.{}", self.extension));
        let input = context.input;
        let version = context.definition.specification().game_version().to_string();
        let game_artifacts = context.game_artifacts;

        let mut resolve = |placeholder: &str| -> Result<Provider<String>> {
            match placeholder {
                "input" => Ok(Provider::output_of(input).into_argument()),
                "output" => Ok(Provider::value(output.display().to_string())),
                "version" => Ok(Provider::value(version.clone())),
                other => match crate::game::GameArtifact::from_name(other)
                    .and_then(|artifact| game_artifacts.get(&artifact))
                {
                    Some(&task) => Ok(Provider::output_of(task).into_argument()),
                    None => anyhow::bail!(
                        "Adapter '{}' on step '{}' uses unknown placeholder '{{{other}}}'",
                        self.suffix,
                        context.step
                    ),
                },
            }
        };
        let invocation = self.template.invocation(&mut resolve)?;

        let task = context.graph.register(
            TaskSpec::new(name, TaskAction::Tool(invocation))
                .with_output(&output)
                .depends_on(input)
                .with_description(format!("Runs {} around step {}", self.template.tool, context.step)),
        )?;
        Ok(Some(task))
    }
}
