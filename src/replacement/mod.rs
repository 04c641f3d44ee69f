//! Dependency replacement.
//!
//! Every dependency added to a configuration is offered to the registered
//! [`ReplacementHandler`]s in registration order. The first handler returning
//! a [`ReplacementResult`] wins, and the dependency is swapped for the result's
//! outputs:
//!
//! 1. the original dependency is removed from the configuration
//! 2. the configuration's `<configuration>DependencyGenerator` task is made to
//!    depend on the replacement's tasks
//! 3. during an IDE import, an entry is written to the synthetic repository,
//!    the configuration depends on its coordinate, and a `Combine` task
//!    copying the real outputs over the placeholders joins the IDE sync tasks.
//!    Replaced children of the result get the same treatment first
//! 4. the configuration always depends on the raw output file, followed by
//!    the result's additional dependencies
//!
//! Dependencies no handler accepts are left untouched.

pub mod deobfuscator;

pub use deobfuscator::DependencyDeobfuscator;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::fmt;
use std::rc::Rc;

use crate::artifact::ArtifactRef;
use crate::core::ForgeGraphError;
use crate::game::capitalize;
use crate::project::{Dependency, Project};
use crate::repository::{EntryBuilder, IvyDummyRepository};
use crate::task::{Provider, TaskAction, TaskId, TaskSpec};

/// What a handler gets to look at.
pub struct ReplacementContext<'a> {
    /// The owning project
    pub project: &'a mut Project,
    /// Configuration the dependency was added to
    pub configuration: &'a str,
    /// The candidate dependency
    pub dependency: &'a ArtifactRef,
}

/// A strategy that may take over a dependency.
pub trait ReplacementHandler {
    /// `Ok(None)` means not interested.
    fn handle(&self, context: &mut ReplacementContext<'_>) -> Result<Option<Rc<ReplacementResult>>>;
}

impl<F> ReplacementHandler for F
where
    F: Fn(&mut ReplacementContext<'_>) -> Result<Option<Rc<ReplacementResult>>>,
{
    fn handle(&self, context: &mut ReplacementContext<'_>) -> Result<Option<Rc<ReplacementResult>>> {
        self(context)
    }
}

/// Adds the replacement's dependency declarations to its synthetic entry.
pub type MetadataConfigurator = Rc<dyn Fn(&mut EntryBuilder) -> Result<()>>;

/// Called with the file dependency that replaced the original one.
pub type CreatedCallback = Rc<dyn Fn(&Dependency)>;

/// A replaced dependency of another replacement.
#[derive(Debug, Clone)]
pub struct NestedReplacement {
    /// The child's original coordinate
    pub original: ArtifactRef,
    /// What replaced it
    pub result: Rc<ReplacementResult>,
}

/// Tasks and metadata produced by an accepting handler.
#[derive(Clone)]
pub struct ReplacementResult {
    task_prefix: String,
    raw: TaskId,
    sources: TaskId,
    additional_dependencies: Vec<Dependency>,
    children: Vec<NestedReplacement>,
    metadata: Option<MetadataConfigurator>,
    on_created: Option<CreatedCallback>,
}

impl ReplacementResult {
    /// A result exposing `raw` and `sources`; tasks it creates are named
    /// after `task_prefix`.
    pub fn new(task_prefix: impl Into<String>, raw: TaskId, sources: TaskId) -> Self {
        Self {
            task_prefix: task_prefix.into(),
            raw,
            sources,
            additional_dependencies: Vec::new(),
            children: Vec::new(),
            metadata: None,
            on_created: None,
        }
    }

    /// Also add `dependency` wherever this result is used.
    #[must_use]
    pub fn with_additional_dependency(mut self, dependency: Dependency) -> Self {
        if !self.additional_dependencies.contains(&dependency) {
            self.additional_dependencies.push(dependency);
        }
        self
    }

    /// Record that `original`, a dependency of this module, was replaced by
    /// `result`. Children get generated and published along with the parent.
    #[must_use]
    pub fn with_child(mut self, original: ArtifactRef, result: Rc<ReplacementResult>) -> Self {
        if !self.children.iter().any(|child| child.original == original) {
            self.children.push(NestedReplacement {
                original,
                result,
            });
        }
        self
    }

    /// Describe the synthetic entry's dependencies through `configurator`.
    #[must_use]
    pub fn with_metadata(mut self, configurator: impl Fn(&mut EntryBuilder) -> Result<()> + 'static) -> Self {
        self.metadata = Some(Rc::new(configurator));
        self
    }

    /// Run `callback` once the replacement is in place.
    #[must_use]
    pub fn on_created(mut self, callback: impl Fn(&Dependency) + 'static) -> Self {
        self.on_created = Some(Rc::new(callback));
        self
    }

    /// Prefix of task names derived from this result.
    pub fn task_prefix(&self) -> &str {
        &self.task_prefix
    }

    /// Task producing the raw jar.
    pub fn raw(&self) -> TaskId {
        self.raw
    }

    /// Task producing the sources jar.
    pub fn sources(&self) -> TaskId {
        self.sources
    }

    /// Dependencies added next to the raw output.
    pub fn additional_dependencies(&self) -> &[Dependency] {
        &self.additional_dependencies
    }

    /// Replaced dependencies of this module, in resolution order.
    pub fn children(&self) -> &[NestedReplacement] {
        &self.children
    }

    /// Apply the metadata configurator, if any.
    pub fn configure_metadata(&self, builder: &mut EntryBuilder) -> Result<()> {
        match &self.metadata {
            Some(configurator) => configurator(builder),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ReplacementResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplacementResult")
            .field("task_prefix", &self.task_prefix)
            .field("raw", &self.raw)
            .field("sources", &self.sources)
            .field("additional_dependencies", &self.additional_dependencies)
            .field("children", &self.children.iter().map(|child| &child.original).collect::<Vec<_>>())
            .field("metadata", &self.metadata.is_some())
            .finish_non_exhaustive()
    }
}

/// A dependency that was swapped out.
#[derive(Debug, Clone)]
pub struct Replacement {
    /// Name of the handler that accepted it
    pub handler: String,
    /// The original coordinate
    pub original: ArtifactRef,
    /// What replaced it
    pub result: Rc<ReplacementResult>,
}

/// The ordered handler registry.
pub struct DependencyReplacement {
    handlers: IndexMap<String, Rc<dyn ReplacementHandler>>,
    generators: IndexMap<String, TaskId>,
    replacements: IndexMap<String, Vec<Replacement>>,
    repository: IvyDummyRepository,
}

impl DependencyReplacement {
    /// A registry publishing IDE entries into `repository`.
    pub fn new(repository: IvyDummyRepository) -> Self {
        Self {
            handlers: IndexMap::new(),
            generators: IndexMap::new(),
            replacements: IndexMap::new(),
            repository,
        }
    }

    /// Append a handler. Names must be unique.
    pub fn register_handler(&mut self, name: impl Into<String>, handler: Rc<dyn ReplacementHandler>) -> Result<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(ForgeGraphError::DuplicateHandler {
                name,
            }
            .into());
        }
        tracing::debug!("Registered replacement handler '{name}'");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Handler names in consultation order.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// The synthetic repository.
    pub fn repository(&self) -> &IvyDummyRepository {
        &self.repository
    }

    /// Replacements performed in `configuration`, in order.
    pub fn replacements(&self, configuration: &str) -> &[Replacement] {
        self.replacements.get(configuration).map(Vec::as_slice).unwrap_or_default()
    }

    /// The generator task of `configuration`, once something was replaced there.
    pub fn generator(&self, configuration: &str) -> Option<TaskId> {
        self.generators.get(configuration).copied()
    }

    /// Add `dependency` to `configuration` and offer it to the handlers.
    pub fn add_dependency(&mut self, project: &mut Project, configuration: &str, dependency: Dependency) -> Result<()> {
        project.configuration_mut(configuration).add(dependency.clone());
        self.on_dependency_added(project, configuration, &dependency)?;
        Ok(())
    }

    /// Offer a freshly added dependency to the handlers.
    pub fn on_dependency_added(
        &mut self,
        project: &mut Project,
        configuration: &str,
        dependency: &Dependency,
    ) -> Result<Option<Rc<ReplacementResult>>> {
        let Some(module) = dependency.as_module() else {
            return Ok(None);
        };

        let handlers: Vec<(String, Rc<dyn ReplacementHandler>)> =
            self.handlers.iter().map(|(name, handler)| (name.clone(), Rc::clone(handler))).collect();
        for (name, handler) in handlers {
            let mut context = ReplacementContext {
                project: &mut *project,
                configuration,
                dependency: module,
            };
            let Some(result) = handler
                .handle(&mut context)
                .with_context(|| format!("Replacement handler '{name}' failed on {module} in '{configuration}'"))?
            else {
                continue;
            };

            tracing::debug!("Handler '{name}' replaces {module} in '{configuration}'");
            self.apply(project, configuration, dependency, module, &result)?;
            self.replacements.entry(configuration.to_string()).or_default().push(Replacement {
                handler: name,
                original: module.clone(),
                result: Rc::clone(&result),
            });
            return Ok(Some(result));
        }

        tracing::trace!("No handler wants {module} in '{configuration}'");
        Ok(None)
    }

    fn apply(
        &mut self,
        project: &mut Project,
        configuration: &str,
        dependency: &Dependency,
        module: &ArtifactRef,
        result: &ReplacementResult,
    ) -> Result<()> {
        project.configuration_mut(configuration).remove(dependency);
        let generator = self.generator_task(project, configuration)?;
        depend_on_outputs(project, generator, result)?;

        if project.is_ide_import() {
            let entry = self.publish(project, generator, module, result)?;
            project.configuration_mut(configuration).add(Dependency::Module(entry));
        }

        let replaced = Dependency::TaskOutput(result.raw());
        let target = project.configuration_mut(configuration);
        target.add(replaced.clone());
        for additional in result.additional_dependencies() {
            target.add(additional.clone());
        }

        if let Some(callback) = &result.on_created {
            callback(&replaced);
        }
        Ok(())
    }

    /// Write the synthetic entry of `result` and its replaced children,
    /// children first, each with a `Combine` task the generator and the IDE
    /// sync depend on. Returns the coordinate of the entry for `module`.
    fn publish(
        &mut self,
        project: &mut Project,
        generator: TaskId,
        module: &ArtifactRef,
        result: &ReplacementResult,
    ) -> Result<ArtifactRef> {
        for child in result.children() {
            self.publish(project, generator, &child.original, &child.result)
                .with_context(|| format!("Failed to publish {}, a dependency of {module}", child.original))?;
        }

        let mut builder = EntryBuilder::default();
        builder.from_reference(module);
        result.configure_metadata(&mut builder)?;
        let entry = self.repository.add(builder.build()?)?;

        let name = format!("combine{}", capitalize(result.task_prefix()));
        let combine = match project.graph.find(&name) {
            Some(existing) => existing,
            None => {
                let root = self.repository.root();
                let raw_target = entry.artifact_path(root);
                project.graph.register(
                    TaskSpec::new(
                        name,
                        TaskAction::Combine {
                            raw: Provider::output_of(result.raw()),
                            sources: Provider::output_of(result.sources()),
                            raw_target: raw_target.clone(),
                            sources_target: entry.as_sources().artifact_path(root),
                        },
                    )
                    .with_output(raw_target)
                    .with_description(format!("Publishes the replacement of {module} for the IDE")),
                )?
            }
        };
        project.graph.depends_on(generator, combine)?;
        project.add_ide_sync_task(combine);
        Ok(entry.reference())
    }

    fn generator_task(&mut self, project: &mut Project, configuration: &str) -> Result<TaskId> {
        if let Some(&task) = self.generators.get(configuration) {
            return Ok(task);
        }
        let task = project.graph.register(
            TaskSpec::new(format!("{configuration}DependencyGenerator"), TaskAction::Lifecycle)
                .with_description(format!("Generates every replaced dependency of '{configuration}'")),
        )?;
        self.generators.insert(configuration.to_string(), task);
        Ok(task)
    }
}

/// Make `generator` build the raw and sources outputs of `result` and of
/// every replaced child below it.
fn depend_on_outputs(project: &mut Project, generator: TaskId, result: &ReplacementResult) -> Result<()> {
    project.graph.depends_on(generator, result.raw())?;
    project.graph.depends_on(generator, result.sources())?;
    for child in result.children() {
        depend_on_outputs(project, generator, &child.result)?;
    }
    Ok(())
}

impl fmt::Debug for DependencyReplacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyReplacement")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("generators", &self.generators)
            .field("repository", &self.repository.root())
            .finish_non_exhaustive()
    }
}
