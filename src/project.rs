//! The host build model.
//!
//! A [`Project`] stands in for the build tool's project object: it owns the
//! [`TaskGraph`], the named [`Configuration`]s with their dependencies, the
//! declared repositories and the directories everything is generated into.
//! It is created once per configuration run and passed explicitly to every
//! component that needs it.

use indexmap::{IndexMap, IndexSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactRef;
use crate::task::{TaskGraph, TaskId};

/// A dependency declared in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Dependency {
    /// An externally addressable module coordinate
    Module(ArtifactRef),
    /// The output file of a task
    TaskOutput(TaskId),
    /// Another project of the same build
    Project(String),
}

impl Dependency {
    /// The coordinate if this is an external module dependency.
    pub fn as_module(&self) -> Option<&ArtifactRef> {
        match self {
            Self::Module(reference) => Some(reference),
            _ => None,
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Module(reference) => write!(f, "{reference}"),
            Self::TaskOutput(task) => write!(f, "task output {task}"),
            Self::Project(path) => write!(f, "project {path}"),
        }
    }
}

/// A named, ordered bucket of dependencies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    name: String,
    dependencies: Vec<Dependency>,
}

impl Configuration {
    /// Empty configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
        }
    }

    /// Configuration name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared dependencies in insertion order.
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Append a dependency unless it is already present.
    pub fn add(&mut self, dependency: Dependency) {
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }

    /// Remove a dependency, returning whether it was present.
    pub fn remove(&mut self, dependency: &Dependency) -> bool {
        let before = self.dependencies.len();
        self.dependencies.retain(|existing| existing != dependency);
        before != self.dependencies.len()
    }

    /// Whether `dependency` is declared.
    pub fn contains(&self, dependency: &Dependency) -> bool {
        self.dependencies.contains(dependency)
    }
}

/// A file-system Ivy repository declared to the dependency resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IvyRepositoryDeclaration {
    /// Repository name
    pub name: String,
    /// Root directory
    pub root: PathBuf,
    /// Pattern locating artifacts relative to the root
    pub artifact_pattern: String,
    /// Pattern locating descriptors relative to the root
    pub ivy_pattern: String,
    /// Whether `[organisation]` dots map to directories
    pub m2_compatible: bool,
}

/// The explicit build context.
#[derive(Debug)]
pub struct Project {
    name: String,
    project_dir: PathBuf,
    build_dir: PathBuf,
    ide_import: bool,
    /// Task graph of the build
    pub graph: TaskGraph,
    configurations: IndexMap<String, Configuration>,
    repositories: Vec<IvyRepositoryDeclaration>,
    ide_sync_tasks: IndexSet<TaskId>,
}

impl Project {
    /// A project rooted at `project_dir` building into `project_dir/build`.
    pub fn new(name: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        let project_dir = project_dir.into();
        Self {
            name: name.into(),
            build_dir: project_dir.join("build"),
            project_dir,
            ide_import: false,
            graph: TaskGraph::new(),
            configurations: IndexMap::new(),
            repositories: Vec::new(),
            ide_sync_tasks: IndexSet::new(),
        }
    }

    /// Use a different build directory, relative to the project directory.
    #[must_use]
    pub fn with_build_dir(mut self, build_dir: impl Into<PathBuf>) -> Self {
        let build_dir = build_dir.into();
        self.build_dir = if build_dir.is_relative() {
            self.project_dir.join(build_dir)
        } else {
            build_dir
        };
        self
    }

    /// Mark the run as an IDE import.
    #[must_use]
    pub fn with_ide_import(mut self, ide_import: bool) -> Self {
        self.ide_import = ide_import;
        self
    }

    /// Project name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Project directory.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// Build output directory.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// Whether an IDE import is in progress.
    pub fn is_ide_import(&self) -> bool {
        self.ide_import
    }

    /// The configuration named `name`, if it exists.
    pub fn configuration(&self, name: &str) -> Option<&Configuration> {
        self.configurations.get(name)
    }

    /// The configuration named `name`, created on first use.
    pub fn configuration_mut(&mut self, name: &str) -> &mut Configuration {
        self.configurations.entry(name.to_string()).or_insert_with(|| Configuration::new(name))
    }

    /// All configurations in creation order.
    pub fn configurations(&self) -> impl Iterator<Item = &Configuration> {
        self.configurations.values()
    }

    /// Declare an Ivy repository unless one with the same name exists.
    pub fn add_repository(&mut self, repository: IvyRepositoryDeclaration) {
        if !self.repositories.iter().any(|existing| existing.name == repository.name) {
            self.repositories.push(repository);
        }
    }

    /// Declared repositories.
    pub fn repositories(&self) -> &[IvyRepositoryDeclaration] {
        &self.repositories
    }

    /// Schedule `task` to run as part of IDE synchronisation.
    pub fn add_ide_sync_task(&mut self, task: TaskId) {
        self.ide_sync_tasks.insert(task);
    }

    /// Tasks run during IDE synchronisation.
    pub fn ide_sync_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.ide_sync_tasks.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_add_is_idempotent() {
        let mut configuration = Configuration::new("implementation");
        let dependency = Dependency::Module(ArtifactRef::new("a", "b", "1"));
        configuration.add(dependency.clone());
        configuration.add(dependency.clone());
        assert_eq!(configuration.dependencies().len(), 1);
        assert!(configuration.remove(&dependency));
        assert!(!configuration.remove(&dependency));
    }

    #[test]
    fn test_configuration_created_on_demand() {
        let mut project = Project::new("demo", "/tmp/demo");
        assert!(project.configuration("compileOnly").is_none());
        project.configuration_mut("compileOnly").add(Dependency::Project(":api".to_string()));
        assert_eq!(project.configuration("compileOnly").unwrap().dependencies().len(), 1);
        assert_eq!(project.build_dir(), Path::new("/tmp/demo/build"));
        let project = Project::new("demo", "/tmp/demo").with_build_dir("out");
        assert_eq!(project.build_dir(), Path::new("/tmp/demo/out"));
    }

    #[test]
    fn test_repository_declared_once() {
        let mut project = Project::new("demo", "/tmp/demo");
        let repository = IvyRepositoryDeclaration {
            name: "dummy".to_string(),
            root: PathBuf::from("/tmp/demo/build/libs"),
            artifact_pattern: "[module]".to_string(),
            ivy_pattern: "ivy.xml".to_string(),
            m2_compatible: false,
        };
        project.add_repository(repository.clone());
        project.add_repository(repository);
        assert_eq!(project.repositories().len(), 1);
    }
}
