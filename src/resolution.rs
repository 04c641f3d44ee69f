//! Dependency and tool resolution collaborators.
//!
//! Resolving coordinates to files (downloading, checksum verification, reading
//! published metadata) happens outside forgegraph. The pipeline consumes two
//! narrow interfaces instead:
//!
//! - [`ToolResolver`] turns a tool or library coordinate into a local file
//! - [`DependencyResolver`] performs a detached resolution of a dependency into
//!   its first-level modules, their artifact files and their children
//!
//! [`MavenLayoutRepository`] implements both over local directories laid out
//! as Maven repositories. It knows nothing about transitive metadata, so the
//! modules it resolves never have children.

use anyhow::{Result, bail};
use std::path::PathBuf;

use crate::artifact::ArtifactRef;

/// Turns coordinates of executable tools and libraries into local files.
pub trait ToolResolver: Send + Sync {
    /// Local file for `tool`.
    fn resolve_tool(&self, tool: &ArtifactRef) -> Result<PathBuf>;
}

/// An artifact file of a resolved module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    /// Full coordinate including classifier and extension
    pub reference: ArtifactRef,
    /// Local file
    pub file: PathBuf,
}

/// A module produced by a detached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModule {
    /// Module coordinate
    pub reference: ArtifactRef,
    /// Files published by the module
    pub artifacts: Vec<ResolvedArtifact>,
    /// Transitive dependencies of the module
    pub children: Vec<ResolvedModule>,
}

impl ResolvedModule {
    /// A module with a single artifact and no children.
    pub fn single(reference: ArtifactRef, file: impl Into<PathBuf>) -> Self {
        Self {
            artifacts: vec![ResolvedArtifact {
                reference: reference.clone(),
                file: file.into(),
            }],
            reference,
            children: Vec::new(),
        }
    }

    /// Add a child module.
    #[must_use]
    pub fn with_child(mut self, child: ResolvedModule) -> Self {
        self.children.push(child);
        self
    }
}

/// Detached resolution of dependencies.
pub trait DependencyResolver {
    /// Resolve `dependency` on its own, returning its first-level modules.
    fn resolve(&self, dependency: &ArtifactRef) -> Result<Vec<ResolvedModule>>;

    /// The sources jar published for `module`, if any.
    fn resolve_sources(&self, module: &ArtifactRef) -> Result<Option<PathBuf>>;
}

/// Local directories with a Maven repository layout.
#[derive(Debug, Clone, Default)]
pub struct MavenLayoutRepository {
    roots: Vec<PathBuf>,
}

impl MavenLayoutRepository {
    /// Repository searching `roots` in order.
    pub fn new(roots: impl IntoIterator<Item = PathBuf>) -> Self {
        Self {
            roots: roots.into_iter().collect(),
        }
    }

    /// First existing file for `reference`.
    pub fn locate(&self, reference: &ArtifactRef) -> Option<PathBuf> {
        let relative = reference.repository_path();
        self.roots.iter().map(|root| root.join(&relative)).find(|candidate| candidate.is_file())
    }
}

impl ToolResolver for MavenLayoutRepository {
    fn resolve_tool(&self, tool: &ArtifactRef) -> Result<PathBuf> {
        match self.locate(tool) {
            Some(file) => Ok(file),
            None => bail!(
                "Could not find {tool} in {} (expected {})",
                self.roots.iter().map(|root| root.display().to_string()).collect::<Vec<_>>().join(", "),
                tool.repository_path().display()
            ),
        }
    }
}

impl DependencyResolver for MavenLayoutRepository {
    fn resolve(&self, dependency: &ArtifactRef) -> Result<Vec<ResolvedModule>> {
        Ok(self
            .locate(dependency)
            .map(|file| ResolvedModule::single(dependency.clone(), file))
            .into_iter()
            .collect())
    }

    fn resolve_sources(&self, module: &ArtifactRef) -> Result<Option<PathBuf>> {
        let sources = module.clone().with_classifier("sources").with_extension("jar");
        Ok(self.locate(&sources))
    }
}
