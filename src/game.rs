//! Game artifacts and the cache that provides them.
//!
//! Every runtime starts from a handful of files published for a game version:
//! the launcher and version manifests, the client and server jars and their
//! official mappings. Downloading and verifying them is the job of a
//! [`GameArtifactCache`]; the pipeline only registers one task per artifact and
//! lets the executor ask the cache to materialise it.

use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::task::{TaskAction, TaskGraph, TaskId, TaskSpec};
use crate::utils::atomic_copy;

/// A file published for a game version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GameArtifact {
    /// The launcher's global version manifest
    LauncherManifest,
    /// The per-version metadata JSON
    VersionManifest,
    /// The obfuscated client jar
    ClientJar,
    /// The obfuscated dedicated server jar
    ServerJar,
    /// Official client mappings
    ClientMappings,
    /// Official server mappings
    ServerMappings,
}

impl GameArtifact {
    /// Every artifact, in registration order.
    pub const ALL: [Self; 6] = [
        Self::LauncherManifest,
        Self::VersionManifest,
        Self::ClientJar,
        Self::ServerJar,
        Self::ClientMappings,
        Self::ServerMappings,
    ];

    /// Name used in placeholders and task names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LauncherManifest => "launcherManifest",
            Self::VersionManifest => "versionManifest",
            Self::ClientJar => "client",
            Self::ServerJar => "server",
            Self::ClientMappings => "clientMappings",
            Self::ServerMappings => "serverMappings",
        }
    }

    /// File name inside a version directory of the cache.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::LauncherManifest => "launcher_manifest.json",
            Self::VersionManifest => "version.json",
            Self::ClientJar => "client.jar",
            Self::ServerJar => "server.jar",
            Self::ClientMappings => "client_mappings.txt",
            Self::ServerMappings => "server_mappings.txt",
        }
    }

    /// The manifest step type that aliases this artifact.
    pub const fn step_type(self) -> &'static str {
        match self {
            Self::LauncherManifest => "downloadManifest",
            Self::VersionManifest => "downloadJson",
            Self::ClientJar => "downloadClient",
            Self::ServerJar => "downloadServer",
            Self::ClientMappings => "downloadClientMappings",
            Self::ServerMappings => "downloadServerMappings",
        }
    }

    /// Reverse of [`GameArtifact::step_type`].
    pub fn from_step_type(step_type: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|artifact| artifact.step_type() == step_type)
    }

    /// Look an artifact up by [`GameArtifact::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|artifact| artifact.name() == name)
    }
}

impl fmt::Display for GameArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Task handles for the game artifacts of one runtime.
pub type GameArtifactTasks = IndexMap<GameArtifact, TaskId>;

/// Supplies game artifacts for a version.
pub trait GameArtifactCache: Send + Sync {
    /// Place `artifact` for `version` at `destination`.
    fn fetch(&self, version: &str, artifact: GameArtifact, destination: &Path) -> Result<()>;
}

/// A cache reading pre-populated files from `<root>/versions/<version>/<file>`.
#[derive(Debug, Clone)]
pub struct DirectoryGameCache {
    root: PathBuf,
}

impl DirectoryGameCache {
    /// Cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    /// Where `artifact` for `version` is expected.
    pub fn location(&self, version: &str, artifact: GameArtifact) -> PathBuf {
        self.root.join("versions").join(version).join(artifact.file_name())
    }
}

impl GameArtifactCache for DirectoryGameCache {
    fn fetch(&self, version: &str, artifact: GameArtifact, destination: &Path) -> Result<()> {
        let source = self.location(version, artifact);
        if !source.is_file() {
            bail!(
                "Game artifact {artifact} for {version} is not cached at {}",
                source.display()
            );
        }
        atomic_copy(&source, destination)
            .with_context(|| format!("Failed to provide {artifact} for {version}"))
    }
}

/// Register one task per game artifact under `prefix`.
///
/// Tasks are registered for every artifact regardless of side; only the ones a
/// pipeline actually reaches are ever executed.
pub fn register_game_artifact_tasks(
    graph: &mut TaskGraph,
    prefix: &str,
    version: &str,
    working_dir: &Path,
) -> Result<GameArtifactTasks> {
    let mut tasks = GameArtifactTasks::new();
    for artifact in GameArtifact::ALL {
        let name = format!("{prefix}{}", capitalize(artifact.step_type()));
        let id = graph.register(
            TaskSpec::new(
                name,
                TaskAction::GameArtifact {
                    version: version.to_string(),
                    artifact,
                },
            )
            .with_output(working_dir.join("game").join(artifact.file_name())),
        )?;
        tasks.insert(artifact, id);
    }
    Ok(tasks)
}

pub(crate) fn capitalize(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
