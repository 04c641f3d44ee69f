//! The realized pipeline of a runtime specification.

use indexmap::IndexMap;
use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use super::config::RuntimeConfig;
use super::specification::RuntimeSpecification;
use crate::artifact::ArtifactRef;
use crate::game::GameArtifactTasks;
use crate::task::TaskId;

/// Result of baking a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BakedPipeline {
    /// Step name to chain handle, in declared order
    pub steps: IndexMap<String, TaskId>,
    /// Handles registered by adapters outside the chain
    pub additional_tasks: Vec<TaskId>,
    /// Real task behind the raw jar placeholder
    pub raw: TaskId,
    /// Real task behind the sources jar placeholder
    pub sources: TaskId,
}

/// A runtime definition.
///
/// Created by [`RuntimeExtension::register_or_get`](super::RuntimeExtension::register_or_get)
/// with its two output placeholders already registered. The step map and the
/// mapping version data are filled exactly once, when the definition is baked.
#[derive(Debug)]
pub struct RuntimeDefinition {
    specification: RuntimeSpecification,
    config: RuntimeConfig,
    working_dir: PathBuf,
    unpacked_dir: PathBuf,
    game_artifacts: GameArtifactTasks,
    minecraft_dependencies: Vec<ArtifactRef>,
    raw_jar: TaskId,
    sources_jar: TaskId,
    mapping_version: OnceCell<IndexMap<String, String>>,
    baked: OnceCell<BakedPipeline>,
}

impl RuntimeDefinition {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        specification: RuntimeSpecification,
        config: RuntimeConfig,
        working_dir: PathBuf,
        unpacked_dir: PathBuf,
        game_artifacts: GameArtifactTasks,
        minecraft_dependencies: Vec<ArtifactRef>,
        raw_jar: TaskId,
        sources_jar: TaskId,
    ) -> Self {
        Self {
            specification,
            config,
            working_dir,
            unpacked_dir,
            game_artifacts,
            minecraft_dependencies,
            raw_jar,
            sources_jar,
            mapping_version: OnceCell::new(),
            baked: OnceCell::new(),
        }
    }

    /// The specification this definition realizes.
    pub fn specification(&self) -> &RuntimeSpecification {
        &self.specification
    }

    /// Shorthand for the specification identifier.
    pub fn identifier(&self) -> &str {
        self.specification.identifier()
    }

    /// Parsed step manifest.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Directory all tasks of this runtime write into.
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Directory the runtime archive was extracted to.
    pub fn unpacked_dir(&self) -> &Path {
        &self.unpacked_dir
    }

    /// Game artifact tasks of this runtime.
    pub fn game_artifacts(&self) -> &GameArtifactTasks {
        &self.game_artifacts
    }

    /// Libraries the game needs, from the manifest's library list.
    pub fn minecraft_dependencies(&self) -> &[ArtifactRef] {
        &self.minecraft_dependencies
    }

    /// Stable handle to the raw jar, valid before baking.
    pub fn raw_jar(&self) -> TaskId {
        self.raw_jar
    }

    /// Stable handle to the sources jar, valid before baking.
    pub fn sources_jar(&self) -> TaskId {
        self.sources_jar
    }

    /// Mapping version data, present once baked.
    pub fn mapping_version(&self) -> Option<&IndexMap<String, String>> {
        self.mapping_version.get()
    }

    /// Baked step map, present once baked.
    pub fn baked(&self) -> Option<&BakedPipeline> {
        self.baked.get()
    }

    /// Whether the pipeline has been baked.
    pub fn is_baked(&self) -> bool {
        self.baked.get().is_some()
    }

    /// Handle of step `name`, present once baked.
    pub fn step(&self, name: &str) -> Option<TaskId> {
        self.baked.get().and_then(|baked| baked.steps.get(name).copied())
    }

    pub(crate) fn record_mapping_version(&self, data: IndexMap<String, String>) -> &IndexMap<String, String> {
        self.mapping_version.get_or_init(|| data)
    }

    pub(crate) fn record_baked(&self, pipeline: BakedPipeline) -> &BakedPipeline {
        self.baked.get_or_init(|| pipeline)
    }
}
