//! The build orchestrator.
//!
//! [`Build`] owns everything one configuration run needs: the [`Project`], the
//! runtime extension, the replacement registry with its synthetic repository
//! and the deobfuscator. Configuration happens in two explicit phases:
//!
//! 1. runtimes are registered and dependencies are added; replaced
//!    dependencies immediately point at placeholder tasks
//! 2. [`Build::finalize_configuration`] bakes every runtime and then wires
//!    the deferred deobfuscation tasks onto the placeholders
//!
//! Finalizing twice is a no-op.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::config::ForgeGraphConfig;
use crate::core::ForgeGraphError;
use crate::mappings::{MappingChannel, ToolMappingChannel};
use crate::project::{Dependency, Project};
use crate::replacement::{DependencyDeobfuscator, DependencyReplacement, ReplacementHandler};
use crate::repository::IvyDummyRepository;
use crate::resolution::{DependencyResolver, MavenLayoutRepository, ToolResolver};
use crate::runtime::{RuntimeDefinition, RuntimeExtension, RuntimeSpecificationBuilder};

/// Name the deobfuscator is registered under.
pub const DEOBFUSCATOR_HANDLER: &str = "deobfuscator";

/// One configuration run.
pub struct Build {
    project: Project,
    runtimes: RuntimeExtension,
    replacement: DependencyReplacement,
    deobfuscator: Rc<DependencyDeobfuscator>,
    channel: Box<dyn MappingChannel>,
    mapping_overrides: IndexMap<String, String>,
    finalized: bool,
}

impl Build {
    /// Wire up a build for `project`.
    ///
    /// The synthetic repository is declared to the project and the
    /// deobfuscator is registered as the first replacement handler.
    pub fn new(
        mut project: Project,
        tools: Arc<dyn ToolResolver>,
        deobfuscator: DependencyDeobfuscator,
        channel: Box<dyn MappingChannel>,
    ) -> Result<Self> {
        let repository = IvyDummyRepository::for_project(&project);
        repository.register(&mut project);

        let deobfuscator = Rc::new(deobfuscator);
        let mut replacement = DependencyReplacement::new(repository);
        let handler: Rc<dyn ReplacementHandler> = deobfuscator.clone();
        replacement.register_handler(DEOBFUSCATOR_HANDLER, handler)?;

        Ok(Self {
            project,
            runtimes: RuntimeExtension::new(tools),
            replacement,
            deobfuscator,
            channel,
            mapping_overrides: IndexMap::new(),
            finalized: false,
        })
    }

    /// Build everything `config` describes, without finalizing.
    pub fn from_config(name: &str, config: &ForgeGraphConfig) -> Result<Self> {
        let project = Project::new(name, std::env::current_dir().context("Failed to read the working directory")?)
            .with_build_dir(&config.build_dir)
            .with_ide_import(config.ide_import);
        let repository = MavenLayoutRepository::new([config.tools_dir.clone()]);
        let resolver: Rc<dyn DependencyResolver> = Rc::new(repository.clone());

        let mut deobfuscator = DependencyDeobfuscator::new(resolver).with_force(config.deobfuscation.force);
        if let Some(decompiler) = &config.deobfuscation.decompiler {
            deobfuscator = deobfuscator.with_decompiler(decompiler.clone());
        }
        let channel: ToolMappingChannel = config.mappings.channel();

        let mut build = Self::new(project, Arc::new(repository), deobfuscator, Box::new(channel))?
            .with_mapping_overrides(config.mappings.version.clone());

        if let Some(runtime) = &config.runtime {
            build.register_runtime(|builder| {
                builder.source(runtime.source.clone()).side(runtime.side).raw_step(runtime.raw_step.clone());
                if let Some(name) = &runtime.name {
                    builder.name(name.clone());
                }
                if let Some(version) = &runtime.game_version {
                    builder.game_version(version.clone());
                }
                for file in &runtime.additional_dependencies {
                    builder.with_additional_dependency(file.clone());
                }
            })?;
        }
        for declaration in &config.dependencies {
            build.add_dependency(&declaration.configuration, Dependency::Module(declaration.notation.clone()))?;
        }
        Ok(build)
    }

    /// Extra mapping version data applied on top of the runtime's.
    #[must_use]
    pub fn with_mapping_overrides(mut self, overrides: IndexMap<String, String>) -> Self {
        self.mapping_overrides = overrides;
        self
    }

    /// The project.
    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The project, mutably.
    pub fn project_mut(&mut self) -> &mut Project {
        &mut self.project
    }

    /// The runtime extension.
    pub fn runtimes(&self) -> &RuntimeExtension {
        &self.runtimes
    }

    /// The runtime extension, mutably.
    pub fn runtimes_mut(&mut self) -> &mut RuntimeExtension {
        &mut self.runtimes
    }

    /// The replacement registry.
    pub fn replacement(&self) -> &DependencyReplacement {
        &self.replacement
    }

    /// The replacement registry, mutably, e.g. to register more handlers.
    pub fn replacement_mut(&mut self) -> &mut DependencyReplacement {
        &mut self.replacement
    }

    /// The deobfuscator.
    pub fn deobfuscator(&self) -> &DependencyDeobfuscator {
        &self.deobfuscator
    }

    /// Whether [`finalize_configuration`](Self::finalize_configuration) ran.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Register (or look up) a runtime.
    pub fn register_runtime<F>(&mut self, configure: F) -> Result<Rc<RuntimeDefinition>>
    where
        F: FnOnce(&mut RuntimeSpecificationBuilder),
    {
        self.runtimes.register_or_get(&mut self.project, configure)
    }

    /// Add a dependency, offering it to the replacement handlers.
    pub fn add_dependency(&mut self, configuration: &str, dependency: Dependency) -> Result<()> {
        if self.finalized {
            return Err(ForgeGraphError::ConfigError {
                message: format!("Cannot add {dependency} to '{configuration}' after the configuration was finalized"),
            }
            .into());
        }
        self.replacement.add_dependency(&mut self.project, configuration, dependency)
    }

    /// Bake every runtime, then wire the deferred deobfuscation tasks.
    pub fn finalize_configuration(&mut self) -> Result<()> {
        if self.finalized {
            tracing::debug!("Configuration already finalized");
            return Ok(());
        }

        self.runtimes.bake_all(&mut self.project)?;
        if self.deobfuscator.pending_count() > 0 {
            let Some(runtime) = self.runtimes.definitions().next().cloned() else {
                return Err(ForgeGraphError::ConfigError {
                    message: format!(
                        "{} dependencies need deobfuscation but no runtime provides mappings",
                        self.deobfuscator.pending_count()
                    ),
                }
                .into());
            };
            self.deobfuscator
                .finalize(&mut self.project, &runtime, self.channel.as_ref(), &self.mapping_overrides)
                .with_context(|| format!("Failed to wire deobfuscation with runtime '{}'", runtime.identifier()))?;
        }

        self.finalized = true;
        tracing::info!("Configuration finalized ({} tasks)", self.project.graph.len());
        Ok(())
    }
}

impl std::fmt::Debug for Build {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Build")
            .field("project", &self.project.name())
            .field("runtimes", &self.runtimes)
            .field("replacement", &self.replacement)
            .field("channel", &self.channel.name())
            .field("finalized", &self.finalized)
            .finish_non_exhaustive()
    }
}
