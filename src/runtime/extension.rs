//! Creation, memoization and baking of runtime definitions.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::rc::Rc;
use std::sync::Arc;

use super::bake::bake;
use super::config::unpack_runtime;
use super::definition::{BakedPipeline, RuntimeDefinition};
use super::specification::{RuntimeSpecification, RuntimeSpecificationBuilder};
use super::steps::StepRegistry;
use crate::core::ForgeGraphError;
use crate::game::register_game_artifact_tasks;
use crate::project::Project;
use crate::resolution::ToolResolver;

/// Owns every runtime definition of a configuration run.
pub struct RuntimeExtension {
    tools: Arc<dyn ToolResolver>,
    registry: StepRegistry,
    definitions: IndexMap<String, Rc<RuntimeDefinition>>,
}

impl RuntimeExtension {
    /// An extension resolving runtime archives through `tools`.
    pub fn new(tools: Arc<dyn ToolResolver>) -> Self {
        Self {
            tools,
            registry: StepRegistry::with_builtins(),
            definitions: IndexMap::new(),
        }
    }

    /// Use a different step registry.
    #[must_use]
    pub fn with_registry(mut self, registry: StepRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// The step registry shared by every definition.
    pub fn registry_mut(&mut self) -> &mut StepRegistry {
        &mut self.registry
    }

    /// Return the definition for the configured specification, creating it
    /// on first request.
    ///
    /// Equal specifications always yield the same instance. Reusing an
    /// identifier with a different specification fails with
    /// [`ForgeGraphError::SpecificationConflict`].
    pub fn register_or_get<F>(&mut self, project: &mut Project, configure: F) -> Result<Rc<RuntimeDefinition>>
    where
        F: FnOnce(&mut RuntimeSpecificationBuilder),
    {
        let mut builder = RuntimeSpecification::builder();
        configure(&mut builder);
        let specification = builder.build()?;

        if let Some(existing) = self.definitions.get(specification.identifier()) {
            if existing.specification() != &specification {
                return Err(ForgeGraphError::SpecificationConflict {
                    identifier: specification.identifier().to_string(),
                }
                .into());
            }
            tracing::debug!("Reusing runtime '{}'", specification.identifier());
            return Ok(Rc::clone(existing));
        }

        let definition = Rc::new(self.create(project, specification)?);
        self.definitions.insert(definition.identifier().to_string(), Rc::clone(&definition));
        Ok(definition)
    }

    fn create(&self, project: &mut Project, specification: RuntimeSpecification) -> Result<RuntimeDefinition> {
        let identifier = specification.identifier().to_string();
        let archive = self
            .tools
            .resolve_tool(specification.source())
            .with_context(|| format!("Failed to resolve the source archive of runtime '{identifier}'"))?;

        let working_dir = project.build_dir().join("runtimes").join(&identifier);
        let unpacked_dir = working_dir.join("unpacked");
        let config = unpack_runtime(&archive, &unpacked_dir)
            .with_context(|| format!("Failed to read the manifest of runtime '{identifier}'"))?;
        config
            .verify_data(&unpacked_dir, specification.side())
            .with_context(|| format!("Runtime '{identifier}' is missing declared data"))?;
        if config.version != specification.game_version() {
            tracing::warn!(
                "Runtime '{identifier}' targets {} but its manifest declares {}",
                specification.game_version(),
                config.version
            );
        }

        let game_artifacts = register_game_artifact_tasks(
            &mut project.graph,
            &identifier,
            specification.game_version(),
            &working_dir,
        )?;
        let minecraft_dependencies = config.libraries_for(specification.side());
        let raw_jar = project.graph.register_placeholder(format!("{identifier}RawJar"))?;
        let sources_jar = project.graph.register_placeholder(format!("{identifier}SourcesJar"))?;

        tracing::info!(
            "Created runtime '{identifier}' from {} ({} steps, {} libraries)",
            specification.source(),
            config.steps_for(specification.side()).map(<[_]>::len).unwrap_or_default(),
            minecraft_dependencies.len()
        );

        Ok(RuntimeDefinition::new(
            specification,
            config,
            working_dir,
            unpacked_dir,
            game_artifacts,
            minecraft_dependencies,
            raw_jar,
            sources_jar,
        ))
    }

    /// Bake one definition. Baking twice returns the first result.
    pub fn bake(&self, project: &mut Project, definition: &RuntimeDefinition) -> Result<BakedPipeline> {
        bake(&mut project.graph, definition, &self.registry)
    }

    /// Bake every definition that is not baked yet, in creation order.
    pub fn bake_all(&self, project: &mut Project) -> Result<()> {
        for definition in self.definitions.values() {
            self.bake(project, definition)?;
        }
        Ok(())
    }

    /// A definition by identifier.
    pub fn find(&self, identifier: &str) -> Option<Rc<RuntimeDefinition>> {
        self.definitions.get(identifier).cloned()
    }

    /// Every definition in creation order.
    pub fn definitions(&self) -> impl Iterator<Item = &Rc<RuntimeDefinition>> {
        self.definitions.values()
    }
}

impl std::fmt::Debug for RuntimeExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeExtension")
            .field("registry", &self.registry)
            .field("definitions", &self.definitions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
