//! Replacement of obfuscated dependencies.
//!
//! A dependency is deobfuscated when its single resolved artifact is a jar
//! whose manifest carries `Obfuscated: true` and `Obfuscated-By: ForgeGradle`.
//! Children of the resolved module are examined the same way first, so a whole
//! obfuscated subtree is replaced consistently.
//!
//! Replacement happens in two phases. [`ReplacementHandler::handle`] creates
//! the raw and sources placeholders immediately and queues the module; the
//! remapping tasks are only registered by [`DependencyDeobfuscator::finalize`],
//! once the runtime providing the mappings has been baked.

use anyhow::{Context, Result};
use indexmap::{IndexMap, IndexSet};
use std::cell::RefCell;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::{ReplacementContext, ReplacementHandler, ReplacementResult};
use crate::artifact::ArtifactRef;
use crate::constants::{MANIFEST_PATH, OBFUSCATED_ATTRIBUTE, OBFUSCATED_BY_ATTRIBUTE, OBFUSCATED_BY_VALUE};
use crate::core::ForgeGraphError;
use crate::game::capitalize;
use crate::mappings::{MappingChannel, TaskBuildingContext};
use crate::project::{Dependency, Project};
use crate::repository::Entry;
use crate::resolution::{DependencyResolver, ResolvedArtifact, ResolvedModule};
use crate::runtime::RuntimeDefinition;
use crate::task::{TaskAction, TaskGraph, TaskId, TaskSpec, ToolTemplate};

/// Decompiler used when a module publishes no sources.
pub fn default_decompiler() -> ToolTemplate {
    ToolTemplate::new(
        ArtifactRef::new("org.vineflower", "vineflower", "1.10.1"),
        ["--decompile-generics", "{input}", "{output}"],
    )
}

/// A module whose tasks are registered on finalization.
#[derive(Debug, Clone)]
struct PendingModule {
    prefix: String,
    file: PathBuf,
    sources: Option<PathBuf>,
    raw: TaskId,
    sources_task: TaskId,
}

/// The deobfuscating replacement handler.
pub struct DependencyDeobfuscator {
    resolver: Rc<dyn DependencyResolver>,
    decompiler: ToolTemplate,
    force: bool,
    cache: RefCell<IndexMap<ArtifactRef, Option<Rc<ReplacementResult>>>>,
    resolving: RefCell<IndexSet<ArtifactRef>>,
    pending: RefCell<Vec<PendingModule>>,
}

impl DependencyDeobfuscator {
    /// A deobfuscator resolving candidates through `resolver`.
    pub fn new(resolver: Rc<dyn DependencyResolver>) -> Self {
        Self {
            resolver,
            decompiler: default_decompiler(),
            force: false,
            cache: RefCell::new(IndexMap::new()),
            resolving: RefCell::new(IndexSet::new()),
            pending: RefCell::new(Vec::new()),
        }
    }

    /// Use a different decompiler.
    #[must_use]
    pub fn with_decompiler(mut self, decompiler: ToolTemplate) -> Self {
        self.decompiler = decompiler;
        self
    }

    /// Deobfuscate every single-artifact dependency regardless of markers.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Modules waiting for [`finalize`](Self::finalize).
    pub fn pending_count(&self) -> usize {
        self.pending.borrow().len()
    }

    /// The memoized decision for an artifact, if one was taken.
    pub fn cached(&self, artifact: &ArtifactRef) -> Option<Option<Rc<ReplacementResult>>> {
        self.cache.borrow().get(artifact).cloned()
    }

    fn replace_module(&self, graph: &mut TaskGraph, module: &ResolvedModule) -> Result<Option<Rc<ReplacementResult>>> {
        let [artifact] = module.artifacts.as_slice() else {
            tracing::warn!(
                "{} has {} artifacts, not sure how to deobfuscate it; leaving it as is",
                module.reference,
                module.artifacts.len()
            );
            return Ok(None);
        };

        if let Some(cached) = self.cache.borrow().get(&artifact.reference) {
            tracing::trace!("Reusing deobfuscation decision for {}", artifact.reference);
            return Ok(cached.clone());
        }

        if !self.is_obfuscated(&artifact.file) {
            tracing::debug!("{} is not obfuscated", artifact.reference);
            self.cache.borrow_mut().insert(artifact.reference.clone(), None);
            return Ok(None);
        }

        if !self.resolving.borrow_mut().insert(artifact.reference.clone()) {
            let mut chain: Vec<String> = self.resolving.borrow().iter().map(ToString::to_string).collect();
            chain.push(artifact.reference.to_string());
            return Err(ForgeGraphError::CircularDependency {
                chain: chain.join(" → "),
            }
            .into());
        }
        let built = self.build(graph, module, artifact);
        self.resolving.borrow_mut().shift_remove(&artifact.reference);

        let result = Some(Rc::new(built?));
        self.cache.borrow_mut().insert(artifact.reference.clone(), result.clone());
        Ok(result)
    }

    fn build(&self, graph: &mut TaskGraph, module: &ResolvedModule, artifact: &ResolvedArtifact) -> Result<ReplacementResult> {
        let mut children = Vec::with_capacity(module.children.len());
        for child in &module.children {
            let replaced = self
                .replace_module(graph, child)
                .with_context(|| format!("Failed to deobfuscate {}, a dependency of {}", child.reference, module.reference))?;
            children.push((child.reference.clone(), replaced));
        }

        let prefix = unique_prefix(graph, format!("deobfuscate{}", capitalize(&artifact.reference.task_name_fragment())));
        let raw = graph.register_placeholder(format!("{prefix}Raw"))?;
        let sources_task = graph.register_placeholder(format!("{prefix}Sources"))?;
        let sources = self
            .resolver
            .resolve_sources(&module.reference)
            .with_context(|| format!("Failed to look up the sources of {}", module.reference))?;
        if sources.is_none() {
            tracing::debug!("{} publishes no sources, they will be decompiled", module.reference);
        }

        self.pending.borrow_mut().push(PendingModule {
            prefix: prefix.clone(),
            file: artifact.file.clone(),
            sources,
            raw,
            sources_task,
        });
        tracing::info!("Deobfuscating {} ({} dependencies)", artifact.reference, children.len());

        let mut result = ReplacementResult::new(prefix, raw, sources_task);
        for (reference, replaced) in &children {
            match replaced {
                None => result = result.with_additional_dependency(Dependency::Module(reference.clone())),
                Some(child) => {
                    result = result.with_child(reference.clone(), Rc::clone(child));
                    result = result.with_additional_dependency(Dependency::TaskOutput(child.raw()));
                    for nested in child.additional_dependencies() {
                        result = result.with_additional_dependency(nested.clone());
                    }
                }
            }
        }

        Ok(result.with_metadata(move |builder| {
            for (reference, replaced) in &children {
                match replaced {
                    None => {
                        builder.with_module_dependency(reference.clone(), true);
                    }
                    Some(child) => {
                        let mut nested = Entry::builder();
                        nested.from_reference(reference);
                        child.configure_metadata(&mut nested)?;
                        builder.with_entry_dependency(nested.build()?);
                    }
                }
            }
            Ok(())
        }))
    }

    fn is_obfuscated(&self, file: &Path) -> bool {
        if self.force {
            return true;
        }
        match read_manifest(file) {
            Ok(attributes) => {
                attributes.get(OBFUSCATED_ATTRIBUTE).is_some_and(|value| value.eq_ignore_ascii_case("true"))
                    && attributes.get(OBFUSCATED_BY_ATTRIBUTE).is_some_and(|value| value == OBFUSCATED_BY_VALUE)
            }
            Err(error) => {
                tracing::warn!("Could not read the manifest of {}, assuming it is not obfuscated: {error:#}", file.display());
                false
            }
        }
    }

    /// Register the remapping tasks of every queued module and point the
    /// placeholders at them. Mappings, game artifacts and libraries come from
    /// the baked `runtime`; `overrides` extend its mapping version data.
    ///
    /// A module leaves the queue only once it is wired, so a failed call
    /// leaves the remaining modules pending.
    pub fn finalize(
        &self,
        project: &mut Project,
        runtime: &RuntimeDefinition,
        channel: &dyn MappingChannel,
        overrides: &IndexMap<String, String>,
    ) -> Result<()> {
        if self.pending.borrow().is_empty() {
            return Ok(());
        }

        let mut mapping_version = runtime.mapping_version().cloned().unwrap_or_default();
        mapping_version.extend(overrides.iter().map(|(key, value)| (key.clone(), value.clone())));

        loop {
            let Some(module) = self.pending.borrow().first().cloned() else {
                break;
            };
            self.wire(project, runtime, channel, &mapping_version, &module)
                .with_context(|| format!("Channel '{}' failed to wire {}", channel.name(), module.prefix))?;
            self.pending.borrow_mut().remove(0);
            tracing::debug!("Wired deobfuscation tasks of {}", module.prefix);
        }
        Ok(())
    }

    fn wire(
        &self,
        project: &mut Project,
        runtime: &RuntimeDefinition,
        channel: &dyn MappingChannel,
        mapping_version: &IndexMap<String, String>,
        module: &PendingModule,
    ) -> Result<()> {
        let working_dir = project.build_dir().join("deobfuscation").join(&module.prefix);
        let provide_raw = provide_file(
            &mut project.graph,
            format!("{}ProvideRaw", module.prefix),
            &module.file,
            working_dir.join("obfuscated.jar"),
        )?;
        let provide_sources = match &module.sources {
            Some(file) => Some(provide_file(
                &mut project.graph,
                format!("{}ProvideSources", module.prefix),
                file,
                working_dir.join("obfuscated-sources.jar"),
            )?),
            None => None,
        };

        let mut context = TaskBuildingContext {
            graph: &mut project.graph,
            prefix: module.prefix.clone(),
            input: provide_raw,
            working_dir,
            game_artifacts: runtime.game_artifacts(),
            mapping_version,
            libraries: runtime.step("listLibraries"),
        };
        let compiled = channel.apply_compiled_mappings(&mut context)?;
        let sources = match provide_sources {
            Some(input) => {
                context.input = input;
                channel.apply_source_mappings(&mut context)?
            }
            None => {
                context.input = compiled;
                context.register_tool("decompile", &self.decompiler, "jar")?
            }
        };

        project.graph.redirect(module.raw, compiled)?;
        project.graph.redirect(module.sources_task, sources)?;
        Ok(())
    }
}

/// The task copying `file` into place, registered on first use.
fn provide_file(graph: &mut TaskGraph, name: String, file: &Path, output: PathBuf) -> Result<TaskId> {
    if let Some(existing) = graph.find(&name) {
        return Ok(existing);
    }
    graph.register(TaskSpec::new(name, TaskAction::ProvideFile(file.to_path_buf())).with_output(output))
}

impl ReplacementHandler for DependencyDeobfuscator {
    fn handle(&self, context: &mut ReplacementContext<'_>) -> Result<Option<Rc<ReplacementResult>>> {
        let modules = self
            .resolver
            .resolve(context.dependency)
            .with_context(|| format!("Failed to resolve {}", context.dependency))?;
        match modules.as_slice() {
            [] => {
                tracing::debug!("{} resolved to nothing, not deobfuscating it", context.dependency);
                Ok(None)
            }
            [module] => self.replace_module(&mut context.project.graph, module),
            _ => {
                tracing::warn!(
                    "{} in '{}' resolves to {} modules, not sure how to deobfuscate it; leaving it as is",
                    context.dependency,
                    context.configuration,
                    modules.len()
                );
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for DependencyDeobfuscator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyDeobfuscator")
            .field("force", &self.force)
            .field("decompiler", &self.decompiler.tool)
            .field("cached", &self.cache.borrow().len())
            .field("pending", &self.pending.borrow().len())
            .finish_non_exhaustive()
    }
}

/// `base`, or `base_<n>` when another module already claimed `base`.
///
/// Task name fragments never contain `_`, so suffixed prefixes cannot collide
/// with readable ones.
fn unique_prefix(graph: &TaskGraph, base: String) -> String {
    let taken = |prefix: &str| graph.find(&format!("{prefix}Raw")).is_some();
    if !taken(&base) {
        return base;
    }
    let mut index = 2;
    while taken(&format!("{base}_{index}")) {
        index += 1;
    }
    tracing::debug!("Task prefix '{base}' is taken, using '{base}_{index}'");
    format!("{base}_{index}")
}

/// Main attributes of the manifest inside `jar`.
pub fn read_manifest(jar: &Path) -> Result<IndexMap<String, String>> {
    let file = File::open(jar).with_context(|| format!("Failed to open {}", jar.display()))?;
    let mut archive = zip::ZipArchive::new(file).with_context(|| format!("{} is not a jar", jar.display()))?;
    let mut entry = archive.by_name(MANIFEST_PATH).with_context(|| format!("{} has no manifest", jar.display()))?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(parse_main_attributes(&content))
}

fn parse_main_attributes(content: &str) -> IndexMap<String, String> {
    let mut attributes: IndexMap<String, String> = IndexMap::new();
    let mut last: Option<String> = None;
    for line in content.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            break;
        }
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some(value) = last.as_ref().and_then(|key| attributes.get_mut(key)) {
                value.push_str(continuation);
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            attributes.insert(key.clone(), value.trim().to_string());
            last = Some(key);
        }
    }
    attributes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StaticResolver, write_jar, write_obfuscated_jar};
    use tempfile::TempDir;

    fn context<'a>(project: &'a mut Project, dependency: &'a ArtifactRef) -> ReplacementContext<'a> {
        ReplacementContext {
            project,
            configuration: "implementation",
            dependency,
        }
    }

    #[test]
    fn test_manifest_parsing() {
        let attributes =
            parse_main_attributes("Manifest-Version: 1.0\r\nObfuscated: true\r\nLong: ab\r\n cd\r\n\r\nName: x\r\nObfuscated: false\r\n");
        assert_eq!(attributes["Obfuscated"], "true");
        assert_eq!(attributes["Long"], "abcd");
        assert!(!attributes.contains_key("Name"));
    }

    #[test]
    fn test_plain_jar_is_not_replaced() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("client.jar");
        write_jar(&jar, &[("Created-By", "hand")], &[]).unwrap();
        let client = ArtifactRef::new("net.minecraft", "client", "1.20.1");
        let resolver = StaticResolver::new().with_modules(client.clone(), vec![ResolvedModule::single(client.clone(), &jar)]);
        let deobfuscator = DependencyDeobfuscator::new(Rc::new(resolver));

        let mut project = Project::new("demo", temp.path());
        let result = deobfuscator.handle(&mut context(&mut project, &client)).unwrap();
        assert!(result.is_none());
        assert!(matches!(deobfuscator.cached(&client), Some(None)));
        assert_eq!(deobfuscator.pending_count(), 0);
    }

    #[test]
    fn test_unreadable_manifest_is_forced_only_on_request() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("broken.jar");
        std::fs::write(&jar, b"not a zip").unwrap();
        let broken = ArtifactRef::new("com.example", "broken", "1.0");
        let resolver =
            Rc::new(StaticResolver::new().with_modules(broken.clone(), vec![ResolvedModule::single(broken.clone(), &jar)]));

        let mut project = Project::new("demo", temp.path());
        let polite = DependencyDeobfuscator::new(resolver.clone());
        assert!(polite.handle(&mut context(&mut project, &broken)).unwrap().is_none());

        let forced = DependencyDeobfuscator::new(resolver).with_force(true);
        assert!(forced.handle(&mut context(&mut project, &broken)).unwrap().is_some());
    }

    #[test]
    fn test_obfuscated_subtree_is_replaced_children_first() {
        let temp = TempDir::new().unwrap();
        let parent_jar = temp.path().join("parent.jar");
        let child_jar = temp.path().join("child.jar");
        let plain_jar = temp.path().join("plain.jar");
        write_obfuscated_jar(&parent_jar).unwrap();
        write_obfuscated_jar(&child_jar).unwrap();
        write_jar(&plain_jar, &[], &[]).unwrap();

        let parent = ArtifactRef::new("com.example", "parent", "1.0");
        let child = ArtifactRef::new("com.example", "child", "1.0");
        let plain = ArtifactRef::new("org.lib", "plain", "2.0");
        let module = ResolvedModule::single(parent.clone(), &parent_jar)
            .with_child(ResolvedModule::single(child.clone(), &child_jar))
            .with_child(ResolvedModule::single(plain.clone(), &plain_jar));
        let deobfuscator = DependencyDeobfuscator::new(Rc::new(StaticResolver::new().with_modules(parent.clone(), vec![module])));

        let mut project = Project::new("demo", temp.path());
        let result = deobfuscator.handle(&mut context(&mut project, &parent)).unwrap().unwrap();
        let child_result = deobfuscator.cached(&child).unwrap().unwrap();

        assert!(child_result.raw() < result.raw());
        assert_eq!(project.graph.name(result.raw()), "deobfuscateComExampleParent10Raw");
        assert!(result.additional_dependencies().contains(&Dependency::TaskOutput(child_result.raw())));
        assert!(result.additional_dependencies().contains(&Dependency::Module(plain)));
        assert_eq!(result.children().len(), 1);
        assert_eq!(result.children()[0].original, child);
        assert!(Rc::ptr_eq(&result.children()[0].result, &child_result));
        assert_eq!(deobfuscator.pending_count(), 2);

        let mut builder = Entry::builder();
        builder.from_reference(&parent);
        result.configure_metadata(&mut builder).unwrap();
        let xml = builder.build().unwrap().descriptor().unwrap();
        assert!(xml.contains("org=\"fg_dummy_fg.com.example\" name=\"child\""), "{xml}");
        assert!(xml.contains("org=\"org.lib\" name=\"plain\""), "{xml}");
    }

    #[test]
    fn test_cycle_is_fatal() {
        let temp = TempDir::new().unwrap();
        let jar = temp.path().join("loop.jar");
        write_obfuscated_jar(&jar).unwrap();
        let looping = ArtifactRef::new("com.example", "loop", "1.0");
        let module = ResolvedModule::single(looping.clone(), &jar)
            .with_child(ResolvedModule::single(looping.clone(), &jar));
        let deobfuscator =
            DependencyDeobfuscator::new(Rc::new(StaticResolver::new().with_modules(looping.clone(), vec![module])));

        let mut project = Project::new("demo", temp.path());
        let error = deobfuscator.handle(&mut context(&mut project, &looping)).unwrap_err();
        assert!(error.chain().any(|cause| matches!(
            cause.downcast_ref::<ForgeGraphError>(),
            Some(ForgeGraphError::CircularDependency { .. })
        )));
    }
}
