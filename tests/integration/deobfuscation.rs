//! Replacing obfuscated dependencies end to end through a [`Build`].

use anyhow::{Result, bail};
use forgegraph::artifact::ArtifactRef;
use forgegraph::build::Build;
use forgegraph::mappings::{MappingChannel, TaskBuildingContext};
use forgegraph::project::{Dependency, Project};
use forgegraph::replacement::DependencyDeobfuscator;
use forgegraph::resolution::{ResolvedArtifact, ResolvedModule};
use forgegraph::task::TaskId;
use forgegraph::test_utils::{RecordingMappingChannel, RuntimeFixture, StaticResolver, write_jar, write_obfuscated_jar};
use std::path::Path;
use std::rc::Rc;
use tempfile::TempDir;

use crate::common::decompile_pipeline;

fn module(name: &str) -> ArtifactRef {
    ArtifactRef::new("com.example", name, "1.0")
}

fn build(fixture: &RuntimeFixture, project: Project, resolver: Rc<StaticResolver>) -> Build {
    build_with_channel(fixture, project, resolver, Box::new(RecordingMappingChannel::new()))
}

fn build_with_channel(
    fixture: &RuntimeFixture,
    project: Project,
    resolver: Rc<StaticResolver>,
    channel: Box<dyn MappingChannel>,
) -> Build {
    let mut build = Build::new(project, fixture.resolver(), DependencyDeobfuscator::new(resolver), channel).unwrap();
    build
        .register_runtime(|builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    build
}

fn obfuscated(root: &Path, reference: &ArtifactRef) -> ResolvedModule {
    let jar = root.join("jars").join(reference.file_name());
    write_obfuscated_jar(&jar).unwrap();
    ResolvedModule::single(reference.clone(), jar)
}

fn plain(root: &Path, reference: &ArtifactRef) -> ResolvedModule {
    let jar = root.join("jars").join(reference.file_name());
    write_jar(&jar, &[("Implementation-Title", reference.name.as_str())], &[("a.class", b"\xca\xfe\xba\xbe")]).unwrap();
    ResolvedModule::single(reference.clone(), jar)
}

#[test]
fn test_only_obfuscated_modules_are_replaced() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let library = ArtifactRef::new("com.google.code.gson", "gson", "2.10.1");
    let resolver = StaticResolver::new()
        .with_modules(library.clone(), vec![plain(temp.path(), &library)])
        .with_modules(module("mod"), vec![obfuscated(temp.path(), &module("mod"))]);
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(library.clone())).unwrap();
    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    build.finalize_configuration().unwrap();

    let replacements = build.replacement().replacements("implementation");
    assert_eq!(replacements.len(), 1);
    assert_eq!(replacements[0].original, module("mod"));
    assert_eq!(replacements[0].handler, "deobfuscator");

    let configuration = build.project().configuration("implementation").unwrap();
    assert!(configuration.contains(&Dependency::Module(library)));
    assert!(!configuration.contains(&Dependency::Module(module("mod"))));
    assert!(configuration.contains(&Dependency::TaskOutput(replacements[0].result.raw())));

    let graph = &build.project().graph;
    let raw = graph.resolve(replacements[0].result.raw()).unwrap();
    assert_eq!(graph.name(raw), "deobfuscateComExampleMod10RemapCompiled");
    assert!(graph.depends_transitively(raw, graph.get("deobfuscateComExampleMod10ProvideRaw").unwrap()));
    let generator = build.replacement().generator("implementation").unwrap();
    assert!(graph.depends_transitively(generator, raw));
}

#[test]
fn test_multi_module_resolution_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let bundle = module("bundle");
    let resolver = StaticResolver::new().with_modules(
        bundle.clone(),
        vec![obfuscated(temp.path(), &module("first")), obfuscated(temp.path(), &module("second"))],
    );
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(bundle.clone())).unwrap();
    build.finalize_configuration().unwrap();

    assert!(build.replacement().replacements("implementation").is_empty());
    assert!(build.project().configuration("implementation").unwrap().contains(&Dependency::Module(bundle)));
    assert!(build.replacement().generator("implementation").is_none());
    assert!(build.project().graph.find("deobfuscateComExampleFirst10Raw").is_none());
}

#[test]
fn test_module_is_deobfuscated_once_across_configurations() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let resolver = Rc::new(StaticResolver::new().with_modules(module("mod"), vec![obfuscated(temp.path(), &module("mod"))]));
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::clone(&resolver));

    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    build.add_dependency("runtimeOnly", Dependency::Module(module("mod"))).unwrap();
    assert_eq!(build.deobfuscator().pending_count(), 1);
    assert_eq!(resolver.resolution_count(), 2);

    let compile = &build.replacement().replacements("implementation")[0].result;
    let runtime = &build.replacement().replacements("runtimeOnly")[0].result;
    assert!(Rc::ptr_eq(compile, runtime));
    assert_ne!(
        build.replacement().generator("implementation"),
        build.replacement().generator("runtimeOnly")
    );

    build.finalize_configuration().unwrap();
    let graph = &build.project().graph;
    let remaps = graph.iter().filter(|(_, node)| node.name().ends_with("RemapCompiled")).count();
    assert_eq!(remaps, 1);
}

#[test]
fn test_transitive_replacements_carry_their_dependencies() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let library = ArtifactRef::new("org.ow2.asm", "asm", "9.5");
    let parent = obfuscated(temp.path(), &module("parent"))
        .with_child(obfuscated(temp.path(), &module("child")).with_child(plain(temp.path(), &library)));
    let resolver = StaticResolver::new().with_modules(module("parent"), vec![parent]);
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(module("parent"))).unwrap();
    assert_eq!(build.deobfuscator().pending_count(), 2);
    build.finalize_configuration().unwrap();

    let graph = &build.project().graph;
    let child_raw = graph.get("deobfuscateComExampleChild10Raw").unwrap();
    let configuration = build.project().configuration("implementation").unwrap();
    assert!(configuration.contains(&Dependency::TaskOutput(child_raw)));
    assert!(configuration.contains(&Dependency::Module(library)));
    assert_eq!(configuration.dependencies().len(), 3);
    assert_eq!(graph.name(graph.resolve(child_raw).unwrap()), "deobfuscateComExampleChild10RemapCompiled");
}

#[test]
fn test_ide_import_publishes_synthetic_entries() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let library = ArtifactRef::new("org.ow2.asm", "asm", "9.5");
    let parent = obfuscated(temp.path(), &module("mod")).with_child(plain(temp.path(), &library));
    let resolver = StaticResolver::new().with_modules(module("mod"), vec![parent]);
    let project = Project::new("demo", temp.path().join("project")).with_ide_import(true);
    let mut build = build(&fixture, project, Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    build.finalize_configuration().unwrap();

    let root = temp.path().join("project/build/libs");
    let descriptor = root.join("fg_dummy_fg/com/example/mod/1.0/ivy-1.0-fg3.xml");
    let xml = std::fs::read_to_string(&descriptor).unwrap();
    assert!(xml.contains(r#"org="org.ow2.asm" name="asm" rev="9.5""#), "{xml}");

    let synthetic = ArtifactRef::new("fg_dummy_fg.com.example", "mod", "1.0");
    let configuration = build.project().configuration("implementation").unwrap();
    assert!(configuration.contains(&Dependency::Module(synthetic)));

    let graph = &build.project().graph;
    let combine = graph.get("combineDeobfuscateComExampleMod10").unwrap();
    assert_eq!(build.project().ide_sync_tasks().collect::<Vec<_>>(), [combine]);
    assert_eq!(graph.output(combine).unwrap(), root.join("fg_dummy_fg/com/example/mod/1.0/mod-1.0.jar"));
}

#[test]
fn test_ide_import_publishes_replaced_children() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let parent = obfuscated(temp.path(), &module("mod")).with_child(obfuscated(temp.path(), &module("child")));
    let resolver = StaticResolver::new().with_modules(module("mod"), vec![parent]);
    let project = Project::new("demo", temp.path().join("project")).with_ide_import(true);
    let mut build = build(&fixture, project, Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    build.finalize_configuration().unwrap();

    let replacement = &build.replacement().replacements("implementation")[0].result;
    assert_eq!(replacement.children().len(), 1);
    assert_eq!(replacement.children()[0].original, module("child"));

    let root = temp.path().join("project/build/libs");
    assert!(root.join("fg_dummy_fg/com/example/child/1.0/ivy-1.0-fg3.xml").exists());

    let graph = &build.project().graph;
    let child_combine = graph.get("combineDeobfuscateComExampleChild10").unwrap();
    let parent_combine = graph.get("combineDeobfuscateComExampleMod10").unwrap();
    assert_eq!(build.project().ide_sync_tasks().collect::<Vec<_>>(), [child_combine, parent_combine]);
    assert_eq!(
        graph.output(child_combine).unwrap(),
        root.join("fg_dummy_fg/com/example/child/1.0/child-1.0.jar")
    );

    let generator = build.replacement().generator("implementation").unwrap();
    assert!(graph.depends_transitively(generator, child_combine));
    let child_sources = graph.resolve(graph.get("deobfuscateComExampleChild10Sources").unwrap()).unwrap();
    assert!(graph.depends_transitively(generator, child_sources));
}

#[test]
fn test_module_with_several_artifacts_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut bundle = obfuscated(temp.path(), &module("bundle"));
    let extra = module("bundle").with_classifier("extra");
    let extra_jar = temp.path().join("jars").join(extra.file_name());
    write_obfuscated_jar(&extra_jar).unwrap();
    bundle.artifacts.push(ResolvedArtifact {
        reference: extra,
        file: extra_jar,
    });
    let resolver = StaticResolver::new().with_modules(module("bundle"), vec![bundle]);
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(module("bundle"))).unwrap();
    build.finalize_configuration().unwrap();

    assert!(build.replacement().replacements("implementation").is_empty());
    assert_eq!(build.deobfuscator().pending_count(), 0);
    assert!(build.project().configuration("implementation").unwrap().contains(&Dependency::Module(module("bundle"))));
    assert!(build.project().graph.find("deobfuscateComExampleBundle10Raw").is_none());
}

#[test]
fn test_published_sources_are_remapped_instead_of_decompiled() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let sources_jar = temp.path().join("jars/mod-1.0-sources.jar");
    let resolver = StaticResolver::new()
        .with_modules(module("mod"), vec![obfuscated(temp.path(), &module("mod"))])
        .with_sources(module("mod"), &sources_jar);
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    build.finalize_configuration().unwrap();

    let result = &build.replacement().replacements("implementation")[0].result;
    let graph = &build.project().graph;
    let sources = graph.resolve(result.sources()).unwrap();
    assert_eq!(graph.name(sources), "deobfuscateComExampleMod10RemapSources");
    assert!(graph.depends_transitively(sources, graph.get("deobfuscateComExampleMod10ProvideSources").unwrap()));
    assert!(graph.find("deobfuscateComExampleMod10Decompile").is_none());
}

#[test]
fn test_colliding_task_names_get_distinct_prefixes() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let dotted_name = ArtifactRef::new("com.example", "foo.bar", "1.0");
    let dotted_group = ArtifactRef::new("com.example.foo", "bar", "1.0");
    let archive = module("mod").with_extension("zip");
    let resolver = StaticResolver::new()
        .with_modules(dotted_name.clone(), vec![obfuscated(temp.path(), &dotted_name)])
        .with_modules(dotted_group.clone(), vec![obfuscated(&temp.path().join("group"), &dotted_group)])
        .with_modules(module("mod"), vec![obfuscated(temp.path(), &module("mod"))])
        .with_modules(archive.clone(), vec![obfuscated(temp.path(), &archive)]);
    let mut build = build(&fixture, Project::new("demo", temp.path().join("project")), Rc::new(resolver));

    for dependency in [dotted_name, dotted_group, module("mod"), archive] {
        build.add_dependency("implementation", Dependency::Module(dependency)).unwrap();
    }
    assert_eq!(build.deobfuscator().pending_count(), 4);
    build.finalize_configuration().unwrap();

    let prefixes: Vec<&str> = build
        .replacement()
        .replacements("implementation")
        .iter()
        .map(|replacement| replacement.result.task_prefix())
        .collect();
    assert_eq!(
        prefixes,
        [
            "deobfuscateComExampleFooBar10",
            "deobfuscateComExampleFooBar10_2",
            "deobfuscateComExampleMod10",
            "deobfuscateComExampleMod10Zip",
        ]
    );
    let graph = &build.project().graph;
    assert!(graph.find("deobfuscateComExampleFooBar10_2RemapCompiled").is_some());
}

/// A channel that cannot remap compiled classes.
struct BrokenChannel;

impl MappingChannel for BrokenChannel {
    fn name(&self) -> &str {
        "broken"
    }

    fn apply_compiled_mappings(&self, _context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        bail!("no mappings for this version")
    }

    fn apply_source_mappings(&self, _context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        bail!("no mappings for this version")
    }

    fn generate_debugging_mappings(&self, _context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        bail!("no mappings for this version")
    }
}

#[test]
fn test_failed_wiring_keeps_modules_pending() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let resolver = StaticResolver::new().with_modules(module("mod"), vec![obfuscated(temp.path(), &module("mod"))]);
    let project = Project::new("demo", temp.path().join("project"));
    let mut build = build_with_channel(&fixture, project, Rc::new(resolver), Box::new(BrokenChannel));

    build.add_dependency("implementation", Dependency::Module(module("mod"))).unwrap();
    let error = build.finalize_configuration().unwrap_err();
    assert!(format!("{error:#}").contains("no mappings for this version"), "{error:#}");
    assert_eq!(build.deobfuscator().pending_count(), 1);
    assert!(!build.is_finalized());

    let error = build.finalize_configuration().unwrap_err();
    assert!(format!("{error:#}").contains("no mappings for this version"), "{error:#}");
    assert_eq!(build.deobfuscator().pending_count(), 1);
    assert!(!build.is_finalized());
    assert!(build.project().graph.find("deobfuscateComExampleMod10ProvideRaw").is_some());
}
