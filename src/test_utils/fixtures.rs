//! Fixtures for runtime archives, jars and resolution.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::artifact::ArtifactRef;
use crate::constants::{
    MANIFEST_PATH, OBFUSCATED_ATTRIBUTE, OBFUSCATED_BY_ATTRIBUTE, OBFUSCATED_BY_VALUE, RUNTIME_CONFIG_FILE,
};
use crate::mappings::{MappingChannel, TaskBuildingContext};
use crate::resolution::{DependencyResolver, MavenLayoutRepository, ResolvedModule, ToolResolver};
use crate::task::{TaskAction, TaskId, TaskSpec};
use crate::utils::ensure_parent_dir;

/// A runtime archive published into a Maven-layout directory.
#[derive(Debug, Clone)]
pub struct RuntimeFixture {
    root: PathBuf,
    source: ArtifactRef,
    manifest: Value,
    files: Vec<(String, Vec<u8>)>,
}

impl RuntimeFixture {
    /// A 1.20.1 runtime with mappings, inject and patch data but no steps.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            source: ArtifactRef::new("net.neoforged", "neoform", "1.20.1-20230612.114412").with_extension("zip"),
            manifest: json!({
                "spec": 2,
                "version": "1.20.1",
                "official": true,
                "java_target": 17,
                "encoding": "UTF-8",
                "data": {
                    "mappings": "config/joined.tsrg",
                    "inject": "config/inject/",
                    "patches": { "joined": "patches/joined/" }
                },
                "steps": {},
                "functions": {},
                "libraries": {}
            }),
            files: vec![
                ("config/joined.tsrg".to_string(), b"tsrg2 left right\n".to_vec()),
                ("config/inject/package-info-template.java".to_string(), b"package {PACKAGE};\n".to_vec()),
                ("patches/joined/net/minecraft/Main.java.patch".to_string(), b"--- a\n+++ b\n".to_vec()),
            ],
        }
    }

    /// Replace the steps of `side`.
    #[must_use]
    pub fn with_steps(mut self, side: &str, steps: Value) -> Self {
        self.manifest["steps"][side] = steps;
        self
    }

    /// Add a function entry backing a custom step type.
    #[must_use]
    pub fn with_function(mut self, name: &str, coordinate: &str, args: &[&str]) -> Self {
        self.manifest["functions"][name] = json!({ "version": coordinate, "args": args });
        self
    }

    /// Declare data entry `name` at `path` without shipping a file for it.
    #[must_use]
    pub fn with_data(mut self, name: &str, path: &str) -> Self {
        self.manifest["data"][name] = json!(path);
        self
    }

    /// Add a game library for `side`.
    #[must_use]
    pub fn with_library(mut self, side: &str, coordinate: &str) -> Self {
        let libraries = &mut self.manifest["libraries"][side];
        match libraries.as_array_mut() {
            Some(existing) => existing.push(json!(coordinate)),
            None => *libraries = json!([coordinate]),
        }
        self
    }

    /// Publish the archive under a different version.
    #[must_use]
    pub fn with_archive_version(mut self, version: &str) -> Self {
        self.source.version = version.to_string();
        self
    }

    /// Write the archive. Panics if it cannot be written.
    #[must_use]
    pub fn write(self) -> Self {
        if let Err(error) = self.try_write() {
            panic!("Failed to write runtime fixture: {error:#}");
        }
        self
    }

    /// Write the archive.
    pub fn try_write(&self) -> Result<()> {
        let archive = self.archive_path();
        ensure_parent_dir(&archive)?;
        let file = File::create(&archive).with_context(|| format!("Failed to create {}", archive.display()))?;
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        writer.start_file(RUNTIME_CONFIG_FILE, options)?;
        writer.write_all(&serde_json::to_vec_pretty(&self.manifest)?)?;
        for (name, content) in &self.files {
            writer.start_file(name.as_str(), options)?;
            writer.write_all(content)?;
        }
        writer.finish()?;
        Ok(())
    }

    /// Maven-layout directory the archive is published to.
    pub fn repository_dir(&self) -> PathBuf {
        self.root.join("repository")
    }

    /// Location of the archive.
    pub fn archive_path(&self) -> PathBuf {
        self.repository_dir().join(self.source.repository_path())
    }

    /// Coordinate of the archive.
    pub fn source(&self) -> ArtifactRef {
        self.source.clone()
    }

    /// A tool resolver able to find the archive.
    pub fn resolver(&self) -> Arc<dyn ToolResolver> {
        Arc::new(MavenLayoutRepository::new([self.repository_dir()]))
    }
}

/// Write a jar with the given main manifest attributes and entries.
pub fn write_jar(path: &Path, attributes: &[(&str, &str)], entries: &[(&str, &[u8])]) -> Result<()> {
    ensure_parent_dir(path)?;
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default();

    let mut manifest = String::from("Manifest-Version: 1.0\r\n");
    for (key, value) in attributes {
        manifest.push_str(&format!("{key}: {value}\r\n"));
    }
    manifest.push_str("\r\n");
    writer.start_file(MANIFEST_PATH, options)?;
    writer.write_all(manifest.as_bytes())?;

    for (name, content) in entries {
        writer.start_file(*name, options)?;
        writer.write_all(content)?;
    }
    writer.finish()?;
    Ok(())
}

/// Write a jar carrying both obfuscation markers.
pub fn write_obfuscated_jar(path: &Path) -> Result<()> {
    write_jar(
        path,
        &[(OBFUSCATED_ATTRIBUTE, "true"), (OBFUSCATED_BY_ATTRIBUTE, OBFUSCATED_BY_VALUE)],
        &[("a.class", b"\xca\xfe\xba\xbe")],
    )
}

/// Answers detached resolutions from a fixed table.
#[derive(Debug, Default)]
pub struct StaticResolver {
    modules: IndexMap<ArtifactRef, Vec<ResolvedModule>>,
    sources: IndexMap<ArtifactRef, PathBuf>,
    resolutions: Cell<usize>,
}

impl StaticResolver {
    /// Empty table: every dependency resolves to nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `dependency` to `modules`.
    #[must_use]
    pub fn with_modules(mut self, dependency: ArtifactRef, modules: Vec<ResolvedModule>) -> Self {
        self.modules.insert(dependency, modules);
        self
    }

    /// Publish a sources jar for `module`.
    #[must_use]
    pub fn with_sources(mut self, module: ArtifactRef, file: impl Into<PathBuf>) -> Self {
        self.sources.insert(module, file.into());
        self
    }

    /// Number of detached resolutions performed so far.
    pub fn resolution_count(&self) -> usize {
        self.resolutions.get()
    }
}

impl DependencyResolver for StaticResolver {
    fn resolve(&self, dependency: &ArtifactRef) -> Result<Vec<ResolvedModule>> {
        self.resolutions.set(self.resolutions.get() + 1);
        Ok(self.modules.get(dependency).cloned().unwrap_or_default())
    }

    fn resolve_sources(&self, module: &ArtifactRef) -> Result<Option<PathBuf>> {
        Ok(self.sources.get(module).cloned())
    }
}

/// A mapping channel registering lifecycle tasks and recording each request.
#[derive(Debug, Default)]
pub struct RecordingMappingChannel {
    requests: RefCell<Vec<String>>,
}

impl RecordingMappingChannel {
    /// A channel with no recorded requests.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests as `<builder>:<task name>`, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }

    fn record(&self, context: &mut TaskBuildingContext<'_>, suffix: &str) -> Result<TaskId> {
        let name = context.task_name(suffix);
        let output = context.output_file(suffix, "jar");
        let task = context.graph.register(
            TaskSpec::new(name.clone(), TaskAction::Lifecycle).with_output(output).depends_on(context.input),
        )?;
        self.requests.borrow_mut().push(format!("{suffix}:{name}"));
        Ok(task)
    }
}

impl MappingChannel for RecordingMappingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn apply_compiled_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        self.record(context, "remapCompiled")
    }

    fn apply_source_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        self.record(context, "remapSources")
    }

    fn generate_debugging_mappings(&self, context: &mut TaskBuildingContext<'_>) -> Result<TaskId> {
        self.record(context, "debuggingMappings")
    }
}
