//! Shared fixtures for the forgegraph integration tests.

// Not every test file uses every helper
#![allow(dead_code)]

use forgegraph::project::Project;
use forgegraph::runtime::{AdapterContext, AdapterRef, RuntimeExtension};
use forgegraph::task::{TaskAction, TaskGraph, TaskId, TaskSpec};
use forgegraph::test_utils::RuntimeFixture;
use serde_json::json;
use std::path::Path;

/// Coordinates used by the function steps of [`decompile_pipeline`].
pub const RENAMER: &str = "net.neoforged:AutoRenamingTool:2.0.3:all";
pub const TRANSFORMER: &str = "net.neoforged.jst:jst-cli-bundle:1.0.30";
pub const DECOMPILER: &str = "org.vineflower:vineflower:1.10.1";

/// A runtime that collects libraries, renames the client, transforms access
/// and decompiles, in that order.
pub fn decompile_pipeline(root: &Path) -> RuntimeFixture {
    RuntimeFixture::new(root)
        .with_steps(
            "joined",
            json!([
                { "type": "listLibraries", "name": "collectLibraries", "input": "{downloadClientOutput}" },
                { "type": "rename", "input": "{downloadClientOutput}", "libraries": "{collectLibrariesOutput}" },
                { "type": "accessTransform", "input": "{renameOutput}" },
                { "type": "decompile", "input": "{accessTransformOutput}" }
            ]),
        )
        .with_function("rename", RENAMER, &["--input", "{input}", "--output", "{output}", "--cfg", "{libraries}"])
        .with_function("accessTransform", TRANSFORMER, &["--in", "{input}", "--out", "{output}"])
        .with_function("decompile", DECOMPILER, &["-log=WARN", "{input}", "{output}"])
        .write()
}

/// A runtime made only of built-in steps, executable without Java.
pub fn builtin_pipeline(root: &Path) -> RuntimeFixture {
    RuntimeFixture::new(root)
        .with_steps(
            "joined",
            json!([
                { "type": "listLibraries" },
                { "type": "downloadClient" },
                { "type": "strip" },
                { "type": "inject", "input": "{stripOutput}" }
            ]),
        )
        .write()
}

/// A project rooted in `root`.
pub fn project(root: &Path) -> Project {
    Project::new("demo", root.join("project"))
}

/// A runtime extension able to resolve the fixture's archive.
pub fn extension(fixture: &RuntimeFixture) -> RuntimeExtension {
    RuntimeExtension::new(fixture.resolver())
}

/// Sorted names of the direct dependencies of `task`.
pub fn dependency_names(graph: &TaskGraph, task: TaskId) -> Vec<String> {
    let mut names: Vec<String> = graph.dependencies(task).map(|id| graph.name(id).to_string()).collect();
    names.sort();
    names
}

/// An adapter registering a lifecycle task `<definition><Step><suffix>`
/// depending on the chain head.
pub fn lifecycle_adapter(suffix: &'static str) -> AdapterRef {
    AdapterRef::new(move |context: &mut AdapterContext<'_>| -> anyhow::Result<Option<TaskId>> {
        let name = context.task_name(suffix);
        let output = context.working_dir.join("adapters").join(format!("{name}.jar"));
        let task = context
            .graph
            .register(TaskSpec::new(name, TaskAction::Lifecycle).with_output(output).depends_on(context.input))?;
        Ok(Some(task))
    })
}

/// An adapter that never changes the chain.
pub fn declining_adapter() -> AdapterRef {
    AdapterRef::new(|_: &mut AdapterContext<'_>| -> anyhow::Result<Option<TaskId>> { Ok(None) })
}
