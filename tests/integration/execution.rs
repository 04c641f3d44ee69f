//! Executing baked pipelines made of built-in steps.

use forgegraph::game::DirectoryGameCache;
use forgegraph::resolution::MavenLayoutRepository;
use forgegraph::task::{ExecutionServices, TaskExecutor};
use forgegraph::test_utils::write_jar;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use zip::ZipArchive;

use crate::common::{builtin_pipeline, extension, project};

fn entry_names(jar: &Path) -> Vec<String> {
    let archive = ZipArchive::new(File::open(jar).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

fn services(cache: &Path) -> ExecutionServices {
    ExecutionServices {
        tools: Arc::new(MavenLayoutRepository::default()),
        game_cache: Arc::new(DirectoryGameCache::new(cache)),
        java: "java".into(),
    }
}

#[tokio::test]
async fn test_builtin_pipeline_runs_and_skips_when_up_to_date() {
    let temp = TempDir::new().unwrap();
    let fixture = builtin_pipeline(temp.path());
    let cache = temp.path().join("cache");
    write_jar(
        &DirectoryGameCache::new(&cache).location("1.20.1", forgegraph::game::GameArtifact::ClientJar),
        &[],
        &[("a.class", b"\xca\xfe\xba\xbe"), ("data/pack.mcmeta", b"{}")],
    )
    .unwrap();

    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);
    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).raw_step("strip");
        })
        .unwrap();
    runtimes.bake(&mut project, &definition).unwrap();
    let targets = [definition.raw_jar(), definition.sources_jar()];

    let executor = TaskExecutor::new(services(&cache)).with_parallelism(2);
    let first = executor.execute(&project.graph, &targets).await.unwrap();
    assert_eq!(
        first.executed,
        ["neoFormJoined1201DownloadClient", "neoFormJoined1201Inject", "neoFormJoined1201Strip"]
    );

    let raw = project.graph.output(definition.raw_jar()).unwrap();
    assert_eq!(entry_names(&raw), ["a.class"]);
    let sources = project.graph.output(definition.sources_jar()).unwrap();
    assert_eq!(entry_names(&sources), ["a.class", "package-info-template.java"]);

    let second = executor.execute(&project.graph, &targets).await.unwrap();
    assert!(second.executed.is_empty(), "{:?}", second.executed);
    assert_eq!(second.up_to_date.len(), 3);

    std::fs::remove_file(&raw).unwrap();
    let third = executor.execute(&project.graph, &targets).await.unwrap();
    assert!(third.executed.contains(&"neoFormJoined1201Strip".to_string()));
    assert!(!third.executed.contains(&"neoFormJoined1201DownloadClient".to_string()));
}

#[tokio::test]
async fn test_missing_game_artifact_fails_the_run() {
    let temp = TempDir::new().unwrap();
    let fixture = builtin_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);
    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).raw_step("strip");
        })
        .unwrap();
    runtimes.bake(&mut project, &definition).unwrap();

    let executor = TaskExecutor::new(services(&temp.path().join("empty-cache")));
    let error = executor.execute(&project.graph, &[definition.sources_jar()]).await.unwrap_err();
    assert!(format!("{error:#}").contains("not cached"), "{error:#}");
    assert!(!project.graph.output(definition.sources_jar()).unwrap().exists());
}

#[tokio::test]
async fn test_library_listing_includes_additional_files() {
    let temp = TempDir::new().unwrap();
    let fixture = builtin_pipeline(temp.path());
    let extra = temp.path().join("extra.jar");
    write_jar(&extra, &[], &[]).unwrap();

    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);
    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).with_additional_dependency(&extra);
        })
        .unwrap();
    runtimes.bake(&mut project, &definition).unwrap();
    let list = definition.step("listLibraries").unwrap();

    let executor = TaskExecutor::new(services(&temp.path().join("cache")));
    executor.execute(&project.graph, &[list]).await.unwrap();
    let content = std::fs::read_to_string(project.graph.output(list).unwrap()).unwrap();
    assert_eq!(content, format!("-e={}\n", extra.display()));
}
