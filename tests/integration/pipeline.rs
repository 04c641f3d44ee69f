//! Baking runtime pipelines from step manifests.

use forgegraph::core::DistributionType;
use forgegraph::game::GameArtifact;
use forgegraph::runtime::{AdapterRef, ToolAdapter, TreeAdapterExt};
use forgegraph::task::ToolTemplate;
use forgegraph::test_utils::init_test_logging;
use std::rc::Rc;
use tempfile::TempDir;

use crate::common::{
    declining_adapter, decompile_pipeline, dependency_names, extension, lifecycle_adapter, project,
};

#[test]
fn test_steps_chain_through_placeholders() {
    init_test_logging(None);
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    let baked = runtimes.bake(&mut project, &definition).unwrap();
    let graph = &project.graph;

    assert_eq!(
        baked.steps.keys().collect::<Vec<_>>(),
        ["collectLibraries", "rename", "accessTransform", "decompile"]
    );
    assert_eq!(
        dependency_names(graph, baked.steps["collectLibraries"]),
        ["neoFormJoined1201DownloadClient"]
    );
    assert_eq!(
        dependency_names(graph, baked.steps["rename"]),
        ["neoFormJoined1201CollectLibraries", "neoFormJoined1201DownloadClient"]
    );
    assert_eq!(dependency_names(graph, baked.steps["accessTransform"]), ["neoFormJoined1201Rename"]);
    assert_eq!(dependency_names(graph, baked.steps["decompile"]), ["neoFormJoined1201AccessTransform"]);

    assert_eq!(baked.raw, baked.steps["rename"]);
    assert_eq!(baked.sources, baked.steps["decompile"]);
    assert_eq!(graph.resolve(definition.raw_jar()).unwrap(), baked.steps["rename"]);
    assert_eq!(graph.resolve(definition.sources_jar()).unwrap(), baked.steps["decompile"]);
    assert_eq!(
        graph.output(definition.sources_jar()).unwrap(),
        temp.path().join("project/build/runtimes/neoFormJoined1201/steps/decompile/output.jar")
    );
}

#[test]
fn test_pre_adapter_replaces_step_input() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).with_pre_adapter("decompile", lifecycle_adapter("prepare"));
        })
        .unwrap();
    let baked = runtimes.bake(&mut project, &definition).unwrap();
    let graph = &project.graph;

    let prepare = graph.get("neoFormJoined1201DecompilePrepare").unwrap();
    assert_eq!(dependency_names(graph, prepare), ["neoFormJoined1201AccessTransform"]);
    assert_eq!(dependency_names(graph, baked.steps["decompile"]), ["neoFormJoined1201DecompilePrepare"]);
    assert!(!baked.steps.values().any(|&task| task == prepare));
    assert!(graph.depends_transitively(baked.sources, baked.steps["accessTransform"]));
}

#[test]
fn test_post_adapter_becomes_step_output() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder
                .source(fixture.source())
                .with_post_adapter("accessTransform", lifecycle_adapter("verify"))
                .with_post_adapter("rename", declining_adapter());
        })
        .unwrap();
    let baked = runtimes.bake(&mut project, &definition).unwrap();
    let graph = &project.graph;

    let verify = graph.get("neoFormJoined1201AccessTransformVerify").unwrap();
    assert_eq!(baked.steps["accessTransform"], verify);
    assert_eq!(graph.name(baked.steps["rename"]), "neoFormJoined1201Rename");
    assert_eq!(dependency_names(graph, baked.steps["decompile"]), ["neoFormJoined1201AccessTransformVerify"]);
}

#[test]
fn test_adapters_keep_one_entry_per_step() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let remap = ToolAdapter::new(
        "remap",
        ToolTemplate::new("net.neoforged:AutoRenamingTool:2.0.3:all".parse().unwrap(), ["{input}", "{output}"]),
    );
    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder
                .source(fixture.source())
                .with_pre_adapter("rename", AdapterRef::new(lifecycle_adapter("first").and_then(lifecycle_adapter("second"))))
                .with_pre_adapter("accessTransform", AdapterRef::new(remap))
                .with_post_adapter("decompile", declining_adapter());
        })
        .unwrap();
    let baked = runtimes.bake(&mut project, &definition).unwrap();
    let graph = &project.graph;

    assert_eq!(baked.steps.len(), 4);
    let first = graph.get("neoFormJoined1201RenameFirst").unwrap();
    let second = graph.get("neoFormJoined1201RenameSecond").unwrap();
    let remap = graph.get("neoFormJoined1201AccessTransformRemap").unwrap();
    for adapter in [first, second, remap] {
        assert!(!baked.steps.values().any(|&task| task == adapter));
    }
    assert!(graph.depends_transitively(baked.steps["rename"], second));
    assert!(graph.depends_transitively(second, first));
    assert_eq!(dependency_names(graph, remap), ["neoFormJoined1201Rename"]);
    assert_eq!(dependency_names(graph, baked.steps["accessTransform"]), ["neoFormJoined1201AccessTransformRemap"]);
    assert_eq!(graph.name(baked.sources), "neoFormJoined1201Decompile");
}

#[test]
fn test_equal_specifications_share_one_definition() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);
    let adapter = lifecycle_adapter("prepare");

    let first = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).with_pre_adapter("decompile", adapter.clone());
        })
        .unwrap();
    let tasks_after_creation = project.graph.len();
    let second = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).with_pre_adapter("decompile", adapter.clone());
        })
        .unwrap();
    assert!(Rc::ptr_eq(&first, &second));
    assert_eq!(project.graph.len(), tasks_after_creation);

    let baked = runtimes.bake(&mut project, &first).unwrap();
    let tasks_after_bake = project.graph.len();
    let again = runtimes.bake(&mut project, &second).unwrap();
    assert_eq!(baked, again);
    assert_eq!(project.graph.len(), tasks_after_bake);
    assert_eq!(runtimes.definitions().count(), 1);
}

#[test]
fn test_conflicting_specification_is_rejected() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    let error = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).with_pre_adapter("decompile", lifecycle_adapter("prepare"));
        })
        .unwrap_err();
    assert!(error.to_string().contains("neoFormJoined1201"), "{error}");
}

#[test]
fn test_sides_do_not_alias() {
    let temp = TempDir::new().unwrap();
    let fixture = decompile_pipeline(temp.path());
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let joined = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    let client = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source()).side(DistributionType::Client);
        })
        .unwrap();
    assert!(!Rc::ptr_eq(&joined, &client));
    assert_eq!(client.identifier(), "neoFormClient1201");

    runtimes.bake_all(&mut project).unwrap();
    let joined_steps = &joined.baked().unwrap().steps;
    let client_steps = &client.baked().unwrap().steps;
    for (name, task) in client_steps {
        assert_ne!(joined_steps[name], *task, "step '{name}' is shared");
        assert!(project.graph.name(*task).starts_with("neoFormClient1201"));
    }
    assert_ne!(
        joined.game_artifacts()[&GameArtifact::ClientJar],
        client.game_artifacts()[&GameArtifact::ClientJar]
    );
    assert_ne!(project.graph.resolve(joined.raw_jar()).unwrap(), project.graph.resolve(client.raw_jar()).unwrap());
}

#[test]
fn test_unknown_step_type_is_fatal() {
    let temp = TempDir::new().unwrap();
    let fixture = forgegraph::test_utils::RuntimeFixture::new(temp.path())
        .with_steps("joined", serde_json::json!([{ "type": "obfuscate" }]))
        .write();
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    let error = runtimes.bake(&mut project, &definition).unwrap_err();
    assert!(format!("{error:#}").contains("obfuscate"), "{error:#}");
    assert!(!definition.is_baked());
}

#[test]
fn test_unresolvable_placeholder_names_the_step() {
    let temp = TempDir::new().unwrap();
    let fixture = forgegraph::test_utils::RuntimeFixture::new(temp.path())
        .with_steps("joined", serde_json::json!([{ "type": "decompile", "input": "{missingOutput}" }]))
        .with_function("decompile", "org.vineflower:vineflower:1.10.1", &["{input}", "{output}"])
        .write();
    let mut project = project(temp.path());
    let mut runtimes = extension(&fixture);

    let definition = runtimes
        .register_or_get(&mut project, |builder| {
            builder.source(fixture.source());
        })
        .unwrap();
    let error = format!("{:#}", runtimes.bake(&mut project, &definition).unwrap_err());
    assert!(error.contains("decompile"), "{error}");
    assert!(error.contains("missingOutput"), "{error}");
}
