//! The `forgegraph` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

use crate::common::decompile_pipeline;

fn forgegraph(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("forgegraph").unwrap();
    cmd.current_dir(dir).env("NO_COLOR", "1").env_remove("FORGEGRAPH_CONFIG").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_coordinate_prints_canonical_form() {
    let temp = TempDir::new().unwrap();
    forgegraph(temp.path())
        .args(["coordinate", "net.minecraft:client:1.20.1:mappings@txt"])
        .assert()
        .success()
        .stdout(predicate::str::contains("net.minecraft:client:1.20.1:mappings@txt"))
        .stdout(predicate::str::contains("client-1.20.1-mappings.txt"))
        .stdout(predicate::str::contains("ivy-1.20.1-fg3.xml"));
}

#[test]
fn test_coordinate_rejects_missing_version() {
    let temp = TempDir::new().unwrap();
    forgegraph(temp.path())
        .args(["coordinate", "net.minecraft:client"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("net.minecraft:client"));
}

#[test]
fn test_plan_without_configuration() {
    let temp = TempDir::new().unwrap();
    forgegraph(temp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runtime configured"));
}

#[test]
fn test_plan_prints_the_wired_pipeline() {
    let temp = TempDir::new().unwrap();
    decompile_pipeline(temp.path());
    fs::write(
        temp.path().join("forgegraph.toml"),
        r#"
tools_dir = "repository"

[runtime]
source = "net.neoforged:neoform:1.20.1-20230612.114412@zip"
"#,
    )
    .unwrap();

    forgegraph(temp.path())
        .arg("plan")
        .assert()
        .success()
        .stdout(predicate::str::contains("neoFormJoined1201"))
        .stdout(predicate::str::contains("raw jar:     neoFormJoined1201Rename"))
        .stdout(predicate::str::contains("sources jar: neoFormJoined1201Decompile"));

    let output = forgegraph(temp.path()).args(["plan", "--json"]).output().unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let runtime = &report["runtimes"][0];
    assert_eq!(runtime["identifier"], "neoFormJoined1201");
    assert_eq!(runtime["raw"], "neoFormJoined1201Rename");
    assert_eq!(runtime["steps"].as_array().unwrap().len(), 4);
    assert_eq!(runtime["steps"][1]["depends_on"].as_array().unwrap().len(), 2);
}

#[test]
fn test_invalid_configuration_is_reported() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("custom.toml"), "parallelism = 0\n").unwrap();

    forgegraph(temp.path())
        .args(["--config", "custom.toml", "plan"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("parallelism"));
}

#[test]
fn test_run_unknown_target_fails() {
    let temp = TempDir::new().unwrap();
    forgegraph(temp.path())
        .args(["run", "--target", "doesNotExist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("doesNotExist"));
}
