//! The synthetic Ivy repository on disk.

use forgegraph::artifact::ArtifactRef;
use forgegraph::project::Project;
use forgegraph::repository::IvyDummyRepository;
use std::fs;
use tempfile::TempDir;

#[test]
fn test_descriptors_are_written_once_across_runs() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("libs");

    let mut first_run = IvyDummyRepository::new(&root);
    let entry = first_run
        .with_dependency(|builder| {
            builder
                .from_reference(&ArtifactRef::new("net.minecraft", "client", "1.20.1"))
                .with_module_dependency(ArtifactRef::new("com.mojang", "brigadier", "1.1.8"), true);
        })
        .unwrap();
    let descriptor = entry.descriptor_path(&root);
    let written = fs::read_to_string(&descriptor).unwrap();
    assert!(written.contains("brigadier"), "{written}");
    assert!(entry.artifact_path(&root).is_file());
    assert!(entry.as_sources().artifact_path(&root).is_file());

    // A later run with different metadata keeps the existing descriptor
    let mut second_run = IvyDummyRepository::new(&root);
    second_run
        .with_dependency(|builder| {
            builder.from_reference(&ArtifactRef::new("net.minecraft", "client", "1.20.1"));
        })
        .unwrap();
    assert_eq!(fs::read_to_string(&descriptor).unwrap(), written);
    assert_eq!(second_run.entries().count(), 1);
}

#[test]
fn test_nested_entries_are_published_first() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("libs");
    let mut repository = IvyDummyRepository::new(&root);

    let entry = repository
        .with_dependency(|builder| {
            builder.group("com.example").name("parent").version("2.0");
            builder
                .with_dependency(|nested| {
                    nested.group("com.example").name("child").version("1.0").classifier("universal");
                })
                .unwrap();
        })
        .unwrap();

    let child = root.join("fg_dummy_fg/com/example/child/1.0");
    assert!(child.join("child-1.0-universal.jar").is_file());
    assert!(child.join("ivy-1.0-fg3.xml").is_file());
    let parent = fs::read_to_string(entry.descriptor_path(&root)).unwrap();
    assert!(parent.contains(r#"org="fg_dummy_fg.com.example" name="child" rev="1.0""#), "{parent}");
    assert_eq!(
        repository.entries().map(|entry| entry.reference().to_string()).collect::<Vec<_>>(),
        ["fg_dummy_fg.com.example:child:1.0:universal", "fg_dummy_fg.com.example:parent:2.0"]
    );
}

#[test]
fn test_registration_points_at_the_build_directory() {
    let temp = TempDir::new().unwrap();
    let mut project = Project::new("demo", temp.path()).with_build_dir("out");
    let repository = IvyDummyRepository::for_project(&project);
    repository.register(&mut project);
    repository.register(&mut project);

    let declarations = project.repositories();
    assert_eq!(declarations.len(), 1);
    assert_eq!(declarations[0].root, temp.path().join("out/libs"));
    assert!(declarations[0].m2_compatible);
    assert!(declarations[0].ivy_pattern.ends_with("ivy-[revision]-fg3.xml"));
}

#[test]
fn test_coordinates_round_trip() {
    for notation in [
        "net.minecraft:client:1.20.1",
        "net.minecraft:client:1.20.1:mappings@txt",
        "net.neoforged:neoform:1.20.1-20230612.114412@zip",
        "org.vineflower:vineflower:1.10.1",
    ] {
        let reference: ArtifactRef = notation.parse().unwrap();
        assert_eq!(reference.to_string(), notation);
    }
    let explicit_jar: ArtifactRef = "com.example:mod:1.0@jar".parse().unwrap();
    assert_eq!(explicit_jar.to_string(), "com.example:mod:1.0");
    assert!("com.example:mod".parse::<ArtifactRef>().is_err());
}
