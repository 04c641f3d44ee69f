//! The synthetic Ivy repository.
//!
//! Replaced dependencies are published into a private file-system Ivy
//! repository so that the dependency resolver and IDEs see ordinary modules.
//! An entry is written as a descriptor plus empty placeholder files the moment
//! it is requested; the real content is copied over the placeholders later by
//! a `Combine` task.
//!
//! Entries live under a marker group prefix (`fg_dummy_fg.`) so they can never
//! collide with published coordinates. Descriptor names embed a metadata
//! version, so descriptors written by an older layout are never picked up:
//!
//! ```text
//! <root>/fg_dummy_fg/com/example/mod/1.0/mod-1.0.jar
//! <root>/fg_dummy_fg/com/example/mod/1.0/mod-1.0-sources.jar
//! <root>/fg_dummy_fg/com/example/mod/1.0/ivy-1.0-fg3.xml
//! ```

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::artifact::ArtifactRef;
use crate::constants::{DEFAULT_EXTENSION, DEFAULT_REPOSITORY_DIR, DUMMY_GROUP_PREFIX, IVY_METADATA_VERSION};
use crate::core::ForgeGraphError;
use crate::project::{IvyRepositoryDeclaration, Project};
use crate::utils::atomic_write;

/// Name the repository is declared under.
pub const REPOSITORY_NAME: &str = "forgegraphDummyIvy";

/// A dependency declared by an entry's descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryDependency {
    /// Another synthetic entry
    Entry(Box<Entry>),
    /// A regular module
    Module {
        /// Coordinate
        reference: ArtifactRef,
        /// Whether its own dependencies are pulled in
        transitive: bool,
    },
}

/// A module published in the synthetic repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    group: String,
    name: String,
    version: String,
    classifier: Option<String>,
    extension: String,
    dependencies: Vec<EntryDependency>,
}

impl Entry {
    /// Start an entry builder.
    pub fn builder() -> EntryBuilder {
        EntryBuilder::default()
    }

    /// Group without the marker prefix.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Classifier.
    pub fn classifier(&self) -> Option<&str> {
        self.classifier.as_deref()
    }

    /// Extension.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Declared dependencies.
    pub fn dependencies(&self) -> &[EntryDependency] {
        &self.dependencies
    }

    /// Group including the marker prefix.
    pub fn full_group(&self) -> String {
        format!("{DUMMY_GROUP_PREFIX}{}", self.group)
    }

    /// Coordinate under which the entry resolves.
    pub fn reference(&self) -> ArtifactRef {
        let reference =
            ArtifactRef::new(self.full_group(), &self.name, &self.version).with_extension(&self.extension);
        match &self.classifier {
            Some(classifier) => reference.with_classifier(classifier),
            None => reference,
        }
    }

    /// The sources sibling of this entry.
    pub fn as_sources(&self) -> Entry {
        Entry {
            classifier: Some("sources".to_string()),
            extension: DEFAULT_EXTENSION.to_string(),
            ..self.clone()
        }
    }

    /// Directory holding the entry's files below `root`.
    pub fn directory(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.full_group().split('.') {
            path.push(segment);
        }
        path.join(&self.name).join(&self.version)
    }

    /// Placeholder artifact file below `root`.
    pub fn artifact_path(&self, root: &Path) -> PathBuf {
        self.directory(root).join(self.reference().file_name())
    }

    /// Descriptor file below `root`.
    pub fn descriptor_path(&self, root: &Path) -> PathBuf {
        self.directory(root).join(format!("ivy-{}-fg{IVY_METADATA_VERSION}.xml", self.version))
    }

    /// The Ivy descriptor XML.
    pub fn descriptor(&self) -> Result<String> {
        let artifact = |extension: &str, classifier: Option<&str>| IvyArtifact {
            name: self.name.clone(),
            kind: extension.to_string(),
            ext: extension.to_string(),
            classifier: classifier.map(str::to_string),
        };
        let module = IvyModule {
            version: "2.0",
            maven_namespace: MAVEN_NAMESPACE,
            info: IvyInfo {
                organisation: self.full_group(),
                module: self.name.clone(),
                revision: self.version.clone(),
                status: "release",
                default: true,
            },
            configurations: IvyConfigurations {
                conf: vec![IvyConf {
                    name: "default",
                    visibility: "public",
                }],
            },
            publications: IvyPublications {
                artifact: vec![
                    artifact(&self.extension, self.classifier.as_deref()),
                    artifact(DEFAULT_EXTENSION, Some("sources")),
                ],
            },
            dependencies: (!self.dependencies.is_empty()).then(|| IvyDependencies {
                dependency: self.dependencies.iter().map(IvyDependency::from).collect(),
            }),
        };

        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        let mut serializer = quick_xml::se::Serializer::new(&mut xml);
        serializer.indent(' ', 2);
        module
            .serialize(serializer)
            .with_context(|| format!("Failed to serialize the descriptor of {}", self.reference()))?;
        xml.push('\n');
        Ok(xml)
    }
}

const MAVEN_NAMESPACE: &str = "http://ant.apache.org/ivy/maven";

#[derive(Serialize)]
#[serde(rename = "ivy-module")]
struct IvyModule {
    #[serde(rename = "@version")]
    version: &'static str,
    #[serde(rename = "@xmlns:m")]
    maven_namespace: &'static str,
    info: IvyInfo,
    configurations: IvyConfigurations,
    publications: IvyPublications,
    #[serde(skip_serializing_if = "Option::is_none")]
    dependencies: Option<IvyDependencies>,
}

#[derive(Serialize)]
struct IvyInfo {
    #[serde(rename = "@organisation")]
    organisation: String,
    #[serde(rename = "@module")]
    module: String,
    #[serde(rename = "@revision")]
    revision: String,
    #[serde(rename = "@status")]
    status: &'static str,
    #[serde(rename = "@default")]
    default: bool,
}

#[derive(Serialize)]
struct IvyConfigurations {
    conf: Vec<IvyConf>,
}

#[derive(Serialize)]
struct IvyConf {
    #[serde(rename = "@name")]
    name: &'static str,
    #[serde(rename = "@visibility")]
    visibility: &'static str,
}

#[derive(Serialize)]
struct IvyPublications {
    artifact: Vec<IvyArtifact>,
}

#[derive(Serialize)]
struct IvyArtifact {
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@type")]
    kind: String,
    #[serde(rename = "@ext")]
    ext: String,
    #[serde(rename = "@m:classifier", skip_serializing_if = "Option::is_none")]
    classifier: Option<String>,
}

#[derive(Serialize)]
struct IvyDependencies {
    dependency: Vec<IvyDependency>,
}

#[derive(Serialize)]
struct IvyDependency {
    #[serde(rename = "@org")]
    org: String,
    #[serde(rename = "@name")]
    name: String,
    #[serde(rename = "@rev")]
    rev: String,
    #[serde(rename = "@transitive")]
    transitive: bool,
    #[serde(rename = "@conf")]
    conf: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<IvyArtifact>,
}

impl From<&EntryDependency> for IvyDependency {
    fn from(dependency: &EntryDependency) -> Self {
        let (reference, transitive) = match dependency {
            EntryDependency::Entry(entry) => (entry.reference(), false),
            EntryDependency::Module {
                reference,
                transitive,
            } => (reference.clone(), *transitive),
        };
        // Classified dependencies name the artifact explicitly
        let artifact = reference.classifier.as_ref().map(|classifier| IvyArtifact {
            name: reference.name.clone(),
            kind: reference.extension.clone(),
            ext: reference.extension.clone(),
            classifier: Some(classifier.clone()),
        });
        Self {
            org: reference.group,
            name: reference.name,
            rev: reference.version,
            transitive,
            conf: "default->default",
            artifact,
        }
    }
}

/// Builder for [`Entry`].
#[derive(Debug, Clone, Default)]
pub struct EntryBuilder {
    group: Option<String>,
    name: Option<String>,
    version: Option<String>,
    classifier: Option<String>,
    extension: Option<String>,
    dependencies: Vec<EntryDependency>,
}

impl EntryBuilder {
    /// Copy group, name, version, classifier and extension from `reference`.
    pub fn from_reference(&mut self, reference: &ArtifactRef) -> &mut Self {
        self.group = Some(reference.group.clone());
        self.name = Some(reference.name.clone());
        self.version = Some(reference.version.clone());
        self.classifier = reference.classifier.clone();
        self.extension = Some(reference.extension.clone());
        self
    }

    /// Group without marker prefix.
    pub fn group(&mut self, group: impl Into<String>) -> &mut Self {
        self.group = Some(group.into());
        self
    }

    /// Module name.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Version.
    pub fn version(&mut self, version: impl Into<String>) -> &mut Self {
        self.version = Some(version.into());
        self
    }

    /// Classifier.
    pub fn classifier(&mut self, classifier: impl Into<String>) -> &mut Self {
        self.classifier = Some(classifier.into()).filter(|classifier: &String| !classifier.is_empty());
        self
    }

    /// Extension, `jar` when unset.
    pub fn extension(&mut self, extension: impl Into<String>) -> &mut Self {
        self.extension = Some(extension.into());
        self
    }

    /// Declare a dependency on a regular module.
    pub fn with_module_dependency(&mut self, reference: ArtifactRef, transitive: bool) -> &mut Self {
        self.dependencies.push(EntryDependency::Module {
            reference,
            transitive,
        });
        self
    }

    /// Declare a dependency on an already built synthetic entry.
    pub fn with_entry_dependency(&mut self, entry: Entry) -> &mut Self {
        self.dependencies.push(EntryDependency::Entry(Box::new(entry)));
        self
    }

    /// Declare a dependency on another synthetic entry built by `configure`.
    pub fn with_dependency(&mut self, configure: impl FnOnce(&mut EntryBuilder)) -> Result<&mut Self> {
        let mut nested = EntryBuilder::default();
        configure(&mut nested);
        self.dependencies.push(EntryDependency::Entry(Box::new(nested.build()?)));
        Ok(self)
    }

    /// Freeze the builder.
    pub fn build(&self) -> Result<Entry> {
        let missing = |field: &str| ForgeGraphError::ConfigError {
            message: format!("Synthetic repository entry is missing its {field}"),
        };
        Ok(Entry {
            group: self.group.clone().ok_or_else(|| missing("group"))?,
            name: self.name.clone().ok_or_else(|| missing("name"))?,
            version: self.version.clone().ok_or_else(|| missing("version"))?,
            classifier: self.classifier.clone(),
            extension: self.extension.clone().unwrap_or_else(|| DEFAULT_EXTENSION.to_string()),
            dependencies: self.dependencies.clone(),
        })
    }
}

/// The private repository of one project.
#[derive(Debug, Clone)]
pub struct IvyDummyRepository {
    root: PathBuf,
    entries: IndexMap<ArtifactRef, Entry>,
}

impl IvyDummyRepository {
    /// A repository rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            entries: IndexMap::new(),
        }
    }

    /// A repository in the project's default location, `<build>/libs`.
    pub fn for_project(project: &Project) -> Self {
        Self::new(project.build_dir().join(DEFAULT_REPOSITORY_DIR))
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries requested so far, in request order.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    /// Declare the repository to the project.
    pub fn register(&self, project: &mut Project) {
        project.add_repository(IvyRepositoryDeclaration {
            name: REPOSITORY_NAME.to_string(),
            root: self.root.clone(),
            artifact_pattern: "[organisation]/[module]/[revision]/[module]-[revision](-[classifier]).[ext]"
                .to_string(),
            ivy_pattern: format!("[organisation]/[module]/[revision]/ivy-[revision]-fg{IVY_METADATA_VERSION}.xml"),
            m2_compatible: true,
        });
    }

    /// Build an entry, remember it and write its descriptor and placeholder
    /// files unless the descriptor already exists.
    pub fn with_dependency(&mut self, configure: impl FnOnce(&mut EntryBuilder)) -> Result<Entry> {
        let mut builder = EntryBuilder::default();
        configure(&mut builder);
        self.add(builder.build()?)
    }

    /// Remember `entry` and write its files unless its descriptor exists.
    pub fn add(&mut self, entry: Entry) -> Result<Entry> {
        self.publish(&entry)?;
        Ok(entry)
    }

    fn publish(&mut self, entry: &Entry) -> Result<()> {
        for dependency in entry.dependencies() {
            if let EntryDependency::Entry(nested) = dependency {
                self.publish(nested)?;
            }
        }
        self.entries.entry(entry.reference()).or_insert_with(|| entry.clone());

        let descriptor = entry.descriptor_path(&self.root);
        if descriptor.exists() {
            tracing::trace!("Descriptor {} already exists", descriptor.display());
            return Ok(());
        }

        let write_failed = || ForgeGraphError::RepositoryWriteFailed {
            coordinate: entry.reference().to_string(),
            path: descriptor.display().to_string(),
        };
        for placeholder in [entry.artifact_path(&self.root), entry.as_sources().artifact_path(&self.root)] {
            if !placeholder.exists() {
                atomic_write(&placeholder, &[]).with_context(write_failed)?;
            }
        }
        let xml = entry.descriptor()?;
        atomic_write(&descriptor, xml.as_bytes()).with_context(write_failed)?;
        tracing::debug!("Wrote synthetic descriptor for {}", entry.reference());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry() -> Entry {
        let mut builder = Entry::builder();
        builder.group("com.example").name("mod").version("1.0");
        builder.build().unwrap()
    }

    #[test]
    fn test_entry_layout() {
        let entry = entry();
        let root = Path::new("/build/libs");
        assert_eq!(entry.full_group(), "fg_dummy_fg.com.example");
        assert_eq!(entry.reference().to_string(), "fg_dummy_fg.com.example:mod:1.0");
        assert_eq!(entry.artifact_path(root), root.join("fg_dummy_fg/com/example/mod/1.0/mod-1.0.jar"));
        assert_eq!(entry.descriptor_path(root), root.join("fg_dummy_fg/com/example/mod/1.0/ivy-1.0-fg3.xml"));

        let sources = entry.as_sources();
        assert_eq!(sources.classifier(), Some("sources"));
        assert_eq!(sources.artifact_path(root), root.join("fg_dummy_fg/com/example/mod/1.0/mod-1.0-sources.jar"));
        assert_eq!(sources.descriptor_path(root), entry.descriptor_path(root));
    }

    #[test]
    fn test_descriptor_lists_dependencies() {
        let mut builder = Entry::builder();
        builder
            .from_reference(&ArtifactRef::new("com.example", "mod", "1.0"))
            .with_module_dependency(ArtifactRef::new("org.lib", "plain", "2.0"), true)
            .with_dependency(|nested| {
                nested.group("org.lib").name("obf").version("3.0");
            })
            .unwrap();
        let xml = builder.build().unwrap().descriptor().unwrap();

        assert!(xml.starts_with("<?xml"), "{xml}");
        assert!(xml.contains("<ivy-module version=\"2.0\""), "{xml}");
        assert!(xml.contains("organisation=\"fg_dummy_fg.com.example\""), "{xml}");
        assert!(xml.contains("<dependency org=\"org.lib\" name=\"plain\" rev=\"2.0\" transitive=\"true\""), "{xml}");
        assert!(xml.contains("<dependency org=\"fg_dummy_fg.org.lib\" name=\"obf\" rev=\"3.0\""), "{xml}");
        assert!(xml.contains("m:classifier=\"sources\""), "{xml}");
    }

    #[test]
    fn test_descriptor_escapes_attribute_values() {
        let mut builder = Entry::builder();
        builder.group("com.example").name("mod").version("1.0");
        builder.with_module_dependency(ArtifactRef::new("org.lib", "a&b", "1.0").with_classifier("x\"y"), true);
        let xml = builder.build().unwrap().descriptor().unwrap();
        assert!(xml.contains("name=\"a&amp;b\""), "{xml}");
        assert!(xml.contains("m:classifier=\"x&quot;y\""), "{xml}");
    }

    #[test]
    fn test_with_dependency_writes_once() {
        let temp = TempDir::new().unwrap();
        let mut repository = IvyDummyRepository::new(temp.path());

        let first = repository
            .with_dependency(|builder| {
                builder.group("com.example").name("mod").version("1.0");
            })
            .unwrap();
        let descriptor = first.descriptor_path(temp.path());
        assert!(descriptor.is_file());
        assert!(first.artifact_path(temp.path()).is_file());
        assert!(first.as_sources().artifact_path(temp.path()).is_file());

        std::fs::write(&descriptor, "sentinel").unwrap();
        let second = repository
            .with_dependency(|builder| {
                builder.group("com.example").name("mod").version("1.0");
            })
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&descriptor).unwrap(), "sentinel");
        assert_eq!(repository.entries().count(), 1);
    }

    #[test]
    fn test_nested_entries_are_published() {
        let temp = TempDir::new().unwrap();
        let mut repository = IvyDummyRepository::new(temp.path());
        let parent = repository
            .with_dependency(|builder| {
                builder.group("com.example").name("parent").version("1.0");
                builder
                    .with_dependency(|nested| {
                        nested.group("com.example").name("child").version("1.0");
                    })
                    .unwrap();
            })
            .unwrap();
        let EntryDependency::Entry(child) = &parent.dependencies()[0] else {
            panic!("expected a nested entry");
        };
        assert!(child.descriptor_path(temp.path()).is_file());
        assert_eq!(repository.entries().count(), 2);
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut builder = Entry::builder();
        builder.group("com.example");
        assert!(builder.build().is_err());
    }
}
