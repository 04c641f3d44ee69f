//! The step manifest shipped inside a runtime archive.
//!
//! A runtime archive is a zip with a `config.json` at its root describing the
//! steps per side, the functions (external tools) used by custom step types,
//! the data files the steps read and the libraries the game needs.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;

use crate::artifact::ArtifactRef;
use crate::constants::RUNTIME_CONFIG_FILE;
use crate::core::{DistributionType, ForgeGraphError};
use crate::utils::ensure_dir;

/// Parsed `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Manifest format version
    pub spec: u32,
    /// Game version the manifest targets
    pub version: String,
    /// Whether official mappings are used
    #[serde(default)]
    pub official: bool,
    /// Java release the game targets
    #[serde(default)]
    pub java_target: Option<u32>,
    /// Source encoding
    #[serde(default)]
    pub encoding: Option<String>,
    /// Data files by logical name
    #[serde(default)]
    pub data: IndexMap<String, DataEntry>,
    /// Steps by side
    pub steps: IndexMap<String, Vec<StepConfig>>,
    /// Tool invocations by step type
    #[serde(default)]
    pub functions: IndexMap<String, FunctionConfig>,
    /// Game libraries by side
    #[serde(default)]
    pub libraries: IndexMap<String, Vec<ArtifactRef>>,
}

/// A data entry: one path for every side, or one path per side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DataEntry {
    /// Shared by all sides
    Path(String),
    /// Keyed by side name
    BySide(IndexMap<String, String>),
}

/// A step declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StepConfig {
    /// Type tag selecting the builder
    #[serde(rename = "type")]
    pub step_type: String,
    /// Name, defaults to the type
    #[serde(default)]
    pub name: Option<String>,
    /// Argument templates
    #[serde(flatten)]
    pub values: IndexMap<String, String>,
}

impl StepConfig {
    /// A step of `step_type` named after its type.
    pub fn new(step_type: impl Into<String>) -> Self {
        Self {
            step_type: step_type.into(),
            name: None,
            values: IndexMap::new(),
        }
    }

    /// Give the step an explicit name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an argument template.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Step name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.step_type)
    }
}

/// An external tool invoked by custom step types.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionConfig {
    /// Executable jar coordinate
    pub version: ArtifactRef,
    /// Program argument templates
    #[serde(default)]
    pub args: Vec<String>,
    /// JVM arguments
    #[serde(default)]
    pub jvmargs: Vec<String>,
    /// Repository the tool is published to
    #[serde(default)]
    pub repo: Option<String>,
}

impl RuntimeConfig {
    /// Parse a manifest from JSON text.
    pub fn parse(content: &str, origin: &Path) -> Result<Self> {
        serde_json::from_str(content).map_err(|error| {
            ForgeGraphError::ManifestParseError {
                file: origin.display().to_string(),
                reason: error.to_string(),
            }
            .into()
        })
    }

    /// Read `config.json` from an unpacked runtime directory.
    pub fn load(unpacked_dir: &Path) -> Result<Self> {
        let path = unpacked_dir.join(RUNTIME_CONFIG_FILE);
        let content = std::fs::read_to_string(&path).map_err(|error| ForgeGraphError::ManifestParseError {
            file: path.display().to_string(),
            reason: error.to_string(),
        })?;
        Self::parse(&content, &path)
    }

    /// Steps declared for `side`, falling back to the joined list.
    pub fn steps_for(&self, side: DistributionType) -> Result<&[StepConfig]> {
        self.steps
            .get(side.name())
            .or_else(|| self.steps.get(DistributionType::Joined.name()))
            .map(Vec::as_slice)
            .ok_or_else(|| {
                ForgeGraphError::ManifestParseError {
                    file: RUNTIME_CONFIG_FILE.to_string(),
                    reason: format!("no steps declared for side '{side}'"),
                }
                .into()
            })
    }

    /// Relative path of data entry `name` for `side`.
    pub fn data_path(&self, name: &str, side: DistributionType) -> Option<&str> {
        match self.data.get(name)? {
            DataEntry::Path(path) => Some(path),
            DataEntry::BySide(paths) => paths
                .get(side.name())
                .or_else(|| paths.get(DistributionType::Joined.name()))
                .map(String::as_str),
        }
    }

    /// Check that every data entry declared for `side` exists below
    /// `unpacked_dir`. Paths ending in `/` must be directories.
    pub fn verify_data(&self, unpacked_dir: &Path, side: DistributionType) -> Result<()> {
        for name in self.data.keys() {
            let Some(path) = self.data_path(name, side) else {
                continue;
            };
            let location = unpacked_dir.join(path);
            let present = if path.ends_with('/') {
                location.is_dir()
            } else {
                location.is_file()
            };
            if !present {
                return Err(ForgeGraphError::MissingDataFile {
                    name: name.clone(),
                    path: path.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Libraries needed on `side`.
    pub fn libraries_for(&self, side: DistributionType) -> Vec<ArtifactRef> {
        let mut libraries: Vec<ArtifactRef> =
            self.libraries.get(side.name()).cloned().unwrap_or_default();
        if side == DistributionType::Joined {
            for extra in [DistributionType::Client, DistributionType::Server] {
                for library in self.libraries.get(extra.name()).into_iter().flatten() {
                    if !libraries.contains(library) {
                        libraries.push(library.clone());
                    }
                }
            }
        }
        libraries
    }
}

/// Extract a runtime archive into `destination` and parse its manifest.
pub fn unpack_runtime(archive: &Path, destination: &Path) -> Result<RuntimeConfig> {
    ensure_dir(destination)?;
    let file = File::open(archive)
        .with_context(|| format!("Failed to open runtime archive {}", archive.display()))?;
    let mut zip = zip::ZipArchive::new(file)
        .with_context(|| format!("Runtime archive {} is not a zip file", archive.display()))?;
    zip.extract(destination)
        .with_context(|| format!("Failed to unpack {} into {}", archive.display(), destination.display()))?;
    tracing::debug!("Unpacked runtime archive {} into {}", archive.display(), destination.display());

    RuntimeConfig::load(destination)
}
