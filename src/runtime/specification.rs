//! Runtime specifications: the identity of a pipeline.
//!
//! A [`RuntimeSpecification`] captures every input that determines which task
//! graph a runtime produces. Two equal specifications always share one
//! [`RuntimeDefinition`](super::RuntimeDefinition).

use anyhow::Result;
use indexmap::IndexMap;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use super::adapter::AdapterRef;
use crate::artifact::{ArtifactRef, camel_case};
use crate::constants::DEFAULT_RAW_STEP;
use crate::core::{DistributionType, ForgeGraphError};

/// Adapters keyed by step name, in registration order per step.
pub type AdapterMap = IndexMap<String, Vec<AdapterRef>>;

/// Immutable description of a runtime pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSpecification {
    identifier: String,
    name: String,
    source: ArtifactRef,
    game_version: String,
    side: DistributionType,
    additional_dependencies: Vec<PathBuf>,
    pre_adapters: AdapterMap,
    post_adapters: AdapterMap,
    raw_step: String,
}

impl RuntimeSpecification {
    /// Start an empty builder.
    pub fn builder() -> RuntimeSpecificationBuilder {
        RuntimeSpecificationBuilder::default()
    }

    /// Derived identifier, e.g. `neoFormJoined1201`.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Family name of the runtime.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Coordinate of the runtime archive holding the step manifest.
    pub fn source(&self) -> &ArtifactRef {
        &self.source
    }

    /// Game version the pipeline is built for.
    pub fn game_version(&self) -> &str {
        &self.game_version
    }

    /// Distribution side.
    pub fn side(&self) -> DistributionType {
        self.side
    }

    /// Extra files placed on the library list.
    pub fn additional_dependencies(&self) -> &[PathBuf] {
        &self.additional_dependencies
    }

    /// Adapters run before the named step.
    pub fn pre_adapters(&self, step: &str) -> &[AdapterRef] {
        self.pre_adapters.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    /// Adapters run after the named step.
    pub fn post_adapters(&self, step: &str) -> &[AdapterRef] {
        self.post_adapters.get(step).map(Vec::as_slice).unwrap_or_default()
    }

    /// Step whose output is the raw jar.
    pub fn raw_step(&self) -> &str {
        &self.raw_step
    }
}

impl Hash for RuntimeSpecification {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
        self.source.hash(state);
        self.game_version.hash(state);
        self.side.hash(state);
        self.additional_dependencies.hash(state);
        self.raw_step.hash(state);
        // Map iteration order is irrelevant to equality, so only the
        // per-step adapter lists contribute in a fixed key order.
        for adapters in [&self.pre_adapters, &self.post_adapters] {
            let mut keys: Vec<&String> = adapters.keys().collect();
            keys.sort();
            for key in keys {
                key.hash(state);
                adapters[key].hash(state);
            }
        }
    }
}

/// Builder applied by the configurator passed to
/// [`RuntimeExtension::register_or_get`](super::RuntimeExtension::register_or_get).
#[derive(Debug, Clone)]
pub struct RuntimeSpecificationBuilder {
    name: String,
    source: Option<ArtifactRef>,
    game_version: Option<String>,
    side: DistributionType,
    additional_dependencies: Vec<PathBuf>,
    pre_adapters: AdapterMap,
    post_adapters: AdapterMap,
    raw_step: String,
}

impl Default for RuntimeSpecificationBuilder {
    fn default() -> Self {
        Self {
            name: "neoForm".to_string(),
            source: None,
            game_version: None,
            side: DistributionType::Joined,
            additional_dependencies: Vec::new(),
            pre_adapters: AdapterMap::new(),
            post_adapters: AdapterMap::new(),
            raw_step: DEFAULT_RAW_STEP.to_string(),
        }
    }
}

impl RuntimeSpecificationBuilder {
    /// Runtime family name used as identifier prefix.
    pub fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = name.into();
        self
    }

    /// Coordinate of the runtime archive.
    pub fn source(&mut self, source: ArtifactRef) -> &mut Self {
        self.source = Some(source);
        self
    }

    /// Game version; defaults to the archive version up to its first `-`.
    pub fn game_version(&mut self, version: impl Into<String>) -> &mut Self {
        self.game_version = Some(version.into());
        self
    }

    /// Distribution side.
    pub fn side(&mut self, side: DistributionType) -> &mut Self {
        self.side = side;
        self
    }

    /// Add an extra library file.
    pub fn with_additional_dependency(&mut self, file: impl Into<PathBuf>) -> &mut Self {
        self.additional_dependencies.push(file.into());
        self
    }

    /// Run `adapter` before `step`, after any adapters already registered there.
    pub fn with_pre_adapter(&mut self, step: impl Into<String>, adapter: AdapterRef) -> &mut Self {
        self.pre_adapters.entry(step.into()).or_default().push(adapter);
        self
    }

    /// Run `adapter` after `step`, after any adapters already registered there.
    pub fn with_post_adapter(&mut self, step: impl Into<String>, adapter: AdapterRef) -> &mut Self {
        self.post_adapters.entry(step.into()).or_default().push(adapter);
        self
    }

    /// Step whose output is exposed as the raw jar.
    pub fn raw_step(&mut self, step: impl Into<String>) -> &mut Self {
        self.raw_step = step.into();
        self
    }

    /// Freeze the builder.
    pub fn build(&self) -> Result<RuntimeSpecification> {
        let Some(source) = self.source.clone() else {
            return Err(ForgeGraphError::ConfigError {
                message: format!("Runtime '{}' does not declare a source archive", self.name),
            }
            .into());
        };
        if self.name.trim().is_empty() {
            return Err(ForgeGraphError::ConfigError {
                message: format!("Runtime built from {source} has an empty name"),
            }
            .into());
        }

        let game_version = match &self.game_version {
            Some(version) => version.clone(),
            None => source.version.split('-').next().unwrap_or_default().to_string(),
        };
        if game_version.is_empty() {
            return Err(ForgeGraphError::MissingDependencyVersion {
                notation: source.to_string(),
            }
            .into());
        }

        let identifier = camel_case(&format!("{} {} {}", self.name, self.side.name(), game_version));
        Ok(RuntimeSpecification {
            identifier,
            name: self.name.clone(),
            source,
            game_version,
            side: self.side,
            additional_dependencies: self.additional_dependencies.clone(),
            pre_adapters: self.pre_adapters.clone(),
            post_adapters: self.post_adapters.clone(),
            raw_step: self.raw_step.clone(),
        })
    }
}
