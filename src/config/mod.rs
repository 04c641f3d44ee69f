//! Project configuration (`forgegraph.toml`).
//!
//! The configuration tells the CLI which runtime to build, which mapping
//! channel to apply to obfuscated dependencies and which dependencies to
//! declare. Every field has a default, so an empty file (or no file at all)
//! is a valid configuration.
//!
//! # Location
//!
//! The file is looked up in this order:
//!
//! 1. the `--config` command line flag
//! 2. the `FORGEGRAPH_CONFIG` environment variable
//! 3. `forgegraph.toml` in the working directory
//!
//! A missing file yields [`ForgeGraphConfig::default`].
//!
//! # Format
//!
//! ```toml
//! build_dir = "build"
//! cache_dir = "~/.cache/forgegraph"
//! tools_dir = "tools"
//! java = "java"
//! parallelism = 4
//! ide_import = false
//!
//! [runtime]
//! source = "net.neoforged:neoform:1.20.1-20230612.114412@zip"
//! side = "joined"
//! raw_step = "rename"
//!
//! [mappings]
//! channel = "official"
//! version = { version = "1.20.1" }
//!
//! [mappings.remap_compiled]
//! tool = "net.neoforged:AutoRenamingTool:2.0.3:all"
//! args = ["--input", "{input}", "--output", "{output}", "--names", "{mappings}"]
//!
//! [deobfuscation]
//! force = false
//!
//! [[dependencies]]
//! configuration = "implementation"
//! notation = "com.example:mod:1.0"
//! ```
//!
//! Relative paths are resolved against the directory containing the file
//! (see [`ForgeGraphConfig::resolve_paths`]).

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::artifact::ArtifactRef;
use crate::constants::{CONFIG_ENV_VAR, CONFIG_FILE_NAME, DEFAULT_PARALLELISM, DEFAULT_RAW_STEP};
use crate::core::{DistributionType, ForgeGraphError};
use crate::mappings::ToolMappingChannel;
use crate::task::ToolTemplate;

/// The whole configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeGraphConfig {
    /// Directory every generated file is written to
    pub build_dir: PathBuf,
    /// Cache of downloaded game artifacts, `dirs::cache_dir()/forgegraph` when unset
    pub cache_dir: Option<PathBuf>,
    /// Maven-layout repository holding tools, libraries and runtime archives
    pub tools_dir: PathBuf,
    /// Java executable used to run tools
    pub java: PathBuf,
    /// Number of tasks executed concurrently
    pub parallelism: usize,
    /// Whether this run is an IDE import
    pub ide_import: bool,
    /// The runtime to build
    pub runtime: Option<RuntimeSection>,
    /// Mapping channel used for deobfuscation
    pub mappings: MappingsSection,
    /// Deobfuscation settings
    pub deobfuscation: DeobfuscationSection,
    /// Dependencies to declare
    pub dependencies: Vec<DependencyDeclaration>,
}

impl Default for ForgeGraphConfig {
    fn default() -> Self {
        Self {
            build_dir: PathBuf::from("build"),
            cache_dir: None,
            tools_dir: PathBuf::from("tools"),
            java: PathBuf::from("java"),
            parallelism: DEFAULT_PARALLELISM,
            ide_import: false,
            runtime: None,
            mappings: MappingsSection::default(),
            deobfuscation: DeobfuscationSection::default(),
            dependencies: Vec::new(),
        }
    }
}

/// `[runtime]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSection {
    /// Runtime archive coordinate
    pub source: ArtifactRef,
    /// Runtime family name
    #[serde(default)]
    pub name: Option<String>,
    /// Distribution side
    #[serde(default = "default_side")]
    pub side: DistributionType,
    /// Game version, derived from the archive version when unset
    #[serde(default)]
    pub game_version: Option<String>,
    /// Step whose output is the raw jar
    #[serde(default = "default_raw_step")]
    pub raw_step: String,
    /// Extra library files
    #[serde(default)]
    pub additional_dependencies: Vec<PathBuf>,
}

fn default_side() -> DistributionType {
    DistributionType::Joined
}

fn default_raw_step() -> String {
    DEFAULT_RAW_STEP.to_string()
}

/// `[mappings]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingsSection {
    /// Channel name
    pub channel: String,
    /// Extra mapping version data, merged over the runtime's
    pub version: IndexMap<String, String>,
    /// Tool renaming compiled jars
    pub remap_compiled: Option<ToolTemplate>,
    /// Tool renaming sources jars
    pub remap_sources: Option<ToolTemplate>,
    /// Tool writing debugging mappings
    pub debug: Option<ToolTemplate>,
}

impl Default for MappingsSection {
    fn default() -> Self {
        Self {
            channel: "official".to_string(),
            version: IndexMap::new(),
            remap_compiled: None,
            remap_sources: None,
            debug: None,
        }
    }
}

impl MappingsSection {
    /// The configured channel: the official tools with any overrides applied.
    pub fn channel(&self) -> ToolMappingChannel {
        let official = ToolMappingChannel::official();
        let mut channel = ToolMappingChannel::new(
            self.channel.clone(),
            official.compiled().clone(),
            official.sources().clone(),
            official.debugging().clone(),
        );
        if let Some(template) = &self.remap_compiled {
            channel = channel.with_compiled(template.clone());
        }
        if let Some(template) = &self.remap_sources {
            channel = channel.with_sources(template.clone());
        }
        if let Some(template) = &self.debug {
            channel = channel.with_debugging(template.clone());
        }
        channel
    }
}

/// `[deobfuscation]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeobfuscationSection {
    /// Decompiler used when no sources are published
    pub decompiler: Option<ToolTemplate>,
    /// Deobfuscate regardless of manifest markers
    pub force: bool,
}

/// `[[dependencies]]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    /// Configuration the dependency is added to
    #[serde(default = "default_configuration")]
    pub configuration: String,
    /// Coordinate
    pub notation: ArtifactRef,
}

fn default_configuration() -> String {
    "implementation".to_string()
}

impl ForgeGraphConfig {
    /// Load from `explicit`, the environment override or the working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a file exists but cannot be read or parsed.
    pub async fn load(explicit: Option<PathBuf>) -> Result<Self> {
        let path = Self::locate(explicit);
        if path.exists() {
            Self::load_from(&path).await
        } else {
            tracing::debug!("No configuration at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// The configuration path that [`load`](Self::load) reads.
    pub fn locate(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load from a specific file and resolve its relative paths.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use forgegraph::config::ForgeGraphConfig;
    /// use std::path::Path;
    ///
    /// # async fn example() -> anyhow::Result<()> {
    /// let config = ForgeGraphConfig::load_from(Path::new("forgegraph.toml")).await?;
    /// println!("building into {}", config.build_dir.display());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Failed to parse configuration from {}", path.display()))?;
        let base = path.parent().filter(|parent| !parent.as_os_str().is_empty()).unwrap_or(Path::new("."));
        Ok(config.resolve_paths(base))
    }

    /// Parse TOML text and validate it.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(ForgeGraphError::from)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(ForgeGraphError::ConfigError {
                message: "parallelism must be at least 1".to_string(),
            }
            .into());
        }
        if self.mappings.channel.trim().is_empty() {
            return Err(ForgeGraphError::ConfigError {
                message: "mappings.channel must not be empty".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Make relative paths absolute against `base` and expand `~/`.
    #[must_use]
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |path: &Path| -> PathBuf {
            let expanded = expand_home(path);
            if expanded.is_absolute() { expanded } else { base.join(expanded) }
        };
        self.build_dir = resolve(&self.build_dir);
        self.tools_dir = resolve(&self.tools_dir);
        self.cache_dir = self.cache_dir.as_deref().map(resolve);
        if let Some(runtime) = &mut self.runtime {
            runtime.additional_dependencies = runtime.additional_dependencies.iter().map(|path| resolve(path)).collect();
        }
        self
    }

    /// The game artifact cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir().unwrap_or_else(std::env::temp_dir).join("forgegraph")
        })
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
