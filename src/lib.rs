//! forgegraph - runtime pipelines and dependency replacement for Minecraft development
//!
//! forgegraph turns the obfuscated game jar into usable development artifacts.
//! It builds task graphs from declarative step manifests and swaps obfuscated
//! dependencies for deobfuscated ones generated on demand.
//!
//! # Architecture Overview
//!
//! Configuration is explicit and happens in two phases:
//!
//! - **Registration**: runtimes are registered from a [`runtime::RuntimeSpecification`]
//!   and dependencies are added to configurations. Replaced dependencies point
//!   at placeholder tasks right away.
//! - **Finalization**: [`build::Build::finalize_configuration`] bakes every
//!   runtime into a chain of tasks and wires the deferred deobfuscation tasks
//!   onto their placeholders.
//!
//! The resulting [`task::TaskGraph`] is executed by [`task::TaskExecutor`].
//!
//! # Core Modules
//!
//! ## Pipeline construction
//! - [`runtime`] - Specifications, memoized definitions, the step engine and tree adapters
//! - [`task`] - Task graph arena, lazy providers, argument templates and the executor
//! - [`game`] - Game artifact tasks and their cache
//! - [`mappings`] - Mapping channels registering remapping tasks
//!
//! ## Dependency replacement
//! - [`replacement`] - Ordered replacement handlers and the deobfuscator
//! - [`repository`] - The synthetic Ivy repository used for IDE imports
//! - [`resolution`] - Tool and dependency resolution collaborators
//!
//! ## Host and surface
//! - [`project`] - Project, configurations and dependencies
//! - [`build`] - The orchestrator owning one configuration run
//! - [`config`] - `forgegraph.toml`
//! - [`cli`] - Command-line interface
//!
//! ## Supporting Modules
//! - [`artifact`] - Dependency coordinates
//! - [`core`] - Error types and user-facing error rendering
//! - [`constants`] - Shared constants
//! - [`utils`] - File system helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use forgegraph::build::Build;
//! use forgegraph::config::ForgeGraphConfig;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ForgeGraphConfig::load(None).await?;
//! let mut build = Build::from_config("demo", &config)?;
//! build.finalize_configuration()?;
//! for definition in build.runtimes().definitions() {
//!     println!("{}", build.project().graph.describe(definition.sources_jar()));
//! }
//! # Ok(())
//! # }
//! ```

// Pipeline construction
pub mod game;
pub mod mappings;
pub mod runtime;
pub mod task;

// Dependency replacement
pub mod replacement;
pub mod repository;
pub mod resolution;

// Host and surface
pub mod build;
pub mod cli;
pub mod config;
pub mod project;

// Supporting modules
pub mod artifact;
pub mod constants;
pub mod core;
pub mod utils;

// Test utilities (available in tests and with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
