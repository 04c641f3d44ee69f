//! Runtime pipelines.
//!
//! A runtime turns the obfuscated game jar into a raw (renamed, compiled) jar
//! and a sources jar by running the steps listed in the manifest of a runtime
//! archive. This module is organised in the order a runtime comes to life:
//!
//! - [`RuntimeSpecification`] is built by a configurator and identifies the
//!   pipeline: game version, side, extra libraries and tree adapters
//! - [`RuntimeExtension::register_or_get`] memoizes one [`RuntimeDefinition`]
//!   per specification, unpacks the archive and registers the two output
//!   placeholders
//! - [`RuntimeExtension::bake`] runs the step engine ([`bake`]) once, building
//!   one task per step through the [`StepRegistry`] and splicing in the
//!   [`TreeAdapter`]s registered around each step
//!
//! # Example
//!
//! ```rust,no_run
//! use forgegraph::project::Project;
//! use forgegraph::resolution::MavenLayoutRepository;
//! use forgegraph::runtime::RuntimeExtension;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut project = Project::new("demo", ".");
//! let tools = Arc::new(MavenLayoutRepository::new(["tools".into()]));
//! let mut runtimes = RuntimeExtension::new(tools);
//!
//! let definition = runtimes.register_or_get(&mut project, |builder| {
//!     builder.source("net.neoforged:neoform:1.20.1-20230612.114412@zip".parse().unwrap());
//! })?;
//! runtimes.bake(&mut project, &definition)?;
//! println!("{}", project.graph.describe(definition.sources_jar()));
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod bake;
pub mod config;
pub mod definition;
pub mod extension;
pub mod specification;
pub mod steps;

pub use adapter::{AdapterContext, AdapterRef, AndThen, ToolAdapter, TreeAdapter, TreeAdapterExt};
pub use config::{DataEntry, FunctionConfig, RuntimeConfig, StepConfig};
pub use definition::{BakedPipeline, RuntimeDefinition};
pub use extension::RuntimeExtension;
pub use specification::{RuntimeSpecification, RuntimeSpecificationBuilder};
pub use steps::{StepBuilder, StepContext, StepRegistry, StepValue};
