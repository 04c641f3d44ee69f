//! Command-line interface for forgegraph.
//!
//! # Available Commands
//!
//! - `plan` - Configure the build and print the wired pipeline
//! - `run` - Configure the build and execute the requested outputs
//! - `coordinate` - Parse a dependency notation and print its canonical form
//!
//! # Global Options
//!
//! - `--verbose` / `-v` - Debug logging
//! - `--quiet` / `-q` - Warnings and errors only
//! - `--config` / `-c` - Path to `forgegraph.toml`
//!
//! `RUST_LOG` always wins over the verbosity flags.
//!
//! # Examples
//!
//! ```bash
//! forgegraph plan
//! forgegraph --verbose run --target sources
//! forgegraph coordinate net.minecraft:client:1.20.1
//! ```

mod coordinate;
mod plan;
mod run;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::build::Build;
use crate::config::ForgeGraphConfig;

/// Main CLI application structure for forgegraph.
#[derive(Parser, Debug)]
#[command(
    name = "forgegraph",
    about = "Build Minecraft runtime pipelines and replace obfuscated dependencies",
    version,
    long_about = "forgegraph turns a runtime archive's step manifest into a wired task graph, \
                  replaces obfuscated dependencies with deobfuscated ones and executes the result."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    ///
    /// Defaults to `$FORGEGRAPH_CONFIG`, then `./forgegraph.toml`.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configure the build and print the wired pipeline.
    Plan(plan::PlanCommand),

    /// Configure the build and execute the requested outputs.
    Run(run::RunCommand),

    /// Parse a dependency notation and print its canonical form.
    Coordinate(coordinate::CoordinateCommand),
}

impl Cli {
    /// Install logging and run the selected command.
    pub async fn execute(self) -> Result<()> {
        init_logging(self.log_level());

        match self.command {
            Commands::Plan(cmd) => cmd.execute(load_build(self.config).await?),
            Commands::Run(cmd) => cmd.execute(load_build(self.config).await?).await,
            Commands::Coordinate(cmd) => cmd.execute(),
        }
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "forgegraph=debug"
        } else if self.quiet {
            "warn"
        } else {
            "forgegraph=info"
        }
    }
}

async fn load_build(config: Option<PathBuf>) -> Result<(ForgeGraphConfig, Build)> {
    let config = ForgeGraphConfig::load(config).await?;
    let mut build = Build::from_config("forgegraph", &config)?;
    build.finalize_configuration()?;
    Ok((config, build))
}

/// Install the global subscriber. `RUST_LOG` overrides `default_filter`.
fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
