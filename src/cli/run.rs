//! `forgegraph run`

use anyhow::{Result, bail};
use clap::Args;
use colored::Colorize;
use std::sync::Arc;

use crate::build::Build;
use crate::config::ForgeGraphConfig;
use crate::game::DirectoryGameCache;
use crate::resolution::MavenLayoutRepository;
use crate::task::TaskId;
use crate::task::executor::{ExecutionServices, TaskExecutor};

/// Execute the requested outputs.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// What to build: `raw`, `sources`, `ide` or a task name
    ///
    /// May be repeated. Without targets, the raw and sources jars of every
    /// runtime and every dependency generator are built.
    #[arg(short, long = "target")]
    targets: Vec<String>,
}

impl RunCommand {
    pub async fn execute(self, (config, build): (ForgeGraphConfig, Build)) -> Result<()> {
        let targets = self.select(&build)?;
        if targets.is_empty() {
            println!("{}", "Nothing to do".yellow());
            return Ok(());
        }

        let services = ExecutionServices {
            tools: Arc::new(MavenLayoutRepository::new([config.tools_dir.clone()])),
            game_cache: Arc::new(DirectoryGameCache::new(config.cache_dir())),
            java: config.java.clone(),
        };
        let executor = TaskExecutor::new(services).with_parallelism(config.parallelism);
        let report = executor.execute(&build.project().graph, &targets).await?;

        println!(
            "{} {} executed, {} up to date",
            "Done:".green().bold(),
            report.executed.len(),
            report.up_to_date.len()
        );
        for name in &report.executed {
            println!("  {name}");
        }
        Ok(())
    }

    fn select(&self, build: &Build) -> Result<Vec<TaskId>> {
        let project = build.project();
        let definitions: Vec<_> = build.runtimes().definitions().cloned().collect();
        let mut targets = Vec::new();

        if self.targets.is_empty() {
            for definition in &definitions {
                targets.push(definition.raw_jar());
                targets.push(definition.sources_jar());
            }
            targets.extend(
                project.configurations().filter_map(|configuration| build.replacement().generator(configuration.name())),
            );
            return Ok(targets);
        }

        for target in &self.targets {
            match target.as_str() {
                "raw" => targets.extend(definitions.iter().map(|definition| definition.raw_jar())),
                "sources" => targets.extend(definitions.iter().map(|definition| definition.sources_jar())),
                "ide" => targets.extend(project.ide_sync_tasks()),
                name => targets.push(project.graph.get(name)?),
            }
        }
        if targets.is_empty() {
            bail!("The requested targets {:?} select no tasks", self.targets);
        }
        Ok(targets)
    }
}
