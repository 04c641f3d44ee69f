//! `forgegraph plan`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::build::Build;
use crate::config::ForgeGraphConfig;
use crate::project::Dependency;
use crate::task::TaskGraph;

/// Print the wired pipeline.
#[derive(Args, Debug)]
pub struct PlanCommand {
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct PlanReport {
    runtimes: Vec<RuntimeReport>,
    configurations: Vec<ConfigurationReport>,
}

#[derive(Debug, Serialize)]
struct RuntimeReport {
    identifier: String,
    source: String,
    steps: Vec<StepReport>,
    raw: Option<String>,
    sources: Option<String>,
}

#[derive(Debug, Serialize)]
struct StepReport {
    name: String,
    task: String,
    depends_on: Vec<String>,
}

#[derive(Debug, Serialize)]
struct ConfigurationReport {
    name: String,
    dependencies: Vec<String>,
    replaced: Vec<ReplacedReport>,
}

#[derive(Debug, Serialize)]
struct ReplacedReport {
    original: String,
    handler: String,
    raw: String,
}

impl PlanCommand {
    pub fn execute(self, (_config, build): (ForgeGraphConfig, Build)) -> Result<()> {
        let report = collect(&build);
        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_text(&report);
        }
        Ok(())
    }
}

fn collect(build: &Build) -> PlanReport {
    let graph = &build.project().graph;
    let runtimes = build
        .runtimes()
        .definitions()
        .map(|definition| {
            let baked = definition.baked();
            let steps: Vec<StepReport> = baked
                .map(|baked| {
                    baked
                        .steps
                        .iter()
                        .map(|(name, &task)| StepReport {
                            name: name.clone(),
                            task: graph.name(task).to_string(),
                            depends_on: graph.dependencies(task).map(|id| graph.name(id).to_string()).collect(),
                        })
                        .collect()
                })
                .unwrap_or_default();
            RuntimeReport {
                identifier: definition.identifier().to_string(),
                source: definition.specification().source().to_string(),
                steps,
                raw: baked.map(|baked| graph.name(baked.raw).to_string()),
                sources: baked.map(|baked| graph.name(baked.sources).to_string()),
            }
        })
        .collect();

    let configurations = build
        .project()
        .configurations()
        .map(|configuration| ConfigurationReport {
            name: configuration.name().to_string(),
            dependencies: configuration.dependencies().iter().map(|dependency| render(graph, dependency)).collect(),
            replaced: build
                .replacement()
                .replacements(configuration.name())
                .iter()
                .map(|replacement| ReplacedReport {
                    original: replacement.original.to_string(),
                    handler: replacement.handler.clone(),
                    raw: graph
                        .resolve(replacement.result.raw())
                        .map(|task| graph.name(task).to_string())
                        .unwrap_or_else(|_| graph.name(replacement.result.raw()).to_string()),
                })
                .collect(),
        })
        .collect();

    PlanReport {
        runtimes,
        configurations,
    }
}

fn render(graph: &TaskGraph, dependency: &Dependency) -> String {
    match dependency {
        Dependency::TaskOutput(task) => format!("output of {}", graph.name(*task)),
        other => other.to_string(),
    }
}

fn print_text(report: &PlanReport) {
    if report.runtimes.is_empty() {
        println!("{}", "No runtime configured".yellow());
    }
    for runtime in &report.runtimes {
        println!("{} {}", runtime.identifier.bold().green(), format!("({})", runtime.source).dimmed());
        for step in &runtime.steps {
            println!("  {} {}", format!("{}:", step.name).cyan(), step.task);
            if !step.depends_on.is_empty() {
                println!("      depends on {}", step.depends_on.join(", "));
            }
        }
        if let (Some(raw), Some(sources)) = (&runtime.raw, &runtime.sources) {
            println!("  raw jar:     {raw}");
            println!("  sources jar: {sources}");
        }
    }

    for configuration in &report.configurations {
        println!("\n{}", configuration.name.bold());
        for dependency in &configuration.dependencies {
            println!("  {dependency}");
        }
        for replaced in &configuration.replaced {
            println!(
                "  {} {} {} ({})",
                replaced.original.red(),
                "->".dimmed(),
                replaced.raw.green(),
                replaced.handler
            );
        }
    }
}
