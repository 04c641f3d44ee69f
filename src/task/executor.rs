//! Executes a wired task graph.
//!
//! The schedule for the requested targets is split into dependency levels.
//! Tasks of one level run concurrently on the blocking pool, at most
//! `parallelism` at a time; the next level starts once the whole level
//! succeeded. The first failure aborts the run.
//!
//! Each task with an output stores a fingerprint next to it (see
//! [`crate::utils::fs::fingerprint_path`]) covering its action and the
//! contents of its input files. A task whose output exists with a matching
//! fingerprint is reported as up to date and not run again.

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use super::{TaskAction, TaskGraph, TaskId};
use crate::artifact::ArtifactRef;
use crate::constants::DEFAULT_PARALLELISM;
use crate::core::ForgeGraphError;
use crate::game::{GameArtifact, GameArtifactCache};
use crate::resolution::ToolResolver;
use crate::utils::fs::fingerprint_path;
use crate::utils::{atomic_copy, atomic_write, calculate_checksum, ensure_parent_dir};

/// Collaborators the executor delegates to.
pub struct ExecutionServices {
    /// Resolves tool and library coordinates to files
    pub tools: Arc<dyn ToolResolver>,
    /// Provides game artifacts
    pub game_cache: Arc<dyn GameArtifactCache>,
    /// Java executable used for tool invocations
    pub java: PathBuf,
}

/// What happened to the tasks of a run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExecutionReport {
    /// Tasks whose action ran
    pub executed: Vec<String>,
    /// Tasks skipped because their fingerprint matched
    pub up_to_date: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Executed,
    UpToDate,
    Trivial,
}

/// Runs schedules of a [`TaskGraph`].
pub struct TaskExecutor {
    services: Arc<ExecutionServices>,
    parallelism: usize,
}

impl TaskExecutor {
    /// Executor with the default parallelism.
    pub fn new(services: ExecutionServices) -> Self {
        Self {
            services: Arc::new(services),
            parallelism: DEFAULT_PARALLELISM,
        }
    }

    /// Limit the number of concurrently running tasks (at least one).
    #[must_use]
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Execute everything needed for `targets`.
    pub async fn execute(&self, graph: &TaskGraph, targets: &[TaskId]) -> Result<ExecutionReport> {
        let levels = graph.schedule_levels(targets)?;
        let mut report = ExecutionReport::default();

        for level in levels {
            let prepared = level
                .iter()
                .map(|&task| PreparedTask::prepare(graph, task))
                .collect::<Result<Vec<_>>>()?;

            let outcomes: Vec<(String, Outcome)> = stream::iter(prepared)
                .map(|task| {
                    let services = Arc::clone(&self.services);
                    async move {
                        let name = task.name.clone();
                        tokio::task::spawn_blocking(move || task.run(&services))
                            .await
                            .with_context(|| format!("Task '{name}' panicked"))?
                    }
                })
                .buffer_unordered(self.parallelism)
                .try_collect()
                .await?;

            for (name, outcome) in outcomes {
                match outcome {
                    Outcome::Executed => report.executed.push(name),
                    Outcome::UpToDate => report.up_to_date.push(name),
                    Outcome::Trivial => {}
                }
            }
        }

        report.executed.sort();
        report.up_to_date.sort();
        Ok(report)
    }
}

#[derive(Debug, Clone)]
enum PreparedAction {
    Nothing,
    Copy(PathBuf),
    GameArtifact {
        version: String,
        artifact: GameArtifact,
    },
    ListLibraries(Vec<ArtifactRef>, Vec<PathBuf>),
    Strip {
        input: PathBuf,
        keep_classes: bool,
    },
    Inject {
        input: PathBuf,
        inject_dir: PathBuf,
    },
    Tool {
        tool: ArtifactRef,
        args: Vec<String>,
        jvm_args: Vec<String>,
    },
    Combine {
        raw: PathBuf,
        sources: PathBuf,
        raw_target: PathBuf,
        sources_target: PathBuf,
    },
}

/// A task with every provider evaluated, ready to leave the graph's thread.
#[derive(Debug)]
struct PreparedTask {
    name: String,
    output: Option<PathBuf>,
    inputs: Vec<PathBuf>,
    action: PreparedAction,
}

impl PreparedTask {
    fn prepare(graph: &TaskGraph, id: TaskId) -> Result<Self> {
        let node = graph.node(id);
        let action = match node.action() {
            TaskAction::Lifecycle | TaskAction::Forward => PreparedAction::Nothing,
            TaskAction::ProvideFile(path) => PreparedAction::Copy(path.clone()),
            TaskAction::GameArtifact {
                version,
                artifact,
            } => PreparedAction::GameArtifact {
                version: version.clone(),
                artifact: *artifact,
            },
            TaskAction::ListLibraries {
                libraries,
                files,
            } => PreparedAction::ListLibraries(libraries.clone(), files.clone()),
            TaskAction::Strip {
                input,
                keep_classes,
            } => PreparedAction::Strip {
                input: input.get(graph)?,
                keep_classes: *keep_classes,
            },
            TaskAction::Inject {
                input,
                inject_dir,
            } => PreparedAction::Inject {
                input: input.get(graph)?,
                inject_dir: inject_dir.clone(),
            },
            TaskAction::Tool(invocation) => PreparedAction::Tool {
                tool: invocation.tool.clone(),
                args: invocation.args.iter().map(|arg| arg.get(graph)).collect::<Result<_>>()?,
                jvm_args: invocation.jvm_args.clone(),
            },
            TaskAction::Combine {
                raw,
                sources,
                raw_target,
                sources_target,
            } => PreparedAction::Combine {
                raw: raw.get(graph)?,
                sources: sources.get(graph)?,
                raw_target: raw_target.clone(),
                sources_target: sources_target.clone(),
            },
        };

        let mut inputs = Vec::new();
        for dependency in graph.dependencies(id) {
            if let Ok(output) = graph.output(dependency) {
                inputs.push(output);
            }
        }
        match &action {
            PreparedAction::Copy(path) => inputs.push(path.clone()),
            PreparedAction::ListLibraries(_, files) => inputs.extend(files.iter().cloned()),
            PreparedAction::Inject {
                inject_dir, ..
            } => {
                inputs.extend(
                    WalkDir::new(inject_dir)
                        .sort_by_file_name()
                        .into_iter()
                        .filter_map(Result::ok)
                        .filter(|entry| entry.file_type().is_file())
                        .map(|entry| entry.into_path()),
                );
            }
            _ => {}
        }

        Ok(Self {
            name: node.name().to_string(),
            output: node.declared_output().map(Path::to_path_buf),
            inputs,
            action,
        })
    }

    fn run(self, services: &ExecutionServices) -> Result<(String, Outcome)> {
        let Some(output) = self.output.clone() else {
            return Ok((self.name, Outcome::Trivial));
        };
        if matches!(self.action, PreparedAction::Nothing) {
            return Ok((self.name, Outcome::Trivial));
        }

        let fingerprint = self.fingerprint()?;
        let fingerprint_file = fingerprint_path(&output);
        if output.exists()
            && fs::read_to_string(&fingerprint_file).is_ok_and(|stored| stored == fingerprint)
        {
            tracing::debug!("Task '{}' is up to date", self.name);
            return Ok((self.name, Outcome::UpToDate));
        }

        tracing::info!("Executing task '{}'", self.name);
        ensure_parent_dir(&output)?;
        self.perform(services, &output).with_context(|| format!("Task '{}' failed", self.name))?;
        atomic_write(&fingerprint_file, fingerprint.as_bytes())?;
        Ok((self.name, Outcome::Executed))
    }

    fn fingerprint(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(format!("{:?}", self.action).as_bytes());
        for input in &self.inputs {
            hasher.update(input.display().to_string().as_bytes());
            if input.is_file() {
                hasher.update(calculate_checksum(input)?.as_bytes());
            } else {
                hasher.update(b"<missing>");
            }
        }
        Ok(hex::encode(hasher.finalize()))
    }

    fn perform(&self, services: &ExecutionServices, output: &Path) -> Result<()> {
        match &self.action {
            PreparedAction::Nothing => Ok(()),
            PreparedAction::Copy(source) => atomic_copy(source, output),
            PreparedAction::GameArtifact {
                version,
                artifact,
            } => services.game_cache.fetch(version, *artifact, output),
            PreparedAction::ListLibraries(libraries, files) => {
                let mut content = String::new();
                for library in libraries {
                    let file = services.tools.resolve_tool(library)?;
                    content.push_str(&format!("-e={}\n", file.display()));
                }
                for file in files {
                    content.push_str(&format!("-e={}\n", file.display()));
                }
                atomic_write(output, content.as_bytes())
            }
            PreparedAction::Strip {
                input,
                keep_classes,
            } => strip_jar(input, output, *keep_classes),
            PreparedAction::Inject {
                input,
                inject_dir,
            } => inject_into_jar(input, inject_dir, output),
            PreparedAction::Tool {
                tool,
                args,
                jvm_args,
            } => self.run_tool(services, tool, args, jvm_args, output),
            PreparedAction::Combine {
                raw,
                sources,
                raw_target,
                sources_target,
            } => {
                atomic_copy(raw, raw_target)?;
                atomic_copy(sources, sources_target)
            }
        }
    }

    fn run_tool(
        &self,
        services: &ExecutionServices,
        tool: &ArtifactRef,
        args: &[String],
        jvm_args: &[String],
        output: &Path,
    ) -> Result<()> {
        let jar = services.tools.resolve_tool(tool)?;
        let working_dir = output.parent().unwrap_or_else(|| Path::new("."));
        tracing::debug!("Running {} with {:?}", jar.display(), args);

        let result = Command::new(&services.java)
            .args(jvm_args)
            .arg("-jar")
            .arg(&jar)
            .args(args)
            .current_dir(working_dir)
            .output()
            .with_context(|| format!("Failed to launch {}", services.java.display()))?;

        let log = working_dir.join(format!("{}.log", self.name));
        let mut content = result.stdout.clone();
        content.extend_from_slice(&result.stderr);
        atomic_write(&log, &content)?;

        if !result.status.success() {
            return Err(ForgeGraphError::ToolFailed {
                task: self.name.clone(),
                tool: tool.to_string(),
                status: result.status.to_string(),
            })
            .with_context(|| format!("See {}", log.display()));
        }
        Ok(())
    }
}

fn strip_jar(input: &Path, output: &Path, keep_classes: bool) -> Result<()> {
    let mut archive = ZipArchive::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    )?;
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(parent)?;
    let mut writer = ZipWriter::new(temp.reopen()?);
    let options = SimpleFileOptions::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || entry.name().ends_with(".class") != keep_classes {
            continue;
        }
        let name = entry.name().to_string();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        writer.start_file(name, options)?;
        writer.write_all(&content)?;
    }

    writer.finish()?;
    temp.persist(output)?;
    Ok(())
}

fn inject_into_jar(input: &Path, inject_dir: &Path, output: &Path) -> Result<()> {
    let mut injected = Vec::new();
    for entry in WalkDir::new(inject_dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(inject_dir)?;
        let name = relative.components().map(|c| c.as_os_str().to_string_lossy()).collect::<Vec<_>>().join("/");
        injected.push((name, entry.into_path()));
    }
    let injected_names: HashSet<&str> = injected.iter().map(|(name, _)| name.as_str()).collect();

    let mut archive = ZipArchive::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    )?;
    let parent = output.parent().unwrap_or_else(|| Path::new("."));
    let temp = tempfile::NamedTempFile::new_in(parent)?;
    let mut writer = ZipWriter::new(temp.reopen()?);
    let options = SimpleFileOptions::default();

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() || injected_names.contains(entry.name()) {
            continue;
        }
        let name = entry.name().to_string();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;
        writer.start_file(name, options)?;
        writer.write_all(&content)?;
    }
    for (name, path) in &injected {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&fs::read(path)?)?;
    }

    writer.finish()?;
    temp.persist(output)?;
    Ok(())
}
