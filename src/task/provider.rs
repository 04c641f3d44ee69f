//! Lazily evaluated values.
//!
//! A [`Provider`] is a value that can only be computed once the task graph is
//! fully wired, typically the output file of a task that may still be a
//! placeholder when the provider is created. Providers remember which tasks
//! they read from, so a task that consumes a provider automatically depends on
//! the tasks producing it.

use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use super::{TaskGraph, TaskId};

type Compute<T> = Arc<dyn Fn(&TaskGraph) -> Result<T> + Send + Sync>;

/// A deferred value together with the tasks it is derived from.
pub struct Provider<T> {
    compute: Compute<T>,
    dependencies: Vec<TaskId>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            compute: Arc::clone(&self.compute),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider").field("dependencies", &self.dependencies).finish_non_exhaustive()
    }
}

impl<T: Clone + Send + Sync + 'static> Provider<T> {
    /// A provider that always yields `value` and depends on nothing.
    pub fn value(value: T) -> Self {
        Self {
            compute: Arc::new(move |_| Ok(value.clone())),
            dependencies: Vec::new(),
        }
    }
}

impl<T: 'static> Provider<T> {
    /// Evaluate against a wired graph.
    pub fn get(&self, graph: &TaskGraph) -> Result<T> {
        (self.compute)(graph)
    }

    /// Tasks whose outputs this value is derived from.
    pub fn dependencies(&self) -> &[TaskId] {
        &self.dependencies
    }

    /// Transform the eventual value, keeping the dependencies.
    pub fn map<U, F>(self, transform: F) -> Provider<U>
    where
        U: 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let compute = self.compute;
        Provider {
            compute: Arc::new(move |graph| compute(graph).map(&transform)),
            dependencies: self.dependencies,
        }
    }
}

impl Provider<String> {
    /// Concatenate several string providers, merging their dependencies.
    pub fn concat(parts: Vec<Provider<String>>) -> Self {
        let mut dependencies = Vec::new();
        for part in &parts {
            for task in part.dependencies() {
                if !dependencies.contains(task) {
                    dependencies.push(*task);
                }
            }
        }
        Self {
            compute: Arc::new(move |graph| {
                let mut rendered = String::new();
                for part in &parts {
                    rendered.push_str(&part.get(graph)?);
                }
                Ok(rendered)
            }),
            dependencies,
        }
    }
}

impl Provider<PathBuf> {
    /// The output file of `task`, resolved through placeholders at evaluation time.
    pub fn output_of(task: TaskId) -> Self {
        Self {
            compute: Arc::new(move |graph| graph.output(task)),
            dependencies: vec![task],
        }
    }

    /// The path rendered as an argument string.
    pub fn into_argument(self) -> Provider<String> {
        self.map(|path| path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskAction, TaskSpec};

    #[test]
    fn test_value_provider() {
        let graph = TaskGraph::new();
        let provider = Provider::value("literal".to_string());
        assert_eq!(provider.get(&graph).unwrap(), "literal");
        assert!(provider.dependencies().is_empty());
    }

    #[test]
    fn test_output_provider_follows_late_redirect() {
        let mut graph = TaskGraph::new();
        let placeholder = graph.register_placeholder("sourcesJar").unwrap();
        let provider = Provider::output_of(placeholder).map(|path| path.with_extension("zip"));
        assert_eq!(provider.dependencies(), &[placeholder]);
        assert!(provider.get(&graph).is_err());

        let real = graph
            .register(TaskSpec::new("decompile", TaskAction::Lifecycle).with_output("/work/out.jar"))
            .unwrap();
        graph.redirect(placeholder, real).unwrap();
        assert_eq!(provider.get(&graph).unwrap(), PathBuf::from("/work/out.zip"));
    }
}
