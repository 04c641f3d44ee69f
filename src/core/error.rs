//! Error handling for forgegraph
//!
//! Fatal configuration problems are modelled as [`ForgeGraphError`] variants so
//! callers can match on them precisely. Everything else travels as
//! [`anyhow::Error`] with context attached at each layer.
//!
//! # Error Categories
//!
//! - **Pipeline construction**: [`ForgeGraphError::UnknownStepType`],
//!   [`ForgeGraphError::UnresolvablePlaceholder`], [`ForgeGraphError::MissingDataEntry`],
//!   [`ForgeGraphError::MissingDataFile`]
//! - **Memoization**: [`ForgeGraphError::SpecificationConflict`]
//! - **Task graph**: [`ForgeGraphError::TaskNotFound`], [`ForgeGraphError::DuplicateTask`],
//!   [`ForgeGraphError::UnresolvedOutput`], [`ForgeGraphError::PlaceholderAlreadyRedirected`]
//! - **Dependency replacement**: [`ForgeGraphError::CircularDependency`],
//!   [`ForgeGraphError::DuplicateHandler`], [`ForgeGraphError::RepositoryWriteFailed`]
//! - **Execution**: [`ForgeGraphError::ToolFailed`]
//!
//! Recoverable conditions (a dependency that resolves to several artifacts, an
//! unreadable jar manifest) are never errors. They are logged with
//! `tracing::warn!` and the dependency is left alone.
//!
//! # Examples
//!
//! ```rust,no_run
//! use forgegraph::core::{ForgeGraphError, user_friendly_error};
//!
//! let error = ForgeGraphError::UnknownStepType {
//!     step: "mystery".to_string(),
//!     step_type: "mystery".to_string(),
//! };
//! user_friendly_error(anyhow::Error::from(error)).display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for forgegraph operations.
#[derive(Error, Debug)]
pub enum ForgeGraphError {
    /// A manifest step names a type with neither a built-in builder nor a function entry.
    #[error("Step '{step}' has unknown type '{step_type}'")]
    UnknownStepType {
        /// Step name
        step: String,
        /// Declared type tag
        step_type: String,
    },

    /// A `{name}` argument could not be matched to a step, artifact or data entry.
    #[error("Cannot resolve placeholder '{{{placeholder}}}' in argument '{argument}' of step '{step}'")]
    UnresolvablePlaceholder {
        /// Step whose argument failed
        step: String,
        /// Argument key
        argument: String,
        /// Placeholder name without braces
        placeholder: String,
    },

    /// The runtime manifest references a data entry that is missing.
    #[error("Data entry '{name}' is not declared for side '{side}'")]
    MissingDataEntry {
        /// Data key
        name: String,
        /// Distribution side the lookup was made for
        side: String,
    },

    /// A declared data entry points at a file missing from the runtime archive.
    #[error("Data entry '{name}' points at '{path}', which is not in the runtime archive")]
    MissingDataFile {
        /// Data key
        name: String,
        /// Path relative to the archive root
        path: String,
    },

    /// An identifier was reused with a structurally different specification.
    #[error("Runtime '{identifier}' already exists with a different specification")]
    SpecificationConflict {
        /// The shared identifier
        identifier: String,
    },

    /// A required dependency coordinate has no version.
    #[error("Dependency '{notation}' does not declare a version")]
    MissingDependencyVersion {
        /// The offending notation
        notation: String,
    },

    /// The runtime manifest could not be read or parsed.
    #[error("Invalid runtime manifest {file}: {reason}")]
    ManifestParseError {
        /// Manifest location
        file: String,
        /// Parser message
        reason: String,
    },

    /// A coordinate string did not follow `group:name:version[:classifier][@extension]`.
    #[error("Invalid dependency notation '{notation}': {reason}")]
    InvalidNotation {
        /// The rejected input
        notation: String,
        /// What was wrong with it
        reason: String,
    },

    /// A task name was looked up but never registered.
    #[error("Task '{name}' does not exist")]
    TaskNotFound {
        /// Requested task name
        name: String,
    },

    /// Two tasks were registered under the same name.
    #[error("Task '{name}' is already registered")]
    DuplicateTask {
        /// Conflicting task name
        name: String,
    },

    /// A placeholder task was queried before it was pointed at a real task.
    #[error("Output of task '{name}' is not wired yet")]
    UnresolvedOutput {
        /// Placeholder task name
        name: String,
    },

    /// A placeholder task was pointed at two different targets.
    #[error("Placeholder task '{name}' already forwards to '{target}'")]
    PlaceholderAlreadyRedirected {
        /// Placeholder task name
        name: String,
        /// Existing target task name
        target: String,
    },

    /// A cycle in the task graph or in a dependency subtree.
    #[error("Circular dependency detected: {chain}")]
    CircularDependency {
        /// Human readable chain, `a → b → a`
        chain: String,
    },

    /// Two replacement handlers registered under one name.
    #[error("Replacement handler '{name}' is already registered")]
    DuplicateHandler {
        /// Handler name
        name: String,
    },

    /// A synthetic repository descriptor could not be written.
    #[error("Failed to write repository entry {coordinate} to {path}")]
    RepositoryWriteFailed {
        /// Coordinate of the entry
        coordinate: String,
        /// Descriptor path
        path: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("Tool {tool} failed for task '{task}' with {status}")]
    ToolFailed {
        /// Task name
        task: String,
        /// Tool coordinate
        tool: String,
        /// Exit status description
        status: String,
    },

    /// Configuration file problems.
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the problem
        message: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Archive error.
    #[error("Archive error: {0}")]
    ZipError(#[from] zip::result::ZipError),
}

/// An error with a suggestion and details for CLI display.
#[derive(Debug)]
pub struct ErrorContext {
    /// Message of the underlying error
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a context without suggestion or details.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with a suggestion where one is known.
///
/// The full `anyhow` chain is folded into the details so that the innermost
/// cause (usually the most specific one) is still visible.
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let chain = error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>();
    let mut context = ErrorContext::new(error.to_string());
    if !chain.is_empty() {
        context = context.with_details(chain.join(": "));
    }

    let Some(known) = error.chain().find_map(|cause| cause.downcast_ref::<ForgeGraphError>())
    else {
        return context;
    };

    match known {
        ForgeGraphError::UnknownStepType {
            step_type, ..
        } => context.with_suggestion(format!(
            "Declare a '{step_type}' entry in the manifest's functions table or use a built-in step type"
        )),
        ForgeGraphError::UnresolvablePlaceholder {
            placeholder, ..
        } => context.with_suggestion(format!(
            "Make sure a step named '{placeholder}' (or a data entry of that name) is declared before it is used"
        )),
        ForgeGraphError::MissingDataFile {
            ..
        } => context.with_suggestion("The runtime archive is incomplete; re-download it or fix its config.json"),
        ForgeGraphError::SpecificationConflict {
            ..
        } => context.with_suggestion(
            "Give the second runtime a distinct name or make both configurations identical",
        ),
        ForgeGraphError::CircularDependency {
            ..
        } => context.with_suggestion("Remove the dependency that closes the cycle"),
        ForgeGraphError::ConfigError {
            ..
        }
        | ForgeGraphError::TomlError(_) => {
            context.with_suggestion("Check the syntax and values in forgegraph.toml")
        }
        ForgeGraphError::ToolFailed {
            ..
        } => context.with_suggestion("Re-run with --verbose to see the tool's output"),
        ForgeGraphError::RepositoryWriteFailed {
            ..
        } => context.with_suggestion("Check that the build directory is writable"),
        _ => context,
    }
}
