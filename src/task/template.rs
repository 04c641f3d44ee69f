//! Argument templates for external tools.
//!
//! Tool arguments are written as strings containing `{name}` placeholders,
//! e.g. `--input={input}`. Each placeholder is resolved by the caller into a
//! [`Provider`], so a rendered argument depends on whichever tasks produce
//! the files it references.

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::{Provider, ToolInvocation};
use crate::artifact::ArtifactRef;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("placeholder pattern is valid"));

static WHOLE_PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\{([A-Za-z0-9_]+)\}$").expect("placeholder pattern is valid"));

/// The placeholder name if `value` consists of exactly one `{name}`.
pub fn whole_placeholder(value: &str) -> Option<&str> {
    WHOLE_PLACEHOLDER.captures(value).and_then(|captures| captures.get(1)).map(|name| name.as_str())
}

/// Render `template`, resolving every `{name}` through `resolve`.
///
/// Literal text is kept as-is. A template without placeholders yields a
/// constant provider.
pub fn expand(
    template: &str,
    resolve: &mut dyn FnMut(&str) -> Result<Provider<String>>,
) -> Result<Provider<String>> {
    let mut parts = Vec::new();
    let mut last = 0;
    for captures in PLACEHOLDER.captures_iter(template) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        if whole.start() > last {
            parts.push(Provider::value(template[last..whole.start()].to_string()));
        }
        parts.push(resolve(name.as_str())?);
        last = whole.end();
    }

    if parts.is_empty() {
        return Ok(Provider::value(template.to_string()));
    }
    if last < template.len() {
        parts.push(Provider::value(template[last..].to_string()));
    }
    if parts.len() == 1 {
        return Ok(parts.remove(0));
    }
    Ok(Provider::concat(parts))
}

/// A tool coordinate with templated arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ToolTemplate {
    /// Executable jar coordinate
    pub tool: ArtifactRef,
    /// Program arguments with `{name}` placeholders
    #[serde(default)]
    pub args: Vec<String>,
    /// Arguments passed to the JVM
    #[serde(default)]
    pub jvm_args: Vec<String>,
}

impl ToolTemplate {
    /// A template running `tool` with `args`.
    pub fn new(tool: ArtifactRef, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tool,
            args: args.into_iter().map(Into::into).collect(),
            jvm_args: Vec::new(),
        }
    }

    /// Resolve every argument into a runnable invocation.
    pub fn invocation(
        &self,
        resolve: &mut dyn FnMut(&str) -> Result<Provider<String>>,
    ) -> Result<ToolInvocation> {
        let args = self.args.iter().map(|arg| expand(arg, resolve)).collect::<Result<Vec<_>>>()?;
        Ok(ToolInvocation {
            tool: self.tool.clone(),
            args,
            jvm_args: self.jvm_args.clone(),
        })
    }
}
