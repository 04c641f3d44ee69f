//! Dependency coordinates.
//!
//! [`ArtifactRef`] is the immutable descriptor used everywhere a dependency is
//! named: in configurations, in the deobfuscation cache, in tool lookups and in
//! the synthetic repository. Its string form is the standard coordinate
//! notation:
//!
//! ```text
//! group:name:version[:classifier][@extension]
//! ```
//!
//! The `@extension` suffix is omitted when the extension is `jar`.
//!
//! ```
//! use forgegraph::artifact::ArtifactRef;
//!
//! let reference: ArtifactRef = "net.minecraft:client:1.20.1:mappings@txt".parse().unwrap();
//! assert_eq!(reference.classifier.as_deref(), Some("mappings"));
//! assert_eq!(reference.extension, "txt");
//! assert_eq!(reference.to_string(), "net.minecraft:client:1.20.1:mappings@txt");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::constants::DEFAULT_EXTENSION;
use crate::core::ForgeGraphError;

/// A structured dependency coordinate.
///
/// Equality and hashing are structural over all five fields, so two references
/// that differ only in classifier or extension are different artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactRef {
    /// Group, e.g. `net.minecraft`
    pub group: String,
    /// Module name, e.g. `client`
    pub name: String,
    /// Version, e.g. `1.20.1`
    pub version: String,
    /// Optional classifier, e.g. `sources`
    pub classifier: Option<String>,
    /// File extension, `jar` unless stated otherwise
    pub extension: String,
}

impl ArtifactRef {
    /// Create a jar reference without classifier.
    pub fn new(group: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    /// Return a copy with the given classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        let classifier = classifier.into();
        self.classifier = if classifier.is_empty() {
            None
        } else {
            Some(classifier)
        };
        self
    }

    /// Return a copy with the given extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// The `group:name` module identity, ignoring version and artifact details.
    pub fn module_id(&self) -> String {
        format!("{}:{}", self.group, self.name)
    }

    /// `name-version[-classifier].extension`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => {
                format!("{}-{}-{}.{}", self.name, self.version, classifier, self.extension)
            }
            None => format!("{}-{}.{}", self.name, self.version, self.extension),
        }
    }

    /// Maven/Ivy style relative path: `group/as/dirs/name/version/file`.
    pub fn repository_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for segment in self.group.split('.') {
            path.push(segment);
        }
        path.push(&self.name);
        path.push(&self.version);
        path.push(self.file_name());
        path
    }

    /// A name fragment usable inside task names: `netMinecraftClient1201`.
    ///
    /// Extensions other than `jar` are appended. The fragment is readable
    /// rather than unique: `a.b:c` and `a:b.c` share one.
    pub fn task_name_fragment(&self) -> String {
        let mut raw = format!(
            "{}.{}.{}.{}",
            self.group,
            self.name,
            self.version,
            self.classifier.as_deref().unwrap_or_default()
        );
        if self.extension != DEFAULT_EXTENSION {
            raw.push('.');
            raw.push_str(&self.extension);
        }
        camel_case(&raw)
    }
}

/// Join the alphanumeric runs of `input` in lower camel case.
pub(crate) fn camel_case(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for (index, word) in input.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()).enumerate() {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            if index == 0 {
                output.push(first.to_ascii_lowercase());
            } else {
                output.push(first.to_ascii_uppercase());
            }
            output.extend(chars);
        }
    }
    output
}

impl FromStr for ArtifactRef {
    type Err = ForgeGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ForgeGraphError::InvalidNotation {
            notation: s.to_string(),
            reason: reason.to_string(),
        };

        let (coordinate, extension) = match s.rsplit_once('@') {
            Some((coordinate, extension)) => {
                if extension.is_empty() {
                    return Err(invalid("extension after '@' is empty"));
                }
                (coordinate, extension)
            }
            None => (s, DEFAULT_EXTENSION),
        };

        let parts: Vec<&str> = coordinate.split(':').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(invalid("coordinate segments must not be empty"));
        }

        let (group, name, version, classifier) = match parts.as_slice() {
            [_, _] => {
                return Err(ForgeGraphError::MissingDependencyVersion {
                    notation: s.to_string(),
                });
            }
            [group, name, version] => (*group, *name, *version, None),
            [group, name, version, classifier] => (*group, *name, *version, Some(*classifier)),
            _ => return Err(invalid("expected group:name:version[:classifier][@extension]")),
        };

        Ok(Self {
            group: group.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            classifier: classifier.map(str::to_string),
            extension: extension.to_string(),
        })
    }
}

impl TryFrom<String> for ArtifactRef {
    type Error = ForgeGraphError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArtifactRef> for String {
    fn from(value: ArtifactRef) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.group, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{classifier}")?;
        }
        if self.extension != DEFAULT_EXTENSION {
            write!(f, "@{}", self.extension)?;
        }
        Ok(())
    }
}
