//! Core types shared by every forgegraph module.
//!
//! - [`ForgeGraphError`] - fatal configuration and execution errors
//! - [`ErrorContext`] / [`user_friendly_error`] - CLI presentation of errors
//! - [`DistributionType`] - which game distribution a pipeline works on

pub mod error;

pub use error::{ErrorContext, ForgeGraphError, user_friendly_error};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The game distribution a runtime targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistributionType {
    /// The client jar only
    Client,
    /// The dedicated server jar only
    Server,
    /// Client and server merged into a single jar
    Joined,
}

impl DistributionType {
    /// Lowercase name, used for manifest keys and directory names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
            Self::Joined => "joined",
        }
    }
}

impl fmt::Display for DistributionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistributionType {
    type Err = ForgeGraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "client" => Ok(Self::Client),
            "server" => Ok(Self::Server),
            "joined" => Ok(Self::Joined),
            other => Err(ForgeGraphError::ConfigError {
                message: format!("unknown distribution '{other}', expected client, server or joined"),
            }),
        }
    }
}
