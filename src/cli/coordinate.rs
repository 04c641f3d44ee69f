//! `forgegraph coordinate`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use crate::artifact::ArtifactRef;
use crate::repository::Entry;

/// Parse a notation and show where it lives.
#[derive(Args, Debug)]
pub struct CoordinateCommand {
    /// `group:name:version[:classifier][@extension]`
    notation: String,

    /// Root of the synthetic repository used for the path preview
    #[arg(long, default_value = "build/libs")]
    repository: PathBuf,
}

impl CoordinateCommand {
    pub fn execute(self) -> Result<()> {
        let reference: ArtifactRef = self.notation.parse()?;
        let mut builder = Entry::builder();
        builder.from_reference(&reference);
        let entry = builder.build()?;

        println!("{}", reference.to_string().bold());
        println!("  module:     {}", reference.module_id());
        println!("  file:       {}", reference.file_name());
        println!("  maven path: {}", reference.repository_path().display());
        println!("  synthetic:  {}", entry.artifact_path(&self.repository).display());
        println!("  descriptor: {}", entry.descriptor_path(&self.repository).display());
        Ok(())
    }
}
