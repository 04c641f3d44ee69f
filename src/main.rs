//! forgegraph CLI entry point
//!
//! Parses the command line, runs the selected command and renders fatal
//! errors with context and suggestions.

use anyhow::Result;
use clap::Parser;
use forgegraph::cli;
use forgegraph::core::user_friendly_error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    match cli.execute().await {
        Ok(()) => Ok(()),
        Err(e) => {
            let error_ctx = user_friendly_error(e);
            error_ctx.display();
            std::process::exit(1);
        }
    }
}
