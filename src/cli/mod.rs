//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::Settings;
use commands::Commands;

/// Mortar - dependency-aware package builder
///
/// Build packages from recipes into isolated install prefixes, in
/// dependency order, with a durable registry of what is installed.
#[derive(Parser, Debug)]
#[command(name = "mortar")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data root holding the registry, prefixes, and build scratch
    #[arg(long, global = true, env = "MORTAR_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Recipe directory (defaults to <root>/recipes)
    #[arg(long, global = true, env = "MORTAR_RECIPES", value_name = "DIR")]
    pub recipes: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let settings = Settings::resolve(self.root, self.recipes);
        if let Some(cmd) = self.command {
            cmd.run(&settings, self.verbose > 0).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}
