//! Check command implementation
//!
//! Implements `mortar check` to audit build tools and registry health.

use anyhow::{bail, Result};

use crate::cli::output::status;
use crate::config::Settings;
use crate::core::check::run_check;
use crate::core::recipe::DirRecipeSource;
use crate::core::registry::InstalledRegistry;

/// Execute the check command
pub async fn execute(settings: &Settings) -> Result<()> {
    let registry = InstalledRegistry::load(settings.registry_dir())?;
    let recipes = DirRecipeSource::new(settings.recipes_dir());
    let report = run_check(&registry, &recipes);

    println!("Build tools:");
    for tool in &report.tools {
        match (&tool.found, tool.required) {
            (Some(path), _) => {
                println!("  {} {} ({})", status::SUCCESS, tool.name, path.display());
            }
            (None, true) => println!("  {} {} (not found, required)", status::ERROR, tool.name),
            (None, false) => println!("  {} {} (not found)", status::WARNING, tool.name),
        }
    }

    println!("\nRegistry:");
    println!("  Entries: {}", report.entries_checked);
    println!("  Recipes available: {}", report.recipes_available);
    if report.problems.is_empty() {
        println!("  {} No problems found", status::SUCCESS);
    } else {
        for problem in &report.problems {
            println!("  {} {problem}", status::ERROR);
        }
    }

    println!();
    if report.healthy() {
        println!(
            "{} Check passed ({}/{} tools found)",
            status::SUCCESS,
            report.passed_count(),
            report.tools.len()
        );
        return Ok(());
    }

    let missing = report.missing_required();
    if !missing.is_empty() {
        let names: Vec<&str> = missing.iter().map(|tool| tool.name.as_str()).collect();
        println!(
            "{} Missing required tools: {}",
            status::ERROR,
            names.join(", ")
        );
    }
    bail!("Check failed - fix the problems above");
}
