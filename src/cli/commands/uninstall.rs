//! Uninstall command implementation
//!
//! Implements `mortar uninstall` to remove installed packages and
//! their prefixes.

use anyhow::Result;

use crate::cli::output::status;
use crate::config::Settings;
use crate::core::recipe::DirRecipeSource;
use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;
use crate::core::uninstall::{execute_uninstall, plan_uninstall, UninstallOptions};

/// Execute the uninstall command
pub async fn execute(
    settings: &Settings,
    specs: &[String],
    all: bool,
    dependents: bool,
    dry_run: bool,
) -> Result<()> {
    let queries = specs
        .iter()
        .map(|raw| raw.parse::<PackageSpec>().map_err(Into::into))
        .collect::<Result<Vec<_>>>()?;

    let mut registry = InstalledRegistry::load(settings.registry_dir())?;
    let recipes = DirRecipeSource::new(settings.recipes_dir());
    let options = UninstallOptions {
        all,
        include_dependents: dependents,
    };
    let order = plan_uninstall(&registry, &recipes, &queries, options)?;

    if dry_run {
        println!("Would remove:");
        for spec in &order {
            println!("  {spec}");
        }
        return Ok(());
    }

    let report = execute_uninstall(&mut registry, &order)?;

    println!(
        "{} Removed {} package(s)",
        status::SUCCESS,
        report.removed.len()
    );
    for spec in &report.removed {
        println!("  {spec}");
    }
    if !report.leftover_prefixes.is_empty() {
        println!("{} Some prefixes could not be deleted:", status::WARNING);
        for prefix in &report.leftover_prefixes {
            println!("  {}", prefix.display());
        }
    }
    Ok(())
}
