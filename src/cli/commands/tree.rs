//! CLI command for displaying dependency trees
//!
//! Implements the `mortar tree` command.

use anyhow::Result;

use crate::config::Settings;
use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;
use crate::core::tree::{render_tree, TreeDirection};

/// Execute the tree command
pub async fn execute(settings: &Settings, spec: &str, dependents: bool) -> Result<()> {
    let query: PackageSpec = spec.parse()?;
    let registry = InstalledRegistry::load(settings.registry_dir())?;
    let direction = if dependents {
        TreeDirection::Dependents
    } else {
        TreeDirection::Dependencies
    };
    let output = render_tree(&registry, &query, direction)?;
    print!("{output}");
    Ok(())
}
