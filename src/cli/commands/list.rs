//! List command implementation
//!
//! Implements `mortar list` to display installed packages.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;

use crate::cli::output::{format_size, status};
use crate::config::Settings;
use crate::core::registry::{InstalledEntry, InstalledRegistry};
use crate::core::spec::PackageSpec;
use crate::infra::filesystem;

/// Execute the list command
pub async fn execute(settings: &Settings, spec: Option<&str>, long: bool) -> Result<()> {
    let registry = InstalledRegistry::load(settings.registry_dir())?;

    let entries: Vec<&InstalledEntry> = match spec {
        Some(raw) => {
            let query: PackageSpec = raw.parse()?;
            registry.query(&query)
        }
        None => registry.entries().collect(),
    };

    if entries.is_empty() {
        match spec {
            Some(raw) => println!("{} No installed packages match '{raw}'.", status::INFO),
            None => println!("{} No packages installed.", status::INFO),
        }
        return Ok(());
    }

    println!("{} package(s) installed:", entries.len());
    for entry in &entries {
        if long {
            print_long(&registry, entry);
        } else {
            println!("  {}", entry.spec);
        }
    }
    Ok(())
}

fn print_long(registry: &InstalledRegistry, entry: &InstalledEntry) {
    println!("  {}", entry.spec);
    println!("    prefix: {}", entry.prefix.display());
    println!("    installed: {}", format_age(entry.installed_at));
    println!("    dependents: {}", registry.dependent_count(&entry.spec));
    println!("    size: {}", format_size(filesystem::dir_size(&entry.prefix)));
}

/// Render an install timestamp as an age relative to now.
fn format_age(installed_at: u64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let elapsed = now.saturating_sub(installed_at);
    if elapsed < 60 {
        format!("{elapsed}s ago")
    } else if elapsed < 3600 {
        format!("{}m ago", elapsed / 60)
    } else if elapsed < 86_400 {
        format!("{}h ago", elapsed / 3600)
    } else {
        format!("{}d ago", elapsed / 86_400)
    }
}
