//! Package removal
//!
//! Uninstalling resolves queries against installed entries only, orders
//! the removal set dependents-first, and removes all entries in one
//! transaction. Install prefixes are deleted after the registry commit,
//! so a failed deletion can never leave a recorded entry pointing at a
//! removed directory.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::core::graph::{DependencyGraph, OrderDirection, WalkOptions};
use crate::core::recipe::RecipeSource;
use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;
use crate::error::{ResolveError, UninstallError};
use crate::infra::filesystem;

/// Knobs for one uninstall run
#[derive(Debug, Clone, Copy, Default)]
pub struct UninstallOptions {
    /// Remove every installed match of an ambiguous query
    pub all: bool,
    /// Also remove installed dependents of the targets
    pub include_dependents: bool,
}

/// Outcome of one uninstall run
#[derive(Debug, Clone, Default)]
pub struct UninstallReport {
    /// Entries removed from the registry, in removal order
    pub removed: Vec<PackageSpec>,
    /// Prefixes that could not be deleted and remain on disk
    pub leftover_prefixes: Vec<PathBuf>,
}

/// Resolve uninstall queries to a dependents-first removal order.
///
/// Every query must match at least one installed entry. Without
/// `include_dependents`, removal is refused while any package outside
/// the removal set still depends on a target.
pub fn plan_uninstall(
    registry: &InstalledRegistry,
    recipes: &dyn RecipeSource,
    queries: &[PackageSpec],
    options: UninstallOptions,
) -> Result<Vec<PackageSpec>, UninstallError> {
    let mut targets: Vec<PackageSpec> = Vec::new();
    for query in queries {
        let matches = registry.query(query);
        match matches.len() {
            0 => {
                return Err(UninstallError::NoMatch {
                    query: query.to_string(),
                });
            }
            1 => {
                if !targets.contains(&matches[0].spec) {
                    targets.push(matches[0].spec.clone());
                }
            }
            _ if options.all => {
                for entry in matches {
                    if !targets.contains(&entry.spec) {
                        targets.push(entry.spec.clone());
                    }
                }
            }
            _ => {
                return Err(ResolveError::Ambiguous {
                    query: query.to_string(),
                    matches: matches.iter().map(|e| e.spec.to_string()).collect(),
                }
                .into());
            }
        }
    }

    let graph = DependencyGraph::build(
        registry,
        recipes,
        &targets,
        WalkOptions {
            include_dependencies: false,
            include_dependents: options.include_dependents,
        },
    )?;

    let set: BTreeSet<&PackageSpec> = graph.nodes().collect();
    if !options.include_dependents {
        for target in &targets {
            let outside: Vec<String> = registry
                .dependents_of(target)
                .into_iter()
                .filter(|dependent| !set.contains(dependent))
                .map(|dependent| dependent.to_string())
                .collect();
            if !outside.is_empty() {
                return Err(UninstallError::HasDependents {
                    spec: target.to_string(),
                    dependents: outside,
                });
            }
        }
    }

    Ok(graph.topological_order(OrderDirection::DependentsFirst)?)
}

/// Remove planned entries in order, then delete their prefixes.
///
/// Registry removal is a single all-or-nothing transaction. Prefix
/// deletion afterwards is best-effort; leftovers are reported, not
/// fatal.
pub fn execute_uninstall(
    registry: &mut InstalledRegistry,
    order: &[PackageSpec],
) -> Result<UninstallReport, UninstallError> {
    let mut report = UninstallReport::default();
    let mut prefixes: Vec<(PackageSpec, PathBuf)> = Vec::new();

    let mut txn = registry.begin_transaction()?;
    for spec in order {
        if let Some(entry) = txn.get(spec) {
            prefixes.push((spec.clone(), entry.prefix.clone()));
        }
        if txn.record_uninstall(spec) {
            report.removed.push(spec.clone());
        }
    }
    txn.commit()?;

    for (spec, prefix) in prefixes {
        if !prefix.exists() {
            continue;
        }
        if let Err(e) = filesystem::remove_dir_all(&prefix) {
            tracing::warn!(spec = %spec, error = %e, "install prefix left behind");
            report.leftover_prefixes.push(prefix);
        }
    }
    Ok(report)
}
