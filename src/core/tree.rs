//! Dependency tree rendering
//!
//! Renders the recorded dependency (or dependent) edges of an installed
//! package as an indented tree. Diamond dependencies repeat their
//! subtree; a cycle in recorded edges is marked instead of recursed
//! into, so rendering always terminates.

use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;
use crate::error::ResolveError;

/// Which recorded edges the tree follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeDirection {
    /// Follow dependency edges downward
    Dependencies,
    /// Follow dependent edges upward
    Dependents,
}

/// Render the edge tree rooted at the installed package `query` names.
///
/// The query must match exactly one installed entry.
pub fn render_tree(
    registry: &InstalledRegistry,
    query: &PackageSpec,
    direction: TreeDirection,
) -> Result<String, ResolveError> {
    let matches = registry.query(query);
    let root = match matches.len() {
        0 => {
            return Err(ResolveError::NotInstalled {
                query: query.to_string(),
            });
        }
        1 => matches[0].spec.clone(),
        _ => {
            return Err(ResolveError::Ambiguous {
                query: query.to_string(),
                matches: matches.iter().map(|e| e.spec.to_string()).collect(),
            });
        }
    };

    let mut out = String::new();
    out.push_str(&root.to_string());
    out.push('\n');
    let mut path = vec![root.clone()];
    render_children(registry, &root, "", direction, &mut path, &mut out);
    Ok(out)
}

fn children_of(
    registry: &InstalledRegistry,
    spec: &PackageSpec,
    direction: TreeDirection,
) -> Vec<PackageSpec> {
    match registry.get(spec) {
        Some(entry) => match direction {
            TreeDirection::Dependencies => entry.dependencies.iter().cloned().collect(),
            TreeDirection::Dependents => entry.dependents.iter().cloned().collect(),
        },
        None => Vec::new(),
    }
}

fn render_children(
    registry: &InstalledRegistry,
    spec: &PackageSpec,
    prefix: &str,
    direction: TreeDirection,
    path: &mut Vec<PackageSpec>,
    out: &mut String,
) {
    let children = children_of(registry, spec, direction);
    let count = children.len();
    for (index, child) in children.into_iter().enumerate() {
        let is_last = index + 1 == count;
        let connector = if is_last { "└── " } else { "├── " };

        if !registry.contains(&child) {
            out.push_str(&format!("{prefix}{connector}{child} (missing)\n"));
            continue;
        }
        if path.contains(&child) {
            out.push_str(&format!("{prefix}{connector}{child} (cycle)\n"));
            continue;
        }

        out.push_str(&format!("{prefix}{connector}{child}\n"));
        let child_prefix = if is_last {
            format!("{prefix}    ")
        } else {
            format!("{prefix}│   ")
        };
        path.push(child.clone());
        render_children(registry, &child, &child_prefix, direction, path, out);
        path.pop();
    }
}
