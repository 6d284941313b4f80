//! Health checks
//!
//! `check` audits without building: recorded registry edges against each
//! other, install prefixes against the filesystem, and the build tools
//! recipes rely on against `PATH`.

use std::path::PathBuf;

use crate::config::defaults::{OPTIONAL_BUILD_TOOLS, REQUIRED_BUILD_TOOLS};
use crate::core::recipe::RecipeSource;
use crate::core::registry::InstalledRegistry;

/// Availability of one build tool
#[derive(Debug, Clone)]
pub struct ToolCheck {
    /// Tool name as invoked by recipes
    pub name: String,
    /// Resolved path when the tool is on `PATH`
    pub found: Option<PathBuf>,
    /// Required tools fail the whole check when missing
    pub required: bool,
}

impl ToolCheck {
    /// True when the tool was found.
    pub fn passed(&self) -> bool {
        self.found.is_some()
    }
}

/// Overall check report
#[derive(Debug, Default)]
pub struct CheckReport {
    /// Per-tool availability
    pub tools: Vec<ToolCheck>,
    /// Registry inconsistencies and missing prefixes
    pub problems: Vec<String>,
    /// Installed entries audited
    pub entries_checked: usize,
    /// Recipes the configured source can load
    pub recipes_available: usize,
}

impl CheckReport {
    /// True when every required tool is present and no problem was found.
    pub fn healthy(&self) -> bool {
        self.problems.is_empty()
            && self
                .tools
                .iter()
                .filter(|tool| tool.required)
                .all(ToolCheck::passed)
    }

    /// Required tools that are missing.
    pub fn missing_required(&self) -> Vec<&ToolCheck> {
        self.tools
            .iter()
            .filter(|tool| tool.required && !tool.passed())
            .collect()
    }

    /// Tools found, required or not.
    pub fn passed_count(&self) -> usize {
        self.tools.iter().filter(|tool| tool.passed()).count()
    }
}

/// Look a single tool up on `PATH`.
pub fn check_tool(name: &str, required: bool) -> ToolCheck {
    ToolCheck {
        name: name.to_string(),
        found: which::which(name).ok(),
        required,
    }
}

/// Run every audit and collect the report.
pub fn run_check(registry: &InstalledRegistry, recipes: &dyn RecipeSource) -> CheckReport {
    let mut report = CheckReport::default();

    for tool in REQUIRED_BUILD_TOOLS {
        report.tools.push(check_tool(tool, true));
    }
    for tool in OPTIONAL_BUILD_TOOLS {
        report.tools.push(check_tool(tool, false));
    }

    report.problems = registry.verify();
    for entry in registry.entries() {
        if !entry.prefix.exists() {
            report.problems.push(format!(
                "install prefix for '{}' is missing: {}",
                entry.spec,
                entry.prefix.display()
            ));
        }
    }

    report.entries_checked = registry.len();
    report.recipes_available = recipes.available().len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::registry::InstalledEntry;
    use crate::core::spec::PackageSpec;
    use crate::test_utils::recipes::{recipe, MemoryRecipeSource};
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn spec(input: &str) -> PackageSpec {
        input.parse().unwrap()
    }

    #[test]
    fn test_tool_check_resolves_present_tool() {
        let check = check_tool("sh", true);
        assert!(check.passed());
        assert!(check.found.unwrap().ends_with("sh"));
    }

    #[test]
    fn test_tool_check_reports_missing_tool() {
        let check = check_tool("mortar-no-such-tool", false);
        assert!(!check.passed());
    }

    #[test]
    fn test_report_health_requires_required_tools() {
        let mut report = CheckReport::default();
        report.tools.push(ToolCheck {
            name: "make".to_string(),
            found: None,
            required: true,
        });
        report.tools.push(ToolCheck {
            name: "ninja".to_string(),
            found: None,
            required: false,
        });

        assert!(!report.healthy());
        assert_eq!(report.missing_required().len(), 1);
        assert_eq!(report.missing_required()[0].name, "make");
    }

    #[test]
    fn test_run_check_flags_missing_prefix() {
        let temp = TempDir::new().unwrap();
        let mut registry = InstalledRegistry::load(temp.path().join("registry")).unwrap();

        let good_prefix = temp.path().join("prefixes").join("zlib@1.3");
        std::fs::create_dir_all(&good_prefix).unwrap();

        let mut txn = registry.begin_transaction().unwrap();
        txn.record_install(
            InstalledEntry::new(spec("zlib@1.3"), &good_prefix, BTreeSet::new()).unwrap(),
        );
        txn.record_install(
            InstalledEntry::new(spec("hdf5@1.14.3"), "/nonexistent/hdf5", BTreeSet::new())
                .unwrap(),
        );
        txn.commit().unwrap();

        let report = run_check(&registry, &MemoryRecipeSource::new());
        assert_eq!(report.entries_checked, 2);
        assert_eq!(report.problems.len(), 1);
        assert!(report.problems[0].contains("hdf5@1.14.3"));
    }

    #[test]
    fn test_run_check_counts_recipes() {
        let temp = TempDir::new().unwrap();
        let registry = InstalledRegistry::load(temp.path()).unwrap();
        let mut recipes = MemoryRecipeSource::new();
        recipes.insert(recipe("zlib", "1.3"));
        recipes.insert(recipe("hdf5", "1.14.3"));

        let report = run_check(&registry, &recipes);
        assert!(report.problems.is_empty());
        assert_eq!(report.recipes_available, 2);
    }
}
