//! Package recipes
//!
//! A recipe is one TOML file describing how to build a package: default
//! version and variants, declared dependencies as partial specs, and one
//! or more build rules gated on version requirements. Recipes are loaded
//! lazily by name; rule selection happens at plan time against the
//! concrete version being built.
//!
//! ```toml
//! [package]
//! name = "hdf5"
//! version = "1.14.3"
//! depends = ["zlib", "openmpi@4.1"]
//!
//! [package.variants]
//! mpi = true
//! api = "v112"
//!
//! [[build]]
//! when = ">=1.14"
//!
//! [[build.steps]]
//! run = "sh"
//! args = ["-c", "./configure --prefix=$MORTAR_PREFIX && make install"]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use semver::VersionReq;
use serde::{Deserialize, Serialize};

use crate::config::defaults::RECIPE_EXTENSION;
use crate::core::registry::InstalledRegistry;
use crate::core::spec::{compare_versions, lenient_semver, PackageSpec, VariantValue};
use crate::error::{GraphError, RecipeError, ResolveError, SpecError};

/// Default value of a variant the recipe defines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum VariantDefault {
    /// Boolean variant default
    Bool(bool),
    /// Valued variant default
    Str(String),
}

impl VariantDefault {
    fn to_value(&self) -> VariantValue {
        match self {
            Self::Bool(enabled) => VariantValue::Bool(*enabled),
            Self::Str(value) => VariantValue::Str(value.clone()),
        }
    }
}

/// Recipe metadata block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeMetadata {
    /// Package name
    pub name: String,
    /// Default concrete version
    pub version: String,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Declared dependencies, as partial spec strings
    #[serde(default)]
    pub depends: Vec<String>,
    /// Variants the recipe defines, with their defaults
    #[serde(default)]
    pub variants: BTreeMap<String, VariantDefault>,
}

/// A single build command
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildStep {
    /// Program to run
    pub run: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
}

/// One build command sequence, optionally gated on a version requirement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRule {
    /// Semver requirement selecting this rule; absent means any version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Commands run in order inside the build directory
    pub steps: Vec<BuildStep>,
}

impl BuildRule {
    /// True when this rule applies to `version`.
    pub fn matches(&self, version: &str) -> bool {
        match &self.when {
            None => true,
            Some(requirement) => version_req_matches(requirement, version),
        }
    }
}

/// Declarative build recipe for one package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recipe {
    /// Metadata block
    pub package: RecipeMetadata,
    /// Build rules, first match wins
    #[serde(default)]
    pub build: Vec<BuildRule>,
}

impl Recipe {
    /// Parse a recipe from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize the recipe to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Check structural rules a parsed recipe must hold.
    pub fn validate(&self) -> Result<(), RecipeError> {
        let name = &self.package.name;
        let invalid = |reason: String| RecipeError::Invalid {
            name: name.clone(),
            reason,
        };

        format!("{name}@{}", self.package.version)
            .parse::<PackageSpec>()
            .map_err(|e| invalid(e.to_string()))?;

        for declared in &self.package.depends {
            declared
                .parse::<PackageSpec>()
                .map_err(|e| invalid(format!("dependency '{declared}': {e}")))?;
        }

        if self.build.is_empty() {
            return Err(invalid("no build rules".to_string()));
        }
        for rule in &self.build {
            if rule.steps.is_empty() {
                return Err(invalid("build rule with no steps".to_string()));
            }
            for step in &rule.steps {
                if step.run.is_empty() {
                    return Err(invalid("build step with an empty command".to_string()));
                }
            }
            if let Some(requirement) = &rule.when {
                VersionReq::parse(requirement)
                    .map_err(|e| invalid(format!("version requirement '{requirement}': {e}")))?;
            }
        }
        Ok(())
    }

    /// Choose the build rule for a concrete version. First match wins.
    pub fn rule_for(&self, version: &str) -> Option<&BuildRule> {
        self.build.iter().find(|rule| rule.matches(version))
    }

    /// Concretize a query against this recipe's defaults.
    ///
    /// The result pins a version (query's, else the recipe default) and
    /// carries the recipe's default variants overridden by the query's.
    pub fn concretize(&self, query: &PackageSpec) -> Result<PackageSpec, SpecError> {
        let mut spec = PackageSpec::new(self.package.name.clone())?;
        let version = query.version().unwrap_or(&self.package.version);
        spec = spec.with_version(version);
        for (name, default) in &self.package.variants {
            spec = spec.with_variant(name.clone(), default.to_value());
        }
        for (name, value) in query.variants() {
            spec = spec.with_variant(name.clone(), value.clone());
        }
        if let Some(compiler) = query.compiler() {
            spec = spec.with_compiler(compiler.clone());
        }
        Ok(spec)
    }
}

/// Source of package recipes
pub trait RecipeSource {
    /// Load the recipe for `name`.
    fn load(&self, name: &str) -> Result<Recipe, RecipeError>;

    /// Names of every available recipe, sorted.
    fn available(&self) -> Vec<String>;
}

/// Recipes stored as `<dir>/<name>.toml`
#[derive(Debug, Clone)]
pub struct DirRecipeSource {
    dir: PathBuf,
}

impl DirRecipeSource {
    /// Create a source over a recipe directory.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Recipe directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecipeSource for DirRecipeSource {
    fn load(&self, name: &str) -> Result<Recipe, RecipeError> {
        let path = self.dir.join(format!("{name}.{RECIPE_EXTENSION}"));
        if !path.exists() {
            return Err(RecipeError::NotFound {
                name: name.to_string(),
            });
        }
        let content = fs::read_to_string(&path).map_err(|e| RecipeError::Read {
            path: path.clone(),
            error: e.to_string(),
        })?;
        let recipe = Recipe::from_toml(&content).map_err(|e| RecipeError::Parse {
            path,
            error: e.to_string(),
        })?;
        recipe.validate()?;
        if recipe.package.name != name {
            return Err(RecipeError::Invalid {
                name: name.to_string(),
                reason: format!("file declares package '{}'", recipe.package.name),
            });
        }
        Ok(recipe)
    }

    fn available(&self) -> Vec<String> {
        let Ok(dir) = fs::read_dir(&self.dir) else {
            tracing::debug!(dir = %self.dir.display(), "recipe directory not readable");
            return Vec::new();
        };
        let mut names: Vec<String> = dir
            .flatten()
            .filter_map(|file| {
                let path = file.path();
                if path.extension().and_then(|ext| ext.to_str()) == Some(RECIPE_EXTENSION) {
                    path.file_stem()
                        .and_then(|stem| stem.to_str())
                        .map(ToString::to_string)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names
    }
}

/// Resolve a possibly-partial query to one concrete spec.
///
/// Prefers the newest installed match; falls back to concretizing from
/// the recipe defaults when nothing matching is installed.
pub fn concretize_query(
    registry: &InstalledRegistry,
    recipes: &dyn RecipeSource,
    query: &PackageSpec,
) -> Result<PackageSpec, ResolveError> {
    let matches = registry.query(query);
    let best = matches.iter().max_by(|a, b| {
        compare_versions(
            a.spec.version().unwrap_or(""),
            b.spec.version().unwrap_or(""),
        )
        .then_with(|| a.spec.cmp(&b.spec))
    });
    if let Some(entry) = best {
        return Ok(entry.spec.clone());
    }

    let recipe = recipes.load(query.name()).map_err(|e| match e {
        RecipeError::NotFound { name } => ResolveError::UnknownPackage { name },
        other => ResolveError::Recipe(other),
    })?;
    Ok(recipe.concretize(query)?)
}

/// Concrete direct dependencies a not-yet-installed spec declares.
pub fn declared_dependencies(
    registry: &InstalledRegistry,
    recipes: &dyn RecipeSource,
    spec: &PackageSpec,
) -> Result<Vec<PackageSpec>, GraphError> {
    let recipe = recipes.load(spec.name()).map_err(|e| GraphError::Recipe {
        spec: spec.to_string(),
        error: e.to_string(),
    })?;

    let mut deps: Vec<PackageSpec> = Vec::new();
    for declared in &recipe.package.depends {
        let query: PackageSpec = declared.parse().map_err(|e: SpecError| GraphError::Recipe {
            spec: spec.to_string(),
            error: format!("dependency '{declared}': {e}"),
        })?;
        let concrete =
            concretize_query(registry, recipes, &query).map_err(|e| GraphError::Recipe {
                spec: spec.to_string(),
                error: format!("dependency '{declared}': {e}"),
            })?;
        if !deps.contains(&concrete) {
            deps.push(concrete);
        }
    }
    Ok(deps)
}

/// Match a version token against a semver requirement.
///
/// Partial versions are padded before matching; tokens that still do not
/// parse fall back to exact string comparison against the requirement.
fn version_req_matches(requirement: &str, version: &str) -> bool {
    match (VersionReq::parse(requirement), lenient_semver(version)) {
        (Ok(req), Some(parsed)) => req.matches(&parsed),
        _ => requirement == version,
    }
}
