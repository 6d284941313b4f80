//! Error types for mortar
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Spec parsing and validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// Empty package name
    #[error("Spec has an empty package name")]
    EmptyName,

    /// Package name violates the name grammar
    #[error("Invalid package name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    /// Malformed version token
    #[error("Invalid version in spec '{spec}': {reason}")]
    InvalidVersion { spec: String, reason: String },

    /// Malformed variant token
    #[error("Invalid variant in spec '{spec}': {reason}")]
    InvalidVariant { spec: String, reason: String },

    /// Malformed compiler selector
    #[error("Invalid compiler in spec '{spec}': {reason}")]
    InvalidCompiler { spec: String, reason: String },

    /// Character that fits no spec component
    #[error("Unexpected character '{found}' in spec '{spec}'")]
    UnexpectedCharacter { spec: String, found: char },

    /// Spec lacks the parts needed to identify one build
    #[error("Spec '{spec}' is not concrete: {reason}")]
    NotConcrete { spec: String, reason: String },
}

/// Recipe loading and validation errors
#[derive(Error, Debug)]
pub enum RecipeError {
    /// No recipe file for the package
    #[error("No recipe found for package '{name}'")]
    NotFound { name: String },

    /// IO error reading the recipe file
    #[error("Failed to read recipe at '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// TOML parse error
    #[error("Failed to parse recipe at '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Recipe parsed but violates a structural rule
    #[error("Invalid recipe '{name}': {reason}")]
    Invalid { name: String, reason: String },

    /// No build rule covers the requested version
    #[error("Recipe '{name}' has no build rule for version {version}")]
    NoRuleForVersion { name: String, version: String },
}

/// Spec resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Partial spec matches more than one installed package
    #[error("Spec '{query}' is ambiguous, matches: {}", matches.join(", "))]
    Ambiguous { query: String, matches: Vec<String> },

    /// Nothing installed and no recipe available
    #[error("Package '{name}' is not installed and no recipe provides it")]
    UnknownPackage { name: String },

    /// Query matches nothing installed
    #[error("Spec '{query}' does not match any installed package")]
    NotInstalled { query: String },

    /// Spec error
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Recipe error
    #[error(transparent)]
    Recipe(#[from] RecipeError),
}

/// Dependency graph errors
#[derive(Error, Debug)]
pub enum GraphError {
    /// Circular dependency detected
    #[error("Circular dependency detected: {}", cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// Dependency is neither installed nor scheduled for build
    #[error("Dependency '{dependency}' of '{package}' is not installed (pass --build-dependencies to build it)")]
    MissingDependency { package: String, dependency: String },

    /// Recipe lookup failed while walking declared dependencies
    #[error("Failed to load recipe for '{spec}': {error}")]
    Recipe { spec: String, error: String },
}

/// Registry store errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Failed to create the registry directory
    #[error("Failed to create registry directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// IO error reading the store
    #[error("Failed to read registry store at '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Store exists but does not parse
    #[error("Failed to parse registry store at '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Store was written by an incompatible mortar version
    #[error("Registry store version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    /// Failed to open the lock file
    #[error("Failed to open registry lock at '{path}': {error}")]
    OpenLock { path: PathBuf, error: String },
}

/// Registry transaction errors
#[derive(Error, Debug)]
pub enum TransactionError {
    /// Failed to acquire the exclusive writer lock
    #[error("Failed to lock registry at '{path}': {error}")]
    Lock { path: PathBuf, error: String },

    /// Staged state did not serialize
    #[error("Failed to serialize registry store: {error}")]
    Serialize { error: String },

    /// Durable write of the store failed
    #[error("Failed to write registry store at '{path}': {error}")]
    Store { path: PathBuf, error: String },
}

/// Why a single package build failed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// Build command exited nonzero
    #[error("build command exited with status {code}")]
    Exit { code: i32 },

    /// Build command died without an exit code
    #[error("build command terminated by signal")]
    Terminated,

    /// Build exceeded the configured time limit
    #[error("build timed out after {limit_secs}s")]
    Timeout { limit_secs: u64 },

    /// Could not spawn or supervise the build command
    #[error("{message}")]
    Io { message: String },
}

/// A recorded build failure for one spec
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Build of '{spec}' failed: {cause}")]
pub struct BuildFailure {
    /// Display form of the failed spec
    pub spec: String,
    /// What went wrong
    pub cause: FailureCause,
}

/// Build orchestration errors
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Options that can never produce a valid run
    #[error("Invalid build configuration: {message}")]
    InvalidConfiguration { message: String },

    /// Spec error
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// Resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Graph error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Recipe error
    #[error(transparent)]
    Recipe(#[from] RecipeError),

    /// Transaction error
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Uninstall errors
#[derive(Error, Debug)]
pub enum UninstallError {
    /// Query matches nothing installed
    #[error("Spec '{query}' does not match any installed package")]
    NoMatch { query: String },

    /// Removal would strand installed dependents
    #[error("Cannot uninstall '{spec}', required by: {} (pass --dependents to remove them too)", dependents.join(", "))]
    HasDependents { spec: String, dependents: Vec<String> },

    /// Resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Graph error
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Transaction error
    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to read file or directory
    #[error("Failed to read '{path}': {error}")]
    Read { path: PathBuf, error: String },
}

/// Top-level mortar error type
#[derive(Error, Debug)]
pub enum MortarError {
    /// Spec error
    #[error("Spec error: {0}")]
    Spec(#[from] SpecError),

    /// Recipe error
    #[error("Recipe error: {0}")]
    Recipe(#[from] RecipeError),

    /// Resolution error
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    /// Graph error
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    /// Registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Transaction error
    #[error("Transaction error: {0}")]
    Transaction(#[from] TransactionError),

    /// Orchestrator error
    #[error("Build error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    /// Uninstall error
    #[error("Uninstall error: {0}")]
    Uninstall(#[from] UninstallError),

    /// Filesystem error
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),
}
