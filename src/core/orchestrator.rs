//! Build orchestration
//!
//! Coordinates the resolve, plan, and execute phases of a build batch.
//! Resolution turns query specs into concrete ones, planning produces a
//! dependencies-first task list with a hook per task, and execution runs
//! the hooks sequentially inside a single registry transaction with a
//! durable checkpoint after every successful install.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Settings;
use crate::core::graph::{DependencyGraph, OrderDirection, WalkOptions};
use crate::core::hook::{BuildContext, BuildHook, CommandHook};
use crate::core::recipe::{concretize_query, declared_dependencies, RecipeSource};
use crate::core::registry::{InstalledEntry, InstalledRegistry};
use crate::core::spec::PackageSpec;
use crate::error::{
    BuildFailure, GraphError, OrchestratorError, RecipeError, ResolveError, SpecError,
};
use crate::infra::filesystem;

/// Lifecycle of one planned build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Not started
    Pending,
    /// Hook currently running
    Running,
    /// Installed, or verified already installed
    Succeeded,
    /// Hook reported failure
    Failed,
    /// Never started because a dependency failed or the batch aborted
    Skipped,
}

/// What a build failure does to the rest of the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop the batch; later tasks are skipped
    #[default]
    AbortRemaining,
    /// Skip only dependents of the failed spec, keep building the rest
    KeepGoing,
}

/// Knobs for one `execute` run
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Parallel job count forwarded to build tools
    pub jobs: usize,
    /// Pass build output through to the terminal
    pub verbose: bool,
    /// Failure policy for the batch
    pub policy: FailurePolicy,
    /// Wall-clock limit per build step
    pub timeout: Option<Duration>,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
            verbose: false,
            policy: FailurePolicy::default(),
            timeout: None,
        }
    }
}

/// One scheduled package build
pub struct BuildTask {
    /// Concrete spec to build
    pub spec: PackageSpec,
    /// Direct dependencies, installed or earlier in the batch
    pub dependencies: Vec<PackageSpec>,
    /// Action run to produce the install
    hook: Arc<dyn BuildHook>,
    /// Current lifecycle state
    pub state: TaskState,
}

impl BuildTask {
    /// Create a pending task.
    pub fn new(spec: PackageSpec, dependencies: Vec<PackageSpec>, hook: Arc<dyn BuildHook>) -> Self {
        Self {
            spec,
            dependencies,
            hook,
            state: TaskState::Pending,
        }
    }
}

impl fmt::Debug for BuildTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildTask")
            .field("spec", &self.spec)
            .field("dependencies", &self.dependencies)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Outcome of one `execute` run
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Specs built and recorded this run
    pub succeeded: Vec<PackageSpec>,
    /// Specs that were already installed, left untouched
    pub up_to_date: Vec<PackageSpec>,
    /// Specs skipped because a dependency failed or the batch aborted
    pub skipped: Vec<PackageSpec>,
    /// Per-spec build failures
    pub failed: Vec<BuildFailure>,
    /// Wall-clock duration of the run
    pub elapsed: Duration,
}

impl BuildReport {
    /// True when no task failed.
    pub fn success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Resolves, plans, and executes build batches against one registry
pub struct BuildOrchestrator {
    registry: InstalledRegistry,
    recipes: Box<dyn RecipeSource>,
    settings: Settings,
}

impl BuildOrchestrator {
    /// Create an orchestrator over a registry and a recipe source.
    pub fn new(
        registry: InstalledRegistry,
        recipes: Box<dyn RecipeSource>,
        settings: Settings,
    ) -> Self {
        Self {
            registry,
            recipes,
            settings,
        }
    }

    /// Registry backing this orchestrator.
    pub fn registry(&self) -> &InstalledRegistry {
        &self.registry
    }

    /// Resolve query specs to concrete specs, in input order.
    ///
    /// A query matching exactly one installed entry resolves to it. A
    /// query matching none concretizes from its recipe. More than one
    /// match is an error unless `allow_ambiguous` opts into building
    /// every match. Duplicates resolve once.
    pub fn resolve(
        &self,
        queries: &[PackageSpec],
        allow_ambiguous: bool,
    ) -> Result<Vec<PackageSpec>, ResolveError> {
        let mut resolved: Vec<PackageSpec> = Vec::new();
        let mut push = |spec: PackageSpec, resolved: &mut Vec<PackageSpec>| {
            if !resolved.contains(&spec) {
                resolved.push(spec);
            }
        };

        for query in queries {
            let matches = self.registry.query(query);
            match matches.len() {
                0 => {
                    let concrete = concretize_query(&self.registry, self.recipes.as_ref(), query)?;
                    push(concrete, &mut resolved);
                }
                1 => push(matches[0].spec.clone(), &mut resolved),
                _ if allow_ambiguous => {
                    for entry in matches {
                        push(entry.spec.clone(), &mut resolved);
                    }
                }
                _ => {
                    return Err(ResolveError::Ambiguous {
                        query: query.to_string(),
                        matches: matches.iter().map(|e| e.spec.to_string()).collect(),
                    });
                }
            }
        }
        Ok(resolved)
    }

    /// Plan a dependencies-first batch of tasks for resolved specs.
    ///
    /// Each task carries the hook selected from its recipe's build rules
    /// for the concrete version, and its full direct dependency list.
    /// Fails before producing any task on a dependency cycle or, without
    /// `build_dependencies`, on a dependency that is not installed.
    pub fn plan(
        &self,
        resolved: &[PackageSpec],
        build_dependencies: bool,
    ) -> Result<Vec<BuildTask>, OrchestratorError> {
        let graph = DependencyGraph::build(
            &self.registry,
            self.recipes.as_ref(),
            resolved,
            WalkOptions {
                include_dependencies: build_dependencies,
                include_dependents: false,
            },
        )?;
        let order = graph.topological_order(OrderDirection::DependenciesFirst)?;

        let mut tasks = Vec::with_capacity(order.len());
        for spec in order {
            let recipe = self.recipes.load(spec.name())?;
            let version = spec.version().ok_or_else(|| SpecError::NotConcrete {
                spec: spec.to_string(),
                reason: "no version pinned".to_string(),
            })?;
            let rule = recipe
                .rule_for(version)
                .ok_or_else(|| RecipeError::NoRuleForVersion {
                    name: spec.name().to_string(),
                    version: version.to_string(),
                })?;
            let hook = Arc::new(CommandHook::new(rule.steps.clone()));

            let dependencies: Vec<PackageSpec> = match self.registry.get(&spec) {
                Some(entry) => entry.dependencies.iter().cloned().collect(),
                None => declared_dependencies(&self.registry, self.recipes.as_ref(), &spec)?,
            };
            tasks.push(BuildTask::new(spec, dependencies, hook));
        }
        Ok(tasks)
    }

    /// Execute a planned batch sequentially, in order.
    ///
    /// All registry writes happen inside one transaction; each
    /// successful install is checkpointed durably before the next task
    /// starts, so a dependent never runs before its dependency's entry
    /// is on disk. Already-installed tasks are no-ops. Build failures
    /// are recorded in the report; hard faults (configuration, registry,
    /// filesystem) abort with an error and roll back uncommitted state.
    pub async fn execute(
        &mut self,
        tasks: &mut [BuildTask],
        options: &ExecuteOptions,
    ) -> Result<BuildReport, OrchestratorError> {
        if options.jobs == 0 {
            return Err(OrchestratorError::InvalidConfiguration {
                message: "job count must be a positive integer".to_string(),
            });
        }

        let started = Instant::now();
        let mut report = BuildReport::default();
        let mut unbuilt: BTreeSet<PackageSpec> = BTreeSet::new();
        let mut aborted = false;

        let mut txn = self.registry.begin_transaction()?;
        for task in tasks.iter_mut() {
            if aborted {
                task.state = TaskState::Skipped;
                report.skipped.push(task.spec.clone());
                continue;
            }
            if txn.installed(&task.spec) {
                tracing::info!(spec = %task.spec, "already installed");
                task.state = TaskState::Succeeded;
                report.up_to_date.push(task.spec.clone());
                continue;
            }
            if let Some(dep) = task.dependencies.iter().find(|d| unbuilt.contains(d)) {
                tracing::warn!(spec = %task.spec, dependency = %dep, "skipped, dependency not built");
                task.state = TaskState::Skipped;
                unbuilt.insert(task.spec.clone());
                report.skipped.push(task.spec.clone());
                continue;
            }
            if let Some(dep) = task.dependencies.iter().find(|d| !txn.installed(d)) {
                return Err(GraphError::MissingDependency {
                    package: task.spec.to_string(),
                    dependency: dep.to_string(),
                }
                .into());
            }

            let prefix = prefix_for(&self.settings, &task.spec);
            let build_dir = build_dir_for(&self.settings, &task.spec);
            filesystem::create_dir_all(&prefix)?;
            filesystem::create_dir_all(&build_dir)?;

            let ctx = BuildContext {
                spec: task.spec.clone(),
                prefix: prefix.clone(),
                build_dir: build_dir.clone(),
                dependency_prefixes: task
                    .dependencies
                    .iter()
                    .filter_map(|dep| txn.prefix_of(dep))
                    .collect(),
                jobs: options.jobs,
                verbose: options.verbose,
                timeout: options.timeout,
            };

            task.state = TaskState::Running;
            tracing::info!(spec = %task.spec, "building");
            match task.hook.run(&ctx).await {
                Ok(()) => {
                    let entry = InstalledEntry::new(
                        task.spec.clone(),
                        prefix,
                        task.dependencies.iter().cloned().collect(),
                    )?;
                    txn.record_install(entry);
                    txn.checkpoint()?;
                    task.state = TaskState::Succeeded;
                    report.succeeded.push(task.spec.clone());
                    if let Err(e) = filesystem::remove_dir_all(&build_dir) {
                        tracing::debug!(spec = %task.spec, error = %e, "build directory left behind");
                    }
                }
                Err(cause) => {
                    tracing::warn!(spec = %task.spec, error = %cause, "build failed");
                    task.state = TaskState::Failed;
                    unbuilt.insert(task.spec.clone());
                    report.failed.push(BuildFailure {
                        spec: task.spec.to_string(),
                        cause,
                    });
                    if options.policy == FailurePolicy::AbortRemaining {
                        aborted = true;
                    }
                }
            }
        }
        txn.commit()?;

        report.elapsed = started.elapsed();
        Ok(report)
    }
}

/// Install prefix for a concrete spec under the configured root.
pub fn prefix_for(settings: &Settings, spec: &PackageSpec) -> PathBuf {
    settings.prefixes_dir().join(install_slug(spec))
}

/// Scratch build directory for a concrete spec.
pub fn build_dir_for(settings: &Settings, spec: &PackageSpec) -> PathBuf {
    settings.build_dir().join(install_slug(spec))
}

/// Directory-safe rendering of a canonical spec.
fn install_slug(spec: &PackageSpec) -> String {
    spec.to_string().replace(' ', ",").replace('/', "_")
}
