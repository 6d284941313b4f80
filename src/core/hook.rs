//! Build hooks
//!
//! A hook is the action that turns a planned task into an installed
//! package. The stock implementation runs the recipe's build steps as
//! subprocesses; tests substitute their own implementations to observe
//! orchestrator behavior without spawning anything.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::recipe::BuildStep;
use crate::core::spec::PackageSpec;
use crate::error::FailureCause;

/// Everything one package build needs to know.
///
/// Passed explicitly to each hook invocation; hooks never read ambient
/// process state to decide paths or parallelism.
#[derive(Debug, Clone)]
pub struct BuildContext {
    /// Concrete spec being built
    pub spec: PackageSpec,
    /// Install prefix the build must populate
    pub prefix: PathBuf,
    /// Scratch directory the build runs in
    pub build_dir: PathBuf,
    /// Install prefixes of the direct dependencies
    pub dependency_prefixes: Vec<PathBuf>,
    /// Parallel job count forwarded to the build tool
    pub jobs: usize,
    /// Pass subprocess output through instead of discarding it
    pub verbose: bool,
    /// Wall-clock limit per build step
    pub timeout: Option<Duration>,
}

impl BuildContext {
    /// Environment variables exported to every build step.
    pub fn env(&self) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();

        env.insert("MORTAR_SPEC".to_string(), self.spec.to_string());
        env.insert(
            "MORTAR_PREFIX".to_string(),
            self.prefix.display().to_string(),
        );
        env.insert(
            "MORTAR_BUILD_DIR".to_string(),
            self.build_dir.display().to_string(),
        );
        env.insert("MORTAR_JOBS".to_string(), self.jobs.to_string());

        if !self.dependency_prefixes.is_empty() {
            let prefixes = join_paths(self.dependency_prefixes.iter().cloned());
            let pkgconfig = join_paths(
                self.dependency_prefixes
                    .iter()
                    .map(|prefix| prefix.join("lib").join("pkgconfig")),
            );
            env.insert("MORTAR_DEP_PREFIXES".to_string(), prefixes.clone());
            env.insert("CMAKE_PREFIX_PATH".to_string(), prefixes);
            env.insert("PKG_CONFIG_PATH".to_string(), pkgconfig);
        }

        env
    }
}

fn join_paths(paths: impl Iterator<Item = PathBuf>) -> String {
    paths
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(":")
}

/// Action executed for one build task
#[async_trait::async_trait]
pub trait BuildHook: Send + Sync {
    /// Run the build described by `ctx` to completion.
    async fn run(&self, ctx: &BuildContext) -> Result<(), FailureCause>;
}

/// Runs the selected recipe rule's steps as subprocesses
#[derive(Debug, Clone)]
pub struct CommandHook {
    steps: Vec<BuildStep>,
}

impl CommandHook {
    /// Create a hook over a rule's steps.
    pub fn new(steps: Vec<BuildStep>) -> Self {
        Self { steps }
    }

    /// Steps this hook will run.
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }
}

#[async_trait::async_trait]
impl BuildHook for CommandHook {
    async fn run(&self, ctx: &BuildContext) -> Result<(), FailureCause> {
        for step in &self.steps {
            crate::infra::process::run_step(step, ctx).await?;
        }
        Ok(())
    }
}
