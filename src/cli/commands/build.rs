//! Build command implementation
//!
//! Implements `mortar build` to build packages and their dependencies
//! into install prefixes.

use std::time::Duration;

use anyhow::{bail, Result};

use crate::cli::output::{create_spinner, status};
use crate::config::Settings;
use crate::core::orchestrator::{BuildOrchestrator, BuildReport, ExecuteOptions, FailurePolicy};
use crate::core::recipe::DirRecipeSource;
use crate::core::registry::InstalledRegistry;
use crate::core::spec::PackageSpec;

/// Build options
pub struct BuildOptions {
    /// Build every installed match of an ambiguous spec
    pub all: bool,
    /// Also build dependencies that are not installed yet
    pub build_dependencies: bool,
    /// Number of parallel jobs passed to build tools
    pub jobs: Option<usize>,
    /// Keep building packages unaffected by a failure
    pub keep_going: bool,
    /// Per-package time limit in seconds
    pub timeout: Option<u64>,
    /// Show the build order without building
    pub dry_run: bool,
    /// Stream build tool output
    pub verbose: bool,
}

/// Execute the build command
pub async fn execute(settings: &Settings, specs: &[String], options: BuildOptions) -> Result<()> {
    let queries = parse_specs(specs)?;

    let registry = InstalledRegistry::load(settings.registry_dir())?;
    let recipes = DirRecipeSource::new(settings.recipes_dir());
    let mut orchestrator = BuildOrchestrator::new(registry, Box::new(recipes), settings.clone());

    let resolved = orchestrator.resolve(&queries, options.all)?;
    let mut tasks = orchestrator.plan(&resolved, options.build_dependencies)?;

    if options.dry_run {
        println!("Build order:");
        for task in &tasks {
            if orchestrator.registry().contains(&task.spec) {
                println!("  {} (installed)", task.spec);
            } else {
                println!("  {}", task.spec);
            }
        }
        return Ok(());
    }

    let jobs = options.jobs.unwrap_or_else(num_cpus::get);
    tracing::info!("Building {} packages with {} jobs", tasks.len(), jobs);

    let exec_options = ExecuteOptions {
        jobs,
        verbose: options.verbose,
        policy: if options.keep_going {
            FailurePolicy::KeepGoing
        } else {
            FailurePolicy::AbortRemaining
        },
        timeout: options.timeout.map(Duration::from_secs),
    };

    // The spinner would garble streamed build output in verbose mode.
    let spinner = (!options.verbose)
        .then(|| create_spinner(&format!("Building {} package(s)...", tasks.len())));
    let result = orchestrator.execute(&mut tasks, &exec_options).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    let report = result?;

    print_report(&report);
    if report.success() {
        Ok(())
    } else {
        bail!("{} package(s) failed to build", report.failed.len());
    }
}

fn parse_specs(specs: &[String]) -> Result<Vec<PackageSpec>> {
    specs
        .iter()
        .map(|raw| raw.parse::<PackageSpec>().map_err(Into::into))
        .collect()
}

/// Display the batch outcome
fn print_report(report: &BuildReport) {
    if report.success() {
        println!("{} Build complete!", status::SUCCESS);
    } else {
        println!("{} Build finished with failures", status::ERROR);
    }
    if !report.succeeded.is_empty() {
        println!("  Built: {}", report.succeeded.len());
    }
    if !report.up_to_date.is_empty() {
        println!("  Already installed: {}", report.up_to_date.len());
    }
    if !report.skipped.is_empty() {
        println!("  Skipped: {}", report.skipped.len());
        for spec in &report.skipped {
            println!("    {spec}");
        }
    }
    for failure in &report.failed {
        println!("  {} {failure}", status::ERROR);
    }
    println!("  Time: {:.1}s", report.elapsed.as_secs_f64());
}
