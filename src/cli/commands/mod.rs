//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod check;
pub mod list;
pub mod tree;
pub mod uninstall;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Settings;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build packages from recipes into install prefixes
    Build {
        /// Package specs to build (e.g. "hdf5@1.14.3 +mpi %gcc@13.2")
        #[arg(required = true, value_name = "SPEC")]
        specs: Vec<String>,

        /// Build every installed match of an ambiguous spec
        #[arg(short, long)]
        all: bool,

        /// Also build dependencies that are not installed yet
        #[arg(short = 'd', long)]
        build_dependencies: bool,

        /// Number of parallel jobs passed to build tools
        #[arg(short, long, value_name = "N")]
        jobs: Option<usize>,

        /// Keep building packages unaffected by a failure
        #[arg(long)]
        keep_going: bool,

        /// Per-package time limit in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Show the build order without building anything
        #[arg(long)]
        dry_run: bool,
    },

    /// List installed packages
    List {
        /// Restrict output to packages matching this spec
        #[arg(value_name = "SPEC")]
        spec: Option<String>,

        /// Show prefixes, install times, and sizes
        #[arg(short, long)]
        long: bool,
    },

    /// Remove installed packages
    Uninstall {
        /// Package specs to uninstall
        #[arg(required = true, value_name = "SPEC")]
        specs: Vec<String>,

        /// Remove every installed match of an ambiguous spec
        #[arg(short, long)]
        all: bool,

        /// Also remove packages that depend on the targets
        #[arg(short = 'R', long)]
        dependents: bool,

        /// Show what would be removed without removing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Display the dependency tree of an installed package
    Tree {
        /// Package spec to start from
        #[arg(value_name = "SPEC")]
        spec: String,

        /// Walk dependents upward instead of dependencies
        #[arg(long)]
        dependents: bool,
    },

    /// Check build tools and registry health
    Check,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, settings: &Settings, verbose: bool) -> Result<()> {
        match self {
            Self::Build {
                specs,
                all,
                build_dependencies,
                jobs,
                keep_going,
                timeout,
                dry_run,
            } => {
                let options = build::BuildOptions {
                    all,
                    build_dependencies,
                    jobs,
                    keep_going,
                    timeout,
                    dry_run,
                    verbose,
                };
                build::execute(settings, &specs, options).await
            }
            Self::List { spec, long } => list::execute(settings, spec.as_deref(), long).await,
            Self::Uninstall {
                specs,
                all,
                dependents,
                dry_run,
            } => uninstall::execute(settings, &specs, all, dependents, dry_run).await,
            Self::Tree { spec, dependents } => tree::execute(settings, &spec, dependents).await,
            Self::Check => check::execute(settings).await,
        }
    }
}
