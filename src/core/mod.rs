//! Core business logic module
//!
//! Build planning and registry state live here; all subprocess and
//! filesystem side effects stay in [`crate::infra`].
//!
//! # Submodules
//!
//! - [`spec`] - Package spec parsing, matching, and ordering
//! - [`recipe`] - Build recipe loading and concretization
//! - [`registry`] - Installed-package database
//! - [`transaction`] - Atomic registry mutation
//! - [`graph`] - Dependency DAG and topological ordering
//! - [`hook`] - Build hook abstraction and command hooks
//! - [`orchestrator`] - Resolve, plan, and execute build batches
//! - [`uninstall`] - Dependents-first package removal
//! - [`tree`] - Dependency tree rendering
//! - [`check`] - Registry and build-tool health checks

pub mod check;
pub mod graph;
pub mod hook;
pub mod orchestrator;
pub mod recipe;
pub mod registry;
pub mod spec;
pub mod transaction;
pub mod tree;
pub mod uninstall;
