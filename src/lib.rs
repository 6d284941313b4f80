//! Mortar - dependency-aware package builder
//!
//! This library builds packages from declarative recipes into isolated
//! install prefixes, in dependency order, and records what is installed
//! in a durable registry.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic (specs, recipes, graphs, orchestration)
//! - [`infra`] - Infrastructure layer (filesystem, processes)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
