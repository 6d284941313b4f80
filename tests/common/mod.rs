//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::PathBuf;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Test data root
///
/// Creates a temporary mortar root with a recipe directory and runs
/// the binary against it.
pub struct TestRoot {
    /// Temporary directory backing the root
    pub dir: TempDir,
}

impl TestRoot {
    /// Create a new empty root with a recipe directory
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir_all(dir.path().join("recipes"))
            .expect("Failed to create recipe directory");
        Self { dir }
    }

    /// Path of the data root
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Install prefix mortar uses for a concrete spec
    #[allow(dead_code)]
    pub fn prefix(&self, spec: &str) -> PathBuf {
        self.dir
            .path()
            .join("prefixes")
            .join(spec.replace(' ', ",").replace('/', "_"))
    }

    /// Write a recipe file into the recipe directory
    pub fn write_recipe(&self, name: &str, content: &str) {
        let path = self.dir.path().join("recipes").join(format!("{name}.toml"));
        std::fs::write(path, content).expect("Failed to write recipe");
    }

    /// Run mortar against this root
    pub fn run(&self, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_mortar"));
        cmd.arg("--root").arg(self.dir.path());
        cmd.env_remove("MORTAR_ROOT");
        cmd.env_remove("MORTAR_RECIPES");
        cmd.env_remove("RUST_LOG");
        for arg in args {
            cmd.arg(arg);
        }
        cmd.output().expect("Failed to execute mortar")
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Recipe whose build touches a marker file in its prefix
#[allow(dead_code)]
pub fn marker_recipe(name: &str, version: &str, depends: &[&str]) -> String {
    let depends_line = if depends.is_empty() {
        String::new()
    } else {
        let quoted: Vec<String> = depends.iter().map(|d| format!("\"{d}\"")).collect();
        format!("depends = [{}]\n", quoted.join(", "))
    };
    format!(
        r#"[package]
name = "{name}"
version = "{version}"
{depends_line}
[[build]]

[[build.steps]]
run = "sh"
args = ["-c", "touch \"$MORTAR_PREFIX/built.marker\""]
"#
    )
}

/// Recipe whose build always fails
#[allow(dead_code)]
pub fn failing_recipe(name: &str, version: &str) -> String {
    format!(
        r#"[package]
name = "{name}"
version = "{version}"

[[build]]

[[build.steps]]
run = "sh"
args = ["-c", "exit 7"]
"#
    )
}
