//! Integration tests for `mortar build`
//!
//! End-to-end coverage of resolution, planning, and execution:
//! - builds a package from its recipe into an install prefix
//! - builds missing dependencies with --build-dependencies
//! - refuses missing dependencies without the opt-in
//! - is idempotent for already-installed targets
//! - aborts or keeps going after a failure per --keep-going
//! - exports the build environment to recipe steps

mod common;

use common::{failing_recipe, marker_recipe, TestRoot};
use proptest::prelude::*;

/// Helper to run mortar build
fn run_build(root: &TestRoot, args: &[&str]) -> std::process::Output {
    let mut full = vec!["build"];
    full.extend_from_slice(args);
    root.run(&full)
}

/// Helper to run mortar list
fn run_list(root: &TestRoot, args: &[&str]) -> std::process::Output {
    let mut full = vec!["list"];
    full.extend_from_slice(args);
    root.run(&full)
}

#[test]
fn test_build_installs_package() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));

    let output = run_build(&root, &["zlib"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "build should succeed: stdout={stdout}, stderr={stderr}"
    );
    assert!(stdout.contains("Build complete"), "stdout={stdout}");
    assert!(
        root.prefix("zlib@1.3").join("built.marker").exists(),
        "build step should run inside the install prefix"
    );
}

#[test]
fn test_build_cleans_up_build_directory() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));

    let output = run_build(&root, &["zlib"]);
    assert!(output.status.success());
    assert!(
        !root.path().join("build").join("zlib@1.3").exists(),
        "scratch directory should be removed after a successful build"
    );
}

#[test]
fn test_build_dependencies_installs_chain() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));
    root.write_recipe("hdf5", &marker_recipe("hdf5", "1.14.3", &["zlib"]));

    let output = run_build(&root, &["--build-dependencies", "hdf5"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(
        output.status.success(),
        "build -d should succeed: stdout={stdout}, stderr={stderr}"
    );
    assert!(root.prefix("zlib@1.3").join("built.marker").exists());
    assert!(root.prefix("hdf5@1.14.3").join("built.marker").exists());

    let list = run_list(&root, &[]);
    let list_stdout = String::from_utf8_lossy(&list.stdout);
    assert!(list_stdout.contains("zlib@1.3"));
    assert!(list_stdout.contains("hdf5@1.14.3"));
}

#[test]
fn test_build_refuses_missing_dependency_without_opt_in() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));
    root.write_recipe("hdf5", &marker_recipe("hdf5", "1.14.3", &["zlib"]));

    let output = run_build(&root, &["hdf5"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "build should fail");
    assert!(
        stderr.contains("--build-dependencies"),
        "error should point at the opt-in flag: {stderr}"
    );
    assert!(!root.prefix("hdf5@1.14.3").join("built.marker").exists());
}

#[test]
fn test_build_dry_run_builds_nothing() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));
    root.write_recipe("hdf5", &marker_recipe("hdf5", "1.14.3", &["zlib"]));

    let output = run_build(&root, &["--dry-run", "--build-dependencies", "hdf5"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("Build order:"), "stdout={stdout}");
    let zlib_at = stdout.find("zlib@1.3").expect("order lists zlib");
    let hdf5_at = stdout.find("hdf5@1.14.3").expect("order lists hdf5");
    assert!(zlib_at < hdf5_at, "dependencies come first: {stdout}");
    assert!(!root.prefix("zlib@1.3").exists());
    assert!(!root.prefix("hdf5@1.14.3").exists());
}

#[test]
fn test_build_is_idempotent() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));

    let first = run_build(&root, &["zlib"]);
    assert!(first.status.success());

    let second = run_build(&root, &["zlib"]);
    let stdout = String::from_utf8_lossy(&second.stdout);
    assert!(second.status.success(), "second build should succeed");
    assert!(
        stdout.contains("Already installed"),
        "second build should report the package as up to date: {stdout}"
    );
}

#[test]
fn test_build_failure_aborts_remaining() {
    let root = TestRoot::new();
    root.write_recipe("broken", &failing_recipe("broken", "1.0"));
    root.write_recipe("bystander", &marker_recipe("bystander", "2.0", &[]));

    let output = run_build(&root, &["broken", "bystander"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success(), "build should fail");
    assert!(
        stdout.contains("exited with status 7"),
        "failure cause should be reported: {stdout}"
    );
    assert!(stdout.contains("Skipped"), "stdout={stdout}");
    assert!(
        !root.prefix("bystander@2.0").join("built.marker").exists(),
        "later packages should not run after an abort"
    );
}

#[test]
fn test_build_keep_going_builds_bystanders() {
    let root = TestRoot::new();
    root.write_recipe("broken", &failing_recipe("broken", "1.0"));
    root.write_recipe("bystander", &marker_recipe("bystander", "2.0", &[]));

    let output = run_build(&root, &["--keep-going", "broken", "bystander"]);

    assert!(!output.status.success(), "failures still fail the run");
    assert!(
        root.prefix("bystander@2.0").join("built.marker").exists(),
        "unaffected packages should still build with --keep-going"
    );
}

#[test]
fn test_build_failed_package_is_not_registered() {
    let root = TestRoot::new();
    root.write_recipe("broken", &failing_recipe("broken", "1.0"));

    let output = run_build(&root, &["broken"]);
    assert!(!output.status.success());

    let list = run_list(&root, &[]);
    let stdout = String::from_utf8_lossy(&list.stdout);
    assert!(
        stdout.contains("No packages installed"),
        "failed build must not appear in the registry: {stdout}"
    );
}

#[test]
fn test_build_rejects_zero_jobs() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));

    let output = run_build(&root, &["--jobs", "0", "zlib"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("job count must be a positive integer"),
        "stderr={stderr}"
    );
    assert!(!root.prefix("zlib@1.3").join("built.marker").exists());
}

#[test]
fn test_build_ambiguous_spec_requires_all() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));

    assert!(run_build(&root, &["zlib@1.2.13"]).status.success());
    assert!(run_build(&root, &["zlib@1.3"]).status.success());

    let output = run_build(&root, &["zlib"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success(), "ambiguous spec should fail");
    assert!(stderr.contains("is ambiguous"), "stderr={stderr}");

    let with_all = run_build(&root, &["--all", "zlib"]);
    assert!(
        with_all.status.success(),
        "--all accepts every installed match"
    );
}

#[test]
fn test_build_unknown_package_fails() {
    let root = TestRoot::new();

    let output = run_build(&root, &["ghost"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(
        stderr.contains("not installed and no recipe provides it"),
        "stderr={stderr}"
    );
}

#[test]
fn test_build_exports_spec_and_jobs_env() {
    let root = TestRoot::new();
    root.write_recipe(
        "probe",
        r#"[package]
name = "probe"
version = "1.0"

[[build]]

[[build.steps]]
run = "sh"
args = ["-c", "printf '%s:%s' \"$MORTAR_SPEC\" \"$MORTAR_JOBS\" > \"$MORTAR_PREFIX/env.txt\""]
"#,
    );

    let output = run_build(&root, &["--jobs", "3", "probe"]);
    assert!(output.status.success());

    let env = std::fs::read_to_string(root.prefix("probe@1.0").join("env.txt"))
        .expect("build step should write into its prefix");
    assert_eq!(env, "probe@1.0:3");
}

#[test]
fn test_build_exports_dependency_prefixes() {
    let root = TestRoot::new();
    root.write_recipe("zlib", &marker_recipe("zlib", "1.3", &[]));
    root.write_recipe(
        "hdf5",
        r#"[package]
name = "hdf5"
version = "1.14.3"
depends = ["zlib"]

[[build]]

[[build.steps]]
run = "sh"
args = ["-c", "printf '%s' \"$CMAKE_PREFIX_PATH\" > \"$MORTAR_PREFIX/deps.txt\""]
"#,
    );

    let output = run_build(&root, &["--build-dependencies", "hdf5"]);
    assert!(output.status.success());

    let deps = std::fs::read_to_string(root.prefix("hdf5@1.14.3").join("deps.txt"))
        .expect("build step should write into its prefix");
    assert!(
        deps.contains(root.prefix("zlib@1.3").to_str().unwrap()),
        "dependency prefix should be exported: {deps}"
    );
}

#[test]
fn test_build_timeout_fails_slow_package() {
    let root = TestRoot::new();
    root.write_recipe(
        "slow",
        r#"[package]
name = "slow"
version = "1.0"

[[build]]

[[build.steps]]
run = "sh"
args = ["-c", "sleep 5"]
"#,
    );

    let output = run_build(&root, &["--timeout", "1", "slow"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(!output.status.success());
    assert!(stdout.contains("timed out"), "stdout={stdout}");
}

// ============================================
// Property-Based Tests
// ============================================

/// Strategy for generating valid package names
fn package_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,10}".prop_filter("non-empty", |s| !s.is_empty())
}

/// Strategy for generating valid version strings
fn version_strategy() -> impl Strategy<Value = String> {
    (1u32..10, 0u32..10, 0u32..10)
        .prop_map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// Any buildable recipe lands in the registry under its concrete spec.
    #[test]
    fn prop_built_package_is_listed(
        name in package_name_strategy(),
        version in version_strategy()
    ) {
        let root = TestRoot::new();
        root.write_recipe(&name, &marker_recipe(&name, &version, &[]));

        let spec = format!("{name}@{version}");
        let build = run_build(&root, &[name.as_str()]);
        prop_assert!(build.status.success());
        prop_assert!(root.prefix(&spec).join("built.marker").exists());

        let list = run_list(&root, &[]);
        let stdout = String::from_utf8_lossy(&list.stdout);
        prop_assert!(stdout.contains(&spec));
    }
}
