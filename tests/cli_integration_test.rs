mod common;

use std::fs;
use std::process::{Command, Output};

use common::{MINIMAL_MANIFEST, TestFixtures, create_package_dir, manifest_path};
use tempfile::TempDir;

fn tagtree(args: &[&str]) -> Output {
    // An empty working directory keeps stray tagtree.toml files out of the run
    let work_dir = TempDir::new().unwrap();
    Command::new(env!("CARGO_BIN_EXE_tagtree"))
        .args(args)
        .current_dir(work_dir.path())
        .env_remove("TAGTREE_FORMAT")
        .env_remove("TAGTREE_VERBOSE")
        .env_remove("TAGTREE_QUIET")
        .env_remove("TAGTREE_TRIM_TEXT")
        .env_remove("TAGTREE_LOG")
        .output()
        .expect("Failed to execute tagtree")
}

#[test]
fn test_cli_help_output() {
    let output = tagtree(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("--format"));
    assert!(stdout.contains("--verbose"));
    assert!(stdout.contains("--quiet"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--trim-text"));
}

#[test]
fn test_cli_version_output() {
    let output = tagtree(&["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(&format!("tagtree {}", env!("CARGO_PKG_VERSION"))));
}

#[test]
fn test_cli_human_summary() {
    let fixtures = TestFixtures::new();
    let manifest = fixtures.geometry_package();
    let output = tagtree(&[manifest.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("geometry version 2.1"));
    assert!(stdout.contains("shapes (c) - 3 source files"));
    assert!(stdout.contains("units (any language) - 1 source file"));
}

#[test]
fn test_cli_json_output() {
    let fixtures = TestFixtures::new();
    let manifest = fixtures.geometry_package();
    let output = tagtree(&["--format", "json", manifest.to_str().unwrap()]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "geometry");
    assert_eq!(value["modules"][0]["compile_args"][1], "-Wall");
}

#[test]
fn test_cli_tree_output() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    let manifest = manifest_path(temp_dir.path());
    let output = tagtree(&["-f", "tree", manifest.to_str().unwrap()]);

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["element"], "#document");
    assert_eq!(value["children"][0]["element"], "package");
    assert_eq!(value["children"][0]["attributes"]["version"], "1.0");
}

#[test]
fn test_cli_invalid_manifest_exits_with_one() {
    let fixtures = TestFixtures::new();
    let manifest = fixtures.invalid_manifest("missing_author.xml");
    let output = tagtree(&[manifest.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("missing mandatory tags [author]"));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_verbose_error_has_suggestion() {
    let fixtures = TestFixtures::new();
    let manifest = fixtures.invalid_manifest("misplaced_file.xml");
    let output = tagtree(&["-v", manifest.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Unexpected sub tag <file> for tag <module>"));
    assert!(stderr.contains("Suggestion:"));
}

#[test]
fn test_cli_missing_manifest_exits_with_two() {
    let output = tagtree(&["/nonexistent/package.xml"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Manifest does not exist"));
}

#[test]
fn test_cli_conflicting_options() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    let manifest = manifest_path(temp_dir.path());
    let output = tagtree(&["--verbose", "--quiet", manifest.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("cannot be used with"));
}

#[test]
fn test_cli_config_file() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    let manifest = manifest_path(temp_dir.path());
    let config = temp_dir.path().join("settings.toml");
    fs::write(&config, "[output]\nformat = \"json\"\n").unwrap();

    let output = tagtree(&["--config", config.to_str().unwrap(), manifest.to_str().unwrap()]);
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["name"], "tiny");

    // A broken configuration is a usage error
    fs::write(&config, "[output\n").unwrap();
    let output = tagtree(&["--config", config.to_str().unwrap(), manifest.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Configuration Error"));
}

#[test]
fn test_cli_quiet_success_prints_nothing() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    let manifest = manifest_path(temp_dir.path());
    let output = tagtree(&["-q", manifest.to_str().unwrap()]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_prebuild_generates_docstring_includes() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    fs::write(
        temp_dir.path().join("one.doc"),
        "!DOC one\nReturns one.\n!END\n",
    )
    .unwrap();
    let manifest = manifest_path(temp_dir.path());

    let output = tagtree(&["--prebuild", "-q", manifest.to_str().unwrap()]);
    assert!(output.status.success());

    let include = fs::read_to_string(temp_dir.path().join("one.d")).unwrap();
    assert_eq!(include, "PyDoc_STRVAR(\n\tone_doc,\n\t\"Returns one.\\n\"\n\t);\n\n");
    // Only sources with a .doc file get an include
    assert!(!temp_dir.path().join("two.d").exists());
}

#[test]
fn test_cli_without_prebuild_leaves_sources_alone() {
    let temp_dir = create_package_dir(MINIMAL_MANIFEST);
    fs::write(temp_dir.path().join("one.doc"), "!DOC one\nx\n!END\n").unwrap();
    let manifest = manifest_path(temp_dir.path());

    let output = tagtree(&["-q", manifest.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(!temp_dir.path().join("one.d").exists());
}
