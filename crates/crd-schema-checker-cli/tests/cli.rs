use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../crd-schema-checker/tests/fixtures")
        .join(name)
}

/// Runs the binary inside `working_dir` so that no stray configuration file is
/// picked up.
fn run(working_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_crd-schema-checker"))
        .current_dir(working_dir)
        .env_remove("CRD_SCHEMA_CHECKER_CONFIG")
        .env_remove("CRD_SCHEMA_CHECKER_LOG")
        .args(args)
        .output()
        .expect("binary must run")
}

#[test]
fn compare_fails_on_incompatible_changes() {
    let dir = tempfile::tempdir().expect("create temporary directory");
    let existing = fixture("existing.yaml");
    let new = fixture("new.yaml");

    let output = run(
        dir.path(),
        &[
            "compare",
            "--existing",
            existing.to_str().expect("fixture path is UTF-8"),
            "--new",
            new.to_str().expect("fixture path is UTF-8"),
        ],
    );

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("ERROR   crd/widgets.example.com version/v1 field/spec.image may not be removed"),
        "{stdout}"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("found 6 problem(s) in 2 CRD(s)"), "{stderr}");
}

#[test]
fn configuration_disables_comparators() {
    let dir = tempfile::tempdir().expect("create temporary directory");
    std::fs::write(
        dir.path().join(".crd-schema-checker.yaml"),
        "disabledComparators: [NoFloats, NoBools]\n",
    )
    .expect("write configuration");
    let new = fixture("new.yaml");

    let output = run(
        dir.path(),
        &["validate", new.to_str().expect("fixture path is UTF-8")],
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "{stdout}");
    assert_eq!(stdout, "No problems found.\n");
}

#[test]
fn unknown_comparator_in_configuration_is_an_error() {
    let dir = tempfile::tempdir().expect("create temporary directory");
    let config = dir.path().join("config.yaml");
    std::fs::write(&config, "disabledComparators: [NoSuchThing]\n").expect("write configuration");

    let output = run(
        dir.path(),
        &["--config", config.to_str().expect("path is UTF-8"), "list"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NoSuchThing"), "{stderr}");
}

#[test]
fn list_as_json() {
    let dir = tempfile::tempdir().expect("create temporary directory");

    let output = run(dir.path(), &["list", "--output-format", "json"]);

    assert!(output.status.success());
    let comparators: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("output is JSON");
    assert_eq!(comparators[0]["name"], "NoFieldRemoval");
    assert_eq!(comparators.as_array().map(Vec::len), Some(9));
}
