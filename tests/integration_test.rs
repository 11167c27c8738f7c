use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const CONFIG_FILENAME: &str = "tfstack.hcl";
const TMP_STATEFILE_NAME: &str = ".tfstack-mv-tmp.tfstate";
const MANIFEST_FILENAME: &str = ".tfstack-mv-manifest";

fn write_config(root: &Path, module: &str) {
    let dir = root.join(module);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(CONFIG_FILENAME), "# module\n").unwrap();
}

/// A stand-in terraform binary that answers `version`, `state pull` and
/// `state push`.
#[cfg(unix)]
fn fake_terraform(dir: &Path, banner: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("terraform");
    let script = format!(
        r#"#!/bin/sh
case "$1" in
  version)
    echo "{banner}"
    ;;
  state)
    case "$2" in
      pull) echo '{{"version": 4, "serial": 1}}' ;;
      push) [ -f "$3" ] || exit 1 ;;
      *) exit 1 ;;
    esac
    ;;
  *)
    exit 1
    ;;
esac
"#
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn assert_no_transient_files(dir: &Path) {
    for entry in fs::read_dir(dir).unwrap().flatten() {
        let path = entry.path();
        if path.is_dir() {
            assert_no_transient_files(&path);
        } else {
            assert!(
                !path.ends_with(TMP_STATEFILE_NAME),
                "leftover transient statefile {:?}",
                path
            );
        }
    }
}

#[test]
fn test_list_prints_discovered_modules() {
    let tmp = tempdir().unwrap();
    let stage = tmp.path().join("stage");
    write_config(&stage, "data-stores/redis");
    write_config(&stage, "data-stores/postgres");
    write_config(&stage, "ecs-cluster");
    write_config(&stage, "kms-master-key");
    write_config(&stage, "vpc");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args(["--working-dir", stage.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("data-stores/redis")
                .and(predicate::str::contains("data-stores/postgres"))
                .and(predicate::str::contains("ecs-cluster"))
                .and(predicate::str::contains("kms-master-key"))
                .and(predicate::str::contains("vpc")),
        );
}

#[test]
fn test_list_empty_tree() {
    let tmp = tempdir().unwrap();

    Command::cargo_bin("tfstack")
        .unwrap()
        .args(["--working-dir", tmp.path().to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No modules found"));
}

#[cfg(unix)]
#[test]
fn test_check_accepts_compatible_version() {
    let tmp = tempdir().unwrap();
    let terraform = fake_terraform(tmp.path(), "Terraform v1.5.7");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            tmp.path().to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "check",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("satisfies"));
}

#[cfg(unix)]
#[test]
fn test_check_rejects_incompatible_version() {
    let tmp = tempdir().unwrap();
    let terraform = fake_terraform(tmp.path(), "Terraform v0.8.8");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            tmp.path().to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not satisfy"));
}

#[cfg(unix)]
#[test]
fn test_check_rejects_unparseable_banner() {
    let tmp = tempdir().unwrap();
    let terraform = fake_terraform(tmp.path(), "not a terraform banner");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            tmp.path().to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "check",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unable to parse"));
}

#[cfg(unix)]
#[test]
fn test_mv_relocates_tree_and_state() {
    let tmp = tempdir().unwrap();
    let stage = tmp.path().join("stage");
    write_config(&stage, "vpc");
    write_config(&stage, "data-stores/mysql");
    fs::write(stage.join(CONFIG_FILENAME), "# root\n").unwrap();
    fs::write(stage.join("scratch.log"), "noise\n").unwrap();
    fs::write(
        stage.join(MANIFEST_FILENAME),
        r#"{"exclude": ["*.log"]}"#,
    )
    .unwrap();
    let terraform = fake_terraform(tmp.path(), "Terraform v1.5.7");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            stage.to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "mv",
            "--to",
            "prod",
        ])
        .assert()
        .success();

    let prod = tmp.path().join("prod");
    assert!(prod.join(CONFIG_FILENAME).exists());
    assert!(prod.join("vpc").join(CONFIG_FILENAME).exists());
    assert!(prod.join("data-stores/mysql").join(CONFIG_FILENAME).exists());

    // Manifest exclusions and bookkeeping files do not travel
    assert!(!prod.join("scratch.log").exists());
    assert!(!prod.join(MANIFEST_FILENAME).exists());

    // The source tree is left intact and no transient files remain
    assert!(stage.join("vpc").join(CONFIG_FILENAME).exists());
    assert_no_transient_files(tmp.path());
}

#[cfg(unix)]
#[test]
fn test_mv_refuses_existing_destination_without_force() {
    let tmp = tempdir().unwrap();
    let stage = tmp.path().join("stage");
    write_config(&stage, "vpc");
    fs::create_dir_all(tmp.path().join("prod")).unwrap();
    let terraform = fake_terraform(tmp.path(), "Terraform v1.5.7");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            stage.to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "mv",
            "--to",
            "prod",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    // With --force the same relocation goes through
    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            stage.to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "mv",
            "--to",
            "prod",
            "--force",
        ])
        .assert()
        .success();

    assert!(tmp.path().join("prod/vpc").join(CONFIG_FILENAME).exists());
    assert_no_transient_files(tmp.path());
}

#[cfg(unix)]
#[test]
fn test_mv_gates_on_terraform_version() {
    let tmp = tempdir().unwrap();
    let stage = tmp.path().join("stage");
    write_config(&stage, "vpc");
    let terraform = fake_terraform(tmp.path(), "Terraform v0.8.8");

    Command::cargo_bin("tfstack")
        .unwrap()
        .args([
            "--working-dir",
            stage.to_str().unwrap(),
            "--terraform-path",
            terraform.to_str().unwrap(),
            "mv",
            "--to",
            "prod",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not satisfy"));

    // The gate fires before any pipeline side effects
    assert!(!tmp.path().join("prod").exists());
}
