//! Integration tests for the `simm` binary.

use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Mediation home with one `gsm` library and an input directory.
fn make_home() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    let lib = dir.path().join("home").join("libraries").join("gsm");
    fs::create_dir_all(&lib).unwrap();
    fs::write(lib.join("gsm.connect"), "dbl_file = \"gsm.dbl\"\n").unwrap();
    fs::write(
        lib.join("gsm.dbl"),
        "ProfileId=P1\nTargetTable=T_CELL\nBatchEvery=60\nProfileId=P2\nTargetTable=T_TRX\n",
    )
    .unwrap();
    let input = dir.path().join("input");
    fs::create_dir_all(&input).unwrap();
    fs::write(input.join("BSC01_202403011200.dat"), "payload\n").unwrap();
    dir
}

fn simm(root: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("simm"));
    cmd.env("SIMM_DB_USER", "simm")
        .env("SIMM_DB_PASSWORD", "c2VjcmV0")
        .env("SIMM_DB_SID", "MED")
        .env("SIMM_DB_HOST", "localhost")
        .env("SIMM_LOG_DIR", root.join("logs"))
        .env("MEDIATION_HOME", root.join("home"))
        .env("MEDIATION_DATA", root.join("data"))
        .env("RUST_LOG", "warn");
    cmd
}

// ---------------------------------------------------------------------------
// Argument handling
// ---------------------------------------------------------------------------

#[test]
fn help_lists_subcommands() {
    Command::new(assert_cmd::cargo::cargo_bin!("simm"))
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("run"))
        .stdout(contains("inspect"))
        .stdout(contains("cleanup"));
}

#[test]
fn run_without_inputs_fails() {
    let home = make_home();
    simm(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("--config"));
}

#[test]
fn run_rejects_config_mixed_with_flags() {
    let home = make_home();
    simm(home.path())
        .args(["run", "--config", "run.json", "--input", "in", "--lib", "gsm", "--mask", "*.dat"])
        .assert()
        .failure();
}

#[test]
fn missing_run_file_names_the_path() {
    let home = make_home();
    let missing = home.path().join("nope.json");
    simm(home.path())
        .args(["run", "--config"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(contains("nope.json"));
}

#[test]
fn configuration_errors_go_through_the_log_subscriber() {
    let home = make_home();
    simm(home.path())
        .args(["run", "--config"])
        .arg(home.path().join("absent.json"))
        .assert()
        .failure()
        .stderr(contains("ERROR"))
        .stderr(contains("command failed"));
}

#[test]
fn incomplete_environment_is_reported() {
    let home = make_home();
    simm(home.path())
        .env_remove("SIMM_DB_USER")
        .args(["inspect", "--lib", "gsm"])
        .assert()
        .failure()
        .stderr(contains("SIMM_DB_USER"));
}

// ---------------------------------------------------------------------------
// inspect / stop
// ---------------------------------------------------------------------------

#[test]
fn inspect_prints_tables_and_batch_interval() {
    let home = make_home();
    simm(home.path())
        .args(["inspect", "--lib", "gsm"])
        .assert()
        .success()
        .stdout(contains("T_CELL"))
        .stdout(contains("T_TRX"))
        .stdout(contains("every 60s"));
}

#[test]
fn inspect_json_is_machine_readable() {
    let home = make_home();
    let out = simm(home.path())
        .args(["inspect", "--lib", "gsm", "--json"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let report: serde_json::Value = serde_json::from_slice(&out.stdout).expect("json");
    assert_eq!(report["library"], "gsm");
    assert_eq!(report["profile"]["batch_every"], 60);
    assert_eq!(report["profile"]["tables"][0]["table"], "T_CELL");
}

#[test]
fn inspect_unknown_library_fails() {
    let home = make_home();
    simm(home.path())
        .args(["inspect", "--lib", "umts"])
        .assert()
        .failure()
        .stderr(contains("umts.connect"));
}

#[test]
fn stop_without_engine_is_not_an_error() {
    let home = make_home();
    simm(home.path())
        .args(["stop", "--lib", "no_such_library"])
        .assert()
        .success()
        .stdout(contains("no running engine"));
}

// ---------------------------------------------------------------------------
// run against a fake SQL*Plus
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn run_fails_when_library_is_unknown_to_database() {
    use std::os::unix::fs::PermissionsExt;

    let home = make_home();
    let sqlplus = home.path().join("sqlplus.sh");
    fs::write(&sqlplus, "#!/bin/sh\ncat > /dev/null\necho \"         0\"\n").unwrap();
    fs::set_permissions(&sqlplus, fs::Permissions::from_mode(0o755)).unwrap();

    simm(home.path())
        .env("SIMM_SQLPLUS", &sqlplus)
        .arg("run")
        .arg("--input")
        .arg(home.path().join("input"))
        .args(["--lib", "gsm", "--mask", "*.dat"])
        .assert()
        .failure()
        .stderr(contains("not known to the database"));

    // The run log was opened under SIMM_LOG_DIR and received the failure.
    let run_log = fs::read_dir(home.path().join("logs"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.file_name().unwrap().to_string_lossy().starts_with("simm_gsm_"))
        .expect("run log");
    let content = fs::read_to_string(run_log).unwrap();
    assert!(content.contains("not known to the database"), "{content}");
    assert!(!content.contains("\x1b["));
}
