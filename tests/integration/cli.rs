#[path = "common/mod.rs"]
mod common;

use assert_cmd::Command;
use common::write_config;
use predicates::prelude::*;
use tempfile::tempdir;

fn synthboot() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("synthboot"))
}

#[test]
fn explain_names_the_fault_label() {
    synthboot()
        .args(["explain", "203"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recovery_fallback"))
        .stdout(predicate::str::contains("label: CV/Gate"));
}

#[test]
fn explain_reserved_codes() {
    synthboot()
        .args(["explain", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("action: shutdown"));

    synthboot()
        .args(["explain", "102"])
        .assert()
        .success()
        .stdout(predicate::str::contains("action: restart_ui"))
        .stdout(predicate::str::contains("label:").not());
}

#[test]
fn explain_accepts_trapped_signal_names() {
    synthboot()
        .args(["explain", "SIGINT"])
        .assert()
        .success()
        .stdout(predicate::str::contains("status 100"))
        .stdout(predicate::str::contains("action: reboot"));
}

#[test]
fn explain_reports_signal_deaths() {
    synthboot()
        .args(["explain", "139"])
        .assert()
        .success()
        .stdout(predicate::str::contains("killed by SIGSEGV"))
        .stdout(predicate::str::contains("label: SegFault"));
}

#[test]
fn explain_rejects_unknown_input() {
    synthboot().args(["explain", "bogus"]).assert().failure();
}

#[test]
fn check_prints_resolved_settings() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = write_config(temp.path(), "true", "hw_test: all\nrestart_delay: 3s\n");

    synthboot()
        .arg("check")
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("ui command:       true"))
        .stdout(predicate::str::contains("hardware test:    all"))
        .stdout(predicate::str::contains("restart delay:    3s"));
}

#[test]
fn check_fails_on_missing_config() {
    let temp = tempdir().expect("failed to create tempdir");
    let missing = temp.path().join("absent.yaml");

    synthboot()
        .arg("check")
        .arg("--config")
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("absent.yaml"));
}

#[test]
fn run_exits_when_ui_requests_clean_exit() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = write_config(temp.path(), "exit 101", "splash:\n  enabled: false\n");

    synthboot()
        .arg("run")
        .arg("--config")
        .arg(&config_path)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success();
}

#[test]
fn run_fails_when_hardware_test_fails() {
    let temp = tempdir().expect("failed to create tempdir");
    let config_path = write_config(
        temp.path(),
        "true",
        "splash:\n  enabled: false\nhw_test: all\nhw_test_cooldown: 0s\nhardware:\n  test_command: \"false\"\n",
    );

    synthboot()
        .arg("run")
        .arg("--config")
        .arg(&config_path)
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("hardware test failed"));
}
