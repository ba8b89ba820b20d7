use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

fn check_cmd() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("ikev2-setup"));
    cmd.arg("check")
        .arg("--before-rules")
        .arg(fixture("fixtures/before.rules"))
        .arg("--sysctl")
        .arg(fixture("fixtures/sysctl.conf"))
        .args(["--interface", "eth0"]);
    cmd
}

#[test]
fn check_lists_missing_items_on_stock_files() {
    check_cmd()
        .assert()
        .success()
        .stdout(predicate::str::contains("missing  nat"))
        .stdout(predicate::str::contains("missing  net/ipv4/ip_forward=1"))
        .stdout(predicate::str::contains("present  net/ipv4/conf/all/accept_redirects=0"))
        .stdout(predicate::str::contains("result missing=6"));
}

#[test]
fn strict_check_fails_when_anything_is_missing() {
    check_cmd()
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("check failed in strict mode"));
}

#[test]
fn strict_check_passes_after_patch() {
    let dir = tempdir().expect("tempdir");
    let rules = dir.path().join("before.rules");
    let sysctl = dir.path().join("sysctl.conf");
    fs::copy(fixture("fixtures/before.rules"), &rules).expect("copy");
    fs::copy(fixture("fixtures/sysctl.conf"), &sysctl).expect("copy");

    let mut patch = Command::new(assert_cmd::cargo::cargo_bin!("ikev2-setup"));
    patch
        .arg("patch")
        .arg("--before-rules")
        .arg(&rules)
        .arg("--sysctl")
        .arg(&sysctl)
        .args(["--interface", "eth0", "--no-backup"])
        .assert()
        .success();

    let mut check = Command::new(assert_cmd::cargo::cargo_bin!("ikev2-setup"));
    check
        .arg("check")
        .arg("--before-rules")
        .arg(&rules)
        .arg("--sysctl")
        .arg(&sysctl)
        .args(["--interface", "eth0", "--strict", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"present\": false").not());
}
