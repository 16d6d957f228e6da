use assert_cmd::Command;
use predicates::prelude::*;

// Point at a missing file so the default configuration (in-memory store) is used
const NO_CONFIG: &str = "/nonexistent/quotaguard/config.toml";

fn quotaguard() -> Command {
    let mut cmd = Command::cargo_bin("quotaguard").unwrap();
    cmd.env_remove("QUOTAGUARD_STORE_BACKEND")
        .env_remove("QUOTAGUARD_REDIS_URL")
        .args(["--config", NO_CONFIG]);
    cmd
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("quotaguard").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("quotaguard 0.1.0"));
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("quotaguard").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Rate limit and daily quota gate for metered model calls",
        ));
}

#[test]
fn test_cli_acquire_missing_resource() {
    quotaguard()
        .arg("acquire")
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_cli_acquire_allowed() {
    quotaguard()
        .args(["acquire", "--resource", "gpt-x", "--caller", "u1", "--daily-limit", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"allowed\": true"));
}

#[test]
fn test_cli_status_unlimited() {
    quotaguard()
        .args(["status", "--resource", "gpt-x", "--daily-limit", "-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"remaining_quota\": -1"))
        .stdout(predicate::str::contains("\"caller\": \"anon\""));
}

#[test]
fn test_cli_record() {
    quotaguard()
        .args(["record", "--resource", "gpt-x"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_cli_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[rate_limit]\nrate_window_secs = 0\n").unwrap();

    let mut cmd = Command::cargo_bin("quotaguard").unwrap();
    cmd.args(["--config", path.to_str().unwrap(), "status", "--resource", "gpt-x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
