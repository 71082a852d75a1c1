use assert_cmd::Command;
use predicates::prelude::*;
use std::{
    fs,
    path::{Path, PathBuf},
};

fn write_settings(dir: &Path, file_name: &str, content: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, content).expect("write settings");
    path
}

fn gitea_deploy() -> Command {
    Command::cargo_bin("gitea-deploy").expect("binary built")
}

#[test]
fn help_lists_every_subcommand() {
    let assert = gitea_deploy().arg("--help").assert().success();
    let mut stdout = predicate::str::contains("install").boxed();
    for name in ["configure", "cert", "backup", "restore", "deps", "test", "menu"] {
        stdout = stdout.and(predicate::str::contains(name)).boxed();
    }
    assert.stdout(stdout);
}

#[test]
fn install_rejects_unknown_target() {
    gitea_deploy()
        .args(["install", "--target", "podman"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("binary").and(predicate::str::contains("docker")));
}

#[test]
fn test_command_accepts_partial_settings() {
    let temp = tempfile::tempdir().expect("temp dir");
    let settings = write_settings(
        temp.path(),
        "deploy.toml",
        r#"
env_file = "/srv/gitea/gitea.env"

[paths]
work_dir = "/srv/gitea/data"

[retry.download]
max_attempts = 3
base_delay_secs = 2
"#,
    );

    gitea_deploy()
        .args(["test", settings.to_str().expect("utf8 path")])
        .assert()
        .success()
        .stdout(predicate::str::contains("Settings are valid"));
}

#[test]
fn test_command_uses_global_config_flag() {
    let temp = tempfile::tempdir().expect("temp dir");
    write_settings(temp.path(), "deploy.toml", "");

    gitea_deploy()
        .current_dir(temp.path())
        .arg("test")
        .assert()
        .success();
}

#[test]
fn test_command_reports_validation_problems() {
    let temp = tempfile::tempdir().expect("temp dir");
    let settings = write_settings(
        temp.path(),
        "deploy.toml",
        r#"
[paths]
config_dir = "relative/gitea"

[observability.log]
output = "syslog"
"#,
    );

    gitea_deploy()
        .args(["test", settings.to_str().expect("utf8 path")])
        .assert()
        .code(1)
        .stderr(
            predicate::str::contains("paths.config_dir must be an absolute path")
                .and(predicate::str::contains("observability.log.output")),
        );
}

#[test]
fn test_command_fails_on_missing_file() {
    gitea_deploy()
        .args(["test", "/nonexistent/deploy.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("/nonexistent/deploy.toml"));
}

#[test]
fn test_command_fails_on_malformed_toml() {
    let temp = tempfile::tempdir().expect("temp dir");
    let settings = write_settings(temp.path(), "broken.toml", "[paths\nwork_dir = 3\n");

    gitea_deploy()
        .args(["test", settings.to_str().expect("utf8 path")])
        .assert()
        .code(1);
}
