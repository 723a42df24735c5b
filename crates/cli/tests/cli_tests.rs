//! CLI integration tests

use std::process::Command;

fn kpf() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kpf"));
    // Keep a user config file out of the tests
    command.env("HOME", std::env::temp_dir());
    command.env_remove("KPF_KUBECTL");
    command
}

#[test]
fn test_cli_help() {
    let output = kpf().arg("--help").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Port-forward Kubernetes services"), "Should show about text");
    assert!(stdout.contains("namespaces"), "Should show namespaces command");
    assert!(stdout.contains("services"), "Should show services command");
    assert!(stdout.contains("forward"), "Should show forward command");
}

#[test]
fn test_cli_version() {
    let output = kpf().arg("--version").output().expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("kpf"), "Should show binary name");
}

#[test]
fn test_forward_help() {
    let output = kpf()
        .args(["forward", "--help"])
        .output()
        .expect("Failed to execute command");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("NAME:LOCAL_PORT[:REMOTE_PORT]"));
    assert!(stdout.contains("--environment"));
    assert!(stdout.contains("--no-logs"));
}

#[test]
fn test_forward_requires_targets() {
    let output = kpf().arg("forward").output().expect("Failed to execute command");
    assert!(!output.status.success());
}

#[test]
fn test_forward_rejects_malformed_target() {
    let output = kpf()
        .args(["forward", "cart"])
        .output()
        .expect("Failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("expected NAME:LOCAL_PORT"), "stderr: {}", stderr);
}

#[test]
fn test_missing_kubectl_is_reported() {
    let output = kpf()
        .args(["--kubectl", "/nonexistent/kubectl", "namespaces"])
        .output()
        .expect("Failed to execute command");
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("cluster query failed"), "stderr: {}", stderr);
}
