//! CLI integration tests

use std::process::{Command, Output};

fn karpx(args: &[&str]) -> Output {
    let config_dir = tempfile::tempdir().expect("Failed to create temp dir");
    Command::new(env!("CARGO_BIN_EXE_karpx"))
        .args(args)
        .env("KARPX_CONFIG", config_dir.path().join("config.json"))
        .env_remove("KARPX_CONTEXT")
        .env_remove("KARPX_RELEASES_URL")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = karpx(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Karpenter"), "Should describe the tool");
    for command in ["detect", "status", "compat", "versions", "nodes"] {
        assert!(stdout.contains(command), "Should show {command} command");
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = karpx(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("karpx"), "Should show binary name");
}

#[test]
fn test_status_help_lists_context_option() {
    let output = karpx(&["status", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--context"));
}

#[test]
fn test_compat_compatible_pair() {
    let output = karpx(&["--format", "json", "compat", "v1.3.0", "1.31"]);

    assert!(output.status.success(), "compat should succeed");
    let report = stdout_json(&output);
    assert_eq!(report["controller"], "1.3.0");
    assert_eq!(report["cluster"], "1.31.0");
    assert_eq!(report["compatible"], true);
    assert_eq!(report["min_compatible"], "1.0.0");
}

#[test]
fn test_compat_incompatible_pair() {
    let output = karpx(&["--format", "json", "compat", "0.37.0", "1.31.0"]);

    assert!(output.status.success(), "an incompatible pair is not an error");
    assert_eq!(stdout_json(&output)["compatible"], false);
}

#[test]
fn test_compat_garbage_version_fails_closed() {
    let output = karpx(&["--format", "json", "compat", "latest", "1.31.0"]);

    assert!(output.status.success());
    let report = stdout_json(&output);
    assert_eq!(report["compatible"], false);
    assert!(report.get("rule").is_none());
}

#[test]
fn test_compat_table_output() {
    let output = karpx(&["compat", "1.4.0", "1.33.2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("compatible"));
    assert!(stdout.contains(">=1.4.0, <2.0.0"));
}

#[test]
fn test_versions_lists_compatible_releases() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/releases")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[
                {"tag_name": "v1.4.0", "prerelease": false, "draft": false},
                {"tag_name": "v1.5.0-rc.1", "prerelease": true, "draft": false},
                {"tag_name": "v1.3.3", "prerelease": false, "draft": false},
                {"tag_name": "v0.37.0", "prerelease": false, "draft": false}
            ]"#,
        )
        .create();

    let url = format!("{}/releases", server.url());
    let output = karpx(&["--format", "json", "--releases-url", &url, "versions", "1.31"]);

    assert!(output.status.success(), "versions should succeed: {}", String::from_utf8_lossy(&output.stderr));
    let report = stdout_json(&output);
    assert_eq!(report["best"], "1.4.0");
    assert_eq!(report["versions"], serde_json::json!(["1.4.0", "1.3.3"]));
    assert_eq!(report["min_compatible"], "1.0.0");
}

#[test]
fn test_versions_surfaces_release_index_errors() {
    let mut server = mockito::Server::new();
    let _mock = server.mock("GET", "/releases").with_status(503).create();

    let url = format!("{}/releases", server.url());
    let output = karpx(&["--releases-url", &url, "versions", "1.31"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "a failed fetch must not look like an empty list");
    assert!(stderr.contains("Failed to fetch Karpenter releases"));
}

#[test]
fn test_versions_rejects_invalid_cluster_version() {
    let output = karpx(&["versions", "not-a-version"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid Kubernetes version"));
}

#[test]
fn test_invalid_releases_url_is_rejected() {
    let output = karpx(&["--releases-url", "not a url", "versions", "1.31"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid URL"));
}

#[test]
fn test_nodes_rejects_unknown_mode() {
    let output = karpx(&["nodes", "--mode", "turbo"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("turbo"));
}
