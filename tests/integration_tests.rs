mod common;

use common::{write_tar_gz, CommandOutput, TestContext};
use genv::platform::Platform;
use std::fs;

fn add_demo_tool(ctx: &TestContext, versions: &[&str]) {
    let dist = ctx.root().join("dist");
    fs::create_dir_all(&dist).unwrap();
    let platform = Platform::current();
    for version in versions {
        let script = format!("#!/bin/sh\necho \"demo {} $*\"\nexit 3\n", version);
        write_tar_gz(
            &dist.join(format!("demo_{}_{}_{}.tar.gz", version, platform.os, platform.arch)),
            &[("README.md", b"demo"), ("demo-bin", script.as_bytes())],
        );
    }

    let template = format!(
        "file://{}/demo_{{{{ .Version }}}}_{{{{ .Os }}}}_{{{{ .Arch }}}}.tar.gz",
        dist.display()
    );
    ctx.run(&["tool", "add", "demo", "--binary", "demo-bin", "--url", &template])
        .assert_success()
        .assert_stdout_contains("Added demo");
}

#[test]
fn test_help_and_version() {
    let ctx = TestContext::new();

    let output: CommandOutput = ctx
        .cmd()
        .arg("--help")
        .output()
        .expect("Failed to run genv")
        .into();

    output
        .assert_success()
        .assert_stdout_contains("Install, pin and run multiple versions of binary tools")
        .assert_stdout_contains("Usage: genv");

    ctx.run(&["version"])
        .assert_success()
        .assert_stdout_contains("genv");
}

#[test]
fn test_config_show_formats() {
    let ctx = TestContext::new();

    let output = ctx.run(&["config", "show", "--format", "json"]);
    output.assert_success();
    let value: serde_json::Value =
        serde_json::from_str(&output.stdout).expect("Output was not valid JSON");
    assert_eq!(
        value["settings"]["home_dir"].as_str(),
        Some(ctx.home_dir.to_str().unwrap())
    );

    let output = ctx.run(&["config", "show", "--format", "yaml"]);
    output.assert_success();
    let _: serde_yaml::Value =
        serde_yaml::from_str(&output.stdout).expect("Output was not valid YAML");
    output.assert_stdout_contains("home_dir:");
}

#[test]
fn test_config_set_and_unset() {
    let ctx = TestContext::new();

    ctx.run(&["config", "set", "home-dir=/opt/genv"]).assert_success();
    let saved = fs::read_to_string(&ctx.config_path).unwrap();
    assert!(saved.contains("/opt/genv"));

    ctx.run(&["config", "set", "bin-dir", "/tmp"])
        .assert_failure()
        .assert_stderr_contains("not a valid configuration setting");

    ctx.run(&["config", "unset", "home-dir"]).assert_success();
    let saved = fs::read_to_string(&ctx.config_path).unwrap();
    assert!(!saved.contains("/opt/genv"));
}

#[test]
fn test_tool_definitions() {
    let ctx = TestContext::new();

    ctx.run(&["tools"])
        .assert_success()
        .assert_stdout_contains("No tools configured yet.");

    ctx.run(&["tool", "add", "broken", "--binary", "broken"])
        .assert_failure()
        .assert_stderr_contains("needs a download URL template");

    ctx.run(&[
        "tool",
        "add",
        "terraform",
        "--binary",
        "terraform",
        "--url",
        "https://releases.hashicorp.com/terraform/{{ .Version }}/terraform_{{ .Version }}_{{ .Os }}_{{ .Arch }}.zip",
    ])
    .assert_success();

    ctx.run(&["tools"])
        .assert_success()
        .assert_stdout_contains("terraform [binary: terraform] [installer available: true]");

    ctx.run(&["tool", "remove", "terraform"]).assert_success();
    ctx.run(&["tool", "remove", "terraform"]).assert_failure();
}

#[test]
fn test_unknown_tool_is_an_error() {
    let ctx = TestContext::new();
    ctx.run(&["install", "nope", "1.0.0"])
        .assert_failure()
        .assert_stderr_contains("Tool 'nope' is not configured");
}

#[test]
#[cfg(unix)]
fn test_version_lifecycle() {
    let ctx = TestContext::new();
    add_demo_tool(&ctx, &["1.0.0", "2.0.0"]);

    ctx.run(&["list", "demo"])
        .assert_success()
        .assert_stdout_contains("No versions of demo installed yet.");

    ctx.run(&["install", "demo", "1.0.0"]).assert_success();
    let binary = ctx.home_dir.join("demo").join("1.0.0").join("demo-bin");
    assert!(binary.exists());

    ctx.run(&["use", "demo", "2.0.0"])
        .assert_failure()
        .assert_stderr_contains("not installed");
    assert!(!ctx.home_dir.join("demo").join(".profile.json").exists());

    ctx.run(&["run", "demo"])
        .assert_failure()
        .assert_stderr_contains("No version of demo is in use");

    ctx.run(&["use", "demo", "1.0.0"]).assert_success();
    ctx.run(&["current", "demo"])
        .assert_success()
        .assert_stdout_contains("1.0.0");
    ctx.run(&["path", "demo"])
        .assert_success()
        .assert_stdout_contains(binary.to_str().unwrap());

    let output = ctx.run(&["run", "demo", "hello", "--flag"]);
    output.assert_stdout_contains("demo 1.0.0 hello --flag");
    assert_eq!(output.status.code(), Some(3));

    ctx.run(&["use", "demo", "2.0.0", "--install"]).assert_success();
    let output = ctx.run(&["list", "demo"]);
    output.assert_success();
    assert_eq!(output.stdout, "  1.0.0\n* 2.0.0\n");

    ctx.run(&["uninstall", "demo", "2.0.0"]).assert_success();
    ctx.run(&["current", "demo"]).assert_failure();
    assert_eq!(
        fs::read_to_string(ctx.home_dir.join("demo").join(".profile.json")).unwrap(),
        r#"{"version":null}"#
    );

    ctx.run(&["use", "demo", "1.0.0"]).assert_success();
    ctx.run(&["use", "demo"]).assert_success();
    ctx.run(&["current", "demo"]).assert_failure();
}

#[test]
#[cfg(unix)]
fn test_failed_install_leaves_no_version_behind() {
    let ctx = TestContext::new();
    add_demo_tool(&ctx, &["1.0.0"]);

    ctx.run(&["install", "demo", "9.9.9"])
        .assert_failure()
        .assert_stderr_contains("Failed to download 9.9.9");
    assert!(!ctx.home_dir.join("demo").join("9.9.9").exists());

    ctx.run(&["install", "demo", "../escape"])
        .assert_failure()
        .assert_stderr_contains("Invalid version");
}
