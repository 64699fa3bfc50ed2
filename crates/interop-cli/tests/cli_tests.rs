//! CLI integration tests
//!
//! Covers help output, the export listing and calls, the process bridge
//! through both binaries, and import declarations read from interop.toml.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// `interop` run from an empty directory with no inherited configuration
fn interop_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("interop").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("INTEROP_LIBRARY")
        .env_remove("INTEROP_SEARCH_PATH")
        .env_remove("INTEROP_PROBE")
        .env_remove("INTEROP_LOG");
    cmd
}

fn probe_path() -> std::path::PathBuf {
    assert_cmd::cargo::cargo_bin("interop-probe")
}

mod help_messages {
    use super::*;

    #[test]
    fn test_main_help_shows_all_commands() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("demo"))
            .stdout(predicate::str::contains("add"))
            .stdout(predicate::str::contains("random"))
            .stdout(predicate::str::contains("call"))
            .stdout(predicate::str::contains("exports"))
            .stdout(predicate::str::contains("launch"));
    }

    #[test]
    fn test_main_help_shows_environment_variables() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("ENVIRONMENT VARIABLES"))
            .stdout(predicate::str::contains("INTEROP_LOG"));
    }

    #[test]
    fn test_missing_subcommand_fails() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir).assert().failure();
    }
}

mod exports {
    use super::*;

    #[test]
    fn test_lists_every_export() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .arg("exports")
            .assert()
            .success()
            .stdout(predicate::str::contains("aot_add(c_int, c_int) -> c_int"))
            .stdout(predicate::str::contains("rng_crypto_int_32() -> c_int"))
            .stdout(predicate::str::contains("rng_crypto_uint_64() -> c_uint64"));
    }

    #[test]
    fn test_json_listing() {
        let dir = TempDir::new().unwrap();
        let output = interop_cmd(&dir)
            .args(["exports", "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let entries = listing.as_array().unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0]["name"], "aot_add");
        assert_eq!(entries[0]["params"], serde_json::json!(["c_int", "c_int"]));
        assert_eq!(entries[0]["convention"], "cdecl");
    }

    #[test]
    fn test_call_aot_add() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["exports", "--call", "aot_add", "37", "58"])
            .assert()
            .success()
            .stdout(predicate::str::diff("95\n"));
    }

    #[test]
    fn test_call_with_negative_operand() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["exports", "--call", "aot_add", "-7", "2"])
            .assert()
            .success()
            .stdout(predicate::str::diff("-5\n"));
    }

    #[test]
    fn test_call_through_compiled_library() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["exports", "--loaded", "--call", "aot_add", "37", "58"])
            .assert()
            .success()
            .stdout(predicate::str::diff("95\n"));
    }

    #[test]
    fn test_configured_exports_library_is_used() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("interop.toml"),
            "[exports]\nlibrary = \"no_such_exports\"\n",
        )
        .unwrap();

        interop_cmd(&dir)
            .args(["exports", "--loaded", "--call", "aot_add", "1", "2"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("no_such_exports"));
    }

    #[test]
    fn test_call_wrong_arity() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["exports", "--call", "aot_add", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Expected 2 arguments, got 1"));
    }

    #[test]
    fn test_call_unknown_export() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["exports", "--call", "nope"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Export 'nope' is not registered"));
    }
}

mod process_bridge {
    use super::*;

    #[test]
    fn test_probe_prints_random_values() {
        Command::new(probe_path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Crypto Random Int32: "))
            .stdout(predicate::str::contains("Crypto Random Int64: "))
            .stdout(predicate::str::contains("Crypto Random Int32: -").not());
    }

    #[test]
    fn test_probe_exit_code() {
        Command::new(probe_path())
            .args(["--exit-code", "3"])
            .assert()
            .code(3);
    }

    #[test]
    fn test_launch_reports_success() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .arg("launch")
            .arg(probe_path())
            .assert()
            .success()
            .stdout(predicate::str::contains("Crypto Random Int32: "))
            .stdout(predicate::str::contains("exited successfully (exit code 0)"));
    }

    #[test]
    fn test_launch_reports_abnormal_exit() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .arg("launch")
            .arg(probe_path())
            .args(["--exit-code", "3"])
            .assert()
            .code(3)
            .stdout(predicate::str::contains("exited abnormally (exit code 3)"));
    }

    #[test]
    fn test_launch_missing_executable() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["launch", "/definitely/not/here/probe"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to launch"));
    }
}

mod native_calls {
    use super::*;

    #[test]
    fn test_add_through_native_library() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["add", "37", "58"])
            .assert()
            .success()
            .stdout(predicate::str::diff("37 + 58 = 95\n"));
    }

    #[test]
    fn test_random_empty_buffer() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["random", "-n", "0"])
            .assert()
            .success()
            .stdout(predicate::str::contains("rng bytes: []"));
    }

    #[test]
    fn test_random_fills_requested_length() {
        let dir = TempDir::new().unwrap();
        let output = interop_cmd(&dir).args(["random", "-n", "16"]).output().unwrap();
        assert!(output.status.success());

        let stdout = String::from_utf8(output.stdout).unwrap();
        let hex = stdout
            .lines()
            .find_map(|line| line.strip_prefix("rng hex: "))
            .unwrap();
        assert_eq!(hex.len(), 32);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_demo_without_launch() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["demo", "--skip-launch"])
            .assert()
            .success()
            .stdout(predicate::str::contains("MANAGED CALL NATIVE"))
            .stdout(predicate::str::is_match(r"\d+ \+ \d+ = \d+").unwrap())
            .stdout(predicate::str::contains("rng hex: "));
    }

    #[test]
    fn test_demo_launches_native_caller() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .env("INTEROP_PROBE", probe_path())
            .arg("demo")
            .assert()
            .success()
            .stdout(predicate::str::contains("NATIVE CALL MANAGED"))
            .stdout(predicate::str::contains("Crypto Random Int32: "));
    }

    #[test]
    fn test_missing_library() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["add", "1", "2", "--library", "/definitely/not/here/libmissing.so"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn test_undeclared_import() {
        let dir = TempDir::new().unwrap();
        interop_cmd(&dir)
            .args(["call", "c_abs", "-5"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No import named 'c_abs'"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_declared_import_from_project_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("interop.toml"),
            r#"
[[import]]
name = "c_abs"
library = "libc.so.6"
symbol = "abs"
params = ["c_int"]
returns = "c_int"
"#,
        )
        .unwrap();

        interop_cmd(&dir)
            .args(["call", "c_abs", "-5"])
            .assert()
            .success()
            .stdout(predicate::str::diff("5\n"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_explicit_config_path() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("custom.toml");
        fs::write(
            &config,
            r#"
[[import]]
name = "c_labs"
library = "libc.so.6"
symbol = "labs"
params = ["c_int64"]
returns = "c_int64"
"#,
        )
        .unwrap();

        let elsewhere = TempDir::new().unwrap();
        interop_cmd(&elsewhere)
            .arg("--config")
            .arg(&config)
            .args(["call", "c_labs", "-9000000000"])
            .assert()
            .success()
            .stdout(predicate::str::diff("9000000000\n"));
    }
}
