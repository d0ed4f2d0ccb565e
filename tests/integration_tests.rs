//! Integration tests for the sdlc-cycle binary.
//!
//! Only commands that need no network are exercised; `run` uses `--dry-run`.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// An sdlc-cycle command with the environment overrides cleared.
fn sdlc() -> Command {
    let mut cmd = cargo_bin_cmd!("sdlc-cycle");
    cmd.env_remove("SDLC_API_BASE")
        .env_remove("SDLC_MODEL")
        .env_remove("SDLC_RETRY_CEILING")
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG");
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

fn init_project(dir: &TempDir) {
    sdlc()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        sdlc()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("run"))
            .stdout(predicate::str::contains("status"));
    }

    #[test]
    fn test_version() {
        sdlc().arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        sdlc().arg("deploy").assert().failure();
    }

    #[test]
    fn test_run_requires_task() {
        sdlc().arg("run").assert().failure();
    }
}

mod init {
    use super::*;

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        sdlc()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized sdlc-cycle project"));

        assert!(dir.path().join(".sdlc/sdlc.toml").is_file());
        assert!(dir.path().join(".sdlc/audit/runs").is_dir());
        assert!(dir.path().join(".sdlc/logs").is_dir());
    }

    #[test]
    fn test_reinit_keeps_config() {
        let dir = create_temp_project();
        init_project(&dir);
        let config = dir.path().join(".sdlc/sdlc.toml");
        fs::write(&config, "[limits]\nretry_ceiling = 7\n").unwrap();

        sdlc()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));

        assert!(fs::read_to_string(&config).unwrap().contains("retry_ceiling = 7"));
    }

    #[test]
    fn test_init_force_resets_config() {
        let dir = create_temp_project();
        init_project(&dir);
        let config = dir.path().join(".sdlc/sdlc.toml");
        fs::write(&config, "[limits]\nretry_ceiling = 7\n").unwrap();

        sdlc()
            .current_dir(dir.path())
            .args(["init", "--force"])
            .assert()
            .success();

        assert!(fs::read_to_string(&config).unwrap().contains("retry_ceiling = 3"));
    }
}

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults_without_file() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No sdlc.toml found"))
            .stdout(predicate::str::contains("retry_ceiling = 3"))
            .stdout(predicate::str::contains("api_key = not set"));
    }

    #[test]
    fn test_config_show_applies_env_override() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .env("SDLC_RETRY_CEILING", "9")
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("retry_ceiling = 9"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".sdlc/sdlc.toml"),
            "[limits]\nretry_ceiling = 0\n",
        )
        .unwrap();

        sdlc()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings"))
            .stdout(predicate::str::contains("retry_ceiling"));
    }

    #[test]
    fn test_config_validate_clean() {
        let dir = create_temp_project();
        init_project(&dir);
        sdlc()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_init_creates_file_once() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created sdlc.toml"));
        assert!(dir.path().join(".sdlc/sdlc.toml").exists());

        sdlc()
            .current_dir(dir.path())
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));
    }

    #[test]
    fn test_invalid_config_file_fails() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(dir.path().join(".sdlc/sdlc.toml"), "[limits\n").unwrap();

        sdlc()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("sdlc.toml"));
    }
}

mod run {
    use super::*;

    #[test]
    fn test_dry_run_json_completes() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a CLI calculator", "--dry-run", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"completed\""))
            .stdout(predicate::str::contains("\"fix_count\": 0"));
    }

    #[test]
    fn test_dry_run_exports_files() {
        let dir = create_temp_project();
        let out = dir.path().join("out");
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a CLI calculator", "--dry-run", "--out-dir"])
            .arg(&out)
            .assert()
            .success()
            .stdout(predicate::str::contains("completed"))
            .stdout(predicate::str::contains("Exported files"));

        assert!(out.join("main.py").is_file());
        assert!(out.join("README.md").is_file());
    }

    #[test]
    fn test_blank_task_is_missing_input() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["run", "   ", "--dry-run"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("task_description"));
    }

    #[test]
    fn test_run_without_api_key_fails() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build something"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("GEMINI_API_KEY"));
    }

    #[test]
    fn test_aborted_run_exits_with_code_2() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a todo app", "--dry-run", "--dry-run-defects", "--json"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("\"status\": \"aborted\""))
            .stdout(predicate::str::contains("\"fix_count\": 3"))
            .stdout(predicate::str::contains("retry_ceiling_breached"));
    }

    #[test]
    fn test_aborted_run_flushes_log_file() {
        let dir = create_temp_project();
        init_project(&dir);
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a todo app", "--dry-run", "--dry-run-defects"])
            .assert()
            .code(2);

        let logs: String = fs::read_dir(dir.path().join(".sdlc/logs"))
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| fs::read_to_string(e.path()).unwrap())
            .collect();
        assert!(logs.contains("workflow finished"));
        assert!(logs.contains("audit run written"));
    }

    #[test]
    fn test_dry_run_defects_requires_dry_run() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a todo app", "--dry-run-defects"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--dry-run"));
    }

    #[test]
    fn test_dry_run_writes_audit_when_initialized() {
        let dir = create_temp_project();
        init_project(&dir);
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a todo app", "--dry-run", "--json"])
            .assert()
            .success();

        let runs: Vec<_> = fs::read_dir(dir.path().join(".sdlc/audit/runs"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(runs.len(), 1);
        let content = fs::read_to_string(runs[0].path()).unwrap();
        assert!(content.contains("\"kind\": \"completed\""));
    }
}

mod status {
    use super::*;

    #[test]
    fn test_status_requires_init() {
        let dir = create_temp_project();
        sdlc()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_status_without_runs() {
        let dir = create_temp_project();
        init_project(&dir);
        sdlc()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No runs recorded yet"));
    }

    #[test]
    fn test_status_after_dry_run() {
        let dir = create_temp_project();
        init_project(&dir);
        sdlc()
            .current_dir(dir.path())
            .args(["run", "build a todo app", "--dry-run", "--json"])
            .assert()
            .success();

        sdlc()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("completed"))
            .stdout(predicate::str::contains("plan"))
            .stdout(predicate::str::contains("success"));

        sdlc()
            .current_dir(dir.path())
            .args(["status", "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("\"stages\""))
            .stdout(predicate::str::contains("\"state\": \"idle\""));
    }
}
