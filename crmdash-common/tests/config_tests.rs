//! Configuration file resolution and graceful degradation
//!
//! Tests that touch CRMDASH_CONFIG are marked #[serial] so they never race
//! on the process environment.

use std::env;
use std::fs;
use std::path::PathBuf;

use crmdash_common::config::{resolve_config_path, TomlConfig, CONFIG_ENV_VAR};
use crmdash_common::{DateRangePreset, TeamRole};
use serial_test::serial;
use tempfile::TempDir;

fn write_config(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
#[serial]
fn test_env_var_used_without_cli_arg() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/crmdash-from-env.toml");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/crmdash-from-env.toml")));
}

#[test]
#[serial]
fn test_cli_arg_beats_env_var() {
    env::set_var(CONFIG_ENV_VAR, "/tmp/crmdash-from-env.toml");
    let resolved = resolve_config_path(Some(PathBuf::from("/tmp/cli.toml").as_path()));
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(resolved, Some(PathBuf::from("/tmp/cli.toml")));
}

#[test]
#[serial]
fn test_empty_env_var_falls_through_to_config_dir() {
    env::set_var(CONFIG_ENV_VAR, "  ");
    let resolved = resolve_config_path(None);
    env::remove_var(CONFIG_ENV_VAR);

    if let Some(path) = resolved {
        assert!(path.ends_with("crmdash/config.toml"));
    }
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("absent.toml");

    let (config, source) = TomlConfig::load_or_default(Some(missing.as_path())).unwrap();
    assert!(source.is_none());
    assert_eq!(config.request_timeout_secs, 180);
    assert!(config.team.is_empty());
}

#[test]
#[serial]
fn test_load_from_env_var_path() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "crmdash.toml",
        r#"
        webhook_url = "https://hooks.example.com/export"
        poll_interval_secs = 60

        [[team]]
        id = "u1"
        name = "Italo Antonio"
        role = "Closer"

        [window]
        preset = "week"
        "#,
    );

    env::set_var(CONFIG_ENV_VAR, &path);
    let result = TomlConfig::load_or_default(None);
    env::remove_var(CONFIG_ENV_VAR);

    let (config, source) = result.unwrap();
    assert_eq!(source, Some(path));
    assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example.com/export"));
    assert_eq!(config.poll_interval_secs, 60);
    assert_eq!(config.window.preset, DateRangePreset::Week);
    assert_eq!(config.directory().get("u1").map(|e| e.role), Some(TeamRole::Closer));
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "broken.toml", "webhook_url = [unterminated");
    assert!(TomlConfig::load(&path).is_err());
}

#[test]
fn test_invalid_values_are_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "zero.toml", "request_timeout_secs = 0\n");
    assert!(TomlConfig::load_or_default(Some(path.as_path())).is_err());
}

#[test]
fn test_unknown_role_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "role.toml",
        "[[team]]\nid = \"u1\"\nname = \"X\"\nrole = \"Manager\"\n",
    );
    assert!(TomlConfig::load(&path).is_err());
}

#[test]
fn test_demo_config_loads() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../demos/crmdash.toml");
    let config = TomlConfig::load(&path).unwrap();

    assert_eq!(config.team.len(), 3);
    assert_eq!(config.roles.get("1001"), Some(&TeamRole::SdrCloser));
    assert_eq!(config.directory().get("1003").map(|e| e.role), Some(TeamRole::SdrCloser));
    assert_eq!(config.window.preset, DateRangePreset::Month);
    assert_eq!(config.canonical_stages().len(), 11);
}

#[test]
fn test_goal_deadline_parses_from_config() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "goals.toml",
        "[goals]\nrevenue_target = 90000.0\ndeadline = \"2024-12-31\"\n",
    );
    let config = TomlConfig::load(&path).unwrap();

    assert_eq!(config.goals.revenue_target, 90_000.0);
    assert_eq!(config.goals.cash_flow_target, 80_000.0);
    assert_eq!(config.goals.deadline, chrono::NaiveDate::from_ymd_opt(2024, 12, 31));
}
