use tempfile::TempDir;

use duopilot::config::{DuoConfig, ProjectPaths};

#[test]
fn test_default_config() {
    let config = DuoConfig::default();

    assert_eq!(config.state.lock_timeout_ms, 5_000);
    assert_eq!(config.state.lock_stale_grace_ms, 10_000);
    assert_eq!(config.state.backup_interval_secs, 600);
    assert_eq!(config.state.backup_retention_count, 10);
    assert_eq!(config.state.backup_retention_days, 7);

    assert_eq!(config.agents.primary, "claude");
    assert_eq!(config.agents.secondary, "codex");

    assert!(config.validate().is_ok());
}

#[test]
fn test_validation_rejects_zero_timeouts() {
    let mut config = DuoConfig::default();
    config.state.lock_timeout_ms = 0;
    config.state.backup_retention_count = 0;

    let msg = config.validate().unwrap_err().to_string();
    assert!(msg.contains("lock_timeout_ms"));
    assert!(msg.contains("backup_retention_count"));
}

#[test]
fn test_validation_rejects_identical_agents() {
    let mut config = DuoConfig::default();
    config.agents.secondary = config.agents.primary.clone();

    assert!(config.validate().is_err());
}

#[test]
fn test_validation_rejects_empty_agent() {
    let mut config = DuoConfig::default();
    config.agents.primary = String::new();

    assert!(config.validate().is_err());
}

#[tokio::test]
async fn test_load_missing_file_yields_defaults() {
    let dir = TempDir::new().unwrap();
    let config = DuoConfig::load(dir.path()).await.unwrap();

    assert_eq!(config.state.lock_timeout_ms, 5_000);
}

#[tokio::test]
async fn test_save_and_load_round_trip() {
    let dir = TempDir::new().unwrap();

    let mut config = DuoConfig::default();
    config.state.backup_interval_secs = 120;
    config.agents.secondary = "qwen".to_string();
    config.save(dir.path()).await.unwrap();

    let loaded = DuoConfig::load(dir.path()).await.unwrap();
    assert_eq!(loaded.state.backup_interval_secs, 120);
    assert_eq!(loaded.agents.secondary, "qwen");
}

#[tokio::test]
async fn test_load_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[state]\nlock_timeout_ms = 0\n",
    )
    .unwrap();

    assert!(DuoConfig::load(dir.path()).await.is_err());
}

#[tokio::test]
async fn test_project_paths_layout() {
    let dir = TempDir::new().unwrap();
    let config = DuoConfig::default();
    let paths = ProjectPaths::new(dir.path().to_path_buf(), &config);

    paths.ensure_dirs().await.unwrap();

    assert!(paths.duopilot_dir.ends_with(".duopilot"));
    assert!(paths.backups_dir.starts_with(&paths.session_dir));
    assert!(paths.session_dir.exists());
    assert!(paths.backups_dir.exists());
    assert!(paths.logs_dir.exists());
    assert_eq!(
        paths.state_file(),
        paths.session_dir.join("state.json")
    );
}

#[tokio::test]
async fn test_state_dir_override() {
    let dir = TempDir::new().unwrap();

    let mut config = DuoConfig::default();
    config.state.state_dir = Some("shared-session".into());
    let paths = ProjectPaths::new(dir.path().to_path_buf(), &config);
    assert_eq!(
        paths.session_dir,
        paths.duopilot_dir.join("shared-session")
    );

    let absolute = dir.path().join("elsewhere");
    config.state.state_dir = Some(absolute.clone());
    let paths = ProjectPaths::new(dir.path().to_path_buf(), &config);
    assert_eq!(paths.session_dir, absolute);
    assert_eq!(paths.state_file(), absolute.join("state.json"));
}
