use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::{DuoError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuoConfig {
    pub state: StateConfig,
    pub agents: AgentsConfig,
}

impl DuoConfig {
    pub async fn load(duopilot_dir: &Path) -> Result<Self> {
        let config_path = duopilot_dir.join("config.toml");
        let config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, duopilot_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = duopilot_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| DuoError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.state.lock_timeout_ms == 0 {
            errors.push("lock_timeout_ms must be greater than 0");
        }
        if self.state.backup_interval_secs == 0 {
            errors.push("backup_interval_secs must be greater than 0");
        }
        if self.state.backup_retention_count == 0 {
            errors.push("backup_retention_count must be at least 1");
        }
        if self.state.backup_retention_days == 0 {
            errors.push("backup_retention_days must be at least 1");
        }

        if self.agents.primary.is_empty() {
            errors.push("agents.primary must not be empty");
        }
        if self.agents.secondary.is_empty() {
            errors.push("agents.secondary must not be empty");
        }
        if !self.agents.primary.is_empty() && self.agents.primary == self.agents.secondary {
            errors.push("agents.primary and agents.secondary must differ");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DuoError::Config(errors.join("; ")))
        }
    }
}

/// State store tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    /// Bound on lock acquisition, in milliseconds.
    pub lock_timeout_ms: u64,
    /// Grace beyond a holder's own timeout before its marker counts as stale.
    pub lock_stale_grace_ms: u64,
    /// Cadence between periodic snapshots, in seconds.
    pub backup_interval_secs: u64,
    /// Snapshots kept by count.
    pub backup_retention_count: usize,
    /// Snapshots kept by age.
    pub backup_retention_days: u64,
    /// Where the state document lives; relative paths resolve against the
    /// `.duopilot` directory.
    pub state_dir: Option<PathBuf>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 5_000,
            lock_stale_grace_ms: 10_000,
            backup_interval_secs: 600,
            backup_retention_count: 10,
            backup_retention_days: 7,
            state_dir: None,
        }
    }
}

impl StateConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn stale_grace(&self) -> Duration {
        Duration::from_millis(self.lock_stale_grace_ms)
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn backup_retention_age(&self) -> Duration {
        Duration::from_secs(self.backup_retention_days * 24 * 3600)
    }
}

/// The two code-generation back-ends tasks are routed between. Routing
/// itself lives outside this crate; the store only records the assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    pub primary: String,
    pub secondary: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            primary: "claude".to_string(),
            secondary: "codex".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub duopilot_dir: PathBuf,
    pub session_dir: PathBuf,
    pub backups_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf, config: &DuoConfig) -> Self {
        let duopilot_dir = root.join(".duopilot");
        let session_dir = match &config.state.state_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => duopilot_dir.join(dir),
            None => duopilot_dir.join("session"),
        };

        Self {
            backups_dir: session_dir.join("backups"),
            logs_dir: duopilot_dir.join("logs"),
            root,
            session_dir,
            duopilot_dir,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            &self.duopilot_dir,
            &self.session_dir,
            &self.backups_dir,
            &self.logs_dir,
        ];

        for dir in dirs {
            fs::create_dir_all(dir).await?;
        }

        Ok(())
    }

    pub fn state_file(&self) -> PathBuf {
        self.session_dir.join("state.json")
    }

    pub fn event_log(&self) -> PathBuf {
        self.logs_dir.join("events.jsonl")
    }
}
