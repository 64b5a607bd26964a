//! Snapshot rotation for the session document.
//!
//! Dated copies of the last known-valid document, written with the same
//! atomic discipline as the primary. Cadence is measured from the newest
//! snapshot on disk, so it survives process restarts. Pruning never
//! removes the single most recent valid snapshot, guaranteeing a recovery
//! candidate always exists.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, Utc};
use tokio::fs;
use tracing::{info, warn};

use super::validate;
use crate::error::Result;
use crate::session::SessionState;

const SNAPSHOT_PREFIX: &str = "state-";
/// Millisecond precision keeps back-to-back snapshots (recovery right
/// after a write) from colliding on a filename.
const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3fZ";

pub struct BackupRotator {
    backups_dir: PathBuf,
    interval: Duration,
    retention_count: usize,
    retention_age: Duration,
}

impl BackupRotator {
    pub fn new(
        backups_dir: impl Into<PathBuf>,
        interval: Duration,
        retention_count: usize,
        retention_age: Duration,
    ) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            interval,
            retention_count,
            retention_age,
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    fn snapshot_path(&self, at: DateTime<Utc>) -> PathBuf {
        self.backups_dir
            .join(format!("{}{}.json", SNAPSHOT_PREFIX, at.format(TIMESTAMP_FORMAT)))
    }

    fn snapshot_timestamp(path: &Path) -> Option<DateTime<Utc>> {
        let stem = path.file_stem()?.to_str()?;
        let encoded = stem.strip_prefix(SNAPSHOT_PREFIX)?;
        NaiveDateTime::parse_from_str(encoded, TIMESTAMP_FORMAT)
            .ok()
            .map(|naive| naive.and_utc())
    }

    /// Snapshot filenames, newest first. Timestamp-encoded names sort
    /// lexically, so no file contents are read here.
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.backups_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.backups_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|e| e == "json")
                && Self::snapshot_timestamp(&path).is_some()
            {
                paths.push(path);
            }
        }

        paths.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(paths)
    }

    /// Snapshot if the newest one on disk is older than the interval (or
    /// none exists). Returns the written path, if any.
    pub async fn maybe_snapshot(&self, state: &SessionState) -> Result<Option<PathBuf>> {
        let now = Utc::now();
        let due = match self.list().await?.first() {
            Some(newest) => Self::snapshot_timestamp(newest)
                .map(|ts| now.signed_duration_since(ts).to_std().unwrap_or_default())
                .is_none_or(|elapsed| elapsed >= self.interval),
            None => true,
        };

        if !due {
            return Ok(None);
        }
        self.snapshot(state).await.map(Some)
    }

    /// Unconditional dated copy. Callers only pass documents that already
    /// passed validation.
    pub async fn snapshot(&self, state: &SessionState) -> Result<PathBuf> {
        let path = self.snapshot_path(Utc::now());
        let contents = serde_json::to_string_pretty(state)?;
        super::writer::write_atomic(&path, &contents).await?;

        info!(path = %path.display(), session_id = state.id, "Snapshot written");
        Ok(path)
    }

    /// Most recent snapshot that itself validates, with its path. Invalid
    /// snapshots are skipped, not deleted; `None` means recovery failed
    /// and the caller must treat the session as corrupted.
    pub async fn restore_latest(&self) -> Result<Option<(SessionState, PathBuf)>> {
        for path in self.list().await? {
            match fs::read_to_string(&path).await {
                Ok(raw) => match validate::parse_document(&raw) {
                    Ok(state) => return Ok(Some((state, path))),
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Skipping invalid snapshot");
                    }
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable snapshot");
                }
            }
        }
        Ok(None)
    }

    /// Remove snapshots beyond the retention window (count and age). The
    /// newest valid snapshot is exempt regardless of age.
    pub async fn prune(&self) -> Result<usize> {
        let snapshots = self.list().await?;
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut protected: Option<PathBuf> = None;
        for path in &snapshots {
            if let Ok(raw) = fs::read_to_string(path).await
                && validate::parse_document(&raw).is_ok()
            {
                protected = Some(path.clone());
                break;
            }
        }

        let now = Utc::now();
        let mut deleted = 0;

        for (index, path) in snapshots.iter().enumerate() {
            if Some(path) == protected.as_ref() {
                continue;
            }

            let expired_by_age = Self::snapshot_timestamp(path)
                .map(|ts| now.signed_duration_since(ts).to_std().unwrap_or_default())
                .is_some_and(|age| age >= self.retention_age);
            let expired_by_count = index >= self.retention_count;

            if (expired_by_age || expired_by_count) && fs::remove_file(path).await.is_ok() {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(deleted, dir = %self.backups_dir.display(), "Pruned old snapshots");
        }
        Ok(deleted)
    }
}
