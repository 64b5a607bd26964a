//! Exclusive session lock.
//!
//! Cross-process mutual exclusion through a marker file colocated with the
//! state document. Acquisition polls with capped exponential backoff up to
//! a bounded timeout; markers left behind by crashed holders are reclaimed
//! once they age past their own timeout plus a grace period, and every
//! reclamation is logged.
//!
//! The lock is an injectable capability: production uses `FileLock`,
//! in-process embedders and tests can substitute `LocalLock`.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{DuoError, Result};
use crate::events::{EventKind, EventLog, StateEvent};

const INITIAL_BACKOFF: Duration = Duration::from_millis(25);
/// Backoff growth is capped so a long-waiting caller keeps probing instead
/// of starving behind ever-longer sleeps.
const MAX_BACKOFF: Duration = Duration::from_millis(500);
/// Assumed holder timeout when marker metadata is unreadable.
const DEFAULT_HOLDER_TIMEOUT_MS: u64 = 5_000;

/// On-disk lock marker contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockMeta {
    pub token: String,
    pub holder: String,
    pub pid: u32,
    /// Acquisition time as seconds since the Unix epoch.
    pub acquired_at: f64,
    pub timeout_ms: u64,
}

impl LockMeta {
    fn age_at(&self, now_secs: f64) -> Duration {
        Duration::from_secs_f64((now_secs - self.acquired_at).max(0.0))
    }
}

/// Held lock. Releasing runs exactly once, on drop or via `release()`,
/// covering every exit path of the critical section.
pub struct LockGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LockGuard {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(self) {}
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

/// Mutual-exclusion capability for the session document.
#[async_trait]
pub trait SessionLock: Send + Sync {
    /// Acquire exclusively, waiting at most `timeout`. A caller that times
    /// out must not proceed unsynchronized.
    async fn acquire(&self, timeout: Duration) -> Result<LockGuard>;
}

/// Marker-file lock scoped to the state document's path.
pub struct FileLock {
    marker_path: PathBuf,
    holder: String,
    stale_grace: Duration,
    events: Option<EventLog>,
}

impl FileLock {
    pub fn new(state_path: &Path, stale_grace: Duration) -> Self {
        Self {
            marker_path: state_path.with_extension("lock"),
            holder: format!("duopilot-{}", std::process::id()),
            stale_grace,
            events: None,
        }
    }

    /// Route reclamation events into the audit log.
    pub fn with_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub fn marker_path(&self) -> &Path {
        &self.marker_path
    }

    fn now_secs() -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64()
    }

    /// Create the marker exclusively and persist holder metadata in it.
    async fn try_create(&self, token: &str, timeout: Duration) -> std::io::Result<()> {
        if let Some(parent) = self.marker_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.marker_path)
            .await?;

        let meta = LockMeta {
            token: token.to_string(),
            holder: self.holder.clone(),
            pid: std::process::id(),
            acquired_at: Self::now_secs(),
            timeout_ms: timeout.as_millis() as u64,
        };

        let contents = serde_json::to_string(&meta).unwrap_or_default();
        file.write_all(contents.as_bytes()).await?;
        file.sync_all().await?;
        Ok(())
    }

    async fn read_meta(&self) -> Option<LockMeta> {
        let raw = fs::read_to_string(&self.marker_path).await.ok()?;
        serde_json::from_str(&raw).ok()
    }

    /// Remove the marker if its holder is presumed dead. Staleness is
    /// elapsed time past the holder's own timeout plus the grace period;
    /// a marker without readable metadata falls back to its mtime.
    async fn reclaim_if_stale(&self) -> Result<bool> {
        let now = Self::now_secs();

        let (age, threshold, holder) = match self.read_meta().await {
            Some(meta) => {
                let threshold =
                    Duration::from_millis(meta.timeout_ms) + self.stale_grace;
                (meta.age_at(now), threshold, meta.holder)
            }
            None => {
                let Ok(modified) = fs::metadata(&self.marker_path)
                    .await
                    .and_then(|m| m.modified())
                else {
                    // Marker vanished between the existence check and here;
                    // the create loop will retry.
                    return Ok(true);
                };
                let age = SystemTime::now()
                    .duration_since(modified)
                    .unwrap_or_default();
                let threshold =
                    Duration::from_millis(DEFAULT_HOLDER_TIMEOUT_MS) + self.stale_grace;
                (age, threshold, "<unknown>".to_string())
            }
        };

        if age < threshold {
            return Ok(false);
        }

        warn!(
            path = %self.marker_path.display(),
            holder,
            age_secs = age.as_secs(),
            "Reclaiming stale session lock"
        );

        let _ = fs::remove_file(&self.marker_path).await;

        if let Some(events) = &self.events {
            events.record(
                StateEvent::new(EventKind::LockReclaimed)
                    .with_path(&self.marker_path)
                    .with_detail(format!("previous holder: {}", holder)),
            );
        }

        Ok(true)
    }

    /// Ownership-checked release: the marker is removed only while it still
    /// carries our token. A holder that lost the lock to reclamation must
    /// not delete the reclaimer's marker.
    fn release_marker(marker_path: PathBuf, token: String) {
        let owned = std::fs::read_to_string(&marker_path)
            .ok()
            .and_then(|raw| serde_json::from_str::<LockMeta>(&raw).ok())
            .is_some_and(|meta| meta.token == token);

        if owned {
            let _ = std::fs::remove_file(&marker_path);
        } else {
            warn!(
                path = %marker_path.display(),
                "Lock marker no longer owned at release; skipping removal"
            );
        }
    }
}

#[async_trait]
impl SessionLock for FileLock {
    async fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let start = Instant::now();
        let token = uuid::Uuid::new_v4().to_string();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match self.try_create(&token, timeout).await {
                Ok(()) => {
                    debug!(
                        path = %self.marker_path.display(),
                        waited_ms = start.elapsed().as_millis() as u64,
                        "Session lock acquired"
                    );
                    let marker_path = self.marker_path.clone();
                    let token = token.clone();
                    return Ok(LockGuard::new(move || {
                        Self::release_marker(marker_path, token);
                    }));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if self.reclaim_if_stale().await? {
                        continue;
                    }

                    let elapsed = start.elapsed();
                    if elapsed >= timeout {
                        return Err(DuoError::LockTimeout {
                            path: self.marker_path.clone(),
                            waited_ms: elapsed.as_millis() as u64,
                        });
                    }

                    let remaining = timeout - elapsed;
                    tokio::time::sleep(backoff.min(remaining)).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// In-process lock for tests and single-process embedding. Same contract,
/// no filesystem.
#[derive(Clone, Default)]
pub struct LocalLock {
    inner: std::sync::Arc<tokio::sync::Mutex<()>>,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionLock for LocalLock {
    async fn acquire(&self, timeout: Duration) -> Result<LockGuard> {
        let start = Instant::now();
        match tokio::time::timeout(timeout, self.inner.clone().lock_owned()).await {
            Ok(guard) => Ok(LockGuard::new(move || drop(guard))),
            Err(_) => Err(DuoError::LockTimeout {
                path: PathBuf::from("<in-process>"),
                waited_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}
