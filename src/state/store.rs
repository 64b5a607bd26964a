//! The session state store.
//!
//! Orchestrates lock, validator, atomic writer, and backup rotator behind
//! the only interface agents are allowed to touch state through. Every
//! mutation runs `lock → validate → write → (snapshot) → release` as one
//! critical section; error exits release the lock through the guard.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};

use super::backup::BackupRotator;
use super::lock::{FileLock, SessionLock};
use super::{validate, writer};
use crate::config::{DuoConfig, ProjectPaths};
use crate::error::{DuoError, Result};
use crate::events::{EventKind, EventLog, StateEvent};
use crate::session::SessionState;

pub struct StateStore {
    state_path: PathBuf,
    lock: Arc<dyn SessionLock>,
    lock_timeout: Duration,
    backups: BackupRotator,
    events: EventLog,
}

impl StateStore {
    /// Production store: marker-file lock next to the state document.
    pub fn new(paths: &ProjectPaths, config: &DuoConfig) -> Self {
        let state_path = paths.state_file();
        let events = EventLog::new(paths.event_log());
        let lock = Arc::new(
            FileLock::new(&state_path, config.state.stale_grace()).with_events(events.clone()),
        );
        Self::with_lock(paths, config, lock)
    }

    /// Injectable lock seam: tests and in-process embedders substitute
    /// their own `SessionLock` implementation.
    pub fn with_lock(
        paths: &ProjectPaths,
        config: &DuoConfig,
        lock: Arc<dyn SessionLock>,
    ) -> Self {
        Self {
            state_path: paths.state_file(),
            lock,
            lock_timeout: config.state.lock_timeout(),
            backups: BackupRotator::new(
                paths.backups_dir.clone(),
                config.state.backup_interval(),
                config.state.backup_retention_count,
                config.state.backup_retention_age(),
            ),
            events: EventLog::new(paths.event_log()),
        }
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Create a fresh active session document. Refuses to clobber an
    /// existing document, valid or not; a corrupted one is for `read_state`
    /// recovery or the operator, never for silent replacement.
    pub async fn initialize(
        &self,
        task: impl Into<String>,
        agent: impl Into<String>,
    ) -> Result<SessionState> {
        let _guard = self.lock.acquire(self.lock_timeout).await?;

        if self.state_path.exists() {
            return Err(DuoError::Session(
                "session already initialized; archive or remove it before starting another"
                    .to_string(),
            ));
        }

        let state = SessionState::new(task, agent);
        self.persist(&state).await?;
        self.backups.snapshot(&state).await?;

        self.events.record(
            StateEvent::new(EventKind::SessionCreated)
                .with_session(&state.id)
                .with_detail(&state.current_task),
        );
        info!(session_id = state.id, "Session initialized");
        Ok(state)
    }

    /// Locked read with recovery: a missing or invalid primary is replaced
    /// by the newest valid backup; no valid backup is fatal.
    pub async fn read_state(&self) -> Result<SessionState> {
        let _guard = self.lock.acquire(self.lock_timeout).await?;
        self.read_locked().await
    }

    /// Locked wholesale replacement of the document.
    pub async fn write_state(&self, state: &SessionState) -> Result<()> {
        validate::validate_state(state)?;

        let _guard = self.lock.acquire(self.lock_timeout).await?;
        self.persist(state).await?;
        self.backups.maybe_snapshot(state).await?;
        Ok(())
    }

    /// Read-modify-write of a single field inside one held lock, so no
    /// concurrent writer can slip between the read and the write.
    pub async fn update_field(&self, field: &str, value: Value) -> Result<SessionState> {
        if !validate::is_session_field(field) {
            return Err(DuoError::Validation(format!("unknown field: {}", field)));
        }

        let _guard = self.lock.acquire(self.lock_timeout).await?;

        let current = self.read_locked().await?;
        let mut doc = serde_json::to_value(&current)?;
        if let Value::Object(obj) = &mut doc {
            obj.insert(field.to_string(), value);
            obj.insert(
                "updated_at".to_string(),
                serde_json::to_value(chrono::Utc::now())?,
            );
        }

        validate::validate(&doc)?;
        let state: SessionState = serde_json::from_value(doc)?;

        self.persist(&state).await?;
        self.backups.maybe_snapshot(&state).await?;

        self.events.record(
            StateEvent::new(EventKind::FieldUpdated)
                .with_session(&state.id)
                .with_detail(field),
        );
        Ok(state)
    }

    /// Advisory read without the lock. Tolerant of staleness relative to
    /// concurrent writers, but never returns a structurally invalid
    /// document: corruption falls back to the newest valid backup,
    /// read-only. Repairing the primary belongs to `read_state`.
    pub async fn get_state(&self) -> Result<SessionState> {
        match self.read_primary().await {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(error = %err, "Primary state unreadable on advisory read");
                match self.backups.restore_latest().await? {
                    Some((state, from)) => {
                        info!(from = %from.display(), "Advisory read served from backup");
                        Ok(state)
                    }
                    None => Err(DuoError::CorruptedState(
                        "no valid primary or backup document".to_string(),
                    )),
                }
            }
        }
    }

    /// Prune old snapshots under the lock, like the writes that create them.
    pub async fn prune_backups(&self) -> Result<usize> {
        let _guard = self.lock.acquire(self.lock_timeout).await?;
        let deleted = self.backups.prune().await?;
        if deleted > 0 {
            self.events.record(
                StateEvent::new(EventKind::SnapshotPruned).with_detail(deleted.to_string()),
            );
        }
        Ok(deleted)
    }

    pub async fn list_backups(&self) -> Result<Vec<PathBuf>> {
        self.backups.list().await
    }

    async fn read_locked(&self) -> Result<SessionState> {
        match self.read_primary().await {
            Ok(state) => Ok(state),
            Err(err) => {
                warn!(error = %err, "Primary state unreadable, attempting backup recovery");
                self.recover().await
            }
        }
    }

    async fn read_primary(&self) -> Result<SessionState> {
        let raw = fs::read_to_string(&self.state_path).await?;
        validate::parse_document(&raw)
    }

    /// Adopt the newest valid backup as current: persist it back to the
    /// primary path and snapshot the recovered document. A fabricated
    /// default would silently erase session history, so the absence of any
    /// valid candidate is surfaced as corruption instead.
    async fn recover(&self) -> Result<SessionState> {
        match self.backups.restore_latest().await? {
            Some((state, from)) => {
                self.persist(&state).await?;
                self.backups.snapshot(&state).await?;

                self.events.record(
                    StateEvent::new(EventKind::StateRecovered)
                        .with_session(&state.id)
                        .with_path(&from),
                );
                info!(from = %from.display(), "Session state recovered from backup");
                Ok(state)
            }
            None => {
                self.events.record(
                    StateEvent::new(EventKind::StateCorrupted).with_path(&self.state_path),
                );
                Err(DuoError::CorruptedState(
                    "no valid primary or backup document".to_string(),
                ))
            }
        }
    }

    async fn persist(&self, state: &SessionState) -> Result<()> {
        let contents = serde_json::to_string_pretty(state)?;
        writer::write_atomic(&self.state_path, &contents).await
    }
}
