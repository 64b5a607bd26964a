//! Append-only structured event log.
//!
//! One JSON object per line in `logs/events.jsonl`. The log is an
//! independent side channel: it is written outside the session lock and a
//! failed append never fails the state operation that produced it.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SessionCreated,
    SessionArchived,
    FieldUpdated,
    StateRecovered,
    StateCorrupted,
    LockReclaimed,
    SnapshotCreated,
    SnapshotPruned,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SessionCreated => "session.created",
            Self::SessionArchived => "session.archived",
            Self::FieldUpdated => "field.updated",
            Self::StateRecovered => "state.recovered",
            Self::StateCorrupted => "state.corrupted",
            Self::LockReclaimed => "lock.reclaimed",
            Self::SnapshotCreated => "snapshot.created",
            Self::SnapshotPruned => "snapshot.pruned",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::StateCorrupted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEvent {
    pub kind: EventKind,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl StateEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            created_at: Utc::now(),
            session_id: None,
            detail: None,
            path: None,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.display().to_string());
        self
    }
}

/// Handle to the JSONL event file. Cheap to clone; every holder appends
/// independently of the state lock.
#[derive(Debug, Clone)]
pub struct EventLog {
    path: PathBuf,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Best-effort append; failures are logged, never propagated.
    pub fn record(&self, event: StateEvent) {
        if let Err(e) = self.append(&event) {
            warn!(kind = %event.kind, error = %e, "Failed to append state event");
        }
    }

    fn append(&self, event: &StateEvent) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let line = serde_json::to_string(event)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Load the most recent `limit` events, oldest first. Unparseable
    /// lines are skipped so a torn tail write cannot poison the log.
    pub fn load_recent(&self, limit: usize) -> Result<Vec<StateEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let raw = std::fs::read_to_string(&self.path)?;
        let mut events: Vec<StateEvent> = raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if events.len() > limit {
            events.drain(..events.len() - limit);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_load() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));

        log.record(StateEvent::new(EventKind::SessionCreated).with_session("s-1"));
        log.record(
            StateEvent::new(EventKind::FieldUpdated)
                .with_session("s-1")
                .with_detail("complexity"),
        );

        let events = log.load_recent(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::SessionCreated);
        assert_eq!(events[1].detail.as_deref(), Some("complexity"));
    }

    #[test]
    fn test_load_recent_trims_to_limit() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));

        for i in 0..5 {
            log.record(StateEvent::new(EventKind::SnapshotCreated).with_detail(i.to_string()));
        }

        let events = log.load_recent(2).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].detail.as_deref(), Some("3"));
        assert_eq!(events[1].detail.as_deref(), Some("4"));
    }

    #[test]
    fn test_torn_tail_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("events.jsonl");
        let log = EventLog::new(&path);

        log.record(StateEvent::new(EventKind::SessionCreated));
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"{\"kind\":\"sess")
            .unwrap();

        let events = log.load_recent(10).unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let log = EventLog::new(dir.path().join("events.jsonl"));
        assert!(log.load_recent(10).unwrap().is_empty());
    }
}
