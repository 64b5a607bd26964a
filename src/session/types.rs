use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Completed,
    Archived,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Archived => "archived",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Archived)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Routing tier assigned by the external complexity scorer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    #[default]
    Simple,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Complex => "complex",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome recorded by the external review pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    NeedsRepair,
    Rejected,
}

impl ReviewVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::NeedsRepair => "needs_repair",
            Self::Rejected => "rejected",
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for ReviewVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The single persisted session document.
///
/// Every agent reads and mutates this through the state store; nothing
/// touches the file directly. `architectural_design` is a namespaced side
/// channel: each producing component owns one key and its payload is
/// carried opaquely, round-tripping unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub current_task: String,
    pub complexity: Complexity,
    pub assigned_agent: String,
    #[serde(default)]
    pub architectural_design: BTreeMap<String, serde_json::Value>,
    pub review_verdict: Option<ReviewVerdict>,
    pub repair_attempts: u32,
}

impl SessionState {
    pub fn new(task: impl Into<String>, agent: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::Active,
            current_task: task.into(),
            complexity: Complexity::Simple,
            assigned_agent: agent.into(),
            architectural_design: BTreeMap::new(),
            review_verdict: None,
            repair_attempts: 0,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn design_channel(&self, namespace: &str) -> Option<&serde_json::Value> {
        self.architectural_design.get(namespace)
    }

    /// Replace one component's design payload. Other namespaces are untouched.
    pub fn set_design_channel(
        &mut self,
        namespace: impl Into<String>,
        payload: serde_json::Value,
    ) {
        self.architectural_design.insert(namespace.into(), payload);
        self.touch();
    }

    pub fn record_verdict(&mut self, verdict: ReviewVerdict) {
        self.review_verdict = Some(verdict);
        if verdict == ReviewVerdict::NeedsRepair {
            self.repair_attempts += 1;
        }
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_defaults() {
        let state = SessionState::new("add caching layer", "claude");

        assert!(!state.id.is_empty());
        assert_eq!(state.status, SessionStatus::Active);
        assert_eq!(state.complexity, Complexity::Simple);
        assert_eq!(state.current_task, "add caching layer");
        assert_eq!(state.assigned_agent, "claude");
        assert!(state.review_verdict.is_none());
        assert_eq!(state.repair_attempts, 0);
        assert!(state.architectural_design.is_empty());
    }

    #[test]
    fn test_design_channel_round_trip() {
        let mut state = SessionState::new("task", "codex");
        let payload = serde_json::json!({
            "layers": ["api", "service", "repo"],
            "notes": { "db": "postgres", "cache": null }
        });

        state.set_design_channel("planner", payload.clone());

        assert_eq!(state.design_channel("planner"), Some(&payload));
        assert!(state.design_channel("reviewer").is_none());

        // Survives document serialization byte-for-byte
        let json = serde_json::to_string(&state).unwrap();
        let restored: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.design_channel("planner"), Some(&payload));
    }

    #[test]
    fn test_needs_repair_counts_attempts() {
        let mut state = SessionState::new("task", "claude");

        state.record_verdict(ReviewVerdict::NeedsRepair);
        state.record_verdict(ReviewVerdict::NeedsRepair);
        assert_eq!(state.repair_attempts, 2);

        state.record_verdict(ReviewVerdict::Approved);
        assert_eq!(state.repair_attempts, 2);
        assert_eq!(state.review_verdict, Some(ReviewVerdict::Approved));
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&ReviewVerdict::NeedsRepair).unwrap(),
            "\"needs_repair\""
        );
    }
}
