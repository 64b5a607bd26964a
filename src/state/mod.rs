//! Crash-consistent session state persistence.
//!
//! The only subsystem allowed to touch the state file. Layered leaf-first:
//! - `lock`: cross-process mutual exclusion with staleness reclamation
//! - `validate`: structural checks on candidate documents
//! - `writer`: temp-file-write + sync + rename atomic persistence
//! - `backup`: timestamped snapshots and recovery
//! - `store`: the read/update/write interface agents call

mod backup;
mod lock;
mod store;
mod validate;
mod writer;

pub use backup::BackupRotator;
pub use lock::{FileLock, LocalLock, LockGuard, LockMeta, SessionLock};
pub use store::StateStore;
pub use validate::{SESSION_FIELDS, is_session_field, parse_document, validate, validate_state};
pub use writer::write_atomic;
