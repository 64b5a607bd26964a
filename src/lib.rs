pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod session;
pub mod state;

pub use config::{DuoConfig, ProjectPaths};
pub use error::{DuoError, Result};
pub use events::{EventKind, EventLog, StateEvent};
pub use session::{Complexity, ReviewVerdict, SessionState, SessionStatus};
pub use state::{BackupRotator, FileLock, LocalLock, SessionLock, StateStore};
