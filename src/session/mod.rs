//! Session document model.
//!
//! The single authoritative document describing one development session:
//! - `SessionState`: the persisted JSON document shared by every agent
//! - `SessionStatus`, `Complexity`, `ReviewVerdict`: lifecycle enums

mod types;

pub use types::{Complexity, ReviewVerdict, SessionState, SessionStatus};
