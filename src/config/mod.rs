//! Configuration types and loading.
//!
//! - `DuoConfig`: top-level configuration with validation
//! - `StateConfig`, `AgentsConfig`: store tuning and back-end identities
//! - `ProjectPaths`: on-disk layout under `.duopilot/`

mod settings;

pub use settings::{AgentsConfig, DuoConfig, ProjectPaths, StateConfig};
