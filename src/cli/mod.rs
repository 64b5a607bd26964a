//! Command-line interface definitions.
//!
//! - `Cli`, `Commands`: argument definitions via clap
//! - `Display`: formatted terminal output with colors and status

mod commands;
mod display;

pub use commands::{Cli, Commands, VerdictArg};
pub use display::Display;
