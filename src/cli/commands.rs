use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::session::ReviewVerdict;

#[derive(Parser)]
#[command(name = "duopilot")]
#[command(author, version, about = "Dual-backend task orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project root (default: current directory)
    #[arg(long, global = true, env = "DUOPILOT_ROOT")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a session in the current project
    Init {
        /// Task description
        task: String,

        /// Back-end to assign initially (default: configured primary)
        #[arg(long)]
        agent: Option<String>,
    },

    /// Show current session state
    Status,

    /// Update a single session field
    Set {
        /// Field name (e.g. current_task, complexity, assigned_agent)
        field: String,

        /// New value; parsed as JSON, falling back to a plain string
        value: String,
    },

    /// Record a review verdict
    Verdict {
        #[arg(value_enum)]
        verdict: VerdictArg,
    },

    /// List backup snapshots
    Backups,

    /// Prune backup snapshots beyond retention
    Prune,

    /// Mark the session archived
    Archive,

    /// Show recent state events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value = "20")]
        lines: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VerdictArg {
    Approved,
    NeedsRepair,
    Rejected,
}

impl From<VerdictArg> for ReviewVerdict {
    fn from(arg: VerdictArg) -> Self {
        match arg {
            VerdictArg::Approved => ReviewVerdict::Approved,
            VerdictArg::NeedsRepair => ReviewVerdict::NeedsRepair,
            VerdictArg::Rejected => ReviewVerdict::Rejected,
        }
    }
}
