use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use duopilot::cli::{Cli, Commands, Display};
use duopilot::config::{DuoConfig, ProjectPaths};
use duopilot::error::{DuoError, Result};
use duopilot::events::{EventKind, StateEvent};
use duopilot::session::ReviewVerdict;
use duopilot::state::StateStore;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("duopilot=debug")
    } else {
        EnvFilter::new("duopilot=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let display = Display::new();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let duopilot_dir = root.join(".duopilot");

    match cli.command {
        Commands::Init { task, agent } => {
            tokio::fs::create_dir_all(&duopilot_dir).await?;
            let config = DuoConfig::load(&duopilot_dir).await?;
            config.save(&duopilot_dir).await?;

            let paths = ProjectPaths::new(root, &config);
            paths.ensure_dirs().await?;

            let agent = agent.unwrap_or_else(|| config.agents.primary.clone());
            let store = StateStore::new(&paths, &config);
            let state = store.initialize(task, agent).await?;

            display.print_success(&format!("Session {} initialized", state.id));
            display.print_state(&state);
        }

        Commands::Status => {
            let store = open_store(&root).await?;
            let state = store.get_state().await?;
            display.print_state(&state);
        }

        Commands::Set { field, value } => {
            let store = open_store(&root).await?;
            // Bare strings are the common case; anything else must be JSON
            let value = serde_json::from_str(&value)
                .unwrap_or_else(|_| serde_json::Value::String(value));
            let state = store.update_field(&field, value).await?;

            display.print_success(&format!("Updated {}", field));
            display.print_state(&state);
        }

        Commands::Verdict { verdict } => {
            let store = open_store(&root).await?;
            let verdict: ReviewVerdict = verdict.into();

            let mut state = store.read_state().await?;
            state.record_verdict(verdict);
            store.write_state(&state).await?;

            display.print_success(&format!("Recorded verdict: {}", verdict));
            display.print_state(&state);
        }

        Commands::Backups => {
            let store = open_store(&root).await?;
            let backups = store.list_backups().await?;
            display.print_backups(&backups);
        }

        Commands::Prune => {
            let store = open_store(&root).await?;
            let deleted = store.prune_backups().await?;
            display.print_success(&format!("Pruned {} snapshot(s)", deleted));
        }

        Commands::Archive => {
            let store = open_store(&root).await?;
            let state = store
                .update_field("status", serde_json::json!("archived"))
                .await?;

            store.events().record(
                StateEvent::new(EventKind::SessionArchived).with_session(&state.id),
            );
            display.print_success(&format!("Session {} archived", state.id));
        }

        Commands::Events { lines } => {
            let store = open_store(&root).await?;
            let events = store.events().load_recent(lines)?;
            display.print_events(&events);
        }
    }

    Ok(())
}

async fn open_store(root: &std::path::Path) -> Result<StateStore> {
    let duopilot_dir = root.join(".duopilot");
    if !duopilot_dir.exists() {
        return Err(DuoError::Session(format!(
            "not initialized at {}; run 'duopilot init' first",
            root.display()
        )));
    }

    let config = DuoConfig::load(&duopilot_dir).await?;
    let paths = ProjectPaths::new(root.to_path_buf(), &config);
    Ok(StateStore::new(&paths, &config))
}
