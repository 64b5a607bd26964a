use std::path::PathBuf;

use console::{Style, style};

use crate::events::StateEvent;
use crate::session::{ReviewVerdict, SessionState, SessionStatus};

pub struct Display;

impl Display {
    pub fn new() -> Self {
        Self
    }

    pub fn print_header(&self, text: &str) {
        println!();
        println!("{}", style(text).bold().cyan());
        println!("{}", style("═".repeat(60)).dim());
        println!();
    }

    pub fn print_state(&self, state: &SessionState) {
        self.print_header(&format!("Session: {}", state.id));

        println!("Task:        {}", style(&state.current_task).white().bold());
        println!(
            "Status:      {}",
            self.status_style(state.status).apply_to(state.status)
        );
        println!("Complexity:  {}", state.complexity);
        println!("Assigned:    {}", style(&state.assigned_agent).bold());

        match state.review_verdict {
            Some(verdict) => println!(
                "Verdict:     {}",
                self.verdict_style(verdict).apply_to(verdict)
            ),
            None => println!("Verdict:     {}", style("pending").dim()),
        }
        println!("Repairs:     {}", state.repair_attempts);

        if !state.architectural_design.is_empty() {
            let namespaces: Vec<&str> = state
                .architectural_design
                .keys()
                .map(String::as_str)
                .collect();
            println!("Design:      {}", style(namespaces.join(", ")).dim());
        }

        println!();
        println!(
            "{}",
            style(format!(
                "Created {}  ·  Updated {}",
                state.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                state.updated_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ))
            .dim()
        );
        println!();
    }

    pub fn print_backups(&self, backups: &[PathBuf]) {
        if backups.is_empty() {
            println!("{}", style("No backup snapshots").dim());
            return;
        }

        self.print_header(&format!("Backups ({})", backups.len()));
        for (index, path) in backups.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if index == 0 {
                println!("  {}  {}", style(name).bold(), style("(newest)").green());
            } else {
                println!("  {}", style(name).dim());
            }
        }
        println!();
    }

    pub fn print_events(&self, events: &[StateEvent]) {
        if events.is_empty() {
            println!("{}", style("No state events").dim());
            return;
        }

        for event in events {
            let kind = if event.kind.is_error() {
                style(event.kind.as_str()).red().bold()
            } else {
                style(event.kind.as_str()).cyan()
            };

            let mut line = format!(
                "{}  {:<18}",
                style(event.created_at.format("%Y-%m-%d %H:%M:%S")).dim(),
                kind
            );
            if let Some(detail) = &event.detail {
                line.push_str(&format!("  {}", detail));
            }
            if let Some(path) = &event.path {
                line.push_str(&format!("  {}", style(path).dim()));
            }
            println!("{}", line);
        }
    }

    pub fn print_success(&self, message: &str) {
        println!("{} {}", style("✓").green().bold(), message);
    }

    pub fn print_error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red().bold(), message);
    }

    fn status_style(&self, status: SessionStatus) -> Style {
        match status {
            SessionStatus::Active => Style::new().green(),
            SessionStatus::Completed => Style::new().cyan(),
            SessionStatus::Archived => Style::new().dim(),
        }
    }

    fn verdict_style(&self, verdict: ReviewVerdict) -> Style {
        match verdict {
            ReviewVerdict::Approved => Style::new().green().bold(),
            ReviewVerdict::NeedsRepair => Style::new().yellow(),
            ReviewVerdict::Rejected => Style::new().red().bold(),
        }
    }
}

impl Default for Display {
    fn default() -> Self {
        Self::new()
    }
}
