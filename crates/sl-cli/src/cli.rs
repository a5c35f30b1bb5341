//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Shift timeline collision checker.
///
/// Builds per-client, per-day timelines from works, work changes, and breaks,
/// and reports where a client is booked twice at the same time.
#[derive(Debug, Parser)]
#[command(name = "shiftline", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show database location and stored record counts.
    Status,

    /// Import records from JSON Lines on stdin.
    ///
    /// Each line is a work, change, or break tagged by its `record` field.
    Import,

    /// Print the rects of each client-day timeline in a window.
    Rects(WindowArgs),

    /// Detect collisions in a window.
    Recompute(WindowArgs),
}

/// Date window and output options shared by window commands.
#[derive(Debug, Clone, Default, Args)]
pub struct WindowArgs {
    /// First date (YYYY-MM-DD, "today", "yesterday", or "N days ago").
    #[arg(long)]
    pub from: Option<String>,

    /// Last date, inclusive. Defaults to today.
    #[arg(long)]
    pub to: Option<String>,

    /// Only report timelines of this client.
    #[arg(long)]
    pub client: Option<String>,

    /// Output as JSON.
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_recompute_window() {
        let cli = Cli::try_parse_from([
            "shiftline",
            "recompute",
            "--from",
            "2025-03-01",
            "--to",
            "yesterday",
            "--client",
            "alice",
            "--json",
        ])
        .unwrap();
        let Some(Commands::Recompute(args)) = cli.command else {
            panic!("expected recompute command");
        };
        assert_eq!(args.from.as_deref(), Some("2025-03-01"));
        assert_eq!(args.to.as_deref(), Some("yesterday"));
        assert_eq!(args.client.as_deref(), Some("alice"));
        assert!(args.json);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["shiftline", "status", "-v", "--config", "/tmp/c.toml"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }
}
