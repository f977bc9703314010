//! # Stagegate CLI Module
//!
//! This module implements the CLI interface for Stagegate.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show history store status
//! - `init` - Initialize a new history database
//! - `evaluate` - Evaluate an access request read from a JSON file
//! - `round` - Record a review round
//! - `decide` - Record an editorial decision
//! - `mapping` - Show the active mapping table, or check a mapping file

mod commands;

use crate::config::{BackendKind, Config};
use clap::{Parser, Subcommand};
use stagegate_core::StageGateError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Stagegate - stage file access policy server
///
/// Decides whether a user may read or modify the files of a submission at a
/// given file stage.
#[derive(Parser, Debug)]
#[command(name = "stagegate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (default: ./stagegate.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the history database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides the config file)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show history store status
    Status,

    /// Initialize a new empty history database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Evaluate an access request read from a JSON file
    Evaluate {
        /// Path to the request file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Record a review round
    Round {
        /// Submission ID
        #[arg(short, long)]
        submission: u64,

        /// Review workflow stage (internal_review, external_review)
        #[arg(short = 't', long)]
        stage: String,

        /// Round number, starting at 1
        #[arg(short, long)]
        round: u32,
    },

    /// Record an editorial decision against an existing round
    Decide {
        /// Submission ID
        #[arg(short, long)]
        submission: u64,

        /// Review workflow stage (internal_review, external_review)
        #[arg(short = 't', long)]
        stage: String,

        /// Round number
        #[arg(short, long)]
        round: u32,

        /// Decision code (e.g. accept, pending_revisions, decline)
        #[arg(short, long)]
        decision: String,
    },

    /// Show the active mapping table
    Mapping {
        /// Validate a TOML mapping file instead
        #[arg(long)]
        check: Option<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Load configuration and apply global CLI overrides.
pub fn resolve_config(cli: &Cli) -> Result<Config, StageGateError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(database) = &cli.database {
        config.storage.database = database.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    Ok(config)
}

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), StageGateError> {
    let mut config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        Some(Commands::Evaluate { file }) => cmd_evaluate(&config, json_mode, &file),
        Some(Commands::Round {
            submission,
            stage,
            round,
        }) => cmd_round(&config, json_mode, submission, &stage, round),
        Some(Commands::Decide {
            submission,
            stage,
            round,
            decision,
        }) => cmd_decide(&config, json_mode, submission, &stage, round, &decision),
        Some(Commands::Mapping { check }) => cmd_mapping(&config, json_mode, check.as_deref()),
        None => cmd_status(&config, json_mode),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_overrides_parse() {
        let cli = Cli::try_parse_from([
            "stagegate",
            "--backend",
            "memory",
            "-D",
            "other.db",
            "round",
            "-s",
            "7",
            "-t",
            "external_review",
            "-r",
            "1",
        ])
        .expect("parse");
        assert_eq!(cli.backend, Some(BackendKind::Memory));
        assert_eq!(cli.database, Some(PathBuf::from("other.db")));
        assert!(matches!(
            cli.command,
            Some(Commands::Round { submission: 7, round: 1, .. })
        ));
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(Cli::try_parse_from(["stagegate", "--backend", "file", "status"]).is_err());
    }
}
