//! # Stagegate - Stage File Access Policy Server
//!
//! The main binary for Stagegate.
//!
//! This application provides:
//! - HTTP policy decision API (axum-based)
//! - CLI interface for evaluations and review history
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/stagegate (THE BINARY)           │
//! │                                                      │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────┐  │
//! │  │   CLI       │    │   HTTP API  │    │  Config  │  │
//! │  │  (clap)     │    │   (axum)    │    │  (toml)  │  │
//! │  └──────┬──────┘    └──────┬──────┘    └────┬─────┘  │
//! │         └──────────────────┼────────────────┘        │
//! │                            ▼                         │
//! │                  ┌──────────────────┐                │
//! │                  │  stagegate-core  │                │
//! │                  │   (THE LOGIC)    │                │
//! │                  └──────────────────┘                │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! stagegate server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! stagegate round -s 42 -t external_review -r 1
//! stagegate decide -s 42 -t external_review -r 1 -d pending_revisions
//! stagegate evaluate -f request.json
//! ```

use clap::Parser;
use stagegate::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // STAGEGATE_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("STAGEGATE_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let default_filter = if cli.verbose {
        "stagegate=debug,stagegate_core=debug,tower_http=debug"
    } else {
        "stagegate=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Stagegate startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌┬┐┌─┐┌─┐┌─┐┌─┐┌─┐┌┬┐┌─┐
  └─┐ │ ├─┤│ ┬├┤ │ ┬├─┤ │ ├┤
  └─┘ ┴ ┴ ┴└─┘└─┘└─┘┴ ┴ ┴ └─┘

  Stage File Access Policy Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
