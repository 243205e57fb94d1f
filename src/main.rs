//! Request relay server.
//!
//! Accepts job descriptions on `POST /proxy`, performs them, and answers with
//! the realised response, redirect history and updated cookie state.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                    REQUEST RELAY                     │
//!                      │                                                      │
//!   POST /proxy (job)  │  ┌───────────┐   ┌──────────┐   ┌────────────────┐   │
//!   ───────────────────┼─▶│   http    │──▶│ handlers │──▶│     relay      │   │
//!                      │  │host filter│   │          │   │  orchestrator  │   │
//!                      │  └───────────┘   └──────────┘   └───────┬────────┘   │
//!                      │                                         │            │
//!                      │                    ┌────────────────────┼─────────┐  │
//!                      │                    ▼                    ▼         ▼  │
//!                      │              ┌──────────┐       ┌──────────┐ ┌──────┐│
//!                      │              │ cookies  │       │ redirect │ │ body ││
//!                      │              └──────────┘       └────┬─────┘ └──────┘│
//!                      │                                      ▼               │
//!   RelayResult (json) │  ┌───────────┐               ┌──────────────┐        │     Target
//!   ◀──────────────────┼──│  realise  │◀──────────────│ net::dialer  │◀───────┼──── Server
//!                      │  └───────────┘               │ + guard + TLS│        │
//!                      │                              └──────────────┘        │
//!                      │  ┌────────────────────────────────────────────────┐  │
//!                      │  │ config (+watcher) · observability · lifecycle  │  │
//!                      │  └────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_relay::lifecycle::startup;
use request_relay::observability::logging::init_tracing;

#[derive(Parser)]
#[command(name = "request-relay")]
#[command(about = "HTTP request relay with SSRF protection", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "RELAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = startup::load(cli.config.as_deref())?;
    init_tracing(&config.observability.log_level);

    tracing::info!("request-relay v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config, cli.config).await?;
    Ok(())
}
