//! abuse-gate
//!
//! An HTTP front for small API endpoints that admits each request through a
//! per-client gate and reports what happened to a Telegram chat.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │                  ABUSE GATE                   │
//!   Client Request        │  ┌────────┐   ┌────────────┐   ┌──────────┐  │
//!   ──────────────────────┼─▶│  http  │──▶│  security  │──▶│ handlers │──┼──▶ Completion
//!                         │  │ server │   │ rate_limit │   │ chat     │  │    upstream
//!                         │  └────────┘   └─────┬──────┘   └────┬─────┘  │
//!                         │                     │ denials        │ reports│
//!                         │                     ▼                ▼        │
//!                         │               ┌──────────────────────────┐    │
//!                         │               │  alerts: reporter queue  │────┼──▶ Telegram
//!                         │               │  → worker → notifier     │    │    Bot API
//!                         │               └──────────────────────────┘    │
//!                         │  config · observability · lifecycle          │
//!                         └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use clap::Parser;

use abuse_gate::config::loader;
use abuse_gate::lifecycle::startup;
use abuse_gate::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "abuse-gate")]
#[command(about = "Per-IP abuse control and audit alerts for API endpoints")]
struct Args {
    /// Optional TOML configuration file; watched for changes.
    #[arg(short, long, env = "GATE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = loader::load(args.config.as_deref())?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!("abuse-gate v{} starting", env!("CARGO_PKG_VERSION"));

    startup::run(config, args.config.as_deref()).await?;
    Ok(())
}
