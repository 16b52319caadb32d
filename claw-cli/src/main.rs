//! Claw CLI Entry Point
//!
//! Configuration comes from the environment (a `.env` file is loaded when
//! present). Command-line flags override it.
//!
//! Usage:
//!   claw start                 - Start the relayer API
//!   claw hash claim <file>     - Compute a claim hash offline
//!   claw hash intent <file>    - Compute an intent hash offline
//!   claw config check          - Validate the relayer configuration

use clap::Parser;
use claw_cli::{handler, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "claw_cli=debug,claw_api=debug,claw_executor=debug"
    } else {
        "claw_cli=info,claw_api=info,claw_executor=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
