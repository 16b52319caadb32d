//! CLI Commands Module

pub mod config;
pub mod hash;

use clap::{Parser, Subcommand};

/// Claw relayer CLI
#[derive(Parser, Debug)]
#[command(name = "claw")]
#[command(version)]
#[command(about = "Attestation relayer for claw vault funds")]
#[command(long_about = "Runs the relayer that collects bot attestations, evaluates weighted \
    quorum and schedules on-chain execution.\n\n\
    The hash commands compute the protocol hashes offline.")]
pub struct Cli {
    /// Output format (json, plain)
    #[arg(short, long, default_value = "plain")]
    pub format: OutputFormat,

    /// Debug logging for the relayer crates
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Plain,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the relayer API server
    Start {
        /// Address to bind (env: CLAW_LISTEN_ADDR)
        #[arg(short, long, env = "CLAW_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen: String,

        /// Disable CORS headers
        #[arg(long)]
        no_cors: bool,

        /// Submit jobs through the in-process mock chain instead of leaving them to bots
        #[arg(long, env = "CLAW_MOCK_CHAIN")]
        mock_chain: bool,
    },

    /// Compute protocol hashes from JSON files
    #[command(subcommand)]
    Hash(hash::HashCommands),

    /// Configuration checks
    #[command(subcommand)]
    Config(config::ConfigCommands),
}
