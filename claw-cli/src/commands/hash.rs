//! Hash Commands
//!
//! Every command reads one JSON document; `-` reads stdin.

use clap::Subcommand;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Subcommand, Debug)]
pub enum HashCommands {
    /// Claim hash of a claim payload
    Claim {
        file: PathBuf,
    },

    /// Intent hash of a trade intent, optionally with a route allowlist hash
    Intent {
        file: PathBuf,

        /// Execution route JSON to bind to the intent
        #[arg(long)]
        route: Option<PathBuf>,
    },

    /// Snapshot hash of an epoch's claim hashes
    Snapshot {
        file: PathBuf,

        /// Require the list to be strictly ascending instead of sorting it
        #[arg(long)]
        strict: bool,
    },

    /// Epoch state hash (merkle root commitment) of an epoch's claim hashes
    EpochState {
        file: PathBuf,

        #[arg(long)]
        strict: bool,
    },
}

/// `{ "epochId": 4, "claimHashes": ["0x..", ...] }`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochClaims {
    pub epoch_id: u64,
    pub claim_hashes: Vec<claw_core::B256>,
}
