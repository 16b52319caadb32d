//! Config Commands

use clap::Subcommand;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load the relayer configuration from the environment and summarize it
    Check,
}
