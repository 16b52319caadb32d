//! Claw CLI
//!
//! Runs the relayer and exposes the protocol hashes offline so bot operators
//! can check what the relayer and the books will compute for a payload.
//!
//! # Usage
//!
//! ```text
//! claw [OPTIONS] <COMMAND>
//!
//! Commands:
//!   start    Start the relayer API server
//!   hash     Compute protocol hashes from JSON files
//!   config   Configuration checks
//!
//! Options:
//!   -f, --format <FORMAT>  Output format (json, plain) [default: plain]
//!   -v, --verbose          Debug logging
//! ```
//!
//! # Examples
//!
//! ```text
//! claw hash claim ./claim.json
//! claw hash intent ./intent.json --route ./route.json
//! claw hash snapshot ./epoch.json --strict
//! claw config check
//! ```

pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
