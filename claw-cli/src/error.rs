//! CLI Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] claw_api::ConfigError),

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(#[from] claw_core::ProtocolError),

    #[error("Server error: {message}")]
    Server { message: String },
}

pub type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        CliError::Server {
            message: message.into(),
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::Io(_) => 5,
            CliError::Json(_) => 6,
            CliError::Protocol(_) => 12,
            CliError::Server { .. } => 30,
        }
    }
}
