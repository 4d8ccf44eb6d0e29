//! Error types for pipeline operations

use thiserror::Error;

use crate::model::Stage;

/// Coarse classification used at the stage boundary to decide how an error
/// is surfaced to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required selection is missing; nothing was mutated
    Validation,
    /// Connect/send/read failure or a non-success HTTP status
    Transport,
    /// A frame or payload did not have the expected shape
    Protocol,
    /// The engine finished but returned zero rows
    EmptyResult,
    /// Anything else (configuration, local I/O)
    Internal,
}

/// Pipeline specific errors
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage action was attempted without its required selection
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connection, send or read failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The engine reported a failure before completing
    #[error("Remote engine error: {0}")]
    Remote(String),

    /// Frame or payload had an unexpected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The terminal payload parsed but its primary list was empty
    #[error("No results returned for {stage}")]
    EmptyResult { stage: Stage },

    /// Action not permitted in the current wizard or session state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Local I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Map the error onto the user-facing taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Transport(_) | Self::Remote(_) | Self::Http(_) => ErrorKind::Transport,
            Self::Protocol(_) | Self::Json(_) => ErrorKind::Protocol,
            Self::EmptyResult { .. } => ErrorKind::EmptyResult,
            Self::InvalidTransition(_) | Self::Config(_) | Self::Csv(_) | Self::Io(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Shorthand for a transport failure
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }
}

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
