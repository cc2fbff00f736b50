use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring, planning, or driving a rename batch.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("nothing to rename: {0}")]
    NoMatch(String),

    #[error("no episode number found in '{file}'")]
    NoEpisodeMarker { file: String },

    #[error("aborted at the {stage} confirmation")]
    UserAbort { stage: &'static str },

    #[error("{tool}: {message}")]
    ExternalTool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RenameError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn external(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ExternalTool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            _ => 1,
        }
    }
}

/// A single filesystem move that did not happen.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),

    #[error("source not found: {}", .0.display())]
    SourceMissing(PathBuf),

    #[error("failed to move {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
