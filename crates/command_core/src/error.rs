use std::fmt;

use shared::error::{CommandFailure, ErrorCode};
use thiserror::Error;

/// Which history operation an error or event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryOperation {
    Execute,
    Undo,
    Redo,
}

impl fmt::Display for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Execute => "execute",
            Self::Undo => "undo",
            Self::Redo => "redo",
        })
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("precondition failed for {command}")]
    PreconditionFailed { command: String },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{command} requires an authenticated user")]
    NotAuthenticated { command: String },
    #[error("{0} not found")]
    NotFound(String),
    #[error("cannot undo {command}: no state was captured by a successful execution")]
    UndoUnavailable { command: String },
    #[error("{command} failed: {source:#}")]
    ExecutionFailure {
        command: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("nothing to {0}: history is empty")]
    HistoryEmpty(HistoryOperation),
}

impl CommandError {
    pub fn execution(command: impl Into<String>, source: anyhow::Error) -> Self {
        Self::ExecutionFailure {
            command: command.into(),
            source,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::PreconditionFailed { .. } => ErrorCode::PreconditionFailed,
            Self::InvalidInput(_) => ErrorCode::InvalidInput,
            Self::NotAuthenticated { .. } => ErrorCode::NotAuthenticated,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::UndoUnavailable { .. } => ErrorCode::UndoUnavailable,
            Self::ExecutionFailure { .. } => ErrorCode::ExecutionFailure,
            Self::HistoryEmpty(_) => ErrorCode::HistoryEmpty,
        }
    }
}

impl From<&CommandError> for CommandFailure {
    fn from(value: &CommandError) -> Self {
        CommandFailure::new(value.code(), value.to_string())
    }
}
