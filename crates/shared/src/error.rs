use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    PreconditionFailed,
    InvalidInput,
    NotAuthenticated,
    NotFound,
    UndoUnavailable,
    ExecutionFailure,
    HistoryEmpty,
}

/// Display-ready record of a failed command operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl CommandFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Failures the user can fix by signing in again.
    pub fn requires_reauth(&self) -> bool {
        self.code == ErrorCode::NotAuthenticated
    }
}
