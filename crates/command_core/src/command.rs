//! The contract every user-triggered operation implements.

use std::any::Any;

use async_trait::async_trait;

use crate::error::CommandError;

/// A compensatable unit of work.
///
/// Inputs are bound at construction and never change afterwards. The state
/// needed by [`Command::undo`] is captured inside [`Command::execute`], read
/// fresh right before the mutating collaborator call. Redo calls `execute`
/// again, so every invocation re-captures that state.
#[async_trait]
pub trait Command: Send + 'static {
    type Output: Send + 'static;

    /// Side-effect free precondition check.
    fn can_execute(&self) -> bool;

    async fn execute(&mut self) -> Result<Self::Output, CommandError>;

    /// Reverses the last successful execution. Fails with
    /// [`CommandError::UndoUnavailable`] when nothing was captured.
    async fn undo(&mut self) -> Result<(), CommandError>;

    fn can_undo(&self) -> bool;

    /// Human-readable label embedding the command's key identifiers.
    fn description(&self) -> String;
}

pub type AnyOutput = Box<dyn Any + Send>;

/// Type-erased view of a [`Command`] so commands with different outputs can
/// share the undo and redo stacks.
#[async_trait]
pub(crate) trait HistoryEntry: Send {
    async fn replay(&mut self) -> Result<AnyOutput, CommandError>;
    async fn revert(&mut self) -> Result<(), CommandError>;
    fn can_undo(&self) -> bool;
    fn description(&self) -> String;
}

#[async_trait]
impl<C> HistoryEntry for C
where
    C: Command,
{
    async fn replay(&mut self) -> Result<AnyOutput, CommandError> {
        let output = Command::execute(self).await?;
        Ok(Box::new(output))
    }

    async fn revert(&mut self) -> Result<(), CommandError> {
        Command::undo(self).await
    }

    fn can_undo(&self) -> bool {
        Command::can_undo(self)
    }

    fn description(&self) -> String {
        Command::description(self)
    }
}
