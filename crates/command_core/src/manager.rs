use std::{
    any::Any,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::anyhow;
use futures::FutureExt;
use shared::error::CommandFailure;
use tokio::{
    sync::{broadcast, Mutex as SequenceLock},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    command::{AnyOutput, Command, HistoryEntry},
    error::{CommandError, HistoryOperation},
    history::{Entry, History},
};

pub const DEFAULT_MAX_HISTORY_SIZE: usize = 100;
const DEFAULT_EVENT_BUFFER: usize = 64;

/// Notification published after every history change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryEvent {
    Executed { description: String, undoable: bool },
    Undone { description: String },
    Redone { description: String },
    Failed {
        operation: HistoryOperation,
        description: String,
        failure: CommandFailure,
    },
    Evicted { description: String },
    /// A redone command can no longer be undone and left the history.
    Discarded { description: String },
    Cleared,
}

/// Runs commands on the tokio pool and keeps their undo/redo history.
///
/// Cloning yields another handle to the same history. Command bodies run in
/// spawned tasks, so a caller dropping the returned future does not cancel the
/// command, and the history is still updated once it finishes.
///
/// An `undo` or `redo` holds the sequence lock from its pop until the entry is
/// pushed back, and a finished `execute` takes the same lock before recording.
/// Stack updates therefore apply in one total order, and nothing lands between
/// the pop and push of an in-flight undo or redo.
#[derive(Clone)]
pub struct CommandManager {
    history: Arc<Mutex<History>>,
    sequence: Arc<SequenceLock<()>>,
    events: broadcast::Sender<HistoryEvent>,
}

impl Default for CommandManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandManager {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(DEFAULT_EVENT_BUFFER);
        Self {
            history: Arc::new(Mutex::new(History::new(DEFAULT_MAX_HISTORY_SIZE))),
            sequence: Arc::new(SequenceLock::new(())),
            events,
        }
    }

    pub fn with_max_history_size(max_history_size: usize) -> Result<Self, CommandError> {
        validate_history_size(max_history_size)?;
        let manager = Self::new();
        manager.history().set_max_size(max_history_size);
        Ok(manager)
    }

    /// Replaces the event channel; existing subscribers stop receiving events.
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        self.events = events;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    pub async fn execute<C>(&self, command: C) -> Result<C::Output, CommandError>
    where
        C: Command,
    {
        let description = Command::description(&command);
        if !Command::can_execute(&command) {
            let err = CommandError::PreconditionFailed {
                command: description.clone(),
            };
            self.report_failure(HistoryOperation::Execute, &description, &err);
            return Err(err);
        }

        debug!(command = %description, "dispatching command");
        let manager = self.clone();
        let task_description = description.clone();
        let task = tokio::spawn(async move {
            let mut command = command;
            match Command::execute(&mut command).await {
                Ok(output) => {
                    let _turn = manager.sequence.lock().await;
                    manager.record_execution(Box::new(command));
                    Ok(output)
                }
                Err(err) => {
                    manager.report_failure(HistoryOperation::Execute, &task_description, &err);
                    Err(err)
                }
            }
        });
        join_command(task, description).await
    }

    pub async fn undo(&self) -> Result<(), CommandError> {
        let turn = self.sequence.clone().lock_owned().await;
        let popped = self.history().pop_undo();
        let Some(mut entry) = popped else {
            return Err(CommandError::HistoryEmpty(HistoryOperation::Undo));
        };

        let description = entry.description();
        debug!(command = %description, "undoing command");
        let manager = self.clone();
        let task_description = description.clone();
        let task = tokio::spawn(async move {
            let _turn = turn;
            let outcome = AssertUnwindSafe(entry.revert()).catch_unwind().await;
            match outcome.unwrap_or_else(|panic| Err(panicked(task_description, panic))) {
                Ok(()) => {
                    manager.record_undo(entry);
                    Ok(())
                }
                Err(err) => {
                    manager.restore_after_failed_undo(entry, &err);
                    Err(err)
                }
            }
        });
        join_command(task, description).await
    }

    pub async fn redo(&self) -> Result<AnyOutput, CommandError> {
        let turn = self.sequence.clone().lock_owned().await;
        let popped = self.history().pop_redo();
        let Some(mut entry) = popped else {
            return Err(CommandError::HistoryEmpty(HistoryOperation::Redo));
        };

        let description = entry.description();
        debug!(command = %description, "redoing command");
        let manager = self.clone();
        let task_description = description.clone();
        let task = tokio::spawn(async move {
            let _turn = turn;
            let outcome = AssertUnwindSafe(entry.replay()).catch_unwind().await;
            match outcome.unwrap_or_else(|panic| Err(panicked(task_description, panic))) {
                Ok(output) => {
                    manager.record_redo(entry);
                    Ok(output)
                }
                Err(err) => {
                    manager.restore_after_failed_redo(entry, &err);
                    Err(err)
                }
            }
        });
        join_command(task, description).await
    }

    pub fn can_undo(&self) -> bool {
        self.history().undo_len() > 0
    }

    pub fn can_redo(&self) -> bool {
        self.history().redo_len() > 0
    }

    pub fn undo_len(&self) -> usize {
        self.history().undo_len()
    }

    pub fn redo_len(&self) -> usize {
        self.history().redo_len()
    }

    /// Most recent first.
    pub fn undo_descriptions(&self) -> Vec<String> {
        self.history().undo_descriptions()
    }

    /// Next to be redone first.
    pub fn redo_descriptions(&self) -> Vec<String> {
        self.history().redo_descriptions()
    }

    pub fn peek_undo(&self) -> Option<String> {
        self.undo_descriptions().into_iter().next()
    }

    pub fn peek_redo(&self) -> Option<String> {
        self.redo_descriptions().into_iter().next()
    }

    pub fn clear_history(&self) {
        self.history().clear();
        info!("command history cleared");
        let _ = self.events.send(HistoryEvent::Cleared);
    }

    pub fn max_history_size(&self) -> usize {
        self.history().max_size()
    }

    /// Updates the bound and evicts the oldest undo entries above it.
    pub fn set_max_history_size(&self, max_history_size: usize) -> Result<(), CommandError> {
        validate_history_size(max_history_size)?;
        let evicted = self.history().set_max_size(max_history_size);
        info!(
            max_history_size,
            evicted = evicted.len(),
            "history bound updated"
        );
        self.publish_evictions(evicted);
        Ok(())
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_execution(&self, entry: Entry) {
        let description = entry.description();
        let undoable = entry.can_undo();
        let (evicted, dropped_redo, undo_len) = {
            let mut history = self.history();
            let evicted = if undoable {
                history.push_undo(entry)
            } else {
                Vec::new()
            };
            let dropped_redo = history.clear_redo();
            (evicted, dropped_redo, history.undo_len())
        };
        info!(
            command = %description,
            undoable,
            undo_len,
            dropped_redo,
            "command executed"
        );
        let _ = self.events.send(HistoryEvent::Executed {
            description,
            undoable,
        });
        self.publish_evictions(evicted);
    }

    fn record_undo(&self, entry: Entry) {
        let description = entry.description();
        let redo_len = {
            let mut history = self.history();
            history.push_redo(entry);
            history.redo_len()
        };
        info!(command = %description, redo_len, "command undone");
        let _ = self.events.send(HistoryEvent::Undone { description });
    }

    fn record_redo(&self, entry: Entry) {
        let description = entry.description();
        if !entry.can_undo() {
            warn!(command = %description, "redone command cannot be undone; dropped from history");
            let _ = self.events.send(HistoryEvent::Redone {
                description: description.clone(),
            });
            let _ = self.events.send(HistoryEvent::Discarded { description });
            return;
        }
        let evicted = self.history().push_undo(entry);
        info!(command = %description, "command redone");
        let _ = self.events.send(HistoryEvent::Redone { description });
        self.publish_evictions(evicted);
    }

    fn restore_after_failed_undo(&self, entry: Entry, err: &CommandError) {
        let description = entry.description();
        let evicted = self.history().push_undo(entry);
        self.report_failure(HistoryOperation::Undo, &description, err);
        self.publish_evictions(evicted);
    }

    fn restore_after_failed_redo(&self, entry: Entry, err: &CommandError) {
        let description = entry.description();
        self.history().push_redo(entry);
        self.report_failure(HistoryOperation::Redo, &description, err);
    }

    fn report_failure(&self, operation: HistoryOperation, description: &str, err: &CommandError) {
        warn!(command = %description, %operation, error = %err, "command operation failed");
        let _ = self.events.send(HistoryEvent::Failed {
            operation,
            description: description.to_string(),
            failure: CommandFailure::from(err),
        });
    }

    fn publish_evictions(&self, evicted: Vec<String>) {
        for description in evicted {
            warn!(command = %description, "evicted from bounded history");
            let _ = self.events.send(HistoryEvent::Evicted { description });
        }
    }
}

fn validate_history_size(max_history_size: usize) -> Result<(), CommandError> {
    if max_history_size < 1 {
        return Err(CommandError::InvalidInput(format!(
            "max history size must be at least 1, got {max_history_size}"
        )));
    }
    Ok(())
}

fn panicked(description: String, panic: Box<dyn Any + Send>) -> CommandError {
    let message = panic
        .downcast_ref::<&str>()
        .map(|m| m.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    CommandError::execution(description, anyhow!("command panicked: {message}"))
}

async fn join_command<T>(
    task: JoinHandle<Result<T, CommandError>>,
    description: String,
) -> Result<T, CommandError> {
    match task.await {
        Ok(result) => result,
        Err(err) => Err(CommandError::execution(
            description,
            anyhow!("command task did not complete: {err}"),
        )),
    }
}

#[cfg(test)]
#[path = "tests/manager_tests.rs"]
mod tests;
