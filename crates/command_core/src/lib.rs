//! Asynchronous, compensatable command execution with bounded undo/redo history.

mod backend;
mod command;
pub mod commands;
pub mod error;
mod history;
mod manager;
pub mod services;

pub use backend::StorageServices;
pub use command::{AnyOutput, Command};
pub use error::{CommandError, HistoryOperation};
pub use manager::{CommandManager, HistoryEvent, DEFAULT_MAX_HISTORY_SIZE};
pub use services::ServiceContext;
