//! dyad-ops: the file-operation engine.
//!
//! Four strictly separated layers:
//!
//! - [`list`]: pure list management (sorting, filtering, selection),
//! - the UI, which lives in the application and only shows dialogs,
//! - [`task`]: the orchestration state machine,
//! - [`executor`]: the only layer that touches storage.
//!
//! [`runner`] puts a task on a worker thread and turns its dialog
//! callbacks into channel messages for the event loop.

pub mod error;
pub mod executor;
pub mod list;
pub mod progress;
pub mod runner;
pub mod task;

pub use error::OpsError;
pub use executor::{Executor, WorkItem, dest_for};
pub use list::{EntryRecord, SortMode, filter_entries, prune_selection, sort_entries, toggle_selection};
pub use progress::{OperationSummary, ProgressReceiver, ProgressSender, ProgressUpdate, progress_channel};
pub use runner::{TaskHandle, TaskNotification, spawn_operation};
pub use task::{ConflictChoice, ConflictInfo, FileOperationTask, OperationKind, TaskEvent, TaskState, TaskUi};
