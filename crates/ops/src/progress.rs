//! Progress reporting types.
//!
//! Workers report progress through a channel; the main event loop drains
//! it and repaints. Updates are values, never references into task
//! state, so they can cross threads freely.

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::task::OperationKind;

/// A point-in-time progress snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
	pub operation: OperationKind,
	/// Name of the entry being processed.
	pub current_item: String,
	/// Entries fully processed so far.
	pub processed: usize,
	/// Total entries known before execution started.
	pub total: usize,
	/// Bytes moved for the current entry, cumulative.
	pub current_bytes: u64,
}

/// Final accounting for one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperationSummary {
	pub succeeded: usize,
	pub errors: usize,
	pub skipped: usize,
	pub cancelled: bool,
}

/// Sending half handed to workers.
pub type ProgressSender = Sender<ProgressUpdate>;

/// Receiving half owned by the event loop.
pub type ProgressReceiver = Receiver<ProgressUpdate>;

/// An unbounded progress channel. Updates are small and the UI drains
/// every frame, so boundedness buys nothing here.
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
	unbounded()
}
