//! Running a task on a worker thread.
//!
//! The state machine itself is synchronous; this module gives it the
//! concurrency shape the application needs: the Executing phase runs on
//! a worker thread, dialog requests travel to the UI thread as
//! [`TaskNotification`]s, and answers come back as [`TaskEvent`]s. While
//! the task sits in an Awaiting* state the worker blocks on the event
//! channel and cannot touch storage until the UI resumes it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender, unbounded};
use dyad_vpath::VPath;

use crate::executor::Executor;
use crate::progress::{OperationSummary, ProgressSender};
use crate::task::{ConflictInfo, FileOperationTask, OperationKind, TaskEvent, TaskUi};

/// A dialog request or terminal notice from the worker to the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskNotification {
	ConfirmationNeeded {
		kind: OperationKind,
		sources: Vec<VPath>,
		dest: Option<VPath>,
	},
	ConflictNeeded(ConflictInfo),
	RenameNeeded(ConflictInfo),
	/// Informational dialog (validation failure, abort notice).
	Notice(String),
	Completed(OperationSummary),
}

/// `TaskUi` implementation that forwards every request over a channel.
struct ChannelUi {
	notifications: Sender<TaskNotification>,
}

impl TaskUi for ChannelUi {
	fn request_confirmation(&mut self, kind: OperationKind, sources: &[VPath], dest: Option<&VPath>) {
		let _ = self.notifications.send(TaskNotification::ConfirmationNeeded {
			kind,
			sources: sources.to_vec(),
			dest: dest.cloned(),
		});
	}

	fn request_conflict_choice(&mut self, conflict: &ConflictInfo) {
		let _ = self.notifications.send(TaskNotification::ConflictNeeded(conflict.clone()));
	}

	fn request_rename(&mut self, conflict: &ConflictInfo) {
		let _ = self.notifications.send(TaskNotification::RenameNeeded(conflict.clone()));
	}

	fn notify(&mut self, message: &str) {
		let _ = self.notifications.send(TaskNotification::Notice(message.to_string()));
	}

	fn operation_complete(&mut self, summary: &OperationSummary) {
		let _ = self.notifications.send(TaskNotification::Completed(*summary));
	}
}

/// Handle held by the dispatcher while a task runs.
pub struct TaskHandle {
	events: Sender<TaskEvent>,
	notifications: Receiver<TaskNotification>,
	cancel: Arc<AtomicBool>,
	worker: Option<JoinHandle<()>>,
}

impl TaskHandle {
	/// Feeds a user answer back into the task.
	pub fn send_event(&self, event: TaskEvent) {
		let _ = self.events.send(event);
	}

	/// Requests cancellation at the task's next checkpoint.
	pub fn cancel(&self) {
		self.cancel.store(true, Ordering::Relaxed);
		let _ = self.events.send(TaskEvent::CancelRequested);
	}

	/// Non-blocking poll for the next dialog request or completion.
	pub fn try_notification(&self) -> Option<TaskNotification> {
		self.notifications.try_recv().ok()
	}

	/// Blocking wait for the next notification. Tests use this.
	pub fn recv_notification(&self) -> Option<TaskNotification> {
		self.notifications.recv().ok()
	}

	pub fn is_finished(&self) -> bool {
		self.worker.as_ref().is_none_or(|worker| worker.is_finished())
	}

	/// Waits for the worker to exit.
	pub fn join(mut self) {
		if let Some(worker) = self.worker.take()
			&& worker.join().is_err()
		{
			tracing::error!("task worker panicked");
		}
	}
}

impl Drop for TaskHandle {
	fn drop(&mut self) {
		// Dropping the handle abandons the operation: wake the worker so
		// it can observe the closed channel and exit.
		self.cancel.store(true, Ordering::Relaxed);
	}
}

/// Spawns one operation on a worker thread. The dispatcher enforces the
/// one-task-at-a-time rule by holding at most one live handle.
pub fn spawn_operation(
	executor: Executor,
	progress: Option<ProgressSender>,
	kind: OperationKind,
	sources: Vec<VPath>,
	dest: Option<VPath>,
) -> TaskHandle {
	let (event_tx, event_rx) = unbounded::<TaskEvent>();
	let (notify_tx, notify_rx) = unbounded::<TaskNotification>();

	let mut task = FileOperationTask::new(executor, progress);
	let cancel = task.cancel_flag();

	let worker = std::thread::Builder::new()
		.name(format!("dyad-op-{kind}"))
		.spawn(move || {
			let mut ui = ChannelUi { notifications: notify_tx };
			if let Err(err) = task.start_operation(kind, sources, dest, &mut ui) {
				tracing::error!(error = %err, "failed to start operation");
				return;
			}
			while !task.is_idle() {
				// Suspension point: blocked here, the task does no I/O.
				let Ok(event) = event_rx.recv() else {
					tracing::debug!("task driver channel closed, abandoning operation");
					return;
				};
				if let Err(err) = task.handle_event(event, &mut ui) {
					tracing::warn!(error = %err, "event rejected");
				}
			}
		})
		.expect("spawning task worker");

	TaskHandle {
		events: event_tx,
		notifications: notify_rx,
		cancel,
		worker: Some(worker),
	}
}
