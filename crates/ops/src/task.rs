//! The file-operation task state machine.
//!
//! A task orchestrates one user-initiated operation. It owns the state
//! machine and nothing else: dialogs happen through the [`TaskUi`]
//! callbacks, storage happens through the [`Executor`]. The driver is
//! event-based: the UI (or the worker runner) feeds [`TaskEvent`]s and
//! the task advances until it needs another answer or finishes.
//!
//! ```text
//! Idle → Validating → AwaitingConfirmation → Executing ⇄ AwaitingConflictChoice
//!                                               ↓              ↓ rename
//!                                           Finalizing ← AwaitingRename
//!                                               ↑ (also via Cancelled)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dyad_vpath::{Scheme, VPath, VfsError};

use crate::error::{OpsError, Result};
use crate::executor::{Executor, WorkItem, dest_for};
use crate::progress::{OperationSummary, ProgressSender, ProgressUpdate};

/// What the user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
	Copy,
	Move,
	Delete,
	ArchiveCreate,
	ArchiveExtract,
}

impl OperationKind {
	pub fn name(self) -> &'static str {
		match self {
			Self::Copy => "copy",
			Self::Move => "move",
			Self::Delete => "delete",
			Self::ArchiveCreate => "archive-create",
			Self::ArchiveExtract => "archive-extract",
		}
	}

	fn needs_confirmation(self) -> bool {
		// Archive operations take the short path straight to Executing.
		matches!(self, Self::Copy | Self::Move | Self::Delete)
	}
}

impl std::fmt::Display for OperationKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// Observable task states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
	#[default]
	Idle,
	Validating,
	AwaitingConfirmation,
	Executing,
	AwaitingConflictChoice,
	AwaitingRename,
	Finalizing,
	Cancelled,
}

impl TaskState {
	pub fn name(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Validating => "validating",
			Self::AwaitingConfirmation => "awaiting-confirmation",
			Self::Executing => "executing",
			Self::AwaitingConflictChoice => "awaiting-conflict-choice",
			Self::AwaitingRename => "awaiting-rename",
			Self::Finalizing => "finalizing",
			Self::Cancelled => "cancelled",
		}
	}
}

/// The user's answer to a conflict dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictChoice {
	Overwrite { apply_to_all: bool },
	Skip { apply_to_all: bool },
	Rename,
	Cancel,
}

/// Sticky policy once "apply to all" was chosen. Rename is always
/// per-entry and never becomes a policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConflictPolicy {
	OverwriteAll,
	SkipAll,
}

/// Events the driver feeds into the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
	UserConfirmed,
	UserCancelled,
	ConflictResolved(ConflictChoice),
	RenameProvided(String),
	CancelRequested,
}

impl TaskEvent {
	fn name(&self) -> &'static str {
		match self {
			Self::UserConfirmed => "user-confirmed",
			Self::UserCancelled => "user-cancelled",
			Self::ConflictResolved(_) => "conflict-resolved",
			Self::RenameProvided(_) => "rename-provided",
			Self::CancelRequested => "cancel-requested",
		}
	}
}

/// Everything a conflict dialog needs to render.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictInfo {
	pub source: VPath,
	pub dest: VPath,
	/// 1-based ordinal of this conflict.
	pub index: usize,
	/// Conflicts known so far, including this one. May grow as the walk
	/// continues; the dialog shows the current count.
	pub known_total: usize,
}

/// Callbacks from the task to the owning UI.
///
/// Implementations must not block and must not touch storage: they show
/// a dialog (or queue a message to the UI thread) and later feed the
/// answer back as a [`TaskEvent`].
pub trait TaskUi {
	fn request_confirmation(&mut self, kind: OperationKind, sources: &[VPath], dest: Option<&VPath>);
	fn request_conflict_choice(&mut self, conflict: &ConflictInfo);
	fn request_rename(&mut self, conflict: &ConflictInfo);
	/// One-shot informational dialog (validation failures, abort
	/// notices).
	fn notify(&mut self, message: &str);
	fn operation_complete(&mut self, summary: &OperationSummary);
}

/// A single user-initiated file operation.
pub struct FileOperationTask {
	state: TaskState,
	kind: Option<OperationKind>,
	dest_dir: Option<VPath>,
	items: Vec<WorkItem>,
	next_index: usize,
	policy: Option<ConflictPolicy>,
	pending_rename: Option<String>,
	/// One-shot overwrite for the current entry, set by a non-sticky
	/// Overwrite choice.
	pending_overwrite: bool,
	pending_conflict: Option<ConflictInfo>,
	conflicts_seen: usize,
	summary: OperationSummary,
	moved_dirs: Vec<VPath>,
	cancel: Arc<AtomicBool>,
	executor: Executor,
	progress: Option<ProgressSender>,
}

impl FileOperationTask {
	pub fn new(executor: Executor, progress: Option<ProgressSender>) -> Self {
		Self {
			state: TaskState::Idle,
			kind: None,
			dest_dir: None,
			items: Vec::new(),
			next_index: 0,
			policy: None,
			pending_rename: None,
			pending_overwrite: false,
			pending_conflict: None,
			conflicts_seen: 0,
			summary: OperationSummary::default(),
			moved_dirs: Vec::new(),
			cancel: Arc::new(AtomicBool::new(false)),
			executor,
			progress,
		}
	}

	pub fn state(&self) -> TaskState {
		self.state
	}

	pub fn is_idle(&self) -> bool {
		self.state == TaskState::Idle
	}

	/// The shared cancellation flag; setting it stops the task at its
	/// next checkpoint. [`TaskEvent::CancelRequested`] also sets it.
	pub fn cancel_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.cancel)
	}

	/// Begins an operation. Validation happens before any storage
	/// mutation; a validation failure surfaces one dialog and leaves the
	/// task Idle.
	pub fn start_operation(
		&mut self,
		kind: OperationKind,
		sources: Vec<VPath>,
		dest: Option<VPath>,
		ui: &mut dyn TaskUi,
	) -> Result<()> {
		self.start_operation_with_overwrite(kind, sources, dest, None, ui)
	}

	/// Like [`Self::start_operation`], with a preset conflict answer for
	/// callers that pass a boolean `overwrite` flag: `true` maps to
	/// overwrite-all, `false` to skip-all, so no conflict dialog is ever
	/// raised.
	pub fn start_operation_with_overwrite(
		&mut self,
		kind: OperationKind,
		sources: Vec<VPath>,
		dest: Option<VPath>,
		overwrite: Option<bool>,
		ui: &mut dyn TaskUi,
	) -> Result<()> {
		if self.state != TaskState::Idle {
			return Err(OpsError::Busy);
		}
		self.reset();
		self.policy = overwrite.map(|overwrite| {
			if overwrite {
				ConflictPolicy::OverwriteAll
			} else {
				ConflictPolicy::SkipAll
			}
		});
		self.state = TaskState::Validating;
		tracing::info!(kind = %kind, sources = sources.len(), "operation started");

		let sources = match self.validate(kind, sources, dest.as_ref()) {
			Ok(sources) => sources,
			Err(message) => {
				tracing::warn!(kind = %kind, %message, "operation rejected");
				ui.notify(&message);
				self.state = TaskState::Idle;
				return Ok(());
			}
		};

		let items = match self.enumerate(kind, &sources, dest.as_ref()) {
			Ok(items) => items,
			Err(err) => {
				ui.notify(&err.to_string());
				self.state = TaskState::Idle;
				return Ok(());
			}
		};

		self.kind = Some(kind);
		self.dest_dir = dest;
		self.items = items;

		// Total entry count reaches the progress sink before any I/O.
		self.send_progress("", 0);

		if kind.needs_confirmation() {
			self.state = TaskState::AwaitingConfirmation;
			ui.request_confirmation(kind, &sources, self.dest_dir.as_ref());
			Ok(())
		} else {
			self.state = TaskState::Executing;
			self.run(ui)
		}
	}

	/// Feeds one event into the state machine.
	pub fn handle_event(&mut self, event: TaskEvent, ui: &mut dyn TaskUi) -> Result<()> {
		match (self.state, event) {
			(TaskState::AwaitingConfirmation, TaskEvent::UserCancelled | TaskEvent::CancelRequested) => {
				// Nothing ran yet: straight back to Idle, no summary.
				tracing::info!(kind = ?self.kind, "operation declined at confirmation");
				self.reset();
				self.state = TaskState::Idle;
				Ok(())
			}
			(_, TaskEvent::CancelRequested) => {
				self.cancel.store(true, Ordering::Relaxed);
				if matches!(self.state, TaskState::AwaitingConflictChoice | TaskState::AwaitingRename) {
					self.enter_cancelled(ui);
				}
				// In Executing the flag is observed at the next
				// checkpoint; in Idle there is nothing to do.
				Ok(())
			}
			(TaskState::AwaitingConfirmation, TaskEvent::UserConfirmed) => {
				self.state = TaskState::Executing;
				self.run(ui)
			}
			(TaskState::AwaitingConflictChoice, TaskEvent::ConflictResolved(choice)) => match choice {
				ConflictChoice::Overwrite { apply_to_all } => {
					if apply_to_all {
						self.policy = Some(ConflictPolicy::OverwriteAll);
					} else {
						self.pending_overwrite = true;
					}
					self.state = TaskState::Executing;
					self.pending_conflict = None;
					self.run(ui)
				}
				ConflictChoice::Skip { apply_to_all } => {
					if apply_to_all {
						self.policy = Some(ConflictPolicy::SkipAll);
					}
					self.summary.skipped += 1;
					self.next_index += 1;
					self.state = TaskState::Executing;
					self.pending_conflict = None;
					self.run(ui)
				}
				ConflictChoice::Rename => {
					self.state = TaskState::AwaitingRename;
					if let Some(conflict) = self.pending_conflict.clone() {
						ui.request_rename(&conflict);
					}
					Ok(())
				}
				ConflictChoice::Cancel => {
					self.enter_cancelled(ui);
					Ok(())
				}
			},
			(TaskState::AwaitingRename, TaskEvent::RenameProvided(name)) => {
				self.pending_rename = Some(name);
				self.pending_conflict = None;
				self.state = TaskState::Executing;
				self.run(ui)
			}
			(TaskState::AwaitingRename, TaskEvent::UserCancelled) => {
				self.enter_cancelled(ui);
				Ok(())
			}
			(state, event) => Err(OpsError::InvalidTransition {
				state: state.name(),
				event: event.name(),
			}),
		}
	}

	/// Capability and shape checks, §-style: pure validation only,
	/// before any mutating I/O. Returns the (possibly narrowed) source
	/// list.
	fn validate(
		&self,
		kind: OperationKind,
		mut sources: Vec<VPath>,
		dest: Option<&VPath>,
	) -> std::result::Result<Vec<VPath>, String> {
		let vfs = self.executor.vfs();

		if sources.is_empty() {
			return Err("No files selected.".to_string());
		}
		for source in &sources {
			if !vfs.exists(source) {
				return Err(format!("Source does not exist: {source}"));
			}
		}

		let dest_writable = |dest: &VPath, message: &str| -> std::result::Result<(), String> {
			let storage = vfs.storage_for(dest).map_err(|e| e.to_string())?;
			if storage.supports_write_operations() {
				Ok(())
			} else {
				Err(message.to_string())
			}
		};

		match kind {
			OperationKind::Delete => {
				for source in &sources {
					let storage = vfs.storage_for(source).map_err(|e| e.to_string())?;
					if !storage.supports_write_operations() {
						return Err("Cannot delete files from read-only storage.".to_string());
					}
				}
			}
			OperationKind::Move => {
				for source in &sources {
					let storage = vfs.storage_for(source).map_err(|e| e.to_string())?;
					if !storage.supports_write_operations() {
						return Err("Cannot move files from read-only storage. Use copy instead.".to_string());
					}
				}
				let dest = dest.ok_or("Move requires a destination.")?;
				dest_writable(dest, "Cannot move files to read-only storage.")?;

				if Executor::is_cross_storage(&sources, dest) {
					tracing::info!(dest = %dest, "cross-storage move, performed as copy then delete");
				}

				// Sources already sitting in the destination directory are
				// dropped; moving them would be a no-op.
				let before = sources.len();
				sources.retain(|s| s.parent().as_ref() != Some(dest));
				let dropped = before - sources.len();
				if dropped > 0 {
					tracing::info!(dropped, "skipping sources already in destination directory");
				}
				if sources.is_empty() {
					return Err("Cannot move files to the same directory.".to_string());
				}
			}
			OperationKind::Copy => {
				let dest = dest.ok_or("Copy requires a destination.")?;
				dest_writable(dest, "Cannot copy files to read-only storage.")?;
			}
			OperationKind::ArchiveCreate => {
				let dest = dest.ok_or("Archive creation requires a destination.")?;
				dest_writable(dest, "Cannot create an archive on read-only storage.")?;
			}
			OperationKind::ArchiveExtract => {
				let dest = dest.ok_or("Extraction requires a destination.")?;
				dest_writable(dest, "Cannot extract to read-only storage.")?;
			}
		}
		Ok(sources)
	}

	fn enumerate(&self, kind: OperationKind, sources: &[VPath], _dest: Option<&VPath>) -> Result<Vec<WorkItem>> {
		match kind {
			OperationKind::Copy | OperationKind::Move | OperationKind::ArchiveCreate => self.executor.enumerate(sources),
			OperationKind::Delete => {
				// Children before parents, so directories are empty when
				// their turn comes.
				let mut items = self.executor.enumerate(sources)?;
				items.reverse();
				Ok(items)
			}
			OperationKind::ArchiveExtract => {
				let root = self.archive_root(sources)?;
				self.executor.enumerate_archive(&root)
			}
		}
	}

	/// Normalizes the extract source: either an archive path already, or
	/// a local archive file promoted to its archive root.
	fn archive_root(&self, sources: &[VPath]) -> Result<VPath> {
		let source = sources
			.first()
			.ok_or_else(|| OpsError::Vfs(VfsError::InvalidPath("no archive selected".to_string())))?;
		match source.scheme() {
			Scheme::Archive => Ok(source.clone()),
			Scheme::File => {
				let host = source
					.as_local()
					.ok_or_else(|| OpsError::Vfs(VfsError::InvalidPath(source.to_string())))?;
				Ok(VPath::archive_root(host))
			}
			_ => Err(OpsError::Vfs(VfsError::UnsupportedOperation(format!(
				"cannot extract from {source}"
			)))),
		}
	}

	/// The Executing loop. Runs until done, cancelled, aborted, or a
	/// dialog is needed, in which case the state changes and control
	/// returns to the driver.
	fn run(&mut self, ui: &mut dyn TaskUi) -> Result<()> {
		let Some(kind) = self.kind else {
			return Ok(());
		};

		if kind == OperationKind::ArchiveCreate {
			return self.run_archive_create(ui);
		}

		while self.next_index < self.items.len() {
			if self.cancel.load(Ordering::Relaxed) {
				self.enter_cancelled(ui);
				return Ok(());
			}

			let item = self.items[self.next_index].clone();
			let rename_leaf = self.pending_rename.take();
			let overwrite_once = std::mem::take(&mut self.pending_overwrite);
			let dest = self
				.dest_dir
				.as_ref()
				.map(|dir| dest_for(dir, &item, rename_leaf.as_deref()));

			// Conflict detection for operations that write under a
			// destination. An existing directory merging with a source
			// directory is not a conflict.
			if kind != OperationKind::Delete
				&& rename_leaf.is_none()
				&& !overwrite_once
				&& let Some(dest) = dest.as_ref()
				&& self.executor.vfs().exists(dest)
				&& !(item.is_dir() && self.executor.vfs().is_dir(dest))
			{
				match self.policy {
					Some(ConflictPolicy::SkipAll) => {
						self.summary.skipped += 1;
						self.next_index += 1;
						continue;
					}
					Some(ConflictPolicy::OverwriteAll) => {}
					None => {
						self.conflicts_seen += 1;
						let conflict = ConflictInfo {
							source: item.src.clone(),
							dest: dest.clone(),
							index: self.conflicts_seen,
							known_total: self.conflicts_seen + self.count_pending_conflicts(),
						};
						self.pending_conflict = Some(conflict.clone());
						self.state = TaskState::AwaitingConflictChoice;
						ui.request_conflict_choice(&conflict);
						return Ok(());
					}
				}
			}

			let result = self.perform(kind, &item, dest.as_ref());
			match result {
				Ok(()) => {
					self.summary.succeeded += 1;
					if kind == OperationKind::Move && item.is_dir() {
						self.moved_dirs.push(item.src.clone());
					}
					self.send_progress(&item.rel, 0);
				}
				Err(err) if err.is_cancelled() => {
					self.enter_cancelled(ui);
					return Ok(());
				}
				Err(err) if err.aborts_operation() => {
					tracing::error!(item = %item.src, error = %err, "operation aborted");
					ui.notify(&format!("Operation aborted: {err}"));
					self.finalize(ui);
					return Ok(());
				}
				Err(err) => {
					tracing::error!(item = %item.src, error = %err, "entry failed, continuing");
					self.summary.errors += 1;
				}
			}
			self.next_index += 1;
		}

		if kind == OperationKind::Move {
			let moved = std::mem::take(&mut self.moved_dirs);
			self.executor.remove_source_dirs(&moved);
		}
		self.finalize(ui);
		Ok(())
	}

	fn perform(&self, kind: OperationKind, item: &WorkItem, dest: Option<&VPath>) -> Result<()> {
		let cancel = &self.cancel;
		let progress = self.progress.clone();
		let total = self.items.len();
		let processed = self.next_index;
		let rel = item.rel.clone();
		let mut on_bytes = move |bytes: u64| {
			if let Some(sender) = &progress {
				let _ = sender.send(ProgressUpdate {
					operation: kind,
					current_item: rel.clone(),
					processed,
					total,
					current_bytes: bytes,
				});
			}
		};

		match kind {
			OperationKind::Copy | OperationKind::ArchiveExtract => {
				let dest = dest.ok_or_else(|| OpsError::Vfs(VfsError::InvalidPath("missing destination".to_string())))?;
				self.executor.copy_item(item, dest, &mut on_bytes, cancel)
			}
			OperationKind::Move => {
				let dest = dest.ok_or_else(|| OpsError::Vfs(VfsError::InvalidPath("missing destination".to_string())))?;
				self.executor.move_item(item, dest, &mut on_bytes, cancel)
			}
			OperationKind::Delete => self.executor.delete_item(item),
			OperationKind::ArchiveCreate => Ok(()),
		}
	}

	fn run_archive_create(&mut self, ui: &mut dyn TaskUi) -> Result<()> {
		let Some(dest) = self.dest_dir.clone() else {
			self.finalize(ui);
			return Ok(());
		};
		let items = std::mem::take(&mut self.items);
		let progress = self.progress.clone();
		let total = items.len();
		let mut processed = 0usize;

		let result = self.executor.create_archive(
			&items,
			&dest,
			&mut |item| {
				processed += 1;
				if let Some(sender) = &progress {
					let _ = sender.send(ProgressUpdate {
						operation: OperationKind::ArchiveCreate,
						current_item: item.rel.clone(),
						processed,
						total,
						current_bytes: 0,
					});
				}
			},
			&self.cancel,
		);

		match result {
			Ok((succeeded, errors)) => {
				self.summary.succeeded = succeeded;
				self.summary.errors = errors;
				self.finalize(ui);
			}
			Err(err) if err.is_cancelled() => self.enter_cancelled(ui),
			Err(err) => {
				tracing::error!(dest = %dest, error = %err, "archive creation failed");
				ui.notify(&format!("Archive creation failed: {err}"));
				self.summary.errors += 1;
				self.finalize(ui);
			}
		}
		Ok(())
	}

	/// Conflicts already visible among unprocessed entries.
	fn count_pending_conflicts(&self) -> usize {
		let Some(dest_dir) = self.dest_dir.as_ref() else {
			return 0;
		};
		self.items[self.next_index + 1..]
			.iter()
			.filter(|item| {
				let dest = dest_for(dest_dir, item, None);
				self.executor.vfs().exists(&dest) && !(item.is_dir() && self.executor.vfs().is_dir(&dest))
			})
			.count()
	}

	fn enter_cancelled(&mut self, ui: &mut dyn TaskUi) {
		self.state = TaskState::Cancelled;
		self.summary.cancelled = true;
		tracing::info!(kind = ?self.kind, "operation cancelled");
		self.finalize(ui);
	}

	fn finalize(&mut self, ui: &mut dyn TaskUi) {
		self.state = TaskState::Finalizing;
		let summary = self.summary;
		tracing::info!(
			succeeded = summary.succeeded,
			errors = summary.errors,
			skipped = summary.skipped,
			cancelled = summary.cancelled,
			"operation finished"
		);
		ui.operation_complete(&summary);
		self.reset();
		self.state = TaskState::Idle;
	}

	fn reset(&mut self) {
		self.kind = None;
		self.dest_dir = None;
		self.items.clear();
		self.next_index = 0;
		self.policy = None;
		self.pending_rename = None;
		self.pending_overwrite = false;
		self.pending_conflict = None;
		self.conflicts_seen = 0;
		self.summary = OperationSummary::default();
		self.moved_dirs.clear();
		self.cancel.store(false, Ordering::Relaxed);
	}

	fn send_progress(&self, current_item: &str, current_bytes: u64) {
		if let Some(sender) = &self.progress {
			let _ = sender.send(ProgressUpdate {
				operation: self.kind.unwrap_or(OperationKind::Copy),
				current_item: current_item.to_string(),
				processed: self.summary.succeeded + self.summary.errors + self.summary.skipped,
				total: self.items.len(),
				current_bytes,
			});
		}
	}
}
