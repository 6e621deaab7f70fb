//! The application dispatcher.
//!
//! Owns the two panes, the renderer, and at most one running operation.
//! The loop is single-threaded and cooperative: `poll_event` is the only
//! blocking call, workers post progress and dialog requests through
//! channels, and all pane or renderer mutation happens here.

use std::sync::Arc;
use std::time::Duration;

use dyad_archive::ArchiveFormat;
use dyad_ops::{
	ConflictChoice, ConflictInfo, Executor, OperationKind, ProgressReceiver, ProgressSender, TaskEvent, TaskHandle,
	TaskNotification, progress_channel, spawn_operation,
};
use dyad_state::{PaneSide, StateStore, WindowLayout};
use dyad_ttk::{Attr, InputEvent, KeyCode, Modifiers, Renderer, Rgb, hex_to_rgb};
use dyad_vpath::{Scheme, VPath, Vfs};

use crate::pane::Pane;

/// Color pair assignments, stable across backends.
pub mod pairs {
	pub const DEFAULT: u8 = 0;
	pub const DIRECTORY: u8 = 1;
	pub const SELECTED: u8 = 3;
	pub const ERROR: u8 = 4;
	pub const HEADER: u8 = 5;
	pub const FOOTER: u8 = 6;
	pub const STATUS: u8 = 7;
	pub const BOUNDARY: u8 = 8;
}

/// How the run loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOutcome {
	Normal,
	Interrupted,
}

/// A modal dialog awaiting one keypress (or a typed name).
enum ActiveDialog {
	Confirm { kind: OperationKind, count: usize },
	Conflict(ConflictInfo),
	Rename { buffer: String },
	Notice(String),
}

pub struct App {
	vfs: Arc<Vfs>,
	store: StateStore,
	renderer: Box<dyn Renderer>,
	left: Pane,
	right: Pane,
	active: PaneSide,
	task: Option<TaskHandle>,
	progress_rx: ProgressReceiver,
	progress_tx: ProgressSender,
	dialog: Option<ActiveDialog>,
	status: String,
	layout: WindowLayout,
	quit: Option<AppOutcome>,
}

impl App {
	pub fn new(vfs: Arc<Vfs>, store: StateStore, renderer: Box<dyn Renderer>, left_path: VPath, right_path: VPath) -> Self {
		let (progress_tx, progress_rx) = progress_channel();
		let layout = store.window_layout().unwrap_or_default();
		let mut app = Self {
			vfs,
			store,
			renderer,
			left: Pane::new(PaneSide::Left, left_path),
			right: Pane::new(PaneSide::Right, right_path),
			active: PaneSide::Left,
			task: None,
			progress_rx,
			progress_tx,
			dialog: None,
			status: String::new(),
			layout,
			quit: None,
		};
		app.init_colors();
		app
	}

	fn init_colors(&mut self) {
		let defs: [(u8, &str, &str); 7] = [
			(pairs::DIRECTORY, "#00AAFF", "#000000"),
			(pairs::SELECTED, "#FFFF00", "#000000"),
			(pairs::ERROR, "#FF4444", "#000000"),
			(pairs::HEADER, "#FFFFFF", "#333366"),
			(pairs::FOOTER, "#CCCCCC", "#222222"),
			(pairs::STATUS, "#FFFFFF", "#004400"),
			(pairs::BOUNDARY, "#888888", "#000000"),
		];
		for (pair, fg, bg) in defs {
			let fg = hex_to_rgb(fg).unwrap_or(Rgb::WHITE);
			let bg = hex_to_rgb(bg).unwrap_or(Rgb::BLACK);
			self.renderer.init_color_pair(pair, fg, bg);
		}
	}

	/// Restores saved pane state (unless the initial path was overridden
	/// on the command line) and fills both listings.
	pub fn startup(&mut self, restore_saved: [bool; 2]) {
		let height = self.list_height();
		let vfs = Arc::clone(&self.vfs);
		for (i, side) in [PaneSide::Left, PaneSide::Right].into_iter().enumerate() {
			let record = if restore_saved[i] {
				self.store.pane_state(side).ok().flatten()
			} else {
				None
			};
			let store = &self.store;
			let pane = match side {
				PaneSide::Left => &mut self.left,
				PaneSide::Right => &mut self.right,
			};
			if let Some(record) = record {
				pane.apply_record(&record);
			}
			if let Err(err) = pane.refresh(&vfs) {
				tracing::warn!(side = %side, error = %err, "pane path unreadable, falling back to /");
				pane.path = VPath::local("/");
				let _ = pane.refresh(&vfs);
			}
			pane.restore_cursor(store, height);
		}
	}

	pub fn left_pane(&self) -> &Pane {
		&self.left
	}

	pub fn right_pane(&self) -> &Pane {
		&self.right
	}

	fn pane_mut(&mut self, side: PaneSide) -> &mut Pane {
		match side {
			PaneSide::Left => &mut self.left,
			PaneSide::Right => &mut self.right,
		}
	}

	fn pane(&self, side: PaneSide) -> &Pane {
		match side {
			PaneSide::Left => &self.left,
			PaneSide::Right => &self.right,
		}
	}

	fn list_height(&self) -> usize {
		let (rows, _) = self.renderer.size();
		// Header and footer rows per pane, one status row.
		rows.saturating_sub(3) as usize
	}

	/// The main event loop.
	pub fn run(&mut self) -> Result<AppOutcome, dyad_ttk::TtkError> {
		while self.quit.is_none() {
			self.pump_task();
			self.draw()?;
			if let Some(event) = self.renderer.poll_event(Duration::from_millis(50))? {
				self.handle_input(event);
			}
		}
		self.persist_session();
		Ok(self.quit.unwrap_or(AppOutcome::Normal))
	}

	/// Drains worker messages: progress into the status line, dialog
	/// requests into the modal slot, completion into a refresh.
	fn pump_task(&mut self) {
		while let Ok(update) = self.progress_rx.try_recv() {
			self.status = format!(
				"{}: {} ({}/{})",
				update.operation, update.current_item, update.processed, update.total
			);
		}

		loop {
			let Some(task) = &self.task else {
				return;
			};
			let Some(notification) = task.try_notification() else {
				return;
			};
			match notification {
				TaskNotification::ConfirmationNeeded { kind, sources, .. } => {
					self.dialog = Some(ActiveDialog::Confirm {
						kind,
						count: sources.len(),
					});
				}
				TaskNotification::ConflictNeeded(conflict) => {
					self.dialog = Some(ActiveDialog::Conflict(conflict));
				}
				TaskNotification::RenameNeeded(_) => {
					self.dialog = Some(ActiveDialog::Rename { buffer: String::new() });
				}
				TaskNotification::Notice(message) => {
					self.dialog = Some(ActiveDialog::Notice(message));
				}
				TaskNotification::Completed(summary) => {
					self.status = format!(
						"done: {} ok, {} errors, {} skipped{}",
						summary.succeeded,
						summary.errors,
						summary.skipped,
						if summary.cancelled { ", cancelled" } else { "" }
					);
					self.task = None;
					let _ = self.left.refresh(&self.vfs);
					let _ = self.right.refresh(&self.vfs);
					break;
				}
			}
		}
	}

	fn handle_input(&mut self, event: InputEvent) {
		match event {
			InputEvent::Resize { .. } => {}
			_ if self.dialog.is_some() => self.handle_dialog_input(event),
			InputEvent::Key { code, modifiers, ch } => self.handle_key(code, modifiers, ch),
			InputEvent::Mouse { .. } => {}
		}
	}

	fn handle_key(&mut self, code: KeyCode, modifiers: Modifiers, ch: Option<char>) {
		if modifiers.contains(Modifiers::CONTROL) && ch == Some('c') {
			self.request_quit(AppOutcome::Interrupted);
			return;
		}
		let height = self.list_height();
		match (code, ch) {
			(KeyCode::Tab, _) => self.active = self.active.other(),
			(KeyCode::Up, _) => self.active_pane_mut().move_focus(-1, height),
			(KeyCode::Down, _) => self.active_pane_mut().move_focus(1, height),
			(KeyCode::PageUp, _) => self.active_pane_mut().move_focus(-(height as isize), height),
			(KeyCode::PageDown, _) => self.active_pane_mut().move_focus(height as isize, height),
			(KeyCode::Home, _) => self.active_pane_mut().focus_first(height),
			(KeyCode::End, _) => self.active_pane_mut().focus_last(height),
			(KeyCode::Enter, _) => self.enter_focused(),
			(KeyCode::Backspace, _) => self.go_to_parent(),
			(KeyCode::Character, Some(' ')) => {
				let pane = self.active_pane_mut();
				pane.toggle_focused_selection();
				pane.move_focus(1, height);
			}
			(KeyCode::F(5), _) | (KeyCode::Character, Some('c')) => self.start_operation(OperationKind::Copy),
			(KeyCode::F(6), _) | (KeyCode::Character, Some('m')) => self.start_operation(OperationKind::Move),
			(KeyCode::F(8), _) | (KeyCode::Delete, _) => self.start_operation(OperationKind::Delete),
			(KeyCode::Character, Some('P')) => self.start_archive_create(),
			(KeyCode::Character, Some('u')) => self.start_archive_extract(),
			(KeyCode::Character, Some('q')) => self.request_quit(AppOutcome::Normal),
			_ => {}
		}
	}

	fn handle_dialog_input(&mut self, event: InputEvent) {
		let InputEvent::Key { code, ch, .. } = event else {
			return;
		};
		let Some(dialog) = self.dialog.take() else {
			return;
		};
		let Some(task) = &self.task else {
			// A notice can outlive its task; any key dismisses it.
			return;
		};

		match dialog {
			ActiveDialog::Notice(_) => {}
			ActiveDialog::Confirm { kind, count } => match (code, ch) {
				(KeyCode::Enter, _) | (_, Some('y')) => task.send_event(TaskEvent::UserConfirmed),
				(KeyCode::Escape, _) | (_, Some('n')) => task.send_event(TaskEvent::UserCancelled),
				_ => self.dialog = Some(ActiveDialog::Confirm { kind, count }),
			},
			ActiveDialog::Conflict(conflict) => match ch {
				Some('o') => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Overwrite { apply_to_all: false })),
				Some('O') => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Overwrite { apply_to_all: true })),
				Some('s') => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Skip { apply_to_all: false })),
				Some('S') => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Skip { apply_to_all: true })),
				Some('r') => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Rename)),
				_ if code == KeyCode::Escape => task.send_event(TaskEvent::ConflictResolved(ConflictChoice::Cancel)),
				_ => self.dialog = Some(ActiveDialog::Conflict(conflict)),
			},
			ActiveDialog::Rename { mut buffer } => match (code, ch) {
				(KeyCode::Enter, _) if !buffer.is_empty() => {
					task.send_event(TaskEvent::RenameProvided(buffer));
				}
				(KeyCode::Escape, _) => task.send_event(TaskEvent::UserCancelled),
				(KeyCode::Backspace, _) => {
					buffer.pop();
					self.dialog = Some(ActiveDialog::Rename { buffer });
				}
				(KeyCode::Character, Some(c)) if c != '/' => {
					buffer.push(c);
					self.dialog = Some(ActiveDialog::Rename { buffer });
				}
				_ => self.dialog = Some(ActiveDialog::Rename { buffer }),
			},
		}
	}

	fn active_pane_mut(&mut self) -> &mut Pane {
		self.pane_mut(self.active)
	}

	/// Enter on a directory descends; on a browsable archive file it
	/// enters the archive as a virtual directory.
	fn enter_focused(&mut self) {
		let height = self.list_height();
		let Some(entry) = self.pane(self.active).focused().cloned() else {
			return;
		};
		let target = if entry.meta.is_dir() {
			Some(entry.path.clone())
		} else if entry.path.scheme() == Scheme::File
			&& let Some(local) = entry.path.as_local()
			&& ArchiveFormat::detect(local).is_some_and(ArchiveFormat::is_browsable)
		{
			Some(VPath::archive_root(local))
		} else {
			None
		};
		let Some(target) = target else {
			return;
		};

		let vfs = Arc::clone(&self.vfs);
		let store = &self.store;
		let pane = match self.active {
			PaneSide::Left => &mut self.left,
			PaneSide::Right => &mut self.right,
		};
		if let Err(err) = pane.chdir(&vfs, store, target, height) {
			self.status = format!("cannot open: {err}");
		}
	}

	fn go_to_parent(&mut self) {
		let height = self.list_height();
		let Some(parent) = self.pane(self.active).path.parent() else {
			return;
		};
		let vfs = Arc::clone(&self.vfs);
		let store = &self.store;
		let pane = match self.active {
			PaneSide::Left => &mut self.left,
			PaneSide::Right => &mut self.right,
		};
		if let Err(err) = pane.chdir(&vfs, store, parent, height) {
			self.status = format!("cannot open parent: {err}");
		}
	}

	/// Starts a copy, move, or delete of the active pane's sources into
	/// the inactive pane's directory. One task at a time.
	fn start_operation(&mut self, kind: OperationKind) {
		if self.task.is_some() {
			self.status = "an operation is already running".to_string();
			return;
		}
		let sources = self.pane(self.active).operation_sources();
		if sources.is_empty() {
			return;
		}
		let dest = match kind {
			OperationKind::Delete => None,
			_ => Some(self.pane(self.active.other()).path.clone()),
		};
		self.task = Some(spawn_operation(
			Executor::new(Arc::clone(&self.vfs)),
			Some(self.progress_tx.clone()),
			kind,
			sources,
			dest,
		));
	}

	/// Packs the active pane's sources into `<first-source>.zip` in the
	/// other pane.
	fn start_archive_create(&mut self) {
		if self.task.is_some() {
			self.status = "an operation is already running".to_string();
			return;
		}
		let sources = self.pane(self.active).operation_sources();
		let Some(first) = sources.first() else {
			return;
		};
		let dest = self.pane(self.active.other()).path.join(&format!("{}.zip", first.stem()));
		self.task = Some(spawn_operation(
			Executor::new(Arc::clone(&self.vfs)),
			Some(self.progress_tx.clone()),
			OperationKind::ArchiveCreate,
			sources,
			Some(dest),
		));
	}

	/// Unpacks the focused archive into the other pane's directory.
	fn start_archive_extract(&mut self) {
		if self.task.is_some() {
			self.status = "an operation is already running".to_string();
			return;
		}
		let Some(entry) = self.pane(self.active).focused() else {
			return;
		};
		let source = entry.path.clone();
		let dest = self.pane(self.active.other()).path.clone();
		self.task = Some(spawn_operation(
			Executor::new(Arc::clone(&self.vfs)),
			Some(self.progress_tx.clone()),
			OperationKind::ArchiveExtract,
			vec![source],
			Some(dest),
		));
	}

	fn request_quit(&mut self, outcome: AppOutcome) {
		if let Some(task) = &self.task {
			task.cancel();
		}
		self.quit = Some(outcome);
	}

	/// Releases the renderer; call once after [`Self::run`] returns.
	pub fn shutdown(&mut self) -> Result<(), dyad_ttk::TtkError> {
		self.renderer.shutdown()
	}

	/// Saves both panes and the layout for the next session.
	fn persist_session(&mut self) {
		for side in [PaneSide::Left, PaneSide::Right] {
			self.pane(side).save_cursor(&self.store);
			let record = self.pane(side).to_record();
			if let Err(err) = self.store.save_pane_state(side, &record) {
				tracing::warn!(side = %side, error = %err, "failed to save pane state");
			}
		}
		if let Err(err) = self.store.save_window_layout(&self.layout) {
			tracing::warn!(error = %err, "failed to save window layout");
		}
	}

	fn draw(&mut self) -> Result<(), dyad_ttk::TtkError> {
		let (rows, cols) = self.renderer.size();
		if rows < 4 || cols < 8 {
			return self.renderer.refresh();
		}
		let split = ((cols as f32) * self.layout.left_pane_ratio) as u16;
		let height = self.list_height();

		self.renderer.clear();
		self.draw_pane(PaneSide::Left, 0, split, height);
		self.draw_pane(PaneSide::Right, split + 1, cols - split - 1, height);
		self.renderer.draw_vline(0, split, "│", rows - 1, pairs::BOUNDARY);

		// Status or dialog line.
		let (line, pair) = self.bottom_line();
		self.renderer.draw_text(rows - 1, 0, &" ".repeat(cols as usize), pair, Attr::empty());
		self.renderer.draw_text(rows - 1, 0, &line, pair, Attr::empty());
		self.renderer.refresh()
	}

	fn bottom_line(&self) -> (String, u8) {
		match &self.dialog {
			Some(ActiveDialog::Confirm { kind, count }) => {
				(format!("{kind} {count} item(s)? [y]es / [n]o"), pairs::STATUS)
			}
			Some(ActiveDialog::Conflict(conflict)) => (
				format!(
					"exists: {} (conflict {}/{}) [o]verwrite [O]=all [s]kip [S]=all [r]ename Esc=cancel",
					conflict.dest, conflict.index, conflict.known_total
				),
				pairs::STATUS,
			),
			Some(ActiveDialog::Rename { buffer }) => (format!("new name: {buffer}_"), pairs::STATUS),
			Some(ActiveDialog::Notice(message)) => (format!("{message} (any key)"), pairs::ERROR),
			None => (self.status.clone(), pairs::STATUS),
		}
	}

	fn draw_pane(&mut self, side: PaneSide, col: u16, width: u16, height: usize) {
		let pane = self.pane(side);
		let is_active = side == self.active;
		let title = format!(
			"{}{}",
			if is_active { "> " } else { "  " },
			self.vfs
				.storage_for(&pane.path)
				.map(|s| s.display_title(&pane.path))
				.unwrap_or_else(|_| pane.path.to_string())
		);
		let footer = format!("{} entries, {} selected", pane.entries.len(), pane.selected.len());

		let visible: Vec<(usize, String, bool, bool)> = pane
			.entries
			.iter()
			.enumerate()
			.skip(pane.scroll_offset)
			.take(height)
			.map(|(index, entry)| {
				let marker = if pane.selected.contains(&entry.path.to_string()) { "*" } else { " " };
				let suffix = if entry.meta.is_dir() { "/" } else { "" };
				(
					index,
					format!("{marker}{}{suffix}", entry.path.name()),
					entry.meta.is_dir(),
					pane.selected.contains(&entry.path.to_string()),
				)
			})
			.collect();
		let focused_index = pane.focused_index;
		let scroll_offset = pane.scroll_offset;

		self.renderer.draw_text(0, col, &title, pairs::HEADER, Attr::BOLD);
		for (index, text, is_dir, is_selected) in visible {
			let row = (index - scroll_offset) as u16 + 1;
			let pair = if is_selected {
				pairs::SELECTED
			} else if is_dir {
				pairs::DIRECTORY
			} else {
				pairs::DEFAULT
			};
			let attrs = if is_active && index == focused_index {
				Attr::REVERSE
			} else {
				Attr::empty()
			};
			let clipped: String = text.chars().take(width as usize).collect();
			self.renderer.draw_text(row, col, &clipped, pair, attrs);
		}
		self.renderer.draw_text(height as u16 + 1, col, &footer, pairs::FOOTER, Attr::empty());
	}
}
