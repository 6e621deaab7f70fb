//! Per-pane browsing state.
//!
//! A pane owns its current path, the sorted and filtered listing, the
//! focus/scroll position, and the multi-selection. Invariants held by
//! every mutator:
//!
//! - `focused_index < entries.len()` whenever the listing is non-empty,
//!   and 0 when it is empty;
//! - `scroll_offset` keeps the focused row inside the display height;
//! - selection keys are canonical path strings and survive refreshes.

use std::collections::HashSet;

use dyad_ops::{EntryRecord, SortMode, filter_entries, prune_selection, sort_entries, toggle_selection};
use dyad_state::{PaneSide, PaneStateRecord, StateStore};
use dyad_vpath::{VPath, Vfs, VfsError};

pub struct Pane {
	pub side: PaneSide,
	pub path: VPath,
	pub entries: Vec<EntryRecord>,
	pub focused_index: usize,
	pub scroll_offset: usize,
	pub selected: HashSet<String>,
	pub sort_mode: SortMode,
	pub sort_reverse: bool,
	pub filter_glob: Option<String>,
}

impl Pane {
	pub fn new(side: PaneSide, path: VPath) -> Self {
		Self {
			side,
			path,
			entries: Vec::new(),
			focused_index: 0,
			scroll_offset: 0,
			selected: HashSet::new(),
			sort_mode: SortMode::Name,
			sort_reverse: false,
			filter_glob: None,
		}
	}

	/// Rebuilds the listing from storage and replaces it atomically.
	/// Focus is clamped, the selection pruned to surviving entries.
	pub fn refresh(&mut self, vfs: &Vfs) -> Result<(), VfsError> {
		let children = vfs.iterdir(&self.path)?;
		let mut records = Vec::with_capacity(children.len());
		for child in children {
			match vfs.stat(&child) {
				Ok(meta) => records.push(EntryRecord { path: child, meta }),
				// Entries that vanish between listing and stat are
				// dropped, not fatal.
				Err(VfsError::NotFound(_)) => {}
				Err(err) => return Err(err),
			}
		}
		let mut records = filter_entries(records, self.filter_glob.as_deref());
		sort_entries(&mut records, self.sort_mode, self.sort_reverse);

		self.entries = records;
		prune_selection(&mut self.selected, &self.entries);
		self.clamp_focus();
		Ok(())
	}

	fn clamp_focus(&mut self) {
		if self.entries.is_empty() {
			self.focused_index = 0;
			self.scroll_offset = 0;
		} else if self.focused_index >= self.entries.len() {
			self.focused_index = self.entries.len() - 1;
		}
	}

	/// The entry under the cursor.
	pub fn focused(&self) -> Option<&EntryRecord> {
		self.entries.get(self.focused_index)
	}

	/// Moves focus by a signed delta and keeps it visible.
	pub fn move_focus(&mut self, delta: isize, height: usize) {
		if self.entries.is_empty() {
			return;
		}
		let last = self.entries.len() - 1;
		let target = self.focused_index.saturating_add_signed(delta).min(last);
		self.focused_index = target;
		self.ensure_visible(height);
	}

	pub fn focus_first(&mut self, height: usize) {
		self.focused_index = 0;
		self.ensure_visible(height);
	}

	pub fn focus_last(&mut self, height: usize) {
		self.focused_index = self.entries.len().saturating_sub(1);
		self.ensure_visible(height);
	}

	/// Puts focus on the entry named `name`, if present.
	pub fn focus_name(&mut self, name: &str, height: usize) {
		if let Some(index) = self.entries.iter().position(|e| e.path.name() == name) {
			self.focused_index = index;
			self.ensure_visible(height);
		}
	}

	/// Adjusts the scroll window so the focused row is on screen.
	pub fn ensure_visible(&mut self, height: usize) {
		if height == 0 {
			return;
		}
		if self.focused_index < self.scroll_offset {
			self.scroll_offset = self.focused_index;
		} else if self.focused_index >= self.scroll_offset + height {
			self.scroll_offset = self.focused_index + 1 - height;
		}
	}

	/// Toggles selection of the focused entry.
	pub fn toggle_focused_selection(&mut self) {
		if let Some(entry) = self.focused() {
			let path = entry.path.clone();
			toggle_selection(&mut self.selected, &path);
		}
	}

	/// The operation sources: the selection when non-empty, else the
	/// focused entry.
	pub fn operation_sources(&self) -> Vec<VPath> {
		if self.selected.is_empty() {
			return self.focused().map(|e| vec![e.path.clone()]).unwrap_or_default();
		}
		self.entries
			.iter()
			.filter(|e| self.selected.contains(&e.path.to_string()))
			.map(|e| e.path.clone())
			.collect()
	}

	/// Changes directory: saves the cursor for the old directory,
	/// refreshes under the new one, and restores the remembered cursor
	/// if one exists. Also feeds the recent-directories list.
	pub fn chdir(&mut self, vfs: &Vfs, store: &StateStore, new_path: VPath, height: usize) -> Result<(), VfsError> {
		self.save_cursor(store);

		let old_path = std::mem::replace(&mut self.path, new_path);
		let old_entries = std::mem::take(&mut self.entries);
		if let Err(err) = self.refresh(vfs) {
			// Unreadable target: stay where we were.
			self.path = old_path;
			self.entries = old_entries;
			return Err(err);
		}

		self.selected.clear();
		self.focused_index = 0;
		self.scroll_offset = 0;
		self.restore_cursor(store, height);

		if let Err(err) = store.push_recent_directory(&self.path.to_string()) {
			tracing::warn!(error = %err, "failed to record recent directory");
		}
		Ok(())
	}

	/// Persists the focused entry name for the current directory.
	pub fn save_cursor(&self, store: &StateStore) {
		if let Some(entry) = self.focused()
			&& let Err(err) = store.save_pane_cursor_position(self.side, &self.path.to_string(), &entry.path.name())
		{
			tracing::warn!(error = %err, "failed to save cursor position");
		}
	}

	/// Restores the remembered cursor for the current directory.
	pub fn restore_cursor(&mut self, store: &StateStore, height: usize) {
		match store.load_pane_cursor_position(self.side, &self.path.to_string()) {
			Ok(Some(name)) => self.focus_name(&name, height),
			Ok(None) => {}
			Err(err) => tracing::warn!(error = %err, "failed to load cursor position"),
		}
	}

	/// The saved form of this pane's browsing state.
	pub fn to_record(&self) -> PaneStateRecord {
		PaneStateRecord {
			path: self.path.to_string(),
			sort_mode: self.sort_mode.name().to_string(),
			sort_reverse: self.sort_reverse,
			filter_glob: self.filter_glob.clone(),
		}
	}

	/// Applies a saved record, leaving the listing to the next refresh.
	pub fn apply_record(&mut self, record: &PaneStateRecord) {
		if let Ok(path) = VPath::parse(&record.path) {
			self.path = path;
		}
		if let Some(mode) = SortMode::parse(&record.sort_mode) {
			self.sort_mode = mode;
		}
		self.sort_reverse = record.sort_reverse;
		self.filter_glob = record.filter_glob.clone();
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;

	use dyad_vpath::LocalStorage;
	use pretty_assertions::assert_eq;

	use super::*;

	fn vfs() -> Vfs {
		let mut vfs = Vfs::new();
		vfs.register(Arc::new(LocalStorage::new()));
		vfs
	}

	fn seeded_pane(dir: &std::path::Path, vfs: &Vfs) -> Pane {
		for name in ["a.txt", "b.txt", "c.txt"] {
			vfs.write_bytes(&VPath::local(dir.join(name)), b"x").unwrap();
		}
		let mut pane = Pane::new(PaneSide::Left, VPath::local(dir));
		pane.refresh(vfs).unwrap();
		pane
	}

	#[test]
	fn refresh_sorts_and_clamps_focus() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = seeded_pane(dir.path(), &vfs);
		assert_eq!(pane.entries.len(), 3);

		pane.focused_index = 2;
		vfs.unlink(&VPath::local(dir.path().join("b.txt"))).unwrap();
		vfs.unlink(&VPath::local(dir.path().join("c.txt"))).unwrap();
		pane.refresh(&vfs).unwrap();
		assert_eq!(pane.entries.len(), 1);
		assert_eq!(pane.focused_index, 0);
	}

	#[test]
	fn empty_listing_resets_focus_and_scroll() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = Pane::new(PaneSide::Left, VPath::local(dir.path()));
		pane.refresh(&vfs).unwrap();
		assert_eq!(pane.focused_index, 0);
		assert_eq!(pane.scroll_offset, 0);
		assert!(pane.focused().is_none());
	}

	#[test]
	fn scroll_follows_focus() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		for i in 0..30 {
			vfs.write_bytes(&VPath::local(dir.path().join(format!("f{i:02}"))), b"x").unwrap();
		}
		let mut pane = Pane::new(PaneSide::Left, VPath::local(dir.path()));
		pane.refresh(&vfs).unwrap();

		pane.focus_last(10);
		assert_eq!(pane.focused_index, 29);
		assert_eq!(pane.scroll_offset, 20);

		pane.focus_first(10);
		assert_eq!(pane.scroll_offset, 0);

		pane.move_focus(12, 10);
		assert_eq!(pane.focused_index, 12);
		assert_eq!(pane.scroll_offset, 3);
	}

	#[test]
	fn selection_survives_refresh() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = seeded_pane(dir.path(), &vfs);

		pane.toggle_focused_selection();
		assert_eq!(pane.selected.len(), 1);
		pane.refresh(&vfs).unwrap();
		assert_eq!(pane.selected.len(), 1);

		// Selected file disappears: the selection key goes with it.
		vfs.unlink(&VPath::local(dir.path().join("a.txt"))).unwrap();
		pane.refresh(&vfs).unwrap();
		assert!(pane.selected.is_empty());
	}

	#[test]
	fn operation_sources_prefer_selection() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = seeded_pane(dir.path(), &vfs);

		assert_eq!(pane.operation_sources().len(), 1);

		pane.toggle_focused_selection();
		pane.move_focus(1, 20);
		pane.toggle_focused_selection();
		assert_eq!(pane.operation_sources().len(), 2);
	}

	#[test]
	fn chdir_saves_and_restores_cursor() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let store = StateStore::open_in_memory().unwrap();
		let sub = VPath::local(dir.path().join("sub"));
		vfs.mkdir(&sub).unwrap();
		vfs.write_bytes(&sub.join("inner.txt"), b"x").unwrap();

		let mut pane = seeded_pane(dir.path(), &vfs);
		pane.focus_name("b.txt", 20);
		pane.refresh(&vfs).unwrap();

		pane.chdir(&vfs, &store, sub.clone(), 20).unwrap();
		assert_eq!(pane.path, sub);

		// Going back restores focus to b.txt.
		pane.chdir(&vfs, &store, VPath::local(dir.path()), 20).unwrap();
		assert_eq!(pane.focused().unwrap().path.name(), "b.txt");

		// Recent directories tracked both ways.
		let recent = store.recent_directories().unwrap();
		assert_eq!(recent.len(), 2);
	}

	#[test]
	fn chdir_into_unreadable_target_keeps_position() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let store = StateStore::open_in_memory().unwrap();
		let mut pane = seeded_pane(dir.path(), &vfs);

		let missing = VPath::local(dir.path().join("missing"));
		assert!(pane.chdir(&vfs, &store, missing, 20).is_err());
		assert_eq!(pane.path, VPath::local(dir.path()));
		assert_eq!(pane.entries.len(), 3);
	}

	#[test]
	fn filter_glob_narrows_listing() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = seeded_pane(dir.path(), &vfs);

		pane.filter_glob = Some("a*".to_string());
		pane.refresh(&vfs).unwrap();
		assert_eq!(pane.entries.len(), 1);
		assert_eq!(pane.entries[0].path.name(), "a.txt");
	}

	#[test]
	fn record_round_trip() {
		let dir = tempfile::tempdir().unwrap();
		let vfs = vfs();
		let mut pane = seeded_pane(dir.path(), &vfs);
		pane.sort_mode = SortMode::Size;
		pane.sort_reverse = true;
		pane.filter_glob = Some("*.txt".to_string());

		let record = pane.to_record();
		let mut restored = Pane::new(PaneSide::Left, VPath::local("/"));
		restored.apply_record(&record);
		assert_eq!(restored.path, pane.path);
		assert_eq!(restored.sort_mode, SortMode::Size);
		assert!(restored.sort_reverse);
		assert_eq!(restored.filter_glob, Some("*.txt".to_string()));
	}
}
