//! Ordered per-pane cursor history.
//!
//! Each pane keeps a bounded sequence of `(directory, focused entry)`
//! records, newest at the tail. Re-visiting a directory moves its record
//! to the tail; order is authoritative, timestamps are advisory display
//! data. Legacy stores shaped as an unordered mapping are migrated to
//! the ordered form on first write.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::store::StateStore;

/// Which pane a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaneSide {
	Left,
	Right,
}

impl PaneSide {
	pub fn name(self) -> &'static str {
		match self {
			Self::Left => "left",
			Self::Right => "right",
		}
	}

	pub fn other(self) -> Self {
		match self {
			Self::Left => Self::Right,
			Self::Right => Self::Left,
		}
	}
}

impl std::fmt::Display for PaneSide {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.name())
	}
}

/// One remembered cursor position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorHistoryEntry {
	pub directory_path: String,
	pub focused_name: String,
	/// Unix seconds at save time; display only, order is authoritative.
	pub timestamp: f64,
}

fn history_key(side: PaneSide) -> String {
	format!("cursor_history.{side}")
}

fn now_seconds() -> f64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

impl StateStore {
	/// Loads a pane's history in insertion order, migrating a legacy
	/// mapping-shaped record if one is found.
	fn load_history(&self, side: PaneSide) -> Result<Vec<CursorHistoryEntry>> {
		match self.get(&history_key(side))? {
			None => Ok(Vec::new()),
			Some(Value::Array(items)) => Ok(items
				.into_iter()
				.filter_map(|item| serde_json::from_value(item).ok())
				.collect()),
			Some(Value::Object(mapping)) => {
				// Legacy shape: { dir_path: focused_name }. Order was
				// never recorded, so the migrated order is the mapping's
				// iteration order.
				tracing::info!(side = %side, entries = mapping.len(), "migrating legacy cursor history");
				Ok(mapping
					.into_iter()
					.filter_map(|(dir, name)| {
						name.as_str().map(|n| CursorHistoryEntry {
							directory_path: dir,
							focused_name: n.to_string(),
							timestamp: 0.0,
						})
					})
					.collect())
			}
			Some(_) => Ok(Vec::new()),
		}
	}

	/// Records the focused entry for `dir_path`, inserting or moving the
	/// record to the tail and evicting the oldest past the cap. The
	/// write is durable before return.
	pub fn save_pane_cursor_position(&self, side: PaneSide, dir_path: &str, focused_name: &str) -> Result<()> {
		let mut history = self.load_history(side)?;
		history.retain(|entry| entry.directory_path != dir_path);
		history.push(CursorHistoryEntry {
			directory_path: dir_path.to_string(),
			focused_name: focused_name.to_string(),
			timestamp: now_seconds(),
		});
		let cap = self.history_cap();
		while history.len() > cap {
			history.remove(0);
		}
		self.put_as(&history_key(side), &history)
	}

	/// The focused entry last saved for `dir_path`, if still in history.
	pub fn load_pane_cursor_position(&self, side: PaneSide, dir_path: &str) -> Result<Option<String>> {
		Ok(self
			.load_history(side)?
			.into_iter()
			.rev()
			.find(|entry| entry.directory_path == dir_path)
			.map(|entry| entry.focused_name))
	}

	/// Full history for one pane, oldest first.
	pub fn get_ordered_pane_history(&self, side: PaneSide) -> Result<Vec<CursorHistoryEntry>> {
		self.load_history(side)
	}

	pub fn clear_pane_history(&self, side: PaneSide) -> Result<()> {
		self.remove(&history_key(side))
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn save_then_load_round_trips() {
		let store = StateStore::open_in_memory().unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/a", "a.txt").unwrap();
		assert_eq!(
			store.load_pane_cursor_position(PaneSide::Left, "/a").unwrap(),
			Some("a.txt".to_string())
		);
		assert_eq!(store.load_pane_cursor_position(PaneSide::Left, "/b").unwrap(), None);
	}

	#[test]
	fn revisit_moves_to_tail_and_updates() {
		let store = StateStore::open_in_memory().unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/a", "a.txt").unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/b", "b.txt").unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/a", "a2.txt").unwrap();

		let history = store.get_ordered_pane_history(PaneSide::Left).unwrap();
		let pairs: Vec<_> = history
			.iter()
			.map(|e| (e.directory_path.as_str(), e.focused_name.as_str()))
			.collect();
		assert_eq!(pairs, vec![("/b", "b.txt"), ("/a", "a2.txt")]);
		assert_eq!(
			store.load_pane_cursor_position(PaneSide::Left, "/a").unwrap(),
			Some("a2.txt".to_string())
		);
	}

	#[test]
	fn history_is_bounded_with_oldest_evicted() {
		let store = StateStore::open_in_memory().unwrap().with_history_cap(5);
		for i in 0..8 {
			store
				.save_pane_cursor_position(PaneSide::Left, &format!("/d{i}"), &format!("f{i}"))
				.unwrap();
		}
		let history = store.get_ordered_pane_history(PaneSide::Left).unwrap();
		assert_eq!(history.len(), 5);
		assert_eq!(history[0].directory_path, "/d3");
		assert_eq!(history[4].directory_path, "/d7");
		assert_eq!(store.load_pane_cursor_position(PaneSide::Left, "/d0").unwrap(), None);
	}

	#[test]
	fn sides_are_isolated() {
		let store = StateStore::open_in_memory().unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/a", "left.txt").unwrap();
		store.save_pane_cursor_position(PaneSide::Right, "/a", "right.txt").unwrap();

		assert_eq!(
			store.load_pane_cursor_position(PaneSide::Left, "/a").unwrap(),
			Some("left.txt".to_string())
		);
		assert_eq!(
			store.load_pane_cursor_position(PaneSide::Right, "/a").unwrap(),
			Some("right.txt".to_string())
		);
		assert_eq!(store.get_ordered_pane_history(PaneSide::Right).unwrap().len(), 1);
	}

	#[test]
	fn each_directory_appears_once() {
		let store = StateStore::open_in_memory().unwrap();
		for _ in 0..3 {
			store.save_pane_cursor_position(PaneSide::Left, "/same", "f.txt").unwrap();
		}
		assert_eq!(store.get_ordered_pane_history(PaneSide::Left).unwrap().len(), 1);
	}

	#[test]
	fn legacy_mapping_migrates_on_first_write() {
		let store = StateStore::open_in_memory().unwrap();
		store
			.put("cursor_history.left", &json!({"/old": "old.txt", "/older": "older.txt"}))
			.unwrap();

		// Readable before any write.
		assert_eq!(
			store.load_pane_cursor_position(PaneSide::Left, "/old").unwrap(),
			Some("old.txt".to_string())
		);

		// First write rewrites the record in ordered form.
		store.save_pane_cursor_position(PaneSide::Left, "/new", "new.txt").unwrap();
		let raw = store.get("cursor_history.left").unwrap().unwrap();
		assert!(raw.is_array());

		let history = store.get_ordered_pane_history(PaneSide::Left).unwrap();
		assert_eq!(history.len(), 3);
		assert_eq!(history.last().unwrap().directory_path, "/new");
	}

	#[test]
	fn clear_pane_history_drops_only_that_side() {
		let store = StateStore::open_in_memory().unwrap();
		store.save_pane_cursor_position(PaneSide::Left, "/a", "a").unwrap();
		store.save_pane_cursor_position(PaneSide::Right, "/b", "b").unwrap();

		store.clear_pane_history(PaneSide::Left).unwrap();
		assert!(store.get_ordered_pane_history(PaneSide::Left).unwrap().is_empty());
		assert_eq!(store.get_ordered_pane_history(PaneSide::Right).unwrap().len(), 1);
	}
}
