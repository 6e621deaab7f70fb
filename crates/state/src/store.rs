//! The durable key/value store.
//!
//! A single SQLite table of string keys and JSON values. Every `put` is
//! one synchronous transaction: after it returns, the write survives a
//! crash. Readers tolerate unknown keys by construction: rows nobody
//! recognizes are simply never read, and read-modify-write cycles touch
//! only their own keys.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{Result, StateError};

/// Default bound for per-pane cursor history.
pub const MAX_CURSOR_HISTORY_ENTRIES: usize = 100;

/// Default bound for the recent-directories list.
pub const MAX_RECENT_DIRECTORIES: usize = 50;

/// Durable session state, shared process-wide behind a mutex.
pub struct StateStore {
	conn: Mutex<Connection>,
	history_cap: usize,
	recent_cap: usize,
}

impl StateStore {
	/// Opens (creating if missing) the store at `path`.
	pub fn open(path: &Path) -> Result<Self> {
		let conn = Connection::open(path)?;
		Self::init(conn)
	}

	/// A store that lives and dies with the process. Tests mostly use
	/// this.
	pub fn open_in_memory() -> Result<Self> {
		Self::init(Connection::open_in_memory()?)
	}

	fn init(conn: Connection) -> Result<Self> {
		conn.pragma_update(None, "journal_mode", "WAL")?;
		conn.pragma_update(None, "synchronous", "FULL")?;
		conn.execute(
			"CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
			[],
		)?;
		Ok(Self {
			conn: Mutex::new(conn),
			history_cap: MAX_CURSOR_HISTORY_ENTRIES,
			recent_cap: MAX_RECENT_DIRECTORIES,
		})
	}

	/// Overrides the cursor-history bound (testing and configuration).
	pub fn with_history_cap(mut self, cap: usize) -> Self {
		self.history_cap = cap.max(1);
		self
	}

	/// Overrides the recent-directories bound.
	pub fn with_recent_cap(mut self, cap: usize) -> Self {
		self.recent_cap = cap.max(1);
		self
	}

	pub(crate) fn history_cap(&self) -> usize {
		self.history_cap
	}

	/// Raw read of one key.
	pub fn get(&self, key: &str) -> Result<Option<Value>> {
		let conn = self.conn.lock();
		let text: Option<String> = conn
			.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
			.optional()?;
		match text {
			Some(text) => Ok(Some(serde_json::from_str(&text).map_err(|e| StateError::Corrupt {
				key: key.to_string(),
				detail: e.to_string(),
			})?)),
			None => Ok(None),
		}
	}

	/// Raw durable write of one key.
	pub fn put(&self, key: &str, value: &Value) -> Result<()> {
		let text = serde_json::to_string(value).map_err(|e| StateError::Corrupt {
			key: key.to_string(),
			detail: e.to_string(),
		})?;
		let conn = self.conn.lock();
		conn.execute(
			"INSERT INTO kv (key, value) VALUES (?1, ?2)
			 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
			params![key, text],
		)?;
		tracing::trace!(key, "state committed");
		Ok(())
	}

	pub fn remove(&self, key: &str) -> Result<()> {
		let conn = self.conn.lock();
		conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
		Ok(())
	}

	/// Typed read.
	pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
		match self.get(key)? {
			Some(value) => Ok(Some(serde_json::from_value(value).map_err(|e| StateError::Corrupt {
				key: key.to_string(),
				detail: e.to_string(),
			})?)),
			None => Ok(None),
		}
	}

	/// Typed write.
	pub fn put_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
		let value = serde_json::to_value(value).map_err(|e| StateError::Corrupt {
			key: key.to_string(),
			detail: e.to_string(),
		})?;
		self.put(key, &value)
	}

	/// Appends `dir` to the bounded recent-directories list, moving an
	/// existing entry to the tail.
	pub fn push_recent_directory(&self, dir: &str) -> Result<()> {
		let mut recent: Vec<String> = self.get_as("recent_directories")?.unwrap_or_default();
		recent.retain(|d| d != dir);
		recent.push(dir.to_string());
		while recent.len() > self.recent_cap {
			recent.remove(0);
		}
		self.put_as("recent_directories", &recent)
	}

	pub fn recent_directories(&self) -> Result<Vec<String>> {
		Ok(self.get_as("recent_directories")?.unwrap_or_default())
	}
}

/// Saved window geometry ratios.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WindowLayout {
	pub left_pane_ratio: f32,
	pub log_height_ratio: f32,
}

impl Default for WindowLayout {
	fn default() -> Self {
		Self {
			left_pane_ratio: 0.5,
			log_height_ratio: 0.25,
		}
	}
}

/// Saved per-pane browsing state.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct PaneStateRecord {
	pub path: String,
	pub sort_mode: String,
	pub sort_reverse: bool,
	pub filter_glob: Option<String>,
}

impl StateStore {
	pub fn window_layout(&self) -> Result<WindowLayout> {
		Ok(self.get_as("window_layout")?.unwrap_or_default())
	}

	pub fn save_window_layout(&self, layout: &WindowLayout) -> Result<()> {
		self.put_as("window_layout", layout)
	}

	pub fn pane_state(&self, side: crate::history::PaneSide) -> Result<Option<PaneStateRecord>> {
		self.get_as(&format!("pane_state.{side}"))
	}

	pub fn save_pane_state(&self, side: crate::history::PaneSide, record: &PaneStateRecord) -> Result<()> {
		self.put_as(&format!("pane_state.{side}"), record)
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn raw_round_trip() {
		let store = StateStore::open_in_memory().unwrap();
		assert_eq!(store.get("missing").unwrap(), None);

		store.put("k", &json!({"a": 1})).unwrap();
		assert_eq!(store.get("k").unwrap(), Some(json!({"a": 1})));

		store.put("k", &json!([1, 2])).unwrap();
		assert_eq!(store.get("k").unwrap(), Some(json!([1, 2])));
	}

	#[test]
	fn survives_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let db = dir.path().join("state.db");
		{
			let store = StateStore::open(&db).unwrap();
			store.put_as("window_layout", &WindowLayout::default()).unwrap();
		}
		let store = StateStore::open(&db).unwrap();
		assert_eq!(store.window_layout().unwrap(), WindowLayout::default());
	}

	#[test]
	fn unknown_keys_survive_other_writes() {
		let store = StateStore::open_in_memory().unwrap();
		store.put("future.key", &json!({"v": 2})).unwrap();
		store.save_window_layout(&WindowLayout::default()).unwrap();
		assert_eq!(store.get("future.key").unwrap(), Some(json!({"v": 2})));
	}

	#[test]
	fn recent_directories_are_bounded_and_move_to_tail() {
		let store = StateStore::open_in_memory().unwrap().with_recent_cap(3);
		for dir in ["/a", "/b", "/c", "/a", "/d"] {
			store.push_recent_directory(dir).unwrap();
		}
		// /a moved to tail before /d pushed /b out.
		assert_eq!(store.recent_directories().unwrap(), vec!["/c", "/a", "/d"]);
	}

	#[test]
	fn pane_state_is_per_side() {
		use crate::history::PaneSide;

		let store = StateStore::open_in_memory().unwrap();
		let left = PaneStateRecord {
			path: "/left".to_string(),
			sort_mode: "name".to_string(),
			sort_reverse: false,
			filter_glob: None,
		};
		store.save_pane_state(PaneSide::Left, &left).unwrap();
		assert_eq!(store.pane_state(PaneSide::Left).unwrap(), Some(left));
		assert_eq!(store.pane_state(PaneSide::Right).unwrap(), None);
	}
}
