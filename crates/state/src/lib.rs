//! dyad-state: durable session state.
//!
//! One SQLite-backed key/value store holds everything dyad remembers
//! between runs: window layout, per-pane browsing state, bounded cursor
//! history, and recent directories. Writes are durable before they
//! return; unknown keys written by other versions are preserved.

pub mod error;
pub mod history;
pub mod store;

pub use error::StateError;
pub use history::{CursorHistoryEntry, PaneSide};
pub use store::{MAX_CURSOR_HISTORY_ENTRIES, MAX_RECENT_DIRECTORIES, PaneStateRecord, StateStore, WindowLayout};
