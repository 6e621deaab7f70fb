//! Pure list management: sorting, filtering, selection.
//!
//! Everything here is a function of its inputs. No I/O, no UI, no
//! clocks. The pane controller feeds in entries with metadata and
//! renders what comes back.

use std::collections::HashSet;

use dyad_vpath::{EntryMetadata, VPath};
use globset::Glob;

/// One listed entry: the path plus the metadata it was listed with.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
	pub path: VPath,
	pub meta: EntryMetadata,
}

/// Pane sort orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
	#[default]
	Name,
	Size,
	Date,
	Ext,
	Type,
}

impl SortMode {
	pub fn name(self) -> &'static str {
		match self {
			Self::Name => "name",
			Self::Size => "size",
			Self::Date => "date",
			Self::Ext => "ext",
			Self::Type => "type",
		}
	}

	pub fn parse(s: &str) -> Option<Self> {
		match s {
			"name" => Some(Self::Name),
			"size" => Some(Self::Size),
			"date" => Some(Self::Date),
			"ext" => Some(Self::Ext),
			"type" => Some(Self::Type),
			_ => None,
		}
	}
}

/// Sorts entries in place: directories always group before files, then
/// the mode's key applies within each group. `reverse` flips the key
/// order but never the directories-first grouping.
pub fn sort_entries(entries: &mut [EntryRecord], mode: SortMode, reverse: bool) {
	entries.sort_by(|a, b| {
		let dir_order = b.meta.is_dir().cmp(&a.meta.is_dir());
		if dir_order != std::cmp::Ordering::Equal {
			return dir_order;
		}
		let key_order = match mode {
			SortMode::Name => compare_names(&a.path.name(), &b.path.name()),
			SortMode::Size => a.meta.size.cmp(&b.meta.size).then_with(|| compare_names(&a.path.name(), &b.path.name())),
			SortMode::Date => a
				.meta
				.mtime
				.cmp(&b.meta.mtime)
				.then_with(|| compare_names(&a.path.name(), &b.path.name())),
			SortMode::Ext => a
				.path
				.suffix()
				.to_ascii_lowercase()
				.cmp(&b.path.suffix().to_ascii_lowercase())
				.then_with(|| compare_names(&a.path.name(), &b.path.name())),
			SortMode::Type => kind_rank(a).cmp(&kind_rank(b)).then_with(|| compare_names(&a.path.name(), &b.path.name())),
		};
		if reverse { key_order.reverse() } else { key_order }
	});
}

fn kind_rank(entry: &EntryRecord) -> u8 {
	use dyad_vpath::EntryKind;
	match entry.meta.kind {
		EntryKind::Dir => 0,
		EntryKind::File => 1,
		EntryKind::Symlink => 2,
	}
}

/// Case-insensitive name ordering with a stable case-sensitive tiebreak.
fn compare_names(a: &str, b: &str) -> std::cmp::Ordering {
	a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

/// Applies a glob filter to entry names. An invalid or empty pattern
/// filters nothing.
pub fn filter_entries(entries: Vec<EntryRecord>, filter_glob: Option<&str>) -> Vec<EntryRecord> {
	let Some(pattern) = filter_glob.filter(|p| !p.is_empty()) else {
		return entries;
	};
	let Ok(glob) = Glob::new(pattern) else {
		tracing::warn!(pattern, "ignoring invalid filter glob");
		return entries;
	};
	let matcher = glob.compile_matcher();
	entries.into_iter().filter(|entry| matcher.is_match(entry.path.name())).collect()
}

/// Toggles one path's membership in the selection set. Keys are
/// canonical path strings so the selection survives listing rebuilds.
pub fn toggle_selection(selected: &mut HashSet<String>, path: &VPath) {
	let key = path.to_string();
	if !selected.remove(&key) {
		selected.insert(key);
	}
}

/// Drops selection keys that no longer appear in the listing.
pub fn prune_selection(selected: &mut HashSet<String>, entries: &[EntryRecord]) {
	let live: HashSet<String> = entries.iter().map(|e| e.path.to_string()).collect();
	selected.retain(|key| live.contains(key));
}
