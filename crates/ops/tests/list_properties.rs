//! Property tests for list management.

use std::collections::HashSet;
use std::time::{Duration, UNIX_EPOCH};

use dyad_ops::{EntryRecord, SortMode, filter_entries, prune_selection, sort_entries};
use dyad_vpath::{EntryKind, EntryMetadata, VPath};
use proptest::prelude::*;

fn arb_entry() -> impl Strategy<Value = EntryRecord> {
	(
		proptest::string::string_regex("[a-zA-Z0-9][a-zA-Z0-9._\\-]{0,10}").unwrap(),
		prop_oneof![Just(EntryKind::File), Just(EntryKind::Dir), Just(EntryKind::Symlink)],
		any::<u32>(),
		0u64..4_000_000_000,
	)
		.prop_map(|(name, kind, size, mtime_secs)| EntryRecord {
			path: VPath::local(format!("/t/{name}")),
			meta: EntryMetadata {
				size: u64::from(size),
				mtime: UNIX_EPOCH + Duration::from_secs(mtime_secs),
				mode_bits: 0o644,
				kind,
			},
		})
}

fn arb_mode() -> impl Strategy<Value = SortMode> {
	prop_oneof![
		Just(SortMode::Name),
		Just(SortMode::Size),
		Just(SortMode::Date),
		Just(SortMode::Ext),
		Just(SortMode::Type),
	]
}

proptest! {
	/// Directories group before files under every mode and direction,
	/// and sorting never adds or drops entries.
	#[test]
	fn directories_first_is_stable(mut entries in proptest::collection::vec(arb_entry(), 0..40), mode in arb_mode(), reverse in any::<bool>()) {
		let before = entries.len();
		sort_entries(&mut entries, mode, reverse);
		prop_assert_eq!(entries.len(), before);

		let first_file = entries.iter().position(|e| !e.meta.is_dir());
		if let Some(boundary) = first_file {
			prop_assert!(entries[boundary..].iter().all(|e| !e.meta.is_dir()));
		}
	}

	/// A pruned selection is always a subset of the listing.
	#[test]
	fn pruned_selection_is_subset(entries in proptest::collection::vec(arb_entry(), 0..30), extra in proptest::collection::vec("[a-z]{1,8}", 0..10)) {
		let mut selected: HashSet<String> = entries.iter().step_by(2).map(|e| e.path.to_string()).collect();
		for name in extra {
			selected.insert(format!("/gone/{name}"));
		}
		prune_selection(&mut selected, &entries);

		let live: HashSet<String> = entries.iter().map(|e| e.path.to_string()).collect();
		prop_assert!(selected.is_subset(&live));
	}

	/// Every survivor of a glob filter actually matches the glob.
	#[test]
	fn filtered_entries_match_glob(entries in proptest::collection::vec(arb_entry(), 0..30)) {
		let filtered = filter_entries(entries, Some("*.txt"));
		prop_assert!(filtered.iter().all(|e| e.path.name().ends_with(".txt")));
	}
}
