//! Application-level tests over the recording renderer.

use std::sync::Arc;

use dyad_archive::{ArchiveCache, CacheConfig};
use dyad_state::{PaneSide, PaneStateRecord, StateStore};
use dyad_ttk::{InputEvent, RecordingRenderer};
use dyad_vpath::{ArchiveStorage, LocalStorage, VPath, Vfs};
use pretty_assertions::assert_eq;

use crate::app::{App, AppOutcome};

fn test_vfs() -> Arc<Vfs> {
	let mut vfs = Vfs::new();
	vfs.register(Arc::new(LocalStorage::new()));
	vfs.register(Arc::new(ArchiveStorage::new(Arc::new(ArchiveCache::new(CacheConfig::default())))));
	Arc::new(vfs)
}

fn renderer_with_events(events: &[InputEvent]) -> Box<RecordingRenderer> {
	let mut renderer = RecordingRenderer::new(24, 80);
	for event in events {
		renderer.push_event(*event);
	}
	Box::new(renderer)
}

#[test]
fn quit_persists_pane_state() {
	let dir = tempfile::tempdir().unwrap();
	let db = dir.path().join("state.db");
	let left_dir = dir.path().join("left");
	let right_dir = dir.path().join("right");
	std::fs::create_dir_all(&left_dir).unwrap();
	std::fs::create_dir_all(&right_dir).unwrap();
	std::fs::write(left_dir.join("a.txt"), "a").unwrap();

	{
		let store = StateStore::open(&db).unwrap();
		let renderer = renderer_with_events(&[InputEvent::char('q')]);
		let mut app = App::new(
			test_vfs(),
			store,
			renderer,
			VPath::local(&left_dir),
			VPath::local(&right_dir),
		);
		app.startup([true, true]);
		assert_eq!(app.run().unwrap(), AppOutcome::Normal);
	}

	let store = StateStore::open(&db).unwrap();
	let saved = store.pane_state(PaneSide::Left).unwrap().unwrap();
	assert_eq!(saved.path, left_dir.display().to_string());
	// The cursor for the left directory was remembered on quit.
	assert_eq!(
		store.load_pane_cursor_position(PaneSide::Left, &left_dir.display().to_string()).unwrap(),
		Some("a.txt".to_string())
	);
}

#[test]
fn ctrl_c_reports_interrupt() {
	let dir = tempfile::tempdir().unwrap();
	let store = StateStore::open_in_memory().unwrap();
	let renderer = renderer_with_events(&[InputEvent::Key {
		code: dyad_ttk::KeyCode::Character,
		modifiers: dyad_ttk::Modifiers::CONTROL,
		ch: Some('c'),
	}]);
	let mut app = App::new(
		test_vfs(),
		store,
		renderer,
		VPath::local(dir.path()),
		VPath::local(dir.path()),
	);
	app.startup([true, true]);
	assert_eq!(app.run().unwrap(), AppOutcome::Interrupted);
}

#[test]
fn startup_prefers_saved_state_unless_overridden() {
	let dir = tempfile::tempdir().unwrap();
	let saved_dir = dir.path().join("saved");
	let cli_dir = dir.path().join("cli");
	std::fs::create_dir_all(&saved_dir).unwrap();
	std::fs::create_dir_all(&cli_dir).unwrap();

	let store = StateStore::open_in_memory().unwrap();
	store
		.save_pane_state(
			PaneSide::Left,
			&PaneStateRecord {
				path: saved_dir.display().to_string(),
				sort_mode: "size".to_string(),
				sort_reverse: true,
				filter_glob: None,
			},
		)
		.unwrap();

	let renderer = Box::new(RecordingRenderer::new(24, 80));
	let mut app = App::new(test_vfs(), store, renderer, VPath::local(&cli_dir), VPath::local(&cli_dir));

	// Left restores the saved record, right keeps the CLI override.
	app.startup([true, false]);
	assert_eq!(app.left_pane().path, VPath::local(&saved_dir));
	assert!(app.left_pane().sort_reverse);
	assert_eq!(app.right_pane().path, VPath::local(&cli_dir));
}

#[test]
fn unreadable_saved_path_falls_back_to_root() {
	let dir = tempfile::tempdir().unwrap();
	let store = StateStore::open_in_memory().unwrap();
	store
		.save_pane_state(
			PaneSide::Left,
			&PaneStateRecord {
				path: "/definitely/not/here".to_string(),
				sort_mode: "name".to_string(),
				sort_reverse: false,
				filter_glob: None,
			},
		)
		.unwrap();

	let renderer = Box::new(RecordingRenderer::new(24, 80));
	let mut app = App::new(test_vfs(), store, renderer, VPath::local(dir.path()), VPath::local(dir.path()));
	app.startup([true, true]);
	assert_eq!(app.left_pane().path, VPath::local("/"));
}
