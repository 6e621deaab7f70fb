//! End-to-end operation scenarios driven through the task state machine.

use std::io::Cursor;
use std::sync::Arc;
use std::time::SystemTime;

use dyad_archive::{ArchiveCache, ArchiveWriter, CacheConfig};
use dyad_ops::{
	ConflictChoice, ConflictInfo, Executor, FileOperationTask, OperationKind, OperationSummary, TaskEvent, TaskState, TaskUi,
	progress_channel, spawn_operation,
};
use dyad_vpath::{ArchiveStorage, LocalStorage, MemoryStorage, Scheme, VPath, Vfs};
use pretty_assertions::assert_eq;

/// Records every callback; tests script answers through handle_event.
#[derive(Default)]
struct ScriptedUi {
	notices: Vec<String>,
	confirmations: usize,
	conflicts: Vec<ConflictInfo>,
	renames: Vec<ConflictInfo>,
	completed: Vec<OperationSummary>,
}

impl TaskUi for ScriptedUi {
	fn request_confirmation(&mut self, _kind: OperationKind, _sources: &[VPath], _dest: Option<&VPath>) {
		self.confirmations += 1;
	}

	fn request_conflict_choice(&mut self, conflict: &ConflictInfo) {
		self.conflicts.push(conflict.clone());
	}

	fn request_rename(&mut self, conflict: &ConflictInfo) {
		self.renames.push(conflict.clone());
	}

	fn notify(&mut self, message: &str) {
		self.notices.push(message.to_string());
	}

	fn operation_complete(&mut self, summary: &OperationSummary) {
		self.completed.push(*summary);
	}
}

fn local_vfs() -> Arc<Vfs> {
	let mut vfs = Vfs::new();
	vfs.register(Arc::new(LocalStorage::new()));
	vfs.register(Arc::new(ArchiveStorage::new(Arc::new(ArchiveCache::new(CacheConfig::default())))));
	Arc::new(vfs)
}

fn vfs_with_mock_s3() -> Arc<Vfs> {
	let mut vfs = Vfs::new();
	vfs.register(Arc::new(LocalStorage::new()));
	vfs.register(Arc::new(MemoryStorage::new(Scheme::S3)));
	Arc::new(vfs)
}

fn write(vfs: &Vfs, path: &VPath, data: &[u8]) {
	vfs.write_bytes(path, data).unwrap();
}

#[test]
fn copy_between_panes() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("a.txt"), b"AAA");
	write(&vfs, &src_dir.join("b.txt"), b"BBB");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	assert_eq!(task.state(), TaskState::Idle);

	task.start_operation(
		OperationKind::Copy,
		vec![src_dir.join("a.txt"), src_dir.join("b.txt")],
		Some(dst_dir.clone()),
		&mut ui,
	)
	.unwrap();
	assert_eq!(task.state(), TaskState::AwaitingConfirmation);
	assert_eq!(ui.confirmations, 1);

	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();
	assert_eq!(task.state(), TaskState::Idle);

	assert_eq!(
		ui.completed,
		vec![OperationSummary {
			succeeded: 2,
			errors: 0,
			skipped: 0,
			cancelled: false,
		}]
	);
	assert_eq!(vfs.read_bytes(&dst_dir.join("a.txt")).unwrap(), b"AAA");
	assert_eq!(vfs.read_bytes(&dst_dir.join("b.txt")).unwrap(), b"BBB");
}

#[test]
fn copy_conflict_overwrite_apply_to_all() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("x.txt"), b"NEW");
	write(&vfs, &src_dir.join("y.txt"), b"NEW");
	write(&vfs, &dst_dir.join("x.txt"), b"OLD");
	write(&vfs, &dst_dir.join("y.txt"), b"OLD");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(
		OperationKind::Copy,
		vec![src_dir.join("x.txt"), src_dir.join("y.txt")],
		Some(dst_dir.clone()),
		&mut ui,
	)
	.unwrap();
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();

	// First conflict: both are known up front.
	assert_eq!(task.state(), TaskState::AwaitingConflictChoice);
	assert_eq!(ui.conflicts.len(), 1);
	assert_eq!(ui.conflicts[0].index, 1);
	assert_eq!(ui.conflicts[0].known_total, 2);

	task.handle_event(
		TaskEvent::ConflictResolved(ConflictChoice::Overwrite { apply_to_all: true }),
		&mut ui,
	)
	.unwrap();

	// Apply-to-all: never asked again.
	assert_eq!(ui.conflicts.len(), 1);
	assert_eq!(task.state(), TaskState::Idle);
	assert_eq!(ui.completed[0].succeeded, 2);
	assert_eq!(vfs.read_bytes(&dst_dir.join("x.txt")).unwrap(), b"NEW");
	assert_eq!(vfs.read_bytes(&dst_dir.join("y.txt")).unwrap(), b"NEW");
}

#[test]
fn copy_conflict_skip_keeps_destination() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("x.txt"), b"NEW");
	write(&vfs, &dst_dir.join("x.txt"), b"OLD");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Copy, vec![src_dir.join("x.txt")], Some(dst_dir.clone()), &mut ui)
		.unwrap();
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();
	task.handle_event(TaskEvent::ConflictResolved(ConflictChoice::Skip { apply_to_all: false }), &mut ui)
		.unwrap();

	assert_eq!(
		ui.completed,
		vec![OperationSummary {
			succeeded: 0,
			errors: 0,
			skipped: 1,
			cancelled: false,
		}]
	);
	assert_eq!(vfs.read_bytes(&dst_dir.join("x.txt")).unwrap(), b"OLD");
}

#[test]
fn copy_conflict_rename_changes_leaf_only() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("x.txt"), b"NEW");
	write(&vfs, &dst_dir.join("x.txt"), b"OLD");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Copy, vec![src_dir.join("x.txt")], Some(dst_dir.clone()), &mut ui)
		.unwrap();
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();
	task.handle_event(TaskEvent::ConflictResolved(ConflictChoice::Rename), &mut ui).unwrap();
	assert_eq!(task.state(), TaskState::AwaitingRename);
	assert_eq!(ui.renames.len(), 1);

	task.handle_event(TaskEvent::RenameProvided("x-copy.txt".to_string()), &mut ui).unwrap();

	assert_eq!(ui.completed[0].succeeded, 1);
	assert_eq!(vfs.read_bytes(&dst_dir.join("x.txt")).unwrap(), b"OLD");
	assert_eq!(vfs.read_bytes(&dst_dir.join("x-copy.txt")).unwrap(), b"NEW");
}

#[test]
fn cross_storage_move_to_mock_s3() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = vfs_with_mock_s3();
	let note = VPath::local(dir.path().join("note.txt"));
	write(&vfs, &note, b"hi");
	let dest = VPath::parse("s3://bucket/dir").unwrap();
	vfs.mkdir(&dest).unwrap();

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Move, vec![note.clone()], Some(dest), &mut ui).unwrap();
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();

	assert_eq!(ui.completed[0].succeeded, 1);
	assert_eq!(
		vfs.read_bytes(&VPath::parse("s3://bucket/dir/note.txt").unwrap()).unwrap(),
		b"hi"
	);
	assert!(!vfs.exists(&note));
}

#[test]
fn archive_extraction() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let zip_path = dir.path().join("a.zip");
	let mut writer = ArchiveWriter::create(&zip_path).unwrap();
	writer
		.add_file("readme.txt", &mut Cursor::new(b"R".to_vec()), 1, SystemTime::now(), 0o644)
		.unwrap();
	writer
		.add_file("sub/inner.txt", &mut Cursor::new(b"I".to_vec()), 1, SystemTime::now(), 0o644)
		.unwrap();
	writer.finish().unwrap();

	let out_dir = VPath::local(dir.path().join("out"));
	vfs.mkdir(&out_dir).unwrap();

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(
		OperationKind::ArchiveExtract,
		vec![VPath::local(&zip_path)],
		Some(out_dir.clone()),
		&mut ui,
	)
	.unwrap();

	// Archive operations skip the confirmation dialog.
	assert_eq!(ui.confirmations, 0);
	assert_eq!(task.state(), TaskState::Idle);
	assert_eq!(vfs.read_bytes(&out_dir.join("readme.txt")).unwrap(), b"R");
	assert_eq!(vfs.read_bytes(&out_dir.join("sub").join("inner.txt")).unwrap(), b"I");
}

#[test]
fn archive_create_then_extract_round_trips() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("tree"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&src_dir.join("nested")).unwrap();
	write(&vfs, &src_dir.join("top.txt"), b"T");
	write(&vfs, &src_dir.join("nested").join("leaf.txt"), b"L");

	let archive = VPath::local(dir.path().join("tree.tar.gz"));
	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::ArchiveCreate, vec![src_dir.clone()], Some(archive.clone()), &mut ui)
		.unwrap();
	assert_eq!(task.state(), TaskState::Idle);
	assert_eq!(ui.completed[0].errors, 0);
	assert!(vfs.is_file(&archive));

	let out_dir = VPath::local(dir.path().join("out"));
	vfs.mkdir(&out_dir).unwrap();
	task.start_operation(OperationKind::ArchiveExtract, vec![archive], Some(out_dir.clone()), &mut ui)
		.unwrap();

	assert_eq!(vfs.read_bytes(&out_dir.join("tree").join("top.txt")).unwrap(), b"T");
	assert_eq!(
		vfs.read_bytes(&out_dir.join("tree").join("nested").join("leaf.txt")).unwrap(),
		b"L"
	);
}

#[test]
fn extract_with_legacy_overwrite_flag_never_prompts() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let zip_path = dir.path().join("a.zip");
	let mut writer = ArchiveWriter::create(&zip_path).unwrap();
	writer
		.add_file("readme.txt", &mut Cursor::new(b"NEW".to_vec()), 3, SystemTime::now(), 0o644)
		.unwrap();
	writer.finish().unwrap();

	let out_dir = VPath::local(dir.path().join("out"));
	vfs.mkdir(&out_dir).unwrap();
	write(&vfs, &out_dir.join("readme.txt"), b"OLD");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);

	// overwrite = false maps to skip-all.
	task.start_operation_with_overwrite(
		OperationKind::ArchiveExtract,
		vec![VPath::local(&zip_path)],
		Some(out_dir.clone()),
		Some(false),
		&mut ui,
	)
	.unwrap();
	assert!(ui.conflicts.is_empty());
	assert_eq!(ui.completed[0].skipped, 1);
	assert_eq!(vfs.read_bytes(&out_dir.join("readme.txt")).unwrap(), b"OLD");

	// overwrite = true maps to overwrite-all.
	task.start_operation_with_overwrite(
		OperationKind::ArchiveExtract,
		vec![VPath::local(&zip_path)],
		Some(out_dir.clone()),
		Some(true),
		&mut ui,
	)
	.unwrap();
	assert!(ui.conflicts.is_empty());
	assert_eq!(vfs.read_bytes(&out_dir.join("readme.txt")).unwrap(), b"NEW");
}

#[test]
fn validation_rejects_write_to_archive() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src = VPath::local(dir.path().join("x.txt"));
	write(&vfs, &src, b"x");

	let zip_path = dir.path().join("a.zip");
	let mut writer = ArchiveWriter::create(&zip_path).unwrap();
	writer
		.add_file("inside.txt", &mut Cursor::new(b"i".to_vec()), 1, SystemTime::now(), 0o644)
		.unwrap();
	writer.finish().unwrap();

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(
		OperationKind::Copy,
		vec![src],
		Some(VPath::archive_root(&zip_path)),
		&mut ui,
	)
	.unwrap();

	// Rejected in Validating: one dialog, no confirmation, no execution.
	assert_eq!(task.state(), TaskState::Idle);
	assert_eq!(ui.notices, vec!["Cannot copy files to read-only storage.".to_string()]);
	assert_eq!(ui.confirmations, 0);
	assert!(ui.completed.is_empty());
}

#[test]
fn delete_removes_tree_children_first() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let tree = VPath::local(dir.path().join("tree"));
	vfs.mkdir(&tree).unwrap();
	vfs.mkdir(&tree.join("nested")).unwrap();
	write(&vfs, &tree.join("a.txt"), b"a");
	write(&vfs, &tree.join("nested").join("b.txt"), b"b");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Delete, vec![tree.clone()], None, &mut ui).unwrap();
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();

	assert_eq!(ui.completed[0].succeeded, 4);
	assert_eq!(ui.completed[0].errors, 0);
	assert!(!vfs.exists(&tree));
}

#[test]
fn move_into_same_directory_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let here = VPath::local(dir.path());
	write(&vfs, &here.join("f.txt"), b"f");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Move, vec![here.join("f.txt")], Some(here.clone()), &mut ui)
		.unwrap();

	assert_eq!(task.state(), TaskState::Idle);
	assert_eq!(ui.notices, vec!["Cannot move files to the same directory.".to_string()]);
	assert!(vfs.exists(&here.join("f.txt")));
}

#[test]
fn cancellation_at_checkpoint_emits_cancelled_summary() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("a.txt"), b"A");

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Copy, vec![src_dir.join("a.txt")], Some(dst_dir), &mut ui)
		.unwrap();

	// Flag set before the first checkpoint: nothing is copied.
	task.cancel_flag().store(true, std::sync::atomic::Ordering::Relaxed);
	task.handle_event(TaskEvent::UserConfirmed, &mut ui).unwrap();

	assert_eq!(
		ui.completed,
		vec![OperationSummary {
			succeeded: 0,
			errors: 0,
			skipped: 0,
			cancelled: true,
		}]
	);
}

#[test]
fn second_operation_while_busy_is_rejected() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src = VPath::local(dir.path().join("a.txt"));
	write(&vfs, &src, b"A");
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&dst_dir).unwrap();

	let mut ui = ScriptedUi::default();
	let mut task = FileOperationTask::new(Executor::new(Arc::clone(&vfs)), None);
	task.start_operation(OperationKind::Copy, vec![src.clone()], Some(dst_dir.clone()), &mut ui)
		.unwrap();
	assert_eq!(task.state(), TaskState::AwaitingConfirmation);

	let result = task.start_operation(OperationKind::Copy, vec![src], Some(dst_dir), &mut ui);
	assert!(matches!(result, Err(dyad_ops::OpsError::Busy)));
}

#[test]
fn threaded_runner_round_trip() {
	let dir = tempfile::tempdir().unwrap();
	let vfs = local_vfs();
	let src_dir = VPath::local(dir.path().join("src"));
	let dst_dir = VPath::local(dir.path().join("dst"));
	vfs.mkdir(&src_dir).unwrap();
	vfs.mkdir(&dst_dir).unwrap();
	write(&vfs, &src_dir.join("a.txt"), b"AAA");

	let (progress_tx, progress_rx) = progress_channel();
	let handle = spawn_operation(
		Executor::new(Arc::clone(&vfs)),
		Some(progress_tx),
		OperationKind::Copy,
		vec![src_dir.join("a.txt")],
		Some(dst_dir.clone()),
	);

	use dyad_ops::TaskNotification;
	match handle.recv_notification() {
		Some(TaskNotification::ConfirmationNeeded { kind, sources, .. }) => {
			assert_eq!(kind, OperationKind::Copy);
			assert_eq!(sources.len(), 1);
		}
		other => panic!("expected confirmation request, got {other:?}"),
	}

	handle.send_event(TaskEvent::UserConfirmed);
	match handle.recv_notification() {
		Some(TaskNotification::Completed(summary)) => {
			assert_eq!(summary.succeeded, 1);
			assert!(!summary.cancelled);
		}
		other => panic!("expected completion, got {other:?}"),
	}
	handle.join();

	assert_eq!(vfs.read_bytes(&dst_dir.join("a.txt")).unwrap(), b"AAA");
	// The total entry count reached the sink before execution.
	let first = progress_rx.try_recv().unwrap();
	assert_eq!(first.total, 1);
	assert_eq!(first.processed, 0);
}
