mod app;
mod cli;
mod logging;
mod pane;
#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use app::{App, AppOutcome};
use clap::Parser;
use cli::Cli;
use dyad_archive::{ArchiveCache, CacheConfig};
use dyad_state::StateStore;
use dyad_ttk::{init_renderer, select_backend};
use dyad_vpath::{VPath, Vfs};

/// Exit code for a SIGINT-equivalent interrupt.
const EXIT_INTERRUPTED: u8 = 130;

fn main() -> ExitCode {
	let cli = Cli::parse();

	if let Err(err) = logging::init(cli.remote_log_port) {
		eprintln!("dyad: failed to initialize logging: {err}");
		return ExitCode::FAILURE;
	}
	if cli.profile {
		tracing::warn!("profiling requested but not built into this binary");
	}
	if let Some(mode) = &cli.color_test {
		tracing::warn!(mode, "color test modes are not built into this binary");
	}

	match run(cli) {
		Ok(AppOutcome::Normal) => ExitCode::SUCCESS,
		Ok(AppOutcome::Interrupted) => ExitCode::from(EXIT_INTERRUPTED),
		Err(err) => {
			tracing::error!(error = %err, "fatal error");
			eprintln!("dyad: {err:#}");
			ExitCode::FAILURE
		}
	}
}

fn run(cli: Cli) -> anyhow::Result<AppOutcome> {
	let archive_cache = Arc::new(ArchiveCache::new(CacheConfig::default()));
	let vfs = Arc::new(Vfs::with_defaults(Arc::clone(&archive_cache))?);
	let store = StateStore::open(&state_db_path()?)?;

	let backend = select_backend(cli.backend, cli.desktop);
	tracing::info!(backend = backend.name(), "starting");
	let renderer = init_renderer(backend)?;

	let left_override = cli.left.clone();
	let right_override = cli.right.clone();
	let left = starting_path(cli.left);
	let right = starting_path(cli.right);

	let mut app = App::new(vfs, store, renderer, left, right);
	app.startup([left_override.is_none(), right_override.is_none()]);
	let outcome = app.run()?;
	app.shutdown()?;
	Ok(outcome)
}

/// CLI override, else the current directory.
fn starting_path(override_path: Option<PathBuf>) -> VPath {
	match override_path {
		Some(path) => VPath::local(path),
		None => VPath::local(std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))),
	}
}

/// The state database lives next to the rest of the user's dyad data.
fn state_db_path() -> anyhow::Result<PathBuf> {
	let base = std::env::var_os("XDG_STATE_HOME")
		.map(PathBuf::from)
		.or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
		.ok_or_else(|| anyhow::anyhow!("cannot determine state directory (no HOME)"))?;
	let dir = base.join("dyad");
	std::fs::create_dir_all(&dir)?;
	Ok(dir.join("state.db"))
}
