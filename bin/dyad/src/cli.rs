use std::path::PathBuf;

use clap::Parser;
use dyad_ttk::BackendKind;

#[derive(Parser, Debug)]
#[command(name = "dyad")]
#[command(about = "A dual-pane terminal file manager")]
#[command(version)]
pub struct Cli {
	/// Renderer backend ("cells" is the terminal backend, "bitmap" the
	/// windowed one)
	#[arg(long, value_parser = parse_backend)]
	pub backend: Option<BackendKind>,

	/// Shorthand for --backend bitmap
	#[arg(long)]
	pub desktop: bool,

	/// Serve log lines to TCP clients on this port
	#[arg(long, value_name = "PORT")]
	pub remote_log_port: Option<u16>,

	/// Override the saved left pane directory
	#[arg(long, value_name = "PATH")]
	pub left: Option<PathBuf>,

	/// Override the saved right pane directory
	#[arg(long, value_name = "PATH")]
	pub right: Option<PathBuf>,

	/// Enable runtime profiling
	#[arg(long)]
	pub profile: bool,

	/// Color diagnostic mode
	#[arg(long, value_name = "MODE")]
	pub color_test: Option<String>,
}

fn parse_backend(s: &str) -> Result<BackendKind, String> {
	s.parse().map_err(|_| format!("unknown backend {s:?} (expected \"cells\" or \"bitmap\")"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_are_all_off() {
		let cli = Cli::parse_from(["dyad"]);
		assert!(cli.backend.is_none());
		assert!(!cli.desktop);
		assert!(cli.remote_log_port.is_none());
		assert!(cli.left.is_none() && cli.right.is_none());
	}

	#[test]
	fn backend_and_desktop_flags() {
		let cli = Cli::parse_from(["dyad", "--backend", "cells"]);
		assert_eq!(cli.backend, Some(BackendKind::Cells));

		let cli = Cli::parse_from(["dyad", "--desktop"]);
		assert!(cli.desktop);

		assert!(Cli::try_parse_from(["dyad", "--backend", "curses"]).is_err());
	}

	#[test]
	fn pane_overrides() {
		let cli = Cli::parse_from(["dyad", "--left", "/tmp/a", "--right", "/tmp/b", "--remote-log-port", "9999"]);
		assert_eq!(cli.left.unwrap(), PathBuf::from("/tmp/a"));
		assert_eq!(cli.right.unwrap(), PathBuf::from("/tmp/b"));
		assert_eq!(cli.remote_log_port, Some(9999));
	}
}
