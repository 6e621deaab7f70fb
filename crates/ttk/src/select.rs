//! Backend selection and the once-per-process renderer guard.
//!
//! Selection order: an explicit preference wins; the "desktop" shorthand
//! maps to the bitmap backend when the build carries one; otherwise the
//! cells backend. The bitmap backend lives in a separate windowed build,
//! so in this crate `desktop` falls back to cells with a warning.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::cells::CellsRenderer;
use crate::error::TtkError;
use crate::renderer::Renderer;

/// The selectable backend families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
	/// Character-cell terminal backend.
	Cells,
	/// Windowed bitmap backend.
	Bitmap,
}

impl BackendKind {
	pub fn name(self) -> &'static str {
		match self {
			Self::Cells => "cells",
			Self::Bitmap => "bitmap",
		}
	}
}

impl std::str::FromStr for BackendKind {
	type Err = TtkError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"cells" => Ok(Self::Cells),
			"bitmap" => Ok(Self::Bitmap),
			other => Err(TtkError::BackendUnavailable(other.to_string())),
		}
	}
}

/// Whether a bitmap backend is compiled into this build.
pub fn bitmap_available() -> bool {
	false
}

/// Resolves the backend to use from an explicit preference and the
/// `--desktop` shorthand.
pub fn select_backend(explicit: Option<BackendKind>, desktop: bool) -> BackendKind {
	if let Some(kind) = explicit {
		return kind;
	}
	if desktop {
		if bitmap_available() {
			return BackendKind::Bitmap;
		}
		tracing::warn!("desktop backend requested but not built in, falling back to cells");
	}
	BackendKind::Cells
}

static RENDERER_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the chosen backend.
///
/// A process gets exactly one renderer: a second call fails with
/// [`TtkError::AlreadyInitialized`]. The caller owns shutdown via
/// [`Renderer::shutdown`].
pub fn init_renderer(kind: BackendKind) -> Result<Box<dyn Renderer>, TtkError> {
	if RENDERER_INITIALIZED.swap(true, Ordering::SeqCst) {
		return Err(TtkError::AlreadyInitialized);
	}
	match kind {
		BackendKind::Cells => {
			let renderer = CellsRenderer::new().inspect_err(|_| {
				RENDERER_INITIALIZED.store(false, Ordering::SeqCst);
			})?;
			Ok(Box::new(renderer))
		}
		BackendKind::Bitmap => {
			RENDERER_INITIALIZED.store(false, Ordering::SeqCst);
			Err(TtkError::BackendUnavailable("bitmap".to_string()))
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn explicit_preference_wins() {
		assert_eq!(select_backend(Some(BackendKind::Bitmap), false), BackendKind::Bitmap);
		assert_eq!(select_backend(Some(BackendKind::Cells), true), BackendKind::Cells);
	}

	#[test]
	fn desktop_without_bitmap_falls_back_to_cells() {
		assert_eq!(select_backend(None, true), BackendKind::Cells);
	}

	#[test]
	fn default_is_cells() {
		assert_eq!(select_backend(None, false), BackendKind::Cells);
	}

	#[test]
	fn backend_names_parse() {
		assert_eq!("cells".parse::<BackendKind>().unwrap(), BackendKind::Cells);
		assert_eq!("bitmap".parse::<BackendKind>().unwrap(), BackendKind::Bitmap);
		assert!("curses".parse::<BackendKind>().is_err());
	}
}
