//! The abstract renderer contract.
//!
//! A [`Renderer`] is a bounded cell surface plus an input event source.
//! Draw primitives mutate an internal buffer and are infallible: every
//! primitive silently clips against the surface, and out-of-bounds draws
//! are no-ops. Only [`refresh`](Renderer::refresh) (flush to the device)
//! and [`poll_event`](Renderer::poll_event) touch the outside world and
//! can fail.

use std::time::Duration;

use crate::color::{Attr, Rgb};
use crate::command::RenderCommand;
use crate::error::TtkError;
use crate::event::InputEvent;

/// The pluggable rendering surface.
///
/// Implementations exist for character-cell terminals and for recording
/// into memory; a bitmap backend implements the same contract in a
/// windowed build.
pub trait Renderer {
	/// Draws `text` starting at `(row, col)` with the given color pair and
	/// attributes. Clips at the right edge; a double-wide grapheme that
	/// would straddle the edge is dropped whole.
	fn draw_text(&mut self, row: u16, col: u16, text: &str, color_pair: u8, attrs: Attr);

	/// Draws `length` copies of `ch` horizontally from `(row, col)`.
	fn draw_hline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8);

	/// Draws `length` copies of `ch` vertically from `(row, col)`.
	fn draw_vline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8);

	/// Draws a rectangle. `filled` paints the interior with spaces;
	/// otherwise only the border is drawn.
	fn draw_rect(&mut self, row: u16, col: u16, height: u16, width: u16, color_pair: u8, filled: bool);

	/// Resets the whole surface to blank cells in pair 0.
	fn clear(&mut self);

	/// Resets a rectangular region, clipped to the surface.
	fn clear_region(&mut self, row: u16, col: u16, height: u16, width: u16);

	/// Flushes buffered draws to the device.
	fn refresh(&mut self) -> Result<(), TtkError>;

	/// Flushes only the given region to the device.
	fn refresh_region(&mut self, row: u16, col: u16, height: u16, width: u16) -> Result<(), TtkError>;

	/// Defines color pair `pair_id`. Pair 0 is the device default and
	/// cannot be redefined; such calls are ignored.
	fn init_color_pair(&mut self, pair_id: u8, fg: Rgb, bg: Rgb);

	/// Shows or hides the hardware cursor.
	fn set_cursor_visibility(&mut self, visible: bool);

	/// Moves the hardware cursor. Out-of-bounds positions clamp.
	fn move_cursor(&mut self, row: u16, col: u16);

	/// Current surface size as `(rows, cols)`.
	fn size(&self) -> (u16, u16);

	/// Waits up to `timeout` for the next input event.
	///
	/// This is the only blocking call in the UI loop. Returns `None` on
	/// timeout.
	fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>, TtkError>;

	/// Releases the device. Called exactly once before the process exits.
	fn shutdown(&mut self) -> Result<(), TtkError> {
		Ok(())
	}

	/// Replays one serialized command onto this renderer.
	///
	/// This is the bridge between the command stream and any backend:
	/// rendering the same stream onto two backends must produce the same
	/// surface contents.
	fn apply(&mut self, command: &RenderCommand) -> Result<(), TtkError> {
		match command {
			RenderCommand::DrawText {
				row,
				col,
				text,
				color_pair,
				attributes,
			} => self.draw_text(*row, *col, text, *color_pair, *attributes),
			RenderCommand::DrawHline {
				row,
				col,
				ch,
				length,
				color_pair,
			} => self.draw_hline(*row, *col, ch, *length, *color_pair),
			RenderCommand::DrawVline {
				row,
				col,
				ch,
				length,
				color_pair,
			} => self.draw_vline(*row, *col, ch, *length, *color_pair),
			RenderCommand::DrawRect {
				row,
				col,
				height,
				width,
				color_pair,
				filled,
			} => self.draw_rect(*row, *col, *height, *width, *color_pair, *filled),
			RenderCommand::Clear => self.clear(),
			RenderCommand::ClearRegion {
				row,
				col,
				height,
				width,
			} => self.clear_region(*row, *col, *height, *width),
			RenderCommand::Refresh => self.refresh()?,
			RenderCommand::RefreshRegion {
				row,
				col,
				height,
				width,
			} => self.refresh_region(*row, *col, *height, *width)?,
			RenderCommand::InitColorPair {
				pair_id,
				fg_color,
				bg_color,
			} => self.init_color_pair(*pair_id, *fg_color, *bg_color),
			RenderCommand::SetCursorVisibility { visible } => self.set_cursor_visibility(*visible),
			RenderCommand::MoveCursor { row, col } => self.move_cursor(*row, *col),
		}
		Ok(())
	}
}
