//! In-memory recording surface.
//!
//! [`RecordingRenderer`] renders into a [`Surface`] while appending every
//! call to a command log. Tests drive widgets against it and assert on
//! either the resulting grid or the recorded stream; replaying the stream
//! onto a second instance must reproduce the same grid.

use std::collections::VecDeque;
use std::time::Duration;

use crate::cell::Surface;
use crate::color::{Attr, Palette, Rgb};
use crate::command::RenderCommand;
use crate::error::TtkError;
use crate::event::InputEvent;
use crate::renderer::Renderer;

/// A renderer that draws into memory and records its command stream.
#[derive(Debug)]
pub struct RecordingRenderer {
	surface: Surface,
	palette: Palette,
	commands: Vec<RenderCommand>,
	events: VecDeque<InputEvent>,
	cursor: (u16, u16),
	cursor_visible: bool,
	refreshes: usize,
}

impl RecordingRenderer {
	pub fn new(rows: u16, cols: u16) -> Self {
		Self {
			surface: Surface::new(rows, cols),
			palette: Palette::new(),
			commands: Vec::new(),
			events: VecDeque::new(),
			cursor: (0, 0),
			cursor_visible: true,
			refreshes: 0,
		}
	}

	/// The rendered grid.
	pub fn surface(&self) -> &Surface {
		&self.surface
	}

	/// The color pair table as defined so far.
	pub fn palette(&self) -> &Palette {
		&self.palette
	}

	/// Every command recorded since construction or the last [`Self::take_commands`].
	pub fn commands(&self) -> &[RenderCommand] {
		&self.commands
	}

	/// Drains the recorded command log.
	pub fn take_commands(&mut self) -> Vec<RenderCommand> {
		std::mem::take(&mut self.commands)
	}

	/// Queues an event for the next [`Renderer::poll_event`] call.
	pub fn push_event(&mut self, event: InputEvent) {
		self.events.push_back(event);
	}

	/// Number of `refresh`/`refresh_region` calls seen.
	pub fn refresh_count(&self) -> usize {
		self.refreshes
	}

	pub fn cursor(&self) -> (u16, u16) {
		self.cursor
	}

	pub fn cursor_visible(&self) -> bool {
		self.cursor_visible
	}

	/// Simulates a device resize, resetting the grid and queueing the
	/// matching input event.
	pub fn resize(&mut self, rows: u16, cols: u16) {
		self.surface.resize(rows, cols);
		self.events.push_back(InputEvent::Resize { rows, cols });
	}
}

impl Renderer for RecordingRenderer {
	fn draw_text(&mut self, row: u16, col: u16, text: &str, color_pair: u8, attrs: Attr) {
		self.commands.push(RenderCommand::DrawText {
			row,
			col,
			text: text.to_string(),
			color_pair,
			attributes: attrs,
		});
		self.surface.put_str(row, col, text, color_pair, attrs);
	}

	fn draw_hline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8) {
		self.commands.push(RenderCommand::DrawHline {
			row,
			col,
			ch: ch.to_string(),
			length,
			color_pair,
		});
		for offset in 0..length {
			self.surface.put(row, col.saturating_add(offset), ch, color_pair, Attr::empty());
		}
	}

	fn draw_vline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8) {
		self.commands.push(RenderCommand::DrawVline {
			row,
			col,
			ch: ch.to_string(),
			length,
			color_pair,
		});
		for offset in 0..length {
			self.surface.put(row.saturating_add(offset), col, ch, color_pair, Attr::empty());
		}
	}

	fn draw_rect(&mut self, row: u16, col: u16, height: u16, width: u16, color_pair: u8, filled: bool) {
		self.commands.push(RenderCommand::DrawRect {
			row,
			col,
			height,
			width,
			color_pair,
			filled,
		});
		if height == 0 || width == 0 {
			return;
		}
		if filled {
			for r in 0..height {
				for c in 0..width {
					self.surface
						.put(row.saturating_add(r), col.saturating_add(c), " ", color_pair, Attr::empty());
				}
			}
			return;
		}
		let bottom = row.saturating_add(height - 1);
		let right = col.saturating_add(width - 1);
		for c in 0..width {
			self.surface.put(row, col.saturating_add(c), "─", color_pair, Attr::empty());
			self.surface.put(bottom, col.saturating_add(c), "─", color_pair, Attr::empty());
		}
		for r in 0..height {
			self.surface.put(row.saturating_add(r), col, "│", color_pair, Attr::empty());
			self.surface.put(row.saturating_add(r), right, "│", color_pair, Attr::empty());
		}
		self.surface.put(row, col, "┌", color_pair, Attr::empty());
		self.surface.put(row, right, "┐", color_pair, Attr::empty());
		self.surface.put(bottom, col, "└", color_pair, Attr::empty());
		self.surface.put(bottom, right, "┘", color_pair, Attr::empty());
	}

	fn clear(&mut self) {
		self.commands.push(RenderCommand::Clear);
		self.surface.reset();
	}

	fn clear_region(&mut self, row: u16, col: u16, height: u16, width: u16) {
		self.commands.push(RenderCommand::ClearRegion {
			row,
			col,
			height,
			width,
		});
		self.surface.reset_region(row, col, height, width);
	}

	fn refresh(&mut self) -> Result<(), TtkError> {
		self.commands.push(RenderCommand::Refresh);
		self.refreshes += 1;
		Ok(())
	}

	fn refresh_region(&mut self, row: u16, col: u16, height: u16, width: u16) -> Result<(), TtkError> {
		self.commands.push(RenderCommand::RefreshRegion {
			row,
			col,
			height,
			width,
		});
		self.refreshes += 1;
		Ok(())
	}

	fn init_color_pair(&mut self, pair_id: u8, fg: Rgb, bg: Rgb) {
		self.commands.push(RenderCommand::InitColorPair {
			pair_id,
			fg_color: fg,
			bg_color: bg,
		});
		self.palette.set(pair_id, fg, bg);
	}

	fn set_cursor_visibility(&mut self, visible: bool) {
		self.commands.push(RenderCommand::SetCursorVisibility { visible });
		self.cursor_visible = visible;
	}

	fn move_cursor(&mut self, row: u16, col: u16) {
		self.commands.push(RenderCommand::MoveCursor { row, col });
		let (rows, cols) = self.surface.size();
		self.cursor = (row.min(rows.saturating_sub(1)), col.min(cols.saturating_sub(1)));
	}

	fn size(&self) -> (u16, u16) {
		self.surface.size()
	}

	fn poll_event(&mut self, _timeout: Duration) -> Result<Option<InputEvent>, TtkError> {
		Ok(self.events.pop_front())
	}
}
