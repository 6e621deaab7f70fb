//! Character-cell backend over crossterm.
//!
//! Draw primitives land in a back buffer; `refresh` diffs it against the
//! front buffer and emits the minimal escape stream, coalescing
//! contiguous same-style cells into single print runs.

use std::io::{self, Write};
use std::time::{Duration, Instant};

use crossterm::event::{
	self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode as CtKeyCode, KeyEventKind, KeyModifiers,
	MouseButton as CtMouseButton, MouseEventKind,
};
use crossterm::style::{Attribute, Color as CtColor, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor};
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{cursor, queue};

use crate::cell::Surface;
use crate::color::{Attr, ColorPair, Palette, Rgb};
use crate::error::TtkError;
use crate::event::{InputEvent, KeyCode, Modifiers, MouseButton, MouseKind};
use crate::renderer::Renderer;

/// Two presses of the same button on the same cell within this window
/// collapse into a double-click.
const DOUBLE_CLICK_WINDOW: Duration = Duration::from_millis(400);

#[derive(Debug, Clone, Copy)]
struct ClickState {
	at: Instant,
	row: u16,
	col: u16,
	button: MouseButton,
}

/// Terminal cell renderer.
pub struct CellsRenderer {
	out: io::Stdout,
	front: Surface,
	back: Surface,
	palette: Palette,
	cursor: (u16, u16),
	cursor_visible: bool,
	last_click: Option<ClickState>,
	active: bool,
}

impl CellsRenderer {
	/// Puts the terminal into raw mode on the alternate screen and sizes
	/// the buffers from the device.
	pub fn new() -> Result<Self, TtkError> {
		terminal::enable_raw_mode()?;
		let mut out = io::stdout();
		queue!(out, EnterAlternateScreen, EnableMouseCapture, cursor::Hide)?;
		out.flush()?;

		let (cols, rows) = terminal::size()?;
		tracing::debug!(rows, cols, "cells renderer initialized");
		Ok(Self {
			out,
			front: Surface::new(rows, cols),
			back: Surface::new(rows, cols),
			palette: Palette::new(),
			cursor: (0, 0),
			cursor_visible: false,
			last_click: None,
			active: true,
		})
	}

	fn restore_terminal(&mut self) -> io::Result<()> {
		if !self.active {
			return Ok(());
		}
		self.active = false;
		queue!(self.out, DisableMouseCapture, LeaveAlternateScreen, cursor::Show)?;
		self.out.flush()?;
		terminal::disable_raw_mode()
	}

	fn pair_colors(&self, pair_id: u8) -> Option<ColorPair> {
		self.palette.get(pair_id)
	}

	/// Emits every non-continuation cell in the given region whose content
	/// differs between the buffers, coalescing horizontal runs that share
	/// a style.
	fn flush_region(&mut self, row0: u16, col0: u16, height: u16, width: u16) -> Result<(), TtkError> {
		let (rows, cols) = self.back.size();
		let row_end = row0.saturating_add(height).min(rows);
		let col_end = col0.saturating_add(width).min(cols);

		// First pass: collect dirty runs, then emit. Split so the grid
		// borrow ends before the writer borrow begins.
		let mut runs: Vec<(u16, u16, (u8, Attr), String)> = Vec::new();
		for row in row0..row_end {
			let mut run: Option<(u16, (u8, Attr), String)> = None;

			for col in col0..col_end {
				let (Some(back), Some(front)) = (self.back.cell(row, col), self.front.cell(row, col)) else {
					continue;
				};
				let dirty = back != front && !back.is_continuation();
				let style = (back.color_pair, back.attrs);

				match run.as_mut() {
					Some((_, run_style, text)) if dirty && *run_style == style => {
						text.push_str(&back.symbol);
					}
					_ => {
						if let Some((start, run_style, text)) = run.take() {
							runs.push((row, start, run_style, text));
						}
						if dirty {
							run = Some((col, style, back.symbol.clone()));
						}
					}
				}
			}

			if let Some((start, run_style, text)) = run {
				runs.push((row, start, run_style, text));
			}
		}

		for (row, start, style, text) in runs {
			self.emit_run(row, start, style, &text)?;
		}

		// Re-assert cursor state after painting.
		if self.cursor_visible {
			queue!(self.out, cursor::MoveTo(self.cursor.1, self.cursor.0), cursor::Show)?;
		} else {
			queue!(self.out, cursor::Hide)?;
		}
		self.out.flush()?;

		// Only the flushed region becomes clean; dirty cells elsewhere
		// keep waiting for their refresh.
		self.front.copy_region_from(&self.back, row0, col0, height, width);
		Ok(())
	}

	fn emit_run(&mut self, row: u16, col: u16, style: (u8, Attr), text: &str) -> Result<(), TtkError> {
		let (pair_id, attrs) = style;
		queue!(self.out, cursor::MoveTo(col, row), SetAttribute(Attribute::Reset))?;

		match self.pair_colors(pair_id) {
			Some(pair) => queue!(
				self.out,
				SetForegroundColor(rgb_to_ct(pair.fg)),
				SetBackgroundColor(rgb_to_ct(pair.bg)),
			)?,
			None => queue!(self.out, ResetColor)?,
		}

		if attrs.contains(Attr::BOLD) {
			queue!(self.out, SetAttribute(Attribute::Bold))?;
		}
		if attrs.contains(Attr::DIM) {
			queue!(self.out, SetAttribute(Attribute::Dim))?;
		}
		if attrs.contains(Attr::UNDERLINE) {
			queue!(self.out, SetAttribute(Attribute::Underlined))?;
		}
		if attrs.contains(Attr::REVERSE) {
			queue!(self.out, SetAttribute(Attribute::Reverse))?;
		}
		if attrs.contains(Attr::ITALIC) {
			queue!(self.out, SetAttribute(Attribute::Italic))?;
		}
		if attrs.contains(Attr::STRIKETHROUGH) {
			queue!(self.out, SetAttribute(Attribute::CrossedOut))?;
		}

		queue!(self.out, Print(text))?;
		Ok(())
	}

	fn handle_resize(&mut self, rows: u16, cols: u16) {
		self.back.resize(rows, cols);
		self.front.resize(rows, cols);
	}

	fn map_mouse_down(&mut self, button: MouseButton, row: u16, col: u16) -> MouseKind {
		let now = Instant::now();
		let doubled = self.last_click.is_some_and(|click| {
			click.button == button && click.row == row && click.col == col && now.duration_since(click.at) <= DOUBLE_CLICK_WINDOW
		});
		if doubled {
			self.last_click = None;
			MouseKind::DoubleClick(button)
		} else {
			self.last_click = Some(ClickState {
				at: now,
				row,
				col,
				button,
			});
			MouseKind::Down(button)
		}
	}

	fn map_event(&mut self, native: Event) -> Option<InputEvent> {
		match native {
			Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
				let modifiers = map_modifiers(key.modifiers);
				let (code, ch) = match key.code {
					CtKeyCode::Char(c) => (KeyCode::Character, Some(c)),
					CtKeyCode::Up => (KeyCode::Up, None),
					CtKeyCode::Down => (KeyCode::Down, None),
					CtKeyCode::Left => (KeyCode::Left, None),
					CtKeyCode::Right => (KeyCode::Right, None),
					CtKeyCode::Enter => (KeyCode::Enter, None),
					CtKeyCode::Esc => (KeyCode::Escape, None),
					CtKeyCode::Tab => (KeyCode::Tab, None),
					CtKeyCode::BackTab => (KeyCode::Tab, None),
					CtKeyCode::Backspace => (KeyCode::Backspace, None),
					CtKeyCode::Delete => (KeyCode::Delete, None),
					CtKeyCode::Insert => (KeyCode::Insert, None),
					CtKeyCode::Home => (KeyCode::Home, None),
					CtKeyCode::End => (KeyCode::End, None),
					CtKeyCode::PageUp => (KeyCode::PageUp, None),
					CtKeyCode::PageDown => (KeyCode::PageDown, None),
					CtKeyCode::F(n) => (KeyCode::F(n), None),
					_ => return None,
				};
				let modifiers = if matches!(key.code, CtKeyCode::BackTab) {
					modifiers | Modifiers::SHIFT
				} else {
					modifiers
				};
				Some(InputEvent::Key { code, modifiers, ch })
			}
			Event::Mouse(mouse) => {
				let (row, col) = (mouse.row, mouse.column);
				let kind = match mouse.kind {
					MouseEventKind::Down(b) => self.map_mouse_down(map_button(b), row, col),
					MouseEventKind::Up(b) => MouseKind::Up(map_button(b)),
					MouseEventKind::Drag(_) | MouseEventKind::Moved => MouseKind::Move,
					MouseEventKind::ScrollUp => MouseKind::Scroll(-1),
					MouseEventKind::ScrollDown => MouseKind::Scroll(1),
					MouseEventKind::ScrollLeft | MouseEventKind::ScrollRight => return None,
				};
				Some(InputEvent::Mouse { row, col, kind })
			}
			Event::Resize(cols, rows) => {
				self.handle_resize(rows, cols);
				Some(InputEvent::Resize { rows, cols })
			}
			_ => None,
		}
	}
}

impl Renderer for CellsRenderer {
	fn draw_text(&mut self, row: u16, col: u16, text: &str, color_pair: u8, attrs: Attr) {
		self.back.put_str(row, col, text, color_pair, attrs);
	}

	fn draw_hline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8) {
		for offset in 0..length {
			self.back.put(row, col.saturating_add(offset), ch, color_pair, Attr::empty());
		}
	}

	fn draw_vline(&mut self, row: u16, col: u16, ch: &str, length: u16, color_pair: u8) {
		for offset in 0..length {
			self.back.put(row.saturating_add(offset), col, ch, color_pair, Attr::empty());
		}
	}

	fn draw_rect(&mut self, row: u16, col: u16, height: u16, width: u16, color_pair: u8, filled: bool) {
		if height == 0 || width == 0 {
			return;
		}
		if filled {
			for r in 0..height {
				for c in 0..width {
					self.back
						.put(row.saturating_add(r), col.saturating_add(c), " ", color_pair, Attr::empty());
				}
			}
			return;
		}
		self.draw_hline(row, col, "─", width, color_pair);
		self.draw_hline(row.saturating_add(height - 1), col, "─", width, color_pair);
		self.draw_vline(row, col, "│", height, color_pair);
		self.draw_vline(row, col.saturating_add(width - 1), "│", height, color_pair);
		self.back.put(row, col, "┌", color_pair, Attr::empty());
		self.back.put(row, col.saturating_add(width - 1), "┐", color_pair, Attr::empty());
		self.back.put(row.saturating_add(height - 1), col, "└", color_pair, Attr::empty());
		self.back
			.put(row.saturating_add(height - 1), col.saturating_add(width - 1), "┘", color_pair, Attr::empty());
	}

	fn clear(&mut self) {
		self.back.reset();
	}

	fn clear_region(&mut self, row: u16, col: u16, height: u16, width: u16) {
		self.back.reset_region(row, col, height, width);
	}

	fn refresh(&mut self) -> Result<(), TtkError> {
		let (rows, cols) = self.back.size();
		self.flush_region(0, 0, rows, cols)
	}

	fn refresh_region(&mut self, row: u16, col: u16, height: u16, width: u16) -> Result<(), TtkError> {
		self.flush_region(row, col, height, width)
	}

	fn init_color_pair(&mut self, pair_id: u8, fg: Rgb, bg: Rgb) {
		self.palette.set(pair_id, fg, bg);
	}

	fn set_cursor_visibility(&mut self, visible: bool) {
		self.cursor_visible = visible;
	}

	fn move_cursor(&mut self, row: u16, col: u16) {
		let (rows, cols) = self.back.size();
		self.cursor = (row.min(rows.saturating_sub(1)), col.min(cols.saturating_sub(1)));
	}

	fn size(&self) -> (u16, u16) {
		self.back.size()
	}

	fn poll_event(&mut self, timeout: Duration) -> Result<Option<InputEvent>, TtkError> {
		let deadline = Instant::now() + timeout;
		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());
			if !event::poll(remaining)? {
				return Ok(None);
			}
			// Events we do not surface (focus, paste, key release) are
			// swallowed and the wait continues against the same deadline.
			if let Some(mapped) = self.map_event(event::read()?) {
				return Ok(Some(mapped));
			}
		}
	}

	fn shutdown(&mut self) -> Result<(), TtkError> {
		self.restore_terminal()?;
		Ok(())
	}
}

impl Drop for CellsRenderer {
	fn drop(&mut self) {
		let _ = self.restore_terminal();
	}
}

fn rgb_to_ct(rgb: Rgb) -> CtColor {
	CtColor::Rgb {
		r: rgb.r(),
		g: rgb.g(),
		b: rgb.b(),
	}
}

fn map_button(button: CtMouseButton) -> MouseButton {
	match button {
		CtMouseButton::Left => MouseButton::Left,
		CtMouseButton::Right => MouseButton::Right,
		CtMouseButton::Middle => MouseButton::Middle,
	}
}

fn map_modifiers(native: KeyModifiers) -> Modifiers {
	let mut modifiers = Modifiers::empty();
	if native.contains(KeyModifiers::SHIFT) {
		modifiers |= Modifiers::SHIFT;
	}
	if native.contains(KeyModifiers::CONTROL) {
		modifiers |= Modifiers::CONTROL;
	}
	if native.contains(KeyModifiers::ALT) {
		modifiers |= Modifiers::ALT;
	}
	if native.contains(KeyModifiers::SUPER) || native.contains(KeyModifiers::META) {
		modifiers |= Modifiers::META;
	}
	modifiers
}
