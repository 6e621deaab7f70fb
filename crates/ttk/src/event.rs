//! Input events delivered by a renderer backend.
//!
//! Every backend maps its native event stream into these types; the
//! application never sees a backend-specific event. Conversions from
//! crossterm live with the cells backend in [`crate::cells`].

bitflags::bitflags! {
	/// Modifier keys held during a key or mouse event.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Modifiers: u8 {
		const SHIFT = 1;
		const CONTROL = 2;
		const ALT = 4;
		const META = 8;
	}
}

/// Named keys plus the catch-all `Character`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
	Up,
	Down,
	Left,
	Right,
	Enter,
	Escape,
	Tab,
	Backspace,
	Delete,
	Insert,
	Home,
	End,
	PageUp,
	PageDown,
	/// Function key F1..=F12.
	F(u8),
	/// A printable character; the codepoint rides in [`InputEvent::Key`].
	Character,
}

/// Mouse buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
	Left,
	Right,
	Middle,
}

/// What the mouse did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseKind {
	Down(MouseButton),
	Up(MouseButton),
	Move,
	/// Two presses of the same button at the same cell within the
	/// double-click window.
	DoubleClick(MouseButton),
	/// Wheel movement; positive scrolls down, negative up.
	Scroll(i8),
}

/// A single input event from the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
	Key {
		code: KeyCode,
		modifiers: Modifiers,
		/// The codepoint when `code` is [`KeyCode::Character`].
		ch: Option<char>,
	},
	Mouse {
		row: u16,
		col: u16,
		kind: MouseKind,
	},
	Resize {
		rows: u16,
		cols: u16,
	},
}

impl InputEvent {
	/// A character key with no modifiers.
	pub const fn char(c: char) -> Self {
		Self::Key {
			code: KeyCode::Character,
			modifiers: Modifiers::empty(),
			ch: Some(c),
		}
	}

	/// A named key with no modifiers.
	pub const fn key(code: KeyCode) -> Self {
		Self::Key {
			code,
			modifiers: Modifiers::empty(),
			ch: None,
		}
	}

	/// Returns the character for unmodified printable key events.
	pub fn as_char(&self) -> Option<char> {
		match self {
			Self::Key {
				code: KeyCode::Character,
				modifiers,
				ch,
			} if modifiers.difference(Modifiers::SHIFT).is_empty() => *ch,
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn as_char_ignores_shift_only() {
		let ev = InputEvent::Key {
			code: KeyCode::Character,
			modifiers: Modifiers::SHIFT,
			ch: Some('A'),
		};
		assert_eq!(ev.as_char(), Some('A'));

		let ev = InputEvent::Key {
			code: KeyCode::Character,
			modifiers: Modifiers::CONTROL,
			ch: Some('a'),
		};
		assert_eq!(ev.as_char(), None);
	}
}
