//! Colors, color pairs, and text attributes.
//!
//! Colors are plain RGB triples; styling is expressed as an indexed
//! *color pair* (foreground, background) plus an attribute bitmask.
//! Conversion to a concrete terminal or bitmap representation happens
//! at the backend boundary, never here.

use serde::{Deserialize, Serialize};

use crate::error::TtkError;

/// An RGB color triple.
///
/// Serializes as a three-element array, matching the wire shape of
/// `init_color_pair` command records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
	pub const BLACK: Self = Self(0, 0, 0);
	pub const WHITE: Self = Self(255, 255, 255);

	/// Red component.
	pub const fn r(self) -> u8 {
		self.0
	}

	/// Green component.
	pub const fn g(self) -> u8 {
		self.1
	}

	/// Blue component.
	pub const fn b(self) -> u8 {
		self.2
	}
}

/// Parses a `#RRGGBB` hex string into an RGB triple.
///
/// The leading `#` is required. Accepts upper- and lowercase digits.
pub fn hex_to_rgb(hex: &str) -> Result<Rgb, TtkError> {
	let digits = hex
		.strip_prefix('#')
		.ok_or_else(|| TtkError::InvalidColor(hex.to_string()))?;
	if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
		return Err(TtkError::InvalidColor(hex.to_string()));
	}
	let parse = |s: &str| u8::from_str_radix(s, 16).map_err(|_| TtkError::InvalidColor(hex.to_string()));
	Ok(Rgb(parse(&digits[0..2])?, parse(&digits[2..4])?, parse(&digits[4..6])?))
}

/// Formats an RGB triple as an uppercase `#RRGGBB` string.
///
/// `rgb_to_hex(hex_to_rgb(s)?)` equals `s.to_uppercase()` for every valid
/// six-digit hex string.
pub fn rgb_to_hex(rgb: Rgb) -> String {
	format!("#{:02X}{:02X}{:02X}", rgb.0, rgb.1, rgb.2)
}

/// An indexed (foreground, background) color pair.
///
/// Pair 0 is reserved for the terminal default colors and cannot be
/// redefined through [`Renderer::init_color_pair`](crate::Renderer::init_color_pair).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorPair {
	pub fg: Rgb,
	pub bg: Rgb,
}

/// A fixed-size table of color pair definitions, indexed by `u8`.
///
/// Slot 0 always reads as `None`: the terminal default pair.
#[derive(Debug, Clone)]
pub struct Palette {
	pairs: [Option<ColorPair>; 256],
}

impl Default for Palette {
	fn default() -> Self {
		Self { pairs: [None; 256] }
	}
}

impl Palette {
	pub fn new() -> Self {
		Self::default()
	}

	/// Defines a pair. Writes to slot 0 are ignored.
	pub fn set(&mut self, pair_id: u8, fg: Rgb, bg: Rgb) {
		if pair_id != 0 {
			self.pairs[pair_id as usize] = Some(ColorPair { fg, bg });
		}
	}

	/// Looks up a pair definition; `None` for slot 0 and undefined slots.
	pub fn get(&self, pair_id: u8) -> Option<ColorPair> {
		self.pairs[pair_id as usize]
	}
}

bitflags::bitflags! {
	/// Text attribute bitmask carried by every rendered cell.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
	pub struct Attr: u16 {
		const BOLD = 1;
		const UNDERLINE = 2;
		const REVERSE = 4;
		const DIM = 8;
		const ITALIC = 16;
		const STRIKETHROUGH = 32;
	}
}

impl Serialize for Attr {
	fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_u16(self.bits())
	}
}

impl<'de> Deserialize<'de> for Attr {
	fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let bits = u16::deserialize(deserializer)?;
		Ok(Attr::from_bits_truncate(bits))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_round_trip_uppercases() {
		for s in ["#a1b2c3", "#000000", "#FFffFF", "#deadBE"] {
			let rgb = hex_to_rgb(s).unwrap();
			assert_eq!(rgb_to_hex(rgb), s.to_uppercase());
		}
	}

	#[test]
	fn hex_rejects_malformed() {
		for s in ["a1b2c3", "#abc", "#gg0011", "#1234567", ""] {
			assert!(hex_to_rgb(s).is_err(), "accepted {s:?}");
		}
	}

	#[test]
	fn palette_slot_zero_is_immutable() {
		let mut palette = Palette::new();
		palette.set(0, Rgb::WHITE, Rgb::BLACK);
		assert_eq!(palette.get(0), None);

		palette.set(3, Rgb(10, 20, 30), Rgb::BLACK);
		assert_eq!(
			palette.get(3),
			Some(ColorPair {
				fg: Rgb(10, 20, 30),
				bg: Rgb::BLACK,
			})
		);
	}

	#[test]
	fn attr_bits_match_contract() {
		assert_eq!(Attr::BOLD.bits(), 1);
		assert_eq!(Attr::UNDERLINE.bits(), 2);
		assert_eq!(Attr::REVERSE.bits(), 4);
		assert_eq!(Attr::DIM.bits(), 8);
	}
}
