//! Serializable render command records.
//!
//! Every draw primitive of the [`Renderer`](crate::Renderer) contract maps
//! to one tagged record here. The records serialize to JSON objects with a
//! `command_type` discriminator and parse back into equal values, which is
//! what enables recording/replay, cross-backend equivalence testing, and
//! offline inspection of a command stream.
//!
//! Parsing is strict: an unknown `command_type`, a missing field, or a
//! field of the wrong type is a typed [`CommandParseError`], never a
//! silent default.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::color::{Attr, Rgb};
use crate::error::CommandParseError;

/// One render command, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum RenderCommand {
	DrawText {
		row: u16,
		col: u16,
		text: String,
		color_pair: u8,
		attributes: Attr,
	},
	DrawHline {
		row: u16,
		col: u16,
		#[serde(rename = "char")]
		ch: String,
		length: u16,
		color_pair: u8,
	},
	DrawVline {
		row: u16,
		col: u16,
		#[serde(rename = "char")]
		ch: String,
		length: u16,
		color_pair: u8,
	},
	DrawRect {
		row: u16,
		col: u16,
		height: u16,
		width: u16,
		color_pair: u8,
		filled: bool,
	},
	Clear,
	ClearRegion {
		row: u16,
		col: u16,
		height: u16,
		width: u16,
	},
	Refresh,
	RefreshRegion {
		row: u16,
		col: u16,
		height: u16,
		width: u16,
	},
	InitColorPair {
		pair_id: u8,
		fg_color: Rgb,
		bg_color: Rgb,
	},
	SetCursorVisibility {
		visible: bool,
	},
	MoveCursor {
		row: u16,
		col: u16,
	},
}

impl RenderCommand {
	/// The wire name of this command.
	pub fn command_type(&self) -> &'static str {
		match self {
			Self::DrawText { .. } => "draw_text",
			Self::DrawHline { .. } => "draw_hline",
			Self::DrawVline { .. } => "draw_vline",
			Self::DrawRect { .. } => "draw_rect",
			Self::Clear => "clear",
			Self::ClearRegion { .. } => "clear_region",
			Self::Refresh => "refresh",
			Self::RefreshRegion { .. } => "refresh_region",
			Self::InitColorPair { .. } => "init_color_pair",
			Self::SetCursorVisibility { .. } => "set_cursor_visibility",
			Self::MoveCursor { .. } => "move_cursor",
		}
	}
}

/// Serializes a command to its canonical JSON object form.
pub fn serialize_command(command: &RenderCommand) -> String {
	// Tagged-enum serialization to a flat object cannot fail.
	serde_json::to_string(command).unwrap_or_default()
}

/// Parses one JSON record into a command.
pub fn parse_command(input: &str) -> Result<RenderCommand, CommandParseError> {
	let value: Value = serde_json::from_str(input).map_err(|e| CommandParseError::Json(e.to_string()))?;
	parse_command_value(&value)
}

/// Parses an already-decoded JSON value into a command.
pub fn parse_command_value(value: &Value) -> Result<RenderCommand, CommandParseError> {
	let obj = value.as_object().ok_or(CommandParseError::NotAnObject)?;
	let command_type = obj
		.get("command_type")
		.ok_or(CommandParseError::MissingCommandType)?
		.as_str()
		.ok_or(CommandParseError::MissingCommandType)?;

	match command_type {
		"draw_text" => Ok(RenderCommand::DrawText {
			row: field_u16(obj, "draw_text", "row")?,
			col: field_u16(obj, "draw_text", "col")?,
			text: field_str(obj, "draw_text", "text")?,
			color_pair: field_u8(obj, "draw_text", "color_pair")?,
			attributes: Attr::from_bits_truncate(field_u16(obj, "draw_text", "attributes")?),
		}),
		"draw_hline" => Ok(RenderCommand::DrawHline {
			row: field_u16(obj, "draw_hline", "row")?,
			col: field_u16(obj, "draw_hline", "col")?,
			ch: field_str(obj, "draw_hline", "char")?,
			length: field_u16(obj, "draw_hline", "length")?,
			color_pair: field_u8(obj, "draw_hline", "color_pair")?,
		}),
		"draw_vline" => Ok(RenderCommand::DrawVline {
			row: field_u16(obj, "draw_vline", "row")?,
			col: field_u16(obj, "draw_vline", "col")?,
			ch: field_str(obj, "draw_vline", "char")?,
			length: field_u16(obj, "draw_vline", "length")?,
			color_pair: field_u8(obj, "draw_vline", "color_pair")?,
		}),
		"draw_rect" => Ok(RenderCommand::DrawRect {
			row: field_u16(obj, "draw_rect", "row")?,
			col: field_u16(obj, "draw_rect", "col")?,
			height: field_u16(obj, "draw_rect", "height")?,
			width: field_u16(obj, "draw_rect", "width")?,
			color_pair: field_u8(obj, "draw_rect", "color_pair")?,
			filled: field_bool(obj, "draw_rect", "filled")?,
		}),
		"clear" => Ok(RenderCommand::Clear),
		"clear_region" => Ok(RenderCommand::ClearRegion {
			row: field_u16(obj, "clear_region", "row")?,
			col: field_u16(obj, "clear_region", "col")?,
			height: field_u16(obj, "clear_region", "height")?,
			width: field_u16(obj, "clear_region", "width")?,
		}),
		"refresh" => Ok(RenderCommand::Refresh),
		"refresh_region" => Ok(RenderCommand::RefreshRegion {
			row: field_u16(obj, "refresh_region", "row")?,
			col: field_u16(obj, "refresh_region", "col")?,
			height: field_u16(obj, "refresh_region", "height")?,
			width: field_u16(obj, "refresh_region", "width")?,
		}),
		"init_color_pair" => Ok(RenderCommand::InitColorPair {
			pair_id: field_u8(obj, "init_color_pair", "pair_id")?,
			fg_color: field_rgb(obj, "init_color_pair", "fg_color")?,
			bg_color: field_rgb(obj, "init_color_pair", "bg_color")?,
		}),
		"set_cursor_visibility" => Ok(RenderCommand::SetCursorVisibility {
			visible: field_bool(obj, "set_cursor_visibility", "visible")?,
		}),
		"move_cursor" => Ok(RenderCommand::MoveCursor {
			row: field_u16(obj, "move_cursor", "row")?,
			col: field_u16(obj, "move_cursor", "col")?,
		}),
		other => Err(CommandParseError::UnknownCommandType(other.to_string())),
	}
}

/// Parses a newline-delimited stream of command records.
pub fn parse_stream(input: &str) -> Result<Vec<RenderCommand>, CommandParseError> {
	input
		.lines()
		.filter(|line| !line.trim().is_empty())
		.map(parse_command)
		.collect()
}

/// Serializes commands as one JSON record per line.
pub fn serialize_stream(commands: &[RenderCommand]) -> String {
	let mut out = String::new();
	for command in commands {
		out.push_str(&serialize_command(command));
		out.push('\n');
	}
	out
}

fn field<'a>(
	obj: &'a Map<String, Value>,
	command_type: &'static str,
	name: &'static str,
) -> Result<&'a Value, CommandParseError> {
	obj.get(name).ok_or(CommandParseError::MissingField {
		command_type,
		field: name,
	})
}

fn field_u16(obj: &Map<String, Value>, command_type: &'static str, name: &'static str) -> Result<u16, CommandParseError> {
	field(obj, command_type, name)?
		.as_u64()
		.and_then(|n| u16::try_from(n).ok())
		.ok_or(CommandParseError::FieldType {
			command_type,
			field: name,
			expected: "u16",
		})
}

fn field_u8(obj: &Map<String, Value>, command_type: &'static str, name: &'static str) -> Result<u8, CommandParseError> {
	field(obj, command_type, name)?
		.as_u64()
		.and_then(|n| u8::try_from(n).ok())
		.ok_or(CommandParseError::FieldType {
			command_type,
			field: name,
			expected: "u8",
		})
}

fn field_bool(obj: &Map<String, Value>, command_type: &'static str, name: &'static str) -> Result<bool, CommandParseError> {
	field(obj, command_type, name)?
		.as_bool()
		.ok_or(CommandParseError::FieldType {
			command_type,
			field: name,
			expected: "bool",
		})
}

fn field_str(obj: &Map<String, Value>, command_type: &'static str, name: &'static str) -> Result<String, CommandParseError> {
	field(obj, command_type, name)?
		.as_str()
		.map(str::to_string)
		.ok_or(CommandParseError::FieldType {
			command_type,
			field: name,
			expected: "string",
		})
}

fn field_rgb(obj: &Map<String, Value>, command_type: &'static str, name: &'static str) -> Result<Rgb, CommandParseError> {
	let mismatch = CommandParseError::FieldType {
		command_type,
		field: name,
		expected: "[u8, u8, u8]",
	};
	let arr = field(obj, command_type, name)?.as_array().ok_or(mismatch.clone())?;
	if arr.len() != 3 {
		return Err(mismatch);
	}
	let component = |v: &Value| v.as_u64().and_then(|n| u8::try_from(n).ok());
	match (component(&arr[0]), component(&arr[1]), component(&arr[2])) {
		(Some(r), Some(g), Some(b)) => Ok(Rgb(r, g, b)),
		_ => Err(mismatch),
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;

	use super::*;

	fn all_commands() -> Vec<RenderCommand> {
		vec![
			RenderCommand::DrawText {
				row: 5,
				col: 10,
				text: "Hello".into(),
				color_pair: 1,
				attributes: Attr::BOLD | Attr::UNDERLINE,
			},
			RenderCommand::DrawHline {
				row: 0,
				col: 0,
				ch: "─".into(),
				length: 40,
				color_pair: 8,
			},
			RenderCommand::DrawVline {
				row: 1,
				col: 39,
				ch: "│".into(),
				length: 20,
				color_pair: 8,
			},
			RenderCommand::DrawRect {
				row: 2,
				col: 2,
				height: 5,
				width: 10,
				color_pair: 3,
				filled: true,
			},
			RenderCommand::Clear,
			RenderCommand::ClearRegion {
				row: 0,
				col: 0,
				height: 2,
				width: 2,
			},
			RenderCommand::Refresh,
			RenderCommand::RefreshRegion {
				row: 1,
				col: 1,
				height: 3,
				width: 3,
			},
			RenderCommand::InitColorPair {
				pair_id: 4,
				fg_color: Rgb(255, 0, 0),
				bg_color: Rgb(0, 0, 0),
			},
			RenderCommand::SetCursorVisibility { visible: false },
			RenderCommand::MoveCursor { row: 12, col: 34 },
		]
	}

	#[test]
	fn every_command_round_trips() {
		for command in all_commands() {
			let json = serialize_command(&command);
			let parsed = parse_command(&json).unwrap();
			assert_eq!(parsed, command, "round trip failed for {json}");
		}
	}

	#[test]
	fn stream_round_trips() {
		let commands = all_commands();
		let text = serialize_stream(&commands);
		assert_eq!(parse_stream(&text).unwrap(), commands);
	}

	#[test]
	fn unknown_command_type_is_rejected() {
		let err = parse_command(r#"{"command_type": "draw_circle", "row": 1}"#).unwrap_err();
		assert_eq!(err, CommandParseError::UnknownCommandType("draw_circle".into()));
	}

	#[test]
	fn missing_field_is_rejected() {
		let err = parse_command(r#"{"command_type": "draw_text", "row": 1, "col": 2}"#).unwrap_err();
		assert_eq!(
			err,
			CommandParseError::MissingField {
				command_type: "draw_text",
				field: "text",
			}
		);
	}

	#[test]
	fn mismatched_field_type_is_rejected() {
		let err = parse_command(r#"{"command_type": "move_cursor", "row": "one", "col": 2}"#).unwrap_err();
		assert_eq!(
			err,
			CommandParseError::FieldType {
				command_type: "move_cursor",
				field: "row",
				expected: "u16",
			}
		);
	}

	#[test]
	fn out_of_range_numbers_are_type_errors() {
		let err = parse_command(r#"{"command_type": "move_cursor", "row": 70000, "col": 2}"#).unwrap_err();
		assert!(matches!(err, CommandParseError::FieldType { field: "row", .. }));
	}

	#[test]
	fn serialized_form_carries_command_type_tag() {
		let json = serialize_command(&RenderCommand::Clear);
		let value: Value = serde_json::from_str(&json).unwrap();
		assert_eq!(value["command_type"], "clear");
	}
}
