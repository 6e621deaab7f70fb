//! Error types for the rendering toolkit.

use thiserror::Error;

/// Errors surfaced by renderer backends and color utilities.
#[derive(Debug, Error)]
pub enum TtkError {
	#[error("terminal I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid color: {0}")]
	InvalidColor(String),

	#[error("backend {0:?} is not available in this build")]
	BackendUnavailable(String),

	#[error("renderer already initialized")]
	AlreadyInitialized,
}

/// Errors produced when parsing a serialized render command record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandParseError {
	#[error("record is not a JSON object")]
	NotAnObject,

	#[error("record has no command_type field")]
	MissingCommandType,

	#[error("unknown command_type: {0}")]
	UnknownCommandType(String),

	#[error("{command_type}: missing required field {field}")]
	MissingField {
		command_type: &'static str,
		field: &'static str,
	},

	#[error("{command_type}: field {field} has the wrong type (expected {expected})")]
	FieldType {
		command_type: &'static str,
		field: &'static str,
		expected: &'static str,
	},

	#[error("malformed JSON: {0}")]
	Json(String),
}
