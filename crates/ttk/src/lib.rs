//! dyad-ttk: the rendering toolkit core.
//!
//! This crate defines the abstract surface the rest of dyad renders
//! through: cells, color pairs, attributes, input events, and the
//! serializable command stream. Concrete backends implement the
//! [`Renderer`] trait; this crate ships the crossterm cells backend and
//! an in-memory recording surface, and the windowed bitmap backend plugs
//! in through the same contract.

pub mod cell;
pub mod cells;
pub mod color;
pub mod command;
pub mod error;
pub mod event;
pub mod record;
pub mod renderer;
pub mod select;

pub use cell::{Cell, Surface};
pub use cells::CellsRenderer;
pub use color::{Attr, ColorPair, Palette, Rgb, hex_to_rgb, rgb_to_hex};
pub use command::{RenderCommand, parse_command, parse_stream, serialize_command, serialize_stream};
pub use error::{CommandParseError, TtkError};
pub use event::{InputEvent, KeyCode, Modifiers, MouseButton, MouseKind};
pub use record::RecordingRenderer;
pub use renderer::Renderer;
pub use select::{BackendKind, bitmap_available, init_renderer, select_backend};
