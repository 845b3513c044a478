//! Terminal UI module using ratatui.
//!
//! - `render`: frame layout, reading pane and overlays
//! - `input`: keyboard event handling
//! - `styles`: color scheme and text styling

pub mod input;
pub mod render;
pub mod styles;
