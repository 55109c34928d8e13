//! UI module - Rendering for the terminal dashboard

pub mod format;
pub mod renderer;
pub mod theme;
pub mod widgets;
