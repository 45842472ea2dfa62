mod app;
mod common;
mod editor;
mod render;

// Public API
pub use app::{map_key, EditorApp, Popup, StatusKind, StatusMessage};
pub use editor::run_editor;
