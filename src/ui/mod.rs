//! Terminal User Interface components

mod app;
pub mod theme;
mod widgets;

pub use app::{App, AppState, AppView, ButtonBoard, LogEntry};
pub use theme::ThemeColors;
pub use widgets::*;
