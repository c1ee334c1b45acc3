//! Button Simulator - keyboard-driven button input for embedded firmware
//!
//! Keyboard presses are captured on a hook thread, queued, handed to the
//! owner context in order and deduplicated there. Genuine transitions update
//! the on-screen buttons and, in hardware mode, drive a native button
//! library whose state machine is ticked at a fixed cadence.

pub mod bindings;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod keyboard;
pub mod lifecycle;
pub mod native;
pub mod pipeline;
pub mod ui;
pub mod utils;

pub use config::Config;
pub use error::{Error, Result};
