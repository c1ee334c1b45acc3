//! Native button library driver
//!
//! The firmware's button state machine is compiled into a shared library
//! exposing a periodic tick and a per-channel level setter. This module loads
//! it, drives its tick at a fixed cadence on a dedicated thread, and forwards
//! press/release levels from the owner context.

mod driver;
mod library;
mod tick;

pub use driver::NativeDriver;
pub use library::{NativeLibrary, CLEANUP_SYMBOL, INIT_SYMBOL, SET_KEY_STATE_SYMBOL, TICK_SYMBOL};
pub use tick::{TickLoop, TickSchedule, TickStats, TimerResolution};

use crate::error::{Error, Result};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Level passed to `set_key_state` for a held button
pub const LEVEL_PRESSED: u8 = 1;
/// Level passed to `set_key_state` for a released button
pub const LEVEL_RELEASED: u8 = 0;

/// Entry points of the button library.
///
/// `tick` and `set_key_state` are required and must be callable from
/// different threads without external locking. `init` and `cleanup` are
/// optional; backends without them return [`Error::OptionalSymbolMissing`].
pub trait ButtonBackend: Send + Sync {
    /// Advance the button state machine by one period
    fn tick(&self) -> Result<()>;

    /// Set the input level of `channel` (1 = pressed, 0 = released)
    fn set_key_state(&self, channel: u8, level: u8) -> Result<()>;

    /// Optional initialization; returns the library status (0 = success)
    fn init(&self) -> Result<i32> {
        Err(Error::OptionalSymbolMissing("init"))
    }

    /// Optional teardown
    fn cleanup(&self) -> Result<()> {
        Err(Error::OptionalSymbolMissing("cleanup"))
    }
}

/// Run a backend call, turning a panic into [`Error::NativeCallFailed`].
pub(crate) fn guarded<T>(call: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(Error::NativeCallFailed {
            call,
            reason: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
