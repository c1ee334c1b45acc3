//! Shared utility functions and traits

use crate::error::{Error, Result};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Extension trait for tracking minimum and maximum values in Option<T>.
///
/// # Example
///
/// ```
/// use button_sim::utils::MinMaxExt;
///
/// let mut min: Option<u64> = None;
/// let mut max: Option<u64> = None;
///
/// min.update_min(50);
/// max.update_max(50);
/// min.update_min(30);
/// max.update_max(70);
/// assert_eq!(min, Some(30));
/// assert_eq!(max, Some(70));
/// ```
pub trait MinMaxExt<T: Ord + Copy> {
    /// Store `value` if it is smaller than the current minimum or none exists.
    fn update_min(&mut self, value: T);

    /// Store `value` if it is larger than the current maximum or none exists.
    fn update_max(&mut self, value: T);
}

impl<T: Ord + Copy> MinMaxExt<T> for Option<T> {
    fn update_min(&mut self, value: T) {
        *self = Some(self.map(|m| m.min(value)).unwrap_or(value));
    }

    fn update_max(&mut self, value: T) {
        *self = Some(self.map(|m| m.max(value)).unwrap_or(value));
    }
}

const JOIN_POLL: Duration = Duration::from_millis(2);

/// Join `handle` if the thread finishes within `timeout`.
///
/// On timeout the thread is detached and [`Error::ShutdownTimeout`] is
/// returned; the caller decides whether to proceed. A panicked thread is
/// logged and counts as joined.
pub fn join_within(handle: JoinHandle<()>, timeout: Duration, context: &'static str) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(Error::ShutdownTimeout { context, timeout });
        }
        thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        log::error!("{} panicked before shutdown", context);
    }
    Ok(())
}
