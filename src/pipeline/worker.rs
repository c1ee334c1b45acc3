//! Worker thread draining the event queue into the owner inbox

use super::{EventReceiver, Marshaler};
use crate::error::Result;
use crate::utils::join_within;
use crossbeam_channel::RecvTimeoutError;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to the running worker thread
pub struct Worker {
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Start draining `queue` into `marshaler` while `running` is set.
    ///
    /// The worker waits at most `poll` for each event so it notices a cleared
    /// `running` flag promptly.
    pub fn spawn(
        queue: EventReceiver,
        marshaler: Marshaler,
        running: Arc<AtomicBool>,
        poll: Duration,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("event-worker".to_string())
            .spawn(move || run(queue, marshaler, running, poll))?;
        Ok(Self {
            handle: Some(handle),
        })
    }

    /// Join the thread within `timeout`. Later calls are no-ops.
    pub fn join(&mut self, timeout: Duration) -> Result<()> {
        match self.handle.take() {
            Some(handle) => join_within(handle, timeout, "event worker"),
            None => Ok(()),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

fn run(queue: EventReceiver, marshaler: Marshaler, running: Arc<AtomicBool>, poll: Duration) {
    log::debug!("Event worker started");
    let mut forwarded: u64 = 0;

    while running.load(Ordering::Acquire) {
        let step = panic::catch_unwind(AssertUnwindSafe(|| drain_one(&queue, &marshaler, poll)));
        match step {
            Ok(Ok(true)) => forwarded += 1,
            Ok(Ok(false)) => {}
            Ok(Err(e)) => log::error!("Event worker: {}", e),
            Err(_) => log::error!("Event worker recovered from a panic while draining"),
        }
    }

    log::debug!("Event worker stopped after forwarding {} event(s)", forwarded);
}

/// Move at most one event to the owner. `Ok(true)` if one was forwarded.
fn drain_one(
    queue: &EventReceiver,
    marshaler: &Marshaler,
    poll: Duration,
) -> std::result::Result<bool, super::MarshalError> {
    match queue.recv_timeout(poll) {
        Ok(event) => {
            marshaler.post(event)?;
            Ok(true)
        }
        Err(RecvTimeoutError::Timeout) => Ok(false),
        Err(RecvTimeoutError::Disconnected) => {
            // Every producer is gone; keep polling the flag at the same pace.
            thread::sleep(poll);
            Ok(false)
        }
    }
}
