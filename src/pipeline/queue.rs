//! Bounded multi-producer event queue

use crate::keyboard::RawEvent;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, SendTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Queue capacity used when none is configured
pub const DEFAULT_CAPACITY: usize = 1000;

/// How often a blocked producer re-checks whether the queue was closed
const CLOSE_RECHECK: Duration = Duration::from_millis(50);

/// Returned to a producer once the queue is closed; carries the event back
#[derive(Debug, Error)]
#[error("event queue closed")]
pub struct QueueClosed(pub RawEvent);

/// Create a bounded queue holding at most `capacity` events
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = bounded(capacity.max(1));
    let closed = Arc::new(AtomicBool::new(false));
    (
        EventSender {
            tx,
            closed: Arc::clone(&closed),
        },
        EventReceiver { rx, closed },
    )
}

/// Producer side, cloned into every hook
#[derive(Clone)]
pub struct EventSender {
    tx: Sender<RawEvent>,
    closed: Arc<AtomicBool>,
}

impl EventSender {
    /// Append an event, blocking while the queue is full.
    ///
    /// Events are never dropped while the queue is open. A producer blocked on
    /// a full queue is released with [`QueueClosed`] when [`close`] is called.
    ///
    /// [`close`]: EventSender::close
    pub fn enqueue(&self, event: RawEvent) -> Result<(), QueueClosed> {
        let mut event = event;
        let mut reported_full = false;
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(QueueClosed(event));
            }
            match self.tx.send_timeout(event, CLOSE_RECHECK) {
                Ok(()) => return Ok(()),
                Err(SendTimeoutError::Timeout(returned)) => {
                    if !reported_full {
                        log::warn!("Event queue full, hook blocked until the worker catches up");
                        reported_full = true;
                    }
                    event = returned;
                }
                Err(SendTimeoutError::Disconnected(returned)) => return Err(QueueClosed(returned)),
            }
        }
    }

    /// Stop accepting events
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Consumer side, owned by the worker
pub struct EventReceiver {
    rx: Receiver<RawEvent>,
    closed: Arc<AtomicBool>,
}

impl EventReceiver {
    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Result<RawEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> Option<usize> {
        self.rx.capacity()
    }
}
