//! Order-preserving hand-off from the worker to the owner context

use crate::keyboard::RawEvent;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;
use thiserror::Error;

/// The owner side was dropped
#[derive(Debug, Error)]
#[error("owner context is gone")]
pub struct MarshalError(pub RawEvent);

/// Create the single-consumer channel into the owner's run loop
pub fn marshal_channel() -> (Marshaler, OwnerInbox) {
    let (tx, rx) = unbounded();
    (Marshaler { tx }, OwnerInbox { rx })
}

/// Posting end held by the worker
#[derive(Clone)]
pub struct Marshaler {
    tx: Sender<RawEvent>,
}

impl Marshaler {
    /// Queue `event` for the owner and return immediately
    pub fn post(&self, event: RawEvent) -> Result<(), MarshalError> {
        self.tx.send(event).map_err(|e| MarshalError(e.into_inner()))
    }
}

/// Receiving end drained by the owner context
pub struct OwnerInbox {
    rx: Receiver<RawEvent>,
}

impl OwnerInbox {
    /// Hand every pending event to `handle`, oldest first.
    ///
    /// Returns the number of events handled.
    pub fn drain(&self, mut handle: impl FnMut(RawEvent)) -> usize {
        let mut count = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    handle(event);
                    count += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        count
    }

    /// Wait up to `timeout` for one event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RawEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
