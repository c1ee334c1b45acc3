//! Hook thread: polls a key source and feeds the event queue

use super::{KeySource, RawEvent};
use crate::error::Result;
use crate::pipeline::EventSender;
use crate::utils::join_within;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Running keyboard hook
pub struct HookThread {
    handle: Option<JoinHandle<()>>,
    suppress: Arc<AtomicBool>,
}

impl HookThread {
    /// Start the hook.
    ///
    /// `make_source` runs on the hook thread, since platform input handles are
    /// not always `Send`. If it yields no source the thread logs and exits.
    pub fn spawn<F>(make_source: F, sender: EventSender, poll: Duration) -> io::Result<Self>
    where
        F: FnOnce() -> Option<Box<dyn KeySource>> + Send + 'static,
    {
        let suppress = Arc::new(AtomicBool::new(false));
        let thread_suppress = Arc::clone(&suppress);
        let handle = thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || match make_source() {
                Some(source) => run(source, sender, thread_suppress, poll),
                None => log::error!("No keyboard source available, key events disabled"),
            })?;
        Ok(Self {
            handle: Some(handle),
            suppress,
        })
    }

    /// Suppress further delivery and join the thread within `timeout`.
    ///
    /// Later calls are no-ops.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.suppress.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => join_within(handle, timeout, "keyboard hook"),
            None => Ok(()),
        }
    }

    pub fn is_suppressed(&self) -> bool {
        self.suppress.load(Ordering::Acquire)
    }
}

fn run(mut source: Box<dyn KeySource>, sender: EventSender, suppress: Arc<AtomicBool>, poll: Duration) {
    log::info!("Keyboard hook started ({})", source.name());
    let mut batch: Vec<RawEvent> = Vec::new();

    'hook: while !suppress.load(Ordering::Acquire) {
        source.poll(&mut batch);
        for event in batch.drain(..) {
            if suppress.load(Ordering::Acquire) {
                break 'hook;
            }
            if let Err(closed) = sender.enqueue(event) {
                log::debug!("Hook dropped {:?}: {}", closed.0, closed);
                break 'hook;
            }
        }
        if !poll.is_zero() {
            thread::sleep(poll);
        }
    }

    log::info!("Keyboard hook stopped");
}
