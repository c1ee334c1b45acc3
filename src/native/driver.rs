//! Native tick driver: owns the backend, its tick thread and release

use super::{guarded, ButtonBackend, TickLoop, LEVEL_PRESSED, LEVEL_RELEASED};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Driver for one button backend.
///
/// Shared between the owner context (press/release) and the lifecycle
/// controller (start/shutdown); every method takes `&self`.
pub struct NativeDriver {
    backend: Arc<dyn ButtonBackend>,
    tick: Mutex<Option<TickLoop>>,
    ticks: Arc<AtomicU64>,
    released: AtomicBool,
    join_timeout: Duration,
}

impl NativeDriver {
    /// Wrap `backend` and run its optional `init`.
    ///
    /// A non-zero init status is logged and otherwise ignored.
    pub fn new(backend: Arc<dyn ButtonBackend>, join_timeout: Duration) -> Self {
        match guarded("init", || backend.init()) {
            Ok(0) => log::info!("Button library initialized"),
            Ok(status) => log::warn!("Button library init returned {}, continuing", status),
            Err(Error::OptionalSymbolMissing(name)) => {
                log::debug!("Button library has no `{}` entry point", name)
            }
            Err(e) => log::warn!("Button library init failed: {}, continuing", e),
        }

        Self {
            backend,
            tick: Mutex::new(None),
            ticks: Arc::new(AtomicU64::new(0)),
            released: AtomicBool::new(false),
            join_timeout,
        }
    }

    /// Start the tick thread. Does nothing if it is already running.
    pub fn start_tick_loop(&self, interval: Duration) -> Result<()> {
        self.ensure_live("tick")?;
        let mut slot = self.lock_tick();
        if slot.as_ref().is_some_and(TickLoop::is_running) {
            return Ok(());
        }

        if let Some(dead) = slot.take() {
            self.ticks.store(dead.ticks(), Ordering::Relaxed);
        }
        let tick_loop = TickLoop::start(Arc::clone(&self.backend), interval)?;
        // Carry the count over so it keeps growing across restarts.
        tick_loop
            .counter()
            .fetch_add(self.ticks.load(Ordering::Relaxed), Ordering::Relaxed);
        *slot = Some(tick_loop);
        Ok(())
    }

    /// Forward a press or release of `channel` to the library
    pub fn set_state(&self, channel: u8, pressed: bool) -> Result<()> {
        self.ensure_live("set_key_state")?;
        let level = if pressed { LEVEL_PRESSED } else { LEVEL_RELEASED };
        guarded("set_key_state", || self.backend.set_key_state(channel, level))
    }

    /// Stop the tick thread, then run the optional `cleanup`.
    ///
    /// Only the first call does anything. If the tick thread does not join
    /// in time, `cleanup` is skipped and [`Error::ShutdownTimeout`] returned.
    pub fn shutdown(&self) -> Result<()> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let tick_loop = self.lock_tick().take();
        if let Some(mut tick_loop) = tick_loop {
            let stopped = tick_loop.stop(self.join_timeout);
            self.ticks.store(tick_loop.ticks(), Ordering::Relaxed);
            stopped?;
        }

        match guarded("cleanup", || self.backend.cleanup()) {
            Ok(()) => log::info!("Button library cleaned up"),
            Err(Error::OptionalSymbolMissing(_)) => {}
            Err(e) => log::warn!("Button library cleanup failed: {}", e),
        }
        Ok(())
    }

    /// Completed ticks, including those of an already stopped loop
    pub fn ticks(&self) -> u64 {
        match self.lock_tick().as_ref() {
            Some(tick_loop) => tick_loop.ticks(),
            None => self.ticks.load(Ordering::Relaxed),
        }
    }

    pub fn is_ticking(&self) -> bool {
        self.lock_tick().as_ref().is_some_and(TickLoop::is_running)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn ensure_live(&self, call: &'static str) -> Result<()> {
        if self.is_released() {
            return Err(Error::NativeCallFailed {
                call,
                reason: "driver already shut down".to_string(),
            });
        }
        Ok(())
    }

    fn lock_tick(&self) -> std::sync::MutexGuard<'_, Option<TickLoop>> {
        // The slot holds no invariant a panicking holder could break.
        self.tick.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for NativeDriver {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Native driver shutdown on drop: {}", e);
        }
    }
}
