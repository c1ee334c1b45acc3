//! Fixed-cadence tick loop
//!
//! Each period the loop calls `tick()`, sleeps for most of the time left
//! until the next deadline, then spins for the remainder. Deadlines advance
//! by exactly one interval so scheduling error does not accumulate. The spin
//! keeps jitter well under a millisecond at the cost of one busy core for
//! a fraction of each period; it only ever runs on the tick thread.

use super::{guarded, ButtonBackend};
use crate::error::{Error, Result};
use crate::utils::{join_within, MinMaxExt};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Below this much remaining time the loop only spins
const SLEEP_THRESHOLD: Duration = Duration::from_millis(1);

/// Share of the remaining time handed to the OS sleep
const SLEEP_FRACTION: f64 = 0.95;

/// Deadline bookkeeping of the tick thread
#[derive(Debug, Clone, Copy)]
pub struct TickSchedule {
    interval: Duration,
    next_deadline: Instant,
}

impl TickSchedule {
    /// First deadline is one interval after `start`
    pub fn new(start: Instant, interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: start + interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn next_deadline(&self) -> Instant {
        self.next_deadline
    }

    /// Time left until the next deadline as seen at `now`
    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_deadline.saturating_duration_since(now)
    }

    /// Portion of `remaining` to sleep; zero when it should spin only
    pub fn sleep_for(remaining: Duration) -> Duration {
        if remaining > SLEEP_THRESHOLD {
            remaining.mul_f64(SLEEP_FRACTION)
        } else {
            Duration::ZERO
        }
    }

    /// Block until the next deadline
    pub fn wait(&self) {
        let nap = Self::sleep_for(self.remaining(Instant::now()));
        if !nap.is_zero() {
            thread::sleep(nap);
        }
        while Instant::now() < self.next_deadline {
            std::hint::spin_loop();
        }
    }

    /// Move the deadline forward by exactly one interval
    pub fn advance(&mut self) {
        self.next_deadline += self.interval;
    }
}

/// Holds the platform's high-resolution timer mode while alive
pub struct TimerResolution {
    #[cfg(windows)]
    active: bool,
}

#[cfg(windows)]
#[link(name = "winmm")]
extern "system" {
    fn timeBeginPeriod(period_ms: u32) -> u32;
    fn timeEndPeriod(period_ms: u32) -> u32;
}

impl TimerResolution {
    #[cfg(windows)]
    pub fn acquire() -> Self {
        // SAFETY: plain winmm call; paired with timeEndPeriod in Drop.
        let active = unsafe { timeBeginPeriod(1) } == 0;
        if !active {
            log::warn!("timeBeginPeriod(1) failed, tick jitter may increase");
        }
        Self { active }
    }

    #[cfg(not(windows))]
    pub fn acquire() -> Self {
        Self {}
    }
}

impl Drop for TimerResolution {
    fn drop(&mut self) {
        #[cfg(windows)]
        if self.active {
            // SAFETY: matches the successful timeBeginPeriod(1) above.
            unsafe {
                timeEndPeriod(1);
            }
        }
    }
}

/// Dedicated thread calling `tick()` every interval
pub struct TickLoop {
    handle: Option<JoinHandle<()>>,
    stop: Arc<AtomicBool>,
    ticks: Arc<AtomicU64>,
}

impl TickLoop {
    pub fn start(backend: Arc<dyn ButtonBackend>, interval: Duration) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let ticks = Arc::new(AtomicU64::new(0));

        let handle = {
            let stop = Arc::clone(&stop);
            let ticks = Arc::clone(&ticks);
            thread::Builder::new()
                .name("button-tick".to_string())
                .spawn(move || run(backend, interval, stop, ticks))
                .map_err(|source| Error::Spawn {
                    context: "tick",
                    source,
                })?
        };

        Ok(Self {
            handle: Some(handle),
            stop,
            ticks,
        })
    }

    /// Completed `tick()` calls so far
    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    /// Shared counter, readable without touching the loop
    pub fn counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.ticks)
    }

    /// False once the loop exited, whether stopped or after a failed tick
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the loop and join it within `timeout`. Later calls are no-ops.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        match self.handle.take() {
            Some(handle) => join_within(handle, timeout, "tick loop"),
            None => Ok(()),
        }
    }
}

fn run(backend: Arc<dyn ButtonBackend>, interval: Duration, stop: Arc<AtomicBool>, ticks: Arc<AtomicU64>) {
    let _timer = TimerResolution::acquire();
    let mut schedule = TickSchedule::new(Instant::now(), interval);
    log::info!("Tick loop started ({:?} period)", interval);

    while !stop.load(Ordering::Acquire) {
        if let Err(e) = guarded("tick", || backend.tick()) {
            log::error!("Tick failed, stopping tick loop: {}", e);
            break;
        }
        ticks.fetch_add(1, Ordering::Relaxed);

        schedule.wait();
        schedule.advance();
    }

    log::info!("Tick loop exited after {} tick(s)", ticks.load(Ordering::Relaxed));
}

/// Interval statistics over a series of tick timestamps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickStats {
    /// Number of intervals measured
    pub intervals: usize,
    pub mean: Duration,
    pub min: Duration,
    pub max: Duration,
}

impl TickStats {
    /// `None` with fewer than two timestamps
    pub fn from_timestamps(stamps: &[Instant]) -> Option<Self> {
        if stamps.len() < 2 {
            return None;
        }

        let mut min = None;
        let mut max = None;
        for pair in stamps.windows(2) {
            let gap = pair[1].saturating_duration_since(pair[0]);
            min.update_min(gap);
            max.update_max(gap);
        }

        let intervals = stamps.len() - 1;
        let total = stamps[intervals].saturating_duration_since(stamps[0]);
        Some(Self {
            intervals,
            mean: total / intervals as u32,
            min: min?,
            max: max?,
        })
    }
}
