//! Lifecycle controller
//!
//! Startup order: native library, tick thread, keyboard hook, worker.
//! Shutdown order: running flag, hook, worker, native driver. Every join is
//! bounded; a context that does not stop in time is logged and skipped.

use crate::config::{RunMode, SimulatorConfig};
use crate::error::{Error, Result};
use crate::keyboard::{HookThread, KeySource};
use crate::native::{ButtonBackend, NativeDriver};
use crate::pipeline::{event_queue, marshal_channel, EventSender, OwnerInbox, Worker};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Linear lifecycle; no state is entered twice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

/// What the owner context needs once everything is running
pub struct Started {
    /// Events marshaled to the owner, in hook order
    pub inbox: OwnerInbox,
    /// Present in hardware mode
    pub driver: Option<Arc<NativeDriver>>,
    /// Effective mode after any fallback
    pub mode: RunMode,
    /// Why hardware mode was requested but not entered
    pub fallback: Option<Error>,
}

/// Starts and stops the background contexts
pub struct Lifecycle {
    config: SimulatorConfig,
    state: LifecycleState,
    mode: RunMode,
    running: Arc<AtomicBool>,
    sender: Option<EventSender>,
    hook: Option<HookThread>,
    worker: Option<Worker>,
    driver: Option<Arc<NativeDriver>>,
}

impl Lifecycle {
    pub fn new(config: SimulatorConfig) -> Self {
        let mode = config.mode;
        Self {
            config,
            state: LifecycleState::Created,
            mode,
            running: Arc::new(AtomicBool::new(false)),
            sender: None,
            hook: None,
            worker: None,
            driver: None,
        }
    }

    /// Bring the pipeline up.
    ///
    /// `load_backend` is only called in hardware mode; if it fails the
    /// controller continues in software mode and reports the error in
    /// [`Started::fallback`]. `make_source` runs on the hook thread.
    pub fn start<L, S>(&mut self, load_backend: L, make_source: S) -> Result<Started>
    where
        L: FnOnce() -> Result<Arc<dyn ButtonBackend>>,
        S: FnOnce() -> Option<Box<dyn KeySource>> + Send + 'static,
    {
        if self.state != LifecycleState::Created {
            return Err(Error::InvalidTransition {
                action: "start",
                state: self.state.as_str(),
            });
        }
        self.state = LifecycleState::Starting;

        match self.start_contexts(load_backend, make_source) {
            Ok(started) => {
                self.state = LifecycleState::Running;
                log::info!("Simulator running in {} mode", self.mode.as_str());
                Ok(started)
            }
            Err(e) => {
                log::error!("Startup failed: {}", e);
                if let Err(cleanup) = self.shutdown() {
                    log::error!("Teardown after failed startup: {}", cleanup);
                }
                Err(e)
            }
        }
    }

    fn start_contexts<L, S>(&mut self, load_backend: L, make_source: S) -> Result<Started>
    where
        L: FnOnce() -> Result<Arc<dyn ButtonBackend>>,
        S: FnOnce() -> Option<Box<dyn KeySource>> + Send + 'static,
    {
        let mut fallback = None;
        if self.mode.is_hardware() {
            match load_backend() {
                Ok(backend) => {
                    let driver = Arc::new(NativeDriver::new(backend, self.config.join_timeout()));
                    self.driver = Some(Arc::clone(&driver));
                    driver.start_tick_loop(self.config.tick_interval())?;
                }
                Err(e) => {
                    log::warn!("Hardware mode unavailable, falling back to software: {}", e);
                    self.mode = RunMode::Software;
                    fallback = Some(e);
                }
            }
        }

        self.running.store(true, Ordering::Release);
        let (sender, receiver) = event_queue(self.config.queue_capacity);
        let (marshaler, inbox) = marshal_channel();
        self.sender = Some(sender.clone());

        let hook = HookThread::spawn(make_source, sender, self.config.hook_poll())
            .map_err(|source| Error::Spawn {
                context: "keyboard hook",
                source,
            })?;
        self.hook = Some(hook);

        let worker = Worker::spawn(
            receiver,
            marshaler,
            Arc::clone(&self.running),
            self.config.worker_poll(),
        )
        .map_err(|source| Error::Spawn {
            context: "event worker",
            source,
        })?;
        self.worker = Some(worker);

        Ok(Started {
            inbox,
            driver: self.driver.clone(),
            mode: self.mode,
            fallback,
        })
    }

    /// Stop every context. Only the first call does any work.
    ///
    /// Each step runs even if an earlier one timed out; the first failure is
    /// returned once everything has been attempted.
    pub fn shutdown(&mut self) -> Result<()> {
        match self.state {
            LifecycleState::Stopping | LifecycleState::Stopped => return Ok(()),
            LifecycleState::Created => {
                self.state = LifecycleState::Stopped;
                return Ok(());
            }
            LifecycleState::Starting | LifecycleState::Running => {}
        }
        self.state = LifecycleState::Stopping;
        log::info!("Shutting down");

        let timeout = self.config.join_timeout();
        let mut first_error: Option<Error> = None;
        let mut record = |result: Result<()>| {
            if let Err(e) = result {
                log::error!("{}", e);
                first_error.get_or_insert(e);
            }
        };

        self.running.store(false, Ordering::Release);
        if let Some(sender) = self.sender.take() {
            sender.close();
        }
        if let Some(mut hook) = self.hook.take() {
            record(hook.stop(timeout));
        }
        if let Some(mut worker) = self.worker.take() {
            record(worker.join(timeout));
        }
        if let Some(driver) = self.driver.take() {
            record(driver.shutdown());
        }

        self.state = LifecycleState::Stopped;
        log::info!("Shutdown complete");
        first_error.map_or(Ok(()), Err)
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Effective run mode
    pub fn mode(&self) -> RunMode {
        self.mode
    }
}

impl Drop for Lifecycle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::error!("Shutdown on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadAttempt;
    use crate::keyboard::{KeyDescriptor, RawEvent};
    use std::cell::Cell;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::{Duration, Instant};

    #[derive(Default)]
    struct Backend {
        ticks: AtomicUsize,
        cleanups: AtomicUsize,
    }

    impl ButtonBackend for Backend {
        fn tick(&self) -> Result<()> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn set_key_state(&self, _channel: u8, _level: u8) -> Result<()> {
            Ok(())
        }

        fn cleanup(&self) -> Result<()> {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct OneShot(Option<RawEvent>);

    impl KeySource for OneShot {
        fn name(&self) -> &'static str {
            "one-shot"
        }

        fn poll(&mut self, out: &mut Vec<RawEvent>) {
            out.extend(self.0.take());
        }
    }

    fn config(mode: RunMode) -> SimulatorConfig {
        SimulatorConfig {
            mode,
            worker_poll_ms: 10,
            join_timeout_ms: 500,
            ..SimulatorConfig::default()
        }
    }

    fn no_source() -> Option<Box<dyn KeySource>> {
        None
    }

    fn unavailable() -> Result<Arc<dyn ButtonBackend>> {
        Err(Error::LibraryUnavailable {
            attempts: vec![LoadAttempt {
                candidate: "output/libbutton.so".into(),
                reason: "not found".to_string(),
            }],
        })
    }

    #[test]
    fn software_start_and_shutdown() {
        let mut lifecycle = Lifecycle::new(config(RunMode::Software));
        assert_eq!(lifecycle.state(), LifecycleState::Created);

        let loaded = Cell::new(false);
        let started = lifecycle
            .start(
                || {
                    loaded.set(true);
                    unavailable()
                },
                no_source,
            )
            .unwrap();

        assert!(!loaded.get());
        assert_eq!(started.mode, RunMode::Software);
        assert!(started.driver.is_none());
        assert!(started.fallback.is_none());
        assert_eq!(lifecycle.state(), LifecycleState::Running);

        lifecycle.shutdown().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }

    #[test]
    fn hardware_falls_back_when_library_unavailable() {
        let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
        let started = lifecycle.start(unavailable, no_source).unwrap();

        assert_eq!(started.mode, RunMode::Software);
        assert_eq!(lifecycle.mode(), RunMode::Software);
        assert!(started.driver.is_none());
        assert!(matches!(started.fallback, Some(Error::LibraryUnavailable { .. })));
        lifecycle.shutdown().unwrap();
    }

    #[test]
    fn hardware_runs_tick_loop_until_shutdown() {
        let backend = Arc::new(Backend::default());
        let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
        let handle = Arc::clone(&backend);
        let started = lifecycle
            .start(move || Ok(handle as Arc<dyn ButtonBackend>), no_source)
            .unwrap();

        let driver = started.driver.expect("driver in hardware mode");
        assert_eq!(started.mode, RunMode::Hardware);
        let deadline = Instant::now() + Duration::from_secs(2);
        while backend.ticks.load(Ordering::SeqCst) < 5 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(driver.is_ticking());

        lifecycle.shutdown().unwrap();
        assert!(!driver.is_ticking());
        assert!(driver.is_released());

        lifecycle.shutdown().unwrap();
        drop(driver);
        assert_eq!(backend.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn events_reach_the_inbox() {
        let mut lifecycle = Lifecycle::new(config(RunMode::Software));
        let event = RawEvent::press(KeyDescriptor::Char('a'));
        let source = OneShot(Some(event.clone()));
        let started = lifecycle
            .start(unavailable, move || Some(Box::new(source) as Box<dyn KeySource>))
            .unwrap();

        assert_eq!(started.inbox.recv_timeout(Duration::from_secs(2)), Some(event));
        lifecycle.shutdown().unwrap();
    }

    #[test]
    fn start_is_not_reentrant() {
        let mut lifecycle = Lifecycle::new(config(RunMode::Software));
        let _started = lifecycle.start(unavailable, no_source).unwrap();
        assert!(matches!(
            lifecycle.start(unavailable, no_source),
            Err(Error::InvalidTransition { action: "start", state: "running" })
        ));

        lifecycle.shutdown().unwrap();
        assert!(lifecycle.start(unavailable, no_source).is_err());
    }

    #[test]
    fn shutdown_before_start_and_twice() {
        let mut lifecycle = Lifecycle::new(config(RunMode::Software));
        lifecycle.shutdown().unwrap();
        lifecycle.shutdown().unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    }
}
