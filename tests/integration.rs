//! Integration tests for the button simulator
//!
//! These tests run the whole pipeline: a scripted key source on the hook
//! thread, the bounded queue, the worker, the owner inbox, dedup/dispatch
//! and, in hardware mode, an in-memory button backend.

use button_sim::bindings::{BindingStore, BindingTable};
use button_sim::config::{RunMode, SimulatorConfig, UiConfig};
use button_sim::dispatch::Dispatcher;
use button_sim::error::{Error, LoadAttempt, Result};
use button_sim::keyboard::{KeyCode, KeyDescriptor, KeySource, RawEvent};
use button_sim::lifecycle::{Lifecycle, LifecycleState, Started};
use button_sim::native::{ButtonBackend, NativeLibrary, TickStats};
use button_sim::ui::App;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn press(c: char) -> RawEvent {
    RawEvent::press(KeyDescriptor::Char(c))
}

fn release(c: char) -> RawEvent {
    RawEvent::release(KeyDescriptor::Char(c))
}

/// Key source replaying one batch of events per poll
struct Script(VecDeque<Vec<RawEvent>>);

impl Script {
    fn boxed(batches: Vec<Vec<RawEvent>>) -> impl FnOnce() -> Option<Box<dyn KeySource>> + Send + 'static {
        let script = Script(batches.into());
        move || Some(Box::new(script) as Box<dyn KeySource>)
    }
}

impl KeySource for Script {
    fn name(&self) -> &'static str {
        "script"
    }

    fn poll(&mut self, out: &mut Vec<RawEvent>) {
        if let Some(batch) = self.0.pop_front() {
            out.extend(batch);
        }
    }
}

/// In-memory button library
#[derive(Default)]
struct Board {
    ticks: AtomicUsize,
    cleanups: AtomicUsize,
    stamps: Mutex<Vec<Instant>>,
    levels: Mutex<Vec<(u8, u8)>>,
}

impl ButtonBackend for Board {
    fn tick(&self) -> Result<()> {
        self.ticks.fetch_add(1, Ordering::SeqCst);
        self.stamps.lock().unwrap().push(Instant::now());
        Ok(())
    }

    fn set_key_state(&self, channel: u8, level: u8) -> Result<()> {
        self.levels.lock().unwrap().push((channel, level));
        Ok(())
    }

    fn init(&self) -> Result<i32> {
        Ok(0)
    }

    fn cleanup(&self) -> Result<()> {
        self.cleanups.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config(mode: RunMode) -> SimulatorConfig {
    SimulatorConfig {
        mode,
        worker_poll_ms: 10,
        join_timeout_ms: 1000,
        ..SimulatorConfig::default()
    }
}

fn missing_library() -> Result<Arc<dyn ButtonBackend>> {
    let candidates = vec![
        std::env::temp_dir().join("button-sim-missing/libbutton.so"),
        "libbutton-sim-missing.so".into(),
    ];
    let library = NativeLibrary::load(&candidates)?;
    Ok(Arc::new(library))
}

fn app_for(started: &Started, table: BindingTable) -> App {
    let dispatcher = match started.driver.clone() {
        Some(driver) => Dispatcher::with_driver(table, driver),
        None => Dispatcher::new(table),
    };
    let mut app = App::new(dispatcher, &UiConfig::default(), started.mode);
    if let Some(reason) = &started.fallback {
        app.mark_degraded(&reason.to_string());
    }
    app
}

/// Drain the inbox until `n` events were processed or two seconds pass
fn pump(app: &mut App, started: &Started, n: u64) {
    let deadline = Instant::now() + Duration::from_secs(2);
    while app.total_events < n && Instant::now() < deadline {
        if let Some(event) = started.inbox.recv_timeout(Duration::from_millis(10)) {
            app.process_event(&event);
        }
        app.drain(&started.inbox);
    }
}

fn audit_lines(app: &App) -> Vec<String> {
    app.board.log().iter().map(|e| e.message.clone()).collect()
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

#[test]
fn events_reach_owner_in_hook_order() {
    let mut lifecycle = Lifecycle::new(config(RunMode::Software));
    let started = lifecycle
        .start(
            missing_library,
            Script::boxed(vec![
                vec![press('a'), release('a')],
                vec![press('b')],
            ]),
        )
        .unwrap();

    let mut app = app_for(&started, BindingTable::default());
    pump(&mut app, &started, 3);

    assert_eq!(app.total_events, 3);
    assert_eq!(audit_lines(&app), vec!["press a", "release a", "press b"]);
    assert!(!app.board.is_pressed("btn1"));
    assert!(app.board.is_pressed("btn2"));

    lifecycle.shutdown().unwrap();
}

#[test]
fn burst_larger_than_queue_is_not_dropped() {
    let mut cfg = config(RunMode::Software);
    cfg.queue_capacity = 8;
    let burst: Vec<RawEvent> = (0..200)
        .map(|i| if i % 2 == 0 { press('a') } else { release('a') })
        .collect();

    let mut lifecycle = Lifecycle::new(cfg);
    let started = lifecycle
        .start(missing_library, Script::boxed(vec![burst]))
        .unwrap();

    let mut app = app_for(&started, BindingTable::default());
    pump(&mut app, &started, 200);

    assert_eq!(app.total_events, 200);
    assert_eq!(app.transitions, 200);
    lifecycle.shutdown().unwrap();
}

#[test]
fn repeated_presses_dispatch_once_through_pipeline() {
    let mut lifecycle = Lifecycle::new(config(RunMode::Software));
    let started = lifecycle
        .start(
            missing_library,
            Script::boxed(vec![vec![press('a'), press('a'), press('A')]]),
        )
        .unwrap();

    let mut app = app_for(&started, BindingTable::default());
    pump(&mut app, &started, 3);

    assert_eq!(app.total_events, 3);
    assert_eq!(app.transitions, 1);
    assert_eq!(audit_lines(&app), vec!["press a"]);
    lifecycle.shutdown().unwrap();
}

#[test]
fn scancodes_resolve_to_bindings() {
    let mut lifecycle = Lifecycle::new(config(RunMode::Software));
    // evdev KEY_A = 30
    let a = KeyDescriptor::from(KeyCode(30));
    let started = lifecycle
        .start(
            missing_library,
            Script::boxed(vec![vec![RawEvent::press(a)]]),
        )
        .unwrap();

    let mut app = app_for(&started, BindingTable::default());
    pump(&mut app, &started, 1);
    assert!(app.board.is_pressed("btn1"));
    lifecycle.shutdown().unwrap();
}

// ---------------------------------------------------------------------------
// Hardware mode
// ---------------------------------------------------------------------------

#[test]
fn hardware_mode_forwards_transitions_and_ticks() {
    let board = Arc::new(Board::default());
    let backend = Arc::clone(&board);
    let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
    let started = lifecycle
        .start(
            move || Ok(backend as Arc<dyn ButtonBackend>),
            Script::boxed(vec![
                vec![press('a'), press('a')],
                vec![press('b'), release('a')],
                vec![release('b')],
            ]),
        )
        .unwrap();

    assert_eq!(started.mode, RunMode::Hardware);
    let mut app = app_for(&started, BindingTable::default());
    assert_eq!(app.mode_label(), "hardware");
    pump(&mut app, &started, 5);

    assert_eq!(
        *board.levels.lock().unwrap(),
        vec![(0, 1), (1, 1), (0, 0), (1, 0)]
    );
    assert!(app.ticks().is_some());

    lifecycle.shutdown().unwrap();
    assert!(board.ticks.load(Ordering::SeqCst) > 0);
    assert_eq!(board.cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn tick_cadence_through_lifecycle() {
    let board = Arc::new(Board::default());
    let backend = Arc::clone(&board);
    let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
    let _started = lifecycle
        .start(move || Ok(backend as Arc<dyn ButtonBackend>), || None)
        .unwrap();

    thread::sleep(Duration::from_millis(300));
    lifecycle.shutdown().unwrap();

    let stamps = board.stamps.lock().unwrap();
    let stats = TickStats::from_timestamps(&stamps).expect("ticks recorded");
    assert!(stats.intervals >= 40, "only {} intervals", stats.intervals);
    let mean_us = stats.mean.as_micros() as i64;
    assert!((mean_us - 5000).abs() <= 1000, "mean interval {}us", mean_us);
}

// ---------------------------------------------------------------------------
// Degradation and shutdown
// ---------------------------------------------------------------------------

#[test]
fn missing_library_degrades_to_software() {
    let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
    let started = lifecycle
        .start(missing_library, Script::boxed(vec![vec![press('a')]]))
        .unwrap();

    assert_eq!(started.mode, RunMode::Software);
    assert!(started.driver.is_none());
    match &started.fallback {
        Some(Error::LibraryUnavailable { attempts }) => assert_eq!(attempts.len(), 2),
        other => panic!("expected LibraryUnavailable, got {:?}", other),
    }

    let mut app = app_for(&started, BindingTable::default());
    assert_eq!(app.mode_label(), "software (hardware unavailable)");
    pump(&mut app, &started, 1);
    assert!(app.board.is_pressed("btn1"));
    assert_eq!(app.ticks(), None);

    lifecycle.shutdown().unwrap();
}

#[test]
fn shutdown_twice_releases_native_once() {
    let board = Arc::new(Board::default());
    let backend = Arc::clone(&board);
    let mut lifecycle = Lifecycle::new(config(RunMode::Hardware));
    let started = lifecycle
        .start(move || Ok(backend as Arc<dyn ButtonBackend>), || None)
        .unwrap();

    lifecycle.shutdown().unwrap();
    lifecycle.shutdown().unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);

    drop(started);
    drop(lifecycle);
    assert_eq!(board.cleanups.load(Ordering::SeqCst), 1);
}

#[test]
fn stuck_tick_does_not_block_shutdown() {
    struct Stuck;

    impl ButtonBackend for Stuck {
        fn tick(&self) -> Result<()> {
            thread::sleep(Duration::from_millis(400));
            Ok(())
        }

        fn set_key_state(&self, _channel: u8, _level: u8) -> Result<()> {
            Ok(())
        }
    }

    let mut cfg = config(RunMode::Hardware);
    cfg.join_timeout_ms = 50;
    let mut lifecycle = Lifecycle::new(cfg);
    let _started = lifecycle
        .start(|| Ok(Arc::new(Stuck) as Arc<dyn ButtonBackend>), || None)
        .unwrap();
    thread::sleep(Duration::from_millis(20));

    let begin = Instant::now();
    let result = lifecycle.shutdown();
    assert!(matches!(result, Err(Error::ShutdownTimeout { .. })));
    assert!(begin.elapsed() < Duration::from_millis(400));
    assert_eq!(lifecycle.state(), LifecycleState::Stopped);
    assert!(lifecycle.shutdown().is_ok());
}

// ---------------------------------------------------------------------------
// Bindings
// ---------------------------------------------------------------------------

#[test]
fn rebind_collision_is_rejected_and_persisted_table_unchanged() {
    let path = std::env::temp_dir().join(format!(
        "button-sim-integration-{}.json",
        std::process::id()
    ));
    let store = BindingStore::new(&path);
    store.save(&BindingTable::default()).unwrap();

    let mut table = store.load_or_default();
    let err = table.rebind("btn2", "a").unwrap_err();
    assert!(matches!(err, Error::InvalidBinding(_)));
    assert_eq!(table.get("btn1").unwrap().key, 'a');
    assert_eq!(table.get("btn2").unwrap().key, 'b');

    table.rebind("btn2", "c").unwrap();
    store.save(&table).unwrap();
    assert_eq!(store.load().unwrap().get("btn2").unwrap().key, 'c');

    let _ = std::fs::remove_file(&path);
}

#[test]
fn load_attempt_reports_candidate() {
    let attempt = LoadAttempt {
        candidate: "output/libbutton.so".into(),
        reason: "cannot open shared object file".to_string(),
    };
    assert_eq!(
        attempt.to_string(),
        "output/libbutton.so: cannot open shared object file"
    );
}
