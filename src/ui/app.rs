//! Owner-context application state

use crate::bindings::{BindingStore, BindingTable, KeyBinding};
use crate::config::{RunMode, Theme, UiConfig};
use crate::dispatch::{DispatchObserver, Dispatcher};
use crate::error::{Error, Result};
use crate::keyboard::RawEvent;
use crate::pipeline::OwnerInbox;
use chrono::{DateTime, Local};
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

/// Current view of the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Buttons,
    Help,
}

impl AppView {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Buttons => "Buttons",
            Self::Help => "Help",
        }
    }
}

/// Application running state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Running,
    Quitting,
}

/// One line of the log pane
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub message: String,
}

impl LogEntry {
    pub fn timestamp(&self) -> String {
        self.time.format("%H:%M:%S%.3f").to_string()
    }
}

/// Visual state the dispatcher reports into
#[derive(Debug)]
pub struct ButtonBoard {
    pressed: HashMap<String, bool>,
    log: VecDeque<LogEntry>,
    log_capacity: usize,
    logged: u64,
}

impl ButtonBoard {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            pressed: HashMap::new(),
            log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            logged: 0,
        }
    }

    pub fn is_pressed(&self, id: &str) -> bool {
        self.pressed.get(id).copied().unwrap_or(false)
    }

    /// Log lines, oldest first
    pub fn log(&self) -> &VecDeque<LogEntry> {
        &self.log
    }

    /// Lines ever pushed, including those already evicted
    pub fn logged(&self) -> u64 {
        self.logged
    }

    /// Lines pushed after the first `seen`, oldest first
    pub fn since(&self, seen: u64) -> impl Iterator<Item = &LogEntry> {
        let fresh = self.logged.saturating_sub(seen).min(self.log.len() as u64) as usize;
        self.log.iter().skip(self.log.len() - fresh)
    }

    /// Append a line to the log pane
    pub fn push_log(&mut self, message: impl Into<String>) {
        self.logged += 1;
        if self.log.len() == self.log_capacity {
            self.log.pop_front();
        }
        self.log.push_back(LogEntry {
            time: Local::now(),
            message: message.into(),
        });
    }
}

impl DispatchObserver for ButtonBoard {
    fn button_changed(&mut self, binding: &KeyBinding, pressed: bool) {
        self.pressed.insert(binding.id.clone(), pressed);
    }

    fn audit(&mut self, message: &str) {
        self.push_log(message);
    }
}

/// Main application
pub struct App {
    /// Current view
    pub view: AppView,
    /// Application state
    pub state: AppState,
    /// Active color theme
    pub theme: Theme,
    /// Effective run mode
    pub mode: RunMode,
    /// Hardware was requested but could not be entered
    pub degraded: bool,
    /// Button states and log lines
    pub board: ButtonBoard,
    /// Events received from the pipeline
    pub total_events: u64,
    /// Events that changed a key's state
    pub transitions: u64,
    /// Application start time
    pub start_time: Instant,
    dispatcher: Dispatcher,
    store: Option<BindingStore>,
    /// Table differs from what was last written through `store`
    dirty: bool,
    /// Index of the binding the rebind prompt is editing
    rebind_target: Option<usize>,
    status_message: Option<String>,
    status_time: Option<Instant>,
}

impl App {
    pub fn new(dispatcher: Dispatcher, ui: &UiConfig, mode: RunMode) -> Self {
        Self {
            view: AppView::Buttons,
            state: AppState::Running,
            theme: ui.theme,
            mode,
            degraded: false,
            board: ButtonBoard::new(ui.log_lines),
            total_events: 0,
            transitions: 0,
            start_time: Instant::now(),
            dispatcher,
            store: None,
            dirty: false,
            rebind_target: None,
            status_message: None,
            status_time: None,
        }
    }

    /// Persist the binding table through `store` on save
    pub fn with_store(mut self, store: BindingStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Record that hardware mode fell back to software
    pub fn mark_degraded(&mut self, reason: &str) {
        self.degraded = true;
        self.notice(format!("Hardware unavailable, running in software mode: {}", reason));
    }

    /// Dispatch one marshaled event
    pub fn process_event(&mut self, event: &RawEvent) {
        self.total_events += 1;
        if self.dispatcher.ingest(event, &mut self.board).is_some() {
            self.transitions += 1;
        }
    }

    /// Dispatch everything pending in `inbox`, in arrival order
    pub fn drain(&mut self, inbox: &OwnerInbox) -> usize {
        inbox.drain(|event| self.process_event(&event))
    }

    /// Show `message` in the log pane and the status bar
    pub fn notice(&mut self, message: String) {
        self.board.push_log(message.clone());
        self.set_status(message);
    }

    pub fn bindings(&self) -> &BindingTable {
        self.dispatcher.bindings()
    }

    /// Write the binding table back if an in-session rebind left it unsaved.
    ///
    /// A table that was never changed here is not written, so edits made to
    /// the file by another process survive.
    pub fn save_bindings(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(store) = &self.store {
            store.save(self.dispatcher.bindings())?;
        }
        self.dirty = false;
        Ok(())
    }

    pub fn has_unsaved_bindings(&self) -> bool {
        self.dirty
    }

    /// Rebind button `id` and write the table back.
    ///
    /// Rejections and save failures are reported through [`App::notice`].
    pub fn rebind(&mut self, id: &str, key: &str) -> Result<char> {
        let key = match self.dispatcher.rebind(id, key) {
            Ok(key) => key,
            Err(e) => {
                self.notice(e.to_string());
                return Err(e);
            }
        };
        self.dirty = true;
        if let Err(e) = self.save_bindings() {
            self.notice(format!("Bound {} to {} but saving failed: {}", id, key, e));
            return Err(e);
        }
        self.notice(format!("Bound {} to {}", id, key));
        Ok(key)
    }

    /// Open the rebind prompt on the first binding
    pub fn begin_rebind(&mut self) {
        if !self.bindings().is_empty() {
            self.rebind_target = Some(0);
        }
    }

    pub fn is_rebinding(&self) -> bool {
        self.rebind_target.is_some()
    }

    /// Binding the prompt is editing
    pub fn rebind_target(&self) -> Option<&KeyBinding> {
        self.rebind_target
            .and_then(|index| self.bindings().iter().nth(index))
    }

    /// Move the prompt to the next binding, wrapping around
    pub fn next_rebind_target(&mut self) {
        let count = self.bindings().len();
        if let Some(index) = self.rebind_target.as_mut() {
            *index = (*index + 1) % count.max(1);
        }
    }

    pub fn cancel_rebind(&mut self) {
        self.rebind_target = None;
    }

    /// Bind the prompted button to `key`; the prompt stays open on rejection
    pub fn finish_rebind(&mut self, key: char) -> Result<char> {
        let id = match self.rebind_target() {
            Some(binding) => binding.id.clone(),
            None => return Err(Error::InvalidBinding("no button selected".to_string())),
        };
        let bound = self.rebind(&id, &key.to_string())?;
        self.rebind_target = None;
        Ok(bound)
    }

    /// Prompt text while rebinding
    pub fn prompt(&self) -> Option<String> {
        self.rebind_target().map(|binding| {
            format!(
                "Rebind {} (now {}): press a letter, Tab next button, Esc cancel",
                binding.id, binding.key
            )
        })
    }

    /// Ticks completed by the native driver, if one is attached
    pub fn ticks(&self) -> Option<u64> {
        self.dispatcher.driver().map(|driver| driver.ticks())
    }

    /// Text of the mode indicator
    pub fn mode_label(&self) -> &'static str {
        match (self.mode, self.degraded) {
            (RunMode::Hardware, _) => "hardware",
            (RunMode::Software, false) => "software",
            (RunMode::Software, true) => "software (hardware unavailable)",
        }
    }

    pub fn toggle_theme(&mut self) {
        self.theme = match self.theme {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        };
    }

    pub fn toggle_help(&mut self) {
        self.view = match self.view {
            AppView::Buttons => AppView::Help,
            AppView::Help => AppView::Buttons,
        };
    }

    /// Request quit
    pub fn quit(&mut self) {
        self.state = AppState::Quitting;
    }

    /// Set a status message
    pub fn set_status(&mut self, message: String) {
        self.status_message = Some(message);
        self.status_time = Some(Instant::now());
    }

    /// Get status message if still valid (within 3 seconds)
    pub fn get_status(&self) -> Option<&str> {
        match (&self.status_message, self.status_time) {
            (Some(msg), Some(time)) if time.elapsed().as_secs() < 3 => Some(msg),
            _ => None,
        }
    }

    /// Get elapsed time formatted
    pub fn elapsed_formatted(&self) -> String {
        let secs = self.start_time.elapsed().as_secs();
        format!("{:02}:{:02}", secs / 60, secs % 60)
    }
}
