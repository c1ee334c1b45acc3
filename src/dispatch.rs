//! Key event dedup and dispatch
//!
//! Runs on the owner context only. Each raw event is reduced to a lowercase
//! printable character; repeats of the state a key is already in are dropped,
//! and genuine transitions fan out to every binding on that key.

use crate::bindings::{BindingTable, KeyBinding};
use crate::error::Result;
use crate::keyboard::{KeyState, RawEvent};
use crate::native::NativeDriver;
use std::sync::Arc;

/// Outward calls made for each actionable event
pub trait DispatchObserver {
    /// A bound button changed state
    fn button_changed(&mut self, binding: &KeyBinding, pressed: bool);

    /// Audit line such as `press a`
    fn audit(&mut self, message: &str);
}

/// An event that changed a key's recorded state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub key: char,
    pub pressed: bool,
    /// Bindings the transition was dispatched to
    pub matched: usize,
}

/// Dedup/dispatch state owned by the owner context
pub struct Dispatcher {
    key_state: KeyState,
    bindings: BindingTable,
    driver: Option<Arc<NativeDriver>>,
    native_failures: u64,
}

impl Dispatcher {
    /// Software-mode dispatcher over `bindings`
    pub fn new(bindings: BindingTable) -> Self {
        Self {
            key_state: KeyState::new(),
            bindings,
            driver: None,
            native_failures: 0,
        }
    }

    /// Hardware mode: forward transitions to `driver`
    pub fn with_driver(bindings: BindingTable, driver: Arc<NativeDriver>) -> Self {
        let mut dispatcher = Self::new(bindings);
        dispatcher.driver = Some(driver);
        dispatcher
    }

    pub fn is_hardware(&self) -> bool {
        self.driver.is_some()
    }

    pub fn driver(&self) -> Option<&Arc<NativeDriver>> {
        self.driver.as_ref()
    }

    /// Feed one raw event.
    ///
    /// Returns the transition when the event was actionable, `None` when it
    /// was not a printable key or repeated the key's current state.
    pub fn ingest(&mut self, event: &RawEvent, observer: &mut dyn DispatchObserver) -> Option<Transition> {
        let key = event.key.printable_char()?;
        let pressed = event.kind.is_press();
        if !self.key_state.transition(key, pressed) {
            return None;
        }

        let mut matched = 0;
        for binding in self.bindings.matching(key) {
            matched += 1;
            observer.button_changed(binding, pressed);

            if let Some(driver) = &self.driver {
                log::info!(
                    "{} => channel {} ({})",
                    binding.id,
                    binding.channel,
                    event.kind.verb()
                );
                if let Err(e) = driver.set_state(binding.channel, pressed) {
                    self.native_failures += 1;
                    log::error!("Hardware control failed for {}: {}", binding.id, e);
                }
            }

            let line = format!("{} {}", event.kind.verb(), key);
            log::info!("{}", line);
            observer.audit(&line);
        }

        Some(Transition {
            key,
            pressed,
            matched,
        })
    }

    /// Rebind button `id`; see [`BindingTable::rebind`]
    pub fn rebind(&mut self, id: &str, key: &str) -> Result<char> {
        let key = self.bindings.rebind(id, key)?;
        log::info!("Bound {} to {}", id, key);
        Ok(key)
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn key_state(&self) -> &KeyState {
        &self.key_state
    }

    /// `set_key_state` calls that failed so far
    pub fn native_failures(&self) -> u64 {
        self.native_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::ButtonColor;
    use crate::error::Error;
    use crate::keyboard::KeyDescriptor;
    use crate::native::ButtonBackend;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        changes: Vec<(String, bool)>,
        audit: Vec<String>,
    }

    impl DispatchObserver for Recorder {
        fn button_changed(&mut self, binding: &KeyBinding, pressed: bool) {
            self.changes.push((binding.id.clone(), pressed));
        }

        fn audit(&mut self, message: &str) {
            self.audit.push(message.to_string());
        }
    }

    #[derive(Default)]
    struct Backend {
        calls: Mutex<Vec<(u8, u8)>>,
        fail: bool,
    }

    impl ButtonBackend for Backend {
        fn tick(&self) -> Result<()> {
            Ok(())
        }

        fn set_key_state(&self, channel: u8, level: u8) -> Result<()> {
            if self.fail {
                return Err(Error::NativeCallFailed {
                    call: "set_key_state",
                    reason: "line stuck".to_string(),
                });
            }
            self.calls.lock().unwrap().push((channel, level));
            Ok(())
        }
    }

    fn press(c: char) -> RawEvent {
        RawEvent::press(KeyDescriptor::Char(c))
    }

    fn release(c: char) -> RawEvent {
        RawEvent::release(KeyDescriptor::Char(c))
    }

    fn hardware(backend: &Arc<Backend>) -> Dispatcher {
        let driver = NativeDriver::new(backend.clone() as Arc<dyn ButtonBackend>, Duration::from_secs(1));
        Dispatcher::with_driver(BindingTable::default(), Arc::new(driver))
    }

    #[test]
    fn repeated_presses_dispatch_once() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();

        let results: Vec<_> = (0..3)
            .map(|_| dispatcher.ingest(&press('a'), &mut observer))
            .collect();

        assert!(results[0].is_some());
        assert!(results[1].is_none());
        assert!(results[2].is_none());
        assert_eq!(observer.changes, vec![("btn1".to_string(), true)]);
        assert_eq!(observer.audit, vec!["press a"]);
        assert!(dispatcher.key_state().is_pressed('a'));
    }

    #[test]
    fn release_of_up_key_is_not_actionable() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();
        assert!(dispatcher.ingest(&release('a'), &mut observer).is_none());
        assert!(observer.changes.is_empty());
    }

    #[test]
    fn uppercase_is_normalized() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();
        let t = dispatcher.ingest(&press('B'), &mut observer).unwrap();
        assert_eq!(t.key, 'b');
        assert_eq!(observer.audit, vec!["press b"]);
        assert!(dispatcher.ingest(&press('b'), &mut observer).is_none());
    }

    #[test]
    fn non_printable_keys_are_dropped() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();
        for event in [
            RawEvent::press(KeyDescriptor::Named("LShift")),
            RawEvent::press(KeyDescriptor::Unknown(0x1f0)),
            RawEvent::press(KeyDescriptor::Char('\n')),
        ] {
            assert!(dispatcher.ingest(&event, &mut observer).is_none());
        }
        assert!(dispatcher.key_state().pressed_keys().is_empty());
    }

    #[test]
    fn unbound_transition_updates_state_without_observers() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();
        let t = dispatcher.ingest(&press('z'), &mut observer).unwrap();
        assert_eq!(t.matched, 0);
        assert!(observer.changes.is_empty());
        assert!(observer.audit.is_empty());
        assert!(dispatcher.key_state().is_pressed('z'));
    }

    #[test]
    fn hardware_mode_forwards_channel_levels() {
        let backend = Arc::new(Backend::default());
        let mut dispatcher = hardware(&backend);
        let mut observer = Recorder::default();

        dispatcher.ingest(&press('b'), &mut observer);
        dispatcher.ingest(&press('b'), &mut observer);
        dispatcher.ingest(&release('b'), &mut observer);
        dispatcher.ingest(&press('a'), &mut observer);

        assert_eq!(*backend.calls.lock().unwrap(), vec![(1, 1), (1, 0), (0, 1)]);
        assert_eq!(observer.audit, vec!["press b", "release b", "press a"]);
    }

    #[test]
    fn native_failure_still_updates_state() {
        let backend = Arc::new(Backend {
            fail: true,
            ..Default::default()
        });
        let mut dispatcher = hardware(&backend);
        let mut observer = Recorder::default();

        assert!(dispatcher.ingest(&press('a'), &mut observer).is_some());
        assert_eq!(observer.changes, vec![("btn1".to_string(), true)]);
        assert_eq!(dispatcher.native_failures(), 1);
    }

    #[test]
    fn software_mode_makes_no_native_calls() {
        let mut dispatcher = Dispatcher::new(BindingTable::default());
        let mut observer = Recorder::default();
        dispatcher.ingest(&press('a'), &mut observer);
        assert!(!dispatcher.is_hardware());
        assert_eq!(dispatcher.native_failures(), 0);
        assert_eq!(observer.changes.len(), 1);
    }

    #[test]
    fn rebind_takes_effect_for_next_event() {
        let mut dispatcher = Dispatcher::new(BindingTable::new(vec![KeyBinding::new(
            "btn1",
            'a',
            ButtonColor::Green,
            4,
        )]));
        let mut observer = Recorder::default();

        dispatcher.rebind("btn1", "q").unwrap();
        dispatcher.ingest(&press('q'), &mut observer);
        assert_eq!(observer.changes, vec![("btn1".to_string(), true)]);
        assert!(dispatcher.rebind("btn1", "12").is_err());
    }
}
