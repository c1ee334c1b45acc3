//! Keyboard capture: raw events, key sources and the hook thread

mod event;
mod hook;
mod state;
pub mod keymap;

#[cfg(target_os = "linux")]
mod evdev_listener;

pub use event::{DeviceQuerySource, EventKind, KeyDescriptor, KeySource, RawEvent};
pub use hook::HookThread;
pub use keymap::{KeyCode, KeyInfo, KEYMAP};
pub use state::KeyState;

#[cfg(target_os = "linux")]
pub use evdev_listener::{evdev_status, EvdevError, EvdevSource};

/// Best available source on this platform: evdev on Linux when the devices
/// are readable, device_query otherwise.
pub fn default_source() -> Option<Box<dyn KeySource>> {
    #[cfg(target_os = "linux")]
    {
        if let Some(evdev) = EvdevSource::try_new() {
            return Some(Box::new(evdev));
        }
        log::info!("Evdev: {}, falling back to device_query", evdev_status());
    }

    match DeviceQuerySource::try_new() {
        Some(source) => Some(Box::new(source)),
        None => {
            log::error!("device_query could not connect to the input backend");
            None
        }
    }
}
