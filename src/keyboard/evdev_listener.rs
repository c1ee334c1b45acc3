//! Raw evdev key source for Linux
//!
//! Reads key transitions straight from `/dev/input/event*`, which works on
//! Wayland and on consoles where device_query has no display to talk to.

use super::{KeyCode, KeySource, RawEvent};
use nix::libc;
use std::fs::{self, File};
use std::io::{self, Read};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error type for evdev operations
#[derive(Debug, Error)]
pub enum EvdevError {
    /// No keyboard devices found
    #[error("No keyboard devices found")]
    NoDevices,
    /// Permission denied accessing device
    #[error("Permission denied accessing {0}")]
    PermissionDenied(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Device enumeration failed
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
}

/// A raw input event from the kernel
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct InputEvent {
    tv_sec: i64,
    tv_usec: i64,
    event_type: u16,
    code: u16,
    value: i32,
}

const EV_KEY: u16 = 0x01;
const INPUT_EVENT_SIZE: usize = std::mem::size_of::<InputEvent>();

/// Value field of an EV_KEY event
const KEY_RELEASE: i32 = 0;

/// Find all keyboard input devices
fn find_keyboard_devices() -> Result<Vec<PathBuf>, EvdevError> {
    let input_dir = Path::new("/dev/input");
    if !input_dir.exists() {
        return Err(EvdevError::EnumerationFailed(
            "/dev/input does not exist".to_string(),
        ));
    }

    let keyboards: Vec<PathBuf> = fs::read_dir(input_dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("event"))
        })
        .filter(|path| is_keyboard_device(path))
        .collect();

    if keyboards.is_empty() {
        return Err(EvdevError::NoDevices);
    }
    Ok(keyboards)
}

/// A keyboard advertises many EV_KEY capabilities in sysfs
fn is_keyboard_device(device_path: &Path) -> bool {
    let Some(name) = device_path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };

    let caps_path = format!("/sys/class/input/{}/device/capabilities/key", name);
    if let Ok(caps) = fs::read_to_string(&caps_path) {
        let total_bits: u32 = caps
            .split_whitespace()
            .filter_map(|hex| u64::from_str_radix(hex, 16).ok())
            .map(|n| n.count_ones())
            .sum();
        return total_bits > 50;
    }

    let name_path = format!("/sys/class/input/{}/device/name", name);
    fs::read_to_string(&name_path)
        .map(|dev_name| {
            let lower = dev_name.to_lowercase();
            lower.contains("keyboard") || lower.contains("kbd")
        })
        .unwrap_or(false)
}

/// Evdev-backed key source
pub struct EvdevSource {
    devices: Vec<File>,
    buffer: Vec<u8>,
}

impl EvdevSource {
    /// Open every readable keyboard device in non-blocking mode
    pub fn new() -> Result<Self, EvdevError> {
        let mut devices = Vec::new();

        for path in find_keyboard_devices()? {
            match File::open(&path) {
                Ok(file) => {
                    let fd = file.as_raw_fd();
                    // SAFETY: fd is owned by `file` and stays open for the call.
                    unsafe {
                        let flags = libc::fcntl(fd, libc::F_GETFL);
                        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
                    }
                    devices.push(file);
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => continue,
                Err(e) => return Err(EvdevError::Io(e)),
            }
        }

        if devices.is_empty() {
            return Err(EvdevError::PermissionDenied(
                "every keyboard device; add the user to the 'input' group".to_string(),
            ));
        }

        log::info!("Evdev source opened {} keyboard device(s)", devices.len());
        Ok(Self {
            devices,
            buffer: vec![0u8; INPUT_EVENT_SIZE * 64],
        })
    }

    /// Try to open the source, logging why it is unavailable
    pub fn try_new() -> Option<Self> {
        match Self::new() {
            Ok(source) => Some(source),
            Err(e) => {
                log::info!("Evdev unavailable: {}", e);
                None
            }
        }
    }
}

impl KeySource for EvdevSource {
    fn name(&self) -> &'static str {
        "evdev"
    }

    fn poll(&mut self, out: &mut Vec<RawEvent>) {
        for device in &mut self.devices {
            loop {
                let bytes_read = match device.read(&mut self.buffer) {
                    Ok(n) if n >= INPUT_EVENT_SIZE => n,
                    Ok(_) => break,
                    Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                    Err(e) => {
                        log::debug!("Evdev read failed: {}", e);
                        break;
                    }
                };

                for chunk in self.buffer[..bytes_read].chunks_exact(INPUT_EVENT_SIZE) {
                    // SAFETY: chunk is exactly one kernel input_event; read_unaligned
                    // copes with the byte buffer's alignment.
                    let event: InputEvent =
                        unsafe { std::ptr::read_unaligned(chunk.as_ptr() as *const InputEvent) };
                    if event.event_type != EV_KEY {
                        continue;
                    }
                    out.push(decode(event.code, event.value));
                }
            }
        }
    }
}

/// Auto-repeat (value 2) is reported as a press; dedup happens downstream.
fn decode(code: u16, value: i32) -> RawEvent {
    let key = KeyCode::new(code).into();
    if value == KEY_RELEASE {
        RawEvent::release(key)
    } else {
        RawEvent::press(key)
    }
}

/// Get a status message about evdev availability
pub fn evdev_status() -> String {
    match find_keyboard_devices() {
        Ok(devices) => format!("{} keyboard device(s) found", devices.len()),
        Err(EvdevError::NoDevices) => "No keyboard devices found".to_string(),
        Err(e) => format!("Error: {}", e),
    }
}
