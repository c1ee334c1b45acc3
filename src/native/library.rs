//! Dynamic loading of the button library

use super::ButtonBackend;
use crate::error::{Error, LoadAttempt, Result};
use libloading::Library;
use std::os::raw::c_int;
use std::path::{Path, PathBuf};

/// Required: advance the state machine
pub const TICK_SYMBOL: &[u8] = b"button_ticks_wrapper\0";
/// Required: `(channel: u8, level: u8)`
pub const SET_KEY_STATE_SYMBOL: &[u8] = b"set_key_state\0";
/// Optional: returns 0 on success
pub const INIT_SYMBOL: &[u8] = b"init\0";
/// Optional
pub const CLEANUP_SYMBOL: &[u8] = b"cleanup\0";

type TickFn = unsafe extern "C" fn();
type SetKeyStateFn = unsafe extern "C" fn(u8, u8);
type InitFn = unsafe extern "C" fn() -> c_int;
type CleanupFn = unsafe extern "C" fn();

/// Loaded button library with its entry points resolved once
pub struct NativeLibrary {
    path: PathBuf,
    tick: TickFn,
    set_key_state: SetKeyStateFn,
    init: Option<InitFn>,
    cleanup: Option<CleanupFn>,
    // Keeps the function pointers above valid; dropped last.
    _library: Library,
}

impl NativeLibrary {
    /// Try each candidate in order and keep the first that opens and exports
    /// both required entry points.
    pub fn load(candidates: &[PathBuf]) -> Result<Self> {
        let mut attempts = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match Self::open(candidate) {
                Ok(library) => {
                    log::info!(
                        "Loaded button library {} (init: {}, cleanup: {})",
                        candidate.display(),
                        library.init.is_some(),
                        library.cleanup.is_some()
                    );
                    return Ok(library);
                }
                Err(reason) => {
                    log::debug!("Skipping {}: {}", candidate.display(), reason);
                    attempts.push(LoadAttempt {
                        candidate: candidate.clone(),
                        reason,
                    });
                }
            }
        }

        Err(Error::LibraryUnavailable { attempts })
    }

    fn open(path: &Path) -> std::result::Result<Self, String> {
        // SAFETY: opening the library runs its initialisers; the button
        // library is a trusted build artifact of the firmware project.
        let library = unsafe { Library::new(path) }.map_err(|e| e.to_string())?;

        // SAFETY: the symbol types match the exported C prototypes.
        let (tick, set_key_state, init, cleanup) = unsafe {
            (
                required::<TickFn>(&library, TICK_SYMBOL)?,
                required::<SetKeyStateFn>(&library, SET_KEY_STATE_SYMBOL)?,
                optional::<InitFn>(&library, INIT_SYMBOL),
                optional::<CleanupFn>(&library, CLEANUP_SYMBOL),
            )
        };

        Ok(Self {
            path: path.to_path_buf(),
            tick,
            set_key_state,
            init,
            cleanup,
            _library: library,
        })
    }

    /// Candidate the library was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }
}

unsafe fn required<T: Copy>(library: &Library, symbol: &[u8]) -> std::result::Result<T, String> {
    library
        .get::<T>(symbol)
        .map(|s| *s)
        .map_err(|e| format!("missing {}: {}", symbol_name(symbol), e))
}

unsafe fn optional<T: Copy>(library: &Library, symbol: &[u8]) -> Option<T> {
    library.get::<T>(symbol).ok().map(|s| *s)
}

fn symbol_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol.strip_suffix(b"\0").unwrap_or(symbol)).into_owned()
}

impl ButtonBackend for NativeLibrary {
    fn tick(&self) -> Result<()> {
        // SAFETY: resolved from the live library with the C prototype `void(void)`.
        unsafe { (self.tick)() };
        Ok(())
    }

    fn set_key_state(&self, channel: u8, level: u8) -> Result<()> {
        // SAFETY: resolved from the live library with the C prototype
        // `void(uint8_t, uint8_t)`.
        unsafe { (self.set_key_state)(channel, level) };
        Ok(())
    }

    fn init(&self) -> Result<i32> {
        let init = self.init.ok_or(Error::OptionalSymbolMissing("init"))?;
        // SAFETY: resolved from the live library with the C prototype `int(void)`.
        Ok(unsafe { init() } as i32)
    }

    fn cleanup(&self) -> Result<()> {
        let cleanup = self.cleanup.ok_or(Error::OptionalSymbolMissing("cleanup"))?;
        // SAFETY: resolved from the live library with the C prototype `void(void)`.
        unsafe { cleanup() };
        Ok(())
    }
}
