//! Error taxonomy shared by the simulator components

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// One failed attempt at opening the native button library
#[derive(Debug, Clone)]
pub struct LoadAttempt {
    /// Candidate that was tried
    pub candidate: PathBuf,
    /// Why it was rejected
    pub reason: String,
}

impl fmt::Display for LoadAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.candidate.display(), self.reason)
    }
}

/// Errors produced by the simulator core
#[derive(Debug, Error)]
pub enum Error {
    /// No candidate path yielded a library exposing the required entry points
    #[error("button library unavailable ({})", format_attempts(.attempts))]
    LibraryUnavailable { attempts: Vec<LoadAttempt> },

    /// An optional entry point is not exported by the library
    #[error("optional entry point `{0}` not exported")]
    OptionalSymbolMissing(&'static str),

    /// A native entry point failed during a call
    #[error("native call `{call}` failed: {reason}")]
    NativeCallFailed { call: &'static str, reason: String },

    /// Rebind request rejected
    #[error("invalid binding: {0}")]
    InvalidBinding(String),

    /// A background context did not stop in time
    #[error("{context} did not stop within {timeout:?}")]
    ShutdownTimeout {
        context: &'static str,
        timeout: Duration,
    },

    /// A background thread could not be started
    #[error("failed to start {context} thread: {source}")]
    Spawn {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// Lifecycle operation requested from the wrong state
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    /// Binding table could not be read or written
    #[error("binding store error: {0}")]
    Bindings(#[from] BindingStoreError),
}

/// I/O and format failures of the persisted binding table
#[derive(Debug, Error)]
pub enum BindingStoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_attempts(attempts: &[LoadAttempt]) -> String {
    if attempts.is_empty() {
        return "no candidates".to_string();
    }
    attempts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;
