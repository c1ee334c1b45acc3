//! Configuration management for the button simulator
//!
//! Settings are persisted as TOML in a platform-specific config file and
//! handed to each component when it is constructed.
//!
//! ## Config File Locations
//!
//! | Platform | Path |
//! |----------|------|
//! | Linux | `~/.config/button-sim/config.toml` |
//! | macOS | `~/Library/Application Support/button-sim/config.toml` |
//! | Windows | `%APPDATA%\button-sim\config.toml` |
//!
//! ## Example
//!
//! ```no_run
//! use button_sim::config::{Config, RunMode};
//!
//! let mut config = Config::load().unwrap_or_default();
//! config.simulator.mode = RunMode::Hardware;
//! config.save().expect("Failed to save config");
//! ```

use crate::pipeline::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const APP_DIR: &str = "button-sim";

/// Error type for configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine config directory
    #[error("Could not determine config directory")]
    NoConfigDir,
    /// IO error reading or writing config file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// Failed to parse config file
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Failed to serialize config
    #[error("Serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Returns the path to the config file.
///
/// Creates the config directory if it doesn't exist.
pub fn config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
    let app_dir = config_dir.join(APP_DIR);

    if !app_dir.exists() {
        fs::create_dir_all(&app_dir)?;
    }

    Ok(app_dir.join("config.toml"))
}

/// Whether key events drive the native button library or only the display
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Forward press/release to the native library and run the tick loop
    Hardware,
    /// Update on-screen state only
    #[default]
    Software,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hardware => "hardware",
            Self::Software => "software",
        }
    }

    pub fn is_hardware(&self) -> bool {
        matches!(self, Self::Hardware)
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Where the binding table is persisted
    #[serde(default = "default_bindings_file")]
    pub bindings_file: PathBuf,
    /// Event pipeline and lifecycle settings
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Native library resolution
    #[serde(default)]
    pub native: NativeConfig,
    /// UI settings
    #[serde(default)]
    pub ui: UiConfig,
}

fn default_bindings_file() -> PathBuf {
    PathBuf::from("key_bindings.json")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bindings_file: default_bindings_file(),
            simulator: SimulatorConfig::default(),
            native: NativeConfig::default(),
            ui: UiConfig::default(),
        }
    }
}

/// Pipeline, tick and shutdown settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Requested run mode
    pub mode: RunMode,
    /// Tick period in microseconds
    pub tick_interval_us: u64,
    /// Event queue capacity
    pub queue_capacity: usize,
    /// How long the worker waits for an event before re-checking shutdown
    pub worker_poll_ms: u64,
    /// Hook polling period
    pub hook_poll_ms: u64,
    /// Bound for joining each background thread
    pub join_timeout_ms: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Software,
            tick_interval_us: 5_000,
            queue_capacity: DEFAULT_CAPACITY,
            worker_poll_ms: 100,
            hook_poll_ms: 1,
            join_timeout_ms: 1000,
        }
    }
}

impl SimulatorConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(self.tick_interval_us.max(1))
    }

    pub fn worker_poll(&self) -> Duration {
        Duration::from_millis(self.worker_poll_ms.max(1))
    }

    pub fn hook_poll(&self) -> Duration {
        Duration::from_millis(self.hook_poll_ms)
    }

    pub fn join_timeout(&self) -> Duration {
        Duration::from_millis(self.join_timeout_ms)
    }
}

/// Native library resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NativeConfig {
    /// Base library name; platform prefix/suffix are added at resolution
    pub library: String,
    /// Project-relative build output directory
    pub output_dir: PathBuf,
    /// Fixed system library directory
    pub system_dir: PathBuf,
    /// Additional directories tried before bare-name resolution
    pub extra_dirs: Vec<PathBuf>,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            library: "button".to_string(),
            output_dir: PathBuf::from("output"),
            system_dir: default_system_dir(),
            extra_dirs: Vec::new(),
        }
    }
}

#[cfg(windows)]
fn default_system_dir() -> PathBuf {
    PathBuf::from(r"C:\Windows\System32")
}

#[cfg(not(windows))]
fn default_system_dir() -> PathBuf {
    PathBuf::from("/usr/local/lib")
}

impl NativeConfig {
    /// Platform file name of the library, e.g. `libbutton.so` or `button.dll`
    pub fn file_name(&self) -> PathBuf {
        PathBuf::from(libloading::library_filename(&self.library))
    }

    /// Ordered candidate list: output dir, system dir, extra dirs, bare name.
    ///
    /// A relative output dir is tried against the working directory, then
    /// next to the executable and one level above it.
    pub fn search_paths(&self) -> Vec<PathBuf> {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        self.search_paths_from(exe_dir.as_deref())
    }

    fn search_paths_from(&self, exe_dir: Option<&Path>) -> Vec<PathBuf> {
        let file = self.file_name();
        let mut paths = vec![self.output_dir.join(&file)];
        if let Some(exe_dir) = exe_dir.filter(|_| self.output_dir.is_relative()) {
            paths.push(exe_dir.join(&self.output_dir).join(&file));
            if let Some(parent) = exe_dir.parent() {
                paths.push(parent.join(&self.output_dir).join(&file));
            }
        }
        paths.push(self.system_dir.join(&file));
        for dir in &self.extra_dirs {
            paths.push(dir.join(&file));
        }
        paths.push(file);

        let mut seen = Vec::with_capacity(paths.len());
        paths.retain(|path| {
            let fresh = !seen.contains(path);
            if fresh {
                seen.push(path.clone());
            }
            fresh
        });
        paths
    }
}

/// UI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Refresh rate for UI updates (in Hz)
    pub refresh_rate_hz: u32,
    /// Lines kept in the log pane
    pub log_lines: usize,
    /// Color theme (dark/light)
    pub theme: Theme,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 60,
            log_lines: 200,
            theme: Theme::Dark,
        }
    }
}

/// Color theme options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Config {
    /// Load configuration from the default config file.
    ///
    /// Returns the default configuration if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save configuration to the default config file.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Get UI refresh interval as Duration
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.ui.refresh_rate_hz.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_config_path() -> PathBuf {
        env::temp_dir().join(format!("button-sim-config-{}.toml", std::process::id()))
    }

    #[test]
    fn config_default_values() {
        let config = Config::default();
        assert_eq!(config.simulator.mode, RunMode::Software);
        assert_eq!(config.simulator.tick_interval(), Duration::from_millis(5));
        assert_eq!(config.simulator.queue_capacity, 1000);
        assert_eq!(config.simulator.worker_poll(), Duration::from_millis(100));
        assert_eq!(config.native.library, "button");
        assert_eq!(config.ui.theme, Theme::Dark);
        assert_eq!(config.bindings_file, PathBuf::from("key_bindings.json"));
    }

    #[test]
    fn config_refresh_interval() {
        let config = Config::default();
        assert_eq!(config.refresh_interval().as_micros(), 16666);
    }

    #[test]
    fn search_paths_follow_resolution_order() {
        let native = NativeConfig {
            library: "button".to_string(),
            output_dir: PathBuf::from("out"),
            system_dir: PathBuf::from("/opt/lib"),
            extra_dirs: vec![PathBuf::from("/tmp/extra")],
        };
        let file = native.file_name();
        let paths = native.search_paths_from(None);

        assert_eq!(paths.len(), 4);
        assert_eq!(paths[0], PathBuf::from("out").join(&file));
        assert_eq!(paths[1], PathBuf::from("/opt/lib").join(&file));
        assert_eq!(paths[2], PathBuf::from("/tmp/extra").join(&file));
        assert_eq!(paths[3], file);
    }

    #[test]
    fn relative_output_dir_is_also_tried_beside_the_executable() {
        let native = NativeConfig {
            output_dir: PathBuf::from("output"),
            system_dir: PathBuf::from("/opt/lib"),
            ..NativeConfig::default()
        };
        let file = native.file_name();
        let paths = native.search_paths_from(Some(Path::new("/srv/sim/bin")));

        assert_eq!(
            paths,
            vec![
                PathBuf::from("output").join(&file),
                PathBuf::from("/srv/sim/bin/output").join(&file),
                PathBuf::from("/srv/sim/output").join(&file),
                PathBuf::from("/opt/lib").join(&file),
                file.clone(),
            ]
        );

        let absolute = NativeConfig {
            output_dir: PathBuf::from("/srv/sim/output"),
            ..native
        };
        let paths = absolute.search_paths_from(Some(Path::new("/srv/sim/bin")));
        assert_eq!(paths.len(), 3);
        assert_eq!(paths[0], PathBuf::from("/srv/sim/output").join(&file));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn library_file_name_uses_platform_convention() {
        assert_eq!(NativeConfig::default().file_name(), PathBuf::from("libbutton.so"));
    }

    #[test]
    fn config_save_and_load_roundtrip() {
        let path = temp_config_path();

        let mut config = Config::default();
        config.simulator.mode = RunMode::Hardware;
        config.ui.theme = Theme::Light;
        config.save_to(&path).expect("Failed to save config");

        let loaded = Config::load_from(&path).expect("Failed to load config");
        assert_eq!(loaded.simulator.mode, RunMode::Hardware);
        assert_eq!(loaded.ui.theme, Theme::Light);

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn config_load_missing_file_is_error() {
        let result = Config::load_from(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn config_deserializes_partial_toml() {
        let toml_str = r#"
[simulator]
mode = "hardware"
tick_interval_us = 2000

[native]
extra_dirs = ["/srv/lib"]
"#;

        let config: Config = toml::from_str(toml_str).expect("Failed to deserialize");
        assert_eq!(config.simulator.mode, RunMode::Hardware);
        assert_eq!(config.simulator.tick_interval(), Duration::from_millis(2));
        // Unspecified keys keep their defaults
        assert_eq!(config.simulator.queue_capacity, 1000);
        assert_eq!(config.native.library, "button");
        assert_eq!(config.native.extra_dirs, vec![PathBuf::from("/srv/lib")]);
        assert_eq!(config.ui.refresh_rate_hz, 60);
    }

    #[test]
    fn run_mode_serializes_lowercase() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).expect("Failed to serialize");
        assert!(toml_str.contains("mode = \"software\""));
        assert!(toml_str.contains("[simulator]"));
        assert!(toml_str.contains("[native]"));
    }

    #[test]
    fn config_error_display() {
        assert_eq!(
            ConfigError::NoConfigDir.to_string(),
            "Could not determine config directory"
        );
        let io_err = ConfigError::Io(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO error"));
    }
}
