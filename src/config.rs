//! Supervisor settings loaded from `config.toml`.
//!
//! Everything has a sensible default; the file is optional and may be
//! partial. Settings cover the browser launch command, the executable
//! allow-list used for pid-reuse defense, and the reconciliation timings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_program() -> String {
    "firefox".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--no-remote".to_string()]
}

fn default_executables() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/usr/lib/firefox/firefox"),
        PathBuf::from("/usr/bin/firefox"),
    ]
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_suspend_grace_secs() -> u64 {
    300
}

fn default_start_warn_ticks() -> u32 {
    10
}

/// How the browser is launched and recognized.
#[derive(Debug, Deserialize)]
pub struct BrowserSettings {
    #[serde(default = "default_program")]
    pub program: String,
    /// Arguments placed before `-P <profile>`.
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// Executable paths accepted by the process probe. A pid whose live
    /// executable is not in this list is treated as Down.
    #[serde(default = "default_executables")]
    pub executables: Vec<PathBuf>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_args(),
            executables: default_executables(),
        }
    }
}

/// Reconciliation loop timings.
#[derive(Debug, Deserialize)]
pub struct SupervisorSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// A process younger than this is never suspended, so a fresh instance
    /// gets to finish initializing.
    #[serde(default = "default_suspend_grace_secs")]
    pub suspend_grace_secs: u64,
    /// Reconcile passes a requested start may stay Down before a warning
    /// is logged.
    #[serde(default = "default_start_warn_ticks")]
    pub start_warn_ticks: u32,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            suspend_grace_secs: default_suspend_grace_secs(),
            start_warn_ticks: default_start_warn_ticks(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub supervisor: SupervisorSettings,
}

impl Settings {
    /// Load `config.toml` if present, defaults otherwise.
    pub fn load(path: &Path) -> Result<(Self, Option<PathBuf>)> {
        if !path.is_file() {
            return Ok((Settings::default(), None));
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let settings: Settings = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok((settings, Some(path.to_path_buf())))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.supervisor.tick_interval_ms)
    }

    pub fn suspend_grace(&self) -> Duration {
        Duration::from_secs(self.supervisor.suspend_grace_secs)
    }
}
