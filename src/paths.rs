//! Well-known filesystem locations.
//!
//! Everything the supervisor touches on disk hangs off three base
//! directories: the Firefox profile home, our config directory, and the
//! runtime directory holding the instance pid file. Bases are resolved once
//! at startup; tests construct `Paths` directly with temp directories.

use std::path::PathBuf;

use anyhow::{Context, Result};

const CONFIG_SUBDIR: &str = "foxherd";
const PID_FILENAME: &str = "foxherd.pid";
const POLICY_FILENAME: &str = "config.json";
const SETTINGS_FILENAME: &str = "config.toml";

#[derive(Debug, Clone)]
pub struct Paths {
    /// Firefox profile home, normally `~/.mozilla/firefox`.
    pub browser_home: PathBuf,
    /// Our config directory, normally `$XDG_CONFIG_HOME/foxherd`.
    pub config_dir: PathBuf,
    /// Runtime directory for the instance pid file.
    pub runtime_dir: PathBuf,
}

impl Paths {
    /// Resolve all bases from the environment.
    ///
    /// The runtime dir falls back to the system temp dir on hosts without
    /// `XDG_RUNTIME_DIR`.
    pub fn discover() -> Result<Self> {
        let home = dirs::home_dir().context("cannot determine home directory")?;
        let config_base = dirs::config_dir().context("cannot determine config directory")?;
        let runtime_dir = dirs::runtime_dir().unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            browser_home: home.join(".mozilla").join("firefox"),
            config_dir: config_base.join(CONFIG_SUBDIR),
            runtime_dir,
        })
    }

    pub fn profiles_ini(&self) -> PathBuf {
        self.browser_home.join("profiles.ini")
    }

    pub fn policy_file(&self) -> PathBuf {
        self.config_dir.join(POLICY_FILENAME)
    }

    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILENAME)
    }

    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join(PID_FILENAME)
    }

    /// Bases rooted under one directory, for tests.
    #[cfg(test)]
    pub fn under(base: &std::path::Path) -> Self {
        Self {
            browser_home: base.join("firefox"),
            config_dir: base.join("config"),
            runtime_dir: base.join("run"),
        }
    }
}
