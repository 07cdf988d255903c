//! Profile discovery from the browser's `profiles.ini`.
//!
//! A profile is pure identity: a unique name, a storage path (absolute or
//! relative to the profile home), and the derived lock-file path the process
//! probe watches. The profile set is read once at startup and never changes
//! during a run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::debug;

/// Identity of one browser profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    /// Storage path as written in `profiles.ini`.
    pub path: String,
    /// Whether `path` is relative to the profile home.
    pub is_relative: bool,
}

impl Profile {
    /// The lock file Firefox maintains inside the profile directory while
    /// an instance is running. A symlink whose target encodes the pid.
    pub fn lock_path(&self, browser_home: &Path) -> PathBuf {
        let dir = if self.is_relative {
            browser_home.join(&self.path)
        } else {
            PathBuf::from(&self.path)
        };
        dir.join("lock")
    }
}

/// Read and parse `profiles.ini`, keyed by profile name.
///
/// Fatal when the file is missing or unreadable: without profiles there is
/// nothing to supervise.
pub fn discover(browser_home: &Path) -> Result<BTreeMap<String, Profile>> {
    let ini = browser_home.join("profiles.ini");
    let contents = std::fs::read_to_string(&ini)
        .with_context(|| format!("failed to read {}", ini.display()))?;
    let profiles = parse_profiles_ini(&contents)?;
    if profiles.is_empty() {
        bail!("no profiles found in {}", ini.display());
    }
    debug!(count = profiles.len(), "discovered profiles");
    Ok(profiles)
}

/// Parse the `[ProfileN]` sections out of `profiles.ini` text.
///
/// Other sections (`[General]`, `[InstallXXXX]`, ...) are skipped. A profile
/// section without a `Name` or `Path` key is malformed and rejected.
fn parse_profiles_ini(contents: &str) -> Result<BTreeMap<String, Profile>> {
    let mut profiles = BTreeMap::new();
    let mut section: Option<PendingProfile> = None;

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }

        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            finish_section(&mut profiles, section.take())?;
            if header.starts_with("Profile") {
                section = Some(PendingProfile::default());
            }
            continue;
        }

        let Some(pending) = section.as_mut() else {
            continue;
        };
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        match key.trim() {
            "Name" => pending.name = Some(value.trim().to_string()),
            "Path" => pending.path = Some(value.trim().to_string()),
            "IsRelative" => pending.is_relative = value.trim() == "1",
            _ => {}
        }
    }
    finish_section(&mut profiles, section.take())?;

    Ok(profiles)
}

#[derive(Default)]
struct PendingProfile {
    name: Option<String>,
    path: Option<String>,
    is_relative: bool,
}

fn finish_section(
    profiles: &mut BTreeMap<String, Profile>,
    pending: Option<PendingProfile>,
) -> Result<()> {
    let Some(pending) = pending else {
        return Ok(());
    };
    let (Some(name), Some(path)) = (pending.name, pending.path) else {
        bail!("profile section missing Name or Path key");
    };
    profiles.insert(
        name.clone(),
        Profile {
            name,
            path,
            is_relative: pending.is_relative,
        },
    );
    Ok(())
}
