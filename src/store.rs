//! Durable policy store — the flat name→mode list.
//!
//! The store is a human-editable JSON array of `{Name, Mode}` records,
//! sorted by name before every write so diffs stay reproducible. Content is
//! trusted, not adversarial: malformed JSON or an unknown mode word is a
//! fatal startup error, never silently repaired.
//!
//! Saves go through a temp file followed by an atomic rename; the previous
//! generation is kept as a `.bak` sibling. A crash at any point leaves
//! either the old file or the new one in place, never neither.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::mode::Mode;

/// One persisted policy record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Mode")]
    pub mode: Mode,
}

/// Load the policy list, seeding an empty store on first run.
pub fn load(path: &Path) -> Result<Vec<PolicyEntry>> {
    if !path.is_file() {
        seed_empty(path)?;
        return Ok(Vec::new());
    }
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let entries: Vec<PolicyEntry> = serde_json::from_str(&contents)
        .with_context(|| format!("corrupt policy store {}", path.display()))?;
    debug!(count = entries.len(), "loaded policy store");
    Ok(entries)
}

/// Persist the policy list sorted by name.
///
/// Write order: serialize to a `.tmp` sibling, copy the current file to
/// `.bak` (best effort), then rename the temp file into place. The rename
/// is the commit point.
pub fn save(path: &Path, entries: &[PolicyEntry]) -> Result<()> {
    let mut sorted: Vec<PolicyEntry> = entries.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let body = serde_json::to_string_pretty(&sorted).context("failed to serialize policy store")?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, body).with_context(|| format!("failed to write {}", tmp.display()))?;

    if path.is_file() {
        let _ = std::fs::copy(path, path.with_extension("json.bak"));
    }

    std::fs::rename(&tmp, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    debug!(count = sorted.len(), path = %path.display(), "saved policy store");
    Ok(())
}

/// Index entries by name. At most one mode survives per name; later
/// entries win, matching a hand-edited file with duplicates.
pub fn to_map(entries: &[PolicyEntry]) -> BTreeMap<String, Mode> {
    entries
        .iter()
        .map(|e| (e.name.clone(), e.mode))
        .collect()
}

fn seed_empty(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, "[]").with_context(|| format!("failed to seed {}", path.display()))?;
    debug!(path = %path.display(), "seeded empty policy store");
    Ok(())
}
