//! Window Oracle — focus and window-ownership queries.
//!
//! The only windowing-system-specific code in the tree, kept behind a
//! capability trait so the reconciliation core stays portable and testable.
//! The X11 implementation shells out to `xprop` and `wmctrl`, which is what
//! the tool historically relied on; any query failure reads as "no window"
//! for the current tick and is never fatal after startup.

use std::process::Command;

use anyhow::{Context, Result};
use tracing::debug;

/// Capability interface injected into the supervisor at startup.
pub trait WindowOracle {
    /// Identity of the currently focused window, if any.
    fn active_window(&self) -> Option<String>;

    /// Pid owning the given window.
    fn owner_pid(&self, window: &str) -> Option<i32>;

    /// Some window owned by the given pid.
    fn window_of_pid(&self, pid: i32) -> Option<String>;

    /// Ask the window manager to gracefully close a window.
    fn request_close(&self, window: &str);
}

/// X11 oracle backed by the `xprop` and `wmctrl` CLI tools.
pub struct X11Oracle;

impl X11Oracle {
    /// Verify the window system answers before the supervisor starts.
    ///
    /// A dead display or missing tooling here is a broken environment, so
    /// the caller treats the error as fatal.
    pub fn probe() -> Result<Self> {
        let output = Command::new("xprop")
            .args(["-root", "_NET_ACTIVE_WINDOW"])
            .output()
            .context("xprop not found — install xprop and wmctrl")?;
        if !output.status.success() {
            anyhow::bail!(
                "cannot query the X server: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(Self)
    }
}

impl WindowOracle for X11Oracle {
    fn active_window(&self) -> Option<String> {
        let output = Command::new("xprop")
            .args(["-root", "_NET_ACTIVE_WINDOW"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        last_field(&String::from_utf8_lossy(&output.stdout))
    }

    fn owner_pid(&self, window: &str) -> Option<i32> {
        let output = Command::new("xprop")
            .args(["-id", window, "_NET_WM_PID"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        last_field(&String::from_utf8_lossy(&output.stdout))?.parse().ok()
    }

    fn window_of_pid(&self, pid: i32) -> Option<String> {
        let output = Command::new("wmctrl").arg("-lp").output().ok()?;
        if !output.status.success() {
            return None;
        }
        find_window_of_pid(&String::from_utf8_lossy(&output.stdout), pid)
    }

    fn request_close(&self, window: &str) {
        match Command::new("wmctrl").args(["-i", "-c", window]).status() {
            Ok(status) if status.success() => debug!(window, "requested window close"),
            Ok(status) => debug!(window, code = ?status.code(), "wmctrl close refused"),
            Err(e) => debug!(window, "wmctrl unavailable: {e}"),
        }
    }
}

/// Last whitespace-separated token of the tool output.
///
/// `xprop -root _NET_ACTIVE_WINDOW` prints
/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3400007`.
fn last_field(output: &str) -> Option<String> {
    output.split_whitespace().last().map(str::to_string)
}

/// Scan `wmctrl -lp` output for the first window owned by `pid`.
///
/// Columns: window id, desktop, pid, host, title.
fn find_window_of_pid(output: &str, pid: i32) -> Option<String> {
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }
        if fields[2].parse::<i32>() == Ok(pid) {
            return Some(fields[0].to_string());
        }
    }
    None
}
