//! Lifecycle actions against browser process groups.
//!
//! Starts are fire-and-forget: the instance is spawned detached in a fresh
//! session and the reconciliation loop discovers the resulting pid through
//! the probe on a later tick. Suspend and resume target the whole process
//! group so helper children pause and wake together with the main process.

use std::os::unix::process::CommandExt;
use std::process::{Command, Stdio};

use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Action interface the supervisor drives.
///
/// Failures here are per-tick recoverables: a vanished process or a broken
/// spawn is logged and retried by policy on a later tick, never fatal.
pub trait ProcessControl {
    /// Spawn a detached instance for the named profile.
    fn start(&mut self, profile: &str);

    /// SIGSTOP the process group rooted at `pid`.
    ///
    /// Callers gate this on `ProcessProbe::suspend_ready`; the grace
    /// period and already-stopped checks are preconditions, not part of
    /// the signal itself.
    fn pause_group(&mut self, pid: i32);

    /// SIGCONT the process group rooted at `pid`.
    fn resume_group(&mut self, pid: i32);
}

/// Real control shelling the configured browser command.
pub struct BrowserControl {
    program: String,
    args: Vec<String>,
}

impl BrowserControl {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

impl ProcessControl for BrowserControl {
    fn start(&mut self, profile: &str) {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("-P")
            .arg(profile)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        // New session: the instance survives us and leads its own process
        // group, which is what pause/resume signal.
        unsafe {
            cmd.pre_exec(|| nix::unistd::setsid().map(|_| ()).map_err(std::io::Error::from));
        }
        match cmd.spawn() {
            Ok(child) => debug!(profile, pid = child.id(), "spawned browser instance"),
            Err(e) => warn!(profile, program = %self.program, "spawn failed: {e}"),
        }
    }

    fn pause_group(&mut self, pid: i32) {
        signal_group(pid, Signal::SIGSTOP);
    }

    fn resume_group(&mut self, pid: i32) {
        signal_group(pid, Signal::SIGCONT);
    }
}

fn signal_group(pid: i32, signal: Signal) {
    if pid <= 0 {
        return;
    }
    match killpg(Pid::from_raw(pid), signal) {
        Ok(()) => debug!(pid, ?signal, "signaled process group"),
        // The group vanished between the probe and the signal.
        Err(Errno::ESRCH) => debug!(pid, ?signal, "process group already gone"),
        Err(e) => warn!(pid, ?signal, "killpg failed: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_failure_is_tolerated() {
        let mut control = BrowserControl::new(
            "/nonexistent/definitely-not-a-browser".to_string(),
            vec!["--no-remote".to_string()],
        );
        // Must not panic or abort; the loop retries via policy.
        control.start("work");
    }

    #[test]
    fn signaling_a_dead_group_is_tolerated() {
        let mut control = BrowserControl::new("firefox".to_string(), vec![]);
        control.pause_group(999999999);
        control.resume_group(999999999);
        // Sentinel pids are ignored outright.
        control.pause_group(-1);
        control.resume_group(0);
    }

    #[test]
    fn resume_signal_reaches_own_group() {
        // SIGCONT to our own process group is harmless and exercises the
        // live killpg path.
        let pgid = nix::unistd::getpgrp().as_raw();
        signal_group(pgid, Signal::SIGCONT);
    }
}
