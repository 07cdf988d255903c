//! Process probe — resolving and classifying browser instances.
//!
//! Firefox maintains a `lock` symlink inside a running profile directory
//! whose target encodes the owning pid (`<host>:+<pid>`). The probe reads
//! that indirect reference, then verifies the pid actually belongs to the
//! browser by comparing the live executable path against an allow-list.
//! The executable check is the defense against pid reuse: a recycled pid
//! pointing at an unrelated binary classifies as Down, never Up.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System, UpdateKind};
use tracing::debug;

use crate::mode::Status;

/// Observation interface the supervisor reconciles against.
///
/// Every method is a point-in-time query; none is fatal. A miss simply
/// reads as "down" or "not eligible" for the current tick.
pub trait ProcessProbe {
    /// Resolve the pid encoded in a profile's lock symlink.
    fn resolve(&self, lock_path: &Path) -> Option<i32>;

    /// `Up` only when the pid exists and runs an allow-listed executable.
    fn classify(&mut self, pid: i32) -> Status;

    /// Preconditions for `pause_group`: alive, not already stopped, and
    /// past the startup grace period.
    fn suspend_ready(&mut self, pid: i32) -> bool;

    /// Process group of a pid, for matching against the focused window.
    fn group_of(&self, pid: i32) -> Option<i32>;
}

/// Real probe backed by `sysinfo` and the lock-symlink convention.
pub struct BrowserProbe {
    system: System,
    executables: Vec<PathBuf>,
    grace: Duration,
}

impl BrowserProbe {
    pub fn new(executables: Vec<PathBuf>, grace: Duration) -> Self {
        Self {
            system: System::new(),
            executables,
            grace,
        }
    }
}

impl ProcessProbe for BrowserProbe {
    fn resolve(&self, lock_path: &Path) -> Option<i32> {
        let target = std::fs::read_link(lock_path).ok()?;
        parse_lock_target(&target.to_string_lossy())
    }

    fn classify(&mut self, pid: i32) -> Status {
        if pid <= 0 {
            return Status::Down;
        }
        let sys_pid = Pid::from_u32(pid as u32);
        let refresh = ProcessRefreshKind::new().with_exe(UpdateKind::Always);
        if !self.system.refresh_process_specifics(sys_pid, refresh) {
            return Status::Down;
        }
        let Some(process) = self.system.process(sys_pid) else {
            return Status::Down;
        };
        match process.exe() {
            Some(exe) if self.executables.iter().any(|allowed| allowed == exe) => Status::Up,
            Some(exe) => {
                debug!(pid, exe = %exe.display(), "pid runs a foreign executable");
                Status::Down
            }
            None => Status::Down,
        }
    }

    fn suspend_ready(&mut self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        let sys_pid = Pid::from_u32(pid as u32);
        if !self.system.refresh_process(sys_pid) {
            return false;
        }
        let Some(process) = self.system.process(sys_pid) else {
            return false;
        };
        if process.status() == ProcessStatus::Stop {
            return false;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        now.saturating_sub(process.start_time()) >= self.grace.as_secs()
    }

    fn group_of(&self, pid: i32) -> Option<i32> {
        let pgid = nix::unistd::getpgid(Some(nix::unistd::Pid::from_raw(pid))).ok()?;
        Some(pgid.as_raw())
    }
}

/// Extract the pid from a lock symlink target of the form `<host>:+<pid>`.
fn parse_lock_target(target: &str) -> Option<i32> {
    let (_, pid) = target.rsplit_once('+')?;
    pid.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn probe_allowing(executables: Vec<PathBuf>, grace_secs: u64) -> BrowserProbe {
        BrowserProbe::new(executables, Duration::from_secs(grace_secs))
    }

    fn own_exe() -> PathBuf {
        std::env::current_exe().unwrap()
    }

    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn parse_lock_target_extracts_trailing_pid() {
        assert_eq!(parse_lock_target("192.168.0.2:+4242"), Some(4242));
        assert_eq!(parse_lock_target("myhost:+1"), Some(1));
        assert_eq!(parse_lock_target("no-delimiter"), None);
        assert_eq!(parse_lock_target("host:+notanumber"), None);
    }

    #[test]
    fn resolve_reads_symlink_target() {
        let tmp = tempfile::tempdir().unwrap();
        let lock = tmp.path().join("lock");
        symlink("myhost:+31337", &lock).unwrap();

        let probe = probe_allowing(vec![], 0);
        assert_eq!(probe.resolve(&lock), Some(31337));
    }

    #[test]
    fn resolve_misses_are_none_never_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let probe = probe_allowing(vec![], 0);

        // Missing path.
        assert_eq!(probe.resolve(&tmp.path().join("lock")), None);

        // Present but not a symlink.
        let plain = tmp.path().join("plain");
        std::fs::write(&plain, "x").unwrap();
        assert_eq!(probe.resolve(&plain), None);

        // Symlink without the delimiter.
        let odd = tmp.path().join("odd");
        symlink("garbage", &odd).unwrap();
        assert_eq!(probe.resolve(&odd), None);
    }

    #[test]
    fn classify_accepts_allow_listed_executable() {
        // Our own test binary stands in for the browser.
        let mut probe = probe_allowing(vec![own_exe()], 0);
        assert_eq!(probe.classify(own_pid()), Status::Up);
    }

    #[test]
    fn classify_rejects_reused_pid_with_foreign_executable() {
        let mut probe = probe_allowing(vec![PathBuf::from("/usr/lib/firefox/firefox")], 0);
        // A live pid whose executable is not the browser must read Down.
        assert_eq!(probe.classify(own_pid()), Status::Down);
    }

    #[test]
    fn classify_rejects_dead_and_sentinel_pids() {
        let mut probe = probe_allowing(vec![own_exe()], 0);
        assert_eq!(probe.classify(-1), Status::Down);
        assert_eq!(probe.classify(999999999), Status::Down);
    }

    #[test]
    fn suspend_ready_respects_grace_period() {
        // Zero grace: our long-lived test process qualifies.
        let mut probe = probe_allowing(vec![own_exe()], 0);
        assert!(probe.suspend_ready(own_pid()));

        // A week of grace: nothing in this test run qualifies.
        let mut probe = probe_allowing(vec![own_exe()], 7 * 24 * 3600);
        assert!(!probe.suspend_ready(own_pid()));
    }

    #[test]
    fn suspend_ready_is_false_for_dead_pid() {
        let mut probe = probe_allowing(vec![own_exe()], 0);
        assert!(!probe.suspend_ready(999999999));
        assert!(!probe.suspend_ready(-1));
    }

    #[test]
    fn group_of_reports_own_process_group() {
        let probe = probe_allowing(vec![], 0);
        let pgid = probe.group_of(own_pid()).unwrap();
        assert!(pgid > 0);
    }
}
