//! Single-instance pid-file lock.
//!
//! One supervisor per machine, enforced with a pid file under the runtime
//! directory plus a non-blocking exclusive `flock`. The lock lives exactly
//! as long as the returned handle: the kernel drops the advisory lock when
//! the file handle closes, on every exit path including panics and signals.
//!
//! A stale file (recorded pid no longer alive) is taken over; contention
//! with a live holder is fatal and reported with the holder's pid.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another supervisor is already running (pid {pid})")]
    AlreadyRunning { pid: i32 },
    #[error("failed to open lock file {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write pid to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Holds the advisory lock on the supervisor pid file.
#[derive(Debug)]
pub struct InstanceLock {
    // Held, never read: the open descriptor IS the lock.
    _file: File,
    path: PathBuf,
}

impl InstanceLock {
    /// Acquire the machine-wide supervisor lock.
    ///
    /// On contention the previously recorded pid decides the outcome: a
    /// live holder means `AlreadyRunning`; a dead or unreadable one gets a
    /// second acquisition attempt (the holder may have died between the
    /// two calls). Persistent contention is treated as a live holder.
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LockError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        if file.try_lock_exclusive().is_err() {
            let recorded = read_recorded_pid(&mut file);
            match recorded {
                Some(pid) if pid_alive(pid) => {
                    return Err(LockError::AlreadyRunning { pid });
                }
                _ => {
                    // Stale or unreadable record; the holder may just have
                    // exited. One more attempt before giving up.
                    if file.try_lock_exclusive().is_err() {
                        return Err(LockError::AlreadyRunning {
                            pid: recorded.unwrap_or(-1),
                        });
                    }
                    warn!(path = %path.display(), "took over stale supervisor lock");
                }
            }
        }

        write_own_pid(&mut file).map_err(|source| LockError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), pid = std::process::id(), "instance lock acquired");

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_recorded_pid(file: &mut File) -> Option<i32> {
    let mut buf = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut buf).ok()?;
    buf.trim().parse().ok()
}

fn write_own_pid(file: &mut File) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    write!(file, "{}", std::process::id())?;
    file.flush()
}

/// Signal-zero liveness probe.
fn pid_alive(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).is_ok()
}
