//! Supervisor core — runtime state, mode state machine, reconciliation loop.
//!
//! The supervisor owns one `RuntimeEntry` per profile and is the only task
//! that ever touches them; the command front end reaches in exclusively
//! through a rendezvous channel pair. Each tick polls the focused window,
//! reconciles every entry when focus changed or a command just landed, then
//! drains at most one pending command and acknowledges it. Mutual exclusion
//! is by confinement: no locks, one owner.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, SyncSender, TryRecvError, sync_channel};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{debug, info, warn};

use crate::mode::{Mode, Status};
use crate::probe::ProcessProbe;
use crate::process::ProcessControl;
use crate::profile::Profile;
use crate::store::{self, PolicyEntry};
use crate::window::WindowOracle;

/// A validated command forwarded by the front end.
///
/// Validation happens before the channel: the core treats any impossible
/// payload (say, a profile it has never heard of) as a programming
/// invariant violation, not user error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Exit,
    List,
    Save,
    Set { profile: String, mode: Mode },
    Shutdown,
    StartAll,
}

/// Completion acknowledgment sent back after each command.
#[derive(Debug)]
pub struct Ack;

/// Front-end side of the channel pair.
///
/// `dispatch` blocks until the loop has fully applied the command, which
/// rate-limits the front end to one in-flight command by construction.
pub struct CommandHandle {
    commands: SyncSender<Command>,
    acks: Receiver<Ack>,
}

impl CommandHandle {
    pub fn dispatch(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .context("supervisor loop is gone")?;
        self.acks
            .recv()
            .context("supervisor loop dropped the acknowledgment")?;
        Ok(())
    }
}

/// Live, mutable record for one profile.
#[derive(Debug)]
struct RuntimeEntry {
    /// Last pid seen by the probe; `-1` until first resolution. Only
    /// meaningful while `status == Up` — a Down entry is never signaled.
    pid: i32,
    status: Status,
    lock_path: PathBuf,
    mode: Mode,
    /// Consecutive reconcile passes a requested start has stayed Down.
    start_pending: u32,
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub policy_path: PathBuf,
    pub tick: Duration,
    pub start_warn_ticks: u32,
}

/// The aggregate owning all runtime state and both channel endpoints.
pub struct Supervisor<O, P, C> {
    entries: BTreeMap<String, RuntimeEntry>,
    /// Stored policies for profiles not in the live set; carried through
    /// unchanged and re-emitted on save.
    foreign: BTreeMap<String, Mode>,
    oracle: O,
    probe: P,
    control: C,
    opts: SupervisorOptions,
    commands: Receiver<Command>,
    acks: SyncSender<Ack>,
}

#[derive(Debug)]
enum Flow {
    Continue,
    Exit,
}

impl<O, P, C> Supervisor<O, P, C>
where
    O: WindowOracle,
    P: ProcessProbe,
    C: ProcessControl,
{
    /// Build runtime state from the profile set and the stored policy list.
    ///
    /// Profiles without a stored policy default to `None` (unmanaged);
    /// stored names without a live profile are kept aside as foreign.
    pub fn new(
        profiles: &BTreeMap<String, Profile>,
        browser_home: &Path,
        stored: &[PolicyEntry],
        oracle: O,
        probe: P,
        control: C,
        opts: SupervisorOptions,
    ) -> (Self, CommandHandle) {
        let stored_map = store::to_map(stored);

        let entries: BTreeMap<String, RuntimeEntry> = profiles
            .values()
            .map(|profile| {
                let mode = stored_map.get(&profile.name).copied().unwrap_or_default();
                let entry = RuntimeEntry {
                    pid: -1,
                    status: Status::Down,
                    lock_path: profile.lock_path(browser_home),
                    mode,
                    start_pending: 0,
                };
                (profile.name.clone(), entry)
            })
            .collect();

        let foreign: BTreeMap<String, Mode> = stored_map
            .into_iter()
            .filter(|(name, _)| !entries.contains_key(name))
            .collect();
        if !foreign.is_empty() {
            info!(count = foreign.len(), "policy store has entries for unknown profiles");
        }

        let (command_tx, command_rx) = sync_channel(0);
        let (ack_tx, ack_rx) = sync_channel(0);

        let supervisor = Self {
            entries,
            foreign,
            oracle,
            probe,
            control,
            opts,
            commands: command_rx,
            acks: ack_tx,
        };
        let handle = CommandHandle {
            commands: command_tx,
            acks: ack_rx,
        };
        (supervisor, handle)
    }

    /// The reconciliation loop. Runs until the front end disconnects or an
    /// `exit` command terminates the process.
    pub fn run(mut self) -> Result<()> {
        self.refresh_all();
        info!(profiles = self.entries.len(), "supervisor loop started");

        let mut command_seen = false;
        let mut prev_focus = self.oracle.active_window();

        loop {
            std::thread::sleep(self.opts.tick);

            let focus = self.oracle.active_window();
            if command_seen || focus != prev_focus {
                self.reconcile();
            }
            prev_focus = focus;

            command_seen = match self.commands.try_recv() {
                Ok(command) => {
                    debug!(?command, "processing command");
                    let flow = self.handle_command(command)?;
                    let _ = self.acks.send(Ack);
                    if let Flow::Exit = flow {
                        info!("exit requested, terminating");
                        std::process::exit(0);
                    }
                    true
                }
                Err(TryRecvError::Empty) => false,
                Err(TryRecvError::Disconnected) => {
                    info!("front end closed, supervisor loop stopping");
                    return Ok(());
                }
            };
        }
    }

    /// Run the mode state machine over every entry: refresh observed
    /// state, apply policy, refresh again so the next `list` reflects
    /// post-action reality.
    fn reconcile(&mut self) {
        let focused = focused_group(&self.oracle, &self.probe);

        for (name, entry) in &mut self.entries {
            refresh(&mut self.probe, entry);
            apply_mode(
                name,
                entry,
                focused,
                &self.oracle,
                &mut self.probe,
                &mut self.control,
                self.opts.start_warn_ticks,
            );
            refresh(&mut self.probe, entry);
        }
    }

    fn refresh_all(&mut self) {
        for entry in self.entries.values_mut() {
            refresh(&mut self.probe, entry);
        }
    }

    fn handle_command(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Exit => return Ok(Flow::Exit),
            Command::List => self.print_list(),
            Command::Save => self.save()?,
            Command::Set { profile, mode } => {
                let Some(entry) = self.entries.get_mut(&profile) else {
                    bail!("set for unknown profile {profile:?} reached the supervisor");
                };
                info!(profile, %mode, "mode changed");
                entry.mode = mode;
            }
            Command::Shutdown => {
                info!("shutdown: switching every profile to Off");
                for entry in self.entries.values_mut() {
                    entry.mode = Mode::Off;
                }
            }
            Command::StartAll => {
                for (name, entry) in &mut self.entries {
                    if entry.mode != Mode::None && entry.status == Status::Down {
                        request_start(&mut self.control, name, entry, self.opts.start_warn_ticks);
                    }
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn print_list(&self) {
        let width = self
            .entries
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0);
        for (name, entry) in &self.entries {
            let mode = entry.mode.to_string();
            println!("{name:<width$}   {mode:<7}   ({})", entry.status);
        }
    }

    fn save(&self) -> Result<()> {
        let mut list: Vec<PolicyEntry> = self
            .entries
            .iter()
            .map(|(name, entry)| PolicyEntry {
                name: name.clone(),
                mode: entry.mode,
            })
            .collect();
        list.extend(self.foreign.iter().map(|(name, &mode)| PolicyEntry {
            name: name.clone(),
            mode,
        }));
        store::save(&self.opts.policy_path, &list)
    }
}

/// Process group owning the focused window, if any. Oracle misses read as
/// "no active window this tick" and reconciliation proceeds.
fn focused_group<O: WindowOracle, P: ProcessProbe>(oracle: &O, probe: &P) -> Option<i32> {
    let window = oracle.active_window()?;
    let pid = oracle.owner_pid(&window)?;
    probe.group_of(pid)
}

/// Re-derive `status`/`pid` from the probe.
fn refresh<P: ProcessProbe>(probe: &mut P, entry: &mut RuntimeEntry) {
    match probe.resolve(&entry.lock_path) {
        Some(pid) => {
            entry.pid = pid;
            entry.status = probe.classify(pid);
        }
        None => entry.status = Status::Down,
    }
    if entry.status == Status::Up {
        entry.start_pending = 0;
    }
}

fn apply_mode<O, P, C>(
    name: &str,
    entry: &mut RuntimeEntry,
    focused: Option<i32>,
    oracle: &O,
    probe: &mut P,
    control: &mut C,
    start_warn_ticks: u32,
) where
    O: WindowOracle,
    P: ProcessProbe,
    C: ProcessControl,
{
    match entry.mode {
        Mode::Auto => {
            if entry.status == Status::Down {
                request_start(control, name, entry, start_warn_ticks);
            } else if focused == Some(entry.pid) {
                control.resume_group(entry.pid);
            } else {
                maybe_suspend(probe, control, entry);
            }
        }
        Mode::On => match entry.status {
            Status::Up => control.resume_group(entry.pid),
            Status::Down => request_start(control, name, entry, start_warn_ticks),
        },
        Mode::Off => request_shutdown(oracle, control, entry),
        Mode::Suspend => {
            if entry.status == Status::Up {
                maybe_suspend(probe, control, entry);
            }
        }
        Mode::None => {}
    }
}

fn request_start<C: ProcessControl>(
    control: &mut C,
    name: &str,
    entry: &mut RuntimeEntry,
    start_warn_ticks: u32,
) {
    control.start(name);
    entry.start_pending = entry.start_pending.saturating_add(1);
    if entry.start_pending == start_warn_ticks {
        warn!(
            profile = name,
            passes = start_warn_ticks,
            "instance still down after repeated start requests"
        );
    }
}

/// Suspend only once the grace period elapsed and the group is not
/// already stopped; both checked by the probe.
fn maybe_suspend<P: ProcessProbe, C: ProcessControl>(
    probe: &mut P,
    control: &mut C,
    entry: &RuntimeEntry,
) {
    if probe.suspend_ready(entry.pid) {
        control.pause_group(entry.pid);
    }
}

/// Graceful shutdown: wake the group (a stopped process cannot handle a
/// close request), then ask the window manager to close its window. With
/// no window this tick it silently retries on the next one — Mode stays
/// `Off`, so the request cannot be lost.
fn request_shutdown<O: WindowOracle, C: ProcessControl>(
    oracle: &O,
    control: &mut C,
    entry: &RuntimeEntry,
) {
    if entry.status != Status::Up {
        return;
    }
    if let Some(window) = oracle.window_of_pid(entry.pid) {
        control.resume_group(entry.pid);
        oracle.request_close(&window);
    }
}
