//! Declared policy and observed status for a supervised profile.
//!
//! `Mode` is what the user wants for a profile; `Status` is what the process
//! probe actually observed. The two are independent axes: a profile can be
//! `Off` by policy and still `Up` until the shutdown lands, or `On` and
//! `Down` right after a crash. Reconciliation closes the gap without ever
//! confusing one for the other.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Lifecycle policy declared for a profile.
///
/// Serializes as the exact variant word (`"Auto"`, `"On"`, ...) so the
/// policy store stays human-editable and round-trips losslessly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Mode {
    /// Tie the instance to window focus: running while focused, suspended
    /// otherwise, started if missing.
    Auto,
    /// Always running, never suspended.
    On,
    /// Gracefully shut down, retried every tick while the process lives.
    Off,
    /// Suspended whenever up; never started or stopped.
    Suspend,
    /// Unmanaged — the supervisor never touches this profile.
    #[default]
    None,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Auto, Mode::On, Mode::Off, Mode::Suspend, Mode::None];

    /// Parse a user-typed mode word (case-insensitive).
    ///
    /// The REPL accepts `auto`/`AUTO`/`Auto` alike; the persisted form is
    /// always the strict variant word handled by [`FromStr`].
    pub fn from_word(word: &str) -> Option<Mode> {
        match word.to_ascii_lowercase().as_str() {
            "auto" => Some(Mode::Auto),
            "on" => Some(Mode::On),
            "off" => Some(Mode::Off),
            "suspend" => Some(Mode::Suspend),
            "none" => Some(Mode::None),
            _ => None,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let word = match self {
            Mode::Auto => "Auto",
            Mode::On => "On",
            Mode::Off => "Off",
            Mode::Suspend => "Suspend",
            Mode::None => "None",
        };
        f.write_str(word)
    }
}

impl FromStr for Mode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Auto" => Ok(Mode::Auto),
            "On" => Ok(Mode::On),
            "Off" => Ok(Mode::Off),
            "Suspend" => Ok(Mode::Suspend),
            "None" => Ok(Mode::None),
            other => Err(UnknownMode(other.to_string())),
        }
    }
}

/// Error for a mode word that matches no variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown mode word: {0:?}")]
pub struct UnknownMode(pub String);

/// Observed liveness of a profile's process, derived each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Up,
    Down,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Up => "Up",
            Status::Down => "Down",
        })
    }
}
