//! Interactive command front end.
//!
//! Reads lines from stdin, validates them against the fixed grammar and the
//! known profile set, and forwards typed commands to the supervisor loop.
//! Anything malformed is rejected right here with a diagnostic and the help
//! listing; the core only ever sees well-formed commands. After forwarding,
//! the front end blocks until the loop acknowledges, so at most one command
//! is ever in flight.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::mode::Mode;
use crate::supervisor::{Command, CommandHandle};

/// Outcome of local validation.
#[derive(Debug, PartialEq, Eq)]
enum Action {
    /// Handled entirely in the front end.
    Help,
    /// Forwarded to the supervisor loop.
    Forward(Command),
}

/// Line loop until `exit` kills the process or stdin closes.
pub fn run(handle: CommandHandle, profiles: &[String]) -> Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        write!(stdout, "> ")?;
        stdout.flush()?;

        line.clear();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .context("failed to read stdin")?;
        if read == 0 {
            // EOF: hand control back to main, which tears everything down.
            return Ok(());
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match parse(input, profiles) {
            Ok(Action::Help) => print_help(),
            Ok(Action::Forward(command)) => handle.dispatch(command)?,
            Err(reason) => {
                println!("invalid command: {reason}");
                print_help();
            }
        }
    }
}

/// Validate one input line against the grammar and the profile set.
fn parse(input: &str, profiles: &[String]) -> Result<Action, String> {
    let words: Vec<&str> = input.split_whitespace().collect();
    let Some((&command, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };

    match command {
        "help" => {
            if args.is_empty() {
                Ok(Action::Help)
            } else {
                Err("help takes no arguments".to_string())
            }
        }
        "exit" | "list" | "save" | "shutdown" | "start" => {
            if !args.is_empty() {
                return Err(format!("{command} takes no arguments"));
            }
            Ok(Action::Forward(match command {
                "exit" => Command::Exit,
                "list" => Command::List,
                "save" => Command::Save,
                "shutdown" => Command::Shutdown,
                _ => Command::StartAll,
            }))
        }
        "set" => {
            let [profile, mode_word] = args else {
                return Err("usage: set <profile> <mode>".to_string());
            };
            if !profiles.iter().any(|known| known == profile) {
                return Err(format!("unknown profile {profile:?}"));
            }
            let Some(mode) = Mode::from_word(mode_word) else {
                return Err(format!(
                    "unknown mode {mode_word:?} (expected auto/on/off/suspend/none)"
                ));
            };
            Ok(Action::Forward(Command::Set {
                profile: profile.to_string(),
                mode,
            }))
        }
        other => Err(format!("unknown command {other:?}")),
    }
}

fn print_help() {
    println!();
    let commands = [
        ("exit", "Exit the supervisor"),
        ("list", "Show profiles, modes and statuses"),
        ("save", "Persist modes to the policy store"),
        ("set <profile> <mode>", "Set the mode for one profile"),
        ("shutdown", "Switch every profile to Off"),
        ("start", "Start every managed profile that is down"),
    ];
    for (text, description) in commands {
        println!("{text:<22}{description}");
    }
    println!();
    println!("modes");
    println!("-----------------------");
    let modes = [
        ("auto", "Follow window focus"),
        ("on", "Always running"),
        ("off", "Always shut down"),
        ("suspend", "Always suspended"),
        ("none", "Leave the profile alone"),
    ];
    for (text, description) in modes {
        println!("{text:<22}{description}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        vec!["default".to_string(), "work".to_string()]
    }

    #[test]
    fn bare_commands_forward() {
        assert_eq!(
            parse("exit", &known()),
            Ok(Action::Forward(Command::Exit))
        );
        assert_eq!(
            parse("list", &known()),
            Ok(Action::Forward(Command::List))
        );
        assert_eq!(
            parse("save", &known()),
            Ok(Action::Forward(Command::Save))
        );
        assert_eq!(
            parse("shutdown", &known()),
            Ok(Action::Forward(Command::Shutdown))
        );
        assert_eq!(
            parse("start", &known()),
            Ok(Action::Forward(Command::StartAll))
        );
    }

    #[test]
    fn help_stays_local() {
        assert_eq!(parse("help", &known()), Ok(Action::Help));
    }

    #[test]
    fn bare_commands_reject_extra_arguments() {
        assert!(parse("exit now", &known()).is_err());
        assert!(parse("shutdown all", &known()).is_err());
        assert!(parse("help me", &known()).is_err());
    }

    #[test]
    fn set_builds_a_typed_command() {
        assert_eq!(
            parse("set work auto", &known()),
            Ok(Action::Forward(Command::Set {
                profile: "work".to_string(),
                mode: Mode::Auto,
            }))
        );
    }

    #[test]
    fn set_mode_word_is_case_insensitive() {
        assert_eq!(
            parse("set work SUSPEND", &known()),
            Ok(Action::Forward(Command::Set {
                profile: "work".to_string(),
                mode: Mode::Suspend,
            }))
        );
    }

    #[test]
    fn set_rejects_unknown_profile_without_forwarding() {
        let err = parse("set vacation auto", &known()).unwrap_err();
        assert!(err.contains("unknown profile"));
    }

    #[test]
    fn set_rejects_bad_arity_and_bad_mode() {
        assert!(parse("set work", &known()).is_err());
        assert!(parse("set work auto extra", &known()).is_err());
        assert!(parse("set work sometimes", &known()).is_err());
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = parse("restart", &known()).unwrap_err();
        assert!(err.contains("unknown command"));
    }

    #[test]
    fn whitespace_is_insignificant() {
        assert_eq!(
            parse("  set   work   on  ", &known()),
            Ok(Action::Forward(Command::Set {
                profile: "work".to_string(),
                mode: Mode::On,
            }))
        );
    }
}
