use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "foxherd",
    about = "Profile-aware Firefox instance supervisor",
    version
)]
pub struct Cli {
    /// Defaults to `run` when no subcommand is given.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire the instance lock and run the supervisor with its REPL
    Run,

    /// One-shot: print profiles, modes and statuses, then exit
    List,

    /// Show effective settings
    Config,
}
