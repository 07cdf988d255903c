mod cli;
mod config;
mod lock;
mod mode;
mod paths;
mod probe;
mod process;
mod profile;
mod repl;
mod store;
mod supervisor;
mod window;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use cli::{Cli, Command};
use config::Settings;
use lock::InstanceLock;
use paths::Paths;
use probe::{BrowserProbe, ProcessProbe};
use process::BrowserControl;
use supervisor::{Supervisor, SupervisorOptions};
use window::X11Oracle;

fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "foxherd=info",
        1 => "foxherd=debug",
        _ => "foxherd=trace",
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .init();

    let paths = Paths::discover()?;
    let (settings, settings_path) = Settings::load(&paths.settings_file())?;
    match settings_path {
        Some(ref p) => info!("loaded settings from {}", p.display()),
        None => info!("no config.toml found, using defaults"),
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&paths, settings),
        Command::List => list_once(&paths, settings),
        Command::Config => {
            print!("{}", render_settings(&settings, settings_path.as_deref()));
            Ok(())
        }
    }
}

/// The supervisor proper: lock, discover, reconcile, prompt.
fn run(paths: &Paths, settings: Settings) -> Result<()> {
    let instance_lock = InstanceLock::acquire(&paths.pid_file())
        .context("cannot acquire the supervisor instance lock")?;
    info!(path = %instance_lock.path().display(), "instance lock acquired");

    let profiles = profile::discover(&paths.browser_home)?;
    let stored = store::load(&paths.policy_file())?;
    let oracle = X11Oracle::probe().context("window system unreachable at startup")?;
    let probe = BrowserProbe::new(settings.browser.executables.clone(), settings.suspend_grace());
    let control = BrowserControl::new(settings.browser.program.clone(), settings.browser.args.clone());

    let (supervisor, handle) = Supervisor::new(
        &profiles,
        &paths.browser_home,
        &stored,
        oracle,
        probe,
        control,
        SupervisorOptions {
            policy_path: paths.policy_file(),
            tick: settings.tick_interval(),
            start_warn_ticks: settings.supervisor.start_warn_ticks,
        },
    );

    ctrlc::set_handler(|| {
        // The kernel releases the instance lock with our descriptors.
        info!("interrupted, shutting down");
        std::process::exit(0);
    })
    .context("failed to install the interrupt handler")?;

    std::thread::spawn(move || {
        if let Err(e) = supervisor.run() {
            error!("supervisor loop failed: {e:#}");
            std::process::exit(1);
        }
    });

    let names: Vec<String> = profiles.keys().cloned().collect();
    repl::run(handle, &names)
}

/// `foxherd list` — probe once without locking or looping, so it works
/// alongside a running supervisor.
fn list_once(paths: &Paths, settings: Settings) -> Result<()> {
    let profiles = profile::discover(&paths.browser_home)?;
    let stored = store::load(&paths.policy_file())?;
    let modes = store::to_map(&stored);
    let mut probe = BrowserProbe::new(settings.browser.executables.clone(), settings.suspend_grace());

    let width = profiles.keys().map(|name| name.len()).max().unwrap_or(0);
    for (name, profile) in &profiles {
        let mode = modes.get(name).copied().unwrap_or_default().to_string();
        let status = match probe.resolve(&profile.lock_path(&paths.browser_home)) {
            Some(pid) => probe.classify(pid),
            None => mode::Status::Down,
        };
        println!("{name:<width$}   {mode:<7}   ({status})");
    }
    Ok(())
}

fn render_settings(settings: &Settings, source: Option<&std::path::Path>) -> String {
    let mut out = String::new();
    out.push_str("Browser\n");
    out.push_str(&format!("  {:<20} {}\n", "program", settings.browser.program));
    out.push_str(&format!(
        "  {:<20} {}\n",
        "args",
        settings.browser.args.join(" ")
    ));
    for exe in &settings.browser.executables {
        out.push_str(&format!("  {:<20} {}\n", "executable", exe.display()));
    }
    out.push('\n');
    out.push_str("Supervisor\n");
    out.push_str(&format!(
        "  {:<20} {}\n",
        "tick_interval_ms", settings.supervisor.tick_interval_ms
    ));
    out.push_str(&format!(
        "  {:<20} {}\n",
        "suspend_grace_secs", settings.supervisor.suspend_grace_secs
    ));
    out.push_str(&format!(
        "  {:<20} {}\n",
        "start_warn_ticks", settings.supervisor.start_warn_ticks
    ));
    out.push('\n');
    out.push_str("Source\n");
    let source = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults — no config.toml found)".to_string());
    out.push_str(&format!("  {:<20} {}\n", "path", source));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_filter_tracks_verbosity() {
        assert_eq!(log_filter(0), "foxherd=info");
        assert_eq!(log_filter(1), "foxherd=debug");
        assert_eq!(log_filter(2), "foxherd=trace");
        assert_eq!(log_filter(9), "foxherd=trace");
    }

    #[test]
    fn render_settings_lists_sections_and_source() {
        let rendered = render_settings(&Settings::default(), None);
        assert!(rendered.contains("Browser"));
        assert!(rendered.contains("Supervisor"));
        assert!(rendered.contains("firefox"));
        assert!(rendered.contains("tick_interval_ms"));
        assert!(rendered.contains("(defaults — no config.toml found)"));
    }

    #[test]
    fn render_settings_shows_the_source_path() {
        let rendered = render_settings(
            &Settings::default(),
            Some(std::path::Path::new("/etc/foxherd/config.toml")),
        );
        assert!(rendered.contains("/etc/foxherd/config.toml"));
    }
}
