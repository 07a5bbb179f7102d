//! The `prism supervise` command.
//!
//! Launches the persisted backend version and keeps it alive in the
//! foreground. Commands typed on stdin switch versions or restart the
//! backend; Ctrl+C or end of input stops it.

use clap::Args;
use console::Style;
use prism_core::{Config, StartOutcome, VersionSupervisor};
use std::io::BufRead;
use tokio::sync::mpsc;

/// Arguments for the `supervise` command.
#[derive(Args, Debug)]
pub struct SuperviseArgs {
    /// Supervise even when not running as a packaged install
    #[arg(long)]
    pub force: bool,
}

/// A line typed during a supervise session.
#[derive(Debug, PartialEq, Eq)]
enum SessionCommand {
    Set(String),
    Start(Option<String>),
    Stop,
    Status,
    Versions,
    Help,
    Quit,
}

impl SessionCommand {
    fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return Ok(None);
        };
        let argument = words.next().map(str::to_string);
        if words.next().is_some() {
            return Err(format!("Too many arguments for '{command}'"));
        }

        let parsed = match (command, argument) {
            ("set", Some(version)) => SessionCommand::Set(version),
            ("set", None) => return Err("Usage: set <version>".to_string()),
            ("start", version) => SessionCommand::Start(version),
            ("stop", None) => SessionCommand::Stop,
            ("status", None) => SessionCommand::Status,
            ("versions", None) => SessionCommand::Versions,
            ("help", None) => SessionCommand::Help,
            ("quit" | "exit", None) => SessionCommand::Quit,
            (other, _) => return Err(format!("Unknown command '{other}' (try 'help')")),
        };
        Ok(Some(parsed))
    }
}

const HELP: &str = "\
Commands:
  set <version>     persist a version and restart the backend on it
  start [version]   start the stored (or given) version if not running
  stop              stop the backend
  status            show the backend state
  versions          list bundled versions
  quit              stop the backend and exit";

/// Execute the supervise command.
pub async fn execute(args: SuperviseArgs, mut config: Config) -> anyhow::Result<()> {
    if args.force {
        config.supervisor.packaged = true;
    }
    let supervisor = VersionSupervisor::from_config(&config);
    if !supervisor.is_packaged() {
        anyhow::bail!(
            "Not running as a packaged install. \
             Set supervisor.packaged, PRISM_PACKAGED=1, or pass --force."
        );
    }

    if let Some(outcome) = supervisor.start_stored().await {
        print_start(&outcome);
    }
    println!("{}", Style::new().dim().apply_to("Type 'help' for commands, Ctrl+C to stop."));

    let mut lines = spawn_stdin_reader();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.recv() => {
                let Some(line) = line else { break };
                match SessionCommand::parse(&line) {
                    Ok(Some(SessionCommand::Quit)) => break,
                    Ok(Some(command)) => run_command(&supervisor, command).await,
                    Ok(None) => {}
                    Err(message) => eprintln!("{}", Style::new().yellow().apply_to(message)),
                }
            }
        }
    }

    supervisor.stop().await;
    println!("Backend stopped");
    Ok(())
}

async fn run_command(supervisor: &VersionSupervisor, command: SessionCommand) {
    match command {
        SessionCommand::Set(version) => {
            let outcome = supervisor.set_version(&version).await;
            if !outcome.success {
                print_failure(outcome.message.as_deref().unwrap_or("Failed to save version"));
            } else if outcome.backend_started {
                let url = supervisor.backend_url();
                print_success(&format!("Backend {version} is running on {url}"));
            } else {
                print_failure(&format!(
                    "Saved {version}, but the backend did not start: {}",
                    outcome.message.as_deref().unwrap_or("unknown error")
                ));
            }
        }
        SessionCommand::Start(version) => {
            print_start(&supervisor.try_start(version.as_deref()).await);
        }
        SessionCommand::Stop => {
            supervisor.stop().await;
            println!("Backend stopped");
        }
        SessionCommand::Status => match supervisor.running().await {
            Some((version, pid)) => println!(
                "{} {version} on {} (pid {})",
                supervisor.state(),
                supervisor.backend_url(),
                pid.map(|p| p.to_string()).unwrap_or_else(|| "?".to_string())
            ),
            None => println!(
                "{} (stored version {})",
                supervisor.state(),
                supervisor.stored_version().await
            ),
        },
        SessionCommand::Versions => {
            let manifest = supervisor.versions_manifest().await;
            println!(
                "{} (latest {}, default {})",
                manifest.available.join(", "),
                manifest.latest,
                manifest.default
            );
        }
        SessionCommand::Help => println!("{HELP}"),
        SessionCommand::Quit => {}
    }
}

fn print_start(outcome: &StartOutcome) {
    match (outcome.started, outcome.message.as_deref()) {
        (true, Some(message)) => print_success(message),
        (true, None) => print_success("Backend started"),
        (false, message) => print_failure(message.unwrap_or("Backend failed to start")),
    }
}

fn print_success(message: &str) {
    println!("{} {message}", Style::new().green().apply_to("✓"));
}

fn print_failure(message: &str) {
    eprintln!("{} {message}", Style::new().red().apply_to("✗"));
}

/// Blocking stdin reads on a dedicated thread, so shutdown never waits on them.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
