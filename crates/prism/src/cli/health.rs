//! The `prism health` command.

use clap::Args;
use console::Style;
use prism_core::{Config, ConnectionState, HealthCheck, Prism};

/// Arguments for the `health` command.
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Keep polling until Ctrl+C, printing every change
    #[arg(short, long)]
    pub watch: bool,
}

/// Execute the health command.
pub async fn execute(args: HealthArgs, config: Config) -> anyhow::Result<()> {
    let mut prism = Prism::new(config);
    let url = prism.registry().active_url().await;
    let dim = Style::new().dim();
    println!("{}", dim.apply_to(format!("Backend: {url}")));

    if !args.watch {
        let status = prism.health().check_health().await;
        println!("{}", super::format_health(&status));
        if !status.online {
            anyhow::bail!("Backend is offline");
        }
        let version = prism.health().backend_version().await;
        println!("  version: {version}");
        return Ok(());
    }

    let mut updates = prism.start_polling().subscribe();
    let mut last_printed: Option<ConnectionState> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                if state.checked && last_printed.as_ref() != Some(&state) {
                    print_state(&state);
                    last_printed = Some(state);
                }
            }
        }
    }

    prism.stop_polling();
    Ok(())
}

fn print_state(state: &ConnectionState) {
    match &state.version {
        Some(version) => println!("{}  (version {version})", super::format_health(&state.status)),
        None => println!("{}", super::format_health(&state.status)),
    }
}
