//! The `prism backend` command for latest/pinned selection.

use clap::{Args, Subcommand};
use console::Style;
use prism_core::{BackendId, BackendRegistry, Config};

/// Arguments for the `backend` command.
#[derive(Args, Debug)]
pub struct BackendArgs {
    #[command(subcommand)]
    pub command: BackendCommand,
}

#[derive(Subcommand, Debug)]
pub enum BackendCommand {
    /// List both backends with their URLs
    List,

    /// Show the selected backend
    Show,

    /// Select the backend used by later commands
    Select {
        /// "latest" or "pinned"
        backend: BackendId,
    },
}

/// Execute the backend command.
pub async fn execute(args: BackendArgs, config: &Config) -> anyhow::Result<()> {
    let registry = BackendRegistry::from_config(config);

    match args.command {
        BackendCommand::List => {
            let selected = registry.selected().await;
            let bold = Style::new().bold();
            for option in registry.list_options() {
                let marker = if option.id == selected { "*" } else { " " };
                println!(
                    "{marker} {:<8} {:<20} {}",
                    option.id,
                    bold.apply_to(&option.label),
                    option.url
                );
            }
        }

        BackendCommand::Show => {
            let selected = registry.selected().await;
            println!("{selected} {}", registry.resolve_url(selected));
        }

        BackendCommand::Select { backend } => {
            registry.select(backend).await?;
            tracing::info!("Selected {backend} backend");
            println!("Selected {backend} backend at {}", registry.resolve_url(backend));
        }
    }

    Ok(())
}
