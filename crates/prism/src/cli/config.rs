//! The `prism config` command.
//!
//! Besides the TOML itself, shows where Prism keeps its state: the
//! latest/pinned choice, the persisted backend version, and the manifest
//! of bundled versions.

use clap::{Args, Subcommand};
use console::Style;
use prism_core::supervisor::ManifestLocator;
use prism_core::Config;
use std::path::PathBuf;

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display the effective configuration and the files it resolves to
    Show,

    /// List the config file and every state file Prism reads or writes
    Path,

    /// Write a config file with defaults
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            println!("{}", config.to_toml()?);
            println!("# Resolved paths");
            for (label, path) in resolved_paths(config) {
                println!("# {label:<10} {}", path.display());
            }
        }

        ConfigCommand::Path => {
            let dim = Style::new().dim();
            for (label, path) in resolved_paths(config) {
                let marker = if path.exists() { " " } else { "?" };
                println!("{marker} {label:<10} {}", path.display());
            }
            println!("{}", dim.apply_to("(? = not created yet)"));
        }

        ConfigCommand::Init { force } => {
            let path = Config::default_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists at: {}\nUse --force to overwrite.",
                    path.display()
                );
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, Config::default().to_toml()?)?;

            tracing::info!("Config file created at: {}", path.display());
            println!("Configuration initialized at: {}", path.display());
            println!("Backend state will be kept in {}", config.data_dir().display());
        }
    }

    Ok(())
}

/// Every file or directory the effective config resolves to, in display order.
fn resolved_paths(config: &Config) -> Vec<(&'static str, PathBuf)> {
    let manifest = ManifestLocator::new(config.resources_dir(), config.dev_resources_dir());
    vec![
        ("config", Config::default_path()),
        ("data", config.data_dir()),
        ("selection", config.selection_file()),
        ("version", config.version_file()),
        ("manifest", manifest.path()),
    ]
}
