//! The `prism versions` command for bundled backend versions.

use clap::{Args, Subcommand};
use console::Style;
use prism_core::{Config, SetVersionOutcome, VersionSupervisor};

/// Arguments for the `versions` command.
#[derive(Args, Debug)]
pub struct VersionsArgs {
    #[command(subcommand)]
    pub command: VersionsCommand,
}

#[derive(Subcommand, Debug)]
pub enum VersionsCommand {
    /// List versions from the bundled manifest
    List {
        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the persisted version
    Current,

    /// Persist the version `prism supervise` launches next
    Set {
        version: String,
    },
}

/// Execute the versions command.
pub async fn execute(args: VersionsArgs, config: &Config) -> anyhow::Result<()> {
    // One-shot commands never own a backend process.
    let mut config = config.clone();
    config.supervisor.packaged = false;
    let supervisor = VersionSupervisor::from_config(&config);

    match args.command {
        VersionsCommand::List { json } => {
            let manifest = supervisor.versions_manifest().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&manifest)?);
                return Ok(());
            }
            let current = supervisor.stored_version().await;
            let dim = Style::new().dim();
            for version in &manifest.available {
                let marker = if *version == current { "*" } else { " " };
                let mut tags = Vec::new();
                if *version == manifest.latest {
                    tags.push("latest");
                }
                if *version == manifest.default {
                    tags.push("default");
                }
                if tags.is_empty() {
                    println!("{marker} {version}");
                } else {
                    let tags = format!("({})", tags.join(", "));
                    println!("{marker} {version} {}", dim.apply_to(tags));
                }
            }
            tracing::debug!("Manifest read from {}", supervisor.manifest_path().display());
        }

        VersionsCommand::Current => {
            println!("{}", supervisor.stored_version().await);
        }

        VersionsCommand::Set { version } => {
            let outcome = supervisor.set_version(&version).await;
            if !outcome.success {
                anyhow::bail!(outcome
                    .message
                    .unwrap_or_else(|| "Failed to save backend version".to_string()));
            }
            println!("{}", describe_set(&version, &outcome));
        }
    }

    Ok(())
}

/// What `versions set` did, including whether a backend was restarted.
fn describe_set(version: &str, outcome: &SetVersionOutcome) -> String {
    if outcome.backend_started {
        return format!("Backend version set to {version}; the backend was restarted on it");
    }
    let mut message = format!(
        "Backend version set to {version}. No backend was restarted; \
         `prism supervise` launches it next."
    );
    if let Some(reason) = &outcome.message {
        message.push_str(&format!("\n  {reason}"));
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_set_reports_restart() {
        let restarted = SetVersionOutcome {
            success: true,
            backend_started: true,
            message: None,
        };
        assert_eq!(
            describe_set("2.0.0", &restarted),
            "Backend version set to 2.0.0; the backend was restarted on it"
        );

        let saved_only = SetVersionOutcome {
            success: true,
            backend_started: false,
            message: None,
        };
        let text = describe_set("2.0.0", &saved_only);
        assert!(text.starts_with("Backend version set to 2.0.0."));
        assert!(text.contains("No backend was restarted"));

        let failed_start = SetVersionOutcome {
            success: true,
            backend_started: false,
            message: Some("Backend 2.0.0 exited during startup (exit status: 3)".to_string()),
        };
        assert!(describe_set("2.0.0", &failed_start).ends_with("(exit status: 3)"));
    }
}
