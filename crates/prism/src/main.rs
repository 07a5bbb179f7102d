//! Prism CLI - submit images to a Prism transformation backend.
//!
//! Prism validates a transformation request locally, uploads the image to the
//! selected backend (latest or pinned), and saves the transformed result. It
//! also reports backend health and supervises a bundled backend process in
//! packaged installs.
//!
//! # Usage
//!
//! ```bash
//! # Resize and rotate hue
//! prism transform photo.jpg --width 800 --height 600 --hue 45
//!
//! # Use a JSON request instead of flags
//! prism transform photo.jpg --specs request.json --output out.png
//!
//! # Watch backend health
//! prism health --watch
//!
//! # Switch to the pinned backend
//! prism backend select pinned
//!
//! # Run the bundled backend in the foreground
//! prism supervise
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Prism - client for a remote image transformation backend.
#[derive(Parser, Debug)]
#[command(name = "prism")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Transform an image on the selected backend
    Transform(cli::transform::TransformArgs),

    /// Check backend health, once or continuously
    Health(cli::health::HealthArgs),

    /// List and switch between the latest and pinned backends
    Backend(cli::backend::BackendArgs),

    /// Inspect bundled backend versions and the persisted choice
    Versions(cli::versions::VersionsArgs),

    /// Run the bundled backend in the foreground
    Supervise(cli::supervise::SuperviseArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so use eprintln for config warnings.
    let config = match prism_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `prism config path`."
            );
            prism_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Prism v{}", prism_core::VERSION);

    match cli.command {
        Commands::Transform(args) => cli::transform::execute(args, config).await,
        Commands::Health(args) => cli::health::execute(args, config).await,
        Commands::Backend(args) => cli::backend::execute(args, &config).await,
        Commands::Versions(args) => cli::versions::execute(args, &config).await,
        Commands::Supervise(args) => cli::supervise::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, &config).await,
    }
}
