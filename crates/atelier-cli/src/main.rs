use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "atelier-cli", version, about = "Atelier CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate required hours for a plan
    Estimate(commands::estimate::EstimateArgs),
    /// Delivery projection, generation, and reconciliation
    Projection {
        #[command(subcommand)]
        action: commands::projection::ProjectionAction,
    },
    /// Capacity block management
    Block {
        #[command(subcommand)]
        action: commands::block::BlockAction,
    },
    /// Per-block time tracking
    Track {
        #[command(subcommand)]
        action: commands::track::TrackAction,
    },
    /// Project management
    Project {
        #[command(subcommand)]
        action: commands::project::ProjectAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Estimate(args) => commands::estimate::run(args),
        Commands::Projection { action } => commands::projection::run(action),
        Commands::Block { action } => commands::block::run(action),
        Commands::Track { action } => commands::track::run(action),
        Commands::Project { action } => commands::project::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
