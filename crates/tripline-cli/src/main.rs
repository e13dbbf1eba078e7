mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tripline",
    version,
    about = "Layered trip-data warehouse loader"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the whole target year through every layer
    FullRefresh {
        /// Path to settings YAML file
        settings: PathBuf,
    },
    /// Load the next unloaded month (or a specific one)
    Incremental {
        /// Path to settings YAML file
        settings: PathBuf,
        /// Month to load (1-12); resolves automatically when omitted
        #[arg(long)]
        month: Option<u32>,
    },
    /// Create the warehouse tables
    Init {
        /// Path to settings YAML file
        settings: PathBuf,
    },
    /// Show recent pipeline runs
    History {
        /// Path to settings YAML file
        settings: PathBuf,
        /// Number of runs to show
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::FullRefresh { settings } => commands::full_refresh::execute(&settings),
        Commands::Incremental { settings, month } => {
            commands::incremental::execute(&settings, month)
        }
        Commands::Init { settings } => commands::init::execute(&settings),
        Commands::History { settings, limit } => commands::history::execute(&settings, limit),
    }
}
