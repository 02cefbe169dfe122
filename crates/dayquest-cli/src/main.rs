use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod common;

#[derive(Parser)]
#[command(name = "dayquest-cli", version, about = "Dayquest CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show progress
    Status {
        /// Print the raw progress record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Step completion and entry
    Step {
        #[command(subcommand)]
        action: commands::step::StepAction,
    },
    /// Day management
    Day {
        #[command(subcommand)]
        action: commands::day::DayAction,
    },
    /// Energizer breaks
    Energizer {
        #[command(subcommand)]
        action: commands::energizer::EnergizerAction,
    },
    /// Wipe all progress for the configured project
    Reset,
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Shared group record
    Sync {
        #[command(subcommand)]
        action: commands::sync::SyncAction,
    },
    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Status { json } => commands::status::run(json),
        Commands::Step { action } => commands::step::run(action),
        Commands::Day { action } => commands::day::run(action),
        Commands::Energizer { action } => commands::energizer::run(action),
        Commands::Reset => commands::status::reset(),
        Commands::Config { action } => commands::config::run(action),
        Commands::Sync { action } => commands::sync::run(action),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "dayquest-cli",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
