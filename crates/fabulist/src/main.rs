//! Fabulist command-line entry point.

mod cli;

use clap::Parser;
use cli::{Cli, Commands, input, run_chat, run_pipeline, show_config};
use fabulist::{FabulistConfig, ObservabilityConfig, init_observability_with_config};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env before reading ARK_* variables
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    init_observability_with_config(
        ObservabilityConfig::new(env!("CARGO_PKG_NAME"))
            .with_log_level(log_level)
            .with_json_logs(cli.json_logs),
    )?;

    let mut config = match &cli.config {
        Some(path) => FabulistConfig::from_file(path)?,
        None => FabulistConfig::load()?,
    };
    if cli.mock {
        config.ark = config.ark.with_mock(true);
    }

    match cli.command {
        Commands::Run { theme, session } => {
            run_pipeline(&config, &session, theme, &mut input()).await?;
        }
        Commands::Chat { session } => {
            run_chat(&config, &session, &mut input()).await?;
        }
        Commands::Config => show_config(&config)?,
    }

    Ok(())
}
