//! Command-line interface for Fabulist.

mod chat;
mod commands;
mod run;

pub use chat::run_chat;
pub use commands::{Cli, Commands};
pub use run::run_pipeline;

use fabulist::{FabulistConfig, FabulistResult};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

/// Line reader over stdin.
pub type Input = Lines<BufReader<Stdin>>;

/// Open stdin for line-by-line replies.
pub fn input() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Cancel `token` when the user presses Ctrl-C.
pub fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling run");
            token.cancel();
        }
    });
}

/// Print the effective configuration as TOML with the API key hidden.
pub fn show_config(config: &FabulistConfig) -> FabulistResult<()> {
    let mut shown = config.clone();
    if shown.ark.api_key().is_some() {
        shown.ark = shown.ark.with_api_key(Some("<redacted>".to_string()));
    }
    let rendered = toml::to_string_pretty(&shown).map_err(|e| {
        fabulist::ConfigError::new(format!("Failed to render configuration: {}", e))
    })?;
    println!("{}", rendered);
    Ok(())
}
