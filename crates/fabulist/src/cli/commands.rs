//! CLI command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Fabulist - turn a theme into a reviewed, illustrated story and a short video
#[derive(Parser, Debug)]
#[command(name = "fabulist")]
#[command(about = "Turn a theme into a reviewed, illustrated story and a short video", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Read configuration from this file instead of the default locations
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Use offline mock collaborators instead of the model service
    #[arg(long, global = true)]
    pub mock: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the story pipeline, pausing for review on stdin
    Run {
        /// Story theme; asked for on stdin when omitted
        #[arg(long)]
        theme: Option<String>,

        /// Session key for the run
        #[arg(long, default_value = "default")]
        session: String,
    },

    /// Talk to the illustration agent one message at a time
    Chat {
        /// Session key for the conversation
        #[arg(long, default_value = "default")]
        session: String,
    },

    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_theme() {
        let cli = Cli::try_parse_from(["fabulist", "run", "--theme", "a lost dinosaur"]).unwrap();
        match cli.command {
            Commands::Run { theme, session } => {
                assert_eq!(theme.as_deref(), Some("a lost dinosaur"));
                assert_eq!(session, "default");
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert!(!cli.mock);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "fabulist", "chat", "--session", "s1", "--mock", "-v", "--config", "custom.toml",
        ])
        .unwrap();
        assert!(cli.mock);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
        assert!(matches!(cli.command, Commands::Chat { ref session } if session == "s1"));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["fabulist"]).is_err());
    }
}
