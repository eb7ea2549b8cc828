//! Command line: `escrow-bot [run [--token <TOKEN>]]`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "escrow-bot")]
#[command(about = "Escrow marketplace Telegram bot", long_about = None)]
pub struct Cli {
    /// Defaults to `run` when omitted.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (config from env; token overrides TELEGRAM_API_KEY).
    Run {
        #[arg(short, long)]
        token: Option<String>,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Run { token: None }
    }
}
