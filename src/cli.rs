use clap::{Parser, Subcommand};

use crate::core::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "filedrop")]
#[command(author, version, about = "Telegram bot for paid file hosting with shareable links", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot and the delivery server
    Run {
        /// Path to the YAML configuration
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },

    /// Write a commented default configuration and exit
    InitConfig {
        /// Where to write it; an existing file is never overwritten
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },

    /// Ask every configured payment provider who it is and exit
    CheckProviders {
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// The subcommand, `run` with the default config when none was given.
    pub fn command(self) -> Commands {
        self.command.unwrap_or(Commands::Run {
            config: DEFAULT_CONFIG_PATH.to_string(),
        })
    }
}
