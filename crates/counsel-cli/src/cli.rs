//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "counsel",
    version,
    about = "Chat with a legal-advice assistant from the terminal"
)]
pub struct Cli {
    /// Backend to talk to: "local", "public", or a base URL
    #[arg(long, global = true, env = "COUNSEL_BACKEND_URL")]
    pub backend: Option<String>,

    /// Session to resume; a new one is started when omitted
    #[arg(long, global = true, env = "COUNSEL_SESSION")]
    pub session: Option<String>,

    /// Config file (default: ~/.config/counsel/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print replies at once instead of revealing them gradually
    #[arg(long, global = true)]
    pub no_typewriter: bool,

    /// Keep the conversation in memory only
    #[arg(long, global = true)]
    pub ephemeral: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Interactive chat (the default)
    Chat,

    /// Ask one question and print the answer
    Ask {
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Read text aloud; without text, reads the session's last answer
    Speak { text: Vec<String> },

    /// Print the session's conversation
    History,

    /// List stored sessions
    Sessions,

    /// Delete the session's conversation
    Reset,
}

impl Cli {
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Chat)
    }

    /// Log filter implied by `-v` flags.
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}
