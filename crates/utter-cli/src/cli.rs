use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "utter",
    version,
    about = "Utter: natural-language to-do manager",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "config", global = true)]
    pub config: Option<PathBuf>,

    #[arg(long = "data", global = true)]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Turn a natural-language utterance into tasks
    Add {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Show the task log, newest first
    List,

    /// Toggle completion for the task matching an id prefix
    Done { id: String },

    /// Delete the task matching an id prefix
    Rm { id: String },

    /// Interactive loop: read utterances from stdin, fire due reminders
    Watch,

    /// Show or change preferences
    Prefs {
        #[command(subcommand)]
        action: Option<PrefsAction>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum PrefsAction {
    /// Set the theme (day|night); toggles when no value is given
    Theme { value: Option<String> },

    /// Set the language (en|zh); toggles when no value is given
    Lang { value: Option<String> },

    /// Set layout handedness (left|right); toggles when no value is given
    Hand { value: Option<String> },
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
